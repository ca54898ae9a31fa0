use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Principal role carried in tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform operator; manages tenants, never reads tenant data
    Master,
    Admin,
    Agent,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Admin => "admin",
            Role::Agent => "agent",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of `master_users`
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MasterUser {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub email: Option<String>,
    #[serde(with = "super::timestamp")]
    pub created_at: NaiveDateTime,
}

/// Row of the pre-tenant `users` table
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LegacyUser {
    pub id: i32,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub email: String,
    pub company_id: Option<i32>,
    #[serde(with = "super::timestamp")]
    pub created_at: NaiveDateTime,
}
