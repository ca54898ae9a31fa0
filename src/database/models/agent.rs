use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

text_enum! {
    /// Agent lifecycle. `Removed` is terminal.
    AgentStatus {
        Active => "Active",
        Inactive => "Inactive",
        Removed => "Removed",
    }
}

impl AgentStatus {
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        !matches!(self, AgentStatus::Removed) || next == AgentStatus::Removed
    }
}

/// Row of `agents` or `agents_{tenant}`
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Agent {
    pub id: i32,
    pub agent_number: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[sqlx(try_from = "String")]
    pub status: AgentStatus,
    pub is_admin: bool,
    #[serde(with = "super::timestamp")]
    pub created_at: NaiveDateTime,
}

/// Shared `agents` row, which also maps an agent number to its tenant
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LegacyAgent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub agent: Agent,
    pub company_id: Option<i32>,
}
