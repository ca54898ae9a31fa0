use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::directory::AGENT_COLUMNS;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{Agent, AgentStatus};
use crate::database::naming::TableSet;

#[derive(Debug, Clone)]
pub struct NewAgent {
    pub agent_number: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub status: AgentStatus,
    pub is_admin: bool,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default)]
pub struct AgentChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub status: Option<AgentStatus>,
    pub is_admin: Option<bool>,
}

impl AgentChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.status.is_none()
            && self.is_admin.is_none()
    }
}

pub struct AgentRepository {
    pool: PgPool,
    table: String,
}

impl AgentRepository {
    pub fn new(pool: PgPool, tables: &TableSet) -> Self {
        Self {
            pool,
            table: DatabaseManager::quote_identifier(&tables.agents),
        }
    }

    pub async fn list(&self) -> Result<Vec<Agent>, DatabaseError> {
        let agents = sqlx::query_as::<_, Agent>(&format!(
            "SELECT {} FROM {} ORDER BY agent_number",
            AGENT_COLUMNS, self.table
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(agents)
    }

    pub async fn find(&self, agent_number: &str) -> Result<Option<Agent>, DatabaseError> {
        let agent = sqlx::query_as::<_, Agent>(&format!(
            "SELECT {} FROM {} WHERE agent_number = $1",
            AGENT_COLUMNS, self.table
        ))
        .bind(agent_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(agent)
    }

    pub async fn find_404(&self, agent_number: &str) -> Result<Agent, DatabaseError> {
        self.find(agent_number)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Agent {} not found", agent_number)))
    }

    pub async fn create(&self, agent: &NewAgent) -> Result<Agent, DatabaseError> {
        sqlx::query_as::<_, Agent>(&format!(
            "INSERT INTO {} (agent_number, name, email, password, status, is_admin)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            self.table, AGENT_COLUMNS
        ))
        .bind(&agent.agent_number)
        .bind(&agent.name)
        .bind(&agent.email)
        .bind(&agent.password_hash)
        .bind(agent.status.as_str())
        .bind(agent.is_admin)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::from_unique_violation(
                e,
                &[("agent_number", agent.agent_number.as_str()), ("email", agent.email.as_str())],
            )
        })
    }

    pub async fn update(&self, agent_number: &str, changes: &AgentChanges) -> Result<Agent, DatabaseError> {
        if changes.is_empty() {
            return self.find_404(agent_number).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!("UPDATE {} SET ", self.table));
        let mut set = builder.separated(", ");
        if let Some(name) = &changes.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(email) = &changes.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        if let Some(hash) = &changes.password_hash {
            set.push("password = ").push_bind_unseparated(hash);
        }
        if let Some(status) = changes.status {
            set.push("status = ").push_bind_unseparated(status.as_str());
        }
        if let Some(is_admin) = changes.is_admin {
            set.push("is_admin = ").push_bind_unseparated(is_admin);
        }
        builder.push(" WHERE agent_number = ").push_bind(agent_number);
        builder.push(format!(" RETURNING {}", AGENT_COLUMNS));

        let email = changes.email.as_deref().unwrap_or_default();
        builder
            .build_query_as::<Agent>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_unique_violation(e, &[("email", email)]))?
            .ok_or_else(|| DatabaseError::NotFound(format!("Agent {} not found", agent_number)))
    }
}
