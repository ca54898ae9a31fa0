use serde::Deserialize;
use sqlx::PgPool;

use super::tenant_resolver::{AccessError, DenyReason, TenantScope};
use super::ServiceError;
use crate::auth::password::hash_password;
use crate::config;
use crate::database::models::{Agent, AgentStatus};
use crate::database::repository::{AgentChanges, AgentCurrentStatus, AgentRepository, BreakRepository, NewAgent};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAgentInput {
    pub agent_number: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub status: Option<AgentStatus>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAgentInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub status: Option<AgentStatus>,
    pub is_admin: Option<bool>,
}

impl UpdateAgentInput {
    fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Anything beyond a password change needs an admin
    fn is_password_only(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.status.is_none() && self.is_admin.is_none()
    }
}

fn filled(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct AgentService {
    agents: AgentRepository,
    breaks: BreakRepository,
    scope: TenantScope,
    bcrypt_cost: u32,
}

impl AgentService {
    pub fn new(pool: PgPool, scope: TenantScope) -> Self {
        Self {
            agents: AgentRepository::new(pool.clone(), &scope.tables),
            breaks: BreakRepository::new(pool, &scope.tables),
            scope,
            bcrypt_cost: config::config().security.bcrypt_cost,
        }
    }

    pub async fn list(&self) -> Result<Vec<Agent>, ServiceError> {
        Ok(self.agents.list().await?)
    }

    pub async fn add(&self, input: CreateAgentInput) -> Result<Agent, ServiceError> {
        self.scope.require_admin()?;
        self.scope.ensure_writable()?;

        let missing = || ServiceError::Validation("Missing required fields".to_string());
        let agent_number = filled(input.agent_number).ok_or_else(missing)?;
        let name = filled(input.name).ok_or_else(missing)?;
        let email = filled(input.email).ok_or_else(missing)?;
        let password = input.password.filter(|p| !p.is_empty()).ok_or_else(missing)?;

        if !agent_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(ServiceError::Validation("Agent number must contain numbers only".to_string()));
        }
        let status = input.status.unwrap_or(AgentStatus::Active);
        if status == AgentStatus::Removed {
            return Err(ServiceError::Validation("New agents cannot start as Removed".to_string()));
        }

        let agent = NewAgent {
            agent_number,
            name,
            email,
            password_hash: hash_password(&password, self.bcrypt_cost).await?,
            status,
            is_admin: input.is_admin,
        };
        let created = self.agents.create(&agent).await?;
        tracing::info!("Added agent {} in {:?}", created.agent_number, self.scope.context());
        Ok(created)
    }

    /// Admins may change any field; an agent may only change their own password
    pub async fn edit(&self, agent_number: &str, input: UpdateAgentInput) -> Result<Agent, ServiceError> {
        self.scope.ensure_writable()?;
        if !self.scope.is_admin() {
            let own = self.scope.acting_agent() == Some(agent_number);
            if !own || !input.is_password_only() {
                return Err(AccessError::Denied(DenyReason::RoleNotPermitted).into());
            }
            if input.password().is_none() {
                return Err(ServiceError::Validation("Password required".to_string()));
            }
        }

        let current = self.agents.find_404(agent_number).await?;
        if let Some(next) = input.status {
            if !current.status.can_transition_to(next) {
                return Err(ServiceError::Validation(format!(
                    "Agent {} is {} and cannot become {}",
                    agent_number, current.status, next
                )));
            }
        }

        let password_hash = match input.password() {
            Some(password) => Some(hash_password(password, self.bcrypt_cost).await?),
            None => None,
        };
        let changes = AgentChanges {
            name: filled(input.name),
            email: filled(input.email),
            password_hash,
            status: input.status,
            is_admin: input.is_admin,
        };
        if changes.is_empty() {
            return Err(ServiceError::Validation("No fields to update".to_string()));
        }
        Ok(self.agents.update(agent_number, &changes).await?)
    }

    /// Soft delete: the row stays so call and break history keep their agent
    pub async fn remove(&self, agent_number: &str) -> Result<Agent, ServiceError> {
        self.scope.require_admin()?;
        self.scope.ensure_writable()?;
        let changes = AgentChanges {
            status: Some(AgentStatus::Removed),
            ..Default::default()
        };
        let removed = self.agents.update(agent_number, &changes).await?;
        tracing::info!("Removed agent {} in {:?}", agent_number, self.scope.context());
        Ok(removed)
    }

    /// Admins see every active non-admin agent; agents see themselves
    pub async fn current_statuses(&self) -> Result<Vec<AgentCurrentStatus>, ServiceError> {
        let filter = if self.scope.is_admin() {
            None
        } else {
            Some(self.scope.acting_agent().unwrap_or_default())
        };
        Ok(self.breaks.current_statuses(filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_only_edits() {
        let input = UpdateAgentInput {
            password: Some("n3w".into()),
            ..Default::default()
        };
        assert!(input.is_password_only());
        assert_eq!(input.password(), Some("n3w"));

        let input = UpdateAgentInput {
            password: Some(String::new()),
            status: Some(AgentStatus::Inactive),
            ..Default::default()
        };
        assert!(!input.is_password_only());
        assert_eq!(input.password(), None);
    }

    #[test]
    fn blank_fields_are_treated_as_absent() {
        assert_eq!(filled(Some("  ".into())), None);
        assert_eq!(filled(Some(" Asha ".into())), Some("Asha".to_string()));
    }
}
