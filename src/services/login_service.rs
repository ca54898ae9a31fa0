// Login resolution.
//
// Non-master identifiers are tried in a fixed order, kept for compatibility with
// accounts issued at different stages of the multi-tenant migration:
//   1. company admin username -> that company's admin agent
//   2. shared `agents` mapping -> the mapped company's agent table
//   3. scan of every company's agent table (deprecated, behind a flag)
//   4. legacy `users` row
// then the same mapping/scan pair for an explicit agent number.

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use crate::auth::password::{verify_password, PasswordError};
use crate::auth::{JwtError, TokenIssuer};
use crate::config;
use crate::database::directory::TenantDirectory;
use crate::database::manager::DatabaseError;
use crate::database::models::{Agent, AgentStatus, Role};
use crate::database::naming::TenantId;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "userId", alias = "username", deserialize_with = "identifier")]
    pub user_id: Option<String>,
    #[serde(default, alias = "agentNumber", deserialize_with = "identifier")]
    pub agent_number: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "loginType")]
    pub login_type: Option<String>,
}

impl LoginRequest {
    pub fn is_master(&self) -> bool {
        self.login_type.as_deref() == Some("master")
    }

    /// Shape checks that need no store access; returns the password
    pub fn validate(&self) -> Result<&str, LoginError> {
        let password = self.password.as_deref().filter(|p| !p.is_empty());
        let password = match (password, self.user_id.is_some() || self.agent_number.is_some()) {
            (Some(password), true) => password,
            _ => {
                return Err(LoginError::Validation(
                    "User ID/Agent Number and password required".to_string(),
                ))
            }
        };
        if !self.is_master() {
            require_digits(self.user_id.as_deref(), "User ID")?;
            require_digits(self.agent_number.as_deref(), "Agent number")?;
        }
        Ok(password)
    }
}

/// Clients send identifiers as either JSON strings or numbers
fn identifier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.and_then(|raw| {
        let value = match raw {
            Raw::Text(text) => text.trim().to_string(),
            Raw::Number(n) => n.to_string(),
        };
        (!value.is_empty()).then_some(value)
    }))
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("You are no longer an agent.")]
    AccountRemoved,
    #[error("Your account is inactive. Please contact an administrator.")]
    AccountInactive,
    #[error("Company account is disabled. Please contact support.")]
    TenantDisabled,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginUser {
    pub id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_number: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub company_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub message: &'static str,
    pub token: String,
    pub user: LoginUser,
}

/// Where a successful login was resolved from; logged, never serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPath {
    Master,
    AdminUsername,
    SharedMapping,
    TenantScan,
    LegacyUser,
}

pub struct LoginService {
    directory: Arc<dyn TenantDirectory>,
    issuer: TokenIssuer,
    tenant_scan: bool,
}

impl LoginService {
    pub fn new(directory: Arc<dyn TenantDirectory>, issuer: TokenIssuer, tenant_scan: bool) -> Self {
        Self {
            directory,
            issuer,
            tenant_scan,
        }
    }

    pub fn from_config(directory: Arc<dyn TenantDirectory>) -> Self {
        let scan = config::config().security.enable_tenant_scan_login;
        Self::new(directory, TokenIssuer::from_config(), scan)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginOutcome, LoginError> {
        let (user, path) = self.authenticate(request).await?;
        let tenant = user.company_id.map(|id| TenantId::new(id.into())).transpose()?;
        let claims = self.issuer.claims(user.id, user.role, tenant, user.agent_number.clone());
        let token = self.issuer.issue(&claims)?;
        tracing::info!("Login succeeded for user {} as {} via {:?}", user.id, user.role, path);
        Ok(LoginOutcome {
            message: "Login successful",
            token,
            user,
        })
    }

    /// Master-only login; never falls through to tenant accounts
    pub async fn master_login(&self, request: &LoginRequest) -> Result<LoginOutcome, LoginError> {
        let forced = LoginRequest {
            login_type: Some("master".to_string()),
            ..request.clone()
        };
        self.login(&forced).await
    }

    pub async fn authenticate(&self, request: &LoginRequest) -> Result<(LoginUser, LoginPath), LoginError> {
        let password = request.validate()?;

        if request.is_master() {
            let username = request
                .user_id
                .as_deref()
                .or(request.agent_number.as_deref())
                .unwrap_or_default();
            return self.master(username, password).await;
        }

        if let Some(user_id) = request.user_id.as_deref() {
            let admin_companies = self.directory.companies_by_admin_username(user_id).await?;
            if !admin_companies.is_empty() {
                for company in &admin_companies {
                    let tenant = company.tenant_id()?;
                    if let Some(agent) = self.tenant_match(tenant, user_id, password).await? {
                        if agent.is_admin {
                            return self.grant(tenant, agent, LoginPath::AdminUsername).await;
                        }
                    }
                }
            } else if let Some(found) = self.via_mapping_or_scan(user_id, password).await? {
                return Ok(found);
            }

            if let Some(user) = self.directory.legacy_user(user_id).await? {
                if verify_password(password, &user.password).await? {
                    if let Some(company_id) = user.company_id {
                        self.ensure_tenant_open(TenantId::new(company_id.into())?).await?;
                    }
                    let granted = LoginUser {
                        id: user.id,
                        user_id: Some(user.user_id),
                        agent_number: None,
                        name: user.name,
                        email: Some(user.email),
                        role: Role::Admin,
                        company_id: user.company_id,
                    };
                    return Ok((granted, LoginPath::LegacyUser));
                }
            }
        }

        if let Some(agent_number) = request.agent_number.as_deref() {
            if let Some(found) = self.via_mapping_or_scan(agent_number, password).await? {
                return Ok(found);
            }
        }

        tracing::debug!("No account matched the submitted credentials");
        Err(LoginError::InvalidCredentials)
    }

    async fn master(&self, username: &str, password: &str) -> Result<(LoginUser, LoginPath), LoginError> {
        let master = self
            .directory
            .master_user(username)
            .await?
            .ok_or(LoginError::InvalidCredentials)?;
        if !verify_password(password, &master.password).await? {
            return Err(LoginError::InvalidCredentials);
        }
        let user = LoginUser {
            id: master.id,
            user_id: Some(master.username),
            agent_number: None,
            name: master.name,
            email: master.email,
            role: Role::Master,
            company_id: None,
        };
        Ok((user, LoginPath::Master))
    }

    /// Steps 2 and 3. A shared mapping that names a company settles the
    /// search even when that company's row does not match.
    async fn via_mapping_or_scan(
        &self,
        agent_number: &str,
        password: &str,
    ) -> Result<Option<(LoginUser, LoginPath)>, LoginError> {
        let mut mapped = None;
        for legacy in self.directory.legacy_agents(agent_number).await? {
            if let Some(company_id) = legacy.company_id {
                if verify_password(password, &legacy.agent.password).await? {
                    mapped = Some(TenantId::new(company_id.into())?);
                    break;
                }
            }
        }

        if let Some(tenant) = mapped {
            return match self.tenant_match(tenant, agent_number, password).await? {
                Some(agent) => self.grant(tenant, agent, LoginPath::SharedMapping).await.map(Some),
                None => Ok(None),
            };
        }

        if !self.tenant_scan {
            return Ok(None);
        }
        for tenant in self.directory.tenant_ids().await? {
            // A company whose tables are missing or broken must not block the rest
            let found = match self.tenant_match(tenant, agent_number, password).await {
                Ok(found) => found,
                Err(LoginError::Database(err)) => {
                    tracing::warn!("Skipping company {} during login scan: {}", tenant, err);
                    continue;
                }
                Err(err) => return Err(err),
            };
            if let Some(agent) = found {
                tracing::warn!(
                    "Login for agent {} resolved by scanning every company (company {}); this fallback is deprecated",
                    agent_number,
                    tenant
                );
                return self.grant(tenant, agent, LoginPath::TenantScan).await.map(Some);
            }
        }
        Ok(None)
    }

    async fn tenant_match(
        &self,
        tenant: TenantId,
        agent_number: &str,
        password: &str,
    ) -> Result<Option<Agent>, LoginError> {
        let Some(agent) = self.directory.tenant_agent(tenant, agent_number).await? else {
            return Ok(None);
        };
        if verify_password(password, &agent.password).await? {
            Ok(Some(agent))
        } else {
            Ok(None)
        }
    }

    async fn grant(&self, tenant: TenantId, agent: Agent, path: LoginPath) -> Result<(LoginUser, LoginPath), LoginError> {
        check_agent_status(&agent)?;
        self.ensure_tenant_open(tenant).await?;
        let role = if agent.is_admin { Role::Admin } else { Role::Agent };
        let user = LoginUser {
            id: agent.id,
            user_id: None,
            agent_number: Some(agent.agent_number),
            name: agent.name,
            email: Some(agent.email),
            role,
            company_id: Some(tenant.get()),
        };
        Ok((user, path))
    }

    async fn ensure_tenant_open(&self, tenant: TenantId) -> Result<(), LoginError> {
        match self.directory.find_company(tenant).await? {
            Some(company) if company.is_blocked() => {
                tracing::warn!("Login refused for disabled company {}", tenant);
                Err(LoginError::TenantDisabled)
            }
            _ => Ok(()),
        }
    }
}

/// Removed is permanent for everyone; Inactive only locks out non-admins
pub fn check_agent_status(agent: &Agent) -> Result<(), LoginError> {
    match agent.status {
        AgentStatus::Removed => Err(LoginError::AccountRemoved),
        AgentStatus::Inactive if !agent.is_admin => Err(LoginError::AccountInactive),
        _ => Ok(()),
    }
}

fn require_digits(value: Option<&str>, label: &str) -> Result<(), LoginError> {
    match value {
        Some(v) if !v.chars().all(|c| c.is_ascii_digit()) => {
            Err(LoginError::Validation(format!("{} must contain numbers only", label)))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn agent(status: AgentStatus, is_admin: bool) -> Agent {
        Agent {
            id: 1,
            agent_number: "2000000000".into(),
            name: "Asha".into(),
            email: "asha@acme.test".into(),
            password: "pw".into(),
            status,
            is_admin,
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn removed_and_inactive_are_distinct() {
        assert!(check_agent_status(&agent(AgentStatus::Active, false)).is_ok());
        assert!(matches!(
            check_agent_status(&agent(AgentStatus::Removed, false)),
            Err(LoginError::AccountRemoved)
        ));
        assert!(matches!(
            check_agent_status(&agent(AgentStatus::Removed, true)),
            Err(LoginError::AccountRemoved)
        ));
        assert!(matches!(
            check_agent_status(&agent(AgentStatus::Inactive, false)),
            Err(LoginError::AccountInactive)
        ));
        assert!(check_agent_status(&agent(AgentStatus::Inactive, true)).is_ok());
    }

    #[test]
    fn accepts_numeric_and_string_identifiers() {
        let request: LoginRequest =
            serde_json::from_value(serde_json::json!({"userId": 1000000000u64, "password": "x"})).unwrap();
        assert_eq!(request.user_id.as_deref(), Some("1000000000"));
        assert!(!request.is_master());

        let request: LoginRequest = serde_json::from_value(
            serde_json::json!({"agentNumber": " 2000000000 ", "password": "x", "loginType": "master"}),
        )
        .unwrap();
        assert_eq!(request.agent_number.as_deref(), Some("2000000000"));
        assert!(request.is_master());

        let request: LoginRequest = serde_json::from_value(serde_json::json!({"userId": "", "password": "x"})).unwrap();
        assert!(request.user_id.is_none());
    }

    #[test]
    fn identifiers_must_be_digits() {
        assert!(require_digits(Some("12345"), "User ID").is_ok());
        assert!(require_digits(None, "User ID").is_ok());
        match require_digits(Some("12a45"), "User ID") {
            Err(LoginError::Validation(msg)) => assert_eq!(msg, "User ID must contain numbers only"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
