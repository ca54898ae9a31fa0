#![allow(dead_code)]

use std::collections::HashMap;
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::StatusCode;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use callcenter_api::auth::TokenIssuer;
use callcenter_api::database::models::{
    Agent, AgentStatus, Company, CompanyStatus, LegacyAgent, LegacyUser, MasterUser, PaymentStatus,
};
use callcenter_api::database::{DatabaseError, TenantDirectory, TenantId};

pub const TEST_SECRET: &str = "integration-test-secret";

pub fn issuer() -> TokenIssuer {
    TokenIssuer::new(TEST_SECRET, 24)
}

pub fn tenant(id: i64) -> TenantId {
    TenantId::new(id).expect("positive tenant id")
}

pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .expect("valid date")
}

pub fn company(id: i32, name: &str, admin_username: &str) -> Company {
    Company {
        id,
        name: name.to_string(),
        admin_username: admin_username.to_string(),
        admin_password: "admin-pass".to_string(),
        email: format!("ops@{}.test", name.to_lowercase()),
        contact_no: None,
        payment_status: PaymentStatus::Paid,
        status: CompanyStatus::Active,
        created_by_master_id: Some(1),
        created_at: epoch(),
    }
}

/// Plaintext passwords exercise the legacy comparison path and keep tests fast
pub fn agent(id: i32, agent_number: &str, password: &str, status: AgentStatus, is_admin: bool) -> Agent {
    Agent {
        id,
        agent_number: agent_number.to_string(),
        name: format!("Agent {}", agent_number),
        email: format!("{}@agents.test", agent_number),
        password: password.to_string(),
        status,
        is_admin,
        created_at: epoch(),
    }
}

/// In-memory directory standing in for the shared tables
#[derive(Default)]
pub struct MemoryDirectory {
    pub companies: Vec<Company>,
    pub tenant_agents: HashMap<(TenantId, String), Agent>,
    pub legacy_agents: Vec<LegacyAgent>,
    pub legacy_users: Vec<LegacyUser>,
    pub masters: Vec<MasterUser>,
    /// Tenants whose agent table lookup fails, as when `agents_{id}` was never provisioned
    pub broken_tenants: Vec<TenantId>,
}

impl MemoryDirectory {
    pub fn with_company(mut self, company: Company) -> Self {
        self.companies.push(company);
        self
    }

    pub fn with_tenant_agent(mut self, tenant_id: i64, agent: Agent) -> Self {
        self.tenant_agents
            .insert((tenant(tenant_id), agent.agent_number.clone()), agent);
        self
    }

    pub fn with_mapping(mut self, company_id: Option<i32>, agent: Agent) -> Self {
        self.legacy_agents.push(LegacyAgent { agent, company_id });
        self
    }

    pub fn with_legacy_user(mut self, id: i32, user_id: &str, password: &str, company_id: Option<i32>) -> Self {
        self.legacy_users.push(LegacyUser {
            id,
            user_id: user_id.to_string(),
            password: password.to_string(),
            name: format!("User {}", user_id),
            email: format!("{}@users.test", user_id),
            company_id,
            created_at: epoch(),
        });
        self
    }

    pub fn with_broken_tenant(mut self, tenant_id: i64) -> Self {
        self.broken_tenants.push(tenant(tenant_id));
        self
    }

    pub fn with_master(mut self, id: i32, username: &str, password: &str) -> Self {
        self.masters.push(MasterUser {
            id,
            username: username.to_string(),
            password: password.to_string(),
            name: "Master".to_string(),
            email: None,
            created_at: epoch(),
        });
        self
    }
}

#[async_trait]
impl TenantDirectory for MemoryDirectory {
    async fn find_company(&self, tenant: TenantId) -> Result<Option<Company>, DatabaseError> {
        Ok(self.companies.iter().find(|c| c.id == tenant.get()).cloned())
    }

    async fn companies_by_admin_username(&self, username: &str) -> Result<Vec<Company>, DatabaseError> {
        let mut found: Vec<Company> = self
            .companies
            .iter()
            .filter(|c| c.admin_username == username)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.id);
        Ok(found)
    }

    async fn tenant_ids(&self) -> Result<Vec<TenantId>, DatabaseError> {
        let mut ids: Vec<TenantId> = self.companies.iter().map(|c| tenant(c.id.into())).collect();
        ids.sort();
        Ok(ids)
    }

    async fn tenant_agent(&self, tenant: TenantId, agent_number: &str) -> Result<Option<Agent>, DatabaseError> {
        if self.broken_tenants.contains(&tenant) {
            return Err(DatabaseError::NotFound(format!("relation agents_{} does not exist", tenant)));
        }
        Ok(self.tenant_agents.get(&(tenant, agent_number.to_string())).cloned())
    }

    async fn legacy_agents(&self, agent_number: &str) -> Result<Vec<LegacyAgent>, DatabaseError> {
        Ok(self
            .legacy_agents
            .iter()
            .filter(|a| a.agent.agent_number == agent_number)
            .cloned()
            .collect())
    }

    async fn legacy_user(&self, user_id: &str) -> Result<Option<LegacyUser>, DatabaseError> {
        Ok(self.legacy_users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn master_user(&self, username: &str) -> Result<Option<MasterUser>, DatabaseError> {
        Ok(self.masters.iter().find(|m| m.username == username).cloned())
    }
}

/// Store-backed tests run only when TEST_DATABASE_URL points at a scratch database
pub async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping store test");
        return Ok(None);
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&url)
        .await
        .context("failed to connect to TEST_DATABASE_URL")?;
    Ok(Some(pool))
}

/// Drop every table the suite may create so each test starts from nothing
pub async fn reset_schema(pool: &PgPool) -> Result<()> {
    sqlx::query("DROP SCHEMA public CASCADE").execute(pool).await?;
    sqlx::query("CREATE SCHEMA public").execute(pool).await?;
    Ok(())
}

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn(database_url: &str) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Assumes the debug profile binary has been built
        let mut cmd = Command::new("target/debug/callcenter-api");
        cmd.env("API_PORT", port.to_string())
            .env("DATABASE_URL", database_url)
            .env("JWT_SECRET", TEST_SECRET)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;
        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/api/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server(database_url: &str) -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn(database_url).expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(20)).await?;
    Ok(server)
}

/// Store tests share one scratch database and reset it, so they run one at a time
pub static STORE_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());
