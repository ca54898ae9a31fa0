// Lookups that span tenants: companies, principals and agent-to-tenant mappings.
// Login and tenant resolution depend on this trait rather than on SQL directly.

use async_trait::async_trait;
use sqlx::PgPool;

use super::manager::{DatabaseError, DatabaseManager};
use super::models::{Agent, Company, LegacyAgent, LegacyUser, MasterUser};
use super::naming::{TenantEntity, TenantId};

pub const COMPANY_COLUMNS: &str = "id, name, admin_username, admin_password, email, contact_no, \
     payment_status, status, created_by_master_id, created_at";

pub const AGENT_COLUMNS: &str = "id, agent_number, name, email, password, status, is_admin, created_at";

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_company(&self, tenant: TenantId) -> Result<Option<Company>, DatabaseError>;

    /// Tenants administered by `username`, oldest first. Several tenants may share one.
    async fn companies_by_admin_username(&self, username: &str) -> Result<Vec<Company>, DatabaseError>;

    async fn tenant_ids(&self) -> Result<Vec<TenantId>, DatabaseError>;

    /// Agent row in the tenant's own table
    async fn tenant_agent(&self, tenant: TenantId, agent_number: &str) -> Result<Option<Agent>, DatabaseError>;

    /// Shared `agents` rows for a number; one per tenant it is mapped to
    async fn legacy_agents(&self, agent_number: &str) -> Result<Vec<LegacyAgent>, DatabaseError>;

    async fn legacy_user(&self, user_id: &str) -> Result<Option<LegacyUser>, DatabaseError>;

    async fn master_user(&self, username: &str) -> Result<Option<MasterUser>, DatabaseError>;
}

/// Postgres-backed directory
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find_company(&self, tenant: TenantId) -> Result<Option<Company>, DatabaseError> {
        let company = sqlx::query_as::<_, Company>(&format!("SELECT {} FROM companies WHERE id = $1", COMPANY_COLUMNS))
            .bind(tenant.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(company)
    }

    async fn companies_by_admin_username(&self, username: &str) -> Result<Vec<Company>, DatabaseError> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE admin_username = $1 ORDER BY id",
            COMPANY_COLUMNS
        ))
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(companies)
    }

    async fn tenant_ids(&self) -> Result<Vec<TenantId>, DatabaseError> {
        let rows: Vec<(i32,)> = sqlx::query_as("SELECT id FROM companies ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|(id,)| TenantId::new(id.into())).collect()
    }

    async fn tenant_agent(&self, tenant: TenantId, agent_number: &str) -> Result<Option<Agent>, DatabaseError> {
        let table = DatabaseManager::quote_identifier(&TenantEntity::Agents.table_for(tenant));
        let agent = sqlx::query_as::<_, Agent>(&format!(
            "SELECT {} FROM {} WHERE agent_number = $1",
            AGENT_COLUMNS, table
        ))
        .bind(agent_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(agent)
    }

    async fn legacy_agents(&self, agent_number: &str) -> Result<Vec<LegacyAgent>, DatabaseError> {
        let agents = sqlx::query_as::<_, LegacyAgent>(&format!(
            "SELECT {}, company_id FROM agents WHERE agent_number = $1 ORDER BY company_id NULLS LAST, id",
            AGENT_COLUMNS
        ))
        .bind(agent_number)
        .fetch_all(&self.pool)
        .await?;
        Ok(agents)
    }

    async fn legacy_user(&self, user_id: &str) -> Result<Option<LegacyUser>, DatabaseError> {
        let user = sqlx::query_as::<_, LegacyUser>(
            "SELECT id, user_id, password, name, email, company_id, created_at FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn master_user(&self, username: &str) -> Result<Option<MasterUser>, DatabaseError> {
        let master = sqlx::query_as::<_, MasterUser>(
            "SELECT id, username, password, name, email, created_at FROM master_users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(master)
    }
}
