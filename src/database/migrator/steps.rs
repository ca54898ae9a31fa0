// The standard migration steps, in execution order.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{MigrationContext, MigrationStep, StepBox, StepOutcome};
use crate::auth::password;
use crate::database::introspect::{self, UniqueIndex};
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::timestamp;
use crate::database::naming::TenantId;
use crate::database::provisioner;

pub const COMPOSITE_AGENT_KEY: &str = "uniq_agents_company_agent";

pub fn standard_steps() -> Vec<StepBox> {
    vec![
        Box::new(CreateBaseTables),
        Box::new(AddTenantColumns),
        Box::new(BackfillSoleTenant),
        Box::new(CompositeAgentKey),
        Box::new(CallColumns),
        Box::new(CallBreakTenantColumns),
        Box::new(ProvisionTenantTables),
        Box::new(DropAdminUsernameUnique),
        Box::new(SeedBaseline),
    ]
}

/// Shared tables in their current shape. Existing tables are left alone; later
/// steps upgrade them.
const BASE_TABLES: [&str; 6] = [
    r#"CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        user_id VARCHAR(50) NOT NULL UNIQUE,
        password VARCHAR(255) NOT NULL,
        name VARCHAR(100) NOT NULL,
        email VARCHAR(100) NOT NULL,
        company_id INTEGER,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS companies (
        id SERIAL PRIMARY KEY,
        name VARCHAR(150) NOT NULL,
        admin_username VARCHAR(20) NOT NULL,
        admin_password VARCHAR(255) NOT NULL,
        email VARCHAR(100) NOT NULL,
        contact_no VARCHAR(20),
        payment_status VARCHAR(10) NOT NULL DEFAULT 'Paid'
            CHECK (payment_status IN ('Paid', 'Unpaid')),
        status VARCHAR(20) NOT NULL DEFAULT 'Active'
            CHECK (status IN ('Active', 'Partially Close', 'Fully Close')),
        created_by_master_id INTEGER,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS master_users (
        id SERIAL PRIMARY KEY,
        username VARCHAR(50) NOT NULL UNIQUE,
        password VARCHAR(255) NOT NULL,
        name VARCHAR(100) NOT NULL,
        email VARCHAR(100),
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS agents (
        id SERIAL PRIMARY KEY,
        agent_number VARCHAR(20) NOT NULL,
        name VARCHAR(100) NOT NULL,
        email VARCHAR(100) NOT NULL,
        password VARCHAR(255) NOT NULL,
        status VARCHAR(10) NOT NULL DEFAULT 'Active'
            CHECK (status IN ('Active', 'Inactive', 'Removed')),
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        company_id INTEGER,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        CONSTRAINT uniq_agents_company_agent UNIQUE (company_id, agent_number)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS calls (
        id SERIAL PRIMARY KEY,
        agent_number VARCHAR(20) NOT NULL,
        customer_number VARCHAR(20) NOT NULL,
        duration INTEGER,
        call_status VARCHAR(50),
        "timestamp" TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        remarks TEXT,
        name TEXT,
        remarks_status TEXT,
        recordings BYTEA,
        alternative_numbers TEXT,
        meeting_datetime TIMESTAMP,
        meeting_description TEXT,
        company_id INTEGER
    )"#,
    r#"CREATE TABLE IF NOT EXISTS agent_breaks (
        id SERIAL PRIMARY KEY,
        agent_number VARCHAR(20) NOT NULL,
        status VARCHAR(10) NOT NULL CHECK (status IN ('Working', 'Break')),
        break_start TIMESTAMP,
        break_end TIMESTAMP,
        duration_seconds INTEGER,
        remark TEXT,
        company_id INTEGER,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
];

/// Step 1: create the shared tables. Nothing else can run without them.
pub struct CreateBaseTables;

#[async_trait]
impl MigrationStep for CreateBaseTables {
    fn name(&self) -> &'static str {
        "create_base_tables"
    }

    fn is_fatal(&self) -> bool {
        true
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
        let mut tx = ctx.pool.begin().await?;
        for statement in BASE_TABLES {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        for (table, column) in [
            ("calls", "agent_number"),
            ("calls", "timestamp"),
            ("agent_breaks", "agent_number"),
            ("agent_breaks", "break_start"),
        ] {
            let statement = format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                DatabaseManager::quote_identifier(&format!("idx_{}_{}", table, column)),
                table,
                DatabaseManager::quote_identifier(column),
            );
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(StepOutcome::Applied("shared tables ensured".into()))
    }
}

/// Step 2: tenant mapping columns on `users` and `agents`
pub struct AddTenantColumns;

#[async_trait]
impl MigrationStep for AddTenantColumns {
    fn name(&self) -> &'static str {
        "add_tenant_columns"
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
        let mut added = Vec::new();
        for table in ["users", "agents"] {
            if add_column_if_missing(&ctx.pool, table, "company_id", "INTEGER NULL").await? {
                added.push(table);
            }
        }
        ctx.agents_company_id_added = added.contains(&"agents");

        if added.is_empty() {
            Ok(StepOutcome::Skipped("company_id already present".into()))
        } else {
            Ok(StepOutcome::Applied(format!("added company_id to {}", added.join(", "))))
        }
    }
}

/// Step 3: when the mapping column was just introduced and exactly one tenant
/// exists, every unmapped agent belongs to it
pub struct BackfillSoleTenant;

#[async_trait]
impl MigrationStep for BackfillSoleTenant {
    fn name(&self) -> &'static str {
        "backfill_sole_tenant"
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
        if !ctx.agents_company_id_added {
            return Ok(StepOutcome::Skipped("agents.company_id existed before this run".into()));
        }

        let companies: Vec<(i32,)> = sqlx::query_as("SELECT id FROM companies ORDER BY id LIMIT 2")
            .fetch_all(&ctx.pool)
            .await?;
        let [(sole,)] = companies.as_slice() else {
            return Ok(StepOutcome::Skipped(format!(
                "backfill needs exactly one tenant, found {}",
                if companies.is_empty() { "none" } else { "several" }
            )));
        };

        let updated = sqlx::query("UPDATE agents SET company_id = $1 WHERE company_id IS NULL")
            .bind(sole)
            .execute(&ctx.pool)
            .await?
            .rows_affected();
        Ok(StepOutcome::Applied(format!("mapped {} agents to tenant {}", updated, sole)))
    }
}

/// Step 4: agent numbers are unique per tenant, not globally
pub struct CompositeAgentKey;

#[async_trait]
impl MigrationStep for CompositeAgentKey {
    fn name(&self) -> &'static str {
        "composite_agent_key"
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
        let indexes = introspect::unique_indexes(&ctx.pool, "agents").await?;
        let mut changes = Vec::new();

        for index in indexes.iter().filter(|i| i.covers_exactly(&["agent_number"])) {
            drop_unique(&ctx.pool, "agents", index).await?;
            changes.push(format!("dropped {}", index.index_name));
        }

        let has_composite = indexes.iter().any(|i| i.covers_exactly(&["company_id", "agent_number"]))
            || introspect::index_exists(&ctx.pool, COMPOSITE_AGENT_KEY).await?;
        if !has_composite {
            sqlx::query(&format!(
                "CREATE UNIQUE INDEX {} ON agents (company_id, agent_number)",
                COMPOSITE_AGENT_KEY
            ))
            .execute(&ctx.pool)
            .await?;
            changes.push(format!("created {}", COMPOSITE_AGENT_KEY));
        }

        if changes.is_empty() {
            Ok(StepOutcome::Skipped("composite key already in place".into()))
        } else {
            Ok(StepOutcome::Applied(changes.join("; ")))
        }
    }
}

/// Step 5: recording, meeting and alternative-number columns on shared `calls`
pub struct CallColumns;

#[async_trait]
impl MigrationStep for CallColumns {
    fn name(&self) -> &'static str {
        "call_columns"
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
        let mut changes = Vec::new();

        match introspect::column_type(&ctx.pool, "calls", "recordings").await? {
            None => {
                sqlx::query("ALTER TABLE calls ADD COLUMN recordings BYTEA")
                    .execute(&ctx.pool)
                    .await?;
                changes.push("added recordings".to_string());
            }
            Some(kind) if kind != "bytea" => {
                sqlx::query(
                    "ALTER TABLE calls ALTER COLUMN recordings TYPE BYTEA \
                     USING convert_to(recordings::text, 'UTF8')",
                )
                .execute(&ctx.pool)
                .await?;
                changes.push(format!("widened recordings from {}", kind));
            }
            Some(_) => {}
        }

        for (column, definition) in [
            ("meeting_datetime", "TIMESTAMP NULL"),
            ("meeting_description", "TEXT NULL"),
            ("alternative_numbers", "TEXT NULL"),
        ] {
            if add_column_if_missing(&ctx.pool, "calls", column, definition).await? {
                changes.push(format!("added {}", column));
            }
        }

        if changes.is_empty() {
            Ok(StepOutcome::Skipped("call columns up to date".into()))
        } else {
            Ok(StepOutcome::Applied(changes.join("; ")))
        }
    }
}

/// Step 6: tenant column on shared `calls` / `agent_breaks`, backfilled from
/// the agent mapping wherever an agent number maps to exactly one tenant
pub struct CallBreakTenantColumns;

#[async_trait]
impl MigrationStep for CallBreakTenantColumns {
    fn name(&self) -> &'static str {
        "call_break_tenant_columns"
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
        let mut changes = Vec::new();

        for table in ["calls", "agent_breaks"] {
            if add_column_if_missing(&ctx.pool, table, "company_id", "INTEGER NULL").await? {
                changes.push(format!("added {}.company_id", table));
            }

            let filled = sqlx::query(&format!(
                r#"UPDATE {table} t SET company_id = m.company_id
                   FROM (
                       SELECT agent_number, MIN(company_id) AS company_id
                       FROM agents
                       WHERE company_id IS NOT NULL
                       GROUP BY agent_number
                       HAVING COUNT(DISTINCT company_id) = 1
                   ) m
                   WHERE t.company_id IS NULL AND t.agent_number = m.agent_number"#
            ))
            .execute(&ctx.pool)
            .await?
            .rows_affected();
            if filled > 0 {
                changes.push(format!("backfilled {} {} rows", filled, table));
            }

            let (unassigned,): (i64,) =
                sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE company_id IS NULL"))
                    .fetch_one(&ctx.pool)
                    .await?;
            if unassigned > 0 {
                warn!("{} {} rows have no unambiguous tenant and stay unassigned", unassigned, table);
            }
        }

        if changes.is_empty() {
            Ok(StepOutcome::Skipped("nothing to backfill".into()))
        } else {
            Ok(StepOutcome::Applied(changes.join("; ")))
        }
    }
}

/// Step 7: make sure every tenant has its tables. One tenant failing does not
/// stop the others.
pub struct ProvisionTenantTables;

#[async_trait]
impl MigrationStep for ProvisionTenantTables {
    fn name(&self) -> &'static str {
        "provision_tenant_tables"
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
        let ids: Vec<(i32,)> = sqlx::query_as("SELECT id FROM companies ORDER BY id")
            .fetch_all(&ctx.pool)
            .await?;
        if ids.is_empty() {
            return Ok(StepOutcome::Skipped("no tenants".into()));
        }

        let mut failed = Vec::new();
        for (id,) in &ids {
            let result = match TenantId::new((*id).into()) {
                Ok(tenant) => provisioner::ensure_tenant_tables(&ctx.pool, tenant).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!("Provisioning tenant {} failed: {}", id, e);
                failed.push(id.to_string());
            }
        }

        let ok = ids.len() - failed.len();
        if failed.is_empty() {
            Ok(StepOutcome::Applied(format!("{} tenants provisioned", ok)))
        } else {
            Ok(StepOutcome::Applied(format!(
                "{} tenants provisioned, failed: {}",
                ok,
                failed.join(", ")
            )))
        }
    }
}

/// Step 8: one admin username may administer several tenants
pub struct DropAdminUsernameUnique;

#[async_trait]
impl MigrationStep for DropAdminUsernameUnique {
    fn name(&self) -> &'static str {
        "drop_admin_username_unique"
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
        let indexes = introspect::unique_indexes(&ctx.pool, "companies").await?;
        let mut dropped = Vec::new();
        for index in indexes.iter().filter(|i| i.covers_exactly(&["admin_username"])) {
            drop_unique(&ctx.pool, "companies", index).await?;
            dropped.push(index.index_name.clone());
        }

        if dropped.is_empty() {
            Ok(StepOutcome::Skipped("admin_username is not unique".into()))
        } else {
            Ok(StepOutcome::Applied(format!("dropped {}", dropped.join(", "))))
        }
    }
}

/// Step 9: bootstrap master account, plus sample legacy rows when enabled
pub struct SeedBaseline;

/// Identifiers are digits only, matching what login accepts
const SAMPLE_USER_ID: &str = "1000000000";

const SAMPLE_AGENTS: [(&str, &str, &str, &str, &str, bool); 3] = [
    ("1000000001", "John Doe", "john.doe@company.com", "agentpass1", "Active", false),
    ("1000000002", "Jane Smith", "jane.smith@company.com", "agentpass2", "Active", true),
    ("1000000003", "Bob Johnson", "bob.johnson@company.com", "agentpass3", "Inactive", false),
];

const SAMPLE_CALLS: [(&str, &str, i32, &str); 5] = [
    ("1000000001", "+1234567890", 180, "Completed"),
    ("1000000002", "+1987654321", 245, "Completed"),
    ("1000000001", "+1122334455", 0, "Missed"),
    ("1000000002", "+1555666777", 320, "Completed"),
    ("1000000003", "+1888999000", 150, "Completed"),
];

const SAMPLE_BREAKS: [(&str, &str, &str, i32, &str); 3] = [
    ("1000000001", "2025-08-07 10:30:00", "2025-08-07 10:45:00", 900, "Coffee break"),
    ("1000000002", "2025-08-07 12:00:00", "2025-08-07 13:00:00", 3600, "Lunch break"),
    ("1000000001", "2025-08-07 15:00:00", "2025-08-07 15:15:00", 900, "Team meeting"),
];

impl SeedBaseline {
    async fn is_empty(pool: &PgPool, table: &str) -> Result<bool, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await?;
        Ok(count == 0)
    }

    async fn hash(&self, plain: &str, cost: u32) -> Result<String, DatabaseError> {
        password::hash_password(plain, cost)
            .await
            .map_err(|e| DatabaseError::MigrationStepFailed {
                step: self.name(),
                reason: e.to_string(),
            })
    }

    fn sample_time(value: &str) -> Result<NaiveDateTime, DatabaseError> {
        timestamp::parse(value).ok_or_else(|| DatabaseError::InvalidArgument(format!("bad sample timestamp {}", value)))
    }
}

#[async_trait]
impl MigrationStep for SeedBaseline {
    fn name(&self) -> &'static str {
        "seed_baseline"
    }

    async fn apply(&self, ctx: &mut MigrationContext) -> Result<StepOutcome, DatabaseError> {
        let pool = &ctx.pool;
        let mut seeded = Vec::new();

        if Self::is_empty(pool, "master_users").await? {
            if ctx.master_password.is_empty() {
                warn!("master_users is empty and no bootstrap master password is configured");
            } else {
                let hashed = self.hash(&ctx.master_password, ctx.bcrypt_cost).await?;
                sqlx::query("INSERT INTO master_users (username, password, name) VALUES ($1, $2, $3)")
                    .bind(&ctx.master_username)
                    .bind(hashed)
                    .bind("Master Administrator")
                    .execute(pool)
                    .await?;
                info!("Seeded bootstrap master user '{}'", ctx.master_username);
                seeded.push("master_users");
            }
        }

        if !ctx.seed_baseline {
            return Ok(if seeded.is_empty() {
                StepOutcome::Skipped("baseline seeding disabled".into())
            } else {
                StepOutcome::Applied(format!("seeded {}", seeded.join(", ")))
            });
        }

        let mut tx = pool.begin().await?;

        if Self::is_empty(pool, "users").await? {
            let hashed = self.hash("password", ctx.bcrypt_cost).await?;
            sqlx::query("INSERT INTO users (user_id, password, name, email) VALUES ($1, $2, $3, $4)")
                .bind(SAMPLE_USER_ID)
                .bind(hashed)
                .bind("Administrator")
                .bind("admin@company.com")
                .execute(&mut *tx)
                .await?;
            seeded.push("users");
        }

        if Self::is_empty(pool, "agents").await? {
            for (number, name, email, plain, status, is_admin) in SAMPLE_AGENTS {
                let hashed = self.hash(plain, ctx.bcrypt_cost).await?;
                sqlx::query(
                    "INSERT INTO agents (agent_number, name, email, password, status, is_admin)
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(number)
                .bind(name)
                .bind(email)
                .bind(hashed)
                .bind(status)
                .bind(is_admin)
                .execute(&mut *tx)
                .await?;
            }
            seeded.push("agents");
        }

        if Self::is_empty(pool, "calls").await? {
            for (agent, customer, duration, status) in SAMPLE_CALLS {
                sqlx::query(
                    "INSERT INTO calls (agent_number, customer_number, duration, call_status) VALUES ($1, $2, $3, $4)",
                )
                .bind(agent)
                .bind(customer)
                .bind(duration)
                .bind(status)
                .execute(&mut *tx)
                .await?;
            }
            seeded.push("calls");
        }

        if Self::is_empty(pool, "agent_breaks").await? {
            for (agent, start, end, seconds, remark) in SAMPLE_BREAKS {
                sqlx::query(
                    "INSERT INTO agent_breaks (agent_number, status, break_start, break_end, duration_seconds, remark)
                     VALUES ($1, 'Break', $2, $3, $4, $5)",
                )
                .bind(agent)
                .bind(Self::sample_time(start)?)
                .bind(Self::sample_time(end)?)
                .bind(seconds)
                .bind(remark)
                .execute(&mut *tx)
                .await?;
            }
            seeded.push("agent_breaks");
        }

        tx.commit().await?;

        if seeded.is_empty() {
            Ok(StepOutcome::Skipped("tables already populated".into()))
        } else {
            Ok(StepOutcome::Applied(format!("seeded {}", seeded.join(", "))))
        }
    }
}

/// Add `column` to `table` unless present. Returns whether it was added.
async fn add_column_if_missing(
    pool: &PgPool,
    table: &'static str,
    column: &'static str,
    definition: &'static str,
) -> Result<bool, DatabaseError> {
    if introspect::column_exists(pool, table, column).await? {
        return Ok(false);
    }
    sqlx::query(&format!(
        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
        table, column, definition
    ))
    .execute(pool)
    .await?;
    Ok(true)
}

/// Drop a unique index, going through its constraint when one owns it.
/// Foreign keys that depended on a global agent_number key go with it.
async fn drop_unique(pool: &PgPool, table: &'static str, index: &UniqueIndex) -> Result<(), DatabaseError> {
    let statement = match &index.constraint_name {
        Some(constraint) => format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {} CASCADE",
            table,
            DatabaseManager::quote_identifier(constraint)
        ),
        None => format!(
            "DROP INDEX IF EXISTS {} CASCADE",
            DatabaseManager::quote_identifier(&index.index_name)
        ),
    };
    sqlx::query(&statement).execute(pool).await?;
    info!("Dropped unique index {} on {}", index.index_name, table);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_tables_are_replayable() {
        assert!(BASE_TABLES.iter().all(|s| s.starts_with("CREATE TABLE IF NOT EXISTS")));
    }

    #[test]
    fn fresh_agents_table_is_keyed_per_tenant() {
        let agents = BASE_TABLES.iter().find(|s| s.contains("TABLE IF NOT EXISTS agents")).unwrap();
        assert!(agents.contains("UNIQUE (company_id, agent_number)"));
        assert!(!agents.contains("agent_number VARCHAR(20) NOT NULL UNIQUE"));
    }

    #[test]
    fn only_the_first_step_is_fatal() {
        let steps = standard_steps();
        assert!(steps[0].is_fatal());
        assert!(steps[1..].iter().all(|s| !s.is_fatal()));
    }

    #[test]
    fn sample_breaks_end_after_they_start() {
        for (_, start, end, seconds, _) in SAMPLE_BREAKS {
            let start = SeedBaseline::sample_time(start).unwrap();
            let end = SeedBaseline::sample_time(end).unwrap();
            assert_eq!((end - start).num_seconds(), i64::from(seconds));
        }
    }

    #[test]
    fn sample_accounts_pass_login_validation() {
        use crate::services::login_service::LoginRequest;

        let user = LoginRequest {
            user_id: Some(SAMPLE_USER_ID.to_string()),
            password: Some("password".to_string()),
            ..Default::default()
        };
        assert!(user.validate().is_ok());

        for (number, _, _, plain, _, _) in SAMPLE_AGENTS {
            let agent = LoginRequest {
                agent_number: Some(number.to_string()),
                password: Some(plain.to_string()),
                ..Default::default()
            };
            assert!(agent.validate().is_ok(), "{number}");
        }
        let known: Vec<&str> = SAMPLE_AGENTS.iter().map(|a| a.0).collect();
        assert!(SAMPLE_CALLS.iter().all(|c| known.contains(&c.0)));
        assert!(SAMPLE_BREAKS.iter().all(|b| known.contains(&b.0)));
    }
}
