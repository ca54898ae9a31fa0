// Per-tenant table provisioning. Idempotent and transactional.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use super::introspect;
use super::manager::{DatabaseError, DatabaseManager};
use super::naming::{TenantEntity, TenantId};

/// Ordered DDL that brings `agents_{id}`, `calls_{id}` and `agent_breaks_{id}` into existence.
/// Every statement is `IF NOT EXISTS`, so replaying the list is a no-op.
pub fn tenant_table_ddl(tenant: TenantId) -> Vec<String> {
    let agents = TenantEntity::Agents.table_for(tenant);
    let calls = TenantEntity::Calls.table_for(tenant);
    let breaks = TenantEntity::AgentBreaks.table_for(tenant);
    let q = DatabaseManager::quote_identifier;

    vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                id SERIAL PRIMARY KEY,
                agent_number VARCHAR(20) NOT NULL,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(100) NOT NULL,
                password VARCHAR(255) NOT NULL,
                status VARCHAR(10) NOT NULL DEFAULT 'Active'
                    CHECK (status IN ('Active', 'Inactive', 'Removed')),
                is_admin BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT {agent_key} UNIQUE (agent_number),
                CONSTRAINT {email_key} UNIQUE (email)
            )"#,
            table = q(&agents),
            agent_key = q(&format!("{}_agent_number_key", agents)),
            email_key = q(&format!("{}_email_key", agents)),
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
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
                meeting_description TEXT
            )"#,
            table = q(&calls),
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                id SERIAL PRIMARY KEY,
                agent_number VARCHAR(20) NOT NULL,
                status VARCHAR(10) NOT NULL CHECK (status IN ('Working', 'Break')),
                break_start TIMESTAMP,
                break_end TIMESTAMP,
                duration_seconds INTEGER,
                remark TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
            table = q(&breaks),
        ),
        create_index(&calls, "agent_number"),
        create_index(&calls, "timestamp"),
        create_index(&breaks, "agent_number"),
        create_index(&breaks, "break_start"),
    ]
}

fn create_index(table: &str, column: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        DatabaseManager::quote_identifier(&format!("idx_{}_{}", table, column)),
        DatabaseManager::quote_identifier(table),
        DatabaseManager::quote_identifier(column),
    )
}

/// Run the tenant DDL inside a caller-owned transaction
pub async fn provision_in(tx: &mut Transaction<'_, Postgres>, tenant: TenantId) -> Result<(), DatabaseError> {
    for statement in tenant_table_ddl(tenant) {
        debug!("Provisioning tenant {}: {}", tenant, statement.lines().next().unwrap_or_default());
        sqlx::query(&statement).execute(&mut **tx).await?;
    }
    Ok(())
}

/// Ensure the three tenant tables exist. Commits on success; on failure the
/// transaction is rolled back and the error returned to the caller.
pub async fn ensure_tenant_tables(pool: &PgPool, tenant: TenantId) -> Result<(), DatabaseError> {
    let mut tx = pool.begin().await?;
    provision_in(&mut tx, tenant).await?;
    tx.commit().await?;
    info!("Tenant tables ensured for tenant {}", tenant);
    Ok(())
}

/// Which of the tenant's tables exist
pub async fn tenant_tables_present(pool: &PgPool, tenant: TenantId) -> Result<Vec<(String, bool)>, DatabaseError> {
    let mut present = Vec::with_capacity(TenantEntity::ALL.len());
    for entity in TenantEntity::ALL {
        let table = entity.table_for(tenant);
        let exists = introspect::table_exists(pool, &table).await?;
        present.push((table, exists));
    }
    Ok(present)
}
