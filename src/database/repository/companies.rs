use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::directory::COMPANY_COLUMNS;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{Company, CompanyStatus, PaymentStatus};
use crate::database::naming::{TenantEntity, TenantId};
use crate::database::provisioner;

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub admin_username: String,
    pub admin_password_hash: String,
    pub email: String,
    pub contact_no: Option<String>,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Default)]
pub struct CompanyChanges {
    pub name: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password_hash: Option<String>,
    pub email: Option<String>,
    pub contact_no: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub status: Option<CompanyStatus>,
}

impl CompanyChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.admin_username.is_none()
            && self.admin_password_hash.is_none()
            && self.email.is_none()
            && self.contact_no.is_none()
            && self.payment_status.is_none()
            && self.status.is_none()
    }

    /// Whether the tenant's admin agent row must be rewritten too
    pub fn touches_admin_agent(&self) -> bool {
        self.name.is_some() || self.admin_username.is_some() || self.admin_password_hash.is_some() || self.email.is_some()
    }
}

pub fn admin_agent_name(company_name: &str) -> String {
    format!("Admin - {}", company_name)
}

pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: i32) -> Result<Company, DatabaseError> {
        sqlx::query_as::<_, Company>(&format!("SELECT {} FROM companies WHERE id = $1", COMPANY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Company {} not found", id)))
    }

    pub async fn list_for_master(&self, master_id: i32) -> Result<Vec<Company>, DatabaseError> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE created_by_master_id = $1 ORDER BY created_at DESC, id DESC",
            COMPANY_COLUMNS
        ))
        .bind(master_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(companies)
    }

    /// Insert the company, provision its tables and seed its first admin agent, all or nothing
    pub async fn create(&self, master_id: i32, company: &NewCompany) -> Result<Company, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Company>(&format!(
            "INSERT INTO companies (name, admin_username, admin_password, email, contact_no, payment_status, status, created_by_master_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {}",
            COMPANY_COLUMNS
        ))
        .bind(&company.name)
        .bind(&company.admin_username)
        .bind(&company.admin_password_hash)
        .bind(&company.email)
        .bind(&company.contact_no)
        .bind(company.payment_status.as_str())
        .bind(CompanyStatus::Active.as_str())
        .bind(master_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_unique_violation(e, &[("admin_username", company.admin_username.as_str())]))?;

        let tenant = created.tenant_id()?;
        provisioner::provision_in(&mut tx, tenant).await?;

        let agents = DatabaseManager::quote_identifier(&TenantEntity::Agents.table_for(tenant));
        sqlx::query(&format!(
            "INSERT INTO {} (agent_number, name, email, password, status, is_admin)
             VALUES ($1, $2, $3, $4, 'Active', TRUE)",
            agents
        ))
        .bind(&company.admin_username)
        .bind(admin_agent_name(&company.name))
        .bind(&company.email)
        .bind(&company.admin_password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DatabaseError::from_unique_violation(
                e,
                &[("agent_number", company.admin_username.as_str()), ("email", company.email.as_str())],
            )
        })?;

        tx.commit().await?;
        tracing::info!("Created company {} with tenant tables for {}", created.id, tenant);
        Ok(created)
    }

    pub async fn update(&self, id: i32, changes: &CompanyChanges) -> Result<Company, DatabaseError> {
        let before = self.find(id).await?;
        if changes.is_empty() {
            return Ok(before);
        }
        let tenant = before.tenant_id()?;

        let mut tx = self.pool.begin().await?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE companies SET ");
        let mut set = builder.separated(", ");
        if let Some(name) = &changes.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(username) = &changes.admin_username {
            set.push("admin_username = ").push_bind_unseparated(username);
        }
        if let Some(hash) = &changes.admin_password_hash {
            set.push("admin_password = ").push_bind_unseparated(hash);
        }
        if let Some(email) = &changes.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        if let Some(contact) = &changes.contact_no {
            set.push("contact_no = ").push_bind_unseparated(contact);
        }
        if let Some(payment) = changes.payment_status {
            set.push("payment_status = ").push_bind_unseparated(payment.as_str());
        }
        if let Some(status) = changes.status {
            set.push("status = ").push_bind_unseparated(status.as_str());
        }
        builder.push(" WHERE id = ").push_bind(id);
        builder.push(format!(" RETURNING {}", COMPANY_COLUMNS));

        let updated = builder.build_query_as::<Company>().fetch_one(&mut *tx).await?;

        if changes.touches_admin_agent() {
            let agents = DatabaseManager::quote_identifier(&TenantEntity::Agents.table_for(tenant));
            let mut sync: QueryBuilder<Postgres> = QueryBuilder::new(format!("UPDATE {} SET ", agents));
            let mut set = sync.separated(", ");
            if changes.name.is_some() {
                set.push("name = ").push_bind_unseparated(admin_agent_name(&updated.name));
            }
            if let Some(username) = &changes.admin_username {
                set.push("agent_number = ").push_bind_unseparated(username);
            }
            if let Some(hash) = &changes.admin_password_hash {
                set.push("password = ").push_bind_unseparated(hash);
            }
            if let Some(email) = &changes.email {
                set.push("email = ").push_bind_unseparated(email);
            }
            // Only the seeded admin row; other admins in the tenant keep their own identity
            sync.push(" WHERE is_admin AND agent_number = ")
                .push_bind(before.admin_username.as_str());
            let synced = sync
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    DatabaseError::from_unique_violation(
                        e,
                        &[
                            ("agent_number", changes.admin_username.as_deref().unwrap_or_default()),
                            ("email", changes.email.as_deref().unwrap_or_default()),
                        ],
                    )
                })?
                .rows_affected();
            tracing::debug!("Synced {} admin agent row(s) for {}", synced, tenant);
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Mark the tenant fully closed; its users lose access from the next request
    pub async fn stop(&self, id: i32) -> Result<Company, DatabaseError> {
        let stopped = sqlx::query_as::<_, Company>(&format!(
            "UPDATE companies SET status = $1 WHERE id = $2 RETURNING {}",
            COMPANY_COLUMNS
        ))
        .bind(CompanyStatus::FullyClose.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Company {} not found", id)))?;
        tracing::info!("Stopped company {}", id);
        Ok(stopped)
    }

    pub async fn tenant_ids(&self) -> Result<Vec<TenantId>, DatabaseError> {
        let rows: Vec<(i32,)> = sqlx::query_as("SELECT id FROM companies ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|(id,)| TenantId::new(id.into())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_agent_follows_company_name() {
        assert_eq!(admin_agent_name("Acme"), "Admin - Acme");
    }

    #[test]
    fn status_only_changes_leave_admin_agent_alone() {
        let changes = CompanyChanges {
            status: Some(CompanyStatus::PartiallyClose),
            payment_status: Some(PaymentStatus::Unpaid),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        assert!(!changes.touches_admin_agent());

        let renamed = CompanyChanges {
            name: Some("Acme Two".into()),
            ..Default::default()
        };
        assert!(renamed.touches_admin_agent());
        assert!(CompanyChanges::default().is_empty());
    }
}
