// Maps verified token claims to the table set a request may touch.
// Runs before every tenant data route; a blocked tenant is refused here, before any read or write.

use serde::Serialize;

use crate::auth::Claims;
use crate::database::directory::TenantDirectory;
use crate::database::manager::DatabaseError;
use crate::database::models::Role;
use crate::database::naming::{TableSet, TenantContext, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    TenantDisabled,
    MasterHasNoTenantData,
    RoleNotPermitted,
    LegacyReadOnly,
}

impl DenyReason {
    pub fn message(self) -> &'static str {
        match self {
            DenyReason::TenantDisabled => "Company account is disabled. Please contact support.",
            DenyReason::MasterHasNoTenantData => "Master accounts do not operate on company data",
            DenyReason::RoleNotPermitted => "You do not have permission to perform this action",
            DenyReason::LegacyReadOnly => "Legacy accounts are read-only; log in with a company account",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("access denied: {}", .0.message())]
    Denied(DenyReason),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What the resolver hands to the routing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedContext {
    pub tenant_id: Option<TenantId>,
    pub read_only_legacy: bool,
}

/// Resolved request scope: who is calling and which tables they are bound to
#[derive(Debug, Clone)]
pub struct TenantScope {
    pub claims: Claims,
    pub tables: TableSet,
}

impl TenantScope {
    pub fn context(&self) -> TenantContext {
        self.tables.context
    }

    pub fn resolved(&self) -> ResolvedContext {
        ResolvedContext {
            tenant_id: self.context().tenant_id(),
            read_only_legacy: self.tables.is_legacy(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.claims.is_admin()
    }

    /// Every write goes to tenant tables; the shared tables are read-only
    pub fn ensure_writable(&self) -> Result<(), AccessError> {
        if self.tables.is_legacy() {
            return Err(AccessError::Denied(DenyReason::LegacyReadOnly));
        }
        Ok(())
    }

    pub fn require_admin(&self) -> Result<(), AccessError> {
        if !self.is_admin() {
            return Err(AccessError::Denied(DenyReason::RoleNotPermitted));
        }
        Ok(())
    }

    /// Admins see the whole tenant; agents see only their own rows
    pub fn agent_filter(&self) -> Option<&str> {
        if self.is_admin() {
            None
        } else {
            self.claims.agent_number.as_deref()
        }
    }

    pub fn acting_agent(&self) -> Option<&str> {
        self.claims.agent_number.as_deref()
    }
}

pub async fn resolve_tenant_scope(
    claims: &Claims,
    directory: &dyn TenantDirectory,
) -> Result<TenantScope, AccessError> {
    match claims.role {
        Role::Master => return Err(AccessError::Denied(DenyReason::MasterHasNoTenantData)),
        Role::Agent if claims.agent_number.is_none() => {
            return Err(AccessError::Denied(DenyReason::RoleNotPermitted));
        }
        _ => {}
    }

    let context = match claims.company_id {
        None => {
            tracing::debug!("User {} has no company; using legacy tables", claims.user_id);
            TenantContext::Legacy
        }
        Some(id) => {
            let tenant = TenantId::new(id.into())?;
            let company = directory
                .find_company(tenant)
                .await?
                .ok_or_else(|| AccessError::NotFound(format!("Company {} not found", tenant)))?;
            if company.is_blocked() {
                tracing::warn!(
                    "Denied request for company {} (status {}, payment {})",
                    tenant,
                    company.status,
                    company.payment_status
                );
                return Err(AccessError::Denied(DenyReason::TenantDisabled));
            }
            TenantContext::Tenant(tenant)
        }
    };

    tracing::debug!("Resolved user {} ({}) to {:?}", claims.user_id, claims.role, context);
    Ok(TenantScope {
        claims: claims.clone(),
        tables: TableSet::for_context(context),
    })
}
