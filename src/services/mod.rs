pub mod agent_service;
pub mod break_service;
pub mod call_service;
pub mod company_service;
pub mod login_service;
pub mod tenant_resolver;

pub use agent_service::AgentService;
pub use break_service::BreakService;
pub use call_service::CallService;
pub use company_service::{normalize_admin_username, CompanyError, CompanyService};
pub use login_service::{LoginError, LoginOutcome, LoginRequest, LoginService};
pub use tenant_resolver::{resolve_tenant_scope, AccessError, DenyReason, TenantScope};

use crate::auth::password::PasswordError;
use crate::database::manager::DatabaseError;

/// Failure of a tenant-scoped operation
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}
