// handlers/protected/mod.rs - Tenant data endpoints
//
// Security Level: JWT (admin or agent)
// Middleware: jwt_auth_middleware, then validate_tenant_middleware, which
// injects the caller's TenantScope. `company` needs only the JWT so a
// blocked company can still read its own status.

pub mod agents;
pub mod breaks;
pub mod calls;
pub mod company;

pub use agents::{agent_delete, agent_put, agents_current_status_get, agents_get, agents_post};
pub use breaks::{agent_breaks_get, agent_breaks_post, break_close_put, breaks_post};
pub use calls::{call_alternative_numbers_put, call_custom_put, calls_get, calls_post};
pub use company::company_get;
