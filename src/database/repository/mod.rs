// Tenant-scoped repositories. Each one is bound to a resolved TableSet and never
// names a physical table on its own.

pub mod agents;
pub mod breaks;
pub mod calls;
pub mod companies;

pub use agents::{AgentChanges, AgentRepository, NewAgent};
pub use breaks::{AgentCurrentStatus, BreakRepository, NewBreak};
pub use calls::{CallAnnotation, CallFilter, CallRepository, NewCall};
pub use companies::{CompanyChanges, CompanyRepository, NewCompany};
