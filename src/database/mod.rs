pub mod directory;
pub mod introspect;
pub mod manager;
pub mod migrator;
pub mod models;
pub mod naming;
pub mod provisioner;
pub mod repository;

pub use directory::{PgTenantDirectory, TenantDirectory};
pub use manager::{DatabaseError, DatabaseManager};
pub use migrator::run_startup_migration;
pub use naming::{table_name, TableSet, TenantContext, TenantEntity, TenantId};
pub use provisioner::ensure_tenant_tables;
