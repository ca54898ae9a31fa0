use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::migrator::StepStatus;
use crate::database::{ensure_tenant_tables, run_startup_migration, DatabaseManager, TenantId};

pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool().await?;
    let report = run_startup_migration(&pool).await?;

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "success": report.is_clean(),
                    "steps": report.steps
                }))?
            );
        }
        OutputFormat::Text => {
            println!("{:<36} {:<8} {:>8}  {}", "STEP", "STATUS", "MS", "DETAIL");
            println!("{}", "-".repeat(90));
            for step in &report.steps {
                let status = match step.status {
                    StepStatus::Applied => "applied",
                    StepStatus::Skipped => "skipped",
                    StepStatus::Failed => "FAILED",
                };
                println!("{:<36} {:<8} {:>8}  {}", step.name, status, step.elapsed_ms, step.detail);
            }
            let failed = report.failures().count();
            if failed == 0 {
                println!("✓ Migration finished");
            } else {
                println!("Migration finished with {} failed step(s)", failed);
            }
        }
    }

    DatabaseManager::close().await;
    Ok(())
}

pub async fn provision(tenant_id: i64, output_format: OutputFormat) -> anyhow::Result<()> {
    let tenant = TenantId::new(tenant_id)?;
    let pool = DatabaseManager::pool().await?;
    ensure_tenant_tables(&pool, tenant).await?;
    DatabaseManager::close().await;

    output_success(
        &output_format,
        &format!("Tenant tables ready for tenant {}", tenant),
        Some(json!({ "tenant_id": tenant.get() })),
    )
}
