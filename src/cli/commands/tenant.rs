use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::provisioner::tenant_tables_present;
use crate::database::repository::CompanyRepository;
use crate::database::{table_name as physical_table_name, DatabaseManager};

pub fn table_name(entity: &str, tenant_id: i64, output_format: OutputFormat) -> anyhow::Result<()> {
    let table = physical_table_name(entity, tenant_id)?;
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "entity": entity,
                    "tenant_id": tenant_id,
                    "table": table
                }))?
            );
        }
        OutputFormat::Text => println!("{}", table),
    }
    Ok(())
}

pub async fn list(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool().await?;
    let tenant_ids = CompanyRepository::new(pool.clone()).tenant_ids().await?;

    if tenant_ids.is_empty() {
        DatabaseManager::close().await;
        return output_empty_collection(&output_format, "tenants", "No tenants found");
    }

    let mut rows = Vec::with_capacity(tenant_ids.len());
    for tenant in tenant_ids {
        let tables = tenant_tables_present(&pool, tenant).await?;
        rows.push((tenant, tables));
    }
    DatabaseManager::close().await;

    match output_format {
        OutputFormat::Json => {
            let tenants: Vec<_> = rows
                .iter()
                .map(|(tenant, tables)| {
                    json!({
                        "tenant_id": tenant.get(),
                        "tables": tables
                            .iter()
                            .map(|(table, exists)| json!({ "table": table, "exists": exists }))
                            .collect::<Vec<_>>(),
                        "provisioned": tables.iter().all(|(_, exists)| *exists)
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "tenants": tenants }))?);
        }
        OutputFormat::Text => {
            println!("{:<10} {:<12} {}", "TENANT", "PROVISIONED", "TABLES");
            println!("{}", "-".repeat(70));
            for (tenant, tables) in &rows {
                let provisioned = tables.iter().all(|(_, exists)| *exists);
                let listing: Vec<String> = tables
                    .iter()
                    .map(|(table, exists)| format!("{}={}", table, yes_no(*exists)))
                    .collect();
                println!("{:<10} {:<12} {}", tenant.get(), yes_no(provisioned), listing.join(" "));
            }
        }
    }
    Ok(())
}
