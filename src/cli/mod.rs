pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "callcenter")]
#[command(about = "Operator CLI for the call-center backend: schema migration and tenant provisioning")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the startup schema migration against DATABASE_URL")]
    Migrate,

    #[command(about = "Create the per-tenant tables for a company if they are missing")]
    Provision {
        #[arg(help = "Company id")]
        tenant_id: i64,
    },

    #[command(about = "Print the physical table name for a tenant entity")]
    TableName {
        #[arg(help = "Base entity: agents, calls or agent_breaks")]
        entity: String,
        #[arg(help = "Company id")]
        tenant_id: i64,
    },

    #[command(about = "List tenants and whether their tables exist")]
    Tenants,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::schema::migrate(output_format).await,
        Commands::Provision { tenant_id } => commands::schema::provision(tenant_id, output_format).await,
        Commands::TableName { entity, tenant_id } => commands::tenant::table_name(&entity, tenant_id, output_format),
        Commands::Tenants => commands::tenant::list(output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::parse_from(["callcenter", "--json", "table-name", "calls", "7"]);
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Commands::TableName { entity, tenant_id } => {
                assert_eq!(entity, "calls");
                assert_eq!(tenant_id, 7);
            }
            _ => panic!("expected table-name"),
        }

        let cli = Cli::parse_from(["callcenter", "provision", "12"]);
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Text));
        assert!(matches!(cli.command, Commands::Provision { tenant_id: 12 }));
    }
}
