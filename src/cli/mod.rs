pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "crm")]
#[command(about = "CRM CLI - operator tools for the CRM API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Mint a bearer token signed with the configured JWT secret")]
    Token(commands::token::TokenArgs),

    #[command(about = "Check server health from the /health endpoint")]
    Health(commands::health::HealthArgs),

    #[command(about = "Show the tenant the API resolves for a token")]
    Tenant(commands::tenant::TenantArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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
        Commands::Token(args) => commands::token::handle(args, output_format),
        Commands::Health(args) => commands::health::handle(args, output_format).await,
        Commands::Tenant(args) => commands::tenant::handle(args, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_json_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["crm", "token", "--user", "7", "--json"]).unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Token(ref args) if args.user == 7));
    }

    #[test]
    fn tenant_requires_a_token() {
        assert!(Cli::try_parse_from(["crm", "tenant"]).is_err());
        assert!(Cli::try_parse_from(["crm", "tenant", "--token", "abc", "--company", "3"]).is_ok());
    }
}
