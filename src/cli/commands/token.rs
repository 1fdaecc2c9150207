use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::{utils, OutputFormat};
use crate::config;

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[arg(long, help = "User id placed in `sub`")]
    pub user: i32,

    #[arg(long, help = "Company id the tenant resolver falls back to")]
    pub company: Option<i32>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let hours = args.hours.unwrap_or(security.jwt_expiry_hours);
    let claims = Claims::new(args.user, args.email, args.company, hours);
    let token = generate_jwt(&security.jwt_secret, &claims)?;

    match output_format {
        OutputFormat::Json => utils::output_success(
            &output_format,
            "Token generated",
            Some(json!({ "token": token, "expires_at": claims.exp })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
