use clap::Args;
use serde_json::Value;

use crate::cli::{utils, OutputFormat};

#[derive(Debug, Args)]
pub struct HealthArgs {
    #[arg(long, help = "Server base URL (defaults to CRM_API_URL or http://localhost:3000)")]
    pub url: Option<String>,
}

pub async fn handle(args: HealthArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let base = args.url.unwrap_or_else(utils::default_base_url);
    let response = reqwest::get(utils::endpoint(&base, "/health")).await?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    match output_format {
        OutputFormat::Json => utils::output_response(&output_format, &body)?,
        OutputFormat::Text => {
            let state = body.get("status").and_then(Value::as_str).unwrap_or("unknown");
            println!("{} ({})", state, status);
        }
    }

    if !status.is_success() {
        anyhow::bail!("server reported {}", status);
    }
    Ok(())
}
