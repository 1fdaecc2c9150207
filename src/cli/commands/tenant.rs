use clap::Args;
use serde_json::Value;

use crate::cli::{utils, OutputFormat};

#[derive(Debug, Args)]
pub struct TenantArgs {
    #[arg(long, help = "Server base URL (defaults to CRM_API_URL or http://localhost:3000)")]
    pub url: Option<String>,

    #[arg(long, help = "Bearer token, e.g. from `crm token`")]
    pub token: String,

    #[arg(long, help = "Resolve through ?company=<id> (creates the tenant on first use)")]
    pub company: Option<i32>,
}

pub async fn handle(args: TenantArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let base = args.url.unwrap_or_else(utils::default_base_url);

    let mut request = reqwest::Client::new()
        .get(utils::endpoint(&base, "/api/crm/tenant"))
        .bearer_auth(&args.token);
    if let Some(company) = args.company {
        request = request.query(&[("company", company)]);
    }

    let response = request.send().await?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        anyhow::bail!(utils::failure_message(status, &body));
    }
    utils::output_response(&output_format, &body)
}
