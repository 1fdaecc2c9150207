use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Default base URL, overridable with `CRM_API_URL`
pub fn default_base_url() -> String {
    std::env::var("CRM_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Join a base URL and an absolute path without doubling the slash
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print an API response body; text mode shows `data` only
pub fn output_response(output_format: &OutputFormat, body: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(body)?),
        OutputFormat::Text => {
            let shown = body.get("data").unwrap_or(body);
            println!("{}", serde_json::to_string_pretty(shown)?);
        }
    }
    Ok(())
}

/// `message` of a failure envelope, falling back to the HTTP status
pub fn failure_message(status: reqwest::StatusCode, body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .map(|message| format!("{} ({})", message, status))
        .unwrap_or_else(|| format!("request failed with {}", status))
}
