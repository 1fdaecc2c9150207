//! Turns the tenant hints carried by a request into one tenant id.
//!
//! First match wins:
//! 1. `tenantId` in the JSON body; the company must exist.
//! 2. `company` in the query string; the company must exist and its tenant
//!    row is created on first use.
//! 3. `company_id` of the authenticated user, used as is.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::database::DatabaseError;
use crate::repository::TenantDirectory;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Tenant ID is required. Please provide tenantId in request body, company parameter, or ensure user has company_id.")]
    Required,

    #[error("Invalid tenant ID: {0}")]
    InvalidId(String),

    #[error("Company with ID {0} not found")]
    CompanyNotFound(i32),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The raw tenant hints of one request
#[derive(Debug, Clone, Default)]
pub struct TenantSource {
    pub body_tenant_id: Option<Value>,
    pub query_company: Option<String>,
    pub user_company_id: Option<i32>,
}

/// Which hint produced the tenant id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedFrom {
    Body,
    Company,
    User,
}

impl fmt::Display for ResolvedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolvedFrom::Body => "body",
            ResolvedFrom::Company => "company",
            ResolvedFrom::User => "user",
        };
        f.write_str(name)
    }
}

/// Request extension inserted by the tenant middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: i32,
    pub source: ResolvedFrom,
}

/// Integer from a JSON number or a numeric string. `Ok(None)` for null,
/// `false`, the number zero and blank strings.
fn parse_tenant_value(value: &Value) -> Result<Option<i32>, TenantError> {
    match value {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::Number(n) if n.as_f64() == Some(0.0) => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| TenantError::InvalidId(n.to_string())),
        Value::String(s) => parse_tenant_text(s),
        other => Err(TenantError::InvalidId(other.to_string())),
    }
}

fn parse_tenant_text(raw: &str) -> Result<Option<i32>, TenantError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i32>()
        .map(Some)
        .map_err(|_| TenantError::InvalidId(raw.to_string()))
}

#[derive(Clone)]
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self { directory }
    }

    pub async fn resolve(&self, source: &TenantSource) -> Result<TenantContext, TenantError> {
        if let Some(raw) = &source.body_tenant_id {
            if let Some(company_id) = parse_tenant_value(raw)? {
                if !self.directory.company_exists(company_id).await? {
                    return Err(TenantError::CompanyNotFound(company_id));
                }
                return Ok(self.resolved(company_id, ResolvedFrom::Body));
            }
        }

        if let Some(raw) = &source.query_company {
            if let Some(company_id) = parse_tenant_text(raw)? {
                let tenant_id = self.tenant_for_company(company_id).await?;
                return Ok(self.resolved(tenant_id, ResolvedFrom::Company));
            }
        }

        if let Some(company_id) = source.user_company_id.filter(|id| *id != 0) {
            return Ok(self.resolved(company_id, ResolvedFrom::User));
        }

        Err(TenantError::Required)
    }

    fn resolved(&self, tenant_id: i32, source: ResolvedFrom) -> TenantContext {
        debug!(tenant_id, %source, "Resolved tenant");
        TenantContext { tenant_id, source }
    }

    /// Existing tenant of the company, or a new one mirroring it
    async fn tenant_for_company(&self, company_id: i32) -> Result<i32, TenantError> {
        if !self.directory.company_exists(company_id).await? {
            return Err(TenantError::CompanyNotFound(company_id));
        }
        if let Some(tenant) = self.directory.find_tenant(company_id).await? {
            return Ok(tenant.id);
        }

        match self.directory.create_tenant_from_company(company_id).await? {
            Some(tenant) => {
                info!(tenant_id = tenant.id, name = %tenant.name, "Created tenant for company");
                Ok(tenant.id)
            }
            // Lost the race to a concurrent request; its row is there now
            None => match self.directory.find_tenant(company_id).await? {
                Some(tenant) => Ok(tenant.id),
                None => Err(TenantError::CompanyNotFound(company_id)),
            },
        }
    }
}
