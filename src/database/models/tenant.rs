use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{clean, clean_nullable, double_option};
use crate::database::query_builder::Assignments;

pub const NOT_FOUND: &str = "Tenant not found";

/// Isolation boundary; `id` mirrors the owning company's id
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i32,
    pub name: String,
    pub subdomain: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Externally owned company row a tenant is created from
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: i32,
    pub name: String,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
}

impl Tenant {
    /// Tenant row mirroring `company`, as written by the lazy creation path
    pub fn from_company(company: &Company) -> Self {
        let now = Utc::now();
        Self {
            id: company.id,
            name: company.name.clone(),
            subdomain: company.domain.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub subdomain: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl TenantPatch {
    pub fn normalized(&self) -> Self {
        Self {
            name: clean(&self.name),
            subdomain: clean_nullable(&self.subdomain),
            is_active: self.is_active,
        }
    }

    pub fn assignments(&self) -> Assignments {
        let mut set = Assignments::new();
        set.set_some("name", &self.name)
            .set_nullable("subdomain", &self.subdomain)
            .set_some("is_active", &self.is_active);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }
}

/// Body of `PUT /tenant/settings`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantSettingsUpdate {
    #[serde(default)]
    pub settings: TenantPatch,
}

/// Tenant columns with the company profile alongside
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TenantSettings {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub tenant: Tenant,
    pub company_name: Option<String>,
    pub company_domain: Option<String>,
    pub company_industry: Option<String>,
    pub company_size: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, FromRow, PartialEq, Eq)]
pub struct TenantStats {
    pub account_count: i64,
    pub contact_count: i64,
    pub opportunity_count: i64,
    pub stage_count: i64,
    pub custom_field_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantOverview {
    pub tenant: Tenant,
    pub company: Option<Company>,
    pub stats: TenantStats,
}

/// Short rows for the "recent" panels of the tenant dashboard
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecentItem {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PipelineSummaryRow {
    pub stage_id: Uuid,
    pub stage_name: String,
    pub stage_color: Option<String>,
    pub opportunity_count: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Copy, Default, Serialize, FromRow, PartialEq, Eq)]
pub struct QuickStats {
    pub total_accounts: i64,
    pub total_contacts: i64,
    pub total_opportunities: i64,
    pub total_pipeline_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantDashboard {
    pub recent_accounts: Vec<RecentItem>,
    pub recent_contacts: Vec<RecentItem>,
    pub recent_opportunities: Vec<RecentItem>,
    pub pipeline_summary: Vec<PipelineSummaryRow>,
    pub quick_stats: QuickStats,
}
