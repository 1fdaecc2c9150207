use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Open opportunity owned by the current user, as shown on the home dashboard
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DashboardOpportunity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub probability: Option<i32>,
    pub stage_id: Option<Uuid>,
    pub expected_close_date: Option<NaiveDate>,
    pub actual_close_date: Option<NaiveDate>,
    pub account_id: Uuid,
    pub owner_id: Option<i32>,
    pub tenant_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub account_name: Option<String>,
    pub stage_name: Option<String>,
    pub is_stage_closed: bool,
    pub related_contacts: Value,
    #[sqlx(skip)]
    pub stage_color: String,
}

/// Badge classes keyed by stage name
pub fn stage_badge(stage_name: Option<&str>) -> &'static str {
    match stage_name.map(str::to_lowercase).as_deref() {
        Some("proposal") => "bg-blue-100 text-blue-800",
        Some("negotiation") => "bg-yellow-100 text-yellow-800",
        Some("qualification") | Some("won") => "bg-green-100 text-green-800",
        Some("lost") => "bg-red-100 text-red-800",
        _ => "bg-gray-100 text-gray-800",
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BoardSummary {
    pub total_value: Decimal,
    pub stages_breakdown: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityBoard {
    pub opportunities: Vec<DashboardOpportunity>,
    pub total_count: usize,
    pub summary: BoardSummary,
}

impl OpportunityBoard {
    pub fn from_rows(mut rows: Vec<DashboardOpportunity>) -> Self {
        let mut summary = BoardSummary::default();
        for row in rows.iter_mut() {
            row.stage_color = stage_badge(row.stage_name.as_deref()).to_string();
            summary.total_value += row.amount.unwrap_or_default();
            let stage = row.stage_name.clone().unwrap_or_else(|| "Unknown".to_string());
            *summary.stages_breakdown.entry(stage).or_insert(0) += 1;
        }

        Self {
            total_count: rows.len(),
            opportunities: rows,
            summary,
        }
    }
}
