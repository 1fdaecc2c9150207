use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use super::{clean, clean_nullable, double_option};
use super::{Account, OpportunityContactView};
use crate::database::query_builder::Assignments;

pub const NOT_FOUND: &str = "Opportunity not found";
pub const STAGE_NOT_FOUND: &str = "Stage not found";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Opportunity {
    pub id: Uuid,
    pub tenant_id: i32,
    pub name: String,
    pub account_id: Uuid,
    pub amount: Option<Decimal>,
    pub stage: Option<String>,
    pub stage_id: Option<Uuid>,
    pub expected_close_date: Option<NaiveDate>,
    pub actual_close_date: Option<NaiveDate>,
    pub probability: Option<i32>,
    pub description: Option<String>,
    pub lead_source: Option<String>,
    pub custom_fields: Value,
    pub owner_id: Option<i32>,
    pub created_by: Option<i32>,
    pub updated_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOpportunity {
    pub name: Option<String>,
    pub account_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub stage_id: Option<Uuid>,
    pub expected_close_date: Option<NaiveDate>,
    pub actual_close_date: Option<NaiveDate>,
    pub probability: Option<i32>,
    pub description: Option<String>,
    pub lead_source: Option<String>,
    pub custom_fields: Option<Value>,
    pub owner_id: Option<i32>,
}

impl NewOpportunity {
    /// Row without stage information; the repository fills `stage`,
    /// `stage_id` and `probability` from the stage it resolves
    pub fn into_opportunity(self, tenant_id: i32, actor: Option<i32>) -> Option<Opportunity> {
        let name = clean(&self.name)?;
        let account_id = self.account_id?;
        let now = Utc::now();
        Some(Opportunity {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            account_id,
            amount: self.amount,
            stage: None,
            stage_id: self.stage_id,
            expected_close_date: self.expected_close_date,
            actual_close_date: self.actual_close_date,
            probability: self.probability,
            description: clean(&self.description),
            lead_source: clean(&self.lead_source),
            custom_fields: self.custom_fields.unwrap_or_else(|| Value::Object(Default::default())),
            owner_id: self.owner_id,
            created_by: actor,
            updated_by: actor,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunityPatch {
    pub name: Option<String>,
    pub account_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub amount: Option<Option<Decimal>>,
    pub stage_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub expected_close_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub actual_close_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub probability: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub lead_source: Option<Option<String>>,
    pub custom_fields: Option<Value>,
    #[serde(default, deserialize_with = "double_option")]
    pub owner_id: Option<Option<i32>>,
}

impl OpportunityPatch {
    pub fn normalized(&self) -> Self {
        Self {
            name: clean(&self.name),
            description: clean_nullable(&self.description),
            lead_source: clean_nullable(&self.lead_source),
            ..self.clone()
        }
    }

    /// Plain column assignments. A stage change is applied separately so the
    /// stage name and probability always come from the stage row.
    pub fn assignments(&self) -> Assignments {
        let mut set = Assignments::new();
        set.set_some("name", &self.name)
            .set_some("account_id", &self.account_id)
            .set_nullable("amount", &self.amount)
            .set_nullable("expected_close_date", &self.expected_close_date)
            .set_nullable("actual_close_date", &self.actual_close_date)
            .set_nullable("probability", &self.probability)
            .set_nullable("description", &self.description)
            .set_nullable("lead_source", &self.lead_source)
            .set_some("custom_fields", &self.custom_fields)
            .set_nullable("owner_id", &self.owner_id);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty() && self.stage_id.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunityFilters {
    pub search: Option<String>,
    #[serde(alias = "filters[stage_id]")]
    pub stage_id: Option<String>,
    #[serde(alias = "filters[account_id]")]
    pub account_id: Option<String>,
    #[serde(alias = "filters[min_amount]")]
    pub min_amount: Option<String>,
    #[serde(alias = "filters[max_amount]")]
    pub max_amount: Option<String>,
    #[serde(alias = "filters[expected_close_date_from]")]
    pub expected_close_date_from: Option<String>,
    #[serde(alias = "filters[expected_close_date_to]")]
    pub expected_close_date_to: Option<String>,
}

/// Filter values after parsing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOpportunityFilters {
    pub search: Option<String>,
    pub stage_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub close_from: Option<NaiveDate>,
    pub close_to: Option<NaiveDate>,
}

fn parse_field<T: FromStr>(name: &str, value: &Option<String>) -> Result<Option<T>, String> {
    match clean(value) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("Invalid value for {}: {}", name, raw)),
    }
}

impl OpportunityFilters {
    pub fn parse(&self) -> Result<ParsedOpportunityFilters, String> {
        Ok(ParsedOpportunityFilters {
            search: clean(&self.search),
            stage_id: parse_field("stage_id", &self.stage_id)?,
            account_id: parse_field("account_id", &self.account_id)?,
            min_amount: parse_field("min_amount", &self.min_amount)?,
            max_amount: parse_field("max_amount", &self.max_amount)?,
            close_from: parse_field("expected_close_date_from", &self.expected_close_date_from)?,
            close_to: parse_field("expected_close_date_to", &self.expected_close_date_to)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunitySearchFilters {
    pub stage_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
}

/// Opportunity joined with its account and stage names
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OpportunitySummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub opportunity: Opportunity,
    pub account_name: Option<String>,
    pub stage_name: Option<String>,
    pub weight_percentage: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct OpportunityDependents {
    pub contact_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityRelations {
    pub opportunity: Opportunity,
    pub account: Option<Account>,
    pub contacts: Vec<OpportunityContactView>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StageHistoryEntry {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub stage_id: Uuid,
    pub from_stage_id: Option<Uuid>,
    pub stage_name: Option<String>,
    pub from_stage_name: Option<String>,
    pub entered_at: DateTime<Utc>,
    pub created_by: Option<i32>,
    pub reason: Option<String>,
}

/// Body of `PUT /opportunities/stage-history/:id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageMove {
    pub stage_id: Option<Uuid>,
    pub reason: Option<String>,
}

impl StageMove {
    pub fn reason(&self) -> Option<String> {
        clean(&self.reason)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageMoved {
    pub history_entry: StageHistoryEntry,
    pub opportunity_updated: bool,
}

/// One stage column of the pipeline board
#[derive(Debug, Clone, Serialize)]
pub struct PipelineColumn {
    pub stage: super::Stage,
    pub opportunities: Vec<OpportunitySummary>,
}

impl PipelineColumn {
    /// One column per stage in the given order. Rows whose stage is not in
    /// `stages` are dropped.
    pub fn group(stages: Vec<super::Stage>, rows: Vec<OpportunitySummary>) -> Vec<PipelineColumn> {
        let mut columns: Vec<PipelineColumn> = stages
            .into_iter()
            .map(|stage| PipelineColumn { stage, opportunities: Vec::new() })
            .collect();
        for row in rows {
            let Some(stage_id) = row.opportunity.stage_id else { continue };
            if let Some(column) = columns.iter_mut().find(|c| c.stage.id == stage_id) {
                column.opportunities.push(row);
            }
        }
        columns
    }
}
