use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

pub const QUERY_TOO_SHORT: &str = "Search query must be at least 2 characters long";
pub const INVALID_ENTITY_TYPE: &str = "Invalid entity type. Must be one of: accounts, contacts, opportunities";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Accounts,
    Contacts,
    Opportunities,
}

impl EntityType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accounts" => Some(Self::Accounts),
            "contacts" => Some(Self::Contacts),
            "opportunities" => Some(Self::Opportunities),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::Contacts => "contacts",
            Self::Opportunities => "opportunities",
        }
    }
}

/// Trimmed query, or `None` when it is shorter than two characters
pub fn search_term(query: &Option<String>) -> Option<String> {
    let term = query.as_deref()?.trim();
    (term.chars().count() >= 2).then(|| term.to_string())
}

#[derive(Debug, Clone, FromRow)]
pub struct SearchRow {
    pub entity_type: String,
    pub id: Uuid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub details: Value,
}

/// One global-search result; entity-specific columns are flattened in
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub entity_type: String,
    pub id: Uuid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl From<SearchRow> for SearchHit {
    fn from(row: SearchRow) -> Self {
        let details = match row.details {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            entity_type: row.entity_type,
            id: row.id,
            display_name: row.display_name,
            created_at: row.created_at,
            details,
        }
    }
}

/// Exact display-name matches first, then newest, then id
pub fn rank(hits: &mut [SearchHit], query: &str) {
    let query = query.trim().to_lowercase();
    let exact = |hit: &SearchHit| hit.display_name.trim().to_lowercase() == query;
    hits.sort_by(|a, b| match (exact(a), exact(b)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)),
    });
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalSearchParams {
    pub query: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalSearchResult {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<SearchHit>,
}

/// Body of the POST search endpoints. `F` is the resource's filter object;
/// the generic `/search/:entity_type` route reads it as raw JSON first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest<F = Value> {
    pub query: Option<String>,
    #[serde(default)]
    pub filters: F,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
