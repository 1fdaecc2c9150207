//! Relationship types are not stored anywhere of their own: a type exists
//! while some edge carries its name. Account edges keep it in
//! `account_relationships.relationship_type`, account links in
//! `account_contacts.relationship_type`, opportunity links in
//! `opportunity_contacts.role`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::clean;

pub const NOT_FOUND: &str = "Relationship type not found";
pub const NAME_TAKEN: &str = "Relationship type with this name already exists";
pub const INVALID_COMBINATION: &str = "Invalid entity type combination. Only account-account, account-contact, \
     and contact-opportunity relationships are supported.";

/// The three entity pairs a relationship type can join
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeCombo {
    AccountAccount,
    AccountContact,
    ContactOpportunity,
}

impl TypeCombo {
    pub const ALL: [TypeCombo; 3] = [TypeCombo::AccountAccount, TypeCombo::AccountContact, TypeCombo::ContactOpportunity];

    pub fn parse(from: Option<&str>, to: Option<&str>) -> Option<Self> {
        match (from?.trim(), to?.trim()) {
            ("account", "account") => Some(TypeCombo::AccountAccount),
            ("account", "contact") => Some(TypeCombo::AccountContact),
            ("contact", "opportunity") => Some(TypeCombo::ContactOpportunity),
            _ => None,
        }
    }

    pub fn entity_types(self) -> (&'static str, &'static str) {
        match self {
            TypeCombo::AccountAccount => ("account", "account"),
            TypeCombo::AccountContact => ("account", "contact"),
            TypeCombo::ContactOpportunity => ("contact", "opportunity"),
        }
    }

    /// `from-to`, the key of `usage_by_entity_type`
    pub fn key(self) -> &'static str {
        match self {
            TypeCombo::AccountAccount => "account-account",
            TypeCombo::AccountContact => "account-contact",
            TypeCombo::ContactOpportunity => "contact-opportunity",
        }
    }

    /// Table and column holding the type name
    pub(crate) fn storage(self) -> (&'static str, &'static str) {
        match self {
            TypeCombo::AccountAccount => ("account_relationships", "relationship_type"),
            TypeCombo::AccountContact => ("account_contacts", "relationship_type"),
            TypeCombo::ContactOpportunity => ("opportunity_contacts", "role"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct EntityCombination {
    pub entity_type_from: &'static str,
    pub entity_type_to: &'static str,
}

impl From<TypeCombo> for EntityCombination {
    fn from(combo: TypeCombo) -> Self {
        let (entity_type_from, entity_type_to) = combo.entity_types();
        Self { entity_type_from, entity_type_to }
    }
}

/// A type name in use, with the first time it was used
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelationshipType {
    pub id: String,
    pub name: String,
    pub description: String,
    pub entity_type_from: &'static str,
    pub entity_type_to: &'static str,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: Option<DateTime<Utc>>,
}

impl RelationshipType {
    pub fn new(combo: TypeCombo, name: String, description: String, sort_order: i32) -> Self {
        let (entity_type_from, entity_type_to) = combo.entity_types();
        Self {
            id: name.clone(),
            name,
            description,
            entity_type_from,
            entity_type_to,
            is_active: true,
            sort_order,
            created_at: None,
        }
    }

    pub fn used_since(combo: TypeCombo, name: String, first_used: Option<DateTime<Utc>>) -> Self {
        Self { created_at: first_used, ..Self::new(combo, name, String::new(), 0) }
    }
}

/// `?entity_type_from&entity_type_to`; unless both are given every combination is listed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipTypeFilters {
    pub entity_type_from: Option<String>,
    pub entity_type_to: Option<String>,
}

impl RelationshipTypeFilters {
    /// A pair that is not one of the three supported ones selects nothing
    pub fn combos(&self) -> Vec<TypeCombo> {
        match (self.entity_type_from.as_deref(), self.entity_type_to.as_deref()) {
            (Some(from), Some(to)) => TypeCombo::parse(Some(from), Some(to)).into_iter().collect(),
            _ => TypeCombo::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRelationshipType {
    pub name: Option<String>,
    pub description: Option<String>,
    pub entity_type_from: Option<String>,
    pub entity_type_to: Option<String>,
    pub sort_order: Option<i32>,
}

impl NewRelationshipType {
    pub fn name(&self) -> Option<String> {
        clean(&self.name)
    }

    pub fn combo(&self) -> Option<TypeCombo> {
        TypeCombo::parse(self.entity_type_from.as_deref(), self.entity_type_to.as_deref())
    }
}

/// Rename body of `PUT /relationship-types/:name`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipTypeRename {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SortOrderUpdate {
    #[serde(rename = "sortOrderData")]
    pub sort_order_data: Option<Value>,
}

/// `{ updates: [...] }`; kept loose so a non-array is a 400 with its own message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkTypeRename {
    pub updates: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeRenameItem {
    pub old_name: Option<String>,
    pub new_name: Option<String>,
    pub entity_type_from: Option<String>,
    pub entity_type_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TypeRenameResult {
    pub old_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TypeRenameResult {
    pub fn failed(old_name: Option<String>, error: impl Into<String>) -> Self {
        Self { old_name, new_name: None, success: false, updated_count: None, error: Some(error.into()) }
    }

    pub fn renamed(old_name: String, new_name: String, updated_count: u64) -> Self {
        Self {
            old_name: Some(old_name),
            new_name: Some(new_name),
            success: true,
            updated_count: Some(updated_count),
            error: None,
        }
    }
}

/// Rows carrying one type name in one table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComboUsage {
    pub combo: TypeCombo,
    pub count: i64,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TypeUsageStats {
    pub total_usage: i64,
    pub last_used: Option<DateTime<Utc>>,
    pub usage_by_entity_type: BTreeMap<&'static str, i64>,
}

impl TypeUsageStats {
    /// Combinations with no rows are left out of the breakdown
    pub fn collect(usage: &[ComboUsage]) -> Self {
        let mut stats = Self::default();
        for row in usage.iter().filter(|u| u.count > 0) {
            stats.total_usage += row.count;
            stats.usage_by_entity_type.insert(row.combo.key(), row.count);
            stats.last_used = stats.last_used.max(row.last_used);
        }
        stats
    }
}
