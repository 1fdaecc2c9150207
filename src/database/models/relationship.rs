use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{clean, clean_nullable, double_option, Account};
use crate::database::query_builder::Assignments;

pub const DEFAULT_RELATIONSHIP_TYPE: &str = "subsidiary";
pub const DUPLICATE: &str = "Relationship already exists between these accounts";
pub const SELF_RELATIONSHIP: &str = "An account cannot have a relationship with itself";
pub const NOT_FOUND: &str = "Account relationship not found";

/// Directed parent -> child edge between two accounts of one tenant
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountRelationship {
    pub id: Uuid,
    pub tenant_id: i32,
    pub parent_account_id: Uuid,
    pub child_account_id: Uuid,
    pub relationship_type: String,
    pub description: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccountRelationship {
    pub parent_account_id: Option<Uuid>,
    pub child_account_id: Option<Uuid>,
    pub relationship_type: Option<String>,
    pub description: Option<String>,
}

impl NewAccountRelationship {
    pub fn into_relationship(self, tenant_id: i32, actor: Option<i32>) -> Option<AccountRelationship> {
        Some(AccountRelationship {
            id: Uuid::new_v4(),
            tenant_id,
            parent_account_id: self.parent_account_id?,
            child_account_id: self.child_account_id?,
            relationship_type: clean(&self.relationship_type)
                .unwrap_or_else(|| DEFAULT_RELATIONSHIP_TYPE.to_string()),
            description: clean(&self.description),
            created_by: actor,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipPatch {
    pub relationship_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl RelationshipPatch {
    pub fn assignments(&self) -> Assignments {
        let mut set = Assignments::new();
        set.set_some("relationship_type", &clean(&self.relationship_type))
            .set_nullable("description", &clean_nullable(&self.description));
        set
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipFilters {
    pub account_id: Option<Uuid>,
    pub relationship_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccountRelationshipView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub relationship: AccountRelationship,
    pub parent_account_name: String,
    pub child_account_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountHierarchy {
    pub account: Account,
    pub parents: Vec<AccountRelationshipView>,
    pub children: Vec<AccountRelationshipView>,
}
