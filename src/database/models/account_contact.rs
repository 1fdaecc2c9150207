use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{clean, clean_nullable, double_option};
use crate::database::query_builder::Assignments;

pub const DEFAULT_RELATIONSHIP_TYPE: &str = "contact";
pub const DUPLICATE: &str = "Contact is already associated with this account";
pub const NOT_FOUND: &str = "Account contact relationship not found";

/// Edge between an account and a contact
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountContact {
    pub id: Uuid,
    pub tenant_id: i32,
    pub account_id: Uuid,
    pub contact_id: Uuid,
    pub role: Option<String>,
    pub is_primary: bool,
    pub relationship_type: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccountContact {
    pub account_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub role: Option<String>,
    pub is_primary: Option<bool>,
    pub relationship_type: Option<String>,
    pub description: Option<String>,
}

impl NewAccountContact {
    pub fn into_link(self, tenant_id: i32) -> Option<AccountContact> {
        Some(AccountContact {
            id: Uuid::new_v4(),
            tenant_id,
            account_id: self.account_id?,
            contact_id: self.contact_id?,
            role: clean(&self.role),
            is_primary: self.is_primary.unwrap_or(false),
            relationship_type: clean(&self.relationship_type).unwrap_or_else(|| DEFAULT_RELATIONSHIP_TYPE.to_string()),
            description: clean(&self.description),
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountContactPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub role: Option<Option<String>>,
    pub is_primary: Option<bool>,
    pub relationship_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl AccountContactPatch {
    pub fn normalized(&self) -> Self {
        Self {
            role: clean_nullable(&self.role),
            is_primary: self.is_primary,
            relationship_type: clean(&self.relationship_type),
            description: clean_nullable(&self.description),
        }
    }

    pub fn assignments(&self) -> Assignments {
        let mut set = Assignments::new();
        set.set_nullable("role", &self.role)
            .set_some("is_primary", &self.is_primary)
            .set_some("relationship_type", &self.relationship_type)
            .set_nullable("description", &self.description);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    pub fn apply(&self, link: &mut AccountContact) {
        if let Some(v) = &self.role {
            link.role = v.clone();
        }
        if let Some(v) = self.is_primary {
            link.is_primary = v;
        }
        if let Some(v) = &self.relationship_type {
            link.relationship_type = v.clone();
        }
        if let Some(v) = &self.description {
            link.description = v.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountContactFilters {
    pub account_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
}

/// A link joined with the names on both sides
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccountContactView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub link: AccountContact,
    pub account_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
}
