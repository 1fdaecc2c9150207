use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use super::{clean, clean_nullable, double_option, parse_flag, same_text};
use super::{AccountContactView, OpportunityContactView};
use crate::database::query_builder::Assignments;

pub const NAME_TAKEN: &str = "Contact with this name already exists";
pub const EMAIL_TAKEN: &str = "Contact with this email already exists";
pub const NOT_FOUND: &str = "Contact not found";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub tenant_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub custom_fields: Value,
    pub created_by: Option<i32>,
    pub updated_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn conflict_with(&self, other: &Contact) -> Option<&'static str> {
        if self.id == other.id {
            return None;
        }
        if self.first_name.eq_ignore_ascii_case(&other.first_name)
            && self.last_name.eq_ignore_ascii_case(&other.last_name)
        {
            return Some(NAME_TAKEN);
        }
        if same_text(self.email.as_deref(), other.email.as_deref()) {
            return Some(EMAIL_TAKEN);
        }
        None
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub custom_fields: Option<Value>,
}

impl NewContact {
    /// `None` unless both names are present
    pub fn into_contact(self, tenant_id: i32, actor: Option<i32>) -> Option<Contact> {
        let first_name = clean(&self.first_name)?;
        let last_name = clean(&self.last_name)?;
        let now = Utc::now();
        Some(Contact {
            id: Uuid::new_v4(),
            tenant_id,
            first_name,
            last_name,
            email: clean(&self.email),
            phone: clean(&self.phone),
            mobile_phone: clean(&self.mobile_phone),
            title: clean(&self.title),
            department: clean(&self.department),
            address1: clean(&self.address1),
            address2: clean(&self.address2),
            city: clean(&self.city),
            state: clean(&self.state),
            zip: clean(&self.zip),
            country: clean(&self.country),
            custom_fields: self.custom_fields.unwrap_or_else(|| Value::Object(Default::default())),
            created_by: actor,
            updated_by: actor,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub mobile_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub department: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address1: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address2: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub state: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub zip: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub country: Option<Option<String>>,
    pub custom_fields: Option<Value>,
}

impl ContactPatch {
    pub fn normalized(&self) -> Self {
        Self {
            first_name: clean(&self.first_name),
            last_name: clean(&self.last_name),
            email: clean_nullable(&self.email),
            phone: clean_nullable(&self.phone),
            mobile_phone: clean_nullable(&self.mobile_phone),
            title: clean_nullable(&self.title),
            department: clean_nullable(&self.department),
            address1: clean_nullable(&self.address1),
            address2: clean_nullable(&self.address2),
            city: clean_nullable(&self.city),
            state: clean_nullable(&self.state),
            zip: clean_nullable(&self.zip),
            country: clean_nullable(&self.country),
            custom_fields: self.custom_fields.clone(),
        }
    }

    pub fn assignments(&self) -> Assignments {
        let mut set = Assignments::new();
        set.set_some("first_name", &self.first_name)
            .set_some("last_name", &self.last_name)
            .set_nullable("email", &self.email)
            .set_nullable("phone", &self.phone)
            .set_nullable("mobile_phone", &self.mobile_phone)
            .set_nullable("title", &self.title)
            .set_nullable("department", &self.department)
            .set_nullable("address1", &self.address1)
            .set_nullable("address2", &self.address2)
            .set_nullable("city", &self.city)
            .set_nullable("state", &self.state)
            .set_nullable("zip", &self.zip)
            .set_nullable("country", &self.country)
            .set_some("custom_fields", &self.custom_fields);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    pub fn apply(&self, contact: &mut Contact) {
        if let Some(v) = &self.first_name {
            contact.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            contact.last_name = v.clone();
        }
        macro_rules! apply_nullable {
            ($($field:ident),*) => {
                $(if let Some(v) = &self.$field { contact.$field = v.clone(); })*
            };
        }
        apply_nullable!(email, phone, mobile_phone, title, department, address1, address2, city, state, zip, country);
        if let Some(v) = &self.custom_fields {
            contact.custom_fields = v.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFilters {
    pub search: Option<String>,
    #[serde(alias = "filters[title]")]
    pub title: Option<String>,
    #[serde(alias = "filters[department]")]
    pub department: Option<String>,
    #[serde(alias = "filters[has_accounts]")]
    pub has_accounts: Option<String>,
    #[serde(alias = "filters[has_opportunities]")]
    pub has_opportunities: Option<String>,
}

impl ContactFilters {
    pub fn search_term(&self) -> Option<String> {
        clean(&self.search)
    }

    pub fn has_accounts(&self) -> Option<bool> {
        parse_flag(&self.has_accounts)
    }

    pub fn has_opportunities(&self) -> Option<bool> {
        parse_flag(&self.has_opportunities)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactSearchFilters {
    pub title: Option<String>,
    pub department: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContactSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub contact: Contact,
    pub account_count: i64,
    pub opportunity_count: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ContactDependents {
    pub account_count: i64,
    pub opportunity_count: i64,
}

impl ContactDependents {
    pub fn any(&self) -> bool {
        self.account_count > 0 || self.opportunity_count > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactRelations {
    pub contact: Contact,
    pub accounts: Vec<AccountContactView>,
    pub opportunities: Vec<OpportunityContactView>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContactStats {
    pub contact_id: Uuid,
    pub account_count: i64,
    pub opportunity_count: i64,
    pub open_opportunity_value: Decimal,
}
