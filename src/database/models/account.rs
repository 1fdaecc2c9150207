use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use super::{AccountContactView, OpportunitySummary};
use super::{clean, clean_nullable, double_option, parse_flag, same_text};
use crate::database::query_builder::Assignments;

pub const NAME_TAKEN: &str = "Account with this name already exists";
pub const EMAIL_TAKEN: &str = "Account with this email already exists";
pub const NOT_FOUND: &str = "Account not found";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub tenant_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub account_type: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub custom_fields: Value,
    pub created_by: Option<i32>,
    pub updated_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// The uniqueness rule this account would break if `other` were stored
    /// next to it in the same tenant. Names match exactly, emails ignore case.
    pub fn conflict_with(&self, other: &Account) -> Option<&'static str> {
        if self.id == other.id {
            return None;
        }
        if self.name == other.name {
            return Some(NAME_TAKEN);
        }
        if same_text(self.email.as_deref(), other.email.as_deref()) {
            return Some(EMAIL_TAKEN);
        }
        None
    }
}

/// Create payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub account_type: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub custom_fields: Option<Value>,
}

impl NewAccount {
    /// Build the row to insert; `None` when the required name is missing
    pub fn into_account(self, tenant_id: i32, actor: Option<i32>) -> Option<Account> {
        let name = clean(&self.name)?;
        let now = Utc::now();
        Some(Account {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            description: clean(&self.description),
            industry: clean(&self.industry),
            account_type: clean(&self.account_type),
            website: clean(&self.website),
            phone: clean(&self.phone),
            email: clean(&self.email),
            billing_address: clean(&self.billing_address),
            shipping_address: clean(&self.shipping_address),
            custom_fields: self.custom_fields.unwrap_or_else(|| Value::Object(Default::default())),
            created_by: actor,
            updated_by: actor,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Columns a client may change on an account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub industry: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub account_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub billing_address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub shipping_address: Option<Option<String>>,
    pub custom_fields: Option<Value>,
}

impl AccountPatch {
    pub fn normalized(&self) -> Self {
        Self {
            name: clean(&self.name),
            description: clean_nullable(&self.description),
            industry: clean_nullable(&self.industry),
            account_type: clean_nullable(&self.account_type),
            website: clean_nullable(&self.website),
            phone: clean_nullable(&self.phone),
            email: clean_nullable(&self.email),
            billing_address: clean_nullable(&self.billing_address),
            shipping_address: clean_nullable(&self.shipping_address),
            custom_fields: self.custom_fields.clone(),
        }
    }

    pub fn assignments(&self) -> Assignments {
        let mut set = Assignments::new();
        set.set_some("name", &self.name)
            .set_nullable("description", &self.description)
            .set_nullable("industry", &self.industry)
            .set_nullable("account_type", &self.account_type)
            .set_nullable("website", &self.website)
            .set_nullable("phone", &self.phone)
            .set_nullable("email", &self.email)
            .set_nullable("billing_address", &self.billing_address)
            .set_nullable("shipping_address", &self.shipping_address)
            .set_some("custom_fields", &self.custom_fields);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    pub fn apply(&self, account: &mut Account) {
        if let Some(v) = &self.name {
            account.name = v.clone();
        }
        macro_rules! apply_nullable {
            ($($field:ident),*) => {
                $(if let Some(v) = &self.$field { account.$field = v.clone(); })*
            };
        }
        apply_nullable!(description, industry, account_type, website, phone, email, billing_address, shipping_address);
        if let Some(v) = &self.custom_fields {
            account.custom_fields = v.clone();
        }
    }
}

/// `GET /accounts` query filters. Bracketed keys (`filters[industry]`) are
/// accepted for compatibility with existing clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountFilters {
    pub search: Option<String>,
    #[serde(alias = "filters[industry]")]
    pub industry: Option<String>,
    #[serde(alias = "filters[account_type]")]
    pub account_type: Option<String>,
    #[serde(alias = "filters[has_contacts]")]
    pub has_contacts: Option<String>,
    #[serde(alias = "filters[has_opportunities]")]
    pub has_opportunities: Option<String>,
}

impl AccountFilters {
    pub fn search_term(&self) -> Option<String> {
        clean(&self.search)
    }

    pub fn has_contacts(&self) -> Option<bool> {
        parse_flag(&self.has_contacts)
    }

    pub fn has_opportunities(&self) -> Option<bool> {
        parse_flag(&self.has_opportunities)
    }
}

/// Filters accepted by `POST /accounts/search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountSearchFilters {
    pub industry: Option<String>,
    pub account_type: Option<String>,
}

/// List row: the account plus its relationship counters
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccountSummary {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub account: Account,
    pub contact_count: i64,
    pub opportunity_count: i64,
    pub opportunities_percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct AccountDependents {
    pub contact_count: i64,
    pub opportunity_count: i64,
}

impl AccountDependents {
    pub fn any(&self) -> bool {
        self.contact_count > 0 || self.opportunity_count > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountRelations {
    pub account: Account,
    pub contacts: Vec<AccountContactView>,
    pub opportunities: Vec<OpportunitySummary>,
}

/// One opportunity line of the account pipeline report
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccountPipelineRow {
    pub opportunity_id: Uuid,
    pub opportunity_name: String,
    pub account_id: Uuid,
    pub account_name: String,
    pub stage_id: Option<Uuid>,
    pub stage_name: Option<String>,
    pub weight_percentage: Option<i32>,
    pub amount: Option<Decimal>,
    pub probability: Option<i32>,
    pub owner_id: Option<i32>,
    pub expected_close_date: Option<NaiveDate>,
    pub primary_contact_name: Option<String>,
}
