use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::clean;

pub const DEFAULT_ROLE: &str = "influencer";
pub const DUPLICATE: &str = "Contact is already associated with this opportunity";
pub const NOT_FOUND: &str = "Opportunity contact relationship not found";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OpportunityContact {
    pub id: Uuid,
    pub tenant_id: i32,
    pub opportunity_id: Uuid,
    pub contact_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOpportunityContact {
    pub opportunity_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub role: Option<String>,
}

impl NewOpportunityContact {
    pub fn into_link(self, tenant_id: i32) -> Option<OpportunityContact> {
        Some(OpportunityContact {
            id: Uuid::new_v4(),
            tenant_id,
            opportunity_id: self.opportunity_id?,
            contact_id: self.contact_id?,
            role: clean(&self.role).unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunityContactPatch {
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunityContactFilters {
    pub opportunity_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OpportunityContactView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub link: OpportunityContact,
    pub opportunity_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_influencer() {
        let link = NewOpportunityContact {
            opportunity_id: Some(Uuid::new_v4()),
            contact_id: Some(Uuid::new_v4()),
            role: Some("  ".into()),
        }
        .into_link(1)
        .unwrap();
        assert_eq!(link.role, DEFAULT_ROLE);
    }
}
