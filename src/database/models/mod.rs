pub mod account;
pub mod account_contact;
pub mod contact;
pub mod custom_field;
pub mod dashboard;
pub mod opportunity;
pub mod opportunity_contact;
pub mod relationship;
pub mod relationship_type;
pub mod search;
pub mod stage;
pub mod tenant;

pub use account::{
    Account, AccountDependents, AccountFilters, AccountPatch, AccountPipelineRow, AccountRelations,
    AccountSearchFilters, AccountSummary, NewAccount,
};
pub use account_contact::{AccountContact, AccountContactFilters, AccountContactPatch, AccountContactView, NewAccountContact};
pub use contact::{
    Contact, ContactDependents, ContactFilters, ContactPatch, ContactRelations, ContactSearchFilters, ContactStats,
    ContactSummary, NewContact,
};
pub use custom_field::{
    CustomFieldDefinition, CustomFieldFilters, CustomFieldPatch, CustomFieldSchema, CustomFieldUsage, NewCustomField,
};
pub use dashboard::{DashboardOpportunity, OpportunityBoard};
pub use opportunity::{
    NewOpportunity, Opportunity, OpportunityDependents, OpportunityFilters, OpportunityPatch, OpportunityRelations,
    OpportunitySearchFilters, OpportunitySummary, PipelineColumn, StageHistoryEntry, StageMove, StageMoved,
};
pub use opportunity_contact::{
    NewOpportunityContact, OpportunityContact, OpportunityContactFilters, OpportunityContactPatch, OpportunityContactView,
};
pub use relationship::{
    AccountHierarchy, AccountRelationship, AccountRelationshipView, NewAccountRelationship, RelationshipFilters,
    RelationshipPatch,
};
pub use relationship_type::{
    BulkTypeRename, ComboUsage, EntityCombination, NewRelationshipType, RelationshipType, RelationshipTypeFilters,
    RelationshipTypeRename, SortOrderUpdate, TypeCombo, TypeRenameItem, TypeRenameResult, TypeUsageStats,
};
pub use search::{GlobalSearchParams, GlobalSearchResult, SearchHit, SearchRequest};
pub use stage::{NewStage, Stage, StagePatch, StageReorder};
pub use tenant::{
    Company, PipelineSummaryRow, Tenant, TenantDashboard, TenantOverview, TenantPatch, TenantSettings,
    TenantSettingsUpdate, TenantStats,
};

use serde::{Deserialize, Deserializer};

/// Distinguish an absent key (`None`) from an explicit `null` (`Some(None)`).
/// Pair with `#[serde(default)]`.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Trim a string input; blank becomes `None`
pub fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Same as [`clean`] for nullable patch fields: an explicit blank clears the column
pub fn clean_nullable(value: &Option<Option<String>>) -> Option<Option<String>> {
    value.as_ref().map(clean)
}

/// Query-string flags arrive as text; only `true`/`false` are meaningful
pub fn parse_flag(value: &Option<String>) -> Option<bool> {
    match value.as_deref().map(str::trim) {
        Some("true") | Some("1") => Some(true),
        Some("false") | Some("0") => Some(false),
        _ => None,
    }
}

/// Case-insensitive equality for optional text columns; two blanks never collide
pub(crate) fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}
