use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::{OrNotFound, ServiceError, ServiceResult};
use crate::database::models::relationship_type::{INVALID_COMBINATION, NAME_TAKEN, NOT_FOUND};
use crate::database::models::{
    clean, BulkTypeRename, EntityCombination, NewRelationshipType, RelationshipType, RelationshipTypeFilters,
    RelationshipTypeRename, SortOrderUpdate, TypeCombo, TypeRenameItem, TypeRenameResult, TypeUsageStats,
};
use crate::repository::{Repositories, RelationshipTypeRepository};

/// Type names of account edges, account links and opportunity links.
/// Single-type reads and writes work on account edges only.
#[derive(Clone)]
pub struct RelationshipTypeService {
    types: Arc<dyn RelationshipTypeRepository>,
}

impl RelationshipTypeService {
    pub fn new(repos: &Repositories) -> Self {
        Self { types: repos.relationship_types.clone() }
    }

    pub async fn list(&self, tenant_id: i32, filters: &RelationshipTypeFilters) -> ServiceResult<Vec<RelationshipType>> {
        Ok(self.types.types(tenant_id, &filters.combos()).await?)
    }

    /// Validates a new name; nothing is stored until an edge uses it
    pub async fn create(&self, tenant_id: i32, input: &NewRelationshipType) -> ServiceResult<RelationshipType> {
        let name = input.name().ok_or_else(|| ServiceError::validation("Name is required"))?;
        let combo = input.combo().ok_or_else(|| ServiceError::validation(INVALID_COMBINATION))?;
        if self.types.type_exists(tenant_id, combo, &name).await? {
            return Err(ServiceError::conflict(NAME_TAKEN));
        }
        let description = input.description.clone().unwrap_or_default();
        Ok(RelationshipType::new(combo, name, description, input.sort_order.unwrap_or(0)))
    }

    pub async fn get(&self, tenant_id: i32, name: &str) -> ServiceResult<RelationshipType> {
        self.types
            .types(tenant_id, &[TypeCombo::AccountAccount])
            .await?
            .into_iter()
            .find(|t| t.name == name)
            .or_not_found(NOT_FOUND)
    }

    pub async fn rename(
        &self,
        tenant_id: i32,
        name: &str,
        body: &RelationshipTypeRename,
    ) -> ServiceResult<RelationshipType> {
        let new_name = body
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty() && *n != name)
            .ok_or_else(|| ServiceError::validation("New name is required and must be different from current name"))?;

        let combo = TypeCombo::AccountAccount;
        if self.types.type_exists(tenant_id, combo, new_name).await? {
            return Err(ServiceError::conflict(NAME_TAKEN));
        }
        let updated = self.types.rename(tenant_id, combo, name, new_name).await?;
        if updated == 0 {
            return Err(ServiceError::not_found(NOT_FOUND));
        }
        info!(tenant_id, from = name, to = new_name, updated, "Renamed relationship type");
        let description = body.description.clone().unwrap_or_default();
        Ok(RelationshipType::new(combo, new_name.to_string(), description, 0))
    }

    /// Only a name no account edge uses can go; there is nothing to remove
    pub async fn delete(&self, tenant_id: i32, name: &str) -> ServiceResult<()> {
        let in_use: i64 = self
            .types
            .usage(tenant_id, name)
            .await?
            .iter()
            .filter(|u| u.combo == TypeCombo::AccountAccount)
            .map(|u| u.count)
            .sum();
        if in_use > 0 {
            warn!(tenant_id, name, in_use, "Relationship type delete blocked");
            return Err(ServiceError::validation(format!(
                "Cannot delete relationship type. It is being used by {} relationship(s).",
                in_use
            )));
        }
        Ok(())
    }

    pub fn combinations(&self) -> Vec<EntityCombination> {
        TypeCombo::ALL.into_iter().map(EntityCombination::from).collect()
    }

    /// Types carry no order of their own, so only the shape is checked
    pub fn sort_order(&self, body: &SortOrderUpdate) -> ServiceResult<()> {
        match body.sort_order_data {
            Some(Value::Array(_)) => Ok(()),
            _ => Err(ServiceError::validation("sortOrderData must be an array")),
        }
    }

    pub async fn stats(&self, tenant_id: i32, name: &str) -> ServiceResult<TypeUsageStats> {
        Ok(TypeUsageStats::collect(&self.types.usage(tenant_id, name).await?))
    }

    /// Each item is renamed on its own; a bad item is reported, not fatal
    pub async fn bulk_rename(&self, tenant_id: i32, body: &BulkTypeRename) -> ServiceResult<Vec<TypeRenameResult>> {
        let Some(Value::Array(items)) = &body.updates else {
            return Err(ServiceError::validation("Updates must be an array"));
        };

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let item: TypeRenameItem = serde_json::from_value(item.clone()).unwrap_or_default();
            let (Some(old_name), Some(new_name)) = (clean(&item.old_name), clean(&item.new_name)) else {
                results.push(TypeRenameResult::failed(item.old_name, "Old name and new name are required"));
                continue;
            };
            let Some(combo) = TypeCombo::parse(item.entity_type_from.as_deref(), item.entity_type_to.as_deref())
            else {
                results.push(TypeRenameResult::failed(Some(old_name), INVALID_COMBINATION));
                continue;
            };
            let updated = self.types.rename(tenant_id, combo, &old_name, &new_name).await?;
            results.push(TypeRenameResult::renamed(old_name, new_name, updated));
        }
        info!(tenant_id, items = results.len(), "Bulk renamed relationship types");
        Ok(results)
    }
}
