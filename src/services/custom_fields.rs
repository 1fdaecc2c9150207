use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{OrNotFound, ServiceError, ServiceResult, NO_FIELDS};
use crate::database::models::clean;
use crate::database::models::custom_field::{target_table, NOT_FOUND, TARGET_TABLES};
use crate::database::models::{
    CustomFieldDefinition, CustomFieldFilters, CustomFieldPatch, CustomFieldSchema, NewCustomField,
};
use crate::repository::{CustomFieldRepository, DeleteOutcome, Repositories};

fn checked_table(name: &str) -> ServiceResult<&'static str> {
    target_table(name)
        .ok_or_else(|| ServiceError::validation(format!("Invalid table name. Must be one of: {}", TARGET_TABLES.join(", "))))
}

#[derive(Clone)]
pub struct CustomFieldService {
    fields: Arc<dyn CustomFieldRepository>,
}

impl CustomFieldService {
    pub fn new(repos: &Repositories) -> Self {
        Self { fields: repos.custom_fields.clone() }
    }

    pub async fn list(&self, tenant_id: i32, filters: &CustomFieldFilters) -> ServiceResult<Vec<CustomFieldDefinition>> {
        let table = match clean(&filters.table_name) {
            Some(name) => Some(checked_table(&name)?),
            None => None,
        };
        Ok(self.fields.list(tenant_id, table).await?)
    }

    pub async fn get(&self, tenant_id: i32, id: Uuid) -> ServiceResult<CustomFieldDefinition> {
        self.fields.find(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn create(&self, tenant_id: i32, input: NewCustomField) -> ServiceResult<CustomFieldDefinition> {
        let definition = input.into_definition(tenant_id).map_err(ServiceError::Validation)?;
        let created = self
            .fields
            .create(definition)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, error = %e, "Custom field create rejected"))?;
        info!(tenant_id, table = %created.table_name, field = %created.field_name, "Created custom field");
        Ok(created)
    }

    pub async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &CustomFieldPatch,
    ) -> ServiceResult<CustomFieldDefinition> {
        let patch = patch.normalized().map_err(ServiceError::Validation)?;
        if patch.assignments().is_empty() {
            return Err(ServiceError::validation(NO_FIELDS));
        }
        self.fields
            .update(tenant_id, id, &patch)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, field_id = %id, error = %e, "Custom field update rejected"))
    }

    pub async fn delete(&self, tenant_id: i32, id: Uuid) -> ServiceResult<()> {
        match self.fields.delete(tenant_id, id).await? {
            DeleteOutcome::Missing => Err(ServiceError::not_found(NOT_FOUND)),
            DeleteOutcome::Blocked(usage) => {
                warn!(tenant_id, field_id = %id, usage_count = usage.usage_count, "Custom field delete blocked");
                Err(ServiceError::HasDependents {
                    message: "Cannot delete custom field that is in use".to_string(),
                    data: json!(usage),
                })
            }
            DeleteOutcome::Deleted(_) => Ok(()),
        }
    }

    pub async fn schema(&self, tenant_id: i32, table_name: &str) -> ServiceResult<CustomFieldSchema> {
        let table = checked_table(table_name)?;
        let fields = self.fields.list(tenant_id, Some(table)).await?;
        Ok(CustomFieldSchema { table_name: table.to_string(), fields })
    }
}
