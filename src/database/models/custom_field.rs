use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use super::{clean, clean_nullable, double_option};
use crate::database::query_builder::Assignments;

pub const NAME_TAKEN: &str = "Custom field with this name already exists for this table";
pub const NOT_FOUND: &str = "Custom field not found";

/// Tables that carry a `custom_fields` JSONB column
pub const TARGET_TABLES: [&str; 3] = ["accounts", "contacts", "opportunities"];

pub const FIELD_TYPES: [&str; 10] = [
    "text", "number", "date", "boolean", "select", "multiselect", "email", "url", "phone", "textarea",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomFieldDefinition {
    pub id: Uuid,
    pub tenant_id: i32,
    pub table_name: String,
    pub field_name: String,
    pub field_label: String,
    pub field_type: String,
    pub is_required: bool,
    pub field_description: Option<String>,
    pub default_value: Option<String>,
    pub validation_rules: Option<Value>,
    pub select_options: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resolve a client-supplied table name to the static name used in SQL
pub fn target_table(name: &str) -> Option<&'static str> {
    TARGET_TABLES.iter().copied().find(|t| *t == name.trim())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_field_name(name: &str) -> Result<(), String> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err("Field name may only contain letters, digits and underscores and must not start with a digit".to_string())
    }
}

fn check_field_type(field_type: &str) -> Result<(), String> {
    if FIELD_TYPES.contains(&field_type) {
        Ok(())
    } else {
        Err(format!("Invalid field type. Must be one of: {}", FIELD_TYPES.join(", ")))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCustomField {
    pub table_name: Option<String>,
    pub field_name: Option<String>,
    pub field_label: Option<String>,
    pub field_type: Option<String>,
    pub is_required: Option<bool>,
    pub field_description: Option<String>,
    pub default_value: Option<String>,
    pub validation_rules: Option<Value>,
    pub select_options: Option<Value>,
}

impl NewCustomField {
    pub fn into_definition(self, tenant_id: i32) -> Result<CustomFieldDefinition, String> {
        let (Some(table_name), Some(field_name), Some(field_type)) =
            (clean(&self.table_name), clean(&self.field_name), clean(&self.field_type))
        else {
            return Err("Field name, table name, and field type are required".to_string());
        };

        let table = target_table(&table_name)
            .ok_or_else(|| format!("Invalid table name. Must be one of: {}", TARGET_TABLES.join(", ")))?;
        check_field_name(&field_name)?;
        check_field_type(&field_type)?;

        let now = Utc::now();
        Ok(CustomFieldDefinition {
            id: Uuid::new_v4(),
            tenant_id,
            table_name: table.to_string(),
            field_label: clean(&self.field_label).unwrap_or_else(|| field_name.clone()),
            field_name,
            field_type,
            is_required: self.is_required.unwrap_or(false),
            field_description: clean(&self.field_description),
            default_value: self.default_value,
            validation_rules: self.validation_rules,
            select_options: self.select_options,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomFieldPatch {
    pub field_name: Option<String>,
    pub field_label: Option<String>,
    pub field_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub field_description: Option<Option<String>>,
    pub is_required: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub default_value: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub validation_rules: Option<Option<Value>>,
    #[serde(default, deserialize_with = "double_option")]
    pub select_options: Option<Option<Value>>,
}

impl CustomFieldPatch {
    /// Trim and validate; the error is the 400 message
    pub fn normalized(&self) -> Result<Self, String> {
        let patch = Self {
            field_name: clean(&self.field_name),
            field_label: clean(&self.field_label),
            field_type: clean(&self.field_type),
            field_description: clean_nullable(&self.field_description),
            ..self.clone()
        };
        if let Some(name) = &patch.field_name {
            check_field_name(name)?;
        }
        if let Some(field_type) = &patch.field_type {
            check_field_type(field_type)?;
        }
        Ok(patch)
    }

    pub fn assignments(&self) -> Assignments {
        let mut set = Assignments::new();
        set.set_some("field_name", &self.field_name)
            .set_some("field_label", &self.field_label)
            .set_some("field_type", &self.field_type)
            .set_nullable("field_description", &self.field_description)
            .set_some("is_required", &self.is_required)
            .set_nullable("default_value", &self.default_value)
            .set_nullable("validation_rules", &self.validation_rules)
            .set_nullable("select_options", &self.select_options);
        set
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomFieldFilters {
    pub table_name: Option<String>,
}

/// How many rows of the target table still carry a value for the field
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CustomFieldUsage {
    pub usage_count: i64,
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomFieldSchema {
    pub table_name: String,
    pub fields: Vec<CustomFieldDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_field(table: &str, name: &str, kind: &str) -> NewCustomField {
        NewCustomField {
            table_name: Some(table.into()),
            field_name: Some(name.into()),
            field_type: Some(kind.into()),
            ..Default::default()
        }
    }

    #[test]
    fn label_defaults_to_name() {
        let def = new_field("accounts", "tier", "select").into_definition(1).unwrap();
        assert_eq!(def.field_label, "tier");
        assert!(!def.is_required);
    }

    #[test]
    fn rejects_unknown_tables_and_types() {
        assert!(new_field("users", "tier", "text").into_definition(1).is_err());
        assert!(new_field("accounts", "tier", "blob").into_definition(1).is_err());
        assert_eq!(
            new_field("accounts", "", "text").into_definition(1).unwrap_err(),
            "Field name, table name, and field type are required"
        );
    }

    #[test]
    fn field_names_are_identifiers() {
        assert!(new_field("contacts", "linkedin_url", "url").into_definition(1).is_ok());
        assert!(new_field("contacts", "9lives", "text").into_definition(1).is_err());
        assert!(new_field("contacts", "a'b", "text").into_definition(1).is_err());
    }

    #[test]
    fn target_table_is_static() {
        assert_eq!(target_table(" opportunities "), Some("opportunities"));
        assert_eq!(target_table("accounts; drop table x"), None);
    }
}
