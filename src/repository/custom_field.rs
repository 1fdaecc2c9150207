use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{DeleteOutcome, RepoResult, WriteOutcome};
use crate::database::models::custom_field::{self, target_table, NAME_TAKEN};
use crate::database::models::{CustomFieldDefinition, CustomFieldPatch, CustomFieldUsage};
use crate::database::query_builder::{lock_table, query_as_with, TableLock};

#[async_trait]
pub trait CustomFieldRepository: Send + Sync {
    async fn list(&self, tenant_id: i32, table_name: Option<&str>) -> RepoResult<Vec<CustomFieldDefinition>>;

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<CustomFieldDefinition>>;

    async fn create(&self, definition: CustomFieldDefinition) -> RepoResult<WriteOutcome<CustomFieldDefinition>>;

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &CustomFieldPatch,
    ) -> RepoResult<WriteOutcome<CustomFieldDefinition>>;

    /// Blocked while any row of the target table still has the key
    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<DeleteOutcome<CustomFieldUsage>>;
}

#[derive(Clone)]
pub struct PgCustomFieldRepository {
    pool: PgPool,
}

impl PgCustomFieldRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn name_taken(
    conn: &mut PgConnection,
    tenant_id: i32,
    table_name: &str,
    field_name: &str,
    except: Option<Uuid>,
) -> RepoResult<bool> {
    let (taken,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM custom_field_definitions \
         WHERE tenant_id = $1 AND table_name = $2 AND LOWER(field_name) = LOWER($3) \
         AND ($4::uuid IS NULL OR id <> $4))",
    )
    .bind(tenant_id)
    .bind(table_name)
    .bind(field_name)
    .bind(except)
    .fetch_one(conn)
    .await?;
    Ok(taken)
}

#[async_trait]
impl CustomFieldRepository for PgCustomFieldRepository {
    async fn list(&self, tenant_id: i32, table_name: Option<&str>) -> RepoResult<Vec<CustomFieldDefinition>> {
        let rows = sqlx::query_as::<_, CustomFieldDefinition>(
            "SELECT * FROM custom_field_definitions \
             WHERE tenant_id = $1 AND ($2::text IS NULL OR table_name = $2) \
             ORDER BY table_name, field_name",
        )
        .bind(tenant_id)
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<CustomFieldDefinition>> {
        let row = sqlx::query_as::<_, CustomFieldDefinition>(
            "SELECT * FROM custom_field_definitions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, definition: CustomFieldDefinition) -> RepoResult<WriteOutcome<CustomFieldDefinition>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, definition.tenant_id, TableLock::CustomFields).await?;

        if name_taken(&mut tx, definition.tenant_id, &definition.table_name, &definition.field_name, None).await? {
            return Ok(WriteOutcome::Conflict(NAME_TAKEN));
        }

        let created = sqlx::query_as::<_, CustomFieldDefinition>(
            r#"
            INSERT INTO custom_field_definitions (
                id, tenant_id, table_name, field_name, field_label, field_type, is_required,
                field_description, default_value, validation_rules, select_options, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(definition.id)
        .bind(definition.tenant_id)
        .bind(&definition.table_name)
        .bind(&definition.field_name)
        .bind(&definition.field_label)
        .bind(&definition.field_type)
        .bind(definition.is_required)
        .bind(&definition.field_description)
        .bind(&definition.default_value)
        .bind(&definition.validation_rules)
        .bind(&definition.select_options)
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(created))
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &CustomFieldPatch,
    ) -> RepoResult<WriteOutcome<CustomFieldDefinition>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, tenant_id, TableLock::CustomFields).await?;

        let Some(current) = sqlx::query_as::<_, CustomFieldDefinition>(
            "SELECT * FROM custom_field_definitions WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(WriteOutcome::Missing(custom_field::NOT_FOUND));
        };

        if let Some(field_name) = &patch.field_name {
            if name_taken(&mut tx, tenant_id, &current.table_name, field_name, Some(id)).await? {
                return Ok(WriteOutcome::Conflict(NAME_TAKEN));
            }
        }

        let mut set = patch.assignments();
        set.touch("updated_at = NOW()");
        let sql = set.into_update("custom_field_definitions", id, tenant_id);
        let updated = query_as_with::<CustomFieldDefinition>(&sql).fetch_one(&mut *tx).await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(updated))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<DeleteOutcome<CustomFieldUsage>> {
        let mut tx = self.pool.begin().await?;

        let Some(definition) = sqlx::query_as::<_, CustomFieldDefinition>(
            "SELECT * FROM custom_field_definitions WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(DeleteOutcome::Missing);
        };

        let usage_count = match target_table(&definition.table_name) {
            Some(table) => {
                let (n,): (i64,) = sqlx::query_as(&format!(
                    "SELECT COUNT(*) FROM {} WHERE tenant_id = $1 AND custom_fields ? $2",
                    table
                ))
                .bind(tenant_id)
                .bind(&definition.field_name)
                .fetch_one(&mut *tx)
                .await?;
                n
            }
            None => 0,
        };
        let usage = CustomFieldUsage { usage_count, table_name: definition.table_name };
        if usage.usage_count > 0 {
            return Ok(DeleteOutcome::Blocked(usage));
        }

        sqlx::query("DELETE FROM custom_field_definitions WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DeleteOutcome::Deleted(usage))
    }
}
