use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{DeleteOutcome, RepoResult, WriteOutcome};
use crate::database::models::stage::{self, NAME_TAKEN};
use crate::database::models::{Stage, StagePatch};
use crate::database::query_builder::{lock_table, query_as_with, TableLock};

#[async_trait]
pub trait StageRepository: Send + Sync {
    async fn list(&self, tenant_id: i32) -> RepoResult<Vec<Stage>>;

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Stage>>;

    /// Insert at the end of the tenant's ordering
    async fn create(&self, stage: Stage) -> RepoResult<WriteOutcome<Stage>>;

    async fn update(&self, tenant_id: i32, id: Uuid, patch: &StagePatch) -> RepoResult<WriteOutcome<Stage>>;

    /// Blocked with the number of opportunities still in the stage
    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<DeleteOutcome<i64>>;

    /// Assign `order_index = position + 1`. `None` when an id is not a stage
    /// of the tenant.
    async fn reorder(&self, tenant_id: i32, stage_ids: &[Uuid]) -> RepoResult<Option<Vec<Stage>>>;
}

#[derive(Clone)]
pub struct PgStageRepository {
    pool: PgPool,
}

impl PgStageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn name_taken(conn: &mut PgConnection, tenant_id: i32, name: &str, except: Option<Uuid>) -> RepoResult<bool> {
    let (taken,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM opportunity_stages \
         WHERE tenant_id = $1 AND LOWER(name) = LOWER($2) AND ($3::uuid IS NULL OR id <> $3))",
    )
    .bind(tenant_id)
    .bind(name)
    .bind(except)
    .fetch_one(conn)
    .await?;
    Ok(taken)
}

#[async_trait]
impl StageRepository for PgStageRepository {
    async fn list(&self, tenant_id: i32) -> RepoResult<Vec<Stage>> {
        let rows = sqlx::query_as::<_, Stage>(
            "SELECT * FROM opportunity_stages WHERE tenant_id = $1 ORDER BY order_index, id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Stage>> {
        let row = sqlx::query_as::<_, Stage>("SELECT * FROM opportunity_stages WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create(&self, stage: Stage) -> RepoResult<WriteOutcome<Stage>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, stage.tenant_id, TableLock::Stages).await?;

        if name_taken(&mut tx, stage.tenant_id, &stage.name, None).await? {
            return Ok(WriteOutcome::Conflict(NAME_TAKEN));
        }

        let created = sqlx::query_as::<_, Stage>(
            r#"
            INSERT INTO opportunity_stages (
                id, tenant_id, name, description, order_index, weight_percentage,
                is_closed_won, is_closed_lost, color, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4,
                (SELECT COALESCE(MAX(order_index), 0) + 1 FROM opportunity_stages WHERE tenant_id = $2),
                $5, $6, $7, $8, $9, $10
            )
            RETURNING *
            "#,
        )
        .bind(stage.id)
        .bind(stage.tenant_id)
        .bind(&stage.name)
        .bind(&stage.description)
        .bind(stage.weight_percentage)
        .bind(stage.is_closed_won)
        .bind(stage.is_closed_lost)
        .bind(&stage.color)
        .bind(stage.created_at)
        .bind(stage.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(created))
    }

    async fn update(&self, tenant_id: i32, id: Uuid, patch: &StagePatch) -> RepoResult<WriteOutcome<Stage>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, tenant_id, TableLock::Stages).await?;

        if let Some(name) = &patch.name {
            if name_taken(&mut tx, tenant_id, name, Some(id)).await? {
                return Ok(WriteOutcome::Conflict(NAME_TAKEN));
            }
        }

        let mut set = patch.assignments();
        set.touch("updated_at = NOW()");
        let sql = set.into_update("opportunity_stages", id, tenant_id);
        let Some(updated) = query_as_with::<Stage>(&sql).fetch_optional(&mut *tx).await? else {
            return Ok(WriteOutcome::Missing(stage::NOT_FOUND));
        };

        tx.commit().await?;
        Ok(WriteOutcome::Written(updated))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<DeleteOutcome<i64>> {
        let mut tx = self.pool.begin().await?;

        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM opportunity_stages WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await?;
        if found.is_none() {
            return Ok(DeleteOutcome::Missing);
        }

        let (opportunity_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM opportunities WHERE tenant_id = $1 AND stage_id = $2")
                .bind(tenant_id)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if opportunity_count > 0 {
            return Ok(DeleteOutcome::Blocked(opportunity_count));
        }

        sqlx::query("DELETE FROM opportunity_stages WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DeleteOutcome::Deleted(0))
    }

    async fn reorder(&self, tenant_id: i32, stage_ids: &[Uuid]) -> RepoResult<Option<Vec<Stage>>> {
        let mut distinct = stage_ids.to_vec();
        distinct.sort();
        distinct.dedup();

        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, tenant_id, TableLock::Stages).await?;

        let (known,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM opportunity_stages WHERE tenant_id = $1 AND id = ANY($2)")
                .bind(tenant_id)
                .bind(&distinct)
                .fetch_one(&mut *tx)
                .await?;
        if known != distinct.len() as i64 {
            return Ok(None);
        }

        for (position, id) in stage_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE opportunity_stages SET order_index = $1, updated_at = NOW() WHERE id = $2 AND tenant_id = $3",
            )
            .bind(position as i32 + 1)
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;
        }

        let stages = sqlx::query_as::<_, Stage>(
            "SELECT * FROM opportunity_stages WHERE tenant_id = $1 ORDER BY order_index, id",
        )
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(stages))
    }
}
