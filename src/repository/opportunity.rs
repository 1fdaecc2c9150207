use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::account_contact::row_exists;
use super::opportunity_contact::VIEW_SELECT as OPPORTUNITY_CONTACT_VIEW;
use super::{DeleteOutcome, Page, RepoResult, WriteOutcome};
use crate::database::models::opportunity::{
    self, OpportunityDependents, OpportunitySearchFilters, ParsedOpportunityFilters, PipelineColumn, STAGE_NOT_FOUND,
};
use crate::database::models::{
    account, Account, Opportunity, OpportunityContactView, OpportunityPatch, OpportunityRelations, OpportunitySummary,
    Stage, StageHistoryEntry,
};
use crate::database::pagination::{PageRequest, SearchWindow};
use crate::database::query_builder::{query_as_with, ScopedQuery};

macro_rules! summary_from {
    () => {
        r#"
        FROM opportunities o
        LEFT JOIN accounts a ON a.id = o.account_id AND a.tenant_id = o.tenant_id
        LEFT JOIN opportunity_stages s ON s.id = o.stage_id AND s.tenant_id = o.tenant_id
        "#
    };
}

/// Opportunity rows with account name, stage name and stage weight
pub(crate) const SUMMARY_SELECT: &str = concat!(
    "SELECT o.*, a.name AS account_name, s.name AS stage_name, s.weight_percentage ",
    summary_from!()
);

const SUMMARY_COUNT: &str = concat!("SELECT COUNT(*) ", summary_from!());

pub(crate) const SEARCH_COLUMNS: [&str; 3] = ["o.name", "o.description", "a.name"];

#[async_trait]
pub trait OpportunityRepository: Send + Sync {
    async fn list(
        &self,
        tenant_id: i32,
        filters: &ParsedOpportunityFilters,
        page: &PageRequest,
    ) -> RepoResult<Page<OpportunitySummary>>;

    async fn search(
        &self,
        tenant_id: i32,
        term: &str,
        filters: &OpportunitySearchFilters,
        window: &SearchWindow,
    ) -> RepoResult<Page<OpportunitySummary>>;

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<OpportunitySummary>>;

    /// Insert with the stage resolved inside the tenant. Without a
    /// `stage_id` the tenant's first stage is used when there is one.
    async fn create(&self, opportunity: Opportunity) -> RepoResult<WriteOutcome<Opportunity>>;

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &OpportunityPatch,
        actor: Option<i32>,
    ) -> RepoResult<WriteOutcome<Opportunity>>;

    async fn dependents(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<OpportunityDependents>>;

    async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> RepoResult<DeleteOutcome<OpportunityDependents>>;

    async fn relations(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<OpportunityRelations>>;

    async fn stage_history(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Vec<StageHistoryEntry>>>;

    /// Explicit stage move: history row plus stage, name and probability
    /// re-synced on the opportunity, in one transaction.
    async fn move_stage(
        &self,
        tenant_id: i32,
        id: Uuid,
        stage_id: Uuid,
        actor: i32,
        reason: Option<String>,
    ) -> RepoResult<WriteOutcome<StageHistoryEntry>>;

    /// Moves `user_id` recorded with a reason, newest first
    async fn stage_history_details(
        &self,
        tenant_id: i32,
        id: Uuid,
        user_id: i32,
    ) -> RepoResult<Option<Vec<StageHistoryEntry>>>;

    async fn pipeline(&self, tenant_id: i32) -> RepoResult<Vec<PipelineColumn>>;
}

#[derive(Clone)]
pub struct PgOpportunityRepository {
    pool: PgPool,
}

impl PgOpportunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn find_stage(conn: &mut PgConnection, tenant_id: i32, stage_id: Uuid) -> RepoResult<Option<Stage>> {
    let stage = sqlx::query_as::<_, Stage>("SELECT * FROM opportunity_stages WHERE id = $1 AND tenant_id = $2")
        .bind(stage_id)
        .bind(tenant_id)
        .fetch_optional(conn)
        .await?;
    Ok(stage)
}

async fn record_stage(
    conn: &mut PgConnection,
    opportunity: &Opportunity,
    from_stage_id: Option<Uuid>,
    actor: Option<i32>,
    reason: Option<&str>,
) -> RepoResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO opportunity_stage_history
            (id, tenant_id, opportunity_id, stage_id, from_stage_id, entered_at, created_by, reason)
        VALUES ($1, $2, $3, $4, $5, NOW(), $6, $7)
        "#,
    )
    .bind(id)
    .bind(opportunity.tenant_id)
    .bind(opportunity.id)
    .bind(opportunity.stage_id)
    .bind(from_stage_id)
    .bind(actor)
    .bind(reason)
    .execute(conn)
    .await?;
    Ok(id)
}

const HISTORY_SELECT: &str = r#"
    SELECT h.id, h.opportunity_id, h.stage_id, h.from_stage_id,
           s.name AS stage_name, fs.name AS from_stage_name,
           h.entered_at, h.created_by, h.reason
    FROM opportunity_stage_history h
    LEFT JOIN opportunity_stages s ON s.id = h.stage_id AND s.tenant_id = h.tenant_id
    LEFT JOIN opportunity_stages fs ON fs.id = h.from_stage_id AND fs.tenant_id = h.tenant_id
"#;

fn apply_filters(q: &mut ScopedQuery, filters: &ParsedOpportunityFilters) {
    if let Some(term) = &filters.search {
        q.and_search(&SEARCH_COLUMNS, term);
    }
    if let Some(stage_id) = filters.stage_id {
        q.and_eq("o.stage_id", stage_id);
    }
    if let Some(account_id) = filters.account_id {
        q.and_eq("o.account_id", account_id);
    }
    if let Some(min) = filters.min_amount {
        q.and_cmp("o.amount", ">=", min);
    }
    if let Some(max) = filters.max_amount {
        q.and_cmp("o.amount", "<=", max);
    }
    if let Some(from) = filters.close_from {
        q.and_cmp("o.expected_close_date", ">=", from);
    }
    if let Some(to) = filters.close_to {
        q.and_cmp("o.expected_close_date", "<=", to);
    }
}

#[async_trait]
impl OpportunityRepository for PgOpportunityRepository {
    async fn list(
        &self,
        tenant_id: i32,
        filters: &ParsedOpportunityFilters,
        page: &PageRequest,
    ) -> RepoResult<Page<OpportunitySummary>> {
        let mut q = ScopedQuery::new("o.tenant_id", tenant_id);
        apply_filters(&mut q, filters);

        let where_sql = q.where_sql();
        let count = q.finish(format!("{} {}", SUMMARY_COUNT, where_sql));
        let (total,): (i64,) = query_as_with(&count).fetch_one(&self.pool).await?;

        let window = q.page_sql(page);
        let sql = q.finish(format!(
            "{} {} ORDER BY o.expected_close_date ASC NULLS LAST, o.id{}",
            SUMMARY_SELECT, where_sql, window
        ));
        let rows = query_as_with::<OpportunitySummary>(&sql).fetch_all(&self.pool).await?;
        Ok(Page { rows, total })
    }

    async fn search(
        &self,
        tenant_id: i32,
        term: &str,
        filters: &OpportunitySearchFilters,
        window: &SearchWindow,
    ) -> RepoResult<Page<OpportunitySummary>> {
        let mut q = ScopedQuery::new("o.tenant_id", tenant_id);
        q.and_search(&SEARCH_COLUMNS, term);
        if let Some(stage_id) = filters.stage_id {
            q.and_eq("o.stage_id", stage_id);
        }
        if let Some(account_id) = filters.account_id {
            q.and_eq("o.account_id", account_id);
        }

        let where_sql = q.where_sql();
        let count = q.finish(format!("{} {}", SUMMARY_COUNT, where_sql));
        let (total,): (i64,) = query_as_with(&count).fetch_one(&self.pool).await?;

        let limit = q.window_sql(window.limit, window.offset);
        let sql = q.finish(format!(
            "{} {} ORDER BY o.created_at DESC, o.id{}",
            SUMMARY_SELECT, where_sql, limit
        ));
        let rows = query_as_with::<OpportunitySummary>(&sql).fetch_all(&self.pool).await?;
        Ok(Page { rows, total })
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<OpportunitySummary>> {
        let row = sqlx::query_as::<_, OpportunitySummary>(&format!(
            "{} WHERE o.tenant_id = $1 AND o.id = $2",
            SUMMARY_SELECT
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create(&self, mut opportunity: Opportunity) -> RepoResult<WriteOutcome<Opportunity>> {
        let mut tx = self.pool.begin().await?;
        let tenant_id = opportunity.tenant_id;

        if !row_exists(&mut tx, "accounts", tenant_id, opportunity.account_id).await? {
            return Ok(WriteOutcome::Missing(account::NOT_FOUND));
        }

        let stage = match opportunity.stage_id {
            Some(stage_id) => match find_stage(&mut tx, tenant_id, stage_id).await? {
                Some(stage) => Some(stage),
                None => return Ok(WriteOutcome::Missing(STAGE_NOT_FOUND)),
            },
            None => {
                sqlx::query_as::<_, Stage>(
                    "SELECT * FROM opportunity_stages WHERE tenant_id = $1 ORDER BY order_index, id LIMIT 1",
                )
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await?
            }
        };
        if let Some(stage) = &stage {
            opportunity.stage_id = Some(stage.id);
            opportunity.stage = Some(stage.name.clone());
            opportunity.probability = Some(stage.weight_percentage);
        }

        let created = sqlx::query_as::<_, Opportunity>(
            r#"
            INSERT INTO opportunities (
                id, tenant_id, name, account_id, amount, stage, stage_id, expected_close_date,
                actual_close_date, probability, description, lead_source, custom_fields, owner_id,
                created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(opportunity.id)
        .bind(tenant_id)
        .bind(&opportunity.name)
        .bind(opportunity.account_id)
        .bind(opportunity.amount)
        .bind(&opportunity.stage)
        .bind(opportunity.stage_id)
        .bind(opportunity.expected_close_date)
        .bind(opportunity.actual_close_date)
        .bind(opportunity.probability)
        .bind(&opportunity.description)
        .bind(&opportunity.lead_source)
        .bind(&opportunity.custom_fields)
        .bind(opportunity.owner_id)
        .bind(opportunity.created_by)
        .bind(opportunity.updated_by)
        .bind(opportunity.created_at)
        .bind(opportunity.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        if created.stage_id.is_some() {
            // First history row points back at its own stage
            record_stage(&mut tx, &created, created.stage_id, created.created_by, None).await?;
        }

        tx.commit().await?;
        Ok(WriteOutcome::Written(created))
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &OpportunityPatch,
        actor: Option<i32>,
    ) -> RepoResult<WriteOutcome<Opportunity>> {
        let mut tx = self.pool.begin().await?;

        let Some(current) =
            sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(WriteOutcome::Missing(opportunity::NOT_FOUND));
        };

        if let Some(account_id) = patch.account_id {
            if !row_exists(&mut tx, "accounts", tenant_id, account_id).await? {
                return Ok(WriteOutcome::Missing(account::NOT_FOUND));
            }
        }

        let stage = match patch.stage_id {
            Some(stage_id) => match find_stage(&mut tx, tenant_id, stage_id).await? {
                Some(stage) => Some(stage),
                None => return Ok(WriteOutcome::Missing(STAGE_NOT_FOUND)),
            },
            None => None,
        };

        let mut set = match &stage {
            Some(stage) => {
                // probability follows the stage whenever the stage is set
                let mut patch = patch.clone();
                patch.probability = None;
                let mut set = patch.assignments();
                set.set("stage_id", stage.id)
                    .set("stage", stage.name.clone())
                    .set("probability", stage.weight_percentage);
                set
            }
            None => patch.assignments(),
        };
        set.set("updated_by", actor).touch("updated_at = NOW()");
        let sql = set.into_update("opportunities", id, tenant_id);
        let updated = query_as_with::<Opportunity>(&sql).fetch_one(&mut *tx).await?;

        if updated.stage_id != current.stage_id {
            record_stage(&mut tx, &updated, current.stage_id, actor, None).await?;
        }

        tx.commit().await?;
        Ok(WriteOutcome::Written(updated))
    }

    async fn dependents(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<OpportunityDependents>> {
        let mut conn = self.pool.acquire().await?;
        if !row_exists(&mut conn, "opportunities", tenant_id, id).await? {
            return Ok(None);
        }
        let (contact_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM opportunity_contacts WHERE tenant_id = $1 AND opportunity_id = $2")
                .bind(tenant_id)
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(Some(OpportunityDependents { contact_count }))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> RepoResult<DeleteOutcome<OpportunityDependents>> {
        let mut tx = self.pool.begin().await?;

        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM opportunities WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await?;
        if found.is_none() {
            return Ok(DeleteOutcome::Missing);
        }

        let (contact_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM opportunity_contacts WHERE tenant_id = $1 AND opportunity_id = $2")
                .bind(tenant_id)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if contact_count > 0 && !force {
            return Ok(DeleteOutcome::Blocked(OpportunityDependents { contact_count }));
        }

        let mut removed = OpportunityDependents::default();
        if force {
            removed.contact_count =
                sqlx::query("DELETE FROM opportunity_contacts WHERE tenant_id = $1 AND opportunity_id = $2")
                    .bind(tenant_id)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected() as i64;
        }

        sqlx::query("DELETE FROM opportunity_stage_history WHERE tenant_id = $1 AND opportunity_id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM opportunities WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DeleteOutcome::Deleted(removed))
    }

    async fn relations(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<OpportunityRelations>> {
        let Some(opportunity) =
            sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1 AND tenant_id = $2")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 AND tenant_id = $2")
            .bind(opportunity.account_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        let contacts = sqlx::query_as::<_, OpportunityContactView>(&format!(
            "{} WHERE oc.tenant_id = $1 AND oc.opportunity_id = $2 ORDER BY c.last_name, c.first_name, oc.id",
            OPPORTUNITY_CONTACT_VIEW
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(OpportunityRelations { opportunity, account, contacts }))
    }

    async fn stage_history(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Vec<StageHistoryEntry>>> {
        let mut conn = self.pool.acquire().await?;
        if !row_exists(&mut conn, "opportunities", tenant_id, id).await? {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, StageHistoryEntry>(&format!(
            "{} WHERE h.tenant_id = $1 AND h.opportunity_id = $2 ORDER BY h.entered_at, h.id",
            HISTORY_SELECT
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(Some(rows))
    }

    async fn move_stage(
        &self,
        tenant_id: i32,
        id: Uuid,
        stage_id: Uuid,
        actor: i32,
        reason: Option<String>,
    ) -> RepoResult<WriteOutcome<StageHistoryEntry>> {
        let mut tx = self.pool.begin().await?;

        let Some(current) =
            sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(WriteOutcome::Missing(opportunity::NOT_FOUND));
        };
        let Some(stage) = find_stage(&mut tx, tenant_id, stage_id).await? else {
            return Ok(WriteOutcome::Missing(STAGE_NOT_FOUND));
        };

        let moved = sqlx::query_as::<_, Opportunity>(
            r#"
            UPDATE opportunities
            SET stage_id = $3, stage = $4, probability = $5, updated_by = $6, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(stage.id)
        .bind(&stage.name)
        .bind(stage.weight_percentage)
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        let entry_id = record_stage(&mut tx, &moved, current.stage_id, Some(actor), reason.as_deref()).await?;
        let entry = sqlx::query_as::<_, StageHistoryEntry>(&format!("{} WHERE h.id = $1", HISTORY_SELECT))
            .bind(entry_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(entry))
    }

    async fn stage_history_details(
        &self,
        tenant_id: i32,
        id: Uuid,
        user_id: i32,
    ) -> RepoResult<Option<Vec<StageHistoryEntry>>> {
        let mut conn = self.pool.acquire().await?;
        if !row_exists(&mut conn, "opportunities", tenant_id, id).await? {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, StageHistoryEntry>(&format!(
            "{} WHERE h.tenant_id = $1 AND h.opportunity_id = $2 AND h.created_by = $3 AND h.reason IS NOT NULL \
             ORDER BY h.entered_at DESC, h.id",
            HISTORY_SELECT
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(Some(rows))
    }

    async fn pipeline(&self, tenant_id: i32) -> RepoResult<Vec<PipelineColumn>> {
        let stages = sqlx::query_as::<_, Stage>(
            "SELECT * FROM opportunity_stages WHERE tenant_id = $1 ORDER BY order_index, id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, OpportunitySummary>(&format!(
            "{} WHERE o.tenant_id = $1 AND o.stage_id IS NOT NULL \
             ORDER BY o.expected_close_date ASC NULLS LAST, o.id",
            SUMMARY_SELECT
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(PipelineColumn::group(stages, rows))
    }
}
