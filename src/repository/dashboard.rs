use async_trait::async_trait;
use sqlx::PgPool;

use super::RepoResult;
use crate::database::models::dashboard::DashboardOpportunity;
use crate::database::models::tenant::PipelineSummaryRow;

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// Opportunities owned by `owner_id` whose stage is not closed
    async fn open_opportunities(&self, tenant_id: i32, owner_id: i32) -> RepoResult<Vec<DashboardOpportunity>>;

    async fn pipeline_summary(&self, tenant_id: i32) -> RepoResult<Vec<PipelineSummaryRow>>;
}

#[derive(Clone)]
pub struct PgDashboardRepository {
    pool: PgPool,
}

impl PgDashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Opportunity count and amount per stage, in stage order
pub(crate) async fn pipeline_summary(pool: &PgPool, tenant_id: i32) -> RepoResult<Vec<PipelineSummaryRow>> {
    let rows = sqlx::query_as::<_, PipelineSummaryRow>(
        r#"
        SELECT s.id AS stage_id,
               s.name AS stage_name,
               s.color AS stage_color,
               COUNT(o.id) AS opportunity_count,
               COALESCE(SUM(o.amount), 0) AS total_amount
        FROM opportunity_stages s
        LEFT JOIN opportunities o ON o.stage_id = s.id AND o.tenant_id = s.tenant_id
        WHERE s.tenant_id = $1
        GROUP BY s.id, s.name, s.color, s.order_index
        ORDER BY s.order_index, s.id
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[async_trait]
impl DashboardRepository for PgDashboardRepository {
    async fn open_opportunities(&self, tenant_id: i32, owner_id: i32) -> RepoResult<Vec<DashboardOpportunity>> {
        let rows = sqlx::query_as::<_, DashboardOpportunity>(
            r#"
            SELECT o.id, o.name, o.description, o.amount, o.probability, o.stage_id,
                   o.expected_close_date, o.actual_close_date, o.account_id, o.owner_id,
                   o.tenant_id, o.created_at, o.updated_at,
                   a.name AS account_name,
                   s.name AS stage_name,
                   COALESCE(s.is_closed_won OR s.is_closed_lost, false) AS is_stage_closed,
                   COALESCE((
                       SELECT json_agg(json_build_object(
                                  'id', c.id,
                                  'first_name', c.first_name,
                                  'last_name', c.last_name,
                                  'email', c.email,
                                  'title', c.title)
                              ORDER BY c.last_name, c.first_name)
                       FROM opportunity_contacts oc
                       JOIN contacts c ON c.id = oc.contact_id AND c.tenant_id = oc.tenant_id
                       WHERE oc.opportunity_id = o.id AND oc.tenant_id = o.tenant_id
                   ), '[]'::json) AS related_contacts
            FROM opportunities o
            LEFT JOIN accounts a ON a.id = o.account_id AND a.tenant_id = o.tenant_id
            LEFT JOIN opportunity_stages s ON s.id = o.stage_id AND s.tenant_id = o.tenant_id
            WHERE o.tenant_id = $1
              AND o.owner_id = $2
              AND NOT COALESCE(s.is_closed_won OR s.is_closed_lost, false)
            ORDER BY o.expected_close_date ASC NULLS LAST, o.amount DESC NULLS LAST, o.id
            "#,
        )
        .bind(tenant_id)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn pipeline_summary(&self, tenant_id: i32) -> RepoResult<Vec<PipelineSummaryRow>> {
        pipeline_summary(&self.pool, tenant_id).await
    }
}
