use async_trait::async_trait;
use futures::try_join;
use sqlx::PgPool;

use super::dashboard::pipeline_summary;
use super::RepoResult;
use crate::database::models::tenant::{QuickStats, RecentItem, TenantDashboard, TenantOverview};
use crate::database::models::{Company, Tenant, TenantPatch, TenantSettings, TenantStats};
use crate::database::query_builder::query_as_with;

/// What the tenant resolver needs from storage
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn company_exists(&self, company_id: i32) -> RepoResult<bool>;

    async fn find_tenant(&self, tenant_id: i32) -> RepoResult<Option<Tenant>>;

    /// Insert a tenant mirroring the company. Returns the new row, or `None`
    /// when nothing was inserted because the tenant already exists (or the
    /// company vanished in between).
    async fn create_tenant_from_company(&self, company_id: i32) -> RepoResult<Option<Tenant>>;
}

#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn company_exists(&self, company_id: i32) -> RepoResult<bool> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM company WHERE id = $1)")
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn find_tenant(&self, tenant_id: i32) -> RepoResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn create_tenant_from_company(&self, company_id: i32) -> RepoResult<Option<Tenant>> {
        // ON CONFLICT keeps concurrent first requests for the same company idempotent
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, name, subdomain, is_active, created_at, updated_at)
            SELECT id, name, domain, true, NOW(), NOW() FROM company WHERE id = $1
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }
}

/// Reads and writes behind the `/tenant` endpoints
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn overview(&self, tenant_id: i32) -> RepoResult<Option<TenantOverview>>;

    async fn update(&self, tenant_id: i32, patch: &TenantPatch) -> RepoResult<Option<Tenant>>;

    async fn settings(&self, tenant_id: i32) -> RepoResult<Option<TenantSettings>>;

    async fn dashboard(&self, tenant_id: i32) -> RepoResult<TenantDashboard>;
}

#[derive(Clone)]
pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn stats(&self, tenant_id: i32) -> RepoResult<TenantStats> {
        let stats = sqlx::query_as::<_, TenantStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM accounts WHERE tenant_id = $1) AS account_count,
                (SELECT COUNT(*) FROM contacts WHERE tenant_id = $1) AS contact_count,
                (SELECT COUNT(*) FROM opportunities WHERE tenant_id = $1) AS opportunity_count,
                (SELECT COUNT(*) FROM opportunity_stages WHERE tenant_id = $1) AS stage_count,
                (SELECT COUNT(*) FROM custom_field_definitions WHERE tenant_id = $1) AS custom_field_count
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn recent(&self, sql: &str, tenant_id: i32) -> RepoResult<Vec<RecentItem>> {
        let rows = sqlx::query_as::<_, RecentItem>(sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn quick_stats(&self, tenant_id: i32) -> RepoResult<QuickStats> {
        let stats = sqlx::query_as::<_, QuickStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM accounts WHERE tenant_id = $1) AS total_accounts,
                (SELECT COUNT(*) FROM contacts WHERE tenant_id = $1) AS total_contacts,
                (SELECT COUNT(*) FROM opportunities WHERE tenant_id = $1) AS total_opportunities,
                (SELECT COALESCE(SUM(o.amount), 0)
                   FROM opportunities o
                   LEFT JOIN opportunity_stages s ON s.id = o.stage_id AND s.tenant_id = o.tenant_id
                  WHERE o.tenant_id = $1
                    AND NOT COALESCE(s.is_closed_won OR s.is_closed_lost, false)) AS total_pipeline_value
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

const RECENT_ACCOUNTS: &str =
    "SELECT id, name, created_at FROM accounts WHERE tenant_id = $1 ORDER BY created_at DESC, id LIMIT 5";
const RECENT_CONTACTS: &str = "SELECT id, first_name || ' ' || last_name AS name, created_at FROM contacts \
     WHERE tenant_id = $1 ORDER BY created_at DESC, id LIMIT 5";
const RECENT_OPPORTUNITIES: &str =
    "SELECT id, name, created_at FROM opportunities WHERE tenant_id = $1 ORDER BY created_at DESC, id LIMIT 5";

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn overview(&self, tenant_id: i32) -> RepoResult<Option<TenantOverview>> {
        let Some(tenant) = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let company = sqlx::query_as::<_, Company>(
            "SELECT id, name, domain, industry, size FROM company WHERE id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let stats = self.stats(tenant_id).await?;
        Ok(Some(TenantOverview { tenant, company, stats }))
    }

    async fn update(&self, tenant_id: i32, patch: &TenantPatch) -> RepoResult<Option<Tenant>> {
        let mut set = patch.assignments();
        set.touch("updated_at = NOW()");
        let sql = set.into_update_by("tenants", "id", tenant_id);
        let tenant = query_as_with::<Tenant>(&sql).fetch_optional(&self.pool).await?;
        Ok(tenant)
    }

    async fn settings(&self, tenant_id: i32) -> RepoResult<Option<TenantSettings>> {
        let settings = sqlx::query_as::<_, TenantSettings>(
            r#"
            SELECT t.*,
                   c.name AS company_name,
                   c.domain AS company_domain,
                   c.industry AS company_industry,
                   c.size AS company_size
            FROM tenants t
            LEFT JOIN company c ON c.id = t.id
            WHERE t.id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn dashboard(&self, tenant_id: i32) -> RepoResult<TenantDashboard> {
        let (recent_accounts, recent_contacts, recent_opportunities, pipeline_summary, quick_stats) = try_join!(
            self.recent(RECENT_ACCOUNTS, tenant_id),
            self.recent(RECENT_CONTACTS, tenant_id),
            self.recent(RECENT_OPPORTUNITIES, tenant_id),
            pipeline_summary(&self.pool, tenant_id),
            self.quick_stats(tenant_id),
        )?;

        Ok(TenantDashboard {
            recent_accounts,
            recent_contacts,
            recent_opportunities,
            pipeline_summary,
            quick_stats,
        })
    }
}
