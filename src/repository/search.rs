use async_trait::async_trait;
use sqlx::PgPool;

use super::RepoResult;
use crate::database::models::search::{rank, SearchHit, SearchRow};

const ACCOUNT_HITS: &str = r#"
    SELECT 'account' AS entity_type, id, name AS display_name, created_at,
           jsonb_build_object('description', description, 'industry', industry) AS details
    FROM accounts
    WHERE tenant_id = $1 AND (name ILIKE $2 OR description ILIKE $2 OR industry ILIKE $2)
    ORDER BY LOWER(name) = LOWER($3) DESC, created_at DESC, id
    LIMIT $4
"#;

const CONTACT_HITS: &str = r#"
    SELECT 'contact' AS entity_type, id, CONCAT(first_name, ' ', last_name) AS display_name, created_at,
           jsonb_build_object('email', email, 'title', title, 'department', department) AS details
    FROM contacts
    WHERE tenant_id = $1 AND (
        first_name ILIKE $2 OR last_name ILIKE $2 OR email ILIKE $2 OR title ILIKE $2 OR department ILIKE $2
    )
    ORDER BY LOWER(CONCAT(first_name, ' ', last_name)) = LOWER($3) DESC, created_at DESC, id
    LIMIT $4
"#;

const OPPORTUNITY_HITS: &str = r#"
    SELECT 'opportunity' AS entity_type, o.id, o.name AS display_name, o.created_at,
           jsonb_build_object(
               'description', o.description,
               'amount', o.amount,
               'account_name', a.name,
               'expected_close_date', o.expected_close_date
           ) AS details
    FROM opportunities o
    LEFT JOIN accounts a ON a.id = o.account_id AND a.tenant_id = o.tenant_id
    WHERE o.tenant_id = $1 AND (o.name ILIKE $2 OR o.description ILIKE $2 OR a.name ILIKE $2)
    ORDER BY LOWER(o.name) = LOWER($3) DESC, o.created_at DESC, o.id
    LIMIT $4
"#;

#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// Ranked hits across accounts, contacts and opportunities, plus the
    /// number of hits before truncation to `limit`
    async fn global(&self, tenant_id: i32, term: &str, limit: i64) -> RepoResult<(usize, Vec<SearchHit>)>;
}

#[derive(Clone)]
pub struct PgSearchRepository {
    pool: PgPool,
}

impl PgSearchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hits(&self, sql: &str, tenant_id: i32, term: &str, limit: i64) -> RepoResult<Vec<SearchRow>> {
        let rows = sqlx::query_as::<_, SearchRow>(sql)
            .bind(tenant_id)
            .bind(format!("%{}%", term))
            .bind(term)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl SearchRepository for PgSearchRepository {
    async fn global(&self, tenant_id: i32, term: &str, limit: i64) -> RepoResult<(usize, Vec<SearchHit>)> {
        let (accounts, contacts, opportunities) = futures::try_join!(
            self.hits(ACCOUNT_HITS, tenant_id, term, limit),
            self.hits(CONTACT_HITS, tenant_id, term, limit),
            self.hits(OPPORTUNITY_HITS, tenant_id, term, limit),
        )?;

        let mut hits: Vec<SearchHit> = accounts
            .into_iter()
            .chain(contacts)
            .chain(opportunities)
            .map(SearchHit::from)
            .collect();
        let total = hits.len();
        rank(&mut hits, term);
        hits.truncate(limit.max(0) as usize);
        Ok((total, hits))
    }
}
