use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::account_contact::VIEW_SELECT as ACCOUNT_CONTACT_VIEW;
use super::opportunity::SUMMARY_SELECT as OPPORTUNITY_SUMMARY;
use super::{DeleteOutcome, Page, RepoResult, WriteOutcome};
use crate::database::models::account::{self, AccountPipelineRow, AccountSearchFilters, EMAIL_TAKEN, NAME_TAKEN};
use crate::database::models::{
    clean, Account, AccountContactView, AccountDependents, AccountFilters, AccountPatch, AccountRelations,
    AccountSummary, OpportunitySummary,
};
use crate::database::pagination::{PageRequest, SearchWindow};
use crate::database::query_builder::{lock_table, query_as_with, ScopedQuery, TableLock};

pub(crate) const SEARCH_COLUMNS: [&str; 5] = ["a.name", "a.description", "a.industry", "a.website", "a.email"];

const SUMMARY_COLUMNS: &str = r#"
    (SELECT COUNT(*) FROM account_contacts ac
      WHERE ac.account_id = a.id AND ac.tenant_id = a.tenant_id) AS contact_count,
    (SELECT COUNT(*) FROM opportunities o
      WHERE o.account_id = a.id AND o.tenant_id = a.tenant_id) AS opportunity_count,
    COALESCE((
        SELECT ROUND(100.0 * COUNT(*) FILTER (WHERE s.is_closed_won) / NULLIF(COUNT(*), 0), 2)
        FROM opportunities o
        LEFT JOIN opportunity_stages s ON s.id = o.stage_id AND s.tenant_id = o.tenant_id
        WHERE o.account_id = a.id AND o.tenant_id = a.tenant_id
    ), 0)::float8 AS opportunities_percentage
"#;

const EXISTS_CONTACTS: &str =
    "EXISTS (SELECT 1 FROM account_contacts ac WHERE ac.account_id = a.id AND ac.tenant_id = a.tenant_id)";
const EXISTS_OPPORTUNITIES: &str =
    "EXISTS (SELECT 1 FROM opportunities o WHERE o.account_id = a.id AND o.tenant_id = a.tenant_id)";

pub(crate) fn exists_clause(exists: &str, wanted: bool) -> String {
    if wanted {
        exists.to_string()
    } else {
        format!("NOT {}", exists)
    }
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn list(&self, tenant_id: i32, filters: &AccountFilters, page: &PageRequest) -> RepoResult<Page<AccountSummary>>;

    async fn search(
        &self,
        tenant_id: i32,
        term: &str,
        filters: &AccountSearchFilters,
        window: &SearchWindow,
    ) -> RepoResult<Page<Account>>;

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Account>>;

    /// Insert unless the name or email is already used in the tenant
    async fn create(&self, account: Account) -> RepoResult<WriteOutcome<Account>>;

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &AccountPatch,
        actor: Option<i32>,
    ) -> RepoResult<WriteOutcome<Account>>;

    async fn dependents(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<AccountDependents>>;

    /// Delete the account; with `force` its contact links and opportunities
    /// go first and the removed counts are returned
    async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> RepoResult<DeleteOutcome<AccountDependents>>;

    async fn relations(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<AccountRelations>>;

    async fn pipeline(&self, tenant_id: i32) -> RepoResult<Vec<AccountPipelineRow>>;
}

#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn find_conflict(
    conn: &mut PgConnection,
    tenant_id: i32,
    exclude: Option<Uuid>,
    name: &str,
    email: Option<&str>,
) -> RepoResult<Option<&'static str>> {
    let (name_taken,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE tenant_id = $1 AND name = $2 \
         AND ($3::uuid IS NULL OR id <> $3))",
    )
    .bind(tenant_id)
    .bind(name)
    .bind(exclude)
    .fetch_one(&mut *conn)
    .await?;
    if name_taken {
        return Ok(Some(NAME_TAKEN));
    }

    if let Some(email) = email {
        let (email_taken,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE tenant_id = $1 AND LOWER(email) = LOWER($2) \
             AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(tenant_id)
        .bind(email)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;
        if email_taken {
            return Ok(Some(EMAIL_TAKEN));
        }
    }
    Ok(None)
}

async fn count_dependents(conn: &mut PgConnection, tenant_id: i32, id: Uuid) -> RepoResult<AccountDependents> {
    let (contact_count, opportunity_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM account_contacts WHERE tenant_id = $1 AND account_id = $2),
            (SELECT COUNT(*) FROM opportunities WHERE tenant_id = $1 AND account_id = $2)
        "#,
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_one(conn)
    .await?;
    Ok(AccountDependents { contact_count, opportunity_count })
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn list(&self, tenant_id: i32, filters: &AccountFilters, page: &PageRequest) -> RepoResult<Page<AccountSummary>> {
        let mut q = ScopedQuery::new("a.tenant_id", tenant_id);
        if let Some(term) = filters.search_term() {
            q.and_search(&SEARCH_COLUMNS, &term);
        }
        if let Some(industry) = clean(&filters.industry) {
            q.and_eq("a.industry", industry);
        }
        if let Some(account_type) = clean(&filters.account_type) {
            q.and_eq("a.account_type", account_type);
        }
        if let Some(wanted) = filters.has_contacts() {
            q.and(exists_clause(EXISTS_CONTACTS, wanted));
        }
        if let Some(wanted) = filters.has_opportunities() {
            q.and(exists_clause(EXISTS_OPPORTUNITIES, wanted));
        }

        let where_sql = q.where_sql();
        let count = q.finish(format!("SELECT COUNT(*) FROM accounts a {}", where_sql));
        let (total,): (i64,) = query_as_with(&count).fetch_one(&self.pool).await?;

        let window = q.page_sql(page);
        let sql = q.finish(format!(
            "SELECT a.*, {} FROM accounts a {} ORDER BY a.name, a.id{}",
            SUMMARY_COLUMNS, where_sql, window
        ));
        let rows = query_as_with::<AccountSummary>(&sql).fetch_all(&self.pool).await?;
        Ok(Page { rows, total })
    }

    async fn search(
        &self,
        tenant_id: i32,
        term: &str,
        filters: &AccountSearchFilters,
        window: &SearchWindow,
    ) -> RepoResult<Page<Account>> {
        let mut q = ScopedQuery::new("a.tenant_id", tenant_id);
        q.and_search(&SEARCH_COLUMNS, term);
        if let Some(industry) = clean(&filters.industry) {
            q.and_eq("a.industry", industry);
        }
        if let Some(account_type) = clean(&filters.account_type) {
            q.and_eq("a.account_type", account_type);
        }

        let where_sql = q.where_sql();
        let count = q.finish(format!("SELECT COUNT(*) FROM accounts a {}", where_sql));
        let (total,): (i64,) = query_as_with(&count).fetch_one(&self.pool).await?;

        let limit = q.window_sql(window.limit, window.offset);
        let sql = q.finish(format!("SELECT a.* FROM accounts a {} ORDER BY a.name, a.id{}", where_sql, limit));
        let rows = query_as_with::<Account>(&sql).fetch_all(&self.pool).await?;
        Ok(Page { rows, total })
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn create(&self, account: Account) -> RepoResult<WriteOutcome<Account>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, account.tenant_id, TableLock::Accounts).await?;

        if let Some(rule) =
            find_conflict(&mut tx, account.tenant_id, None, &account.name, account.email.as_deref()).await?
        {
            return Ok(WriteOutcome::Conflict(rule));
        }

        let created = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (
                id, tenant_id, name, description, industry, account_type, website, phone, email,
                billing_address, shipping_address, custom_fields, created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(account.id)
        .bind(account.tenant_id)
        .bind(&account.name)
        .bind(&account.description)
        .bind(&account.industry)
        .bind(&account.account_type)
        .bind(&account.website)
        .bind(&account.phone)
        .bind(&account.email)
        .bind(&account.billing_address)
        .bind(&account.shipping_address)
        .bind(&account.custom_fields)
        .bind(account.created_by)
        .bind(account.updated_by)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(created))
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &AccountPatch,
        actor: Option<i32>,
    ) -> RepoResult<WriteOutcome<Account>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, tenant_id, TableLock::Accounts).await?;

        let Some(mut candidate) =
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(WriteOutcome::Missing(account::NOT_FOUND));
        };

        if patch.name.is_some() || patch.email.is_some() {
            patch.apply(&mut candidate);
            if let Some(rule) =
                find_conflict(&mut tx, tenant_id, Some(id), &candidate.name, candidate.email.as_deref()).await?
            {
                return Ok(WriteOutcome::Conflict(rule));
            }
        }

        let mut set = patch.assignments();
        set.set("updated_by", actor).touch("updated_at = NOW()");
        let sql = set.into_update("accounts", id, tenant_id);
        let updated = query_as_with::<Account>(&sql).fetch_one(&mut *tx).await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(updated))
    }

    async fn dependents(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<AccountDependents>> {
        let mut conn = self.pool.acquire().await?;
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1 AND tenant_id = $2)")
            .bind(id)
            .bind(tenant_id)
            .fetch_one(&mut *conn)
            .await?;
        if !exists {
            return Ok(None);
        }
        count_dependents(&mut conn, tenant_id, id).await.map(Some)
    }

    async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> RepoResult<DeleteOutcome<AccountDependents>> {
        let mut tx = self.pool.begin().await?;

        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM accounts WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await?;
        if found.is_none() {
            return Ok(DeleteOutcome::Missing);
        }

        let dependents = count_dependents(&mut tx, tenant_id, id).await?;
        if dependents.any() && !force {
            return Ok(DeleteOutcome::Blocked(dependents));
        }

        let mut removed = AccountDependents::default();
        if force {
            sqlx::query(
                "DELETE FROM opportunity_contacts WHERE tenant_id = $1 AND opportunity_id IN \
                 (SELECT id FROM opportunities WHERE tenant_id = $1 AND account_id = $2)",
            )
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "DELETE FROM opportunity_stage_history WHERE tenant_id = $1 AND opportunity_id IN \
                 (SELECT id FROM opportunities WHERE tenant_id = $1 AND account_id = $2)",
            )
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            removed.opportunity_count = sqlx::query("DELETE FROM opportunities WHERE tenant_id = $1 AND account_id = $2")
                .bind(tenant_id)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected() as i64;
            removed.contact_count = sqlx::query("DELETE FROM account_contacts WHERE tenant_id = $1 AND account_id = $2")
                .bind(tenant_id)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected() as i64;
        }

        // Hierarchy edges are not dependent data; they go with the account
        sqlx::query(
            "DELETE FROM account_relationships WHERE tenant_id = $1 AND (parent_account_id = $2 OR child_account_id = $2)",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM accounts WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DeleteOutcome::Deleted(removed))
    }

    async fn relations(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<AccountRelations>> {
        let Some(account) = self.find(tenant_id, id).await? else {
            return Ok(None);
        };

        let contacts = sqlx::query_as::<_, AccountContactView>(&format!(
            "{} WHERE ac.tenant_id = $1 AND ac.account_id = $2 \
             ORDER BY ac.is_primary DESC, c.last_name, c.first_name, ac.id",
            ACCOUNT_CONTACT_VIEW
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let opportunities = sqlx::query_as::<_, OpportunitySummary>(&format!(
            "{} WHERE o.tenant_id = $1 AND o.account_id = $2 ORDER BY o.expected_close_date DESC, o.id",
            OPPORTUNITY_SUMMARY
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(AccountRelations { account, contacts, opportunities }))
    }

    async fn pipeline(&self, tenant_id: i32) -> RepoResult<Vec<AccountPipelineRow>> {
        let rows = sqlx::query_as::<_, AccountPipelineRow>(
            r#"
            SELECT o.id AS opportunity_id,
                   o.name AS opportunity_name,
                   a.id AS account_id,
                   a.name AS account_name,
                   s.id AS stage_id,
                   s.name AS stage_name,
                   s.weight_percentage,
                   o.amount,
                   o.probability,
                   o.owner_id,
                   o.expected_close_date,
                   (SELECT c.first_name || ' ' || c.last_name
                      FROM account_contacts ac
                      JOIN contacts c ON c.id = ac.contact_id AND c.tenant_id = ac.tenant_id
                     WHERE ac.account_id = a.id AND ac.tenant_id = a.tenant_id AND ac.is_primary
                     ORDER BY ac.created_at, ac.id
                     LIMIT 1) AS primary_contact_name
            FROM opportunities o
            JOIN accounts a ON a.id = o.account_id AND a.tenant_id = o.tenant_id
            LEFT JOIN opportunity_stages s ON s.id = o.stage_id AND s.tenant_id = o.tenant_id
            WHERE o.tenant_id = $1
            ORDER BY s.order_index ASC NULLS LAST, o.expected_close_date ASC NULLS LAST, o.id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
