use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{RepoResult, WriteOutcome};
use crate::database::models::account_contact::DUPLICATE;
use crate::database::models::{account, contact};
use crate::database::models::{AccountContact, AccountContactFilters, AccountContactPatch, AccountContactView};
use crate::database::query_builder::{lock_table, query_as_with, ScopedQuery, TableLock};

/// Link rows joined with the account name and contact details
pub(crate) const VIEW_SELECT: &str = r#"
    SELECT ac.*, a.name AS account_name, c.first_name, c.last_name, c.email, c.phone, c.title
    FROM account_contacts ac
    JOIN accounts a ON a.id = ac.account_id AND a.tenant_id = ac.tenant_id
    JOIN contacts c ON c.id = ac.contact_id AND c.tenant_id = ac.tenant_id
"#;

#[async_trait]
pub trait AccountContactRepository: Send + Sync {
    /// Link a contact to an account; both must exist in the link's tenant
    async fn create(&self, link: AccountContact) -> RepoResult<WriteOutcome<AccountContact>>;

    async fn list(&self, tenant_id: i32, filters: &AccountContactFilters) -> RepoResult<Vec<AccountContactView>>;

    async fn update(&self, tenant_id: i32, id: Uuid, patch: &AccountContactPatch) -> RepoResult<Option<AccountContact>>;

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<bool>;
}

#[derive(Clone)]
pub struct PgAccountContactRepository {
    pool: PgPool,
}

impl PgAccountContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `SELECT EXISTS` on a tenant-scoped row by id
pub(crate) async fn row_exists(conn: &mut PgConnection, table: &str, tenant_id: i32, id: Uuid) -> RepoResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND tenant_id = $2)",
        table
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

#[async_trait]
impl AccountContactRepository for PgAccountContactRepository {
    async fn create(&self, link: AccountContact) -> RepoResult<WriteOutcome<AccountContact>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, link.tenant_id, TableLock::AccountContacts).await?;

        if !row_exists(&mut tx, "accounts", link.tenant_id, link.account_id).await? {
            return Ok(WriteOutcome::Missing(account::NOT_FOUND));
        }
        if !row_exists(&mut tx, "contacts", link.tenant_id, link.contact_id).await? {
            return Ok(WriteOutcome::Missing(contact::NOT_FOUND));
        }

        let (duplicate,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM account_contacts WHERE tenant_id = $1 AND account_id = $2 AND contact_id = $3)",
        )
        .bind(link.tenant_id)
        .bind(link.account_id)
        .bind(link.contact_id)
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Ok(WriteOutcome::Conflict(DUPLICATE));
        }

        let created = sqlx::query_as::<_, AccountContact>(
            r#"
            INSERT INTO account_contacts (
                id, tenant_id, account_id, contact_id, role, is_primary, relationship_type, description, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(link.id)
        .bind(link.tenant_id)
        .bind(link.account_id)
        .bind(link.contact_id)
        .bind(&link.role)
        .bind(link.is_primary)
        .bind(&link.relationship_type)
        .bind(&link.description)
        .bind(link.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(created))
    }

    async fn list(&self, tenant_id: i32, filters: &AccountContactFilters) -> RepoResult<Vec<AccountContactView>> {
        let mut q = ScopedQuery::new("ac.tenant_id", tenant_id);
        if let Some(account_id) = filters.account_id {
            q.and_eq("ac.account_id", account_id);
        }
        if let Some(contact_id) = filters.contact_id {
            q.and_eq("ac.contact_id", contact_id);
        }
        let sql = q.finish(format!("{} {} ORDER BY ac.created_at DESC, ac.id", VIEW_SELECT, q.where_sql()));
        let rows = query_as_with::<AccountContactView>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn update(&self, tenant_id: i32, id: Uuid, patch: &AccountContactPatch) -> RepoResult<Option<AccountContact>> {
        let sql = patch.assignments().into_update("account_contacts", id, tenant_id);
        let link = query_as_with::<AccountContact>(&sql).fetch_optional(&self.pool).await?;
        Ok(link)
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM account_contacts WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
