use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::account_contact::row_exists;
use super::{RepoResult, WriteOutcome};
use crate::database::models::relationship::{self, DUPLICATE};
use crate::database::models::{
    account, Account, AccountHierarchy, AccountRelationship, AccountRelationshipView, ComboUsage, RelationshipFilters,
    RelationshipPatch, RelationshipType, TypeCombo,
};
use crate::database::query_builder::{lock_table, query_as_with, ScopedQuery, TableLock};

const VIEW_SELECT: &str = r#"
    SELECT r.*, p.name AS parent_account_name, c.name AS child_account_name
    FROM account_relationships r
    JOIN accounts p ON p.id = r.parent_account_id AND p.tenant_id = r.tenant_id
    JOIN accounts c ON c.id = r.child_account_id AND c.tenant_id = r.tenant_id
"#;

#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    async fn create(&self, relationship: AccountRelationship) -> RepoResult<WriteOutcome<AccountRelationship>>;

    async fn list(&self, tenant_id: i32, filters: &RelationshipFilters) -> RepoResult<Vec<AccountRelationshipView>>;

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<AccountRelationshipView>>;

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &RelationshipPatch,
    ) -> RepoResult<WriteOutcome<AccountRelationship>>;

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<bool>;

    /// The account with the edges where it is the child (`parents`) and the
    /// parent (`children`)
    async fn hierarchy(&self, tenant_id: i32, account_id: Uuid) -> RepoResult<Option<AccountHierarchy>>;
}

#[derive(Clone)]
pub struct PgRelationshipRepository {
    pool: PgPool,
}

impl PgRelationshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn edge_exists(
    conn: &mut PgConnection,
    tenant_id: i32,
    parent: Uuid,
    child: Uuid,
    relationship_type: &str,
    except: Option<Uuid>,
) -> RepoResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM account_relationships \
         WHERE tenant_id = $1 AND parent_account_id = $2 AND child_account_id = $3 \
         AND relationship_type = $4 AND ($5::uuid IS NULL OR id <> $5))",
    )
    .bind(tenant_id)
    .bind(parent)
    .bind(child)
    .bind(relationship_type)
    .bind(except)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

#[async_trait]
impl RelationshipRepository for PgRelationshipRepository {
    async fn create(&self, relationship: AccountRelationship) -> RepoResult<WriteOutcome<AccountRelationship>> {
        let tenant_id = relationship.tenant_id;
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, tenant_id, TableLock::AccountRelationships).await?;

        for account_id in [relationship.parent_account_id, relationship.child_account_id] {
            if !row_exists(&mut tx, "accounts", tenant_id, account_id).await? {
                return Ok(WriteOutcome::Missing(account::NOT_FOUND));
            }
        }

        if edge_exists(
            &mut tx,
            tenant_id,
            relationship.parent_account_id,
            relationship.child_account_id,
            &relationship.relationship_type,
            None,
        )
        .await?
        {
            return Ok(WriteOutcome::Conflict(DUPLICATE));
        }

        let created = sqlx::query_as::<_, AccountRelationship>(
            r#"
            INSERT INTO account_relationships (
                id, tenant_id, parent_account_id, child_account_id, relationship_type, description, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(relationship.id)
        .bind(tenant_id)
        .bind(relationship.parent_account_id)
        .bind(relationship.child_account_id)
        .bind(&relationship.relationship_type)
        .bind(&relationship.description)
        .bind(relationship.created_by)
        .bind(relationship.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(created))
    }

    async fn list(&self, tenant_id: i32, filters: &RelationshipFilters) -> RepoResult<Vec<AccountRelationshipView>> {
        let mut q = ScopedQuery::new("r.tenant_id", tenant_id);
        if let Some(account_id) = filters.account_id {
            let ph = q.bind(account_id);
            q.and(format!("(r.parent_account_id = {0} OR r.child_account_id = {0})", ph));
        }
        if let Some(kind) = filters.relationship_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            q.and_eq("r.relationship_type", kind);
        }
        let sql = q.finish(format!("{} {} ORDER BY r.created_at DESC, r.id", VIEW_SELECT, q.where_sql()));
        let rows = query_as_with::<AccountRelationshipView>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<AccountRelationshipView>> {
        let row = sqlx::query_as::<_, AccountRelationshipView>(&format!(
            "{} WHERE r.tenant_id = $1 AND r.id = $2",
            VIEW_SELECT
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &RelationshipPatch,
    ) -> RepoResult<WriteOutcome<AccountRelationship>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, tenant_id, TableLock::AccountRelationships).await?;

        let Some(current) = sqlx::query_as::<_, AccountRelationship>(
            "SELECT * FROM account_relationships WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(WriteOutcome::Missing(relationship::NOT_FOUND));
        };

        if let Some(kind) = patch.relationship_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if edge_exists(&mut tx, tenant_id, current.parent_account_id, current.child_account_id, kind, Some(id))
                .await?
            {
                return Ok(WriteOutcome::Conflict(DUPLICATE));
            }
        }

        let set = patch.assignments();
        if set.is_empty() {
            return Ok(WriteOutcome::Written(current));
        }
        let sql = set.into_update("account_relationships", id, tenant_id);
        let updated = query_as_with::<AccountRelationship>(&sql).fetch_one(&mut *tx).await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(updated))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM account_relationships WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn hierarchy(&self, tenant_id: i32, account_id: Uuid) -> RepoResult<Option<AccountHierarchy>> {
        let Some(account) = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 AND tenant_id = $2")
            .bind(account_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let parents = sqlx::query_as::<_, AccountRelationshipView>(&format!(
            "{} WHERE r.tenant_id = $1 AND r.child_account_id = $2 ORDER BY p.name, r.id",
            VIEW_SELECT
        ))
        .bind(tenant_id)
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        let children = sqlx::query_as::<_, AccountRelationshipView>(&format!(
            "{} WHERE r.tenant_id = $1 AND r.parent_account_id = $2 ORDER BY c.name, r.id",
            VIEW_SELECT
        ))
        .bind(tenant_id)
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(AccountHierarchy { account, parents, children }))
    }
}

/// Type names as they are used by the three kinds of edge
#[async_trait]
pub trait RelationshipTypeRepository: Send + Sync {
    /// Distinct non-blank names per combination, sorted by name
    async fn types(&self, tenant_id: i32, combos: &[TypeCombo]) -> RepoResult<Vec<RelationshipType>>;

    async fn type_exists(&self, tenant_id: i32, combo: TypeCombo, name: &str) -> RepoResult<bool>;

    /// Count and latest use of `name` in every combination
    async fn usage(&self, tenant_id: i32, name: &str) -> RepoResult<Vec<ComboUsage>>;

    /// Rewrites the name on every edge of `combo`; returns the rows changed
    async fn rename(&self, tenant_id: i32, combo: TypeCombo, old_name: &str, new_name: &str) -> RepoResult<u64>;
}

#[derive(Clone)]
pub struct PgRelationshipTypeRepository {
    pool: PgPool,
}

impl PgRelationshipTypeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationshipTypeRepository for PgRelationshipTypeRepository {
    async fn types(&self, tenant_id: i32, combos: &[TypeCombo]) -> RepoResult<Vec<RelationshipType>> {
        let mut types = Vec::new();
        for &combo in combos {
            let (table, column) = combo.storage();
            let rows: Vec<(String, Option<DateTime<Utc>>)> = sqlx::query_as(&format!(
                "SELECT {column}, MIN(created_at) FROM {table} \
                 WHERE tenant_id = $1 AND {column} IS NOT NULL AND {column} <> '' GROUP BY {column}"
            ))
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
            types.extend(rows.into_iter().map(|(name, first)| RelationshipType::used_since(combo, name, first)));
        }
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn type_exists(&self, tenant_id: i32, combo: TypeCombo, name: &str) -> RepoResult<bool> {
        let (table, column) = combo.storage();
        let (exists,): (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS(SELECT 1 FROM {table} WHERE tenant_id = $1 AND {column} = $2)"
        ))
        .bind(tenant_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn usage(&self, tenant_id: i32, name: &str) -> RepoResult<Vec<ComboUsage>> {
        let mut usage = Vec::with_capacity(TypeCombo::ALL.len());
        for combo in TypeCombo::ALL {
            let (table, column) = combo.storage();
            let (count, last_used): (i64, Option<DateTime<Utc>>) = sqlx::query_as(&format!(
                "SELECT COUNT(*), MAX(created_at) FROM {table} WHERE tenant_id = $1 AND {column} = $2"
            ))
            .bind(tenant_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
            usage.push(ComboUsage { combo, count, last_used });
        }
        Ok(usage)
    }

    async fn rename(&self, tenant_id: i32, combo: TypeCombo, old_name: &str, new_name: &str) -> RepoResult<u64> {
        let (table, column) = combo.storage();
        let result = sqlx::query(&format!(
            "UPDATE {table} SET {column} = $1 WHERE tenant_id = $2 AND {column} = $3"
        ))
        .bind(new_name)
        .bind(tenant_id)
        .bind(old_name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
