use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::account_contact::row_exists;
use super::{RepoResult, WriteOutcome};
use crate::database::models::opportunity_contact::DUPLICATE;
use crate::database::models::{contact, opportunity};
use crate::database::models::{OpportunityContact, OpportunityContactFilters, OpportunityContactView};
use crate::database::query_builder::{lock_table, query_as_with, ScopedQuery, TableLock};

pub(crate) const VIEW_SELECT: &str = r#"
    SELECT oc.*, o.name AS opportunity_name, c.first_name, c.last_name, c.email, c.phone, c.title
    FROM opportunity_contacts oc
    JOIN opportunities o ON o.id = oc.opportunity_id AND o.tenant_id = oc.tenant_id
    JOIN contacts c ON c.id = oc.contact_id AND c.tenant_id = oc.tenant_id
"#;

#[async_trait]
pub trait OpportunityContactRepository: Send + Sync {
    async fn create(&self, link: OpportunityContact) -> RepoResult<WriteOutcome<OpportunityContact>>;

    async fn list(&self, tenant_id: i32, filters: &OpportunityContactFilters) -> RepoResult<Vec<OpportunityContactView>>;

    async fn update_role(&self, tenant_id: i32, id: Uuid, role: &str) -> RepoResult<Option<OpportunityContact>>;

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<bool>;
}

#[derive(Clone)]
pub struct PgOpportunityContactRepository {
    pool: PgPool,
}

impl PgOpportunityContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OpportunityContactRepository for PgOpportunityContactRepository {
    async fn create(&self, link: OpportunityContact) -> RepoResult<WriteOutcome<OpportunityContact>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, link.tenant_id, TableLock::OpportunityContacts).await?;

        if !row_exists(&mut tx, "opportunities", link.tenant_id, link.opportunity_id).await? {
            return Ok(WriteOutcome::Missing(opportunity::NOT_FOUND));
        }
        if !row_exists(&mut tx, "contacts", link.tenant_id, link.contact_id).await? {
            return Ok(WriteOutcome::Missing(contact::NOT_FOUND));
        }

        let (duplicate,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM opportunity_contacts \
             WHERE tenant_id = $1 AND opportunity_id = $2 AND contact_id = $3)",
        )
        .bind(link.tenant_id)
        .bind(link.opportunity_id)
        .bind(link.contact_id)
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Ok(WriteOutcome::Conflict(DUPLICATE));
        }

        let created = sqlx::query_as::<_, OpportunityContact>(
            r#"
            INSERT INTO opportunity_contacts (id, tenant_id, opportunity_id, contact_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(link.id)
        .bind(link.tenant_id)
        .bind(link.opportunity_id)
        .bind(link.contact_id)
        .bind(&link.role)
        .bind(link.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(created))
    }

    async fn list(&self, tenant_id: i32, filters: &OpportunityContactFilters) -> RepoResult<Vec<OpportunityContactView>> {
        let mut q = ScopedQuery::new("oc.tenant_id", tenant_id);
        if let Some(opportunity_id) = filters.opportunity_id {
            q.and_eq("oc.opportunity_id", opportunity_id);
        }
        if let Some(contact_id) = filters.contact_id {
            q.and_eq("oc.contact_id", contact_id);
        }
        let sql = q.finish(format!("{} {} ORDER BY oc.created_at DESC, oc.id", VIEW_SELECT, q.where_sql()));
        let rows = query_as_with::<OpportunityContactView>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn update_role(&self, tenant_id: i32, id: Uuid, role: &str) -> RepoResult<Option<OpportunityContact>> {
        let link = sqlx::query_as::<_, OpportunityContact>(
            "UPDATE opportunity_contacts SET role = $1 WHERE id = $2 AND tenant_id = $3 RETURNING *",
        )
        .bind(role)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link)
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM opportunity_contacts WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
