use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::account::exists_clause;
use super::account_contact::VIEW_SELECT as ACCOUNT_CONTACT_VIEW;
use super::opportunity_contact::VIEW_SELECT as OPPORTUNITY_CONTACT_VIEW;
use super::{DeleteOutcome, Page, RepoResult, WriteOutcome};
use crate::database::models::contact::{self, ContactSearchFilters, EMAIL_TAKEN, NAME_TAKEN};
use crate::database::models::{
    clean, AccountContactView, Contact, ContactDependents, ContactFilters, ContactPatch, ContactRelations,
    ContactStats, ContactSummary, OpportunityContactView,
};
use crate::database::pagination::{PageRequest, SearchWindow};
use crate::database::query_builder::{lock_table, query_as_with, ScopedQuery, TableLock};

pub(crate) const SEARCH_COLUMNS: [&str; 6] =
    ["c.first_name", "c.last_name", "c.email", "c.phone", "c.title", "c.department"];

const SUMMARY_COLUMNS: &str = r#"
    (SELECT COUNT(*) FROM account_contacts ac
      WHERE ac.contact_id = c.id AND ac.tenant_id = c.tenant_id) AS account_count,
    (SELECT COUNT(*) FROM opportunity_contacts oc
      WHERE oc.contact_id = c.id AND oc.tenant_id = c.tenant_id) AS opportunity_count
"#;

const EXISTS_ACCOUNTS: &str =
    "EXISTS (SELECT 1 FROM account_contacts ac WHERE ac.contact_id = c.id AND ac.tenant_id = c.tenant_id)";
const EXISTS_OPPORTUNITIES: &str =
    "EXISTS (SELECT 1 FROM opportunity_contacts oc WHERE oc.contact_id = c.id AND oc.tenant_id = c.tenant_id)";

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn list(&self, tenant_id: i32, filters: &ContactFilters, page: &PageRequest) -> RepoResult<Page<ContactSummary>>;

    async fn search(
        &self,
        tenant_id: i32,
        term: &str,
        filters: &ContactSearchFilters,
        window: &SearchWindow,
    ) -> RepoResult<Page<Contact>>;

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Contact>>;

    async fn create(&self, contact: Contact) -> RepoResult<WriteOutcome<Contact>>;

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &ContactPatch,
        actor: Option<i32>,
    ) -> RepoResult<WriteOutcome<Contact>>;

    async fn dependents(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<ContactDependents>>;

    async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> RepoResult<DeleteOutcome<ContactDependents>>;

    async fn relations(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<ContactRelations>>;

    async fn stats(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<ContactStats>>;
}

#[derive(Clone)]
pub struct PgContactRepository {
    pool: PgPool,
}

impl PgContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn find_conflict(conn: &mut PgConnection, candidate: &Contact, exclude: Option<Uuid>) -> RepoResult<Option<&'static str>> {
    let (name_taken,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM contacts WHERE tenant_id = $1 \
         AND LOWER(first_name) = LOWER($2) AND LOWER(last_name) = LOWER($3) \
         AND ($4::uuid IS NULL OR id <> $4))",
    )
    .bind(candidate.tenant_id)
    .bind(&candidate.first_name)
    .bind(&candidate.last_name)
    .bind(exclude)
    .fetch_one(&mut *conn)
    .await?;
    if name_taken {
        return Ok(Some(NAME_TAKEN));
    }

    if let Some(email) = candidate.email.as_deref() {
        let (email_taken,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM contacts WHERE tenant_id = $1 AND LOWER(email) = LOWER($2) \
             AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(candidate.tenant_id)
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

async fn count_dependents(conn: &mut PgConnection, tenant_id: i32, id: Uuid) -> RepoResult<ContactDependents> {
    let (account_count, opportunity_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM account_contacts WHERE tenant_id = $1 AND contact_id = $2),
            (SELECT COUNT(*) FROM opportunity_contacts WHERE tenant_id = $1 AND contact_id = $2)
        "#,
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_one(conn)
    .await?;
    Ok(ContactDependents { account_count, opportunity_count })
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    async fn list(&self, tenant_id: i32, filters: &ContactFilters, page: &PageRequest) -> RepoResult<Page<ContactSummary>> {
        let mut q = ScopedQuery::new("c.tenant_id", tenant_id);
        if let Some(term) = filters.search_term() {
            q.and_search(&SEARCH_COLUMNS, &term);
        }
        if let Some(title) = clean(&filters.title) {
            q.and_eq("c.title", title);
        }
        if let Some(department) = clean(&filters.department) {
            q.and_eq("c.department", department);
        }
        if let Some(wanted) = filters.has_accounts() {
            q.and(exists_clause(EXISTS_ACCOUNTS, wanted));
        }
        if let Some(wanted) = filters.has_opportunities() {
            q.and(exists_clause(EXISTS_OPPORTUNITIES, wanted));
        }

        let where_sql = q.where_sql();
        let count = q.finish(format!("SELECT COUNT(*) FROM contacts c {}", where_sql));
        let (total,): (i64,) = query_as_with(&count).fetch_one(&self.pool).await?;

        let window = q.page_sql(page);
        let sql = q.finish(format!(
            "SELECT c.*, {} FROM contacts c {} ORDER BY c.last_name, c.first_name, c.id{}",
            SUMMARY_COLUMNS, where_sql, window
        ));
        let rows = query_as_with::<ContactSummary>(&sql).fetch_all(&self.pool).await?;
        Ok(Page { rows, total })
    }

    async fn search(
        &self,
        tenant_id: i32,
        term: &str,
        filters: &ContactSearchFilters,
        window: &SearchWindow,
    ) -> RepoResult<Page<Contact>> {
        let mut q = ScopedQuery::new("c.tenant_id", tenant_id);
        q.and_search(&SEARCH_COLUMNS, term);
        if let Some(title) = clean(&filters.title) {
            q.and_eq("c.title", title);
        }
        if let Some(department) = clean(&filters.department) {
            q.and_eq("c.department", department);
        }
        if let Some(country) = clean(&filters.country) {
            q.and_eq("c.country", country);
        }

        let where_sql = q.where_sql();
        let count = q.finish(format!("SELECT COUNT(*) FROM contacts c {}", where_sql));
        let (total,): (i64,) = query_as_with(&count).fetch_one(&self.pool).await?;

        let limit = q.window_sql(window.limit, window.offset);
        let sql = q.finish(format!(
            "SELECT c.* FROM contacts c {} ORDER BY c.created_at DESC, c.id{}",
            where_sql, limit
        ));
        let rows = query_as_with::<Contact>(&sql).fetch_all(&self.pool).await?;
        Ok(Page { rows, total })
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(contact)
    }

    async fn create(&self, contact: Contact) -> RepoResult<WriteOutcome<Contact>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, contact.tenant_id, TableLock::Contacts).await?;

        if let Some(rule) = find_conflict(&mut tx, &contact, None).await? {
            return Ok(WriteOutcome::Conflict(rule));
        }

        let created = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (
                id, tenant_id, first_name, last_name, email, phone, mobile_phone, title, department,
                address1, address2, city, state, zip, country, custom_fields,
                created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING *
            "#,
        )
        .bind(contact.id)
        .bind(contact.tenant_id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.mobile_phone)
        .bind(&contact.title)
        .bind(&contact.department)
        .bind(&contact.address1)
        .bind(&contact.address2)
        .bind(&contact.city)
        .bind(&contact.state)
        .bind(&contact.zip)
        .bind(&contact.country)
        .bind(&contact.custom_fields)
        .bind(contact.created_by)
        .bind(contact.updated_by)
        .bind(contact.created_at)
        .bind(contact.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(created))
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &ContactPatch,
        actor: Option<i32>,
    ) -> RepoResult<WriteOutcome<Contact>> {
        let mut tx = self.pool.begin().await?;
        lock_table(&mut tx, tenant_id, TableLock::Contacts).await?;

        let Some(mut candidate) =
            sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(WriteOutcome::Missing(contact::NOT_FOUND));
        };

        if patch.first_name.is_some() || patch.last_name.is_some() || patch.email.is_some() {
            patch.apply(&mut candidate);
            if let Some(rule) = find_conflict(&mut tx, &candidate, Some(id)).await? {
                return Ok(WriteOutcome::Conflict(rule));
            }
        }

        let mut set = patch.assignments();
        set.set("updated_by", actor).touch("updated_at = NOW()");
        let sql = set.into_update("contacts", id, tenant_id);
        let updated = query_as_with::<Contact>(&sql).fetch_one(&mut *tx).await?;

        tx.commit().await?;
        Ok(WriteOutcome::Written(updated))
    }

    async fn dependents(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<ContactDependents>> {
        let mut conn = self.pool.acquire().await?;
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM contacts WHERE id = $1 AND tenant_id = $2)")
            .bind(id)
            .bind(tenant_id)
            .fetch_one(&mut *conn)
            .await?;
        if !exists {
            return Ok(None);
        }
        count_dependents(&mut conn, tenant_id, id).await.map(Some)
    }

    async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> RepoResult<DeleteOutcome<ContactDependents>> {
        let mut tx = self.pool.begin().await?;

        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM contacts WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
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

        let mut removed = ContactDependents::default();
        if force {
            removed.opportunity_count =
                sqlx::query("DELETE FROM opportunity_contacts WHERE tenant_id = $1 AND contact_id = $2")
                    .bind(tenant_id)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected() as i64;
            removed.account_count = sqlx::query("DELETE FROM account_contacts WHERE tenant_id = $1 AND contact_id = $2")
                .bind(tenant_id)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected() as i64;
        }

        sqlx::query("DELETE FROM contacts WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DeleteOutcome::Deleted(removed))
    }

    async fn relations(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<ContactRelations>> {
        let Some(contact) = self.find(tenant_id, id).await? else {
            return Ok(None);
        };

        let accounts = sqlx::query_as::<_, AccountContactView>(&format!(
            "{} WHERE ac.tenant_id = $1 AND ac.contact_id = $2 ORDER BY ac.is_primary DESC, a.name, ac.id",
            ACCOUNT_CONTACT_VIEW
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let opportunities = sqlx::query_as::<_, OpportunityContactView>(&format!(
            "{} WHERE oc.tenant_id = $1 AND oc.contact_id = $2 ORDER BY o.expected_close_date ASC NULLS LAST, oc.id",
            OPPORTUNITY_CONTACT_VIEW
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(ContactRelations { contact, accounts, opportunities }))
    }

    async fn stats(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<ContactStats>> {
        let Some(dependents) = self.dependents(tenant_id, id).await? else {
            return Ok(None);
        };

        let (open_opportunity_value,): (Decimal,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(o.amount), 0)
            FROM opportunity_contacts oc
            JOIN opportunities o ON o.id = oc.opportunity_id AND o.tenant_id = oc.tenant_id
            LEFT JOIN opportunity_stages s ON s.id = o.stage_id AND s.tenant_id = o.tenant_id
            WHERE oc.tenant_id = $1
              AND oc.contact_id = $2
              AND NOT COALESCE(s.is_closed_won OR s.is_closed_lost, false)
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(ContactStats {
            contact_id: id,
            account_count: dependents.account_count,
            opportunity_count: dependents.opportunity_count,
            open_opportunity_value,
        }))
    }
}
