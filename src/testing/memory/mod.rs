//! In-process stand-in for every repository. Enforces the same tenant
//! scoping, uniqueness rules and cascades as the Postgres repositories so
//! handler tests run without a database.

mod catalog;
mod pipeline;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::database::models::account::{self, AccountPipelineRow, AccountSearchFilters};
use crate::database::models::account_contact::{self as link_model, AccountContactFilters};
use crate::database::models::contact;
use crate::database::models::{
    Account, AccountContact, AccountContactPatch, AccountContactView, AccountDependents, AccountFilters,
    AccountPatch, AccountRelations, AccountRelationship, AccountSummary, Company, Contact, ContactDependents,
    ContactFilters, ContactPatch, ContactRelations, ContactSearchFilters, ContactStats, ContactSummary,
    CustomFieldDefinition, Opportunity, OpportunityContact, OpportunityContactView, OpportunitySummary, Stage,
    StageHistoryEntry, Tenant,
};
use crate::database::pagination::{PageRequest, SearchWindow};
use crate::repository::{
    AccountContactRepository, AccountRepository, ContactRepository, DeleteOutcome, Page, RepoResult,
    TenantDirectory, WriteOutcome,
};

#[derive(Default)]
struct Tables {
    companies: BTreeMap<i32, Company>,
    tenants: BTreeMap<i32, Tenant>,
    accounts: Vec<Account>,
    contacts: Vec<Contact>,
    links: Vec<AccountContact>,
    stages: Vec<Stage>,
    opportunities: Vec<Opportunity>,
    opportunity_links: Vec<OpportunityContact>,
    history: Vec<HistoryRow>,
    custom_fields: Vec<CustomFieldDefinition>,
    relationships: Vec<AccountRelationship>,
}

/// Stage names are joined in on read, like the SQL view does
struct HistoryRow {
    tenant_id: i32,
    entry: StageHistoryEntry,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn contains(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

fn same(a: Option<&str>, b: &Option<String>) -> bool {
    match b {
        Some(b) => a.is_some_and(|a| a.eq_ignore_ascii_case(b)),
        None => true,
    }
}

/// `ASC NULLS LAST`; reversed it is Postgres' default `DESC`
fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

impl MemoryStore {
    pub fn with_companies(companies: &[(i32, &str)]) -> Arc<Self> {
        let store = Self::default();
        {
            let mut tables = store.lock();
            for (id, name) in companies {
                tables.companies.insert(
                    *id,
                    Company { id: *id, name: name.to_string(), domain: None, industry: None, size: None },
                );
            }
        }
        Arc::new(store)
    }

    pub fn tenant_count(&self) -> usize {
        self.lock().tenants.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panicking test poisons the lock; the data is still usable
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Tables {
    fn account(&self, tenant_id: i32, id: Uuid) -> Option<&Account> {
        self.accounts.iter().find(|a| a.tenant_id == tenant_id && a.id == id)
    }

    fn contact(&self, tenant_id: i32, id: Uuid) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.tenant_id == tenant_id && c.id == id)
    }

    fn account_dependents(&self, tenant_id: i32, id: Uuid) -> AccountDependents {
        let contact_count = self
            .links
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.account_id == id)
            .count() as i64;
        let opportunity_count = self.account_opportunities(tenant_id, id).count() as i64;
        AccountDependents { contact_count, opportunity_count }
    }

    fn account_opportunities(&self, tenant_id: i32, id: Uuid) -> impl Iterator<Item = &Opportunity> {
        self.opportunities
            .iter()
            .filter(move |o| o.tenant_id == tenant_id && o.account_id == id)
    }

    /// Share of the account's opportunities sitting in a closed-won stage
    fn won_percentage(&self, tenant_id: i32, id: Uuid) -> f64 {
        let (mut total, mut won) = (0u32, 0u32);
        for o in self.account_opportunities(tenant_id, id) {
            total += 1;
            if self.opportunity_stage(o).is_some_and(|s| s.is_closed_won) {
                won += 1;
            }
        }
        if total == 0 {
            return 0.0;
        }
        (10_000.0 * f64::from(won) / f64::from(total)).round() / 100.0
    }

    fn contact_dependents(&self, tenant_id: i32, id: Uuid) -> ContactDependents {
        let account_count = self
            .links
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.contact_id == id)
            .count() as i64;
        let opportunity_count = self
            .opportunity_links
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.contact_id == id)
            .count() as i64;
        ContactDependents { account_count, opportunity_count }
    }

    fn account_conflict(&self, candidate: &Account) -> Option<&'static str> {
        self.accounts
            .iter()
            .filter(|a| a.tenant_id == candidate.tenant_id)
            .find_map(|a| candidate.conflict_with(a))
    }

    fn contact_conflict(&self, candidate: &Contact) -> Option<&'static str> {
        self.contacts
            .iter()
            .filter(|c| c.tenant_id == candidate.tenant_id)
            .find_map(|c| candidate.conflict_with(c))
    }

    fn link_view(&self, link: &AccountContact) -> Option<AccountContactView> {
        let account = self.account(link.tenant_id, link.account_id)?;
        let contact = self.contact(link.tenant_id, link.contact_id)?;
        Some(AccountContactView {
            link: link.clone(),
            account_name: account.name.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            title: contact.title.clone(),
        })
    }

    fn sorted_accounts(&self, tenant_id: i32) -> Vec<Account> {
        let mut rows: Vec<Account> = self.accounts.iter().filter(|a| a.tenant_id == tenant_id).cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        rows
    }
}

#[async_trait]
impl TenantDirectory for MemoryStore {
    async fn company_exists(&self, company_id: i32) -> RepoResult<bool> {
        Ok(self.lock().companies.contains_key(&company_id))
    }

    async fn find_tenant(&self, tenant_id: i32) -> RepoResult<Option<Tenant>> {
        Ok(self.lock().tenants.get(&tenant_id).cloned())
    }

    async fn create_tenant_from_company(&self, company_id: i32) -> RepoResult<Option<Tenant>> {
        let mut tables = self.lock();
        if tables.tenants.contains_key(&company_id) {
            return Ok(None);
        }
        let Some(company) = tables.companies.get(&company_id) else {
            return Ok(None);
        };
        let tenant = Tenant::from_company(company);
        tables.tenants.insert(company_id, tenant.clone());
        Ok(Some(tenant))
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn list(&self, tenant_id: i32, filters: &AccountFilters, page: &PageRequest) -> RepoResult<Page<AccountSummary>> {
        let tables = self.lock();
        let term = filters.search_term().map(|t| t.to_lowercase());
        let matching: Vec<AccountSummary> = tables
            .sorted_accounts(tenant_id)
            .into_iter()
            .filter(|a| match &term {
                Some(t) => {
                    contains(Some(a.name.as_str()), t)
                        || contains(a.description.as_deref(), t)
                        || contains(a.industry.as_deref(), t)
                        || contains(a.website.as_deref(), t)
                        || contains(a.email.as_deref(), t)
                }
                None => true,
            })
            .filter(|a| same(a.industry.as_deref(), &filters.industry))
            .filter(|a| same(a.account_type.as_deref(), &filters.account_type))
            .map(|a| {
                let deps = tables.account_dependents(tenant_id, a.id);
                AccountSummary {
                    opportunities_percentage: tables.won_percentage(tenant_id, a.id),
                    account: a,
                    contact_count: deps.contact_count,
                    opportunity_count: deps.opportunity_count,
                }
            })
            .filter(|s| filters.has_contacts().map_or(true, |want| (s.contact_count > 0) == want))
            .filter(|s| filters.has_opportunities().map_or(true, |want| (s.opportunity_count > 0) == want))
            .collect();

        Ok(Page { total: matching.len() as i64, rows: page.slice(&matching) })
    }

    async fn search(
        &self,
        tenant_id: i32,
        term: &str,
        filters: &AccountSearchFilters,
        window: &SearchWindow,
    ) -> RepoResult<Page<Account>> {
        let term = term.to_lowercase();
        let matching: Vec<Account> = self
            .lock()
            .sorted_accounts(tenant_id)
            .into_iter()
            .filter(|a| contains(Some(a.name.as_str()), &term) || contains(a.email.as_deref(), &term))
            .filter(|a| same(a.industry.as_deref(), &filters.industry))
            .filter(|a| same(a.account_type.as_deref(), &filters.account_type))
            .collect();
        Ok(Page { total: matching.len() as i64, rows: window.slice(&matching) })
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Account>> {
        Ok(self.lock().account(tenant_id, id).cloned())
    }

    async fn create(&self, account: Account) -> RepoResult<WriteOutcome<Account>> {
        let mut tables = self.lock();
        if let Some(message) = tables.account_conflict(&account) {
            return Ok(WriteOutcome::Conflict(message));
        }
        tables.accounts.push(account.clone());
        Ok(WriteOutcome::Written(account))
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &AccountPatch,
        actor: Option<i32>,
    ) -> RepoResult<WriteOutcome<Account>> {
        let mut tables = self.lock();
        let Some(mut updated) = tables.account(tenant_id, id).cloned() else {
            return Ok(WriteOutcome::Missing(account::NOT_FOUND));
        };
        patch.apply(&mut updated);
        updated.updated_by = actor;
        updated.updated_at = chrono::Utc::now();
        if let Some(message) = tables.account_conflict(&updated) {
            return Ok(WriteOutcome::Conflict(message));
        }
        if let Some(slot) = tables.accounts.iter_mut().find(|a| a.id == id) {
            *slot = updated.clone();
        }
        Ok(WriteOutcome::Written(updated))
    }

    async fn dependents(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<AccountDependents>> {
        let tables = self.lock();
        Ok(tables.account(tenant_id, id).map(|_| tables.account_dependents(tenant_id, id)))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> RepoResult<DeleteOutcome<AccountDependents>> {
        let mut tables = self.lock();
        if tables.account(tenant_id, id).is_none() {
            return Ok(DeleteOutcome::Missing);
        }
        let deps = tables.account_dependents(tenant_id, id);
        if deps.any() && !force {
            return Ok(DeleteOutcome::Blocked(deps));
        }
        let mut removed = AccountDependents::default();
        if force {
            let doomed: Vec<Uuid> = tables.account_opportunities(tenant_id, id).map(|o| o.id).collect();
            tables.opportunity_links.retain(|l| !(l.tenant_id == tenant_id && doomed.contains(&l.opportunity_id)));
            tables.history.retain(|h| !(h.tenant_id == tenant_id && doomed.contains(&h.entry.opportunity_id)));
            tables.opportunities.retain(|o| !(o.tenant_id == tenant_id && doomed.contains(&o.id)));
            removed = deps;
            tables.links.retain(|l| !(l.tenant_id == tenant_id && l.account_id == id));
        }
        tables.relationships.retain(|r| {
            !(r.tenant_id == tenant_id && (r.parent_account_id == id || r.child_account_id == id))
        });
        tables.accounts.retain(|a| !(a.tenant_id == tenant_id && a.id == id));
        Ok(DeleteOutcome::Deleted(removed))
    }

    async fn relations(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<AccountRelations>> {
        let tables = self.lock();
        let Some(account) = tables.account(tenant_id, id).cloned() else {
            return Ok(None);
        };
        let contacts = tables
            .links
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.account_id == id)
            .filter_map(|l| tables.link_view(l))
            .collect();
        let mut opportunities: Vec<OpportunitySummary> =
            tables.account_opportunities(tenant_id, id).map(|o| tables.summary(o)).collect();
        opportunities.sort_by(|a, b| {
            let (a, b) = (&a.opportunity, &b.opportunity);
            nulls_last(&a.expected_close_date, &b.expected_close_date).reverse().then(a.id.cmp(&b.id))
        });
        Ok(Some(AccountRelations { account, contacts, opportunities }))
    }

    async fn pipeline(&self, tenant_id: i32) -> RepoResult<Vec<AccountPipelineRow>> {
        let tables = self.lock();
        let mut rows: Vec<(Option<i32>, AccountPipelineRow)> = tables
            .opportunities
            .iter()
            .filter(|o| o.tenant_id == tenant_id)
            .filter_map(|o| {
                let account = tables.account(tenant_id, o.account_id)?;
                let stage = tables.opportunity_stage(o);
                let primary_contact_name = tables
                    .links
                    .iter()
                    .filter(|l| l.tenant_id == tenant_id && l.account_id == account.id && l.is_primary)
                    .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
                    .and_then(|l| tables.contact(tenant_id, l.contact_id))
                    .map(|c| c.full_name());
                let row = AccountPipelineRow {
                    opportunity_id: o.id,
                    opportunity_name: o.name.clone(),
                    account_id: account.id,
                    account_name: account.name.clone(),
                    stage_id: stage.map(|s| s.id),
                    stage_name: stage.map(|s| s.name.clone()),
                    weight_percentage: stage.map(|s| s.weight_percentage),
                    amount: o.amount,
                    probability: o.probability,
                    owner_id: o.owner_id,
                    expected_close_date: o.expected_close_date,
                    primary_contact_name,
                };
                Some((stage.map(|s| s.order_index), row))
            })
            .collect();
        rows.sort_by(|(a_order, a), (b_order, b)| {
            nulls_last(a_order, b_order)
                .then(nulls_last(&a.expected_close_date, &b.expected_close_date))
                .then(a.opportunity_id.cmp(&b.opportunity_id))
        });
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }
}

#[async_trait]
impl ContactRepository for MemoryStore {
    async fn list(&self, tenant_id: i32, filters: &ContactFilters, page: &PageRequest) -> RepoResult<Page<ContactSummary>> {
        let tables = self.lock();
        let term = filters.search_term().map(|t| t.to_lowercase());
        let mut rows: Vec<Contact> = tables.contacts.iter().filter(|c| c.tenant_id == tenant_id).cloned().collect();
        rows.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then(a.first_name.cmp(&b.first_name))
                .then(a.id.cmp(&b.id))
        });
        let matching: Vec<ContactSummary> = rows
            .into_iter()
            .filter(|c| match &term {
                Some(t) => {
                    contains(Some(c.first_name.as_str()), t) || contains(Some(c.last_name.as_str()), t) || contains(c.email.as_deref(), t)
                }
                None => true,
            })
            .filter(|c| same(c.title.as_deref(), &filters.title))
            .filter(|c| same(c.department.as_deref(), &filters.department))
            .map(|c| {
                let deps = tables.contact_dependents(tenant_id, c.id);
                ContactSummary { contact: c, account_count: deps.account_count, opportunity_count: deps.opportunity_count }
            })
            .filter(|s| filters.has_accounts().map_or(true, |want| (s.account_count > 0) == want))
            .collect();
        Ok(Page { total: matching.len() as i64, rows: page.slice(&matching) })
    }

    async fn search(
        &self,
        tenant_id: i32,
        term: &str,
        filters: &ContactSearchFilters,
        window: &SearchWindow,
    ) -> RepoResult<Page<Contact>> {
        let term = term.to_lowercase();
        let mut matching: Vec<Contact> = self
            .lock()
            .contacts
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| {
                contains(Some(c.full_name().as_str()), &term) || contains(c.email.as_deref(), &term)
            })
            .filter(|c| same(c.title.as_deref(), &filters.title))
            .filter(|c| same(c.department.as_deref(), &filters.department))
            .filter(|c| same(c.country.as_deref(), &filters.country))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(Page { total: matching.len() as i64, rows: window.slice(&matching) })
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Contact>> {
        Ok(self.lock().contact(tenant_id, id).cloned())
    }

    async fn create(&self, contact: Contact) -> RepoResult<WriteOutcome<Contact>> {
        let mut tables = self.lock();
        if let Some(message) = tables.contact_conflict(&contact) {
            return Ok(WriteOutcome::Conflict(message));
        }
        tables.contacts.push(contact.clone());
        Ok(WriteOutcome::Written(contact))
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &ContactPatch,
        actor: Option<i32>,
    ) -> RepoResult<WriteOutcome<Contact>> {
        let mut tables = self.lock();
        let Some(mut updated) = tables.contact(tenant_id, id).cloned() else {
            return Ok(WriteOutcome::Missing(contact::NOT_FOUND));
        };
        patch.apply(&mut updated);
        updated.updated_by = actor;
        updated.updated_at = chrono::Utc::now();
        if let Some(message) = tables.contact_conflict(&updated) {
            return Ok(WriteOutcome::Conflict(message));
        }
        if let Some(slot) = tables.contacts.iter_mut().find(|c| c.id == id) {
            *slot = updated.clone();
        }
        Ok(WriteOutcome::Written(updated))
    }

    async fn dependents(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<ContactDependents>> {
        let tables = self.lock();
        Ok(tables.contact(tenant_id, id).map(|_| tables.contact_dependents(tenant_id, id)))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> RepoResult<DeleteOutcome<ContactDependents>> {
        let mut tables = self.lock();
        if tables.contact(tenant_id, id).is_none() {
            return Ok(DeleteOutcome::Missing);
        }
        let deps = tables.contact_dependents(tenant_id, id);
        if deps.any() && !force {
            return Ok(DeleteOutcome::Blocked(deps));
        }
        let mut removed = ContactDependents::default();
        if force {
            removed = deps;
            tables.opportunity_links.retain(|l| !(l.tenant_id == tenant_id && l.contact_id == id));
            tables.links.retain(|l| !(l.tenant_id == tenant_id && l.contact_id == id));
        }
        tables.contacts.retain(|c| !(c.tenant_id == tenant_id && c.id == id));
        Ok(DeleteOutcome::Deleted(removed))
    }

    async fn relations(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<ContactRelations>> {
        let tables = self.lock();
        let Some(contact) = tables.contact(tenant_id, id).cloned() else {
            return Ok(None);
        };
        let accounts = tables
            .links
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.contact_id == id)
            .filter_map(|l| tables.link_view(l))
            .collect();
        let mut linked: Vec<(&Opportunity, OpportunityContactView)> = tables
            .opportunity_links
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.contact_id == id)
            .filter_map(|l| Some((tables.opportunity(tenant_id, l.opportunity_id)?, tables.opportunity_link_view(l)?)))
            .collect();
        linked.sort_by(|(a, a_view), (b, b_view)| {
            nulls_last(&a.expected_close_date, &b.expected_close_date).then(a_view.link.id.cmp(&b_view.link.id))
        });
        let opportunities = linked.into_iter().map(|(_, view)| view).collect();
        Ok(Some(ContactRelations { contact, accounts, opportunities }))
    }

    async fn stats(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<ContactStats>> {
        let tables = self.lock();
        Ok(tables.contact(tenant_id, id).map(|_| {
            let deps = tables.contact_dependents(tenant_id, id);
            let open_opportunity_value = tables
                .opportunity_links
                .iter()
                .filter(|l| l.tenant_id == tenant_id && l.contact_id == id)
                .filter_map(|l| tables.opportunity(tenant_id, l.opportunity_id))
                .filter(|o| !tables.opportunity_stage(o).is_some_and(Stage::is_closed))
                .filter_map(|o| o.amount)
                .sum::<Decimal>();
            ContactStats {
                contact_id: id,
                account_count: deps.account_count,
                opportunity_count: deps.opportunity_count,
                open_opportunity_value,
            }
        }))
    }
}

#[async_trait]
impl AccountContactRepository for MemoryStore {
    async fn create(&self, link: AccountContact) -> RepoResult<WriteOutcome<AccountContact>> {
        let mut tables = self.lock();
        if tables.account(link.tenant_id, link.account_id).is_none() {
            return Ok(WriteOutcome::Missing(account::NOT_FOUND));
        }
        if tables.contact(link.tenant_id, link.contact_id).is_none() {
            return Ok(WriteOutcome::Missing(contact::NOT_FOUND));
        }
        let duplicate = tables.links.iter().any(|l| {
            l.tenant_id == link.tenant_id && l.account_id == link.account_id && l.contact_id == link.contact_id
        });
        if duplicate {
            return Ok(WriteOutcome::Conflict(link_model::DUPLICATE));
        }
        tables.links.push(link.clone());
        Ok(WriteOutcome::Written(link))
    }

    async fn list(&self, tenant_id: i32, filters: &AccountContactFilters) -> RepoResult<Vec<AccountContactView>> {
        let tables = self.lock();
        Ok(tables
            .links
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .filter(|l| filters.account_id.map_or(true, |id| l.account_id == id))
            .filter(|l| filters.contact_id.map_or(true, |id| l.contact_id == id))
            .filter_map(|l| tables.link_view(l))
            .collect())
    }

    async fn update(&self, tenant_id: i32, id: Uuid, patch: &AccountContactPatch) -> RepoResult<Option<AccountContact>> {
        let mut tables = self.lock();
        Ok(tables.links.iter_mut().find(|l| l.tenant_id == tenant_id && l.id == id).map(|l| {
            patch.apply(l);
            l.clone()
        }))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.lock();
        let before = tables.links.len();
        tables.links.retain(|l| !(l.tenant_id == tenant_id && l.id == id));
        Ok(tables.links.len() < before)
    }
}
