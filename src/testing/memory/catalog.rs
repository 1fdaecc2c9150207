//! Custom field definitions, account hierarchy, relationship type names,
//! global search and the tenant endpoints.

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{contains, MemoryStore, Tables};
use crate::database::models::custom_field::{self, NAME_TAKEN};
use crate::database::models::relationship::{self, DUPLICATE};
use crate::database::models::search::{rank, SearchHit, SearchRow};
use crate::database::models::tenant::{QuickStats, RecentItem, TenantDashboard, TenantOverview};
use crate::database::models::{
    account, clean, clean_nullable, AccountHierarchy, AccountRelationship, AccountRelationshipView, ComboUsage,
    CustomFieldDefinition, CustomFieldPatch, CustomFieldUsage, RelationshipFilters, RelationshipPatch,
    RelationshipType, Tenant, TenantPatch, TenantSettings, TenantStats, TypeCombo,
};
use crate::repository::{
    CustomFieldRepository, DeleteOutcome, RelationshipRepository, RelationshipTypeRepository, RepoResult,
    SearchRepository, TenantRepository, WriteOutcome,
};

impl Tables {
    fn field_name_taken(&self, tenant_id: i32, table_name: &str, field_name: &str, except: Option<Uuid>) -> bool {
        self.custom_fields.iter().any(|f| {
            f.tenant_id == tenant_id
                && f.table_name == table_name
                && f.field_name.eq_ignore_ascii_case(field_name)
                && Some(f.id) != except
        })
    }

    /// Rows of `table_name` whose `custom_fields` object has the key
    fn custom_field_usage(&self, tenant_id: i32, table_name: &str, field_name: &str) -> i64 {
        let has_key = |fields: &Value| fields.get(field_name).is_some();
        let count = match table_name {
            "accounts" => self.accounts.iter().filter(|a| a.tenant_id == tenant_id && has_key(&a.custom_fields)).count(),
            "contacts" => self.contacts.iter().filter(|c| c.tenant_id == tenant_id && has_key(&c.custom_fields)).count(),
            "opportunities" => self
                .opportunities
                .iter()
                .filter(|o| o.tenant_id == tenant_id && has_key(&o.custom_fields))
                .count(),
            _ => 0,
        };
        count as i64
    }

    fn edge_exists(&self, edge: &AccountRelationship, relationship_type: &str, except: Option<Uuid>) -> bool {
        self.relationships.iter().any(|r| {
            r.tenant_id == edge.tenant_id
                && r.parent_account_id == edge.parent_account_id
                && r.child_account_id == edge.child_account_id
                && r.relationship_type == relationship_type
                && Some(r.id) != except
        })
    }

    fn relationship_view(&self, edge: &AccountRelationship) -> Option<AccountRelationshipView> {
        Some(AccountRelationshipView {
            parent_account_name: self.account(edge.tenant_id, edge.parent_account_id)?.name.clone(),
            child_account_name: self.account(edge.tenant_id, edge.child_account_id)?.name.clone(),
            relationship: edge.clone(),
        })
    }

    /// Type name and creation time of every edge of `combo`
    fn type_uses(&self, tenant_id: i32, combo: TypeCombo) -> Vec<(&str, DateTime<Utc>)> {
        match combo {
            TypeCombo::AccountAccount => self
                .relationships
                .iter()
                .filter(|r| r.tenant_id == tenant_id)
                .map(|r| (r.relationship_type.as_str(), r.created_at))
                .collect(),
            TypeCombo::AccountContact => self
                .links
                .iter()
                .filter(|l| l.tenant_id == tenant_id)
                .map(|l| (l.relationship_type.as_str(), l.created_at))
                .collect(),
            TypeCombo::ContactOpportunity => self
                .opportunity_links
                .iter()
                .filter(|l| l.tenant_id == tenant_id)
                .map(|l| (l.role.as_str(), l.created_at))
                .collect(),
        }
    }

    fn type_names_mut(&mut self, tenant_id: i32, combo: TypeCombo) -> Vec<&mut String> {
        match combo {
            TypeCombo::AccountAccount => self
                .relationships
                .iter_mut()
                .filter(|r| r.tenant_id == tenant_id)
                .map(|r| &mut r.relationship_type)
                .collect(),
            TypeCombo::AccountContact => self
                .links
                .iter_mut()
                .filter(|l| l.tenant_id == tenant_id)
                .map(|l| &mut l.relationship_type)
                .collect(),
            TypeCombo::ContactOpportunity => self
                .opportunity_links
                .iter_mut()
                .filter(|l| l.tenant_id == tenant_id)
                .map(|l| &mut l.role)
                .collect(),
        }
    }

    fn stats(&self, tenant_id: i32) -> TenantStats {
        TenantStats {
            account_count: self.accounts.iter().filter(|a| a.tenant_id == tenant_id).count() as i64,
            contact_count: self.contacts.iter().filter(|c| c.tenant_id == tenant_id).count() as i64,
            opportunity_count: self.opportunities.iter().filter(|o| o.tenant_id == tenant_id).count() as i64,
            stage_count: self.stages.iter().filter(|s| s.tenant_id == tenant_id).count() as i64,
            custom_field_count: self.custom_fields.iter().filter(|f| f.tenant_id == tenant_id).count() as i64,
        }
    }
}

/// Newest five, like the dashboard panels
fn recent(mut items: Vec<RecentItem>) -> Vec<RecentItem> {
    items.reverse();
    items.sort_by_key(|item| Reverse(item.created_at));
    items.truncate(5);
    items
}

/// Matches of one table, exact display names first, capped at `limit`
fn table_hits(mut rows: Vec<SearchRow>, term: &str, limit: usize) -> Vec<SearchHit> {
    let exact = term.to_lowercase();
    rows.sort_by(|a, b| {
        let is_exact = |r: &SearchRow| r.display_name.to_lowercase() == exact;
        is_exact(b)
            .cmp(&is_exact(a))
            .then(b.created_at.cmp(&a.created_at))
            .then(a.id.cmp(&b.id))
    });
    rows.truncate(limit);
    rows.into_iter().map(SearchHit::from).collect()
}

#[async_trait]
impl CustomFieldRepository for MemoryStore {
    async fn list(&self, tenant_id: i32, table_name: Option<&str>) -> RepoResult<Vec<CustomFieldDefinition>> {
        let mut rows: Vec<CustomFieldDefinition> = self
            .lock()
            .custom_fields
            .iter()
            .filter(|f| f.tenant_id == tenant_id && table_name.map_or(true, |t| f.table_name == t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.table_name.cmp(&b.table_name).then(a.field_name.cmp(&b.field_name)));
        Ok(rows)
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<CustomFieldDefinition>> {
        Ok(self.lock().custom_fields.iter().find(|f| f.tenant_id == tenant_id && f.id == id).cloned())
    }

    async fn create(&self, definition: CustomFieldDefinition) -> RepoResult<WriteOutcome<CustomFieldDefinition>> {
        let mut tables = self.lock();
        if tables.field_name_taken(definition.tenant_id, &definition.table_name, &definition.field_name, None) {
            return Ok(WriteOutcome::Conflict(NAME_TAKEN));
        }
        tables.custom_fields.push(definition.clone());
        Ok(WriteOutcome::Written(definition))
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &CustomFieldPatch,
    ) -> RepoResult<WriteOutcome<CustomFieldDefinition>> {
        let mut tables = self.lock();
        let Some(table_name) = tables
            .custom_fields
            .iter()
            .find(|f| f.tenant_id == tenant_id && f.id == id)
            .map(|f| f.table_name.clone())
        else {
            return Ok(WriteOutcome::Missing(custom_field::NOT_FOUND));
        };
        if let Some(field_name) = &patch.field_name {
            if tables.field_name_taken(tenant_id, &table_name, field_name, Some(id)) {
                return Ok(WriteOutcome::Conflict(NAME_TAKEN));
            }
        }
        let Some(f) = tables.custom_fields.iter_mut().find(|f| f.tenant_id == tenant_id && f.id == id) else {
            return Ok(WriteOutcome::Missing(custom_field::NOT_FOUND));
        };
        if let Some(v) = &patch.field_name {
            f.field_name = v.clone();
        }
        if let Some(v) = &patch.field_label {
            f.field_label = v.clone();
        }
        if let Some(v) = &patch.field_type {
            f.field_type = v.clone();
        }
        if let Some(v) = &patch.field_description {
            f.field_description = v.clone();
        }
        if let Some(v) = patch.is_required {
            f.is_required = v;
        }
        if let Some(v) = &patch.default_value {
            f.default_value = v.clone();
        }
        if let Some(v) = &patch.validation_rules {
            f.validation_rules = v.clone();
        }
        if let Some(v) = &patch.select_options {
            f.select_options = v.clone();
        }
        f.updated_at = Utc::now();
        Ok(WriteOutcome::Written(f.clone()))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<DeleteOutcome<CustomFieldUsage>> {
        let mut tables = self.lock();
        let Some(definition) = tables.custom_fields.iter().find(|f| f.tenant_id == tenant_id && f.id == id) else {
            return Ok(DeleteOutcome::Missing);
        };
        let usage = CustomFieldUsage {
            usage_count: tables.custom_field_usage(tenant_id, &definition.table_name, &definition.field_name),
            table_name: definition.table_name.clone(),
        };
        if usage.usage_count > 0 {
            return Ok(DeleteOutcome::Blocked(usage));
        }
        tables.custom_fields.retain(|f| !(f.tenant_id == tenant_id && f.id == id));
        Ok(DeleteOutcome::Deleted(usage))
    }
}

#[async_trait]
impl RelationshipRepository for MemoryStore {
    async fn create(&self, relationship: AccountRelationship) -> RepoResult<WriteOutcome<AccountRelationship>> {
        let mut tables = self.lock();
        let tenant_id = relationship.tenant_id;
        for account_id in [relationship.parent_account_id, relationship.child_account_id] {
            if tables.account(tenant_id, account_id).is_none() {
                return Ok(WriteOutcome::Missing(account::NOT_FOUND));
            }
        }
        if tables.edge_exists(&relationship, &relationship.relationship_type, None) {
            return Ok(WriteOutcome::Conflict(DUPLICATE));
        }
        tables.relationships.push(relationship.clone());
        Ok(WriteOutcome::Written(relationship))
    }

    async fn list(&self, tenant_id: i32, filters: &RelationshipFilters) -> RepoResult<Vec<AccountRelationshipView>> {
        let tables = self.lock();
        let kind = filters.relationship_type.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let mut rows: Vec<AccountRelationshipView> = tables
            .relationships
            .iter()
            .rev()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| {
                filters
                    .account_id
                    .map_or(true, |id| r.parent_account_id == id || r.child_account_id == id)
            })
            .filter(|r| kind.map_or(true, |k| r.relationship_type == k))
            .filter_map(|r| tables.relationship_view(r))
            .collect();
        rows.sort_by_key(|v| Reverse(v.relationship.created_at));
        Ok(rows)
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<AccountRelationshipView>> {
        let tables = self.lock();
        Ok(tables
            .relationships
            .iter()
            .find(|r| r.tenant_id == tenant_id && r.id == id)
            .and_then(|r| tables.relationship_view(r)))
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &RelationshipPatch,
    ) -> RepoResult<WriteOutcome<AccountRelationship>> {
        let mut tables = self.lock();
        let Some(current) = tables.relationships.iter().find(|r| r.tenant_id == tenant_id && r.id == id).cloned()
        else {
            return Ok(WriteOutcome::Missing(relationship::NOT_FOUND));
        };
        let kind = clean(&patch.relationship_type);
        if let Some(kind) = &kind {
            if tables.edge_exists(&current, kind, Some(id)) {
                return Ok(WriteOutcome::Conflict(DUPLICATE));
            }
        }
        let mut updated = current;
        if let Some(kind) = kind {
            updated.relationship_type = kind;
        }
        if let Some(description) = clean_nullable(&patch.description) {
            updated.description = description;
        }
        if let Some(slot) = tables.relationships.iter_mut().find(|r| r.tenant_id == tenant_id && r.id == id) {
            *slot = updated.clone();
        }
        Ok(WriteOutcome::Written(updated))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.lock();
        let before = tables.relationships.len();
        tables.relationships.retain(|r| !(r.tenant_id == tenant_id && r.id == id));
        Ok(tables.relationships.len() < before)
    }

    async fn hierarchy(&self, tenant_id: i32, account_id: Uuid) -> RepoResult<Option<AccountHierarchy>> {
        let tables = self.lock();
        let Some(account) = tables.account(tenant_id, account_id).cloned() else {
            return Ok(None);
        };
        let edges = tables.relationships.iter().filter(|r| r.tenant_id == tenant_id);
        let mut parents: Vec<AccountRelationshipView> = edges
            .clone()
            .filter(|r| r.child_account_id == account_id)
            .filter_map(|r| tables.relationship_view(r))
            .collect();
        parents.sort_by(|a, b| {
            a.parent_account_name
                .cmp(&b.parent_account_name)
                .then(a.relationship.id.cmp(&b.relationship.id))
        });
        let mut children: Vec<AccountRelationshipView> = edges
            .filter(|r| r.parent_account_id == account_id)
            .filter_map(|r| tables.relationship_view(r))
            .collect();
        children.sort_by(|a, b| {
            a.child_account_name
                .cmp(&b.child_account_name)
                .then(a.relationship.id.cmp(&b.relationship.id))
        });
        Ok(Some(AccountHierarchy { account, parents, children }))
    }
}

#[async_trait]
impl RelationshipTypeRepository for MemoryStore {
    async fn types(&self, tenant_id: i32, combos: &[TypeCombo]) -> RepoResult<Vec<RelationshipType>> {
        let tables = self.lock();
        let mut types = Vec::new();
        for &combo in combos {
            let mut first_use: Vec<(&str, DateTime<Utc>)> = Vec::new();
            for (name, created_at) in tables.type_uses(tenant_id, combo) {
                if name.is_empty() {
                    continue;
                }
                match first_use.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, first)) => *first = (*first).min(created_at),
                    None => first_use.push((name, created_at)),
                }
            }
            types.extend(
                first_use
                    .into_iter()
                    .map(|(name, first)| RelationshipType::used_since(combo, name.to_string(), Some(first))),
            );
        }
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn type_exists(&self, tenant_id: i32, combo: TypeCombo, name: &str) -> RepoResult<bool> {
        Ok(self.lock().type_uses(tenant_id, combo).iter().any(|(n, _)| *n == name))
    }

    async fn usage(&self, tenant_id: i32, name: &str) -> RepoResult<Vec<ComboUsage>> {
        let tables = self.lock();
        Ok(TypeCombo::ALL
            .into_iter()
            .map(|combo| {
                let uses: Vec<DateTime<Utc>> = tables
                    .type_uses(tenant_id, combo)
                    .into_iter()
                    .filter(|(n, _)| *n == name)
                    .map(|(_, at)| at)
                    .collect();
                ComboUsage { combo, count: uses.len() as i64, last_used: uses.into_iter().max() }
            })
            .collect())
    }

    async fn rename(&self, tenant_id: i32, combo: TypeCombo, old_name: &str, new_name: &str) -> RepoResult<u64> {
        let mut tables = self.lock();
        let mut renamed = 0;
        for name in tables.type_names_mut(tenant_id, combo) {
            if *name == old_name {
                *name = new_name.to_string();
                renamed += 1;
            }
        }
        Ok(renamed)
    }
}

#[async_trait]
impl SearchRepository for MemoryStore {
    async fn global(&self, tenant_id: i32, term: &str, limit: i64) -> RepoResult<(usize, Vec<SearchHit>)> {
        let tables = self.lock();
        let needle = term.to_lowercase();
        let cap = limit.max(0) as usize;

        let accounts: Vec<SearchRow> = tables
            .accounts
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .filter(|a| {
                contains(Some(a.name.as_str()), &needle)
                    || contains(a.description.as_deref(), &needle)
                    || contains(a.industry.as_deref(), &needle)
            })
            .map(|a| SearchRow {
                entity_type: "account".to_string(),
                id: a.id,
                display_name: a.name.clone(),
                created_at: a.created_at,
                details: json!({ "description": a.description, "industry": a.industry }),
            })
            .collect();
        let contacts: Vec<SearchRow> = tables
            .contacts
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| {
                contains(Some(c.first_name.as_str()), &needle)
                    || contains(Some(c.last_name.as_str()), &needle)
                    || contains(c.email.as_deref(), &needle)
                    || contains(c.title.as_deref(), &needle)
                    || contains(c.department.as_deref(), &needle)
            })
            .map(|c| SearchRow {
                entity_type: "contact".to_string(),
                id: c.id,
                display_name: c.full_name(),
                created_at: c.created_at,
                details: json!({ "email": c.email, "title": c.title, "department": c.department }),
            })
            .collect();
        let opportunities: Vec<SearchRow> = tables
            .opportunities
            .iter()
            .filter(|o| o.tenant_id == tenant_id)
            .filter_map(|o| {
                let account_name = tables.account(tenant_id, o.account_id).map(|a| a.name.clone());
                let hit = contains(Some(o.name.as_str()), &needle)
                    || contains(o.description.as_deref(), &needle)
                    || contains(account_name.as_deref(), &needle);
                hit.then(|| SearchRow {
                    entity_type: "opportunity".to_string(),
                    id: o.id,
                    display_name: o.name.clone(),
                    created_at: o.created_at,
                    details: json!({
                        "description": o.description,
                        "amount": o.amount,
                        "account_name": account_name,
                        "expected_close_date": o.expected_close_date,
                    }),
                })
            })
            .collect();

        let mut hits: Vec<SearchHit> = table_hits(accounts, term, cap)
            .into_iter()
            .chain(table_hits(contacts, term, cap))
            .chain(table_hits(opportunities, term, cap))
            .collect();
        let total = hits.len();
        rank(&mut hits, term);
        hits.truncate(cap);
        Ok((total, hits))
    }
}

#[async_trait]
impl TenantRepository for MemoryStore {
    async fn overview(&self, tenant_id: i32) -> RepoResult<Option<TenantOverview>> {
        let tables = self.lock();
        Ok(tables.tenants.get(&tenant_id).cloned().map(|tenant| TenantOverview {
            tenant,
            company: tables.companies.get(&tenant_id).cloned(),
            stats: tables.stats(tenant_id),
        }))
    }

    async fn update(&self, tenant_id: i32, patch: &TenantPatch) -> RepoResult<Option<Tenant>> {
        let mut tables = self.lock();
        Ok(tables.tenants.get_mut(&tenant_id).map(|tenant| {
            if let Some(name) = &patch.name {
                tenant.name = name.clone();
            }
            if let Some(subdomain) = &patch.subdomain {
                tenant.subdomain = subdomain.clone();
            }
            if let Some(active) = patch.is_active {
                tenant.is_active = active;
            }
            tenant.updated_at = Utc::now();
            tenant.clone()
        }))
    }

    async fn settings(&self, tenant_id: i32) -> RepoResult<Option<TenantSettings>> {
        let tables = self.lock();
        Ok(tables.tenants.get(&tenant_id).cloned().map(|tenant| {
            let company = tables.companies.get(&tenant_id);
            TenantSettings {
                tenant,
                company_name: company.map(|c| c.name.clone()),
                company_domain: company.and_then(|c| c.domain.clone()),
                company_industry: company.and_then(|c| c.industry.clone()),
                company_size: company.and_then(|c| c.size.clone()),
            }
        }))
    }

    async fn dashboard(&self, tenant_id: i32) -> RepoResult<TenantDashboard> {
        let tables = self.lock();
        let stats = tables.stats(tenant_id);
        let recent_accounts = tables
            .accounts
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .map(|a| RecentItem { id: a.id, name: a.name.clone(), created_at: a.created_at })
            .collect();
        let recent_contacts = tables
            .contacts
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .map(|c| RecentItem { id: c.id, name: c.full_name(), created_at: c.created_at })
            .collect();
        let recent_opportunities = tables
            .opportunities
            .iter()
            .filter(|o| o.tenant_id == tenant_id)
            .map(|o| RecentItem { id: o.id, name: o.name.clone(), created_at: o.created_at })
            .collect();

        Ok(TenantDashboard {
            recent_accounts: recent(recent_accounts),
            recent_contacts: recent(recent_contacts),
            recent_opportunities: recent(recent_opportunities),
            pipeline_summary: tables.pipeline_summary(tenant_id),
            quick_stats: QuickStats {
                total_accounts: stats.account_count,
                total_contacts: stats.contact_count,
                total_opportunities: stats.opportunity_count,
                total_pipeline_value: tables.open_pipeline_value(tenant_id),
            },
        })
    }
}
