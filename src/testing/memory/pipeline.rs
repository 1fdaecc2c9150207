//! Stages, opportunities, their contact links and stage history, plus the
//! dashboard reads built on them.

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{contains, nulls_last, HistoryRow, MemoryStore, Tables};
use crate::database::models::dashboard::DashboardOpportunity;
use crate::database::models::opportunity::{self, ParsedOpportunityFilters, STAGE_NOT_FOUND};
use crate::database::models::opportunity_contact::DUPLICATE;
use crate::database::models::stage::{self, NAME_TAKEN};
use crate::database::models::tenant::PipelineSummaryRow;
use crate::database::models::{
    account, contact, Opportunity, OpportunityContact, OpportunityContactFilters, OpportunityContactView,
    OpportunityDependents, OpportunityPatch, OpportunityRelations, OpportunitySearchFilters, OpportunitySummary,
    PipelineColumn, Stage, StageHistoryEntry, StagePatch,
};
use crate::database::pagination::{PageRequest, SearchWindow};
use crate::repository::{
    DashboardRepository, DeleteOutcome, OpportunityContactRepository, OpportunityRepository, Page, RepoResult,
    StageRepository, WriteOutcome,
};

fn apply_patch(patch: &OpportunityPatch, o: &mut Opportunity) {
    if let Some(name) = &patch.name {
        o.name = name.clone();
    }
    if let Some(account_id) = patch.account_id {
        o.account_id = account_id;
    }
    if let Some(amount) = patch.amount {
        o.amount = amount;
    }
    if let Some(date) = patch.expected_close_date {
        o.expected_close_date = date;
    }
    if let Some(date) = patch.actual_close_date {
        o.actual_close_date = date;
    }
    if let Some(probability) = patch.probability {
        o.probability = probability;
    }
    if let Some(description) = &patch.description {
        o.description = description.clone();
    }
    if let Some(lead_source) = &patch.lead_source {
        o.lead_source = lead_source.clone();
    }
    if let Some(custom_fields) = &patch.custom_fields {
        o.custom_fields = custom_fields.clone();
    }
    if let Some(owner_id) = patch.owner_id {
        o.owner_id = owner_id;
    }
}

fn take_stage(o: &mut Opportunity, stage: &Stage) {
    o.stage_id = Some(stage.id);
    o.stage = Some(stage.name.clone());
    o.probability = Some(stage.weight_percentage);
}

impl Tables {
    pub(super) fn stage(&self, tenant_id: i32, id: Uuid) -> Option<&Stage> {
        self.stages.iter().find(|s| s.tenant_id == tenant_id && s.id == id)
    }

    pub(super) fn sorted_stages(&self, tenant_id: i32) -> Vec<Stage> {
        let mut stages: Vec<Stage> = self.stages.iter().filter(|s| s.tenant_id == tenant_id).cloned().collect();
        stages.sort_by(|a, b| a.order_index.cmp(&b.order_index).then(a.id.cmp(&b.id)));
        stages
    }

    pub(super) fn opportunity(&self, tenant_id: i32, id: Uuid) -> Option<&Opportunity> {
        self.opportunities.iter().find(|o| o.tenant_id == tenant_id && o.id == id)
    }

    pub(super) fn opportunity_stage(&self, o: &Opportunity) -> Option<&Stage> {
        self.stage(o.tenant_id, o.stage_id?)
    }

    fn is_open(&self, o: &Opportunity) -> bool {
        !self.opportunity_stage(o).is_some_and(Stage::is_closed)
    }

    pub(super) fn summary(&self, o: &Opportunity) -> OpportunitySummary {
        let stage = self.opportunity_stage(o);
        OpportunitySummary {
            opportunity: o.clone(),
            account_name: self.account(o.tenant_id, o.account_id).map(|a| a.name.clone()),
            stage_name: stage.map(|s| s.name.clone()),
            weight_percentage: stage.map(|s| s.weight_percentage),
        }
    }

    pub(super) fn opportunity_link_view(&self, link: &OpportunityContact) -> Option<OpportunityContactView> {
        let opportunity = self.opportunity(link.tenant_id, link.opportunity_id)?;
        let contact = self.contact(link.tenant_id, link.contact_id)?;
        Some(OpportunityContactView {
            link: link.clone(),
            opportunity_name: opportunity.name.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            title: contact.title.clone(),
        })
    }

    fn history_entry(&self, row: &HistoryRow) -> StageHistoryEntry {
        let name = |id: Option<Uuid>| id.and_then(|id| self.stage(row.tenant_id, id)).map(|s| s.name.clone());
        StageHistoryEntry {
            stage_name: name(Some(row.entry.stage_id)),
            from_stage_name: name(row.entry.from_stage_id),
            ..row.entry.clone()
        }
    }

    fn record_stage(
        &mut self,
        o: &Opportunity,
        stage_id: Uuid,
        from_stage_id: Option<Uuid>,
        actor: Option<i32>,
        reason: Option<String>,
    ) -> StageHistoryEntry {
        let row = HistoryRow {
            tenant_id: o.tenant_id,
            entry: StageHistoryEntry {
                id: Uuid::new_v4(),
                opportunity_id: o.id,
                stage_id,
                from_stage_id,
                stage_name: None,
                from_stage_name: None,
                entered_at: Utc::now(),
                created_by: actor,
                reason,
            },
        };
        let entry = self.history_entry(&row);
        self.history.push(row);
        entry
    }

    /// Entries of one opportunity, oldest first
    fn history_of(&self, tenant_id: i32, id: Uuid) -> Vec<StageHistoryEntry> {
        let mut rows: Vec<&HistoryRow> = self
            .history
            .iter()
            .filter(|h| h.tenant_id == tenant_id && h.entry.opportunity_id == id)
            .collect();
        rows.sort_by_key(|h| h.entry.entered_at);
        rows.into_iter().map(|h| self.history_entry(h)).collect()
    }

    fn opportunity_summaries(&self, tenant_id: i32) -> Vec<OpportunitySummary> {
        let mut rows: Vec<OpportunitySummary> = self
            .opportunities
            .iter()
            .filter(|o| o.tenant_id == tenant_id)
            .map(|o| self.summary(o))
            .collect();
        rows.sort_by(|a, b| {
            let (a, b) = (&a.opportunity, &b.opportunity);
            nulls_last(&a.expected_close_date, &b.expected_close_date).then(a.id.cmp(&b.id))
        });
        rows
    }

    fn matches_term(&self, o: &Opportunity, term: &str) -> bool {
        contains(Some(o.name.as_str()), term)
            || contains(o.description.as_deref(), term)
            || contains(self.account(o.tenant_id, o.account_id).map(|a| a.name.as_str()), term)
    }

    fn stage_name_taken(&self, tenant_id: i32, name: &str, except: Option<Uuid>) -> bool {
        self.stages
            .iter()
            .any(|s| s.tenant_id == tenant_id && s.name.eq_ignore_ascii_case(name) && Some(s.id) != except)
    }

    pub(super) fn pipeline_summary(&self, tenant_id: i32) -> Vec<PipelineSummaryRow> {
        self.sorted_stages(tenant_id)
            .into_iter()
            .map(|s| {
                let in_stage: Vec<&Opportunity> = self
                    .opportunities
                    .iter()
                    .filter(|o| o.tenant_id == tenant_id && o.stage_id == Some(s.id))
                    .collect();
                PipelineSummaryRow {
                    stage_id: s.id,
                    stage_name: s.name,
                    stage_color: s.color,
                    opportunity_count: in_stage.len() as i64,
                    total_amount: in_stage.iter().filter_map(|o| o.amount).sum(),
                }
            })
            .collect()
    }

    /// Sum of amounts outside closed stages
    pub(super) fn open_pipeline_value(&self, tenant_id: i32) -> Decimal {
        self.opportunities
            .iter()
            .filter(|o| o.tenant_id == tenant_id && self.is_open(o))
            .filter_map(|o| o.amount)
            .sum()
    }
}

#[async_trait]
impl StageRepository for MemoryStore {
    async fn list(&self, tenant_id: i32) -> RepoResult<Vec<Stage>> {
        Ok(self.lock().sorted_stages(tenant_id))
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Stage>> {
        Ok(self.lock().stage(tenant_id, id).cloned())
    }

    async fn create(&self, mut stage: Stage) -> RepoResult<WriteOutcome<Stage>> {
        let mut tables = self.lock();
        if tables.stage_name_taken(stage.tenant_id, &stage.name, None) {
            return Ok(WriteOutcome::Conflict(NAME_TAKEN));
        }
        stage.order_index = tables
            .stages
            .iter()
            .filter(|s| s.tenant_id == stage.tenant_id)
            .map(|s| s.order_index)
            .max()
            .unwrap_or(0)
            + 1;
        tables.stages.push(stage.clone());
        Ok(WriteOutcome::Written(stage))
    }

    async fn update(&self, tenant_id: i32, id: Uuid, patch: &StagePatch) -> RepoResult<WriteOutcome<Stage>> {
        let mut tables = self.lock();
        if let Some(name) = &patch.name {
            if tables.stage_name_taken(tenant_id, name, Some(id)) {
                return Ok(WriteOutcome::Conflict(NAME_TAKEN));
            }
        }
        let Some(s) = tables.stages.iter_mut().find(|s| s.tenant_id == tenant_id && s.id == id) else {
            return Ok(WriteOutcome::Missing(stage::NOT_FOUND));
        };
        if let Some(name) = &patch.name {
            s.name = name.clone();
        }
        if let Some(description) = &patch.description {
            s.description = description.clone();
        }
        if let Some(weight) = patch.weight_percentage {
            s.weight_percentage = weight;
        }
        if let Some(won) = patch.is_closed_won {
            s.is_closed_won = won;
        }
        if let Some(lost) = patch.is_closed_lost {
            s.is_closed_lost = lost;
        }
        if let Some(color) = &patch.color {
            s.color = color.clone();
        }
        s.updated_at = Utc::now();
        Ok(WriteOutcome::Written(s.clone()))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<DeleteOutcome<i64>> {
        let mut tables = self.lock();
        if tables.stage(tenant_id, id).is_none() {
            return Ok(DeleteOutcome::Missing);
        }
        let in_use = tables
            .opportunities
            .iter()
            .filter(|o| o.tenant_id == tenant_id && o.stage_id == Some(id))
            .count() as i64;
        if in_use > 0 {
            return Ok(DeleteOutcome::Blocked(in_use));
        }
        tables.stages.retain(|s| !(s.tenant_id == tenant_id && s.id == id));
        Ok(DeleteOutcome::Deleted(0))
    }

    async fn reorder(&self, tenant_id: i32, stage_ids: &[Uuid]) -> RepoResult<Option<Vec<Stage>>> {
        let mut tables = self.lock();
        if stage_ids.iter().any(|id| tables.stage(tenant_id, *id).is_none()) {
            return Ok(None);
        }
        let now = Utc::now();
        for (position, id) in stage_ids.iter().enumerate() {
            if let Some(s) = tables.stages.iter_mut().find(|s| s.tenant_id == tenant_id && s.id == *id) {
                s.order_index = position as i32 + 1;
                s.updated_at = now;
            }
        }
        Ok(Some(tables.sorted_stages(tenant_id)))
    }
}

#[async_trait]
impl OpportunityRepository for MemoryStore {
    async fn list(
        &self,
        tenant_id: i32,
        filters: &ParsedOpportunityFilters,
        page: &PageRequest,
    ) -> RepoResult<Page<OpportunitySummary>> {
        let tables = self.lock();
        let term = filters.search.as_ref().map(|t| t.to_lowercase());
        let matching: Vec<OpportunitySummary> = tables
            .opportunity_summaries(tenant_id)
            .into_iter()
            .filter(|s| term.as_ref().map_or(true, |t| tables.matches_term(&s.opportunity, t)))
            .filter(|s| {
                let o = &s.opportunity;
                filters.stage_id.map_or(true, |id| o.stage_id == Some(id))
                    && filters.account_id.map_or(true, |id| o.account_id == id)
                    && filters.min_amount.map_or(true, |min| o.amount.is_some_and(|a| a >= min))
                    && filters.max_amount.map_or(true, |max| o.amount.is_some_and(|a| a <= max))
                    && filters.close_from.map_or(true, |d| o.expected_close_date.is_some_and(|c| c >= d))
                    && filters.close_to.map_or(true, |d| o.expected_close_date.is_some_and(|c| c <= d))
            })
            .collect();
        Ok(Page { total: matching.len() as i64, rows: page.slice(&matching) })
    }

    async fn search(
        &self,
        tenant_id: i32,
        term: &str,
        filters: &OpportunitySearchFilters,
        window: &SearchWindow,
    ) -> RepoResult<Page<OpportunitySummary>> {
        let tables = self.lock();
        let term = term.to_lowercase();
        let mut matching: Vec<OpportunitySummary> = tables
            .opportunities
            .iter()
            .rev()
            .filter(|o| o.tenant_id == tenant_id && tables.matches_term(o, &term))
            .filter(|o| filters.stage_id.map_or(true, |id| o.stage_id == Some(id)))
            .filter(|o| filters.account_id.map_or(true, |id| o.account_id == id))
            .map(|o| tables.summary(o))
            .collect();
        matching.sort_by(|a, b| b.opportunity.created_at.cmp(&a.opportunity.created_at));
        Ok(Page { total: matching.len() as i64, rows: window.slice(&matching) })
    }

    async fn find(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<OpportunitySummary>> {
        let tables = self.lock();
        Ok(tables.opportunity(tenant_id, id).map(|o| tables.summary(o)))
    }

    async fn create(&self, mut opportunity: Opportunity) -> RepoResult<WriteOutcome<Opportunity>> {
        let mut tables = self.lock();
        let tenant_id = opportunity.tenant_id;
        if tables.account(tenant_id, opportunity.account_id).is_none() {
            return Ok(WriteOutcome::Missing(account::NOT_FOUND));
        }
        let stage = match opportunity.stage_id {
            Some(stage_id) => match tables.stage(tenant_id, stage_id) {
                Some(stage) => Some(stage.clone()),
                None => return Ok(WriteOutcome::Missing(STAGE_NOT_FOUND)),
            },
            None => tables.sorted_stages(tenant_id).into_iter().next(),
        };
        if let Some(stage) = &stage {
            take_stage(&mut opportunity, stage);
            tables.record_stage(&opportunity, stage.id, Some(stage.id), opportunity.created_by, None);
        }
        tables.opportunities.push(opportunity.clone());
        Ok(WriteOutcome::Written(opportunity))
    }

    async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &OpportunityPatch,
        actor: Option<i32>,
    ) -> RepoResult<WriteOutcome<Opportunity>> {
        let mut tables = self.lock();
        let Some(current) = tables.opportunity(tenant_id, id).cloned() else {
            return Ok(WriteOutcome::Missing(opportunity::NOT_FOUND));
        };
        if let Some(account_id) = patch.account_id {
            if tables.account(tenant_id, account_id).is_none() {
                return Ok(WriteOutcome::Missing(account::NOT_FOUND));
            }
        }
        let stage = match patch.stage_id {
            Some(stage_id) => match tables.stage(tenant_id, stage_id) {
                Some(stage) => Some(stage.clone()),
                None => return Ok(WriteOutcome::Missing(STAGE_NOT_FOUND)),
            },
            None => None,
        };

        let mut updated = current.clone();
        apply_patch(patch, &mut updated);
        if let Some(stage) = &stage {
            take_stage(&mut updated, stage);
        }
        updated.updated_by = actor;
        updated.updated_at = Utc::now();
        if let Some(slot) = tables.opportunities.iter_mut().find(|o| o.tenant_id == tenant_id && o.id == id) {
            *slot = updated.clone();
        }
        if let (Some(stage_id), true) = (updated.stage_id, updated.stage_id != current.stage_id) {
            tables.record_stage(&updated, stage_id, current.stage_id, actor, None);
        }
        Ok(WriteOutcome::Written(updated))
    }

    async fn dependents(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<OpportunityDependents>> {
        let tables = self.lock();
        Ok(tables.opportunity(tenant_id, id).map(|_| OpportunityDependents {
            contact_count: tables
                .opportunity_links
                .iter()
                .filter(|l| l.tenant_id == tenant_id && l.opportunity_id == id)
                .count() as i64,
        }))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> RepoResult<DeleteOutcome<OpportunityDependents>> {
        let Some(deps) = OpportunityRepository::dependents(self, tenant_id, id).await? else {
            return Ok(DeleteOutcome::Missing);
        };
        if deps.contact_count > 0 && !force {
            return Ok(DeleteOutcome::Blocked(deps));
        }
        let mut tables = self.lock();
        let mut removed = OpportunityDependents::default();
        if force {
            removed = deps;
            tables.opportunity_links.retain(|l| !(l.tenant_id == tenant_id && l.opportunity_id == id));
        }
        tables.history.retain(|h| !(h.tenant_id == tenant_id && h.entry.opportunity_id == id));
        tables.opportunities.retain(|o| !(o.tenant_id == tenant_id && o.id == id));
        Ok(DeleteOutcome::Deleted(removed))
    }

    async fn relations(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<OpportunityRelations>> {
        let tables = self.lock();
        let Some(opportunity) = tables.opportunity(tenant_id, id).cloned() else {
            return Ok(None);
        };
        let account = tables.account(tenant_id, opportunity.account_id).cloned();
        let mut contacts: Vec<OpportunityContactView> = tables
            .opportunity_links
            .iter()
            .filter(|l| l.tenant_id == tenant_id && l.opportunity_id == id)
            .filter_map(|l| tables.opportunity_link_view(l))
            .collect();
        contacts.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then(a.first_name.cmp(&b.first_name))
                .then(a.link.id.cmp(&b.link.id))
        });
        Ok(Some(OpportunityRelations { opportunity, account, contacts }))
    }

    async fn stage_history(&self, tenant_id: i32, id: Uuid) -> RepoResult<Option<Vec<StageHistoryEntry>>> {
        let tables = self.lock();
        Ok(tables.opportunity(tenant_id, id).map(|_| tables.history_of(tenant_id, id)))
    }

    async fn move_stage(
        &self,
        tenant_id: i32,
        id: Uuid,
        stage_id: Uuid,
        actor: i32,
        reason: Option<String>,
    ) -> RepoResult<WriteOutcome<StageHistoryEntry>> {
        let mut tables = self.lock();
        let Some(current) = tables.opportunity(tenant_id, id).cloned() else {
            return Ok(WriteOutcome::Missing(opportunity::NOT_FOUND));
        };
        let Some(stage) = tables.stage(tenant_id, stage_id).cloned() else {
            return Ok(WriteOutcome::Missing(STAGE_NOT_FOUND));
        };
        let mut updated = current.clone();
        take_stage(&mut updated, &stage);
        updated.updated_by = Some(actor);
        updated.updated_at = Utc::now();
        if let Some(slot) = tables.opportunities.iter_mut().find(|o| o.tenant_id == tenant_id && o.id == id) {
            *slot = updated.clone();
        }
        let entry = tables.record_stage(&updated, stage.id, current.stage_id, Some(actor), reason);
        Ok(WriteOutcome::Written(entry))
    }

    async fn stage_history_details(
        &self,
        tenant_id: i32,
        id: Uuid,
        user_id: i32,
    ) -> RepoResult<Option<Vec<StageHistoryEntry>>> {
        let tables = self.lock();
        if tables.opportunity(tenant_id, id).is_none() {
            return Ok(None);
        }
        let mut entries: Vec<StageHistoryEntry> = tables
            .history_of(tenant_id, id)
            .into_iter()
            .filter(|e| e.created_by == Some(user_id) && e.reason.is_some())
            .rev()
            .collect();
        entries.sort_by(|a, b| b.entered_at.cmp(&a.entered_at));
        Ok(Some(entries))
    }

    async fn pipeline(&self, tenant_id: i32) -> RepoResult<Vec<PipelineColumn>> {
        let tables = self.lock();
        Ok(PipelineColumn::group(tables.sorted_stages(tenant_id), tables.opportunity_summaries(tenant_id)))
    }
}

#[async_trait]
impl OpportunityContactRepository for MemoryStore {
    async fn create(&self, link: OpportunityContact) -> RepoResult<WriteOutcome<OpportunityContact>> {
        let mut tables = self.lock();
        if tables.opportunity(link.tenant_id, link.opportunity_id).is_none() {
            return Ok(WriteOutcome::Missing(opportunity::NOT_FOUND));
        }
        if tables.contact(link.tenant_id, link.contact_id).is_none() {
            return Ok(WriteOutcome::Missing(contact::NOT_FOUND));
        }
        let duplicate = tables.opportunity_links.iter().any(|l| {
            l.tenant_id == link.tenant_id && l.opportunity_id == link.opportunity_id && l.contact_id == link.contact_id
        });
        if duplicate {
            return Ok(WriteOutcome::Conflict(DUPLICATE));
        }
        tables.opportunity_links.push(link.clone());
        Ok(WriteOutcome::Written(link))
    }

    async fn list(&self, tenant_id: i32, filters: &OpportunityContactFilters) -> RepoResult<Vec<OpportunityContactView>> {
        let tables = self.lock();
        let mut rows: Vec<OpportunityContactView> = tables
            .opportunity_links
            .iter()
            .rev()
            .filter(|l| l.tenant_id == tenant_id)
            .filter(|l| filters.opportunity_id.map_or(true, |id| l.opportunity_id == id))
            .filter(|l| filters.contact_id.map_or(true, |id| l.contact_id == id))
            .filter_map(|l| tables.opportunity_link_view(l))
            .collect();
        rows.sort_by(|a, b| b.link.created_at.cmp(&a.link.created_at));
        Ok(rows)
    }

    async fn update_role(&self, tenant_id: i32, id: Uuid, role: &str) -> RepoResult<Option<OpportunityContact>> {
        let mut tables = self.lock();
        Ok(tables
            .opportunity_links
            .iter_mut()
            .find(|l| l.tenant_id == tenant_id && l.id == id)
            .map(|l| {
                l.role = role.to_string();
                l.clone()
            }))
    }

    async fn delete(&self, tenant_id: i32, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.lock();
        let before = tables.opportunity_links.len();
        tables.opportunity_links.retain(|l| !(l.tenant_id == tenant_id && l.id == id));
        Ok(tables.opportunity_links.len() < before)
    }
}

#[async_trait]
impl DashboardRepository for MemoryStore {
    async fn open_opportunities(&self, tenant_id: i32, owner_id: i32) -> RepoResult<Vec<DashboardOpportunity>> {
        let tables = self.lock();
        let mut open: Vec<&Opportunity> = tables
            .opportunities
            .iter()
            .filter(|o| o.tenant_id == tenant_id && o.owner_id == Some(owner_id) && tables.is_open(o))
            .collect();
        open.sort_by(|a, b| {
            nulls_last(&a.expected_close_date, &b.expected_close_date)
                .then(nulls_last(&a.amount.map(Reverse), &b.amount.map(Reverse)))
                .then(a.id.cmp(&b.id))
        });

        Ok(open
            .into_iter()
            .map(|o| {
                let mut contacts: Vec<_> = tables
                    .opportunity_links
                    .iter()
                    .filter(|l| l.tenant_id == tenant_id && l.opportunity_id == o.id)
                    .filter_map(|l| tables.contact(tenant_id, l.contact_id))
                    .collect();
                contacts.sort_by(|a, b| a.last_name.cmp(&b.last_name).then(a.first_name.cmp(&b.first_name)));
                let related_contacts = Value::Array(
                    contacts
                        .into_iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "first_name": c.first_name,
                                "last_name": c.last_name,
                                "email": c.email,
                                "title": c.title,
                            })
                        })
                        .collect(),
                );
                let stage = tables.opportunity_stage(o);
                DashboardOpportunity {
                    id: o.id,
                    name: o.name.clone(),
                    description: o.description.clone(),
                    amount: o.amount,
                    probability: o.probability,
                    stage_id: o.stage_id,
                    expected_close_date: o.expected_close_date,
                    actual_close_date: o.actual_close_date,
                    account_id: o.account_id,
                    owner_id: o.owner_id,
                    tenant_id,
                    created_at: o.created_at,
                    updated_at: o.updated_at,
                    account_name: tables.account(tenant_id, o.account_id).map(|a| a.name.clone()),
                    stage_name: stage.map(|s| s.name.clone()),
                    is_stage_closed: stage.is_some_and(Stage::is_closed),
                    related_contacts,
                    stage_color: String::new(),
                }
            })
            .collect())
    }

    async fn pipeline_summary(&self, tenant_id: i32) -> RepoResult<Vec<PipelineSummaryRow>> {
        Ok(self.lock().pipeline_summary(tenant_id))
    }
}
