use std::sync::Arc;

use super::ServiceResult;
use crate::database::models::{OpportunityBoard, PipelineSummaryRow};
use crate::repository::{DashboardRepository, Repositories};

/// Per-user home dashboard
#[derive(Clone)]
pub struct DashboardService {
    dashboard: Arc<dyn DashboardRepository>,
}

impl DashboardService {
    pub fn new(repos: &Repositories) -> Self {
        Self { dashboard: repos.dashboard.clone() }
    }

    /// Open opportunities owned by `user_id` inside the tenant
    pub async fn opportunities(&self, tenant_id: i32, user_id: i32) -> ServiceResult<OpportunityBoard> {
        let rows = self.dashboard.open_opportunities(tenant_id, user_id).await?;
        Ok(OpportunityBoard::from_rows(rows))
    }

    pub async fn pipeline(&self, tenant_id: i32) -> ServiceResult<Vec<PipelineSummaryRow>> {
        Ok(self.dashboard.pipeline_summary(tenant_id).await?)
    }
}
