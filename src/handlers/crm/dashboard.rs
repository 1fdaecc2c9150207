use axum::extract::{Extension, State};

use crate::database::models::{OpportunityBoard, PipelineSummaryRow};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::TenantContext;
use crate::state::AppState;

/// GET /api/crm/dashboard/opportunities - Open opportunities owned by the caller
pub async fn opportunities(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<OpportunityBoard> {
    let board = state.services.dashboard.opportunities(tenant.tenant_id, user.id).await?;
    Ok(ApiResponse::success(board))
}

/// GET /api/crm/dashboard/pipeline
pub async fn pipeline(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Vec<PipelineSummaryRow>> {
    Ok(ApiResponse::success(state.services.dashboard.pipeline(tenant.tenant_id).await?))
}
