use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::Result,
    models::reconcile::{AuditResponse, RepairResponse},
};

/// GET /api/v1/admin/reconcile/{user_id}
#[instrument(skip(state))]
pub async fn audit(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AuditResponse>> {
    let report = state.reconcile_service.audit(user_id).await?;
    Ok(Json(AuditResponse::new(report)))
}

/// POST /api/v1/admin/reconcile/{user_id}
#[instrument(skip(state))]
pub async fn repair(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<RepairResponse>> {
    let report = state.reconcile_service.repair(user_id).await?;
    Ok(Json(RepairResponse::new(report)))
}
