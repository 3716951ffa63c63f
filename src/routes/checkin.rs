use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::Result,
    models::checkin::{CheckinResponse, CheckinStatusResponse},
};

/// POST /api/v1/users/{user_id}/checkin
#[instrument(skip(state))]
pub async fn check_in(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CheckinResponse>> {
    let outcome = state.checkin_service.check_in(user_id).await?;
    Ok(Json(CheckinResponse::new(outcome)))
}

/// GET /api/v1/users/{user_id}/checkin
#[instrument(skip(state))]
pub async fn checkin_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CheckinStatusResponse>> {
    let status = state.checkin_service.status(user_id).await?;
    Ok(Json(CheckinStatusResponse::new(status)))
}
