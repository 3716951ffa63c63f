use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{app_state::AppState, error::Result, models::welcome::WelcomeBonusResponse};

/// POST /api/v1/users/{user_id}/credits/welcome
#[instrument(skip(state))]
pub async fn grant_welcome_bonus(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<WelcomeBonusResponse>> {
    let outcome = state.welcome_bonus_service.grant_welcome(user_id).await?;
    Ok(Json(WelcomeBonusResponse::new(outcome)))
}
