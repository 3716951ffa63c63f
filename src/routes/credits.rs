use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::credits::{
        ConsumeCreditsRequest, ConsumeReason, ConsumptionDetailResponse,
        ConsumptionReceiptResponse, ConsumptionSummaryResponse, CreditBatchRecord,
        CreditBatchResponse, CreditsOverview, CreditsOverviewResponse, GrantCreditsData,
        GrantCreditsRequest, GrantCreditsResponse, RefundData, RefundResponse,
        RevokeBatchRequest,
    },
    services::GrantCredits,
};

/// GET /api/v1/users/{user_id}/credits
#[instrument(skip(state))]
pub async fn get_credits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CreditsOverviewResponse>> {
    let balance = state.credits_service.balance(user_id).await?;
    let batches = state.credits_service.list_batches(user_id).await?;

    Ok(Json(CreditsOverviewResponse::new(CreditsOverview {
        balance,
        batches: batches.iter().map(CreditBatchRecord::from).collect(),
    })))
}

/// POST /api/v1/users/{user_id}/credits/grants
#[instrument(skip(state, request), fields(transaction_no = %request.transaction_no))]
pub async fn grant_credits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<GrantCreditsRequest>,
) -> Result<(StatusCode, Json<GrantCreditsResponse>)> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let batch = state
        .credits_service
        .grant(user_id, GrantCredits::from(request))
        .await?;
    let balance = state.credits_service.balance(user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(GrantCreditsResponse::new(GrantCreditsData {
            batch: CreditBatchRecord::from(&batch),
            balance,
        })),
    ))
}

/// POST /api/v1/users/{user_id}/credits/consume
#[instrument(skip(state, request))]
pub async fn consume_credits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<ConsumeCreditsRequest>,
) -> Result<Json<ConsumptionReceiptResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let reason = ConsumeReason {
        reason: request.reason,
        description: request.description,
        task_id: request.task_id,
    };
    let receipt = state
        .credits_service
        .consume(user_id, request.amount, reason)
        .await?;

    Ok(Json(ConsumptionReceiptResponse::new(receipt)))
}

/// GET /api/v1/users/{user_id}/consumptions/summary
#[instrument(skip(state))]
pub async fn consumption_summary(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ConsumptionSummaryResponse>> {
    let summary = state.credits_service.consumption_summary(user_id).await?;
    Ok(Json(ConsumptionSummaryResponse::new(summary)))
}

/// GET /api/v1/consumptions/{id}
#[instrument(skip(state))]
pub async fn get_consumption(
    State(state): State<AppState>,
    Path(consumption_id): Path<Uuid>,
) -> Result<Json<ConsumptionDetailResponse>> {
    let detail = state.credits_service.get_consumption(consumption_id).await?;
    Ok(Json(ConsumptionDetailResponse::new(detail)))
}

/// POST /api/v1/consumptions/{id}/refund
///
/// Always 200 when the request was understood; the body says whether anything moved.
#[instrument(skip(state))]
pub async fn refund_consumption(
    State(state): State<AppState>,
    Path(consumption_id): Path<Uuid>,
) -> Result<Json<RefundResponse>> {
    let outcome = state.credits_service.refund(consumption_id).await?;
    Ok(Json(RefundResponse::new(RefundData {
        outcome,
        consumption_id,
    })))
}

/// POST /api/v1/batches/{id}/revoke
#[instrument(skip(state, request))]
pub async fn revoke_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<RevokeBatchRequest>,
) -> Result<Json<CreditBatchResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let batch = state
        .credits_service
        .revoke_batch(batch_id, &request.reason)
        .await?;

    Ok(Json(CreditBatchResponse::new(CreditBatchRecord::from(&batch))))
}
