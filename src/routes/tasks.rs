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
    models::tasks::{
        FailTaskData, FailTaskRequest, FailTaskResponse, SubmitTaskRequest, TaskListResponse,
        TaskProgressRequest, TaskResponse, TaskView, TranslateTaskRequest,
    },
};

/// POST /api/v1/users/{user_id}/tasks
#[instrument(skip(state, request))]
pub async fn submit_task(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SubmitTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let task = state.task_service.submit(user_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse::new(TaskView::from(task))),
    ))
}

/// GET /api/v1/users/{user_id}/tasks
#[instrument(skip(state))]
pub async fn task_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<TaskListResponse>> {
    let tasks = state.task_service.history(user_id).await?;
    Ok(Json(TaskListResponse::new(
        tasks.into_iter().map(TaskView::from).collect(),
    )))
}

/// GET /api/v1/tasks/{id}
#[instrument(skip(state))]
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskResponse>> {
    let task = state.task_service.find(task_id).await?;
    Ok(Json(TaskResponse::new(TaskView::from(task))))
}

/// POST /api/v1/tasks/{id}/progress
#[instrument(skip(state, request))]
pub async fn update_progress(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<TaskProgressRequest>,
) -> Result<Json<TaskResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let task = state.task_service.update_progress(task_id, request).await?;
    Ok(Json(TaskResponse::new(TaskView::from(task))))
}

/// POST /api/v1/tasks/{id}/fail
#[instrument(skip(state, request))]
pub async fn fail_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<FailTaskRequest>,
) -> Result<Json<FailTaskResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let failure = state
        .task_service
        .fail(task_id, request.error_message)
        .await?;

    Ok(Json(FailTaskResponse::new(FailTaskData::from(failure))))
}

/// POST /api/v1/tasks/{id}/translate
#[instrument(skip(state, request))]
pub async fn translate_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(request): Json<TranslateTaskRequest>,
) -> Result<Json<TaskResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let task = state
        .task_service
        .translate(task_id, request.target_lang)
        .await?;
    Ok(Json(TaskResponse::new(TaskView::from(task))))
}
