// Route modules
pub mod checkin;
pub mod credits;
pub mod reconcile;
pub mod tasks;
pub mod welcome;

use crate::{
    app_state::AppState,
    error::Result,
    middleware::{api_key_middleware, logging_middleware},
    models::common::MessageResponse,
};
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-api-key")]);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// API v1 routes, all behind the service API key
fn api_v1_routes(state: AppState) -> Router<AppState> {
    let ledger_routes = Router::new()
        .route("/users/{user_id}/credits", get(credits::get_credits))
        .route(
            "/users/{user_id}/credits/grants",
            post(credits::grant_credits),
        )
        .route(
            "/users/{user_id}/credits/consume",
            post(credits::consume_credits),
        )
        .route(
            "/users/{user_id}/consumptions/summary",
            get(credits::consumption_summary),
        )
        .route("/consumptions/{id}", get(credits::get_consumption))
        .route(
            "/consumptions/{id}/refund",
            post(credits::refund_consumption),
        )
        .route(
            "/users/{user_id}/credits/welcome",
            post(welcome::grant_welcome_bonus),
        )
        .route("/batches/{id}/revoke", post(credits::revoke_batch))
        .route(
            "/users/{user_id}/checkin",
            get(checkin::checkin_status).post(checkin::check_in),
        );

    let task_routes = Router::new()
        .route(
            "/users/{user_id}/tasks",
            get(tasks::task_history).post(tasks::submit_task),
        )
        .route("/tasks/{id}", get(tasks::get_task))
        .route("/tasks/{id}/progress", post(tasks::update_progress))
        .route("/tasks/{id}/fail", post(tasks::fail_task))
        .route("/tasks/{id}/translate", post(tasks::translate_task));

    let admin_routes = Router::new().route(
        "/admin/reconcile/{user_id}",
        get(reconcile::audit).post(reconcile::repair),
    );

    Router::new()
        .merge(ledger_routes)
        .merge(task_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(state, api_key_middleware))
        .layer(middleware::from_fn(logging_middleware))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    state.db.ping().await?;
    Ok(Json(MessageResponse::new("ok")))
}
