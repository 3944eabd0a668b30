use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use buildpoints::workflows::review::repository::{
    BuilderStore, GuildDirectory, RejectionStore, ReviewNotifier, ReviewerStore, SubmissionStore,
};
use buildpoints::workflows::review::{review_router, ReviewService};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_review_routes<S, J, B, R, N, G>(
    service: Arc<ReviewService<S, J, B, R, N>>,
    guilds: Arc<G>,
) -> axum::Router
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    review_router(service, guilds)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
