//! Queue observability handlers.

use axum::{extract::State, Json};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::QUEUE_TAG;
use crate::error::{AppError, AppResult};
use crate::queue::QueueStats;
use crate::state::AppState;

pub fn queue_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(queue_stats))
}

/// GET /api/queue/stats - Broker lane cardinalities
#[utoipa::path(
    get,
    path = "/stats",
    tag = QUEUE_TAG,
    responses(
        (status = 200, description = "Lane cardinalities", body = QueueStats),
        (status = 500, description = "Broker unavailable")
    )
)]
async fn queue_stats(State(state): State<AppState>) -> AppResult<Json<QueueStats>> {
    let stats = state
        .queue
        .stats()
        .await
        .map_err(|e| AppError::Queue { source: e })?;
    Ok(Json(stats))
}
