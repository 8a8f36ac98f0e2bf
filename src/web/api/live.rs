use axum::{extract::State, http::StatusCode, Json};

use crate::playback::LiveUpdate;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::server::AppState;

#[utoipa::path(
    post,
    path = "/api/live",
    request_body = LiveUpdate,
    responses(
        (status = 202, description = "Update queued for the live table"),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "live"
)]
pub async fn push_update(
    State(state): State<AppState>,
    Json(update): Json<LiveUpdate>,
) -> ApiResult<StatusCode> {
    state
        .live_tx
        .send(update)
        .await
        .map_err(|_| ApiError::Unavailable("live feed closed".to_string()))?;
    Ok(StatusCode::ACCEPTED)
}
