use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::playback::{ControlRequest, Mode, PlaybackStatus, TimeStep};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::server::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SeekRequest {
    pub time: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StepRequest {
    /// Signed; negative steps go back in time.
    pub amount: i32,
    pub unit: TimeStep,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SpeedRequest {
    pub multiplier: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WindowRequest {
    pub hours: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ModeRequest {
    pub mode: Mode,
}

async fn control(state: &AppState, request: ControlRequest) -> ApiResult<Json<PlaybackStatus>> {
    let status = state.engine.control(request).await?;
    Ok(Json(status))
}

#[utoipa::path(
    get,
    path = "/api/playback",
    responses(
        (status = 200, description = "Mode, clock and history state", body = PlaybackStatus)
    ),
    tag = "playback"
)]
pub async fn status(State(state): State<AppState>) -> Json<PlaybackStatus> {
    Json(state.engine.status())
}

#[utoipa::path(
    post,
    path = "/api/playback/play",
    responses(
        (status = 200, description = "Playback started; ignored while live", body = PlaybackStatus),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn play(State(state): State<AppState>) -> ApiResult<Json<PlaybackStatus>> {
    control(&state, ControlRequest::Play).await
}

#[utoipa::path(
    post,
    path = "/api/playback/pause",
    responses(
        (status = 200, description = "Playback paused", body = PlaybackStatus),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn pause(State(state): State<AppState>) -> ApiResult<Json<PlaybackStatus>> {
    control(&state, ControlRequest::Pause).await
}

#[utoipa::path(
    post,
    path = "/api/playback/seek",
    request_body = SeekRequest,
    responses(
        (status = 200, description = "Virtual time moved, clamped into the window", body = PlaybackStatus),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn seek(
    State(state): State<AppState>,
    Json(request): Json<SeekRequest>,
) -> ApiResult<Json<PlaybackStatus>> {
    control(&state, ControlRequest::Seek(request.time)).await
}

#[utoipa::path(
    post,
    path = "/api/playback/step",
    request_body = StepRequest,
    responses(
        (status = 200, description = "Virtual time stepped, clamped into the window", body = PlaybackStatus),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> ApiResult<Json<PlaybackStatus>> {
    control(
        &state,
        ControlRequest::Step {
            amount: request.amount,
            unit: request.unit,
        },
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/playback/speed",
    request_body = SpeedRequest,
    responses(
        (status = 200, description = "Speed changed", body = PlaybackStatus),
        (status = 400, description = "Speed not a positive number", body = ErrorResponse),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn set_speed(
    State(state): State<AppState>,
    Json(request): Json<SpeedRequest>,
) -> ApiResult<Json<PlaybackStatus>> {
    control(&state, ControlRequest::SetSpeed(request.multiplier)).await
}

#[utoipa::path(
    post,
    path = "/api/playback/speed/next",
    responses(
        (status = 200, description = "Switched to the next speed preset", body = PlaybackStatus),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn next_speed(State(state): State<AppState>) -> ApiResult<Json<PlaybackStatus>> {
    control(&state, ControlRequest::NextSpeed).await
}

#[utoipa::path(
    post,
    path = "/api/playback/window",
    request_body = WindowRequest,
    responses(
        (status = 200, description = "Window width changed; reloads history while historical", body = PlaybackStatus),
        (status = 400, description = "Width not a positive number of hours", body = ErrorResponse),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn set_window(
    State(state): State<AppState>,
    Json(request): Json<WindowRequest>,
) -> ApiResult<Json<PlaybackStatus>> {
    control(&state, ControlRequest::SetWindowHours(request.hours)).await
}

#[utoipa::path(
    post,
    path = "/api/playback/mode",
    request_body = ModeRequest,
    responses(
        (status = 200, description = "Mode set", body = PlaybackStatus),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn set_mode(
    State(state): State<AppState>,
    Json(request): Json<ModeRequest>,
) -> ApiResult<Json<PlaybackStatus>> {
    control(&state, ControlRequest::SetMode(request.mode)).await
}

#[utoipa::path(
    post,
    path = "/api/playback/toggle",
    responses(
        (status = 200, description = "Switched between live and historical", body = PlaybackStatus),
        (status = 503, description = "Engine stopped", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn toggle(State(state): State<AppState>) -> ApiResult<Json<PlaybackStatus>> {
    control(&state, ControlRequest::Toggle).await
}
