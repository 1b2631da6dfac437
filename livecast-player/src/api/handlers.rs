//! HTTP request handlers

use crate::api::server::AppContext;
use crate::playback::SchedulerStatus;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoLiveRequest {
    #[serde(default)]
    language: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn poller_gone(e: crate::error::Error) -> ApiError {
    error!("Control command not delivered: {}", e);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "livecast-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /status - last status published by the poller
pub async fn get_status(State(ctx): State<AppContext>) -> Json<SchedulerStatus> {
    Json(ctx.state.get_status().await)
}

/// POST /go-live - start a new live session
///
/// The body is optional; without a language the configured one is used.
pub async fn go_live(
    State(ctx): State<AppContext>,
    body: Option<Json<GoLiveRequest>>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let language = request.language.filter(|l| !l.trim().is_empty());

    info!(language = ?language, "Go-live requested");
    ctx.poller.go_live(language).await.map_err(poller_gone)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StatusResponse {
            status: "queued".to_string(),
        }),
    ))
}

/// POST /session/finish - no further segments will arrive
pub async fn finish_session(
    State(ctx): State<AppContext>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    info!("Session completion signalled");
    ctx.poller.finish_session().await.map_err(poller_gone)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StatusResponse {
            status: "finishing".to_string(),
        }),
    ))
}
