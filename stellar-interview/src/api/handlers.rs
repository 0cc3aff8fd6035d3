//! HTTP request handlers
//!
//! Control endpoints forward to the `PlayerHandle` and wait for the command
//! to finish (or be superseded). Errors come back as
//! `(StatusCode, Json<StatusResponse>)`.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::playback::{CommandOutcome, PlayerSnapshot};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use stellar_common::human_time::format_position_ms;
use stellar_common::{InstanceId, LineId, PlaybackState};
use tracing::{error, info, warn};

type ApiError = (StatusCode, Json<StatusResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    instance_id: InstanceId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    status: String,
    outcome: CommandOutcome,
    snapshot: PlayerSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    position_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    position_ms: u64,
    duration_ms: u64,
    /// Position formatted for display, scaled to the duration ("4.50s", "1:05.0s" or "1:01:05")
    position: String,
    state: PlaybackState,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    /// False when the transcript was rejected and highlighting is off
    available: bool,
    error: Option<String>,
    active_line: Option<LineId>,
    lines: Vec<TranscriptLineInfo>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptLineInfo {
    id: LineId,
    start_ms: u64,
    end_ms: Option<u64>,
    speaker: Option<String>,
    text: String,
    active: bool,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    visible: bool,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "stellar-interview".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        instance_id: ctx.player.instance_id(),
    })
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// POST /playback/play
pub async fn play(State(ctx): State<AppContext>) -> Result<Json<CommandResponse>, ApiError> {
    let result = ctx.player.play().await;
    command_response(&ctx, "play", result)
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> Result<Json<CommandResponse>, ApiError> {
    let result = ctx.player.pause().await;
    command_response(&ctx, "pause", result)
}

/// POST /playback/toggle
pub async fn toggle(State(ctx): State<AppContext>) -> Result<Json<CommandResponse>, ApiError> {
    let result = ctx.player.toggle().await;
    command_response(&ctx, "toggle", result)
}

/// POST /playback/click - user click on the player surface
pub async fn click(State(ctx): State<AppContext>) -> Result<Json<CommandResponse>, ApiError> {
    let result = ctx.player.click().await;
    command_response(&ctx, "click", result)
}

/// POST /playback/restart - rewind to 0 and play
pub async fn restart(State(ctx): State<AppContext>) -> Result<Json<CommandResponse>, ApiError> {
    let result = ctx.player.restart().await;
    command_response(&ctx, "restart", result)
}

/// POST /playback/activate - prepare the backend without playing
pub async fn activate(State(ctx): State<AppContext>) -> Result<Json<CommandResponse>, ApiError> {
    let result = ctx.player.activate().await;
    command_response(&ctx, "activate", result)
}

/// POST /playback/seek
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let result = ctx.player.seek(req.position_ms).await;
    command_response(&ctx, "seek", result)
}

/// GET /playback/state
pub async fn get_state(State(ctx): State<AppContext>) -> Json<PlayerSnapshot> {
    Json(ctx.player.snapshot())
}

/// GET /playback/position
pub async fn get_position(State(ctx): State<AppContext>) -> Json<PositionResponse> {
    let snapshot = ctx.player.snapshot();
    Json(PositionResponse {
        position_ms: snapshot.current_ms,
        duration_ms: snapshot.duration_ms,
        position: format_position_ms(snapshot.current_ms, snapshot.duration_ms),
        state: snapshot.state,
    })
}

// ============================================================================
// Transcript and Visibility Endpoints
// ============================================================================

/// GET /transcript - lines with the active one flagged
pub async fn get_transcript(State(ctx): State<AppContext>) -> Json<TranscriptResponse> {
    let active_line = ctx.player.snapshot().active_line;

    let lines = ctx
        .player
        .transcript()
        .map(|index| {
            index
                .lines()
                .iter()
                .map(|line| TranscriptLineInfo {
                    id: line.id,
                    start_ms: line.start_ms,
                    end_ms: line.end_ms,
                    speaker: line.speaker.clone(),
                    text: line.text.clone(),
                    active: active_line == Some(line.id),
                })
                .collect()
        })
        .unwrap_or_default();

    Json(TranscriptResponse {
        available: ctx.player.transcript().is_some(),
        error: ctx.player.transcript_error().map(str::to_string),
        active_line,
        lines,
    })
}

/// POST /visibility - host reports whether the player is on screen
pub async fn set_visibility(
    State(ctx): State<AppContext>,
    Json(req): Json<VisibilityRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    if ctx.visibility.set_visible(ctx.player.instance_id(), req.visible) {
        info!("Visibility reported: {}", req.visible);
        Ok(Json(StatusResponse {
            status: "ok".to_string(),
        }))
    } else {
        warn!("Visibility reported but the player is not subscribed");
        Err((
            StatusCode::CONFLICT,
            Json(StatusResponse {
                status: "error: player does not observe visibility".to_string(),
            }),
        ))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn command_response(
    ctx: &AppContext,
    name: &str,
    result: crate::error::Result<CommandOutcome>,
) -> Result<Json<CommandResponse>, ApiError> {
    match result {
        Ok(outcome) => {
            info!("{} command: {:?}", name, outcome);
            Ok(Json(CommandResponse {
                status: "ok".to_string(),
                outcome,
                snapshot: ctx.player.snapshot(),
            }))
        }
        Err(e) => {
            error!("{} command failed: {}", name, e);
            Err((
                error_status(&e),
                Json(StatusResponse {
                    status: format!("error: {}", e),
                }),
            ))
        }
    }
}

fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::BackendUnavailable(_) | Error::EngineStopped => StatusCode::SERVICE_UNAVAILABLE,
        Error::BackendOperation { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
