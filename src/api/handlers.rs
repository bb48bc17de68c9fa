//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::{stream, Stream};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    engine::{DayView, TimerView},
    state::{AppState, Committed},
};
use super::{
    access::Caller,
    responses::{ApiError, HealthResponse, LogResponse, OperationResponse},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    pub delta_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    pub minutes: i64,
}

fn respond<T>(message: String, committed: &Committed<T>, timer: Option<&str>) -> Json<OperationResponse> {
    // Storage trouble is a warning, not a failure: the change is committed.
    if let Some(warning) = &committed.warning {
        warn!("{}: {}", message, warning);
    }
    Json(OperationResponse::committed(message, committed, timer))
}

/// Handle POST /timers/:id/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Caller(access): Caller,
    Path(id): Path<String>,
) -> Result<Json<OperationResponse>, ApiError> {
    let committed = state.start(access, &id)?;
    info!("Start endpoint called - {} running", id);
    Ok(respond(format!("Timer {} started", id), &committed, Some(&id)))
}

/// Handle POST /timers/:id/stop
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Caller(access): Caller,
    Path(id): Path<String>,
) -> Result<Json<OperationResponse>, ApiError> {
    let committed = state.stop(access, &id)?;
    info!("Stop endpoint called - {} idle", id);
    Ok(respond(format!("Timer {} stopped", id), &committed, Some(&id)))
}

/// Handle POST /timers/:id/restart
pub async fn restart_handler(
    State(state): State<Arc<AppState>>,
    Caller(access): Caller,
    Path(id): Path<String>,
) -> Result<Json<OperationResponse>, ApiError> {
    let committed = state.restart(access, &id)?;
    let message = format!("Timer {} restarted ({} used)", id, committed.value);
    Ok(respond(message, &committed, Some(&id)))
}

/// Handle POST /timers/:id/adjust
pub async fn adjust_handler(
    State(state): State<Arc<AppState>>,
    Caller(access): Caller,
    Path(id): Path<String>,
    body: Result<Json<AdjustRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, ApiError> {
    // A read-only caller is refused before its body is looked at.
    access.require("adjust")?;
    let Json(request) = body?;
    let committed = state.manual_adjust(access, &id, request.delta_seconds)?;
    let message = format!("Timer {} adjusted by {}s", id, request.delta_seconds);
    let Json(response) = respond(message, &committed, Some(&id));
    Ok(Json(response.with_charged(committed.value)))
}

/// Handle POST /timers/:id/jump
pub async fn jump_handler(
    State(state): State<Arc<AppState>>,
    Caller(access): Caller,
    Path(id): Path<String>,
    body: Result<Json<JumpRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, ApiError> {
    access.require("jump")?;
    let Json(request) = body?;
    let committed = state.jump_time(access, &id, request.minutes)?;
    let message = format!("Timer {} jumped {} min", id, request.minutes);
    let Json(response) = respond(message, &committed, Some(&id));
    Ok(Json(response.with_charged(committed.value)))
}

/// Handle POST /day/reset
pub async fn reset_day_handler(
    State(state): State<Arc<AppState>>,
    Caller(access): Caller,
) -> Result<Json<OperationResponse>, ApiError> {
    let committed = state.reset_day(access)?;
    Ok(respond(format!("Day {} started", committed.value), &committed, None))
}

/// Handle GET /state
pub async fn state_handler(State(state): State<Arc<AppState>>) -> Json<DayView> {
    Json(state.day_view())
}

/// Handle GET /timers/:id
pub async fn timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TimerView>, ApiError> {
    Ok(Json(state.timer_view(&id)?))
}

/// Handle GET /events - committed snapshots as server-sent events.
///
/// The first event carries the current snapshot. Later events are sent as
/// revisions are committed; a slow client skips straight to the latest one.
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    debug!("Events subscriber connected");
    let updates = state.subscribe();
    let events = stream::unfold((updates, true), |(mut updates, first)| async move {
        if !first && updates.changed().await.is_err() {
            return None;
        }
        let snapshot = updates.borrow_and_update().clone();
        let event = Event::default()
            .event("snapshot")
            .id(snapshot.revision.to_string())
            .json_data(&snapshot);
        Some((event, (updates, false)))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle GET /log
pub async fn log_handler(State(state): State<Arc<AppState>>) -> Json<LogResponse> {
    Json(LogResponse { entries: state.activity() })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(
        state.get_uptime(),
        state.is_follower(),
        state.info.host.clone(),
        state.info.port,
    ))
}
