//! API response structures

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    engine::{EngineError, PoolView, TimerView},
    state::{ActivityEntry, Committed},
};

/// API response structure for mutating endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub revision: u64,
    pub pool: PoolView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerView>,
    /// Seconds charged to the pool by this operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charged: Option<u64>,
    /// Present when the change could not be persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl OperationResponse {
    /// Create a success response from a committed operation, showing
    /// `timer` when given
    pub fn committed<T>(message: String, committed: &Committed<T>, timer: Option<&str>) -> Self {
        Self {
            status: if committed.warning.is_some() { "unsaved" } else { "ok" }.to_string(),
            message,
            timestamp: Utc::now(),
            revision: committed.view.revision,
            pool: committed.view.pool.clone(),
            timer: timer.and_then(|id| committed.view.timer(id)).cloned(),
            charged: None,
            warning: committed.warning.clone(),
        }
    }

    pub fn with_charged(mut self, charged: u64) -> Self {
        self.charged = Some(charged);
        self
    }
}

/// Activity feed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogResponse {
    pub entries: Vec<ActivityEntry>,
}

/// Error body returned for rejected operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
    pub role: String,
    pub host: String,
    pub port: u16,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok(uptime: String, follower: bool, host: String, port: u16) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime,
            role: if follower { "follower" } else { "leader" }.to_string(),
            host,
            port,
        }
    }
}

/// Request failures mapped onto HTTP statuses
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// The request body could not be decoded
    Body(JsonRejection),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        let err = match self {
            ApiError::Engine(err) => err,
            ApiError::Body(rejection) => return (rejection.status(), "invalid_body"),
        };
        match err {
            EngineError::InvalidTimer(_) => (StatusCode::NOT_FOUND, "invalid_timer"),
            EngineError::RestartQuotaExceeded { .. } => (StatusCode::CONFLICT, "restart_quota_exceeded"),
            EngineError::NotInOverflow { .. } => (StatusCode::CONFLICT, "not_in_overflow"),
            EngineError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
            EngineError::TickDriverBusy => (StatusCode::CONFLICT, "tick_driver_busy"),
            EngineError::WriteConflict { .. } => (StatusCode::CONFLICT, "write_conflict"),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Engine(err) => err.to_string(),
            ApiError::Body(rejection) => rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let body = ErrorResponse {
            status: "error".to_string(),
            kind: kind.to_string(),
            message: self.message(),
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}
