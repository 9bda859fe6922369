//! API error envelope and process-wide error tracking.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// A critical error message seen more than this many times raises an alert
/// log for the external alerting hook.
const ALERT_THRESHOLD: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub count: u64,
    pub severity: Severity,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub errors: Vec<ErrorDetail>,
}

static ERROR_COUNTS: Lazy<Mutex<HashMap<String, u64>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Counts one occurrence of `message` and builds its envelope entry.
pub fn track(message: &str, severity: Severity) -> ErrorDetail {
    let count = {
        let mut counts = ERROR_COUNTS.lock().expect("error tracker poisoned");
        let entry = counts.entry(message.to_string()).or_insert(0);
        *entry += 1;
        *entry
    };
    if severity == Severity::Critical && count > ALERT_THRESHOLD {
        error!(alert = true, count, message, "high occurrence of critical error");
    }
    ErrorDetail {
        message: message.to_string(),
        count,
        severity,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Request-level failures rendered as the error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("response validation failed")]
    Validation(Vec<String>),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, vec![track(message, Severity::Error)])
            }
            ApiError::Validation(issues) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                issues
                    .iter()
                    .map(|issue| track(issue, Severity::Critical))
                    .collect(),
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                vec![track(message, Severity::Error)],
            ),
            ApiError::Database(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                vec![track(&format!("database query failed: {err}"), Severity::Error)],
            ),
        };
        error!(status = %status, error = %self, "request failed");
        (status, Json(ErrorEnvelope { errors: details })).into_response()
    }
}
