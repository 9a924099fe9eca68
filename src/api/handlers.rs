use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::contracts::{GuardError, LogEntry, Outcome, SequenceStore, StorageError, MAX_SUBMIT_VALUE};
use crate::guard::SequenceGuard;
use crate::metrics::SubmitMetrics;

/// Largest page `GET /log` returns.
pub const MAX_LOG_PAGE: usize = 1000;

/// Application state shared across handlers.
pub struct AppState<S: SequenceStore> {
    pub guard: Arc<SequenceGuard<S>>,
    pub metrics: Arc<SubmitMetrics>,
}

impl<S: SequenceStore> AppState<S> {
    pub fn new(guard: Arc<SequenceGuard<S>>, metrics: Arc<SubmitMetrics>) -> Self {
        Self { guard, metrics }
    }
}

/// Why an increment body was refused before reaching the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Content type is not JSON.
    JsonBodyRequired,
    /// Body is not a JSON object with an `n` field.
    BadBody,
    /// `n` is not an integer in `0..=i64::MAX`.
    InvalidNumber,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::JsonBodyRequired => "json_body_required",
            Self::BadBody => "bad_body",
            Self::InvalidNumber => "n_must_be_non_negative_int",
        }
    }
}

/// Extracts `n` from an increment request.
///
/// Only JSON content types are considered (`application/json` or
/// `application/*+json`). Booleans and floats are not integers.
pub fn parse_increment_body(content_type: Option<&str>, body: &[u8]) -> Result<u64, ValidationError> {
    if !content_type.is_some_and(is_json_content_type) {
        return Err(ValidationError::JsonBodyRequired);
    }

    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| ValidationError::BadBody)?;
    let n = value
        .as_object()
        .and_then(|object| object.get("n"))
        .ok_or(ValidationError::BadBody)?;

    n.as_u64()
        .filter(|n| *n <= MAX_SUBMIT_VALUE)
        .ok_or(ValidationError::InvalidNumber)
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Response for an accepted value.
#[derive(Debug, Serialize, Deserialize)]
pub struct IncrementResponse {
    pub received: u64,
    pub result: u64,
}

/// Response for a rejected value.
#[derive(Debug, Serialize, Deserialize)]
pub struct RejectionResponse {
    pub error: String,
    pub n: u64,
    pub last_processed: Option<u64>,
}

/// Response for a malformed request.
#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<&'static str>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Storage(StorageError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(e) => {
                let expected = (e == ValidationError::BadBody).then_some(r#"{"n": <int>=0}"#);
                (
                    StatusCode::BAD_REQUEST,
                    Json(ValidationErrorResponse {
                        error: e.code(),
                        expected,
                    }),
                )
                    .into_response()
            }
            ApiError::Storage(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                    code: "STORAGE_ERROR".into(),
                }),
            )
                .into_response(),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: msg,
                    code: "INTERNAL_ERROR".into(),
                }),
            )
                .into_response(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Storage(e)
    }
}

impl From<GuardError> for ApiError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::Storage(e) => ApiError::Storage(e),
            GuardError::OutOfRange(_) => ApiError::Validation(ValidationError::InvalidNumber),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

/// POST /increment
/// Submits `{"n": <int>=0}` to the sequence guard.
pub async fn increment<S: SequenceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let start = Instant::now();

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let n = parse_increment_body(content_type, &body).map_err(|e| {
        state.metrics.record_invalid_request();
        ApiError::from(e)
    })?;

    // The guard blocks on its write lock and on the store's WAL write
    let guard = Arc::clone(&state.guard);
    let outcome = tokio::task::spawn_blocking(move || guard.submit(n))
        .await
        .map_err(|e| {
            state.metrics.record_storage_error();
            tracing::error!(value = n, error = %e, "Submit task failed");
            ApiError::Internal(format!("submit task failed: {}", e))
        })?
        .map_err(|e| submit_failure(&state.metrics, n, e))?;

    let latency_us = start.elapsed().as_micros() as u64;
    state.metrics.record_outcome(&outcome, latency_us);

    let response = match outcome {
        Outcome::Accepted { received, result } => {
            (StatusCode::OK, Json(IncrementResponse { received, result })).into_response()
        }
        Outcome::Rejected {
            kind,
            n,
            last_accepted,
        } => (
            StatusCode::CONFLICT,
            Json(RejectionResponse {
                error: kind.code().into(),
                n,
                last_processed: last_accepted,
            }),
        )
            .into_response(),
    };

    Ok(response)
}

/// Counts and logs a failed submit, then maps it to a response.
fn submit_failure(metrics: &SubmitMetrics, n: u64, e: GuardError) -> ApiError {
    match e {
        GuardError::OutOfRange(_) => metrics.record_invalid_request(),
        GuardError::Storage(ref err) => {
            metrics.record_storage_error();
            tracing::error!(value = n, error = %err, "Submit failed");
        }
    }
    ApiError::from(e)
}

/// GET /health
/// Liveness probe. Does not touch the store.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Query parameters for reading the audit log.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    /// First sequence to return
    #[serde(default)]
    pub from: u64,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

/// Response for the audit log endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogResponse {
    pub entries: Vec<LogEntry>,
    pub count: usize,
    /// Sequence to pass as `from` for the next page
    pub next: u64,
}

/// GET /log
/// Pages through the audit log in sequence order.
pub async fn read_log<S: SequenceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<LogResponse>, ApiError> {
    let limit = query.limit.min(MAX_LOG_PAGE);
    let entries = state.guard.read_log(query.from, limit)?;
    let next = entries
        .last()
        .map(|e| e.sequence + 1)
        .unwrap_or(query.from);

    Ok(Json(LogResponse {
        count: entries.len(),
        entries,
        next,
    }))
}

/// Response for stats endpoint.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_secs: f64,
    pub submissions: SubmissionStats,
    pub invalid_requests: u64,
    pub storage_errors: u64,
    pub avg_latency_us: f64,
    pub last_processed: Option<u64>,
    pub accepted_count: u64,
}

#[derive(Debug, Serialize)]
pub struct SubmissionStats {
    pub accepted: u64,
    pub duplicate: u64,
    pub sequence_violation: u64,
}

/// GET /stats
/// Counters since startup plus committed state.
pub async fn get_stats<S: SequenceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let counts = state.metrics.snapshot();
    let summary = state.guard.summary()?;

    Ok(Json(StatsResponse {
        uptime_secs: state.metrics.uptime_secs(),
        submissions: SubmissionStats {
            accepted: counts.accepted,
            duplicate: counts.duplicate,
            sequence_violation: counts.sequence_violation,
        },
        invalid_requests: counts.invalid_requests,
        storage_errors: counts.storage_errors,
        avg_latency_us: state.metrics.latency.mean(),
        last_processed: summary.last_accepted,
        accepted_count: summary.accepted_count,
    }))
}

/// GET /metrics
/// Prometheus text exposition format.
pub async fn metrics<S: SequenceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    let mut output = state.metrics.format_prometheus();

    match state.guard.summary() {
        Ok(summary) => output.push_str(&format!(
            "\n# HELP seqguard_accepted_values Values in the accepted set\n\
             # TYPE seqguard_accepted_values gauge\n\
             seqguard_accepted_values {}\n",
            summary.accepted_count
        )),
        Err(e) => tracing::warn!(error = %e, "Failed to read accepted count for metrics"),
    }

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
