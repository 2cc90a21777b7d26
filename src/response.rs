//! Uniform tool response envelope and error taxonomy.
//!
//! Every tool handler returns a [`ToolResponse`] serialized to JSON. Failures
//! carry a machine-readable [`ErrorType`] plus optional structured metadata
//! (validation details, secret detections, chunk group ids).

use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Instant;

/// Machine-readable error classification carried in failure envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    ValidationError,
    ConnectionError,
    TimeoutError,
    ServerError,
    ClientError,
    NotFoundError,
    AuthenticationError,
    ExecutionError,
    UnknownError,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::ClientError => "CLIENT_ERROR",
            Self::NotFoundError => "NOT_FOUND_ERROR",
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The envelope returned by every tool operation.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ToolResponse {
    /// Success envelope with a payload.
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            error_type: None,
            metadata: None,
        }
    }

    /// Failure envelope. `error` defaults to the message, `error_type` to
    /// [`ErrorType::UnknownError`] when not given.
    pub fn error(
        message: impl Into<String>,
        error_type: Option<ErrorType>,
        error: Option<String>,
    ) -> Self {
        let message = message.into();
        let error = error.unwrap_or_else(|| message.clone());
        Self {
            success: false,
            message,
            data: None,
            error: Some(error),
            error_type: Some(error_type.unwrap_or(ErrorType::UnknownError)),
            metadata: None,
        }
    }

    /// `VALIDATION_ERROR` envelope; details land in `metadata.validation_details`.
    pub fn validation(message: impl Into<String>, details: Option<Value>) -> Self {
        let mut response = Self::error(message, Some(ErrorType::ValidationError), None);
        if let Some(details) = details {
            response = response.with_metadata("validation_details", details);
        }
        response
    }

    /// `NOT_FOUND_ERROR` envelope with a `"<resource> not found"` message.
    pub fn not_found(resource: impl std::fmt::Display) -> Self {
        Self::error(
            format!("{resource} not found"),
            Some(ErrorType::NotFoundError),
            None,
        )
    }

    /// Attach a metadata key to the envelope.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Record wall-clock duration since `started` under `metadata.duration_ms`.
    pub fn with_duration(self, started: Instant) -> Self {
        let elapsed = started.elapsed().as_millis() as u64;
        self.with_metadata("duration_ms", Value::from(elapsed))
    }

    /// Serialize the envelope; success goes through the normal result channel,
    /// failures through the protocol error channel so the reply is flagged.
    pub fn into_tool_result(self) -> Result<String, String> {
        let json = serde_json::to_string(&self)
            .unwrap_or_else(|e| format!(r#"{{"success":false,"message":"serialization failed: {e}"}}"#));
        if self.success {
            Ok(json)
        } else {
            Err(json)
        }
    }
}

/// Classify an internal error into the user-visible taxonomy.
///
/// Transport errors from the HTTP layer map to connection/timeout/server kinds;
/// anything else that escapes an operation after retries is an execution error.
pub fn classify_error(err: &anyhow::Error) -> ErrorType {
    for cause in err.chain() {
        if let Some(req_err) = cause.downcast_ref::<reqwest::Error>() {
            if req_err.is_timeout() {
                return ErrorType::TimeoutError;
            }
            if req_err.is_connect() {
                return ErrorType::ConnectionError;
            }
            if let Some(status) = req_err.status() {
                return status_error_type(status.as_u16());
            }
            return ErrorType::ConnectionError;
        }
    }
    ErrorType::ExecutionError
}

/// Map an HTTP status code to an error kind.
pub fn status_error_type(status: u16) -> ErrorType {
    match status {
        401 | 403 => ErrorType::AuthenticationError,
        404 => ErrorType::NotFoundError,
        400..=499 => ErrorType::ClientError,
        500..=599 => ErrorType::ServerError,
        _ => ErrorType::UnknownError,
    }
}

/// Failure envelope from an internal error, classified by [`classify_error`].
pub fn failure(message: impl Into<String>, err: &anyhow::Error) -> ToolResponse {
    ToolResponse::error(
        message,
        Some(classify_error(err)),
        Some(format!("{err:#}")),
    )
}
