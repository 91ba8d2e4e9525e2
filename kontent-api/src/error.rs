//! Errors returned by `KontentClient`
//!
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// One rejected field reported by the management api.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    /// json path of the offending field, when the server reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Error body returned by the management api for rejected requests.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub validation_errors: Vec<ValidationError>,
}

/// Errors returned by kontent crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum KontentError {
    // Http connection or timeout error
    #[snafu(display("HTTP error {method} url:{url}"))]
    Http {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    /// Server rejected the request. For 400, 409 and 422 responses the structured
    /// error body is parsed into `error_code`, `request_id` and `validation_errors`.
    #[snafu(display("Api Server reported error ({status}) {method} {url}: {message}"))]
    Api {
        status: u16,
        method: String,
        url: String,
        message: String,
        error_code: Option<i64>,
        request_id: Option<String>,
        validation_errors: Vec<ValidationError>,
    },

    /// Encountered server error on "retryable" request, but all retry attempts failed.
    #[snafu(display("server api request: failed {n} times"))]
    TooManyRetries { n: u32 },

    /// Deserialization error. This means we didn't deserialize a server response correctly.
    #[snafu(display("Deserialization: {source}"))]
    Deserialization { source: serde_json::Error },

    /// Serialization error. unlikely to occur.
    #[snafu(display("Serialization: {source}"))]
    Serialization { source: serde_json::Error },

    /// Requested resource does not exist (http 404).
    #[snafu(display("{obj_type} {key} not found"))]
    NotFound { obj_type: String, key: String },

    /// Api key is missing, invalid, or expired.
    #[snafu(display("Unauthorized: check the management api key"))]
    Unauthorized,

    /// Api key is valid but lacks permission for the operation
    #[snafu(display("Permission denied: api key does not have permission for this operation"))]
    Forbidden,

    /// Server asked us to wait longer than we are willing to, or kept returning 429.
    #[snafu(display("Rate limit exceeded: \"{header}\" (parsed wait_time: {} secs)", duration.as_secs()))]
    RateLimitExceeded {
        header: String,
        duration: std::time::Duration,
    },

    /// Validation error: a request parameter failed a local check.
    #[snafu(display("Validation error: {message}"))]
    Validation { message: String },

    /// Some other error occurred
    #[snafu(display("{message}"))]
    Other { message: String },
}

impl KontentError {
    /// Returns true if the server rejected the request with a structured error body.
    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Per-field validation messages, empty for non-api errors.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::Api {
                validation_errors, ..
            } => validation_errors,
            _ => &[],
        }
    }

    /// Api error code, if the server supplied one.
    pub fn error_code(&self) -> Option<i64> {
        match self {
            Self::Api { error_code, .. } => *error_code,
            _ => None,
        }
    }

    /// Server request id, useful when reporting problems to support.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Api { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}
