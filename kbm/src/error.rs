//! Errors returned by the backup, restore and clean services
//!
use kontent::prelude::KontentError;
use snafu::prelude::*;

/// Result type alias using `BackupError` as the default error.
pub type Result<T, E = BackupError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BackupError {
    /// The management api rejected or failed a request.
    #[snafu(display("{action}: {source}"))]
    Api {
        action: String,
        source: KontentError,
    },

    /// A record is missing something it needs after translation, e.g. a content
    /// item without a type codename.
    #[snafu(display("{message}"))]
    Precondition { message: String },

    #[snafu(display("archive: {message}"))]
    Archive { message: String },

    #[snafu(display("json {context}: {source}"))]
    Json {
        context: String,
        source: serde_json::Error,
    },

    #[snafu(display("io {path}: {source}"))]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl BackupError {
    /// Structured api error details, if this is a rejected api request.
    pub fn api_error(&self) -> Option<&KontentError> {
        match self {
            Self::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Shorthand for a precondition error.
pub(crate) fn precondition(message: impl Into<String>) -> BackupError {
    BackupError::Precondition {
        message: message.into(),
    }
}
