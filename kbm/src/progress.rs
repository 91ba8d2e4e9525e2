//! Run reporting shared by export, import and clean: the per-entity progress
//! notification, the error policy, and recorded failures.

use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::{error::BackupError, snapshot::ActionKind};

/// One successfully processed entity.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessedItem {
    pub title: String,
    pub kind: ActionKind,
    /// Raw record as returned by the server (or read from the source)
    pub data: Value,
}

/// Progress callback. Called once per processed entity; never used for control flow.
pub type Observer<'a> = Box<dyn Fn(&ProcessedItem) + Send + Sync + 'a>;

/// What to do when one entity fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Record the failure and continue with the next entity.
    #[default]
    Continue,
    /// Stop at the first failure. Entities already created are left in place.
    FailFast,
}

/// An entity that could not be processed.
#[derive(Clone, Debug, Serialize)]
pub struct Failure {
    pub kind: ActionKind,
    pub title: String,
    pub message: String,
    /// Server error code, for rejected api requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    /// Per-field validation messages, for rejected api requests
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

impl Failure {
    pub fn new(kind: ActionKind, title: impl Into<String>, err: &BackupError) -> Self {
        let (error_code, validation_errors) = err.api_error().map_or_else(
            || (None, Vec::new()),
            |api| {
                (
                    api.error_code(),
                    api.validation_errors()
                        .iter()
                        .map(|v| match &v.path {
                            Some(path) => format!("{path}: {}", v.message),
                            None => v.message.clone(),
                        })
                        .collect(),
                )
            },
        );
        Self {
            kind,
            title: title.into(),
            message: err.to_string(),
            error_code,
            validation_errors,
        }
    }
}

/// Applies `policy` to a failed entity: logs it, then either records it in
/// `failures` or hands the error back to stop the run.
pub(crate) fn handle_failure(
    policy: ErrorPolicy,
    failures: &mut Vec<Failure>,
    kind: ActionKind,
    title: &str,
    err: BackupError,
) -> Result<(), BackupError> {
    let failure = Failure::new(kind, title, &err);
    error!(%kind, title, error = %failure.message, "failed");
    for message in &failure.validation_errors {
        error!(%kind, title, "  {message}");
    }
    match policy {
        ErrorPolicy::Continue => {
            failures.push(failure);
            Ok(())
        }
        ErrorPolicy::FailFast => Err(err),
    }
}

/// Calls the observer, if there is one.
pub(crate) fn notify(observer: Option<&Observer<'_>>, title: String, kind: ActionKind, data: Value) {
    if let Some(observer) = observer {
        observer(&ProcessedItem { title, kind, data });
    }
}
