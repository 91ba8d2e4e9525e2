//! # Workflows
//!
//! Workflows are listed, created and deleted through
//! [entities](KontentClient::entities) with `Collection::Workflows`. The
//! default workflow exists in every environment and can only be updated.
//!
//! - [update_workflow](KontentClient::update_workflow) - replace a workflow by codename
//!

use std::sync::Arc;

use serde_json::Value;

use crate::{Result, client::KontentClient, http_client::HttpClient, prelude::*};

/// Request builder for replacing a workflow definition.
#[derive(Debug)]
pub struct UpdateWorkflowRequest {
    client: Arc<HttpClient>,
    codename: String,
    payload: Value,
}

impl UpdateWorkflowRequest {
    /// Replaces the workflow and returns the stored definition.
    pub async fn update(self) -> Result<Value> {
        if self.codename.is_empty() {
            return Err(KontentError::Validation {
                message: "update_workflow: codename is required".into(),
            });
        }
        self.client
            .put_request(&format!("/workflows/codename/{}", self.codename), &self.payload)
            .await
    }
}

impl KontentClient {
    /// Replaces the workflow identified by `codename`.
    pub fn update_workflow(&self, codename: impl Into<String>, payload: Value) -> UpdateWorkflowRequest {
        UpdateWorkflowRequest {
            client: self.client.clone(),
            codename: codename.into(),
            payload,
        }
    }
}
