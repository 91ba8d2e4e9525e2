//! # Languages
//!
//! Languages are listed and created through [entities](KontentClient::entities)
//! with `Collection::Languages`. They can't be deleted; an existing language is
//! modified with patch operations.
//!
//! ```rust,no_run
//! use kontent::prelude::*;
//! # async fn example(client: &KontentClient) -> Result<(), KontentError> {
//! client.update_language("default").rename_codename("en-US").activate().update().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::{Result, client::KontentClient, http_client::HttpClient, prelude::*};

/// One patch operation on a language.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LanguageOperation {
    pub op: &'static str,
    pub property_name: &'static str,
    pub value: Value,
}

impl LanguageOperation {
    /// Marks the language active.
    pub fn activate() -> Self {
        Self {
            op: "replace",
            property_name: "is_active",
            value: json!(true),
        }
    }

    /// Changes the language codename.
    pub fn rename_codename(codename: &str) -> Self {
        Self {
            op: "replace",
            property_name: "codename",
            value: json!(codename),
        }
    }
}

/// Request builder for modifying a language.
#[derive(Debug)]
pub struct UpdateLanguageRequest {
    client: Arc<HttpClient>,
    codename: String,
    operations: Vec<LanguageOperation>,
}

impl UpdateLanguageRequest {
    /// Activates the language.
    #[must_use]
    pub fn activate(mut self) -> Self {
        self.operations.push(LanguageOperation::activate());
        self
    }

    /// Renames the language codename.
    #[must_use]
    pub fn rename_codename(mut self, codename: &str) -> Self {
        self.operations.push(LanguageOperation::rename_codename(codename));
        self
    }

    /// Adds an arbitrary operation.
    #[must_use]
    pub fn operation(mut self, operation: LanguageOperation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Sends the operations and returns the modified language.
    pub async fn update(self) -> Result<Value> {
        if self.codename.is_empty() {
            return Err(KontentError::Validation {
                message: "update_language: codename is required".into(),
            });
        }
        if self.operations.is_empty() {
            return Err(KontentError::Validation {
                message: format!("update_language {}: no operations", self.codename),
            });
        }
        self.client
            .patch_request(
                &format!("/languages/codename/{}", self.codename),
                &self.operations,
            )
            .await
    }
}

impl KontentClient {
    /// Modifies the language identified by `codename`.
    pub fn update_language(&self, codename: impl Into<String>) -> UpdateLanguageRequest {
        UpdateLanguageRequest {
            client: self.client.clone(),
            codename: codename.into(),
            operations: Vec::new(),
        }
    }
}
