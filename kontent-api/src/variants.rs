//! # Language variants
//!
//! A content item has one variant per language. Variants are addressed by the
//! item and language codenames, so they can be written before the caller knows
//! any server-assigned id.
//!
//! - [variants](KontentClient::variants) - list all variants of an item
//! - [variant](KontentClient::variant) - upsert, publish, or move a variant through its workflow
//!
//! ```rust,no_run
//! use kontent::prelude::*;
//! # async fn example(client: &KontentClient) -> Result<(), KontentError> {
//! let variant = client
//!     .variant("article_1", "en")
//!     .upsert(&serde_json::json!({ "elements": [] }))
//!     .await?;
//! client.variant("article_1", "en").publish().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    Result,
    client::KontentClient,
    http_client::{HttpClient, HttpRequest},
    paged::parse_page,
    prelude::*,
};

/// Request builder for listing the variants of one content item.
#[derive(Debug)]
pub struct VariantsRequest {
    client: Arc<HttpClient>,
    item_id: String,
}

impl VariantsRequest {
    /// Lists every language variant of the item. The endpoint is not paged.
    pub async fn list(self) -> Result<Vec<Value>> {
        if self.item_id.trim().is_empty() {
            return Err(KontentError::Validation {
                message: "variants: item id is required".into(),
            });
        }
        let response: Value = self
            .client
            .send(HttpRequest::new(
                reqwest::Method::GET,
                format!("/items/{}/variants", self.item_id),
            ))
            .await?;
        Ok(parse_page(response, "variants")?.items)
    }
}

/// Request builder for operations on a single variant.
#[derive(Debug)]
pub struct VariantRequest {
    client: Arc<HttpClient>,
    item_codename: String,
    language_codename: String,
}

#[derive(Debug, Serialize)]
struct CodenameRef<'a> {
    codename: &'a str,
}

#[derive(Debug, Serialize)]
struct ChangeWorkflowBody<'a> {
    workflow_identifier: CodenameRef<'a>,
    step_identifier: CodenameRef<'a>,
}

impl VariantRequest {
    fn path(&self) -> Result<String> {
        if self.item_codename.is_empty() || self.language_codename.is_empty() {
            return Err(KontentError::Validation {
                message: format!(
                    "variant: item and language codenames are required (item='{}', language='{}')",
                    self.item_codename, self.language_codename
                ),
            });
        }
        Ok(format!(
            "/items/codename/{}/variants/codename/{}",
            self.item_codename, self.language_codename
        ))
    }

    /// Creates or replaces the variant content.
    pub async fn upsert(self, payload: &Value) -> Result<Value> {
        let path = self.path()?;
        self.client.put_request(&path, payload).await
    }

    /// Publishes the variant immediately.
    pub async fn publish(self) -> Result<()> {
        let path = self.path()?;
        self.client.put_empty(&format!("{path}/publish")).await
    }

    /// Moves the variant into `step_codename` of workflow `workflow_codename`.
    pub async fn change_workflow(self, workflow_codename: &str, step_codename: &str) -> Result<()> {
        let path = self.path()?;
        let body = ChangeWorkflowBody {
            workflow_identifier: CodenameRef {
                codename: workflow_codename,
            },
            step_identifier: CodenameRef {
                codename: step_codename,
            },
        };
        self.client
            .put_request(&format!("{path}/change-workflow"), &body)
            .await
    }

    /// Moves the variant to a step of its current workflow, by step id.
    pub async fn change_step(self, step_id: &str) -> Result<()> {
        let path = self.path()?;
        if step_id.is_empty() {
            return Err(KontentError::Validation {
                message: "change_step: step id is required".into(),
            });
        }
        self.client
            .put_request(&format!("{path}/workflow/{step_id}"), &json!({}))
            .await
    }
}

impl KontentClient {
    /// Lists all variants of a content item.
    pub fn variants(&self, item_id: impl Into<String>) -> VariantsRequest {
        VariantsRequest {
            client: self.client.clone(),
            item_id: item_id.into(),
        }
    }

    /// Operations on the variant of `item_codename` in `language_codename`.
    pub fn variant(
        &self,
        item_codename: impl Into<String>,
        language_codename: impl Into<String>,
    ) -> VariantRequest {
        VariantRequest {
            client: self.client.clone(),
            item_codename: item_codename.into(),
            language_codename: language_codename.into(),
        }
    }
}
