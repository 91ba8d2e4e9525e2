//! # Entity collections
//!
//! Generic list / get / create / delete for the management api collections
//! whose records are addressed by id under the environment root.
//!
//! ## Entity methods on KontentClient
//!
//! - [entities](KontentClient::entities) - list a collection
//! - [entity](KontentClient::entity) - get or delete one record by id
//! - [new_entity](KontentClient::new_entity) - create a record from a json payload
//!
//! ```rust,no_run
//! use kontent::prelude::*;
//! # async fn example(client: &KontentClient) -> Result<(), KontentError> {
//! let items = client.entities(Collection::ContentItems).list().await?.collect_all().await?;
//! for item in &items {
//!     if let Some(id) = item["id"].as_str() {
//!         client.entity(Collection::ContentItems, id).delete().await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use crate::{
    Result,
    client::KontentClient,
    http_client::{GetPaged, HttpClient},
    paged::PagedResult,
    prelude::*,
};

/// Management api collections addressed by record id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    ContentTypes,
    ContentTypeSnippets,
    Taxonomies,
    ContentItems,
    Languages,
    Assets,
    Workflows,
    Webhooks,
    Collections,
}

impl Collection {
    /// Path of the collection under the environment root.
    pub fn path(self) -> &'static str {
        match self {
            Self::ContentTypes => "/types",
            Self::ContentTypeSnippets => "/snippets",
            Self::Taxonomies => "/taxonomies",
            Self::ContentItems => "/items",
            Self::Languages => "/languages",
            Self::Assets => "/assets",
            Self::Workflows => "/workflows",
            Self::Webhooks => "/webhooks",
            Self::Collections => "/collections",
        }
    }

    /// Key of the item array in a list response. Workflows and webhooks are
    /// returned as a bare array, for which the key is unused.
    pub fn items_key(self) -> &'static str {
        match self {
            Self::ContentTypes => "types",
            Self::ContentTypeSnippets => "snippets",
            Self::Taxonomies => "taxonomies",
            Self::ContentItems => "items",
            Self::Languages => "languages",
            Self::Assets => "assets",
            Self::Workflows => "workflows",
            Self::Webhooks => "webhooks",
            Self::Collections => "collections",
        }
    }

    /// Returns true if records can be created through this crate.
    pub fn supports_create(self) -> bool {
        !matches!(self, Self::Webhooks | Self::Collections)
    }

    /// Returns true if records can be deleted by id. Languages can only be deactivated.
    pub fn supports_delete(self) -> bool {
        !matches!(self, Self::Languages | Self::Collections)
    }
}

// ============================================================================
// BUILDER STRUCTS (public)
// ============================================================================

/// Request builder for listing a collection.
#[derive(Debug)]
pub struct EntitiesRequest {
    client: Arc<HttpClient>,
    collection: Collection,
}

impl EntitiesRequest {
    pub(crate) fn new(client: Arc<HttpClient>, collection: Collection) -> Self {
        Self { client, collection }
    }

    /// Fetches the first page. Use `collect_all()` or `into_stream()` for the rest.
    pub async fn list(self) -> Result<PagedResult<Value>> {
        self.client
            .get_request_paged(self.collection.path(), self.collection.items_key())
            .await
    }
}

/// Request builder for getting or deleting a single record.
#[derive(Debug)]
pub struct EntityRequest {
    client: Arc<HttpClient>,
    collection: Collection,
    id: String,
}

impl EntityRequest {
    pub(crate) fn new(client: Arc<HttpClient>, collection: Collection, id: impl Into<String>) -> Self {
        Self {
            client,
            collection,
            id: id.into(),
        }
    }

    fn path(&self) -> Result<String> {
        if self.id.trim().is_empty() {
            return Err(KontentError::Validation {
                message: format!("{}: id is required", self.collection),
            });
        }
        Ok(format!("{}/{}", self.collection.path(), self.id))
    }

    /// Retrieves the record by id.
    pub async fn get(self) -> Result<Value> {
        let path = self.path()?;
        self.client.get_request(&path).await
    }

    /// Deletes the record.
    pub async fn delete(self) -> Result<()> {
        if !self.collection.supports_delete() {
            return Err(KontentError::Validation {
                message: format!("{} cannot be deleted", self.collection),
            });
        }
        let path = self.path()?;
        self.client.delete_request(&path).await
    }
}

/// Request builder for creating a record.
#[derive(Debug)]
pub struct NewEntityRequest {
    client: Arc<HttpClient>,
    collection: Collection,
    payload: Value,
}

impl NewEntityRequest {
    pub(crate) fn new(client: Arc<HttpClient>, collection: Collection, payload: Value) -> Self {
        Self {
            client,
            collection,
            payload,
        }
    }

    /// Creates the record and returns the server's representation of it.
    pub async fn create(self) -> Result<Value> {
        if !self.collection.supports_create() {
            return Err(KontentError::Validation {
                message: format!("{} cannot be created", self.collection),
            });
        }
        if !self.payload.is_object() {
            return Err(KontentError::Validation {
                message: format!("new {}: payload must be a json object", self.collection),
            });
        }
        self.client
            .post_request(self.collection.path(), &self.payload)
            .await
    }
}

impl KontentClient {
    /// Lists the records of a collection.
    pub fn entities(&self, collection: Collection) -> EntitiesRequest {
        EntitiesRequest::new(self.client.clone(), collection)
    }

    /// Gets or deletes one record by id.
    pub fn entity(&self, collection: Collection, id: impl Into<String>) -> EntityRequest {
        EntityRequest::new(self.client.clone(), collection, id)
    }

    /// Creates a record from a json payload.
    pub fn new_entity(&self, collection: Collection, payload: Value) -> NewEntityRequest {
        NewEntityRequest::new(self.client.clone(), collection, payload)
    }
}
