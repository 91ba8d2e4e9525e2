//! # Collaborator seams
//!
//! The services in this crate talk to an environment through [`ManagementApi`]
//! and read asset binaries through [`BinaryProvider`]. [`KontentClient`] is the
//! production implementation of the former; the archive reader and
//! [`MemoryBinaries`] implement the latter.

use std::collections::HashMap;

use bytes::Bytes;
use kontent::prelude::*;
use serde_json::Value;

use crate::error::{BackupError, precondition};

/// Environment operations used by export, import and clean.
#[allow(async_fn_in_trait)]
pub trait ManagementApi {
    async fn environment_info(&self) -> kontent::Result<EnvironmentInfo>;

    /// Raw validation report of the environment.
    async fn validate_environment(&self) -> kontent::Result<Value>;

    /// Every record of a collection, all pages.
    async fn list(&self, collection: Collection) -> kontent::Result<Vec<Value>>;

    /// Creates a record and returns it as stored by the server.
    async fn create(&self, collection: Collection, payload: Value) -> kontent::Result<Value>;

    async fn delete(&self, collection: Collection, id: &str) -> kontent::Result<()>;

    async fn list_variants(&self, item_id: &str) -> kontent::Result<Vec<Value>>;

    async fn upsert_variant(
        &self,
        item_codename: &str,
        language_codename: &str,
        payload: &Value,
    ) -> kontent::Result<Value>;

    async fn publish_variant(&self, item_codename: &str, language_codename: &str) -> kontent::Result<()>;

    async fn change_variant_workflow(
        &self,
        item_codename: &str,
        language_codename: &str,
        workflow_codename: &str,
        step_codename: &str,
    ) -> kontent::Result<()>;

    async fn change_variant_step(
        &self,
        item_codename: &str,
        language_codename: &str,
        step_id: &str,
    ) -> kontent::Result<()>;

    async fn update_language(
        &self,
        codename: &str,
        operations: Vec<LanguageOperation>,
    ) -> kontent::Result<Value>;

    async fn list_asset_folders(&self) -> kontent::Result<Vec<Value>>;

    /// Creates a folder tree in one call and returns the created tree.
    async fn add_asset_folders(&self, folders: Vec<Value>) -> kontent::Result<Vec<Value>>;

    async fn remove_asset_folders(&self, ids: &[String]) -> kontent::Result<()>;

    async fn upload_file(
        &self,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> kontent::Result<FileReference>;

    /// Fetches an asset binary by absolute url.
    async fn download(&self, url: &str) -> kontent::Result<Bytes>;

    async fn update_workflow(&self, codename: &str, payload: Value) -> kontent::Result<Value>;
}

impl ManagementApi for KontentClient {
    async fn environment_info(&self) -> kontent::Result<EnvironmentInfo> {
        self.environment().get().await
    }

    async fn validate_environment(&self) -> kontent::Result<Value> {
        self.environment().validate().await
    }

    async fn list(&self, collection: Collection) -> kontent::Result<Vec<Value>> {
        self.entities(collection).list().await?.collect_all().await
    }

    async fn create(&self, collection: Collection, payload: Value) -> kontent::Result<Value> {
        self.new_entity(collection, payload).create().await
    }

    async fn delete(&self, collection: Collection, id: &str) -> kontent::Result<()> {
        self.entity(collection, id).delete().await
    }

    async fn list_variants(&self, item_id: &str) -> kontent::Result<Vec<Value>> {
        self.variants(item_id).list().await
    }

    async fn upsert_variant(
        &self,
        item_codename: &str,
        language_codename: &str,
        payload: &Value,
    ) -> kontent::Result<Value> {
        self.variant(item_codename, language_codename)
            .upsert(payload)
            .await
    }

    async fn publish_variant(&self, item_codename: &str, language_codename: &str) -> kontent::Result<()> {
        self.variant(item_codename, language_codename).publish().await
    }

    async fn change_variant_workflow(
        &self,
        item_codename: &str,
        language_codename: &str,
        workflow_codename: &str,
        step_codename: &str,
    ) -> kontent::Result<()> {
        self.variant(item_codename, language_codename)
            .change_workflow(workflow_codename, step_codename)
            .await
    }

    async fn change_variant_step(
        &self,
        item_codename: &str,
        language_codename: &str,
        step_id: &str,
    ) -> kontent::Result<()> {
        self.variant(item_codename, language_codename)
            .change_step(step_id)
            .await
    }

    async fn update_language(
        &self,
        codename: &str,
        operations: Vec<LanguageOperation>,
    ) -> kontent::Result<Value> {
        operations
            .into_iter()
            .fold(KontentClient::update_language(self, codename), |req, op| {
                req.operation(op)
            })
            .update()
            .await
    }

    async fn list_asset_folders(&self) -> kontent::Result<Vec<Value>> {
        self.asset_folders().list().await
    }

    async fn add_asset_folders(&self, folders: Vec<Value>) -> kontent::Result<Vec<Value>> {
        self.asset_folders().add(folders).await
    }

    async fn remove_asset_folders(&self, ids: &[String]) -> kontent::Result<()> {
        self.asset_folders().remove(ids).await
    }

    async fn upload_file(
        &self,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> kontent::Result<FileReference> {
        self.new_file(file_name, content_type, data).upload().await
    }

    async fn download(&self, url: &str) -> kontent::Result<Bytes> {
        KontentClient::download(self, url).await
    }

    async fn update_workflow(&self, codename: &str, payload: Value) -> kontent::Result<Value> {
        KontentClient::update_workflow(self, codename, payload)
            .update()
            .await
    }
}

/// Source of asset binaries during import, keyed by the asset's original id.
pub trait BinaryProvider {
    fn load(&self, asset_id: &str, file_name: &str) -> Result<Bytes, BackupError>;
}

/// Binaries held in memory, e.g. straight from an export.
#[derive(Clone, Debug, Default)]
pub struct MemoryBinaries {
    files: HashMap<String, Bytes>,
}

impl MemoryBinaries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset_id: impl Into<String>, data: impl Into<Bytes>) {
        self.files.insert(asset_id.into(), data.into());
    }
}

impl FromIterator<crate::snapshot::BinaryFile> for MemoryBinaries {
    fn from_iter<I: IntoIterator<Item = crate::snapshot::BinaryFile>>(iter: I) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|file| (file.asset_id, file.data))
                .collect(),
        }
    }
}

impl BinaryProvider for MemoryBinaries {
    fn load(&self, asset_id: &str, file_name: &str) -> Result<Bytes, BackupError> {
        self.files
            .get(asset_id)
            .cloned()
            .ok_or_else(|| precondition(format!("binary file for asset {asset_id} ({file_name}) not found")))
    }
}
