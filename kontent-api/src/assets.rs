//! # Assets, folders and binary files
//!
//! Asset records are listed, created and deleted through
//! [entities](KontentClient::entities) with `Collection::Assets`. Creating an
//! asset takes a file reference, obtained by uploading the binary first.
//!
//! - [new_file](KontentClient::new_file) - upload a binary file
//! - [download](KontentClient::download) - fetch an asset binary by url
//! - [asset_folders](KontentClient::asset_folders) - list, add, or remove folders
//!

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    client::KontentClient,
    http_client::HttpClient,
    paged::parse_page,
    prelude::*,
};

/// Reference to an uploaded binary file.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileReference {
    pub id: String,
    #[serde(rename = "type", default = "internal")]
    pub kind: String,
}

fn internal() -> String {
    "internal".to_string()
}

/// Request builder for uploading a binary file.
#[derive(Debug)]
pub struct NewFileRequest {
    client: Arc<HttpClient>,
    file_name: String,
    content_type: String,
    data: Bytes,
}

impl NewFileRequest {
    /// Uploads the binary and returns its file reference.
    pub async fn upload(self) -> Result<FileReference> {
        if self.file_name.is_empty() {
            return Err(KontentError::Validation {
                message: "new_file: file name is required".into(),
            });
        }
        let content_type = if self.content_type.is_empty() {
            "application/octet-stream"
        } else {
            self.content_type.as_str()
        };
        self.client
            .post_bytes(
                &format!("/files/{}", encode_file_name(&self.file_name)),
                self.data,
                content_type,
            )
            .await
    }
}

/// Percent-encode characters that would change the meaning of the upload path.
fn encode_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '/' => out.push_str("%2F"),
            ' ' => out.push_str("%20"),
            _ => out.push(ch),
        }
    }
    out
}

/// Request builder for asset folder operations.
#[derive(Debug)]
pub struct AssetFoldersRequest {
    client: Arc<HttpClient>,
}

impl AssetFoldersRequest {
    /// Returns the folder tree. Each folder has `id`, `name`, `external_id` and `folders`.
    pub async fn list(self) -> Result<Vec<Value>> {
        let response: Value = self.client.get_request("/folders").await?;
        Ok(parse_page(response, "folders")?.items)
    }

    /// Adds a folder tree in one call and returns the created tree.
    /// Folders are `{name, external_id, folders}`.
    pub async fn add(self, folders: Vec<Value>) -> Result<Vec<Value>> {
        let response: Value = self
            .client
            .post_request("/folders", &json!({ "folders": folders }))
            .await?;
        Ok(parse_page(response, "folders")?.items)
    }

    /// Removes the folders with the given ids in one call.
    pub async fn remove(self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let operations: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "op": "remove", "reference": { "id": id } }))
            .collect();
        let _: Value = self.client.patch_request("/folders", &operations).await?;
        Ok(())
    }
}

impl KontentClient {
    /// Uploads a binary file.
    pub fn new_file(
        &self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> NewFileRequest {
        NewFileRequest {
            client: self.client.clone(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Asset folder operations.
    pub fn asset_folders(&self) -> AssetFoldersRequest {
        AssetFoldersRequest {
            client: self.client.clone(),
        }
    }

    /// Downloads an asset binary from its absolute url. `#` in the url is escaped.
    pub async fn download(&self, url: &str) -> Result<Bytes> {
        self.client.download(&url.replace('#', "%23")).await
    }
}
