//! In-memory management api for service tests.
//!
//! Every call is appended to `calls` as a short string, so tests can assert on
//! order. Created records get ids `new-1`, `new-2`, ... in creation order.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use kbm::{
    PACKAGE_VERSION,
    api::ManagementApi,
    snapshot::{PackageMetadata, Snapshot, SnapshotData},
};
use kontent::prelude::*;
use parking_lot::Mutex;
use serde_json::{Value, json};

pub const TARGET_ENV: &str = "target-env";

#[derive(Default)]
pub struct FakeState {
    pub calls: Vec<String>,
    pub records: HashMap<Collection, Vec<Value>>,
    pub folders: Vec<Value>,
    pub variants: Vec<Value>,
    pub validation: Value,
    pub downloads: HashMap<String, Bytes>,
    /// (file name, byte count) per upload
    pub uploads: Vec<(String, usize)>,
    pub workflow_updates: Vec<(String, Value)>,
    pub language_updates: Vec<(String, Vec<LanguageOperation>)>,
    /// Codenames, file names or ids whose create, upsert or delete is rejected
    pub reject: HashSet<String>,
    /// Returned by `add_asset_folders` in place of the created tree
    pub folder_response: Option<Vec<Value>>,
    next_id: usize,
}

#[derive(Default)]
pub struct FakeApi {
    pub state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds existing records of a collection.
    pub fn with_records(self, collection: Collection, records: Vec<Value>) -> Self {
        self.state.lock().records.insert(collection, records);
        self
    }

    pub fn reject(&self, key: &str) {
        self.state.lock().reject.insert(key.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Calls starting with `prefix`, in order.
    pub fn calls_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    pub fn created(&self, collection: Collection) -> Vec<Value> {
        self.state
            .lock()
            .records
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn variants(&self) -> Vec<Value> {
        self.state.lock().variants.clone()
    }
}

impl FakeState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("new-{}", self.next_id)
    }

    fn check(&self, key: &str, method: &str, url: &str) -> kontent::Result<()> {
        if self.reject.contains(key) {
            return Err(rejected(method, url));
        }
        Ok(())
    }
}

pub fn rejected(method: &str, url: &str) -> KontentError {
    KontentError::Api {
        status: 400,
        method: method.to_string(),
        url: url.to_string(),
        message: "The provided request body is invalid.".to_string(),
        error_code: Some(5),
        request_id: Some("req-1".to_string()),
        validation_errors: vec![ValidationError {
            message: "codename is already in use".to_string(),
            path: Some("codename".to_string()),
        }],
    }
}

fn record_key(record: &Value) -> String {
    ["codename", "file_name", "title", "name"]
        .iter()
        .filter_map(|key| record.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn assign_folder_ids(state: &mut FakeState, folders: &mut [Value]) {
    for folder in folders {
        let id = state.next_id();
        folder["id"] = json!(id);
        if let Some(children) = folder.get_mut("folders").and_then(Value::as_array_mut) {
            assign_folder_ids(state, children);
        }
    }
}

impl ManagementApi for FakeApi {
    async fn environment_info(&self) -> kontent::Result<EnvironmentInfo> {
        self.state.lock().calls.push("environment".into());
        Ok(EnvironmentInfo {
            id: TARGET_ENV.into(),
            name: "Target".into(),
            environment: "Production".into(),
        })
    }

    async fn validate_environment(&self) -> kontent::Result<Value> {
        let mut state = self.state.lock();
        state.calls.push("validate".into());
        Ok(state.validation.clone())
    }

    async fn list(&self, collection: Collection) -> kontent::Result<Vec<Value>> {
        let mut state = self.state.lock();
        state.calls.push(format!("list {collection}"));
        Ok(state.records.get(&collection).cloned().unwrap_or_default())
    }

    async fn create(&self, collection: Collection, mut payload: Value) -> kontent::Result<Value> {
        let mut state = self.state.lock();
        let key = record_key(&payload);
        state.calls.push(format!("create {collection} {key}"));
        state.check(&key, "POST", collection.path())?;
        payload["id"] = json!(state.next_id());
        state
            .records
            .entry(collection)
            .or_default()
            .push(payload.clone());
        Ok(payload)
    }

    async fn delete(&self, collection: Collection, id: &str) -> kontent::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("delete {collection} {id}"));
        state.check(id, "DELETE", collection.path())?;
        if let Some(records) = state.records.get_mut(&collection) {
            records.retain(|record| record.get("id").and_then(Value::as_str) != Some(id));
        }
        Ok(())
    }

    async fn list_variants(&self, item_id: &str) -> kontent::Result<Vec<Value>> {
        let mut state = self.state.lock();
        state.calls.push(format!("list_variants {item_id}"));
        Ok(state
            .variants
            .iter()
            .filter(|variant| variant["item"]["id"] == json!(item_id))
            .cloned()
            .collect())
    }

    async fn upsert_variant(
        &self,
        item_codename: &str,
        language_codename: &str,
        payload: &Value,
    ) -> kontent::Result<Value> {
        let mut state = self.state.lock();
        let key = format!("{item_codename}/{language_codename}");
        state.calls.push(format!("upsert {key}"));
        state.check(&key, "PUT", "variants")?;
        let item_id = state
            .records
            .get(&Collection::ContentItems)
            .and_then(|items| {
                items
                    .iter()
                    .find(|item| item["codename"] == json!(item_codename))
            })
            .and_then(|item| item.get("id").cloned())
            .unwrap_or(Value::Null);
        let mut variant = payload.clone();
        variant["item"] = json!({"id": item_id, "codename": item_codename});
        variant["language"] = json!({"codename": language_codename});
        state.variants.push(variant.clone());
        Ok(variant)
    }

    async fn publish_variant(&self, item_codename: &str, language_codename: &str) -> kontent::Result<()> {
        let mut state = self.state.lock();
        let key = format!("{item_codename}/{language_codename}");
        state.calls.push(format!("publish {key}"));
        state.check(&format!("publish {key}"), "PUT", "publish")
    }

    async fn change_variant_workflow(
        &self,
        item_codename: &str,
        language_codename: &str,
        workflow_codename: &str,
        step_codename: &str,
    ) -> kontent::Result<()> {
        self.state.lock().calls.push(format!(
            "change_workflow {item_codename}/{language_codename} {workflow_codename} {step_codename}"
        ));
        Ok(())
    }

    async fn change_variant_step(
        &self,
        item_codename: &str,
        language_codename: &str,
        step_id: &str,
    ) -> kontent::Result<()> {
        self.state.lock().calls.push(format!(
            "change_step {item_codename}/{language_codename} {step_id}"
        ));
        Ok(())
    }

    async fn update_language(
        &self,
        codename: &str,
        operations: Vec<LanguageOperation>,
    ) -> kontent::Result<Value> {
        let mut state = self.state.lock();
        state.calls.push(format!("update_language {codename}"));
        let languages = state.records.entry(Collection::Languages).or_default();
        let mut updated = Value::Null;
        if let Some(language) = languages
            .iter_mut()
            .find(|language| language["codename"] == json!(codename))
        {
            for operation in &operations {
                language[operation.property_name] = operation.value.clone();
            }
            updated = language.clone();
        }
        state.language_updates.push((codename.to_string(), operations));
        Ok(updated)
    }

    async fn list_asset_folders(&self) -> kontent::Result<Vec<Value>> {
        let mut state = self.state.lock();
        state.calls.push("list folders".into());
        Ok(state.folders.clone())
    }

    async fn add_asset_folders(&self, mut folders: Vec<Value>) -> kontent::Result<Vec<Value>> {
        let mut state = self.state.lock();
        state.calls.push(format!("add_folders {}", folders.len()));
        state.check("add_folders", "PATCH", "folders")?;
        if let Some(response) = state.folder_response.clone() {
            return Ok(response);
        }
        assign_folder_ids(&mut state, &mut folders);
        state.folders.extend(folders.iter().cloned());
        Ok(folders)
    }

    async fn remove_asset_folders(&self, ids: &[String]) -> kontent::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("remove_folders {}", ids.join(",")));
        state
            .folders
            .retain(|folder| !ids.iter().any(|id| folder["id"] == json!(id)));
        Ok(())
    }

    async fn upload_file(
        &self,
        file_name: &str,
        _content_type: &str,
        data: Bytes,
    ) -> kontent::Result<FileReference> {
        let mut state = self.state.lock();
        state.calls.push(format!("upload {file_name}"));
        state.uploads.push((file_name.to_string(), data.len()));
        let id = state.next_id();
        Ok(FileReference {
            id,
            kind: "internal".into(),
        })
    }

    async fn download(&self, url: &str) -> kontent::Result<Bytes> {
        let mut state = self.state.lock();
        state.calls.push(format!("download {url}"));
        state
            .downloads
            .get(url)
            .cloned()
            .ok_or_else(|| KontentError::NotFound {
                obj_type: "file".into(),
                key: url.into(),
            })
    }

    async fn update_workflow(&self, codename: &str, mut payload: Value) -> kontent::Result<Value> {
        let mut state = self.state.lock();
        state.calls.push(format!("update_workflow {codename}"));
        state
            .workflow_updates
            .push((codename.to_string(), payload.clone()));
        payload["id"] = json!(DEFAULT_OBJECT_ID);
        Ok(payload)
    }
}

/// Snapshot wrapper with current-version metadata.
pub fn snapshot(data: SnapshotData) -> Snapshot {
    Snapshot {
        metadata: PackageMetadata {
            version: PACKAGE_VERSION.to_string(),
            environment_id: "source-env".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 12, 10, 11, 22).unwrap(),
            is_inconsistent_export: false,
            data_overview: data.data_overview(),
        },
        validation: Value::Null,
        data,
    }
}

/// Default workflow with draft, review, published and archived steps.
pub fn default_workflow() -> Value {
    json!({
        "id": DEFAULT_OBJECT_ID,
        "name": "Default",
        "codename": "default",
        "steps": [
            {
                "id": "step-draft", "name": "Draft", "codename": "draft", "role_ids": ["r1"],
                "transitions_to": [{"step": {"id": "step-review"}}]
            },
            {
                "id": "step-review", "name": "Review", "codename": "review", "role_ids": [],
                "transitions_to": [{"step": {"id": "step-draft"}}]
            }
        ],
        "published_step": {
            "id": "step-published", "name": "Published", "codename": "published",
            "create_new_version_role_ids": ["r1"], "unpublish_role_ids": ["r2"]
        },
        "archived_step": {
            "id": "step-archived", "name": "Archived", "codename": "archived", "role_ids": ["r1"]
        },
        "scopes": []
    })
}

/// English default language, as exported.
pub fn default_language() -> Value {
    json!({
        "id": DEFAULT_OBJECT_ID,
        "name": "English",
        "codename": "en",
        "is_active": true,
        "is_default": true,
        "fallback_language": {"id": DEFAULT_OBJECT_ID}
    })
}
