//! # Clean
//!
//! Deletes the content and content model of an environment: content items,
//! content types, snippets, taxonomies, assets, asset folders, and every
//! workflow except the default one. Languages and collections are left alone;
//! they can't be deleted.

use chrono::{DateTime, Utc};
use kontent::prelude::*;
use serde::Serialize;
use serde_json::Value;
use snafu::ResultExt;
use tracing::info;

use crate::{
    api::ManagementApi,
    error::{ApiSnafu, BackupError, Result},
    progress::{ErrorPolicy, Failure, Observer, ProcessedItem, handle_failure, notify},
    snapshot::{ItemKind, str_field},
};

#[derive(Clone, Debug, Default)]
pub struct CleanConfig {
    pub error_policy: ErrorPolicy,
}

impl CleanConfig {
    #[must_use]
    pub fn error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }
}

#[derive(Debug, Serialize)]
pub struct CleanResult {
    pub environment_id: String,
    pub timestamp: DateTime<Utc>,
    pub deleted: usize,
    pub failures: Vec<Failure>,
}

/// Deletion order: items before the types they use, types before the snippets
/// and taxonomies they reference.
const CLEAN_ORDER: [(ItemKind, Collection); 4] = [
    (ItemKind::ContentItem, Collection::ContentItems),
    (ItemKind::ContentType, Collection::ContentTypes),
    (ItemKind::ContentTypeSnippet, Collection::ContentTypeSnippets),
    (ItemKind::Taxonomy, Collection::Taxonomies),
];

pub struct CleanService<'a, A> {
    api: &'a A,
    config: CleanConfig,
    on_processed: Option<Observer<'a>>,
}

impl<'a, A: ManagementApi> CleanService<'a, A> {
    pub fn new(api: &'a A, config: CleanConfig) -> Self {
        Self {
            api,
            config,
            on_processed: None,
        }
    }

    /// Called once per deleted entity.
    #[must_use]
    pub fn on_processed<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ProcessedItem) + Send + Sync + 'a,
    {
        self.on_processed = Some(Box::new(observer));
        self
    }

    pub async fn clean(&self) -> Result<CleanResult> {
        let environment = self.api.environment_info().await.context(ApiSnafu {
            action: "read environment",
        })?;
        info!(%environment, "cleaning");

        let mut failures = Vec::new();
        let mut deleted = 0;

        for (kind, collection) in CLEAN_ORDER {
            deleted += self.delete_all(kind, collection, &mut failures, |_| true).await?;
        }
        deleted += self.delete_all(ItemKind::Asset, Collection::Assets, &mut failures, |_| true).await?;
        deleted += self.delete_asset_folders(&mut failures).await?;
        deleted += self
            .delete_all(ItemKind::Workflow, Collection::Workflows, &mut failures, |workflow| {
                !is_default_workflow(workflow)
            })
            .await?;

        info!(deleted, failed = failures.len(), "clean finished");
        Ok(CleanResult {
            environment_id: environment.id,
            timestamp: Utc::now(),
            deleted,
            failures,
        })
    }

    /// Deletes every record of `collection` accepted by `filter`. Returns the
    /// number deleted.
    async fn delete_all(
        &self,
        kind: ItemKind,
        collection: Collection,
        failures: &mut Vec<Failure>,
        filter: impl Fn(&Value) -> bool,
    ) -> Result<usize> {
        let records = self.api.list(collection).await.context(ApiSnafu {
            action: format!("list {collection}"),
        })?;
        info!(%kind, count = records.len(), "deleting");
        let mut deleted = 0;
        for record in records.into_iter().filter(|r| filter(r)) {
            let title = record_title(&record);
            let id = str_field(&record, "id");
            match self.api.delete(collection, id).await {
                Ok(()) => {
                    deleted += 1;
                    notify(self.on_processed.as_ref(), title, kind.into(), record);
                }
                Err(source) => {
                    let err = BackupError::Api {
                        action: format!("delete {kind} '{title}'"),
                        source,
                    };
                    handle_failure(self.config.error_policy, failures, kind.into(), &title, err)?;
                }
            }
        }
        Ok(deleted)
    }

    /// Removes the top-level folders in one call; their subfolders go with them.
    async fn delete_asset_folders(&self, failures: &mut Vec<Failure>) -> Result<usize> {
        let folders = self.api.list_asset_folders().await.context(ApiSnafu {
            action: "list asset folders",
        })?;
        if folders.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = folders
            .iter()
            .map(|folder| str_field(folder, "id").to_string())
            .collect();
        match self.api.remove_asset_folders(&ids).await {
            Ok(()) => {
                for folder in &folders {
                    notify(
                        self.on_processed.as_ref(),
                        record_title(folder),
                        ItemKind::AssetFolder.into(),
                        folder.clone(),
                    );
                }
                Ok(folders.len())
            }
            Err(source) => {
                let err = BackupError::Api {
                    action: "remove asset folders".into(),
                    source,
                };
                handle_failure(
                    self.config.error_policy,
                    failures,
                    ItemKind::AssetFolder.into(),
                    "asset folders",
                    err,
                )?;
                Ok(0)
            }
        }
    }
}

/// The default workflow can't be deleted.
fn is_default_workflow(workflow: &Value) -> bool {
    str_field(workflow, "codename").eq_ignore_ascii_case(DEFAULT_WORKFLOW_CODENAME)
        || str_field(workflow, "id").eq_ignore_ascii_case(DEFAULT_OBJECT_ID)
}

fn record_title(record: &Value) -> String {
    ["name", "file_name", "codename", "id"]
        .iter()
        .map(|key| str_field(record, key))
        .find(|value| !value.is_empty())
        .unwrap_or("-")
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_workflow_is_kept() {
        assert!(is_default_workflow(&json!({"codename": "Default", "id": "x"})));
        assert!(is_default_workflow(&json!({"codename": "other", "id": DEFAULT_OBJECT_ID})));
        assert!(!is_default_workflow(&json!({"codename": "review", "id": "w1"})));
    }
}
