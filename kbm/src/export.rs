//! # Export
//!
//! Reads every selected record kind from an environment into a [`Snapshot`],
//! and downloads asset binaries.

use std::time::Duration;

use chrono::Utc;
use kontent::prelude::*;
use serde_json::Value;
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    PACKAGE_VERSION,
    api::ManagementApi,
    error::{ApiSnafu, Result},
    progress::{Observer, ProcessedItem, notify},
    snapshot::{
        ActionKind, BinaryFile, ItemKind, PackageMetadata, Snapshot, SnapshotData, nested_str,
        str_field,
    },
};

/// Delay between two asset binary downloads.
pub const DEFAULT_DOWNLOAD_DELAY: Duration = Duration::from_millis(150);

/// Export options.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Kinds to export. `None` exports everything.
    pub filter: Option<Vec<ItemKind>>,
    /// Skip the environment validation report.
    pub skip_validation: bool,
    pub download_delay: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filter: None,
            skip_validation: false,
            download_delay: DEFAULT_DOWNLOAD_DELAY,
        }
    }
}

impl ExportConfig {
    #[must_use]
    pub fn filter(mut self, kinds: impl IntoIterator<Item = ItemKind>) -> Self {
        self.filter = Some(kinds.into_iter().collect());
        self
    }

    #[must_use]
    pub fn skip_validation(mut self, skip_validation: bool) -> Self {
        self.skip_validation = skip_validation;
        self
    }

    #[must_use]
    pub fn download_delay(mut self, download_delay: Duration) -> Self {
        self.download_delay = download_delay;
        self
    }

    pub fn includes(&self, kind: ItemKind) -> bool {
        self.filter.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

/// Exported snapshot with the downloaded binaries.
#[derive(Clone, Debug)]
pub struct ExportResult {
    pub snapshot: Snapshot,
    pub binary_files: Vec<BinaryFile>,
}

/// Exports the environment behind `api`.
pub struct ExportService<'a, A> {
    api: &'a A,
    config: ExportConfig,
    on_processed: Option<Observer<'a>>,
}

impl<'a, A: ManagementApi> ExportService<'a, A> {
    pub fn new(api: &'a A, config: ExportConfig) -> Self {
        Self {
            api,
            config,
            on_processed: None,
        }
    }

    /// Called once per exported record and binary file.
    #[must_use]
    pub fn on_processed<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ProcessedItem) + Send + Sync + 'a,
    {
        self.on_processed = Some(Box::new(observer));
        self
    }

    pub async fn export(&self) -> Result<ExportResult> {
        let environment = self.api.environment_info().await.context(ApiSnafu {
            action: "read source environment",
        })?;
        info!(%environment, "exporting");

        let (validation, is_inconsistent_export) = if self.config.skip_validation {
            info!("skipping environment validation");
            (Value::Null, false)
        } else {
            self.validate().await?
        };

        let mut data = SnapshotData::default();
        for (kind, collection) in [
            (ItemKind::ContentType, Collection::ContentTypes),
            (ItemKind::ContentTypeSnippet, Collection::ContentTypeSnippets),
            (ItemKind::Taxonomy, Collection::Taxonomies),
            (ItemKind::Webhook, Collection::Webhooks),
            (ItemKind::Workflow, Collection::Workflows),
            (ItemKind::Collection, Collection::Collections),
            (ItemKind::Asset, Collection::Assets),
            (ItemKind::Language, Collection::Languages),
        ] {
            if self.config.includes(kind)
                && let Some(records) = data.records_mut(kind)
            {
                *records = self.export_collection(kind, collection).await?;
            }
        }

        let wants_items = self.config.includes(ItemKind::ContentItem);
        let wants_variants = self.config.includes(ItemKind::LanguageVariant);
        if wants_items || wants_variants {
            let items = self
                .api
                .list(Collection::ContentItems)
                .await
                .context(ApiSnafu {
                    action: "list content items",
                })?;
            if wants_variants {
                data.language_variants = self.export_variants(&items).await?;
            }
            if wants_items {
                for item in &items {
                    self.notify(record_title(item), ItemKind::ContentItem, item);
                }
                data.content_items = items;
            }
        }

        if self.config.includes(ItemKind::AssetFolder) {
            let folders = self.api.list_asset_folders().await.context(ApiSnafu {
                action: "list asset folders",
            })?;
            for folder in &folders {
                self.notify(record_title(folder), ItemKind::AssetFolder, folder);
            }
            data.asset_folders = folders;
        }

        let binary_files = if self.config.includes(ItemKind::BinaryFile) {
            self.download_binaries(&data.assets).await?
        } else {
            Vec::new()
        };

        let metadata = PackageMetadata {
            version: PACKAGE_VERSION.to_string(),
            environment_id: environment.id.clone(),
            timestamp: Utc::now(),
            is_inconsistent_export,
            data_overview: data.data_overview(),
        };
        info!(overview = ?metadata.data_overview, "export finished");
        Ok(ExportResult {
            snapshot: Snapshot {
                metadata,
                validation,
                data,
            },
            binary_files,
        })
    }

    /// Validation report, and whether it lists any type or variant issue.
    async fn validate(&self) -> Result<(Value, bool)> {
        let report = self.api.validate_environment().await.context(ApiSnafu {
            action: "validate environment",
        })?;
        let count = |key: &str| report.get(key).and_then(Value::as_array).map_or(0, Vec::len);
        let type_issues = count("type_issues");
        let variant_issues = count("variant_issues");
        info!(type_issues, variant_issues, "environment validation");
        Ok((report, type_issues > 0 || variant_issues > 0))
    }

    async fn export_collection(&self, kind: ItemKind, collection: Collection) -> Result<Vec<Value>> {
        let records = self.api.list(collection).await.context(ApiSnafu {
            action: format!("list {collection}"),
        })?;
        debug!(%kind, count = records.len(), "exported");
        for record in &records {
            self.notify(record_title(record), kind, record);
        }
        Ok(records)
    }

    async fn export_variants(&self, items: &[Value]) -> Result<Vec<Value>> {
        let mut variants = Vec::new();
        for item in items {
            let item_id = str_field(item, "id");
            let found = self.api.list_variants(item_id).await.context(ApiSnafu {
                action: format!("list variants of item '{}'", str_field(item, "codename")),
            })?;
            for variant in &found {
                let title = match nested_str(variant, "item", "id") {
                    "" => "-".to_string(),
                    id => id.to_string(),
                };
                self.notify(title, ItemKind::LanguageVariant, variant);
            }
            variants.extend(found);
        }
        Ok(variants)
    }

    async fn download_binaries(&self, assets: &[Value]) -> Result<Vec<BinaryFile>> {
        let mut files = Vec::with_capacity(assets.len());
        for (idx, asset) in assets.iter().enumerate() {
            let url = str_field(asset, "url");
            let file_name = str_field(asset, "file_name");
            if url.is_empty() {
                warn!(file_name, "asset has no url, binary not exported");
                continue;
            }
            if idx > 0 && !self.config.download_delay.is_zero() {
                tokio::time::sleep(self.config.download_delay).await;
            }
            debug!(url, "downloading asset");
            let data = self.api.download(url).await.context(ApiSnafu {
                action: format!("download asset '{file_name}'"),
            })?;
            let file = BinaryFile {
                asset_id: str_field(asset, "id").to_string(),
                file_name: file_name.to_string(),
                data,
            };
            self.notify(
                file.file_name.clone(),
                ItemKind::BinaryFile,
                &serde_json::json!({"asset_id": file.asset_id, "size": file.data.len()}),
            );
            files.push(file);
        }
        Ok(files)
    }

    fn notify(&self, title: String, kind: ItemKind, data: &Value) {
        if self.on_processed.is_some() {
            notify(self.on_processed.as_ref(), title, ActionKind::Item(kind), data.clone());
        }
    }
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
    use super::*;

    #[test]
    fn filter_defaults_to_everything() {
        let config = ExportConfig::default();
        assert!(config.includes(ItemKind::BinaryFile));
        assert_eq!(config.download_delay, Duration::from_millis(150));

        let config = config.filter([ItemKind::ContentType, ItemKind::Taxonomy]);
        assert!(config.includes(ItemKind::Taxonomy));
        assert!(!config.includes(ItemKind::Asset));
    }

    #[test]
    fn record_title_prefers_name() {
        assert_eq!(record_title(&serde_json::json!({"name": "A", "codename": "a"})), "A");
        assert_eq!(record_title(&serde_json::json!({"file_name": "x.png"})), "x.png");
        assert_eq!(record_title(&serde_json::json!({})), "-");
    }
}
