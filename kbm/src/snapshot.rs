//! # Snapshot
//!
//! The exported representation of one environment: raw json records per kind,
//! package metadata, and the server's validation report. Records are kept as
//! `serde_json::Value` so every field the server returns survives a round trip.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

/// Kinds of exported and imported entities.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Taxonomy,
    ContentTypeSnippet,
    ContentType,
    ContentItem,
    LanguageVariant,
    Language,
    Asset,
    AssetFolder,
    Collection,
    Webhook,
    Workflow,
    BinaryFile,
}

/// What happened to an entity: it was created (or exported, or deleted) as an
/// item of some kind, or a variant was moved through its workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Item(ItemKind),
    Publish,
    Archive,
    ChangeWorkflowStep,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(kind) => fmt::Display::fmt(kind, f),
            Self::Publish => f.write_str("publish"),
            Self::Archive => f.write_str("archive"),
            Self::ChangeWorkflowStep => f.write_str("changeWorkflowStep"),
        }
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<ItemKind> for ActionKind {
    fn from(kind: ItemKind) -> Self {
        Self::Item(kind)
    }
}

/// Record sequences of one environment, in export order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    #[serde(default)]
    pub taxonomies: Vec<Value>,
    #[serde(default)]
    pub content_type_snippets: Vec<Value>,
    #[serde(default)]
    pub content_types: Vec<Value>,
    #[serde(default)]
    pub content_items: Vec<Value>,
    #[serde(default)]
    pub language_variants: Vec<Value>,
    #[serde(default)]
    pub languages: Vec<Value>,
    #[serde(default)]
    pub assets: Vec<Value>,
    #[serde(default)]
    pub asset_folders: Vec<Value>,
    #[serde(default)]
    pub workflows: Vec<Value>,
    #[serde(default)]
    pub webhooks: Vec<Value>,
    #[serde(default)]
    pub collections: Vec<Value>,
}

impl SnapshotData {
    /// Records of one kind. Kinds that are not stored as records return an empty slice.
    pub fn records(&self, kind: ItemKind) -> &[Value] {
        match kind {
            ItemKind::Taxonomy => &self.taxonomies,
            ItemKind::ContentTypeSnippet => &self.content_type_snippets,
            ItemKind::ContentType => &self.content_types,
            ItemKind::ContentItem => &self.content_items,
            ItemKind::LanguageVariant => &self.language_variants,
            ItemKind::Language => &self.languages,
            ItemKind::Asset => &self.assets,
            ItemKind::AssetFolder => &self.asset_folders,
            ItemKind::Collection => &self.collections,
            ItemKind::Webhook => &self.webhooks,
            ItemKind::Workflow => &self.workflows,
            ItemKind::BinaryFile => &[],
        }
    }

    /// Mutable access to the records of one kind.
    pub fn records_mut(&mut self, kind: ItemKind) -> Option<&mut Vec<Value>> {
        match kind {
            ItemKind::Taxonomy => Some(&mut self.taxonomies),
            ItemKind::ContentTypeSnippet => Some(&mut self.content_type_snippets),
            ItemKind::ContentType => Some(&mut self.content_types),
            ItemKind::ContentItem => Some(&mut self.content_items),
            ItemKind::LanguageVariant => Some(&mut self.language_variants),
            ItemKind::Language => Some(&mut self.languages),
            ItemKind::Asset => Some(&mut self.assets),
            ItemKind::AssetFolder => Some(&mut self.asset_folders),
            ItemKind::Collection => Some(&mut self.collections),
            ItemKind::Webhook => Some(&mut self.webhooks),
            ItemKind::Workflow => Some(&mut self.workflows),
            ItemKind::BinaryFile => None,
        }
    }

    pub fn data_overview(&self) -> DataOverview {
        DataOverview {
            taxonomies_count: self.taxonomies.len(),
            content_type_snippets_count: self.content_type_snippets.len(),
            content_types_count: self.content_types.len(),
            content_items_count: self.content_items.len(),
            language_variants_count: self.language_variants.len(),
            languages_count: self.languages.len(),
            assets_count: self.assets.len(),
            asset_folders_count: self.asset_folders.len(),
            workflows_count: self.workflows.len(),
            webhooks_count: self.webhooks.len(),
            collections_count: self.collections.len(),
        }
    }
}

/// Record counts per kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataOverview {
    pub taxonomies_count: usize,
    pub content_type_snippets_count: usize,
    pub content_types_count: usize,
    pub content_items_count: usize,
    pub language_variants_count: usize,
    pub languages_count: usize,
    pub assets_count: usize,
    pub asset_folders_count: usize,
    pub workflows_count: usize,
    pub webhooks_count: usize,
    pub collections_count: usize,
}

/// Archive metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    /// Version of the tool that wrote the archive
    pub version: String,
    /// Source environment id. Older archives call it `projectId`.
    #[serde(alias = "projectId")]
    pub environment_id: String,
    pub timestamp: DateTime<Utc>,
    /// True if the source environment reported type or variant issues
    #[serde(default)]
    pub is_inconsistent_export: bool,
    #[serde(default)]
    pub data_overview: DataOverview,
}

/// Complete export of one environment, without binary files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: PackageMetadata,
    /// Raw validation report, `null` when validation was skipped
    #[serde(default)]
    pub validation: Value,
    pub data: SnapshotData,
}

/// Binary content of one asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryFile {
    pub asset_id: String,
    pub file_name: String,
    pub data: Bytes,
}

/// String field of a record, or "" when absent.
pub(crate) fn str_field<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// `record[outer][inner]` as a string, or "" when absent.
pub(crate) fn nested_str<'a>(record: &'a Value, outer: &str, inner: &str) -> &'a str {
    record
        .get(outer)
        .and_then(|v| v.get(inner))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    #[test]
    fn item_kind_names_are_camel_case() {
        assert_eq!(ItemKind::ContentTypeSnippet.to_string(), "contentTypeSnippet");
        assert_eq!(ItemKind::from_str("binaryFile").unwrap(), ItemKind::BinaryFile);
        assert_eq!(
            serde_json::to_value(ActionKind::ChangeWorkflowStep).unwrap(),
            json!("changeWorkflowStep")
        );
        assert_eq!(
            serde_json::to_value(ActionKind::Item(ItemKind::LanguageVariant)).unwrap(),
            json!("languageVariant")
        );
    }

    #[test]
    fn metadata_accepts_project_id_alias() {
        let metadata: PackageMetadata = serde_json::from_value(json!({
            "version": "1.0.0",
            "projectId": "p1",
            "timestamp": "2024-05-01T10:00:00Z",
            "isInconsistentExport": true
        }))
        .unwrap();
        assert_eq!(metadata.environment_id, "p1");
        assert!(metadata.is_inconsistent_export);
        assert_eq!(metadata.data_overview, DataOverview::default());
    }

    #[test]
    fn overview_counts_records() {
        let data = SnapshotData {
            taxonomies: vec![json!({}), json!({})],
            assets: vec![json!({})],
            ..Default::default()
        };
        let overview = data.data_overview();
        assert_eq!(overview.taxonomies_count, 2);
        assert_eq!(overview.assets_count, 1);
        assert_eq!(overview.workflows_count, 0);
        assert!(data.records(ItemKind::BinaryFile).is_empty());
    }
}
