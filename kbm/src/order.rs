//! # Import ordering
//!
//! Flattens a translated snapshot into [`ImportableItem`]s in creation order.
//! Kinds follow a fixed order; content type snippets and content types may
//! reference each other, so those two kinds are sorted together so that every
//! item comes after the items whose codenames it references.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use crate::{snapshot::ItemKind, snapshot::SnapshotData, translate::for_each_object};

/// One record to create, tagged by kind.
///
/// Asset folders are not listed: the folder tree is created in one bulk call.
#[derive(Clone, Debug, PartialEq)]
pub enum ImportableItem {
    Language(Value),
    Taxonomy(Value),
    ContentTypeSnippet(Value),
    ContentType(Value),
    Workflow(Value),
    Asset(Value),
    ContentItem(Value),
    LanguageVariant(Value),
}

impl ImportableItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Language(_) => ItemKind::Language,
            Self::Taxonomy(_) => ItemKind::Taxonomy,
            Self::ContentTypeSnippet(_) => ItemKind::ContentTypeSnippet,
            Self::ContentType(_) => ItemKind::ContentType,
            Self::Workflow(_) => ItemKind::Workflow,
            Self::Asset(_) => ItemKind::Asset,
            Self::ContentItem(_) => ItemKind::ContentItem,
            Self::LanguageVariant(_) => ItemKind::LanguageVariant,
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            Self::Language(v)
            | Self::Taxonomy(v)
            | Self::ContentTypeSnippet(v)
            | Self::ContentType(v)
            | Self::Workflow(v)
            | Self::Asset(v)
            | Self::ContentItem(v)
            | Self::LanguageVariant(v) => v,
        }
    }

    /// Ordering key. Variants have no codename of their own; they are keyed
    /// by `item/language`.
    pub fn codename(&self) -> String {
        let payload = self.payload();
        match self {
            Self::LanguageVariant(_) => format!(
                "{}/{}",
                reference_codename(payload, "item"),
                reference_codename(payload, "language")
            ),
            Self::Asset(_) => payload
                .get("codename")
                .or_else(|| payload.get("file_name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            _ => payload
                .get("codename")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

fn reference_codename<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload
        .get(key)
        .and_then(|r| r.get("codename"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// An item with the codenames it depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedItem {
    pub codename: String,
    pub item: ImportableItem,
    pub dependencies: BTreeSet<String>,
}

impl PreparedItem {
    pub fn new(item: ImportableItem) -> Self {
        Self {
            codename: item.codename(),
            item,
            dependencies: BTreeSet::new(),
        }
    }
}

/// Element properties whose values reference a content type or snippet.
const MODEL_REFERENCE_KEYS: [&str; 3] = ["snippet", "allowed_content_types", "allowed_item_link_types"];

/// Codenames of content types and snippets referenced by `payload`: objects
/// under a [`MODEL_REFERENCE_KEYS`] property carrying a `codename` and no `id`
/// or `external_id`. The payload's own codename is excluded.
pub fn referenced_codenames(payload: &Value, own_codename: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let _ = for_each_object(payload, &mut |map| {
        for key in MODEL_REFERENCE_KEYS {
            let targets = match map.get(key) {
                Some(Value::Array(targets)) => targets.as_slice(),
                Some(target @ Value::Object(_)) => std::slice::from_ref(target),
                _ => continue,
            };
            for target in targets.iter().filter_map(Value::as_object) {
                let is_reference = !target
                    .keys()
                    .any(|k| k.eq_ignore_ascii_case("id") || k.eq_ignore_ascii_case("external_id"));
                if is_reference
                    && let Some(codename) = target.get("codename").and_then(Value::as_str)
                    && !codename.is_empty()
                    && codename != own_codename
                {
                    found.insert(codename.to_string());
                }
            }
        }
        std::ops::ControlFlow::Continue(())
    });
    found
}

/// Stable dependency sort. Items keep their input order unless they reference
/// a later item in the set, in which case they move after it. Members of a
/// reference cycle are emitted in input order once nothing else is ready.
pub fn order_by_dependencies(items: Vec<PreparedItem>) -> Vec<PreparedItem> {
    let codenames: HashSet<String> = items.iter().map(|i| i.codename.clone()).collect();
    let mut remaining: Vec<Option<PreparedItem>> = items.into_iter().map(Some).collect();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(remaining.len());

    while ordered.len() < remaining.len() {
        let ready = remaining.iter().position(|slot| {
            slot.as_ref().is_some_and(|item| {
                item.dependencies
                    .iter()
                    .all(|dep| !codenames.contains(dep) || emitted.contains(dep))
            })
        });
        let idx = match ready {
            Some(idx) => idx,
            // cycle: take the first remaining item
            None => match remaining.iter().position(Option::is_some) {
                Some(idx) => idx,
                None => break,
            },
        };
        if let Some(item) = remaining[idx].take() {
            emitted.insert(item.codename.clone());
            ordered.push(item);
        }
    }
    ordered
}

/// Flattens a translated snapshot into creation order:
/// languages, taxonomies, snippets and content types (dependency sorted),
/// workflows, assets, content items, language variants.
pub fn prepare_items(data: &SnapshotData) -> Vec<PreparedItem> {
    let mut prepared: Vec<PreparedItem> = Vec::new();
    let wrap = |records: &[Value], make: fn(Value) -> ImportableItem| {
        records
            .iter()
            .cloned()
            .map(make)
            .map(PreparedItem::new)
            .collect::<Vec<_>>()
    };

    prepared.extend(wrap(&data.languages, ImportableItem::Language));
    prepared.extend(wrap(&data.taxonomies, ImportableItem::Taxonomy));

    let mut model: Vec<PreparedItem> = wrap(&data.content_type_snippets, ImportableItem::ContentTypeSnippet)
        .into_iter()
        .chain(wrap(&data.content_types, ImportableItem::ContentType))
        .collect();
    for item in &mut model {
        item.dependencies = referenced_codenames(item.item.payload(), &item.codename);
    }
    prepared.extend(order_by_dependencies(model));

    prepared.extend(wrap(&data.workflows, ImportableItem::Workflow));
    prepared.extend(wrap(&data.assets, ImportableItem::Asset));
    prepared.extend(wrap(&data.content_items, ImportableItem::ContentItem));
    prepared.extend(wrap(&data.language_variants, ImportableItem::LanguageVariant));
    prepared
}
