//! # Identity translation
//!
//! Every entity created in the target gets a new id. The [`IdentityMap`] records
//! original id to new id as entities are created, and rewrites id references in
//! payloads that are processed later, including ids embedded in rich-text
//! markup attributes.

use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use kontent::DEFAULT_OBJECT_ID;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;

use crate::{
    snapshot::ItemKind,
    translate::{for_each_object, id_key, walk_objects},
};

static RICH_TEXT_ID_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(data-item-id|data-asset-id|data-image-id|data-id)="([^"]*)""#)
        .unwrap_or_else(|err| panic!("invalid rich text regex: {err}"))
});

/// One entity created in the target environment.
#[derive(Clone, Debug, Serialize)]
pub struct IdentityRecord {
    pub kind: ItemKind,
    pub original_id: String,
    pub new_id: String,
    /// Human-readable name of the entity
    pub title: String,
    #[serde(skip)]
    pub original: Value,
    #[serde(skip)]
    pub created: Value,
}

/// Original id to new id mappings accumulated during one import run.
#[derive(Debug, Default)]
pub struct IdentityMap {
    records: Vec<IdentityRecord>,
    by_original: HashMap<String, usize>,
    new_ids: HashSet<String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a created entity. The first mapping recorded for an original id wins.
    /// The shared default-object id is never mapped: it names a different
    /// entity depending on where it is referenced.
    pub fn record(&mut self, record: IdentityRecord) {
        let idx = self.records.len();
        if !record.original_id.is_empty()
            && !record.original_id.eq_ignore_ascii_case(DEFAULT_OBJECT_ID)
        {
            self.by_original
                .entry(record.original_id.clone())
                .or_insert(idx);
        }
        self.new_ids.insert(record.new_id.clone());
        self.records.push(record);
    }

    /// New id for an original id, if that entity has been created.
    pub fn new_id(&self, original_id: &str) -> Option<&str> {
        self.by_original
            .get(original_id)
            .map(|idx| self.records[*idx].new_id.as_str())
    }

    /// Record of a created entity, by kind and codename of the created payload.
    pub fn find_by_codename(&self, kind: ItemKind, codename: &str) -> Option<&IdentityRecord> {
        self.records.iter().find(|record| {
            record.kind == kind
                && record.created.get("codename").and_then(Value::as_str) == Some(codename)
        })
    }

    pub fn into_records(self) -> Vec<IdentityRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrites every `id` field whose value is a recorded original id, and the
    /// id attributes in rich-text strings.
    pub fn translate(&self, payload: &mut Value) {
        if self.by_original.is_empty() {
            return;
        }
        walk_objects(payload, &mut |map| {
            if let Some(key) = id_key(map)
                && let Some(new_id) = map[&key].as_str().and_then(|id| self.new_id(id))
            {
                let new_id = new_id.to_string();
                map.insert(key, Value::String(new_id));
            }
            for value in map.values_mut() {
                if let Value::String(text) = value
                    && looks_like_rich_text(text)
                {
                    let rewritten = self.translate_rich_text(text);
                    *text = rewritten;
                }
            }
        });
    }

    fn translate_rich_text(&self, text: &str) -> String {
        RICH_TEXT_ID_ATTR
            .replace_all(text, |caps: &Captures<'_>| {
                let original = &caps[2];
                let id = self.new_id(original).unwrap_or(original);
                format!("{}=\"{id}\"", &caps[1])
            })
            .into_owned()
    }

    /// Ids in `payload` that reference a source entity but were not translated:
    /// the value is one of `source_ids`, is not a new id, and is neither
    /// `own_id` nor the shared default-object id.
    pub fn unresolved(
        &self,
        payload: &Value,
        source_ids: &HashSet<String>,
        own_id: &str,
    ) -> Vec<String> {
        let is_unresolved = |id: &str| {
            !id.is_empty()
                && id != own_id
                && !id.eq_ignore_ascii_case(DEFAULT_OBJECT_ID)
                && source_ids.contains(id)
                && !self.new_ids.contains(id)
        };
        let mut found = Vec::new();
        let _ = for_each_object(payload, &mut |map| {
            for (key, value) in map {
                let Some(text) = value.as_str() else {
                    continue;
                };
                if key.eq_ignore_ascii_case("id") {
                    if is_unresolved(text) {
                        found.push(text.to_string());
                    }
                } else if looks_like_rich_text(text) {
                    for caps in RICH_TEXT_ID_ATTR.captures_iter(text) {
                        if is_unresolved(&caps[2]) {
                            found.push(caps[2].to_string());
                        }
                    }
                }
            }
            std::ops::ControlFlow::Continue(())
        });
        found.sort();
        found.dedup();
        found
    }
}

const RICH_TEXT_PREFIXES: [&str; 7] = ["<p", "<h", "<ul", "<ol", "<table", "<figure", "<object"];

/// Rich-text element values are html fragments starting with a block tag.
fn looks_like_rich_text(text: &str) -> bool {
    let text = text.trim_start();
    RICH_TEXT_PREFIXES
        .iter()
        .any(|prefix| text.starts_with(prefix))
}
