//! # Reference rewriting
//!
//! Exported records reference each other by internal id, and none of those ids
//! exist in the target environment. Before import, id references are rewritten
//! either to external ids (taxonomies, snippets, content types, whose create
//! endpoints accept a client-supplied external id) or to codenames (everything
//! else), resolved by searching the whole snapshot.
//!
//! All rewriting passes, including the identity translation in
//! [`identity`](crate::identity), are built on [`walk_objects`].

use std::{collections::HashMap, ops::ControlFlow};

use kontent::{DEFAULT_OBJECT_ID, DEFAULT_WORKFLOW_CODENAME};
use serde_json::{Map, Value};
use tracing::debug;

use crate::snapshot::SnapshotData;

/// Codename the target gives its default collection.
pub const DEFAULT_COLLECTION_CODENAME: &str = "default";

/// Visits every json object nested in `value`, parents before children.
/// The visitor may rewrite scalar fields of the object it is given.
pub fn walk_objects<F>(value: &mut Value, visit: &mut F)
where
    F: FnMut(&mut Map<String, Value>),
{
    match value {
        Value::Object(map) => {
            visit(map);
            for child in map.values_mut() {
                walk_objects(child, visit);
            }
        }
        Value::Array(items) => {
            for child in items {
                walk_objects(child, visit);
            }
        }
        _ => {}
    }
}

/// Read-only walk over every nested object. Stops when the visitor breaks.
pub fn for_each_object<'a, F>(value: &'a Value, visit: &mut F) -> ControlFlow<()>
where
    F: FnMut(&'a Map<String, Value>) -> ControlFlow<()>,
{
    match value {
        Value::Object(map) => {
            visit(map)?;
            for child in map.values() {
                for_each_object(child, visit)?;
            }
        }
        Value::Array(items) => {
            for child in items {
                for_each_object(child, visit)?;
            }
        }
        _ => {}
    }
    ControlFlow::Continue(())
}

/// Key of the object's id field. Keys are matched case-insensitively.
pub(crate) fn id_key(map: &Map<String, Value>) -> Option<String> {
    map.keys().find(|key| key.eq_ignore_ascii_case("id")).cloned()
}

fn has_codename(map: &Map<String, Value>) -> bool {
    map.get("codename")
        .and_then(Value::as_str)
        .is_some_and(|codename| !codename.is_empty())
}

/// Moves every non-empty `id` field to `external_id`.
pub fn externalize(value: &mut Value) {
    walk_objects(value, &mut |map| {
        let Some(key) = id_key(map) else {
            return;
        };
        let non_empty = match &map[&key] {
            Value::Null => false,
            Value::String(id) => !id.is_empty(),
            _ => true,
        };
        if non_empty && let Some(id) = map.remove(&key) {
            map.insert("external_id".to_string(), id);
        }
    });
}

/// Id to codename lookups over a reference copy of the snapshot.
///
/// Every `{id | external_id, codename}` pair passed over during a search is
/// remembered, so each part of the snapshot is scanned at most once no matter
/// how many references resolve into it. The first occurrence of an id wins.
#[derive(Debug, Default)]
pub struct CodenameCache {
    known: HashMap<String, String>,
    fully_indexed: bool,
}

impl CodenameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codename of the record whose `id` or `external_id` equals `id`.
    pub fn find(&mut self, id: &str, reference: &Value) -> Option<String> {
        if let Some(codename) = self.known.get(id) {
            return Some(codename.clone());
        }
        if self.fully_indexed {
            return None;
        }
        let known = &mut self.known;
        let mut found = None;
        let flow = for_each_object(reference, &mut |map| {
            let Some(codename) = map
                .get("codename")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
            else {
                return ControlFlow::Continue(());
            };
            for (key, candidate) in map {
                if !(key.eq_ignore_ascii_case("id") || key.eq_ignore_ascii_case("external_id")) {
                    continue;
                }
                let Some(candidate) = candidate.as_str().filter(|c| !c.is_empty()) else {
                    continue;
                };
                known
                    .entry(candidate.to_string())
                    .or_insert_with(|| codename.to_string());
                if candidate == id {
                    found = Some(codename.to_string());
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        });
        if flow.is_continue() {
            self.fully_indexed = true;
        }
        found
    }
}

/// Replaces `id` fields that have no sibling `codename` with the codename of the
/// record they point to. When the id is the shared default-object id and
/// `default_codename` is given, that codename is used without searching.
/// Unresolvable ids are left in place.
pub fn codenameize(
    value: &mut Value,
    reference: &Value,
    cache: &mut CodenameCache,
    default_codename: Option<&str>,
) {
    walk_objects(value, &mut |map| {
        let Some(key) = id_key(map) else {
            return;
        };
        if has_codename(map) {
            return;
        }
        let Some(id) = map[&key].as_str().filter(|id| !id.is_empty()) else {
            return;
        };
        let resolved = match default_codename {
            Some(codename) if id.eq_ignore_ascii_case(DEFAULT_OBJECT_ID) => {
                Some(codename.to_string())
            }
            _ => cache.find(id, reference),
        };
        if let Some(codename) = resolved {
            map.remove(&key);
            map.insert("codename".to_string(), Value::String(codename));
        }
    });
}

/// Codenameizes only the values of `collection` and `collections` fields, with
/// the shared default-object id resolving to `default_collection`.
pub fn codenameize_collections(
    value: &mut Value,
    reference: &Value,
    cache: &mut CodenameCache,
    default_collection: &str,
) {
    walk_objects(value, &mut |map| {
        for (key, child) in map.iter_mut() {
            if key == "collection" || key == "collections" {
                codenameize(child, reference, cache, Some(default_collection));
            }
        }
    });
}

/// Codename of the default collection. Every environment has one, named
/// `default` unless renamed, so that name is used when collections were not
/// exported.
pub fn default_collection_codename(data: &SnapshotData) -> String {
    data.collections
        .iter()
        .find(|collection| {
            collection
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| id.eq_ignore_ascii_case(DEFAULT_OBJECT_ID))
        })
        .and_then(|collection| collection.get("codename"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_COLLECTION_CODENAME)
        .to_string()
}

/// Codename of the default language, if the snapshot has one.
pub fn default_language_codename(data: &SnapshotData) -> Option<String> {
    data.languages
        .iter()
        .find(|language| {
            language
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| id.eq_ignore_ascii_case(DEFAULT_OBJECT_ID))
        })
        .and_then(|language| language.get("codename"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Rewrites id references across the whole snapshot ahead of import.
///
/// - taxonomies: external ids
/// - snippets and content types: codenames for references to other records,
///   then external ids for what remains (their own id and element ids)
/// - languages, assets, content items, workflows: codenames
/// - `collection` references in assets, content items and workflow scopes:
///   codenames, resolved before anything else with the default collection
///   codename, since the default collection also uses the shared id
/// - language variants: workflow and step first with the default workflow
///   codename, then everything else with the default language codename, since
///   the default workflow and default language share one id
///
/// Top-level record ids survive codenameize because records carry their own
/// codename.
pub fn translate_snapshot_ids(data: &mut SnapshotData) {
    let reference = match serde_json::to_value(&*data) {
        Ok(reference) => reference,
        Err(err) => {
            debug!("snapshot not serializable, ids left as-is: {err}");
            return;
        }
    };
    let mut cache = CodenameCache::new();
    let default_language = default_language_codename(data);
    let language_hint = default_language.as_deref();
    let workflow_hint = Some(DEFAULT_WORKFLOW_CODENAME);
    let default_collection = default_collection_codename(data);

    for record in data
        .assets
        .iter_mut()
        .chain(data.content_items.iter_mut())
        .chain(data.workflows.iter_mut())
    {
        codenameize_collections(record, &reference, &mut cache, &default_collection);
    }

    for taxonomy in &mut data.taxonomies {
        externalize(taxonomy);
    }
    for record in data
        .content_type_snippets
        .iter_mut()
        .chain(data.content_types.iter_mut())
    {
        codenameize(record, &reference, &mut cache, None);
        externalize(record);
    }
    for language in &mut data.languages {
        codenameize(language, &reference, &mut cache, language_hint);
    }
    for asset in &mut data.assets {
        codenameize(asset, &reference, &mut cache, language_hint);
    }
    for item in &mut data.content_items {
        codenameize(item, &reference, &mut cache, None);
    }
    for variant in &mut data.language_variants {
        for key in ["workflow", "workflow_step"] {
            if let Some(part) = variant.get_mut(key) {
                codenameize(part, &reference, &mut cache, workflow_hint);
            }
        }
        codenameize(variant, &reference, &mut cache, language_hint);
    }
    for workflow in &mut data.workflows {
        codenameize(workflow, &reference, &mut cache, workflow_hint);
    }
}
