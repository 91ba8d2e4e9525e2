//! # Import
//!
//! Recreates a snapshot in a target environment.
//!
//! Phases run strictly in sequence, and within a phase one entity at a time:
//! every create call can depend on ids minted by earlier calls.
//!
//! 1. drop records rejected by the `can_import` predicates (they see raw,
//!    id-based payloads)
//! 2. rewrite id references to codenames and external ids
//!    ([`translate_snapshot_ids`])
//! 3. create the asset folder tree in one call
//! 4. create languages, taxonomies, snippets and content types (dependency
//!    sorted), workflows, assets, content items, language variants
//! 5. optionally move variants to the workflow step they had in the source
//! 6. optionally move variants to a fixed workflow step
//!
//! A failed entity is handled by the configured [`ErrorPolicy`]; nothing
//! already created is rolled back.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt,
    sync::Arc,
};

use bytes::Bytes;
use kontent::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value, json};
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    MAX_ASSET_SIZE_BYTES, PACKAGE_VERSION,
    api::{BinaryProvider, ManagementApi},
    error::{ApiSnafu, BackupError, Result, precondition},
    identity::{IdentityMap, IdentityRecord},
    order::{ImportableItem, prepare_items},
    progress::{ErrorPolicy, Failure, Observer, handle_failure, notify},
    snapshot::{ActionKind, ItemKind, Snapshot, SnapshotData, nested_str, str_field},
    translate::translate_snapshot_ids,
};

/// Decides whether a raw source record is imported.
pub type ImportPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Import options.
#[derive(Clone, Default)]
pub struct ImportConfig {
    /// Activate target languages that exist but are inactive, and rename the
    /// target's default language to the source codename.
    pub fix_languages: bool,
    /// After all variants are created, publish, archive, or move each one to
    /// the workflow step it had in the source.
    pub preserve_workflow: bool,
    /// Move every imported variant to this workflow step id at the end.
    pub workflow_step_for_imported_items: Option<String>,
    pub error_policy: ErrorPolicy,
    pub can_import: HashMap<ItemKind, ImportPredicate>,
}

impl fmt::Debug for ImportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportConfig")
            .field("fix_languages", &self.fix_languages)
            .field("preserve_workflow", &self.preserve_workflow)
            .field(
                "workflow_step_for_imported_items",
                &self.workflow_step_for_imported_items,
            )
            .field("error_policy", &self.error_policy)
            .field("can_import", &self.can_import.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ImportConfig {
    #[must_use]
    pub fn fix_languages(mut self, fix_languages: bool) -> Self {
        self.fix_languages = fix_languages;
        self
    }

    #[must_use]
    pub fn preserve_workflow(mut self, preserve_workflow: bool) -> Self {
        self.preserve_workflow = preserve_workflow;
        self
    }

    #[must_use]
    pub fn workflow_step_for_imported_items(mut self, step_id: impl Into<String>) -> Self {
        self.workflow_step_for_imported_items = Some(step_id.into());
        self
    }

    #[must_use]
    pub fn error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    /// Imports only the records of `kind` for which `predicate` returns true.
    #[must_use]
    pub fn can_import<F>(mut self, kind: ItemKind, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.can_import.insert(kind, Arc::new(predicate));
        self
    }
}

/// An asset imported with an empty binary because its file is too large.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct UnsupportedBinaryFile {
    pub asset_id: String,
    pub file_name: String,
    pub size: u64,
}

/// Outcome of one import run.
#[derive(Debug, Default, Serialize)]
pub struct ImportResult {
    /// Created entities, in creation order
    pub imported: Vec<IdentityRecord>,
    pub failures: Vec<Failure>,
    pub unsupported_binary_files: Vec<UnsupportedBinaryFile>,
    /// Source ids still present in payloads sent to the target
    pub unresolved_references: Vec<String>,
}

impl ImportResult {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

type UnsupportedFileObserver<'a> = Box<dyn Fn(&UnsupportedBinaryFile) + Send + Sync + 'a>;

/// Imports snapshots into the environment behind `api`.
pub struct ImportService<'a, A> {
    api: &'a A,
    config: ImportConfig,
    on_processed: Option<Observer<'a>>,
    on_unsupported_binary_file: Option<UnsupportedFileObserver<'a>>,
}

/// Mutable state of one run.
#[derive(Default)]
struct ImportRun {
    identities: IdentityMap,
    failures: Vec<Failure>,
    unsupported: Vec<UnsupportedBinaryFile>,
    unresolved: BTreeSet<String>,
    /// Top-level ids of source records, collected before translation
    source_ids: HashSet<String>,
    /// Languages in the target, loaded when the first language is imported
    target_languages: Option<Vec<Value>>,
    /// Translated source variants that were created
    imported_variants: Vec<Value>,
}

impl ImportRun {
    fn record(&mut self, kind: ItemKind, original_id: &str, original: &Value, created: &Value, title: &str) {
        self.identities.record(IdentityRecord {
            kind,
            original_id: original_id.to_string(),
            new_id: str_field(created, "id").to_string(),
            title: title.to_string(),
            original: original.clone(),
            created: created.clone(),
        });
    }

    fn check_unresolved(&mut self, payload: &Value, own_id: &str) {
        let found = self
            .identities
            .unresolved(payload, &self.source_ids, own_id);
        self.unresolved.extend(found);
    }
}

impl<'a, A: ManagementApi> ImportService<'a, A> {
    pub fn new(api: &'a A, config: ImportConfig) -> Self {
        Self {
            api,
            config,
            on_processed: None,
            on_unsupported_binary_file: None,
        }
    }

    /// Called once per created entity and per workflow transition.
    #[must_use]
    pub fn on_processed<F>(mut self, observer: F) -> Self
    where
        F: Fn(&crate::progress::ProcessedItem) + Send + Sync + 'a,
    {
        self.on_processed = Some(Box::new(observer));
        self
    }

    /// Called once per asset whose binary is too large to upload.
    #[must_use]
    pub fn on_unsupported_binary_file<F>(mut self, observer: F) -> Self
    where
        F: Fn(&UnsupportedBinaryFile) + Send + Sync + 'a,
    {
        self.on_unsupported_binary_file = Some(Box::new(observer));
        self
    }

    /// Imports `snapshot`, reading asset binaries from `binaries`.
    ///
    /// Returns `Err` only for a failure before the first create call, or for the
    /// first failed entity under [`ErrorPolicy::FailFast`].
    pub async fn import(
        &self,
        snapshot: Snapshot,
        binaries: &impl BinaryProvider,
    ) -> Result<ImportResult> {
        let environment = self
            .api
            .environment_info()
            .await
            .context(ApiSnafu {
                action: "read target environment",
            })?;
        info!(%environment, "importing");

        if snapshot.metadata.version != PACKAGE_VERSION {
            warn!(
                archive_version = %snapshot.metadata.version,
                current_version = PACKAGE_VERSION,
                "version mismatch: the archive was created by a different version; \
                 if the import fails, try the version that created it"
            );
        }

        let mut data = snapshot.data;
        self.remove_skipped(&mut data);

        let mut run = ImportRun {
            source_ids: collect_source_ids(&data),
            ..Default::default()
        };

        debug!("translating ids to codenames");
        translate_snapshot_ids(&mut data);

        if data.asset_folders.is_empty() {
            debug!("no asset folders");
        } else if let Err(err) = self.import_asset_folders(&mut run, &data.asset_folders).await {
            self.fail(&mut run, ItemKind::AssetFolder.into(), "asset folders", err)?;
        }

        let mut current_kind = None;
        for prepared in prepare_items(&data) {
            let kind = prepared.item.kind();
            if current_kind != Some(kind) {
                info!(%kind, "importing");
                current_kind = Some(kind);
            }
            let title = item_title(prepared.item.payload(), &prepared.codename);
            let outcome = match prepared.item {
                ImportableItem::Language(language) => self.import_language(&mut run, language).await,
                ImportableItem::Taxonomy(taxonomy) => self.import_taxonomy(&mut run, taxonomy).await,
                ImportableItem::ContentTypeSnippet(snippet) => {
                    self.import_content_type_snippet(&mut run, snippet).await
                }
                ImportableItem::ContentType(content_type) => {
                    self.import_content_type(&mut run, content_type).await
                }
                ImportableItem::Workflow(workflow) => self.import_workflow(&mut run, workflow).await,
                ImportableItem::Asset(asset) => self.import_asset(&mut run, asset, binaries).await,
                ImportableItem::ContentItem(item) => self.import_content_item(&mut run, item).await,
                ImportableItem::LanguageVariant(variant) => {
                    self.import_language_variant(&mut run, variant, &data.workflows)
                        .await
                }
            };
            if let Err(err) = outcome {
                self.fail(&mut run, kind.into(), &title, err)?;
            }
        }

        if self.config.preserve_workflow {
            self.set_workflow_steps(&mut run, &data.workflows).await?;
        }
        if let Some(step_id) = &self.config.workflow_step_for_imported_items {
            self.move_to_workflow_step(&mut run, step_id).await?;
        }

        if !run.unresolved.is_empty() {
            warn!(
                count = run.unresolved.len(),
                ids = ?run.unresolved,
                "payloads sent with unresolved source ids"
            );
        }
        info!(
            imported = run.identities.len(),
            failed = run.failures.len(),
            "import finished"
        );

        Ok(ImportResult {
            imported: run.identities.into_records(),
            failures: run.failures,
            unsupported_binary_files: run.unsupported,
            unresolved_references: run.unresolved.into_iter().collect(),
        })
    }

    fn fail(&self, run: &mut ImportRun, kind: ActionKind, title: &str, err: BackupError) -> Result<()> {
        handle_failure(self.config.error_policy, &mut run.failures, kind, title, err)
    }

    fn notify(&self, title: String, kind: impl Into<ActionKind>, data: Value) {
        notify(self.on_processed.as_ref(), title, kind.into(), data);
    }

    fn remove_skipped(&self, data: &mut SnapshotData) {
        for (kind, predicate) in &self.config.can_import {
            let Some(records) = data.records_mut(*kind) else {
                continue;
            };
            let before = records.len();
            records.retain(|record| predicate(record));
            let skipped = before - records.len();
            if skipped > 0 {
                info!(%kind, skipped, "excluded from import");
            }
        }
    }

    async fn import_asset_folders(&self, run: &mut ImportRun, folders: &[Value]) -> Result<()> {
        let mut originals = folders.to_vec();
        stamp_folder_external_ids(&mut originals);
        let request: Vec<Value> = originals.iter().map(folder_request).collect();

        let created = self
            .api
            .add_asset_folders(request)
            .await
            .context(ApiSnafu {
                action: "create asset folders",
            })?;

        let mut flattened = Vec::new();
        flatten_folders(&originals, &mut flattened);
        self.record_folders(run, &created, &flattened)
    }

    fn record_folders(&self, run: &mut ImportRun, created: &[Value], originals: &[&Value]) -> Result<()> {
        for folder in created {
            let external_id = str_field(folder, "external_id");
            let name = str_field(folder, "name");
            let original = originals
                .iter()
                .find(|original| str_field(original, "external_id") == external_id)
                .ok_or_else(|| {
                    precondition(format!(
                        "could not find original folder with id '{external_id}' named '{name}'"
                    ))
                })?;
            run.record(
                ItemKind::AssetFolder,
                str_field(original, "id"),
                original,
                folder,
                name,
            );
            self.notify(name.to_string(), ItemKind::AssetFolder, folder.clone());
            if let Some(children) = folder.get("folders").and_then(Value::as_array) {
                self.record_folders(run, children, originals)?;
            }
        }
        Ok(())
    }

    async fn target_languages<'r>(
        &self,
        run: &'r mut ImportRun,
        reload: bool,
    ) -> Result<&'r [Value]> {
        if reload || run.target_languages.is_none() {
            let languages = self
                .api
                .list(Collection::Languages)
                .await
                .context(ApiSnafu {
                    action: "list target languages",
                })?;
            run.target_languages = Some(languages);
        }
        Ok(run.target_languages.as_deref().unwrap_or_default())
    }

    async fn import_language(&self, run: &mut ImportRun, language: Value) -> Result<()> {
        if self.config.fix_languages {
            let current = self.target_languages(run, false).await?.to_vec();
            self.fix_language(&current, &language).await?;
            self.target_languages(run, true).await?;
        }
        let current = self.target_languages(run, false).await?;
        let Some(payload) = language_request(current, &language)? else {
            return Ok(());
        };
        let codename = str_field(&language, "codename");
        let created = self
            .api
            .create(Collection::Languages, payload)
            .await
            .context(ApiSnafu {
                action: format!("create language '{codename}'"),
            })?;
        let title = str_field(&created, "name").to_string();
        run.record(ItemKind::Language, str_field(&language, "id"), &language, &created, &title);
        self.notify(title, ItemKind::Language, created);
        Ok(())
    }

    async fn fix_language(&self, current: &[Value], language: &Value) -> Result<()> {
        let codename = str_field(language, "codename");
        if let Some(existing) = current.iter().find(|l| str_field(l, "codename") == codename)
            && existing.get("is_active").and_then(Value::as_bool) == Some(false)
        {
            info!(
                language = str_field(existing, "name"),
                codename, "language is not active in target environment, activating"
            );
            self.api
                .update_language(codename, vec![LanguageOperation::activate()])
                .await
                .context(ApiSnafu {
                    action: format!("activate language '{codename}'"),
                })?;
        }

        if language.get("is_default").and_then(Value::as_bool) != Some(true) {
            return Ok(());
        }
        let id = str_field(language, "id");
        let target_default = current
            .iter()
            .find(|l| str_field(l, "id") == id)
            .ok_or_else(|| precondition(format!("default language with id '{id}' not found in target")))?;
        let target_codename = str_field(target_default, "codename");
        if target_codename == codename {
            return Ok(());
        }
        if current.iter().any(|l| str_field(l, "codename") == codename) {
            info!(
                codename,
                "language already exists in target environment, default language not renamed"
            );
            return Ok(());
        }
        info!(
            from = target_codename,
            to = codename,
            "renaming default language of target environment"
        );
        self.api
            .update_language(target_codename, vec![LanguageOperation::rename_codename(codename)])
            .await
            .context(ApiSnafu {
                action: format!("rename default language '{target_codename}'"),
            })?;
        Ok(())
    }

    async fn import_taxonomy(&self, run: &mut ImportRun, taxonomy: Value) -> Result<()> {
        let payload = pick(&taxonomy, &["name", "codename", "external_id", "terms"]);
        let created = self
            .api
            .create(Collection::Taxonomies, payload)
            .await
            .context(ApiSnafu {
                action: format!("create taxonomy '{}'", str_field(&taxonomy, "codename")),
            })?;
        let title = str_field(&created, "name").to_string();
        run.record(
            ItemKind::Taxonomy,
            str_field(&taxonomy, "external_id"),
            &taxonomy,
            &created,
            &title,
        );
        self.notify(title, ItemKind::Taxonomy, created);
        Ok(())
    }

    async fn import_content_type_snippet(&self, run: &mut ImportRun, snippet: Value) -> Result<()> {
        let payload = pick(&snippet, &["name", "codename", "external_id", "elements"]);
        let created = self
            .api
            .create(Collection::ContentTypeSnippets, payload)
            .await
            .context(ApiSnafu {
                action: format!("create content type snippet '{}'", str_field(&snippet, "codename")),
            })?;
        let title = str_field(&created, "name").to_string();
        run.record(
            ItemKind::ContentTypeSnippet,
            str_field(&snippet, "external_id"),
            &snippet,
            &created,
            &title,
        );
        self.notify(title, ItemKind::ContentTypeSnippet, created);
        Ok(())
    }

    async fn import_content_type(&self, run: &mut ImportRun, content_type: Value) -> Result<()> {
        let payload = pick(
            &content_type,
            &["name", "codename", "external_id", "elements", "content_groups"],
        );
        let created = self
            .api
            .create(Collection::ContentTypes, payload)
            .await
            .context(ApiSnafu {
                action: format!("create content type '{}'", str_field(&content_type, "codename")),
            })?;
        let title = str_field(&created, "name").to_string();
        run.record(
            ItemKind::ContentType,
            str_field(&content_type, "external_id"),
            &content_type,
            &created,
            &title,
        );
        self.notify(title, ItemKind::ContentType, created);
        Ok(())
    }

    async fn import_workflow(&self, run: &mut ImportRun, workflow: Value) -> Result<()> {
        let codename = str_field(&workflow, "codename").to_string();
        let mut payload = workflow.clone();
        clear_workflow_roles(&mut payload);

        let created = if codename.eq_ignore_ascii_case(DEFAULT_WORKFLOW_CODENAME) {
            // the target always has a default workflow; it is updated, and
            // assigns its own step ids
            clear_workflow_step_ids(&mut payload);
            self.api
                .update_workflow(&codename, payload)
                .await
                .context(ApiSnafu {
                    action: format!("update workflow '{codename}'"),
                })?
        } else {
            self.api
                .create(Collection::Workflows, payload)
                .await
                .context(ApiSnafu {
                    action: format!("create workflow '{codename}'"),
                })?
        };
        let title = str_field(&created, "name").to_string();
        run.record(ItemKind::Workflow, str_field(&workflow, "id"), &workflow, &created, &title);
        self.notify(title, ItemKind::Workflow, created);
        Ok(())
    }

    async fn import_asset(
        &self,
        run: &mut ImportRun,
        asset: Value,
        binaries: &impl BinaryProvider,
    ) -> Result<()> {
        let asset_id = str_field(&asset, "id");
        let file_name = str_field(&asset, "file_name");
        let content_type = asset
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("application/octet-stream");
        let size = asset.get("size").and_then(Value::as_u64).unwrap_or_default();

        let data = if size >= MAX_ASSET_SIZE_BYTES {
            warn!(
                file_name,
                size,
                max = MAX_ASSET_SIZE_BYTES,
                "file too large, importing asset without binary data"
            );
            let unsupported = UnsupportedBinaryFile {
                asset_id: asset_id.to_string(),
                file_name: file_name.to_string(),
                size,
            };
            if let Some(observer) = &self.on_unsupported_binary_file {
                observer(&unsupported);
            }
            run.unsupported.push(unsupported);
            Bytes::new()
        } else {
            binaries.load(asset_id, file_name)?
        };

        let file_reference = self
            .api
            .upload_file(file_name, content_type, data)
            .await
            .context(ApiSnafu {
                action: format!("upload file '{file_name}'"),
            })?;

        let mut payload = pick(&asset, &["title", "codename", "descriptions", "folder", "collection"]);
        if let Some(map) = payload.as_object_mut() {
            map.insert(
                "file_reference".into(),
                json!({"id": file_reference.id, "type": file_reference.kind}),
            );
            let external_id = asset
                .get("external_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .unwrap_or(asset_id);
            map.insert("external_id".into(), json!(external_id));
        }
        run.identities.translate(&mut payload);
        run.check_unresolved(&payload, asset_id);

        let created = self
            .api
            .create(Collection::Assets, payload)
            .await
            .context(ApiSnafu {
                action: format!("create asset '{file_name}'"),
            })?;
        let title = str_field(&created, "file_name").to_string();
        run.record(ItemKind::Asset, asset_id, &asset, &created, &title);
        self.notify(title, ItemKind::Asset, created);
        Ok(())
    }

    async fn import_content_item(&self, run: &mut ImportRun, item: Value) -> Result<()> {
        let codename = str_field(&item, "codename");
        let type_codename = nested_str(&item, "type", "codename");
        if type_codename.is_empty() {
            return Err(precondition(format!(
                "content item '{codename}' has unset type codename"
            )));
        }
        let mut payload = pick(&item, &["name", "codename", "external_id", "collection"]);
        if let Some(map) = payload.as_object_mut() {
            map.insert("type".into(), json!({"codename": type_codename}));
        }
        run.identities.translate(&mut payload);
        run.check_unresolved(&payload, str_field(&item, "id"));

        let created = self
            .api
            .create(Collection::ContentItems, payload)
            .await
            .context(ApiSnafu {
                action: format!("create content item '{codename}'"),
            })?;
        let title = str_field(&created, "name").to_string();
        run.record(ItemKind::ContentItem, str_field(&item, "id"), &item, &created, &title);
        self.notify(title, ItemKind::ContentItem, created);
        Ok(())
    }

    async fn import_language_variant(
        &self,
        run: &mut ImportRun,
        mut variant: Value,
        workflows: &[Value],
    ) -> Result<()> {
        let item_codename = nested_str(&variant, "item", "codename").to_string();
        let language_codename = nested_str(&variant, "language", "codename").to_string();
        if item_codename.is_empty() {
            return Err(precondition(format!(
                "missing item codename for variant of item '{}'",
                nested_str(&variant, "item", "id")
            )));
        }
        if language_codename.is_empty() {
            return Err(precondition(format!(
                "missing language codename for variant of item '{item_codename}'"
            )));
        }

        run.identities.translate(&mut variant);

        let mut payload = json!({
            "elements": variant.get("elements").cloned().unwrap_or_else(|| json!([])),
        });
        if let Some(workflow) = variant_workflow(&variant, workflows)? {
            let first_step = workflow
                .get("steps")
                .and_then(|steps| steps.get(0))
                .map(|step| str_field(step, "codename"))
                .filter(|step| !step.is_empty())
                .ok_or_else(|| {
                    precondition(format!(
                        "workflow '{}' has no steps",
                        str_field(workflow, "codename")
                    ))
                })?;
            payload["workflow"] = json!({
                "workflow_identifier": {"codename": str_field(workflow, "codename")},
                "step_identifier": {"codename": first_step},
            });
        }
        run.check_unresolved(&payload, "");

        let created = self
            .api
            .upsert_variant(&item_codename, &language_codename, &payload)
            .await
            .context(ApiSnafu {
                action: format!("upsert variant '{item_codename}' ({language_codename})"),
            })?;

        let original_item_id = run
            .identities
            .find_by_codename(ItemKind::ContentItem, &item_codename)
            .map(|record| record.original_id.clone())
            .unwrap_or_default();
        let title = format!("{item_codename} ({language_codename})");
        run.identities.record(IdentityRecord {
            kind: ItemKind::LanguageVariant,
            original_id: original_item_id,
            new_id: nested_str(&created, "item", "id").to_string(),
            title: title.clone(),
            original: variant.clone(),
            created: created.clone(),
        });
        run.imported_variants.push(variant);
        self.notify(title, ItemKind::LanguageVariant, created);
        Ok(())
    }

    /// Moves every imported variant to the step it had in the source: publish,
    /// archive, or change to the matching step.
    async fn set_workflow_steps(&self, run: &mut ImportRun, workflows: &[Value]) -> Result<()> {
        if run.imported_variants.is_empty() {
            return Ok(());
        }
        info!(variants = run.imported_variants.len(), "restoring workflow steps");
        let variants = std::mem::take(&mut run.imported_variants);
        for variant in &variants {
            let item_codename = nested_str(variant, "item", "codename");
            let language_codename = nested_str(variant, "language", "codename");
            let title = format!("{item_codename} ({language_codename})");
            let (kind, outcome) = self
                .set_workflow_step(variant, workflows, item_codename, language_codename)
                .await;
            match outcome {
                Ok(()) => self.notify(title, kind, variant.clone()),
                Err(err) => self.fail(run, kind, &title, err)?,
            }
        }
        run.imported_variants = variants;
        Ok(())
    }

    async fn set_workflow_step(
        &self,
        variant: &Value,
        workflows: &[Value],
        item_codename: &str,
        language_codename: &str,
    ) -> (ActionKind, Result<()>) {
        let step_codename = variant_step_codename(variant);
        if step_codename.is_empty() {
            return (
                ActionKind::ChangeWorkflowStep,
                Err(precondition(format!(
                    "missing workflow step codename for variant '{item_codename}' ({language_codename})"
                ))),
            );
        }

        let is_step = |workflow: &&Value, key: &str| nested_str(workflow, key, "codename") == step_codename;
        if workflows.iter().any(|w| is_step(&w, "published_step")) {
            let outcome = self
                .api
                .publish_variant(item_codename, language_codename)
                .await
                .context(ApiSnafu {
                    action: format!("publish '{item_codename}' ({language_codename})"),
                });
            return (ActionKind::Publish, outcome);
        }

        if workflows.iter().any(|w| is_step(&w, "archived_step")) {
            let outcome = async {
                let workflow = variant_workflow(variant, workflows)?.ok_or_else(|| {
                    precondition(format!(
                        "missing workflow for variant '{item_codename}' ({language_codename})"
                    ))
                })?;
                self.api
                    .change_variant_workflow(
                        item_codename,
                        language_codename,
                        str_field(workflow, "codename"),
                        nested_str(workflow, "archived_step", "codename"),
                    )
                    .await
                    .context(ApiSnafu {
                        action: format!("archive '{item_codename}' ({language_codename})"),
                    })
            }
            .await;
            return (ActionKind::Archive, outcome);
        }

        let outcome = async {
            let (workflow, step) = find_workflow_step(workflows, step_codename).ok_or_else(|| {
                precondition(format!(
                    "invalid workflow data for variant '{item_codename}' ({language_codename}): no step '{step_codename}'"
                ))
            })?;
            debug!(
                item_codename,
                language_codename,
                workflow = str_field(workflow, "name"),
                step = str_field(step, "name"),
                "changing workflow step"
            );
            self.api
                .change_variant_workflow(
                    item_codename,
                    language_codename,
                    str_field(workflow, "codename"),
                    str_field(step, "codename"),
                )
                .await
                .context(ApiSnafu {
                    action: format!("change workflow step of '{item_codename}' ({language_codename})"),
                })
        }
        .await;
        (ActionKind::ChangeWorkflowStep, outcome)
    }

    async fn move_to_workflow_step(&self, run: &mut ImportRun, step_id: &str) -> Result<()> {
        let variants = std::mem::take(&mut run.imported_variants);
        for variant in &variants {
            let item_codename = nested_str(variant, "item", "codename");
            let language_codename = nested_str(variant, "language", "codename");
            let title = format!("{item_codename} ({language_codename})");
            let outcome = self
                .api
                .change_variant_step(item_codename, language_codename, step_id)
                .await
                .context(ApiSnafu {
                    action: format!("move '{item_codename}' ({language_codename}) to step {step_id}"),
                });
            match outcome {
                Ok(()) => self.notify(title, ActionKind::ChangeWorkflowStep, variant.clone()),
                Err(err) => self.fail(run, ActionKind::ChangeWorkflowStep, &title, err)?,
            }
        }
        run.imported_variants = variants;
        Ok(())
    }
}

/// Display title of a record, for logs and failures.
fn item_title(payload: &Value, codename: &str) -> String {
    ["name", "file_name", "title"]
        .iter()
        .map(|key| str_field(payload, key))
        .find(|value| !value.is_empty())
        .unwrap_or(codename)
        .to_string()
}

/// Copies the present, non-null `keys` of `record` into a new object.
fn pick(record: &Value, keys: &[&str]) -> Value {
    let mut map = Map::new();
    for key in keys {
        if let Some(value) = record.get(*key).filter(|v| !v.is_null()) {
            map.insert((*key).to_string(), value.clone());
        }
    }
    Value::Object(map)
}

/// Top-level ids of every source record, and every nested folder id.
fn collect_source_ids(data: &SnapshotData) -> HashSet<String> {
    fn folder_ids(folders: &[Value], ids: &mut HashSet<String>) {
        for folder in folders {
            ids.insert(str_field(folder, "id").to_string());
            if let Some(children) = folder.get("folders").and_then(Value::as_array) {
                folder_ids(children, ids);
            }
        }
    }

    let mut ids: HashSet<String> = [
        &data.taxonomies,
        &data.content_type_snippets,
        &data.content_types,
        &data.content_items,
        &data.languages,
        &data.assets,
        &data.workflows,
    ]
    .into_iter()
    .flatten()
    .map(|record| str_field(record, "id").to_string())
    .collect();
    folder_ids(&data.asset_folders, &mut ids);
    ids.remove("");
    ids
}

fn stamp_folder_external_ids(folders: &mut [Value]) {
    for folder in folders {
        let id = str_field(folder, "id").to_string();
        if let Some(map) = folder.as_object_mut() {
            map.insert("external_id".into(), Value::String(id));
        }
        if let Some(children) = folder.get_mut("folders").and_then(Value::as_array_mut) {
            stamp_folder_external_ids(children);
        }
    }
}

fn folder_request(folder: &Value) -> Value {
    let children: Vec<Value> = folder
        .get("folders")
        .and_then(Value::as_array)
        .map(|children| children.iter().map(folder_request).collect())
        .unwrap_or_default();
    json!({
        "name": str_field(folder, "name"),
        "external_id": str_field(folder, "external_id"),
        "folders": children,
    })
}

fn flatten_folders<'v>(folders: &'v [Value], out: &mut Vec<&'v Value>) {
    for folder in folders {
        out.push(folder);
        if let Some(children) = folder.get("folders").and_then(Value::as_array) {
            flatten_folders(children, out);
        }
    }
}

/// Create request for a language, or `None` if the target already has it.
fn language_request(current: &[Value], language: &Value) -> Result<Option<Value>> {
    let codename = str_field(language, "codename");
    if let Some(existing) = current.iter().find(|l| str_field(l, "codename") == codename) {
        info!(
            language = str_field(existing, "name"),
            codename, "language exists in target environment, skipping"
        );
        return Ok(None);
    }

    if str_field(language, "id").eq_ignore_ascii_case(DEFAULT_OBJECT_ID)
        && let Some(target_default) = current
            .iter()
            .find(|l| str_field(l, "id").eq_ignore_ascii_case(DEFAULT_OBJECT_ID))
    {
        return Err(precondition(format!(
            "default language codename '{codename}' does not match target default language '{}'; \
             rename the target default language or import with language fixing enabled",
            str_field(target_default, "codename")
        )));
    }

    let fallback = nested_str(language, "fallback_language", "codename");
    if fallback.is_empty() {
        return Err(precondition(format!(
            "language '{}' has unset fallback language codename",
            str_field(language, "name")
        )));
    }
    let mut payload = pick(language, &["codename", "name", "external_id", "is_active"]);
    payload["fallback_language"] = if fallback == codename {
        json!({"id": DEFAULT_OBJECT_ID})
    } else {
        json!({"codename": fallback})
    };
    Ok(Some(payload))
}

/// Workflow of a variant, matched by codename against the source workflows.
/// `None` when the variant names no workflow or the snapshot has none.
fn variant_workflow<'w>(variant: &Value, workflows: &'w [Value]) -> Result<Option<&'w Value>> {
    let codename = variant
        .get("workflow")
        .map(|w| nested_str(w, "workflow_identifier", "codename"))
        .unwrap_or_default();
    if codename.is_empty() || workflows.is_empty() {
        return Ok(None);
    }
    workflows
        .iter()
        .find(|w| str_field(w, "codename").eq_ignore_ascii_case(codename))
        .map(Some)
        .ok_or_else(|| precondition(format!("missing workflow '{codename}'")))
}

/// Source step codename of a variant. Older exports carry `workflow_step`.
fn variant_step_codename(variant: &Value) -> &str {
    let step = variant
        .get("workflow")
        .map(|w| nested_str(w, "step_identifier", "codename"))
        .unwrap_or_default();
    if step.is_empty() {
        nested_str(variant, "workflow_step", "codename")
    } else {
        step
    }
}

fn find_workflow_step<'w>(workflows: &'w [Value], step_codename: &str) -> Option<(&'w Value, &'w Value)> {
    workflows.iter().find_map(|workflow| {
        workflow
            .get("steps")
            .and_then(Value::as_array)?
            .iter()
            .find(|step| str_field(step, "codename").eq_ignore_ascii_case(step_codename))
            .map(|step| (workflow, step))
    })
}

/// Role assignments can't be imported; every role list is emptied.
fn clear_workflow_roles(workflow: &mut Value) {
    if let Some(steps) = workflow.get_mut("steps").and_then(Value::as_array_mut) {
        for step in steps {
            if let Some(step) = step.as_object_mut() {
                step.insert("role_ids".into(), json!([]));
            }
        }
    }
    if let Some(archived) = workflow.get_mut("archived_step").and_then(Value::as_object_mut) {
        archived.insert("role_ids".into(), json!([]));
    }
    if let Some(published) = workflow.get_mut("published_step").and_then(Value::as_object_mut) {
        published.insert("create_new_version_role_ids".into(), json!([]));
        published.insert("unpublish_role_ids".into(), json!([]));
    }
}

fn clear_workflow_step_ids(workflow: &mut Value) {
    if let Some(steps) = workflow.get_mut("steps").and_then(Value::as_array_mut) {
        for step in steps {
            let Some(step) = step.as_object_mut() else {
                continue;
            };
            step.remove("id");
            if let Some(transitions) = step.get_mut("transitions_to").and_then(Value::as_array_mut) {
                for transition in transitions {
                    if let Some(target) = transition.get_mut("step").and_then(Value::as_object_mut) {
                        target.remove("id");
                    }
                }
            }
        }
    }
    for key in ["archived_step", "published_step", "scheduled_step"] {
        if let Some(step) = workflow.get_mut(key).and_then(Value::as_object_mut) {
            step.remove("id");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_request_skips_existing_and_maps_fallback() {
        let current = vec![json!({"id": DEFAULT_OBJECT_ID, "codename": "en", "name": "English"})];
        let existing = json!({"id": "l0", "codename": "en", "fallback_language": {"codename": "en"}});
        assert!(language_request(&current, &existing).unwrap().is_none());

        let german = json!({
            "id": "l1", "codename": "de", "name": "German", "is_active": true,
            "external_id": null, "fallback_language": {"codename": "en"}
        });
        assert_eq!(
            language_request(&current, &german).unwrap(),
            Some(json!({
                "codename": "de", "name": "German", "is_active": true,
                "fallback_language": {"codename": "en"}
            }))
        );

        let self_fallback = json!({"id": "l2", "codename": "fr", "name": "French", "fallback_language": {"codename": "fr"}});
        assert_eq!(
            language_request(&current, &self_fallback).unwrap().unwrap()["fallback_language"],
            json!({"id": DEFAULT_OBJECT_ID})
        );
    }

    #[test]
    fn mismatched_default_language_is_a_precondition_error() {
        let current = vec![json!({"id": DEFAULT_OBJECT_ID, "codename": "default"})];
        let source = json!({"id": DEFAULT_OBJECT_ID, "codename": "en-US", "fallback_language": {"codename": "en-US"}});
        let err = language_request(&current, &source).unwrap_err();
        assert!(matches!(err, BackupError::Precondition { .. }));
    }

    #[test]
    fn workflow_roles_and_ids_are_cleared() {
        let mut workflow = json!({
            "id": DEFAULT_OBJECT_ID, "codename": "default",
            "steps": [{"id": "s1", "codename": "draft", "role_ids": ["r1"],
                       "transitions_to": [{"step": {"id": "s2", "codename": "review"}}]}],
            "published_step": {"id": "p", "codename": "published", "unpublish_role_ids": ["r"], "create_new_version_role_ids": ["r"]},
            "archived_step": {"id": "a", "codename": "archived", "role_ids": ["r"]},
            "scheduled_step": {"id": "sc", "codename": "scheduled"}
        });
        clear_workflow_roles(&mut workflow);
        clear_workflow_step_ids(&mut workflow);
        assert_eq!(
            workflow,
            json!({
                "id": DEFAULT_OBJECT_ID, "codename": "default",
                "steps": [{"codename": "draft", "role_ids": [],
                           "transitions_to": [{"step": {"codename": "review"}}]}],
                "published_step": {"codename": "published", "unpublish_role_ids": [], "create_new_version_role_ids": []},
                "archived_step": {"codename": "archived", "role_ids": []},
                "scheduled_step": {"codename": "scheduled"}
            })
        );
    }

    #[test]
    fn folder_request_keeps_tree_shape() {
        let mut folders = vec![json!({
            "id": "f1", "name": "Images",
            "folders": [{"id": "f2", "name": "Logos", "folders": []}]
        })];
        stamp_folder_external_ids(&mut folders);
        assert_eq!(
            folder_request(&folders[0]),
            json!({
                "name": "Images", "external_id": "f1",
                "folders": [{"name": "Logos", "external_id": "f2", "folders": []}]
            })
        );
        let mut flat = Vec::new();
        flatten_folders(&folders, &mut flat);
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn step_codename_prefers_workflow_identifier() {
        let variant = json!({
            "workflow": {"step_identifier": {"codename": "review"}},
            "workflow_step": {"codename": "draft"}
        });
        assert_eq!(variant_step_codename(&variant), "review");
        assert_eq!(
            variant_step_codename(&json!({"workflow_step": {"codename": "draft"}})),
            "draft"
        );
    }
}
