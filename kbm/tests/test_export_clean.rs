//! Export and clean services against the in-memory management api, and a
//! backup written to disk and restored into a second environment.

mod common;

use std::time::Duration;

use bytes::Bytes;
use common::{FakeApi, TARGET_ENV, default_language, default_workflow};
use kbm::{
    archive::{ArchiveReader, read_snapshot, write_archive},
    clean::{CleanConfig, CleanService},
    export::{ExportConfig, ExportService},
    import::{ImportConfig, ImportService},
    progress::ErrorPolicy,
    snapshot::ItemKind,
};
use kontent::prelude::*;
use serde_json::json;

fn source() -> FakeApi {
    let api = FakeApi::new()
        .with_records(Collection::Languages, vec![default_language()])
        .with_records(
            Collection::Taxonomies,
            vec![json!({"id": "tax-1", "name": "Topics", "codename": "topics", "terms": []})],
        )
        .with_records(
            Collection::ContentTypes,
            vec![json!({
                "id": "type-1", "name": "Article", "codename": "article",
                "elements": [
                    {"id": "el-title", "name": "Title", "codename": "title", "type": "text"},
                    {"id": "el-image", "name": "Image", "codename": "image", "type": "asset"}
                ]
            })],
        )
        .with_records(Collection::Workflows, vec![default_workflow()])
        .with_records(
            Collection::Assets,
            vec![json!({
                "id": "asset-1", "file_name": "logo.png", "title": "Logo", "type": "image/png",
                "size": 4, "url": "https://assets.example/logo.png"
            })],
        )
        .with_records(
            Collection::ContentItems,
            vec![json!({"id": "item-1", "name": "Home", "codename": "home", "type": {"id": "type-1"}})],
        );
    {
        let mut state = api.state.lock();
        state.variants = vec![json!({
            "item": {"id": "item-1"},
            "language": {"id": DEFAULT_OBJECT_ID},
            "elements": [
                {"element": {"id": "el-title"}, "value": "Hello"},
                {"element": {"id": "el-image"}, "value": [{"id": "asset-1"}]}
            ],
            "workflow": {
                "workflow_identifier": {"id": DEFAULT_OBJECT_ID},
                "step_identifier": {"id": "step-draft"}
            }
        })];
        state.folders = vec![json!({"id": "folder-1", "name": "Images", "folders": []})];
        state.validation = json!({"project": {}, "type_issues": [], "variant_issues": []});
        state
            .downloads
            .insert("https://assets.example/logo.png".into(), Bytes::from_static(b"\x89PNG"));
    }
    api
}

fn no_delay() -> ExportConfig {
    ExportConfig::default().download_delay(Duration::ZERO)
}

#[test_log::test(tokio::test)]
async fn export_reads_everything() {
    let api = source();
    let result = ExportService::new(&api, no_delay()).export().await.unwrap();
    let snapshot = &result.snapshot;

    assert_eq!(snapshot.metadata.environment_id, TARGET_ENV);
    assert!(!snapshot.metadata.is_inconsistent_export);
    assert_eq!(snapshot.data.content_types.len(), 1);
    assert_eq!(snapshot.data.content_items.len(), 1);
    assert_eq!(snapshot.data.language_variants.len(), 1);
    assert_eq!(snapshot.data.asset_folders.len(), 1);
    assert_eq!(snapshot.metadata.data_overview.assets_count, 1);
    assert_eq!(snapshot.metadata.data_overview.workflows_count, 1);
    assert_eq!(result.binary_files.len(), 1);
    assert_eq!(result.binary_files[0].asset_id, "asset-1");
    assert_eq!(result.binary_files[0].data, Bytes::from_static(b"\x89PNG"));
    assert_eq!(api.calls_with("list_variants"), vec!["list_variants item-1"]);
}

#[test_log::test(tokio::test)]
async fn validation_issues_mark_export_inconsistent() {
    let api = source();
    api.state.lock().validation = json!({"type_issues": [{"type": {"id": "type-1"}}], "variant_issues": []});
    let result = ExportService::new(&api, no_delay()).export().await.unwrap();
    assert!(result.snapshot.metadata.is_inconsistent_export);
    assert_eq!(result.snapshot.validation["type_issues"].as_array().unwrap().len(), 1);
}

#[test_log::test(tokio::test)]
async fn export_filter_and_skipped_validation() {
    let api = source();
    let config = no_delay()
        .filter([ItemKind::ContentType, ItemKind::Taxonomy])
        .skip_validation(true);
    let result = ExportService::new(&api, config).export().await.unwrap();

    assert!(result.snapshot.validation.is_null());
    assert!(api.calls_with("validate").is_empty());
    assert_eq!(result.snapshot.data.content_types.len(), 1);
    assert_eq!(result.snapshot.data.taxonomies.len(), 1);
    assert!(result.snapshot.data.assets.is_empty());
    assert!(result.snapshot.data.content_items.is_empty());
    assert!(result.binary_files.is_empty());
    assert!(api.calls_with("download").is_empty());
    assert!(api.calls_with("list_variants").is_empty());
}

#[test_log::test(tokio::test)]
async fn export_counts_processed_records() {
    let api = source();
    let count = std::sync::atomic::AtomicUsize::new(0);
    ExportService::new(&api, no_delay())
        .on_processed(|_| {
            count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
        .export()
        .await
        .unwrap();
    // 1 language, taxonomy, type, workflow, asset, item, variant, folder, binary
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 9);
}

#[test_log::test(tokio::test)]
async fn failed_download_aborts_export() {
    let api = source();
    api.state.lock().downloads.clear();
    let err = ExportService::new(&api, no_delay()).export().await.unwrap_err();
    assert!(err.to_string().contains("logo.png"), "{err}");
}

#[test_log::test(tokio::test)]
async fn backup_restores_into_another_environment() {
    let source_api = source();
    let exported = ExportService::new(&source_api, no_delay())
        .export()
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.zip");
    write_archive(&path, &exported.snapshot, &exported.binary_files).unwrap();

    let reader = ArchiveReader::from_path(&path).unwrap();
    let snapshot = read_snapshot(&reader).unwrap();
    assert_eq!(snapshot, exported.snapshot);

    let target = FakeApi::new().with_records(
        Collection::Languages,
        vec![json!({"id": DEFAULT_OBJECT_ID, "name": "English", "codename": "en", "is_active": true})],
    );
    let result = ImportService::new(&target, ImportConfig::default())
        .import(snapshot, &reader)
        .await
        .unwrap();
    assert!(result.is_success(), "failures: {:?}", result.failures);
    assert!(result.unresolved_references.is_empty());

    let uploads = target.state.lock().uploads.clone();
    assert_eq!(uploads, vec![("logo.png".to_string(), 4)]);
    let new_asset_id = target.created(Collection::Assets)[0]["id"].clone();
    let variant = &target.variants()[0];
    assert_eq!(variant["item"]["codename"], "home");
    assert_eq!(variant["elements"][0]["element"], json!({"codename": "title"}));
    assert_eq!(variant["elements"][1]["value"], json!([{"id": new_asset_id}]));
    assert_eq!(target.calls_with("add_folders"), vec!["add_folders 1"]);
}

fn populated() -> FakeApi {
    let api = source()
        .with_records(
            Collection::ContentTypeSnippets,
            vec![json!({"id": "snip-1", "name": "SEO", "codename": "seo"})],
        )
        .with_records(
            Collection::Workflows,
            vec![
                default_workflow(),
                json!({"id": "wf-2", "name": "Review", "codename": "review"}),
            ],
        );
    api.state.lock().folders = vec![
        json!({"id": "folder-1", "name": "Images", "folders": [{"id": "folder-3", "name": "Icons"}]}),
        json!({"id": "folder-2", "name": "Docs", "folders": []}),
    ];
    api
}

#[test_log::test(tokio::test)]
async fn clean_deletes_in_order_and_keeps_default_workflow() {
    let api = populated();
    let result = CleanService::new(&api, CleanConfig::default())
        .clean()
        .await
        .unwrap();

    assert_eq!(result.environment_id, TARGET_ENV);
    assert!(result.failures.is_empty());
    let deletes: Vec<String> = api
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("delete") || call.starts_with("remove_folders"))
        .collect();
    assert_eq!(
        deletes,
        vec![
            "delete content_items item-1",
            "delete content_types type-1",
            "delete content_type_snippets snip-1",
            "delete taxonomies tax-1",
            "delete assets asset-1",
            "remove_folders folder-1,folder-2",
            "delete workflows wf-2",
        ]
    );
    // 6 deletes plus two top-level folders
    assert_eq!(result.deleted, 8);
    assert_eq!(api.created(Collection::Workflows).len(), 1);
    assert!(api.created(Collection::Languages).len() == 1);
}

#[test_log::test(tokio::test)]
async fn clean_continues_past_failures() {
    let api = populated();
    api.reject("type-1");
    let result = CleanService::new(&api, CleanConfig::default())
        .clean()
        .await
        .unwrap();

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].title, "Article");
    assert!(api.calls().contains(&"delete workflows wf-2".to_string()));
}

#[test_log::test(tokio::test)]
async fn clean_fail_fast_stops() {
    let api = populated();
    api.reject("type-1");
    let err = CleanService::new(
        &api,
        CleanConfig::default().error_policy(ErrorPolicy::FailFast),
    )
    .clean()
    .await
    .unwrap_err();

    assert!(err.to_string().contains("Article"), "{err}");
    assert!(api.calls_with("delete taxonomies").is_empty());
}
