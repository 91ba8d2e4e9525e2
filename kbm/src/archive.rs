//! # Archive
//!
//! A backup is a zip of named json documents, one per record kind plus
//! `metadata.json` and `validation.json`, with asset binaries under
//! `files/<first 3 chars of asset id>/<asset id>/<file name>`.
//! [`ArchiveReader`] also reads an unpacked archive directory.

use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::{
    api::BinaryProvider,
    error::BackupError,
    snapshot::{BinaryFile, ItemKind, PackageMetadata, Snapshot, SnapshotData},
};

pub const METADATA_FILE: &str = "metadata.json";
pub const VALIDATION_FILE: &str = "validation.json";
pub const FILES_DIR: &str = "files";

/// Archive document holding the records of `kind`. Binary files have no document.
pub fn document_name(kind: ItemKind) -> Option<&'static str> {
    Some(match kind {
        ItemKind::ContentType => "contentTypes.json",
        ItemKind::ContentTypeSnippet => "contentTypesSnippets.json",
        ItemKind::Taxonomy => "taxonomies.json",
        ItemKind::ContentItem => "contentItems.json",
        ItemKind::LanguageVariant => "languageVariants.json",
        ItemKind::Language => "languages.json",
        ItemKind::Asset => "assets.json",
        ItemKind::AssetFolder => "assetFolders.json",
        ItemKind::Workflow => "workflows.json",
        ItemKind::Webhook => "webhooks.json",
        ItemKind::Collection => "collections.json",
        ItemKind::BinaryFile => return None,
    })
}

/// Documents written by every version of the tool. The rest may be absent
/// from older archives and read as empty.
const REQUIRED_KINDS: [ItemKind; 7] = [
    ItemKind::ContentType,
    ItemKind::ContentTypeSnippet,
    ItemKind::Taxonomy,
    ItemKind::ContentItem,
    ItemKind::LanguageVariant,
    ItemKind::Language,
    ItemKind::Asset,
];

/// Archive path of an asset binary. Ids shorter than three characters are
/// used whole as the shard.
pub fn binary_file_path(asset_id: &str, file_name: &str) -> String {
    let shard = asset_id.get(..3).unwrap_or(asset_id);
    format!("{FILES_DIR}/{shard}/{asset_id}/{file_name}")
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveFileEntry {
    pub path: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveSourceKind {
    Directory,
    Zip,
}

impl ArchiveSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Zip => "zip",
        }
    }
}

#[derive(Clone)]
pub struct ArchiveReader {
    root: PathBuf,
    source: ArchiveSourceKind,
    zip: Option<ZipReaderState>,
}

#[derive(Clone)]
struct ZipReaderState {
    archive: Arc<Mutex<ZipArchive<fs::File>>>,
    files: Arc<Vec<ArchiveFileEntry>>,
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("root", &self.root)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl ArchiveReader {
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self {
                root: path.to_path_buf(),
                source: ArchiveSourceKind::Directory,
                zip: None,
            });
        }
        if path.is_file() {
            let file = fs::File::open(path)
                .with_context(|| format!("failed to open archive file {}", path.display()))?;
            if let Ok(mut zip) = ZipArchive::new(file) {
                let mut files = Vec::new();
                for idx in 0..zip.len() {
                    let entry = zip.by_index(idx)?;
                    if entry.is_dir() {
                        continue;
                    }
                    files.push(ArchiveFileEntry {
                        path: entry.name().to_string(),
                        bytes: entry.size(),
                    });
                }
                files.sort_by(|a, b| a.path.cmp(&b.path));
                return Ok(Self {
                    root: path.to_path_buf(),
                    source: ArchiveSourceKind::Zip,
                    zip: Some(ZipReaderState {
                        archive: Arc::new(Mutex::new(zip)),
                        files: Arc::new(files),
                    }),
                });
            }
        }
        Err(anyhow!(
            "archive must be a directory or zip file: {}",
            path.display()
        ))
    }

    pub fn source(&self) -> ArchiveSourceKind {
        self.source
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn list_files(&self) -> Result<Vec<ArchiveFileEntry>> {
        match self.source {
            ArchiveSourceKind::Directory => {
                let mut entries = Vec::new();
                let mut stack = vec![self.root.clone()];
                while let Some(dir) = stack.pop() {
                    for entry in fs::read_dir(&dir)? {
                        let entry = entry?;
                        let path = entry.path();
                        if path.is_dir() {
                            stack.push(path);
                            continue;
                        }
                        let rel = path.strip_prefix(&self.root).with_context(|| {
                            format!("archive file not under root: {}", path.display())
                        })?;
                        let meta = entry.metadata()?;
                        // zip entry names always use '/'
                        let rel = rel
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        entries.push(ArchiveFileEntry {
                            path: rel,
                            bytes: meta.len(),
                        });
                    }
                }
                entries.sort_by(|a, b| a.path.cmp(&b.path));
                Ok(entries)
            }
            ArchiveSourceKind::Zip => {
                let state = self.zip_state()?;
                Ok(state.files.as_ref().clone())
            }
        }
    }

    pub fn read_bytes(&self, rel_path: &str) -> Result<Vec<u8>> {
        self.read_bytes_if_exists(rel_path)?
            .ok_or_else(|| anyhow!("archive entry not found: {rel_path}"))
    }

    pub fn read_bytes_if_exists(&self, rel_path: &str) -> Result<Option<Vec<u8>>> {
        match self.source {
            ArchiveSourceKind::Directory => {
                let path = self.root.join(rel_path);
                if !path.is_file() {
                    return Ok(None);
                }
                let bytes = fs::read(&path)
                    .with_context(|| format!("failed to read archive file {}", path.display()))?;
                Ok(Some(bytes))
            }
            ArchiveSourceKind::Zip => {
                let state = self.zip_state()?;
                let mut zip = state
                    .archive
                    .lock()
                    .map_err(|_| anyhow!("zip archive lock poisoned"))?;
                let Ok(mut entry) = zip.by_name(rel_path) else {
                    return Ok(None);
                };
                let mut out = Vec::new();
                entry
                    .read_to_end(&mut out)
                    .with_context(|| format!("failed to read zip entry {rel_path}"))?;
                drop(entry);
                drop(zip);
                Ok(Some(out))
            }
        }
    }

    /// Parses a json document, or returns `None` if the archive does not have it.
    pub fn read_json_if_exists<T: DeserializeOwned>(&self, rel_path: &str) -> Result<Option<T>> {
        let Some(bytes) = self.read_bytes_if_exists(rel_path)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("invalid json in archive document {rel_path}"))?;
        Ok(Some(value))
    }

    fn zip_state(&self) -> Result<&ZipReaderState> {
        self.zip
            .as_ref()
            .ok_or_else(|| anyhow!("zip archive state unavailable"))
    }
}

impl BinaryProvider for ArchiveReader {
    fn load(&self, asset_id: &str, file_name: &str) -> Result<Bytes, BackupError> {
        let path = binary_file_path(asset_id, file_name);
        match self.read_bytes_if_exists(&path) {
            Ok(Some(bytes)) => Ok(Bytes::from(bytes)),
            Ok(None) => Err(BackupError::Archive {
                message: format!("binary file not found: {path}"),
            }),
            Err(err) => Err(BackupError::Archive {
                message: format!("{err:#}"),
            }),
        }
    }
}

/// Reads every document of an archive into a [`Snapshot`].
pub fn read_snapshot(reader: &ArchiveReader) -> Result<Snapshot> {
    let metadata: PackageMetadata = reader
        .read_json_if_exists(METADATA_FILE)?
        .ok_or_else(|| anyhow!("{METADATA_FILE} missing from {}", reader.path().display()))?;
    let validation: Value = reader
        .read_json_if_exists(VALIDATION_FILE)?
        .unwrap_or(Value::Null);

    let mut data = SnapshotData::default();
    for kind in <ItemKind as strum::IntoEnumIterator>::iter() {
        let (Some(name), Some(records)) = (document_name(kind), data.records_mut(kind)) else {
            continue;
        };
        match reader.read_json_if_exists::<Vec<Value>>(name)? {
            Some(found) => *records = found,
            None if REQUIRED_KINDS.contains(&kind) => {
                return Err(anyhow!("{name} missing from {}", reader.path().display()));
            }
            None => debug!(document = name, "not in archive, reading as empty"),
        }
    }
    Ok(Snapshot {
        metadata,
        validation,
        data,
    })
}

/// Writes a snapshot and its binaries as a deflate zip at `path`.
pub fn write_archive(path: &Path, snapshot: &Snapshot, binaries: &[BinaryFile]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create archive {}", path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for kind in <ItemKind as strum::IntoEnumIterator>::iter() {
        if let Some(name) = document_name(kind) {
            write_json(&mut writer, options, name, snapshot.data.records(kind))?;
        }
    }
    write_json(&mut writer, options, METADATA_FILE, &snapshot.metadata)?;
    write_json(&mut writer, options, VALIDATION_FILE, &snapshot.validation)?;

    for binary in binaries {
        let name = binary_file_path(&binary.asset_id, &binary.file_name);
        writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("failed to add {name}"))?;
        writer
            .write_all(&binary.data)
            .with_context(|| format!("failed to write {name}"))?;
    }
    writer
        .finish()
        .with_context(|| format!("failed to finish archive {}", path.display()))?;
    Ok(())
}

fn write_json<W, T>(writer: &mut ZipWriter<W>, options: SimpleFileOptions, name: &str, value: &T) -> Result<()>
where
    W: Write + std::io::Seek,
    T: Serialize + ?Sized,
{
    writer
        .start_file(name, options)
        .with_context(|| format!("failed to add {name}"))?;
    serde_json::to_writer(&mut *writer, value).with_context(|| format!("failed to write {name}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::snapshot::DataOverview;

    fn sample_snapshot() -> Snapshot {
        let data = SnapshotData {
            taxonomies: vec![json!({"id": "t1", "codename": "topics", "terms": []})],
            assets: vec![json!({"id": "abcdef", "file_name": "logo.png"})],
            ..Default::default()
        };
        Snapshot {
            metadata: PackageMetadata {
                version: "0.4.0".into(),
                environment_id: "env-1".into(),
                timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap(),
                is_inconsistent_export: false,
                data_overview: data.data_overview(),
            },
            validation: json!({"type_issues": [], "variant_issues": []}),
            data,
        }
    }

    #[test]
    fn binary_paths_are_sharded() {
        assert_eq!(binary_file_path("abcdef", "a.png"), "files/abc/abcdef/a.png");
        assert_eq!(binary_file_path("ab", "a.png"), "files/ab/ab/a.png");
    }

    #[test]
    fn written_archive_reads_back() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("backup.zip");
        let snapshot = sample_snapshot();
        let binaries = vec![BinaryFile {
            asset_id: "abcdef".into(),
            file_name: "logo.png".into(),
            data: Bytes::from_static(b"png"),
        }];
        write_archive(&path, &snapshot, &binaries).unwrap();

        let reader = ArchiveReader::from_path(&path).unwrap();
        assert_eq!(reader.source(), ArchiveSourceKind::Zip);
        let files = reader.list_files().unwrap();
        assert!(files.iter().any(|f| f.path == "contentTypesSnippets.json"));
        assert!(files.iter().any(|f| f.path == "files/abc/abcdef/logo.png" && f.bytes == 3));

        let read = read_snapshot(&reader).unwrap();
        assert_eq!(read, snapshot);
        assert_eq!(read.metadata.data_overview.taxonomies_count, 1);
        assert_eq!(reader.load("abcdef", "logo.png").unwrap(), Bytes::from_static(b"png"));
        assert!(reader.load("abcdef", "missing.png").is_err());
    }

    #[test]
    fn directory_archive_without_optional_documents() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        for kind in REQUIRED_KINDS {
            fs::write(root.join(document_name(kind).unwrap()), b"[]").unwrap();
        }
        fs::write(
            root.join(METADATA_FILE),
            br#"{"version":"0.3.0","projectId":"p1","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        fs::create_dir_all(root.join("files/xyz/xyz1")).unwrap();
        fs::write(root.join("files/xyz/xyz1/a.txt"), b"hi").unwrap();

        let reader = ArchiveReader::from_path(root).unwrap();
        assert_eq!(reader.source(), ArchiveSourceKind::Directory);
        let snapshot = read_snapshot(&reader).unwrap();
        assert_eq!(snapshot.metadata.environment_id, "p1");
        assert!(snapshot.data.workflows.is_empty());
        assert_eq!(snapshot.validation, Value::Null);
        assert_eq!(snapshot.metadata.data_overview, DataOverview::default());
        assert_eq!(reader.load("xyz1", "a.txt").unwrap(), Bytes::from_static(b"hi"));
        assert!(
            reader
                .list_files()
                .unwrap()
                .iter()
                .any(|f| f.path == "files/xyz/xyz1/a.txt")
        );
    }

    #[test]
    fn missing_required_document_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(METADATA_FILE),
            br#"{"version":"0.3.0","environmentId":"p1","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let reader = ArchiveReader::from_path(temp.path()).unwrap();
        let err = read_snapshot(&reader).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
