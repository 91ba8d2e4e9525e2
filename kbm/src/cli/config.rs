//! Optional json config file. Values fill in whatever the command line and
//! environment leave unset.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kbm::snapshot::ItemKind;
use serde::Deserialize;

const CONFIG_DIR: &str = "kbm";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    /// Older config files call it `projectId`.
    #[serde(alias = "projectId")]
    pub environment_id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Archive path used by `backup` and `restore` when none is given
    pub zip_filename: Option<PathBuf>,
    pub preserve_workflow: Option<bool>,
    pub fix_languages: Option<bool>,
    pub force: Option<bool>,
    pub skip_validation: Option<bool>,
    pub export_filter: Option<Vec<ItemKind>>,
    pub download_delay_ms: Option<u64>,
}

/// Default location: `<config dir>/kbm/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Loads the config file named by `--config`, or the default one if it
/// exists. An explicit path that can't be read is an error; a missing default
/// file is not.
pub fn load(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.is_file() => path,
            _ => return Ok(FileConfig::default()),
        },
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse(&text).with_context(|| format!("invalid config file {}", path.display()))
}

fn parse(text: &str) -> Result<FileConfig> {
    let de = &mut serde_json::Deserializer::from_str(text);
    let config = serde_path_to_error::deserialize(de)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_camel_case_keys() {
        let config = parse(
            r#"{
                "projectId": "p1",
                "apiKey": "k",
                "zipFilename": "backup.zip",
                "preserveWorkflow": true,
                "exportFilter": ["contentType", "taxonomy"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.environment_id.as_deref(), Some("p1"));
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.zip_filename, Some(PathBuf::from("backup.zip")));
        assert_eq!(config.preserve_workflow, Some(true));
        assert_eq!(
            config.export_filter,
            Some(vec![ItemKind::ContentType, ItemKind::Taxonomy])
        );
    }

    #[test]
    fn unknown_key_reports_path() {
        let err = parse(r#"{"environmentId": "e", "apikey": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("apikey"), "unexpected error: {err:#}");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"environmentId": "env-1", "downloadDelayMs": 0}}"#).unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.environment_id.as_deref(), Some("env-1"));
        assert_eq!(config.download_delay_ms, Some(0));
    }
}
