use std::{
    io::{self, IsTerminal},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, Timelike};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use kbm::{
    archive::{ArchiveFileEntry, ArchiveReader, read_snapshot, write_archive},
    clean::{CleanConfig, CleanResult, CleanService},
    export::{ExportConfig, ExportService},
    import::{ImportConfig, ImportResult, ImportService, UnsupportedBinaryFile},
    progress::{ErrorPolicy, ProcessedItem},
    snapshot::{DataOverview, ItemKind, PackageMetadata},
};
use kontent::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

pub mod config;

use config::FileConfig;

#[derive(Parser, Debug)]
#[command(name = "kbm")]
#[command(author, version, about = "Kontent.ai backup, restore and clean tool", long_about = None)]
pub struct Cli {
    /// Management API base URL. Default: environment `KONTENT_URL` or <https://manage.kontent.ai/v2>
    #[arg(short = 'u', long, env = "KONTENT_URL", global = true)]
    pub url: Option<String>,

    /// Environment (project) id
    #[arg(short = 'p', long, env = "KONTENT_ENVIRONMENT_ID", global = true)]
    pub environment_id: Option<String>,

    /// Management API key
    #[arg(
        short = 'k',
        long,
        env = "KONTENT_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub api_key: Option<String>,

    /// Json config file. Default: `<config dir>/kbm/config.json`, if present
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable output where applicable
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose mode (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Color mode for CLI and log output
    #[arg(long, value_enum, default_value_t = ColorArg::Auto, global = true)]
    pub color: ColorArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export an environment to a backup archive
    Backup(BackupArgs),

    /// Import a backup archive into an environment
    Restore(RestoreArgs),

    /// Delete content and content model from an environment. Not reversible.
    Clean(CleanArgs),

    /// List archive contents
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Export only these kinds (comma-separated): taxonomy, contentType,
    /// contentTypeSnippet, contentItem, languageVariant, language, asset,
    /// assetFolder, binaryFile, workflow, webhook, collection
    #[arg(
        long,
        value_name = "KIND[,KIND,...]",
        value_delimiter = ',',
        value_parser = parse_item_kind
    )]
    pub types: Option<Vec<ItemKind>>,

    /// Skip the environment validation report
    #[arg(long)]
    pub skip_validation: bool,

    /// Parent directory where the archive will be created (default: current directory)
    #[arg(long, value_name = "DIR", conflicts_with = "dest")]
    pub dir: Option<PathBuf>,

    /// Output archive path to create
    #[arg(long, value_name = "PATH")]
    pub dest: Option<PathBuf>,

    /// Delay between asset binary downloads, in milliseconds (default 150)
    #[arg(long, value_name = "MS")]
    pub download_delay_ms: Option<u64>,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Archive path (directory or .zip)
    #[arg(value_name = "ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Import mode. all-or-nothing stops on first error but does not roll back prior imports.
    #[arg(long, value_enum, default_value_t = ImportModeArg::IgnoreErrors)]
    pub import_mode: ImportModeArg,

    /// Leave target languages as they are, instead of activating inactive ones
    /// and renaming the default language to match the archive
    #[arg(long)]
    pub no_fix_languages: bool,

    /// Leave variants in the first workflow step, instead of publishing,
    /// archiving, or moving each to the step it had in the source
    #[arg(long)]
    pub no_preserve_workflow: bool,

    /// Move every imported variant to this workflow step id
    #[arg(long, value_name = "STEP_ID")]
    pub workflow_step: Option<String>,

    /// Do not import these kinds (comma-separated)
    #[arg(
        long,
        value_name = "KIND[,KIND,...]",
        value_delimiter = ',',
        value_parser = parse_item_kind
    )]
    pub skip: Option<Vec<ItemKind>>,

    /// Refuse archives from an environment that reported data inconsistencies
    #[arg(long)]
    pub no_force: bool,

    /// Write detailed JSON import report to file
    #[arg(long, value_name = "REPORT_OUTPUT")]
    pub log: Option<PathBuf>,
}

impl RestoreArgs {
    /// Each option is on unless turned off by flag or, failing that, by the config file.
    fn fix_languages(&self, file_config: &FileConfig) -> bool {
        !self.no_fix_languages && file_config.fix_languages.unwrap_or(true)
    }

    fn preserve_workflow(&self, file_config: &FileConfig) -> bool {
        !self.no_preserve_workflow && file_config.preserve_workflow.unwrap_or(true)
    }

    fn force(&self, file_config: &FileConfig) -> bool {
        !self.no_force && file_config.force.unwrap_or(true)
    }
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Confirm deleting everything in the environment
    #[arg(long)]
    pub yes: bool,

    /// all-or-nothing stops on first error; deleted entities stay deleted.
    #[arg(long, value_enum, default_value_t = ImportModeArg::IgnoreErrors)]
    pub import_mode: ImportModeArg,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Archive path (directory or .zip)
    pub archive: PathBuf,

    /// Include file listing with sizes
    #[arg(long)]
    pub files: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ImportModeArg {
    AllOrNothing,
    IgnoreErrors,
}

impl ImportModeArg {
    fn error_policy(self) -> ErrorPolicy {
        match self {
            Self::AllOrNothing => ErrorPolicy::FailFast,
            Self::IgnoreErrors => ErrorPolicy::Continue,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}

fn parse_item_kind(value: &str) -> Result<ItemKind, String> {
    ItemKind::from_str(value.trim()).map_err(|_| format!("unknown kind '{value}'"))
}

pub struct AppContext {
    pub client: KontentClient,
    pub json: bool,
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

pub async fn run(cli: Cli) -> Result<()> {
    if let Commands::List(args) = &cli.command {
        return handle_list(cli.json, args);
    }

    let file_config = config::load(cli.config.as_deref())?;
    let ctx = AppContext {
        client: build_client(&cli, &file_config)?,
        json: cli.json,
    };

    match cli.command {
        Commands::Backup(args) => handle_backup(&ctx, args, &file_config).await,
        Commands::Restore(args) => handle_restore(&ctx, args, &file_config).await,
        Commands::Clean(args) => handle_clean(&ctx, &args).await,
        Commands::List(_) => Ok(()),
    }
}

fn build_client(cli: &Cli, file_config: &FileConfig) -> Result<KontentClient> {
    let mut config = ClientConfig::default();
    if let Some(url) = cli.url.as_ref().or(file_config.base_url.as_ref()) {
        config = config.base_url(url.as_str());
    }
    let environment_id = cli
        .environment_id
        .as_ref()
        .or(file_config.environment_id.as_ref())
        .filter(|id| !id.is_empty())
        .context(
            "environment id was not provided: use --environment-id, KONTENT_ENVIRONMENT_ID, or the config file",
        )?;
    let api_key = cli
        .api_key
        .as_ref()
        .or(file_config.api_key.as_ref())
        .filter(|key| !key.is_empty())
        .context("api key was not provided: use --api-key, KONTENT_API_KEY, or the config file")?;
    let config = config
        .environment_id(environment_id.as_str())
        .api_key(api_key.as_str());
    KontentClient::with_config(config).context("failed to create management api client")
}

#[derive(Debug, Serialize)]
struct BackupReport {
    archive: String,
    environment_id: String,
    is_inconsistent_export: bool,
    binary_files: usize,
    data_overview: DataOverview,
}

async fn handle_backup(ctx: &AppContext, args: BackupArgs, file_config: &FileConfig) -> Result<()> {
    let mut config = ExportConfig::default()
        .skip_validation(args.skip_validation || file_config.skip_validation.unwrap_or(false));
    if let Some(kinds) = args.types.or_else(|| file_config.export_filter.clone()) {
        config = config.filter(kinds);
    }
    if let Some(ms) = args.download_delay_ms.or(file_config.download_delay_ms) {
        config = config.download_delay(Duration::from_millis(ms));
    }
    let dest = backup_dest(args.dest, args.dir, file_config);

    let progress = ProgressReporter::new(ctx.json, "exporting");
    let result = ExportService::new(&ctx.client, config)
        .on_processed(|item| progress.processed("exported", item))
        .export()
        .await?;

    progress.set_message("writing archive");
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    write_archive(&dest, &result.snapshot, &result.binary_files)?;
    progress.finish("export complete");

    let metadata = &result.snapshot.metadata;
    if metadata.is_inconsistent_export {
        warn!("source environment reported type or variant issues; see validation.json in the archive");
    }
    let report = BackupReport {
        archive: dest.display().to_string(),
        environment_id: metadata.environment_id.clone(),
        is_inconsistent_export: metadata.is_inconsistent_export,
        binary_files: result.binary_files.len(),
        data_overview: metadata.data_overview.clone(),
    };
    if ctx.json {
        emit_json(&report)
    } else {
        println!("archive: {}", report.archive);
        print_overview(&report.data_overview);
        println!("binary files: {}", report.binary_files);
        if report.is_inconsistent_export {
            println!("warning: export contains data inconsistencies");
        }
        Ok(())
    }
}

fn backup_dest(dest: Option<PathBuf>, dir: Option<PathBuf>, file_config: &FileConfig) -> PathBuf {
    dest.or_else(|| dir.map(|dir| dir.join(default_backup_filename())))
        .or_else(|| file_config.zip_filename.clone())
        .unwrap_or_else(|| PathBuf::from(default_backup_filename()))
}

/// `kontent-backup-<day>-<month>-<year>-<hour>-<minute>.zip`, local time.
fn default_backup_filename() -> String {
    let now = Local::now();
    format!(
        "kontent-backup-{}-{}-{}-{}-{}.zip",
        now.day(),
        now.month(),
        now.year(),
        now.hour(),
        now.minute()
    )
}

async fn handle_restore(ctx: &AppContext, args: RestoreArgs, file_config: &FileConfig) -> Result<()> {
    let archive = args
        .archive
        .clone()
        .or_else(|| file_config.zip_filename.clone())
        .context("archive path was not provided")?;
    let reader = ArchiveReader::from_path(&archive)?;
    let snapshot = read_snapshot(&reader)?;

    if snapshot.metadata.is_inconsistent_export && !args.force(file_config) {
        let log_path = validation_log_path(&archive);
        let text = serde_json::to_string_pretty(&snapshot.validation)?;
        std::fs::write(&log_path, text)
            .with_context(|| format!("failed to write {}", log_path.display()))?;
        bail!(
            "archive was exported from an environment with data inconsistencies; issues written to {}. Drop --no-force to restore anyway",
            log_path.display()
        );
    }
    if snapshot.metadata.is_inconsistent_export {
        warn!("archive was exported from an environment with data inconsistencies, restoring anyway");
    }

    let mut config = ImportConfig::default()
        .fix_languages(args.fix_languages(file_config))
        .preserve_workflow(args.preserve_workflow(file_config))
        .error_policy(args.import_mode.error_policy());
    if let Some(step_id) = args.workflow_step {
        config = config.workflow_step_for_imported_items(step_id);
    }
    for kind in args.skip.unwrap_or_default() {
        config = config.can_import(kind, |_| false);
    }

    let metadata = snapshot.metadata.clone();
    let progress = ProgressReporter::new(ctx.json, "importing");
    let result = ImportService::new(&ctx.client, config)
        .on_processed(|item| progress.processed("imported", item))
        .on_unsupported_binary_file(|file| progress.unsupported(file))
        .import(snapshot, &reader)
        .await?;
    progress.finish("import complete");

    if let Some(path) = &args.log {
        let text = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, text)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }

    if ctx.json {
        emit_json(&result)?;
    } else {
        print_import_summary(&archive, &metadata, &result);
    }
    if !result.is_success() {
        warn!("import completed with failures");
    }
    Ok(())
}

/// `<archive stem>_log.json` next to the archive.
fn validation_log_path(archive: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map_or_else(|| "kontent-backup".to_string(), |s| s.to_string_lossy().to_string());
    archive.with_file_name(format!("{stem}_log.json"))
}

fn print_import_summary(archive: &Path, metadata: &PackageMetadata, result: &ImportResult) {
    info!(
        imported = result.imported.len(),
        failed = result.failures.len(),
        "import summary"
    );
    println!("archive: {}", archive.display());
    println!(
        "source environment: {} ({})",
        metadata.environment_id,
        metadata.timestamp.to_rfc3339()
    );
    println!(
        "imported {} entities (failed: {})",
        result.imported.len(),
        result.failures.len()
    );
    for failure in &result.failures {
        println!("- {} '{}': {}", failure.kind, failure.title, failure.message);
        for message in &failure.validation_errors {
            println!("    {message}");
        }
    }
    for file in &result.unsupported_binary_files {
        println!(
            "- asset '{}' imported without binary ({} bytes is over the size limit)",
            file.file_name, file.size
        );
    }
    if !result.unresolved_references.is_empty() {
        println!(
            "unresolved references: {}",
            result.unresolved_references.join(", ")
        );
    }
}

async fn handle_clean(ctx: &AppContext, args: &CleanArgs) -> Result<()> {
    if !args.yes {
        bail!(
            "clean deletes all content items, types, snippets, taxonomies, assets and workflows in environment {}; rerun with --yes to confirm",
            ctx.client.environment_id()
        );
    }
    let progress = ProgressReporter::new(ctx.json, "cleaning");
    let result = CleanService::new(
        &ctx.client,
        CleanConfig::default().error_policy(args.import_mode.error_policy()),
    )
    .on_processed(|item| progress.processed("deleted", item))
    .clean()
    .await?;
    progress.finish("clean complete");

    if ctx.json {
        emit_json(&result)
    } else {
        print_clean_summary(&result);
        Ok(())
    }
}

fn print_clean_summary(result: &CleanResult) {
    println!(
        "environment {}: deleted {} entities (failed: {})",
        result.environment_id,
        result.deleted,
        result.failures.len()
    );
    for failure in &result.failures {
        println!("- {} '{}': {}", failure.kind, failure.title, failure.message);
    }
}

#[derive(Debug, Clone, Serialize)]
struct ListReport {
    archive: String,
    source: String,
    file_count: usize,
    total_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<PackageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<ArchiveFileEntry>>,
}

fn handle_list(json: bool, args: &ListArgs) -> Result<()> {
    let reader = ArchiveReader::from_path(&args.archive)?;
    let files = reader.list_files()?;
    let (metadata, metadata_error) = match read_snapshot(&reader) {
        Ok(snapshot) => (Some(snapshot.metadata), None),
        Err(err) => (None, Some(format!("{err:#}"))),
    };
    let report = ListReport {
        archive: args.archive.display().to_string(),
        source: reader.source().as_str().to_string(),
        file_count: files.len(),
        total_bytes: files.iter().map(|f| f.bytes).sum(),
        metadata,
        metadata_error,
        files: args.files.then_some(files),
    };

    if json {
        return emit_json(&report);
    }
    println!("archive: {} ({})", report.archive, report.source);
    if let Some(metadata) = &report.metadata {
        println!("environment: {}", metadata.environment_id);
        println!("created: {}", metadata.timestamp.to_rfc3339());
        println!("version: {}", metadata.version);
        if metadata.is_inconsistent_export {
            println!("inconsistent export: yes");
        }
        print_overview(&metadata.data_overview);
    } else if let Some(err) = &report.metadata_error {
        println!("metadata: unreadable ({err})");
    }
    println!("files: {} ({} bytes)", report.file_count, report.total_bytes);
    if let Some(files) = &report.files {
        for file in files {
            println!("{:>12}  {}", file.bytes, file.path);
        }
    }
    Ok(())
}

fn print_overview(overview: &DataOverview) {
    for (label, count) in [
        ("languages", overview.languages_count),
        ("taxonomies", overview.taxonomies_count),
        ("content type snippets", overview.content_type_snippets_count),
        ("content types", overview.content_types_count),
        ("workflows", overview.workflows_count),
        ("asset folders", overview.asset_folders_count),
        ("assets", overview.assets_count),
        ("content items", overview.content_items_count),
        ("language variants", overview.language_variants_count),
        ("webhooks", overview.webhooks_count),
        ("collections", overview.collections_count),
    ] {
        println!("{label}: {count}");
    }
}

fn progress_enabled(json: bool, stderr_is_tty: bool) -> bool {
    !json && stderr_is_tty
}

struct ProgressReporter {
    bar: Option<ProgressBar>,
    json: bool,
}

impl ProgressReporter {
    fn new(json: bool, message: &str) -> Self {
        let enabled = progress_enabled(json, io::stderr().is_terminal());
        if enabled {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(120));
            bar.set_message(message.to_string());
            Self {
                bar: Some(bar),
                json,
            }
        } else {
            Self { bar: None, json }
        }
    }

    fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    fn processed(&self, verb: &str, item: &ProcessedItem) {
        let line = format!("{verb} {} ({})", item.title, item.kind);
        match &self.bar {
            Some(bar) => bar.set_message(line),
            None if !self.json => eprintln!("{line}"),
            None => {}
        }
    }

    fn unsupported(&self, file: &UnsupportedBinaryFile) {
        let line = format!(
            "asset '{}' is {} bytes; imported without its binary",
            file.file_name, file.size
        );
        match &self.bar {
            Some(bar) => bar.println(line),
            None => warn!("{line}"),
        }
    }

    fn finish(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn parse_backup_with_filter() {
        let cli = parse(&[
            "kbm",
            "--environment-id",
            "env",
            "backup",
            "--types",
            "contentType,taxonomy",
            "--skip-validation",
        ]);
        let Commands::Backup(args) = cli.command else {
            panic!("expected backup command");
        };
        assert_eq!(
            args.types,
            Some(vec![ItemKind::ContentType, ItemKind::Taxonomy])
        );
        assert!(args.skip_validation);
        assert_eq!(cli.environment_id.as_deref(), Some("env"));
    }

    #[test]
    fn parse_backup_rejects_unknown_kind() {
        let err = Cli::try_parse_from(["kbm", "backup", "--types", "widgets"]).unwrap_err();
        assert!(err.to_string().contains("unknown kind 'widgets'"));
    }

    #[test]
    fn dest_and_dir_conflict() {
        assert!(
            Cli::try_parse_from(["kbm", "backup", "--dest", "a.zip", "--dir", "out"]).is_err()
        );
    }

    #[test]
    fn parse_restore_options() {
        let cli = parse(&[
            "kbm",
            "restore",
            "backup.zip",
            "--import-mode",
            "all-or-nothing",
            "--no-preserve-workflow",
            "--skip",
            "webhook,collection",
        ]);
        let Commands::Restore(args) = cli.command else {
            panic!("expected restore command");
        };
        assert_eq!(args.archive, Some(PathBuf::from("backup.zip")));
        assert_eq!(args.import_mode.error_policy(), ErrorPolicy::FailFast);
        let file_config = FileConfig::default();
        assert!(!args.preserve_workflow(&file_config));
        assert!(args.fix_languages(&file_config));
        assert_eq!(
            args.skip,
            Some(vec![ItemKind::Webhook, ItemKind::Collection])
        );
    }

    #[test]
    fn restore_defaults_to_ignore_errors() {
        let cli = parse(&["kbm", "restore", "b.zip"]);
        let Commands::Restore(args) = cli.command else {
            panic!("expected restore command");
        };
        assert_eq!(args.import_mode.error_policy(), ErrorPolicy::Continue);
        let file_config = FileConfig::default();
        assert!(args.fix_languages(&file_config));
        assert!(args.preserve_workflow(&file_config));
        assert!(args.force(&file_config));
    }

    #[test]
    fn restore_options_from_config_file() {
        let file_config = FileConfig {
            fix_languages: Some(false),
            force: Some(false),
            ..FileConfig::default()
        };
        let cli = parse(&["kbm", "restore", "b.zip", "--no-preserve-workflow"]);
        let Commands::Restore(args) = cli.command else {
            panic!("expected restore command");
        };
        assert!(!args.fix_languages(&file_config));
        assert!(!args.force(&file_config));
        assert!(!args.preserve_workflow(&file_config));

        let cli = parse(&["kbm", "restore", "b.zip", "--no-force"]);
        let Commands::Restore(args) = cli.command else {
            panic!("expected restore command");
        };
        assert!(!args.force(&FileConfig::default()));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["kbm", "clean", "--yes", "--json", "-vv", "--color", "never"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.color, ColorArg::Never);
        assert!(matches!(cli.command, Commands::Clean(CleanArgs { yes: true, .. })));
    }

    #[test]
    fn default_backup_filename_shape() {
        let name = default_backup_filename();
        assert!(name.starts_with("kontent-backup-"));
        assert!(name.ends_with(".zip"));
        assert_eq!(name.matches('-').count(), 6);
    }

    #[test]
    fn backup_dest_precedence() {
        let file_config = FileConfig {
            zip_filename: Some(PathBuf::from("from-config.zip")),
            ..FileConfig::default()
        };
        assert_eq!(
            backup_dest(Some(PathBuf::from("x.zip")), None, &file_config),
            PathBuf::from("x.zip")
        );
        assert!(
            backup_dest(None, Some(PathBuf::from("out")), &file_config).starts_with("out")
        );
        assert_eq!(
            backup_dest(None, None, &file_config),
            PathBuf::from("from-config.zip")
        );
    }

    #[test]
    fn validation_log_next_to_archive() {
        assert_eq!(
            validation_log_path(Path::new("dir/backup.zip")),
            PathBuf::from("dir/backup_log.json")
        );
    }

    #[test]
    fn progress_is_disabled_for_json_output() {
        assert!(!progress_enabled(true, true));
        assert!(!progress_enabled(false, false));
        assert!(progress_enabled(false, true));
    }
}
