use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use host_engine::{default_exporter, HostDocument, MemoryDocument, SystemZipArchiver};
use layer_model::ExportConfig;
use layerkit_core::import::{self, OutlineEntry};
use layerkit_core::{
    count_layers, reconstruct, CancellationToken, FontTable, ImportOptions, LogProgress,
    NoProgress, RunStatus,
};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use storage::Storage;

mod overrides;

pub use overrides::ExportFlags;

const DEFAULT_FONT: &str = "default";

#[derive(Debug, Parser)]
#[command(name = "layerkit")]
#[command(about = "Export layered documents to images and manifests")]
pub struct Cli {
    /// More log output (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Directory holding the stored export settings.
    #[arg(long, global = true, env = "LAYERKIT_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Count exportable layers in a document.
    Count {
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,
    },
    /// Export every layer of a document.
    Export {
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,
        #[command(flatten)]
        flags: ExportFlags,
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the layer outline of an engine manifest.
    Inspect {
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },
    /// Rebuild a UI tree from an engine manifest.
    Import {
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
        /// Create live text nodes for text layers.
        #[arg(long)]
        text: bool,
        /// Font assignment, repeatable.
        #[arg(long = "font", value_name = "NAME=ASSET", value_parser = parse_font)]
        fonts: Vec<(String, String)>,
        #[arg(long, value_name = "ASSET", default_value = DEFAULT_FONT)]
        default_font: String,
        #[arg(long)]
        text_scale: Option<f64>,
        /// Include the rebuilt tree outline.
        #[arg(long)]
        tree: bool,
    },
    /// Manage stored export settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the stored settings.
    Show,
    /// Store settings built from the given flags.
    Save {
        #[command(flatten)]
        flags: ExportFlags,
    },
    /// Remove the stored settings.
    Reset,
    /// Print the settings file location.
    Path,
}

#[derive(Debug, Serialize)]
struct CountOutput<'a> {
    document: &'a str,
    total: usize,
    visible: usize,
}

#[derive(Debug, Serialize)]
struct ImportOutput {
    leaves: usize,
    max_group_depth: usize,
    fonts: Vec<import::FontRequest>,
    unresolved_fonts: Vec<String>,
    missing_images: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<Vec<OutlineEntry>>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Count { document } => run_count(&document),
        Commands::Export { document, flags, json } => {
            let storage = open_storage(cli.data_dir)?;
            run_export(&storage, &document, &flags, json)
        }
        Commands::Inspect { manifest } => run_inspect(&manifest),
        Commands::Import { manifest, text, fonts, default_font, text_scale, tree } => {
            let mut options = ImportOptions { text_as_text: text, ..ImportOptions::default() };
            if let Some(scale) = text_scale {
                options.text_scale = scale;
            }
            run_import(&manifest, &options, fonts, default_font, tree)
        }
        Commands::Config { action } => {
            let storage = open_storage(cli.data_dir)?;
            run_config(&storage, action)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // A second init (tests calling `run` twice) is harmless.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn open_storage(data_dir: Option<PathBuf>) -> Result<Storage> {
    match data_dir {
        Some(root) => Ok(Storage::with_root(root)),
        None => Storage::from_default_project().context("failed to locate settings directory"),
    }
}

fn load_document(path: &Path) -> Result<MemoryDocument> {
    ensure_file_exists(path)?;
    MemoryDocument::load(path).with_context(|| format!("failed to load document {}", path.display()))
}

fn run_count(path: &Path) -> Result<()> {
    let document = load_document(path)?;
    let descriptors = document.list_layers_flat().context("failed to list layers")?;
    let counts = count_layers(&descriptors, &CancellationToken::new(), &mut NoProgress)?;

    let payload =
        CountOutput { document: document.name(), total: counts.total, visible: counts.visible };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

/// Stored settings layered under the flags. A run without an explicit name
/// is named after the document.
fn resolve_config(storage: &Storage, document: &dyn HostDocument, flags: &ExportFlags) -> Result<ExportConfig> {
    let stored = storage.load_config().context("failed to load stored settings")?;
    let mut config = flags.resolve(stored)?;

    if flags.name.is_none() && config.name == ExportConfig::default().name {
        let stem = Path::new(document.name())
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(document.name());
        config.name = stem.to_owned();
    }
    if config.name.trim().is_empty() {
        anyhow::bail!("export name must not be empty");
    }

    Ok(config)
}

fn run_export(storage: &Storage, path: &Path, flags: &ExportFlags, json: bool) -> Result<()> {
    let mut document = load_document(path)?;
    let config = resolve_config(storage, &document, flags)?;

    let mut exporter = default_exporter();
    let mut archiver = SystemZipArchiver::new();
    let report = layerkit_core::run_export(
        &mut document,
        &mut exporter,
        &mut archiver,
        &config,
        &CancellationToken::new(),
        &mut LogProgress::new(),
    )
    .with_context(|| format!("export of {} failed", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
        for failure in &report.failures {
            println!("  failed: {} ({})", failure.raw_name, failure.reason);
        }
        if let Some(manifest) = &report.manifest_path {
            println!("manifest: {}", manifest.display());
        }
        if let Some(archive) = &report.archive_path {
            println!("archive: {}", archive.display());
        }
    }

    if report.status == RunStatus::Cancelled {
        anyhow::bail!("export was cancelled");
    }
    Ok(())
}

fn read_manifest(path: &Path) -> Result<layerkit_core::EngineManifest> {
    ensure_file_exists(path)?;
    layerkit_core::manifest::engine::read(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))
}

fn run_inspect(path: &Path) -> Result<()> {
    let manifest = read_manifest(path)?;
    println!("{}", serde_json::to_string_pretty(&import::outline(&manifest))?);
    Ok(())
}

fn run_import(
    path: &Path,
    options: &ImportOptions,
    assignments: Vec<(String, String)>,
    default_font: String,
    with_tree: bool,
) -> Result<()> {
    let manifest = read_manifest(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));

    let mut fonts = FontTable::new(default_font);
    for (name, asset) in assignments {
        fonts.insert(name, asset);
    }

    let report = reconstruct(&manifest, base_dir, &fonts, options);
    let payload = ImportOutput {
        leaves: report.tree.leaf_count(),
        max_group_depth: report.tree.max_group_depth(),
        tree: with_tree.then(|| report.tree.outline()),
        fonts: report.fonts,
        unresolved_fonts: report.unresolved_fonts,
        missing_images: report.missing_images,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_config(storage: &Storage, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = storage.load_config().context("failed to load stored settings")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Save { flags } => {
            let stored = storage.load_config().context("failed to load stored settings")?;
            let config = flags.resolve(stored)?;
            let path = storage.save_config(&config).context("failed to save settings")?;
            println!("{}", path.display());
        }
        ConfigAction::Reset => {
            if storage.reset_config().context("failed to reset settings")? {
                println!("removed {}", storage.config_path().display());
            } else {
                println!("no stored settings");
            }
        }
        ConfigAction::Path => println!("{}", storage.config_path().display()),
    }
    Ok(())
}

fn parse_font(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, asset)) if !name.is_empty() && !asset.is_empty() => {
            Ok((name.to_owned(), asset.to_owned()))
        }
        _ => Err(format!("expected NAME=ASSET, got {value:?}")),
    }
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
