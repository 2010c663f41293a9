mod output;

use anyhow::{Context, Result};
use assetgc_core::{
    Collector, ContentId, ContentKind, ContentStore, GcConfig, LocalStore, Locale, LogProgress,
    RunState, RunSummary, StopToken,
};
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use output::{CreatedOutput, EntryInfo, GcOutput, InitOutput, LsOutput, OutputWriter, RefOutput};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Page size used when listing a folder for `ls`.
const LIST_PAGE_SIZE: usize = 100;

/// assetgc - remove media assets nothing refers to any more
#[derive(Parser)]
#[command(name = "assetgc")]
#[command(about = "Garbage collector for unused media assets", long_about = None)]
#[command(version)]
struct Cli {
    /// Store root directory (defaults to ASSETGC_ROOT env var or ./assetgc-store)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new store
    Init,

    /// Create a folder
    Mkdir {
        /// Parent folder id
        parent: String,

        /// Folder name
        name: String,
    },

    /// Add a file as an asset
    Add {
        /// Parent folder id
        parent: String,

        /// File holding the asset payload
        file: PathBuf,

        /// Asset name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Creation time as RFC 3339 (defaults to now)
        #[arg(long)]
        created: Option<String>,
    },

    /// Record that one item references another
    Ref {
        /// Referencing item id
        from: String,

        /// Referenced item id
        to: String,
    },

    /// List the children of a folder (the root folder if omitted)
    Ls {
        /// Folder id
        folder: Option<String>,
    },

    /// Delete unreferenced assets older than the retention window
    Gc {
        /// Folder to collect under (defaults to the root folder)
        #[arg(long)]
        folder: Option<String>,

        /// Minimum age in days of an unreferenced asset
        #[arg(long)]
        retention_days: Option<i64>,

        /// Deletions committed per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Children fetched per listing page
        #[arg(long)]
        page_size: Option<usize>,

        /// Culture used when listing children
        #[arg(long)]
        locale: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assetgc=info,assetgc_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Determine store root: CLI arg > ASSETGC_ROOT env var > ./assetgc-store default
    let root = cli
        .root
        .clone()
        .or_else(|| std::env::var("ASSETGC_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./assetgc-store"));

    let out = OutputWriter::new(cli.json);

    let result = match cli.command {
        Commands::Init => cmd_init(&root, &out),
        Commands::Mkdir { parent, name } => cmd_mkdir(&root, &out, &parent, &name),
        Commands::Add {
            parent,
            file,
            name,
            created,
        } => cmd_add(&root, &out, &parent, &file, name, created.as_deref()),
        Commands::Ref { from, to } => cmd_ref(&root, &out, &from, &to),
        Commands::Ls { folder } => cmd_ls(&root, &out, folder.as_deref()),
        Commands::Gc {
            folder,
            retention_days,
            batch_size,
            page_size,
            locale,
        } => {
            let overrides = GcOverrides {
                retention_days,
                batch_size,
                page_size,
            };
            cmd_gc(&root, &out, folder.as_deref(), overrides, locale)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            out.write_error(&e, 1);
            ExitCode::FAILURE
        }
    }
}

fn open_store(root: &Path) -> Result<LocalStore> {
    LocalStore::open(root).with_context(|| format!("Failed to open store at {}", root.display()))
}

fn parse_id(id: &str) -> Result<ContentId> {
    id.parse::<ContentId>()
        .with_context(|| format!("Invalid content id: {}", id))
}

fn cmd_init(root: &Path, out: &OutputWriter) -> Result<()> {
    let store = LocalStore::init(root)
        .with_context(|| format!("Failed to initialize store at {}", root.display()))?;

    let data = InitOutput {
        success: true,
        result_code: 0,
        root: root.display().to_string(),
        root_folder: store.root_folder(),
    };
    out.write(&data, || {
        format!(
            "Initialized assetgc store at {}\nRoot folder: {}\n",
            root.display(),
            store.root_folder()
        )
    })
}

fn cmd_mkdir(root: &Path, out: &OutputWriter, parent: &str, name: &str) -> Result<()> {
    let store = open_store(root)?;
    let parent = parse_id(parent)?;

    let id = store
        .create_folder(&parent, name)
        .with_context(|| format!("Failed to create folder {} under {}", name, parent))?;

    let data = CreatedOutput {
        success: true,
        result_code: 0,
        id,
        kind: ContentKind::Folder,
        parent,
        name: name.to_string(),
    };
    out.write(&data, || format!("{} {}\n", id, name))
}

fn cmd_add(
    root: &Path,
    out: &OutputWriter,
    parent: &str,
    file: &Path,
    name: Option<String>,
    created: Option<&str>,
) -> Result<()> {
    let store = open_store(root)?;
    let parent = parse_id(parent)?;

    let created = match created {
        Some(value) => DateTime::parse_from_rfc3339(value)
            .with_context(|| format!("Invalid creation time: {}", value))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid filename: {}", file.display()))?,
    };

    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let id = store
        .add_asset(&parent, &name, created, reader)
        .with_context(|| format!("Failed to add asset: {}", file.display()))?;

    let data = CreatedOutput {
        success: true,
        result_code: 0,
        id,
        kind: ContentKind::Asset,
        parent,
        name: name.clone(),
    };
    out.write(&data, || format!("{} {}\n", id, name))
}

fn cmd_ref(root: &Path, out: &OutputWriter, from: &str, to: &str) -> Result<()> {
    let store = open_store(root)?;
    let from = parse_id(from)?;
    let to = parse_id(to)?;

    store
        .add_reference(&from, &to)
        .with_context(|| format!("Failed to add reference {} -> {}", from, to))?;

    let data = RefOutput {
        success: true,
        result_code: 0,
        from,
        to,
    };
    out.write(&data, || format!("{} -> {}\n", from, to))
}

fn cmd_ls(root: &Path, out: &OutputWriter, folder: Option<&str>) -> Result<()> {
    let store = open_store(root)?;
    let folder = match folder {
        Some(id) => parse_id(id)?,
        None => store.root_folder(),
    };

    let locale = Locale::invariant();
    let mut entries = Vec::new();
    for kind in [ContentKind::Folder, ContentKind::Asset] {
        let mut offset = 0;
        loop {
            let page = store
                .children(&folder, kind, &locale, offset, LIST_PAGE_SIZE)
                .with_context(|| format!("Failed to list folder {}", folder))?;
            if page.is_empty() {
                break;
            }
            for item in page {
                let references = store.reference_count(&item.id)?;
                entries.push(EntryInfo::new(item, references));
            }
            offset += LIST_PAGE_SIZE;
        }
    }

    let data = LsOutput {
        success: true,
        result_code: 0,
        folder,
        entries,
    };
    out.write(&data, || {
        if data.entries.is_empty() {
            return "Folder is empty\n".to_string();
        }
        data.entries
            .iter()
            .map(|entry| {
                format!(
                    "{:<6} {:>6} {} refs={} {}\n",
                    entry.kind,
                    entry.id.to_string(),
                    entry.created.format("%Y-%m-%d"),
                    entry.references,
                    entry.name
                )
            })
            .collect()
    })
}

/// Collector settings given on the command line.
struct GcOverrides {
    retention_days: Option<i64>,
    batch_size: Option<usize>,
    page_size: Option<usize>,
}

impl GcOverrides {
    /// Apply the overrides on top of the store's configuration.
    fn apply(&self, mut config: GcConfig) -> Result<GcConfig> {
        if let Some(days) = self.retention_days {
            config.retention = TimeDelta::try_days(days)
                .with_context(|| format!("Retention out of range: {} days", days))?;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        config.validate()?;
        Ok(config)
    }
}

fn cmd_gc(
    root: &Path,
    out: &OutputWriter,
    folder: Option<&str>,
    overrides: GcOverrides,
    locale: Option<String>,
) -> Result<()> {
    let store = open_store(root)?;
    let folder = match folder {
        Some(id) => parse_id(id)?,
        None => store.root_folder(),
    };
    let locale = locale.map(Locale::new).unwrap_or_default();

    let config = store
        .config()
        .with_context(|| "Failed to read collector settings")?;
    let config = overrides.apply(config)?;

    let collector = Collector::new(&store, &store, &store)
        .with_config(config)
        .with_progress(&LogProgress);
    stop_on_ctrl_c(collector.stop_token())?;

    let summary = collector
        .execute(&folder, &locale)
        .with_context(|| "Failed to run garbage collection")?;

    let text = summary_text(&summary);
    out.write(&GcOutput::from(summary), || text)
}

fn summary_text(summary: &RunSummary) -> String {
    match summary.state {
        RunState::Stopped => format!("{} (stopped early)\n", summary.message()),
        _ => format!("{}\n", summary.message()),
    }
}

/// Stop the collector at its next page boundary on the first Ctrl-C.
///
/// The listener runs on its own thread with a single-threaded runtime and is
/// left behind when the command returns.
fn stop_on_ctrl_c(stop: StopToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the signal listener")?;

    std::thread::spawn(move || {
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping after the current page");
                stop.stop();
            }
        });
    });
    Ok(())
}
