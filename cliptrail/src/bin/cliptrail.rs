//! Command-line front end: watch the system clipboard or inspect stored history

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use cliptrail::content_detection::CategoryClassifier;
use cliptrail::{
    Category, ClipboardHistory, Database, HistoryApi, HistoryChange, HistoryConfig,
    SystemClipboard,
};

#[derive(Debug, Parser)]
#[command(name = "cliptrail", version, about = "Clipboard history recorder")]
struct Args {
    /// SQLite file holding the history
    #[arg(long, global = true, default_value = "cliptrail.sqlite")]
    db: PathBuf,

    /// JSON configuration file; defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level for logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record clipboard changes until interrupted
    Watch {
        /// Print every history change
        #[arg(long)]
        print: bool,
    },
    /// Print the stored history
    List {
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Only entries of this category
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Url,
    Email,
    Path,
    Code,
    Short,
    Text,
    Long,
    Editor,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Url => Category::Url,
            CategoryArg::Email => Category::Email,
            CategoryArg::Path => Category::Path,
            CategoryArg::Code => Category::Code,
            CategoryArg::Short => Category::ShortText,
            CategoryArg::Text => Category::Text,
            CategoryArg::Long => Category::LongText,
            CategoryArg::Editor => Category::Editor,
        }
    }
}

fn setup_logging(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(verbose > 1)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<HistoryConfig> {
    match path {
        Some(path) => HistoryConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(HistoryConfig::default()),
    }
}

async fn watch(args: &Args, print: bool) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let database = Database::open(&args.db)
        .with_context(|| format!("failed to open {}", args.db.display()))?;
    let clipboard = SystemClipboard::new().context("system clipboard unavailable")?;

    let history = ClipboardHistory::open(config, Arc::new(clipboard), Arc::new(database)).await?;
    info!(entries = history.len(), db = %args.db.display(), "history ready");

    let mut events = history.subscribe();
    history.start_monitoring();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) if print => {
                    if let HistoryChange::Captured { id, category } = &event.change {
                        let preview = history
                            .get(*id)
                            .map(|entry| entry.preview(80))
                            .unwrap_or_default();
                        println!("[{}] {}", category.label(), preview);
                    } else {
                        println!("{}", serde_json::to_string(&event)?);
                    }
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    if !history.shutdown().await {
        warn!("history was not fully saved before exit");
    }
    Ok(())
}

fn list(args: &Args, limit: usize, category: Option<CategoryArg>, json: bool) -> Result<()> {
    let database = Database::open(&args.db)
        .with_context(|| format!("failed to open {}", args.db.display()))?;
    let entries = database.fetch_entries(limit).context("failed to read history")?;

    let classifier = CategoryClassifier::new(entries.len().max(1));
    let wanted = category.map(Category::from);
    let entries: Vec<_> = entries
        .into_iter()
        .map(|entry| (classifier.category_for(&entry), entry))
        .filter(|(found, _)| wanted.map_or(true, |wanted| *found == wanted))
        .collect();

    if json {
        let rows: Vec<_> = entries
            .iter()
            .map(|(category, entry)| {
                serde_json::json!({
                    "entry": entry,
                    "category": category,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (category, entry) in &entries {
        println!(
            "{} {:<6} {} {}",
            entry.created_at().format("%Y-%m-%d %H:%M"),
            category.label(),
            if entry.is_pinned() { "*" } else { " " },
            entry.preview(72),
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    match &args.command {
        Command::Watch { print } => watch(&args, *print).await,
        Command::List {
            limit,
            category,
            json,
        } => list(&args, *limit, *category, *json),
    }
}
