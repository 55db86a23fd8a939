use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::{self, Read, Write};
use std::sync::Arc;

use clipledger::events::{EventSink, JsonLinesSink, LogSink};
use clipledger::logging;
use clipledger::storage::{
    CONFIG_FILE, Config, ConfigStorage, HISTORY_FILE, HistoryStore, TomlConfigStorage,
    ensure_directories,
};
use clipledger::{SequenceId, StoreError};

#[derive(Parser)]
#[command(name = "clipledger")]
#[command(about = "Durable clipboard history", long_about = None)]
struct Cli {
    /// Print change events as JSON lines on stdout
    #[arg(long, global = true)]
    events: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store clipboard content from stdin (e.g. `wl-paste --watch clipledger store`)
    Store,

    /// Show clipboard history entries, most recent first
    History {
        /// Number of entries to show (default: 10)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Write the most recent clip to stdout
    Latest,

    /// Delete a clip by id
    Remove { id: SequenceId },

    /// Move a clip to the top of the history
    Touch { id: SequenceId },

    /// Delete all clips
    Clear,

    /// Show clipboard history statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (data_dir, config_dir) = ensure_directories()?;
    let config = TomlConfigStorage::new(config_dir.join(CONFIG_FILE)).load()?;
    init_logging(&config, &data_dir)?;

    let sink: Arc<dyn EventSink> = if cli.events {
        Arc::new(JsonLinesSink::new(io::stdout()))
    } else {
        Arc::new(LogSink)
    };

    let history_path = data_dir.join(HISTORY_FILE);
    let store = HistoryStore::open_with(&history_path, config.general.store_options(), sink)
        .with_context(|| format!("Failed to open clipboard history {:?}", history_path))?;

    match cli.command {
        Commands::Store => cmd_store(&store),
        Commands::History { limit } => cmd_history(&store, limit),
        Commands::Latest => cmd_latest(&store),
        Commands::Remove { id } => cmd_remove(&store, id),
        Commands::Touch { id } => cmd_touch(&store, id),
        Commands::Clear => cmd_clear(&store),
        Commands::Stats => cmd_stats(&store),
    }
}

fn init_logging(config: &Config, data_dir: &std::path::Path) -> Result<()> {
    if config.logging.file {
        logging::init_logger(
            data_dir.join("clipledger.log"),
            &config.logging.file_level,
            &config.logging.stderr_level,
        )
    } else {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(config.general.log_level()),
        )
        .init();
        Ok(())
    }
}

/// Store clipboard content from stdin
fn cmd_store(store: &HistoryStore) -> Result<()> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read from stdin")?;

    if buffer.is_empty() {
        log::debug!("Empty clipboard content, skipping");
        return Ok(());
    }

    let item = store.add(buffer).context("Failed to store clip")?;
    log::info!("Stored clip {} ({} bytes)", item.id, item.len());
    Ok(())
}

/// Show clipboard history entries
fn cmd_history(store: &HistoryStore, limit: usize) -> Result<()> {
    let items = store.get_all().context("Failed to read clipboard history")?;

    println!("Recent Clipboard Entries (showing up to {}):", limit);
    println!("{}", "=".repeat(60));

    for item in items.iter().take(limit) {
        println!(
            "{:>6}  {}  {}",
            item.id,
            item.captured_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            item.preview(50)
        );
    }

    if items.is_empty() {
        println!("(empty - no clipboard history yet)");
    }

    Ok(())
}

/// Write the latest clip's raw content to stdout
fn cmd_latest(store: &HistoryStore) -> Result<()> {
    match store.latest() {
        Ok(item) => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&item.content)?;
            stdout.flush()?;
            Ok(())
        }
        Err(StoreError::NotFound(_)) => {
            eprintln!("Clipboard history is empty");
            Ok(())
        }
        Err(e) => Err(e).context("Failed to read latest clip"),
    }
}

fn cmd_remove(store: &HistoryStore, id: SequenceId) -> Result<()> {
    store
        .remove(id)
        .with_context(|| format!("Failed to remove clip {}", id))
}

fn cmd_touch(store: &HistoryStore, id: SequenceId) -> Result<()> {
    let item = store
        .touch(id)
        .with_context(|| format!("Failed to promote clip {}", id))?;
    log::info!("Clip {} is now {}", id, item.id);
    Ok(())
}

fn cmd_clear(store: &HistoryStore) -> Result<()> {
    store
        .clear_history()
        .context("Failed to clear clipboard history")
}

/// Show clipboard statistics
fn cmd_stats(store: &HistoryStore) -> Result<()> {
    let items = store.get_all().context("Failed to read clipboard history")?;
    let total_bytes: usize = items.iter().map(|i| i.len()).sum();

    println!("Clipboard History Statistics");
    println!("============================");
    println!("Database: {}", store.path().display());
    println!("Total entries: {}", items.len());
    println!("Max history: {}", store.max_size());
    println!("Total size: {} bytes", total_bytes);
    println!("Next id: {}", store.next_id()?);

    if let (Some(newest), Some(oldest)) = (items.first(), items.last()) {
        println!(
            "Oldest: #{} at {}",
            oldest.id,
            oldest.captured_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
        println!(
            "Newest: #{} at {}",
            newest.id,
            newest.captured_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
