//! CLI entry point for `haystack`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use haystack::archive::Archive;
use haystack::config::{self, Config};
use haystack::ingest::{self, IngestSummary};
use haystack::store::{queries, ArchiveStats, MessageStore};

/// Stylesheet written by `haystack init`.
const DEFAULT_STYLESHEET: &str = include_str!("archive/site.css");

#[derive(Parser)]
#[command(
    name = "haystack",
    version,
    about = "Web viewer for mailing-list archives"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $HAYSTACK_CONFIG or the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Archive home directory (holds data/ and files/)
    #[arg(long, global = true, env = "HAYSTACK_HOME", value_name = "DIR")]
    home: Option<PathBuf>,

    /// Database file, instead of <home>/data/data.sqlite
    #[arg(long, global = true, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the archive over HTTP
    Serve {
        /// Address to listen on (default from config: 127.0.0.1:8080)
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },
    /// Import mbox files into the archive
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Create the home directory, schema, stylesheet, and default config
    Init,
    /// Merge the full-text index
    Optimize,
    /// Show archive statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => config::load_config_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => config::load_config(),
    };
    if let Some(home) = cli.home.clone() {
        config.server.home_dir = Some(home);
    }
    if let Some(database) = cli.database.clone() {
        config.archive.database = Some(database);
    }

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Serve { listen } => {
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            cmd_serve(&config)
        }
        Commands::Ingest { paths } => cmd_ingest(&config, &paths),
        Commands::Init => cmd_init(&config, cli.config.as_deref()),
        Commands::Optimize => cmd_optimize(&config),
        Commands::Stats { json } => cmd_stats(&config, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "haystack.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "haystack", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Run the HTTP server until interrupted.
fn cmd_serve(config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .server
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.server.listen))?;
    let archive = Arc::new(Archive::from_config(config)?);

    let runtime = tokio::runtime::Runtime::new()?;
    println!("  Serving {} on http://{addr}/", config::home_dir(config).display());
    runtime.block_on(haystack::server::serve(archive, addr))?;
    Ok(())
}

/// Import mbox files, with a progress bar over the total input size.
fn cmd_ingest(config: &Config, paths: &[PathBuf]) -> anyhow::Result<()> {
    let store = MessageStore::new(config::database_path(config));

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} Ingesting [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let summary = ingest::ingest_files(
        &store,
        paths,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();

    print_ingest_summary(&summary, start.elapsed());
    Ok(())
}

fn cmd_init(config: &Config, config_path: Option<&Path>) -> anyhow::Result<()> {
    let home = config::home_dir(config);
    let files = config::files_dir(config);
    std::fs::create_dir_all(&files)
        .with_context(|| format!("Failed to create {}", files.display()))?;

    let stylesheet = files.join("site.css");
    if !stylesheet.exists() {
        std::fs::write(&stylesheet, DEFAULT_STYLESHEET)?;
    }

    let store = MessageStore::new(config::database_path(config));
    store.create_schema()?;

    let config_path = config_path
        .map(Path::to_path_buf)
        .or_else(config::config_file_path);
    if let Some(path) = config_path.filter(|p| !p.exists()) {
        let mut saved = config.clone();
        saved.server.home_dir = Some(home.clone());
        config::save_config(&saved, &path)?;
        println!("  Wrote config to {}", path.display());
    }

    println!("  Archive home ready at {}", home.display());
    Ok(())
}

fn cmd_optimize(config: &Config) -> anyhow::Result<()> {
    let store = open_existing(config)?;
    store.optimize()?;
    println!("  Search index optimized");
    Ok(())
}

fn cmd_stats(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_existing(config)?;
    let conn = store.connect()?;
    let stats = queries::stats(&conn)?;
    let db_size = std::fs::metadata(store.path())?.len();

    if json {
        let output = serde_json::json!({
            "database": store.path().display().to_string(),
            "database_size": db_size,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_stats_table(store.path(), db_size, &stats);
    }
    Ok(())
}

fn open_existing(config: &Config) -> anyhow::Result<MessageStore> {
    let path = config::database_path(config);
    if !path.exists() {
        anyhow::bail!(
            "No archive database at {} (run `haystack init` first)",
            path.display()
        );
    }
    Ok(MessageStore::new(path))
}

fn print_ingest_summary(summary: &IngestSummary, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  Ingest complete:");
    println!("  {:<20} {}", "Files", summary.files);
    println!("  {:<20} {}", "Input size", format_size(summary.bytes, BINARY));
    println!("  {:<20} {}", "Messages added", summary.messages);
    println!("  {:<20} {}", "New threads", summary.threads);
    if summary.duplicates > 0 {
        println!("  {:<20} {}", "Duplicates skipped", summary.duplicates);
    }
    if summary.skipped > 0 {
        println!("  {:<20} {}", "Unreadable skipped", summary.skipped);
    }
    println!("  {:<20} {:.2?}", "Time", elapsed);
    println!();
}

/// Print statistics in a human-readable table.
fn print_stats_table(path: &Path, db_size: u64, stats: &ArchiveStats) {
    use humansize::{format_size, BINARY};

    let day = |ts: i64| {
        chrono::DateTime::from_timestamp(ts, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    };

    println!();
    println!("  {:<20} {}", "Database", path.display());
    println!("  {:<20} {}", "Size", format_size(db_size, BINARY));
    println!("  {:<20} {}", "Messages", stats.messages);
    println!("  {:<20} {}", "Senders", stats.senders);
    println!("  {:<20} {}", "Threads", stats.threads);
    if let (Some(first), Some(last)) = (stats.first_date, stats.last_date) {
        println!("  {:<20} {} — {}", "Date range", day(first), day(last));
    }
    println!();
}
