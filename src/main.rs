use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use feedwatch::config::{Config, ConfigError};
use feedwatch::download::Downloader;
use feedwatch::feed::{build_client, FetchPolicy};
use feedwatch::notify::Notifier;
use feedwatch::runner::Runner;
use feedwatch::storage::{Database, DatabaseError};
use feedwatch::util::{format_interval, plural};
use feedwatch::watcher::Watcher;

/// Config directory: `$FEEDWATCH_DIR`, else `~/.config/feedwatch/`
fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("FEEDWATCH_DIR").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedwatch"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedwatch",
    version,
    about = "Watch RSS feeds for new torrents, download matches and notify webhooks"
)]
struct Args {
    /// Directory holding config.toml and history.db
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Run a single check and exit
    #[arg(long)]
    once: bool,

    /// Validate the configuration and exit
    #[arg(long, conflicts_with = "once")]
    check: bool,

    /// Print the N most recent history entries and exit
    #[arg(long, value_name = "N")]
    history: Option<u32>,
}

fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    // User-only access: the config holds webhook tokens.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    Ok(())
}

fn load_config(config_path: &Path) -> Result<Config> {
    let mut config = match Config::load(config_path) {
        Ok(config) => config,
        Err(ConfigError::Missing(path)) => {
            Config::write_template(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Created a starter configuration at {}", path.display());
            eprintln!();
            eprintln!("Add your feeds under [[subscriptions]] and a [[subscriptions.watchlist]]");
            eprintln!("for each show to watch, then start feedwatch again.");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    config
        .apply_env()
        .context("Invalid environment override")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("feedwatch=info")),
        )
        .init();

    let args = Args::parse();

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    ensure_config_dir(&config_dir)?;

    let config = load_config(&config_dir.join("config.toml"))?;

    if args.check {
        let subscriptions = config
            .build_subscriptions(&HashMap::new())
            .context("Invalid watchlist")?;
        let rules: usize = subscriptions.iter().map(|s| s.watch_rules.len()).sum();
        println!(
            "Configuration OK: {}, {}, {}, checking every {}",
            plural(subscriptions.len() as u64, "subscription"),
            plural(rules as u64, "watchlist"),
            plural(config.webhooks.len() as u64, "webhook"),
            format_interval(config.interval_secs)
        );
        return Ok(());
    }

    let db_path = config_dir.join("history.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of feedwatch appears to be running. Please stop it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    if let Some(limit) = args.history {
        for entry in db.get_history(None, limit).await.context("Failed to read history")? {
            println!(
                "{}  {:<10}  {:<16}  {}",
                entry.recorded_at.format("%Y-%m-%d %H:%M"),
                entry.kind.as_str(),
                entry.owner,
                entry.title
            );
        }
        return Ok(());
    }

    let configured = config
        .build_subscriptions(&HashMap::new())
        .context("Invalid watchlist")?;
    let subscriptions = db
        .restore_subscriptions(configured)
        .await
        .context("Failed to restore subscriptions")?;
    let ledger = db.load_ledger().await.context("Failed to load download history")?;
    tracing::info!(
        subscriptions = subscriptions.len(),
        delivered = ledger.len(),
        "Loaded state"
    );

    let client = build_client().context("Failed to build HTTP client")?;
    let policy = FetchPolicy::default();
    let downloader = Downloader::new(client.clone(), &config.downloads_dir, policy.clone());
    let notifier = Notifier::new(client.clone(), config.webhooks);

    let mut runner = Runner::new(
        db,
        client,
        Watcher::new(subscriptions, ledger),
        downloader,
        notifier,
    )
    .with_fetch_policy(policy)
    .with_interval(Duration::from_secs(config.interval_secs));

    if args.once {
        let report = runner.tick().await?;
        println!(
            "Matched {}, downloaded {}, failed {}",
            plural(report.matched as u64, "upload"),
            report.downloaded,
            report.failed
        );
        return Ok(());
    }

    runner.run().await
}
