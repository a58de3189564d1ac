use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bancarella_downloads_server::buyers::{SessionStore, SqliteSessionStore};
use bancarella_downloads_server::catalog::SqliteCatalogStore;
use bancarella_downloads_server::config::{AppConfig, CliConfig, FileConfig};
use bancarella_downloads_server::downloads::SqliteGrantStore;
use bancarella_downloads_server::server::{run_server, RequestsLoggingLevel};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the catalog, downloads and buyers databases.
    #[clap(long, value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Path to a TOML config file. Values in it override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3005)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Shared secret the marketplace must present on completion hook calls.
    /// The hook routes are not mounted when this is unset.
    #[clap(long)]
    pub completion_hook_secret: Option<String>,

    /// Number of days a buyer session may stay idle before being pruned. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 30)]
    pub session_max_idle_days: u64,

    /// Interval in hours between pruning runs. Only used if session_max_idle_days > 0.
    #[clap(long, default_value_t = 6)]
    pub session_prune_interval_hours: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        data_dir: cli_args.data_dir,
        port: cli_args.port,
        logging_level: cli_args.logging_level,
        session_max_idle_days: cli_args.session_max_idle_days,
        session_prune_interval_hours: cli_args.session_prune_interval_hours,
        completion_hook_secret: cli_args.completion_hook_secret,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Opening SQLite catalog database at {:?}...",
        config.catalog_db_path()
    );
    let catalog_store = Arc::new(SqliteCatalogStore::new(config.catalog_db_path())?);

    info!(
        "Opening SQLite downloads database at {:?}...",
        config.downloads_db_path()
    );
    let grant_store = Arc::new(SqliteGrantStore::new(config.downloads_db_path())?);

    info!(
        "Opening SQLite buyers database at {:?}...",
        config.buyers_db_path()
    );
    let session_store = Arc::new(SqliteSessionStore::new(config.buyers_db_path())?);

    // Spawn background task for session pruning if enabled
    if config.session_max_idle_days > 0 {
        let max_idle_days = config.session_max_idle_days;
        let interval_hours = config.session_prune_interval_hours;
        let pruning_session_store = session_store.clone();

        info!(
            "Session pruning enabled: max idle {} days, pruning every {} hours",
            max_idle_days, interval_hours
        );

        tokio::spawn(async move {
            let interval = Duration::from_secs(interval_hours * 60 * 60);
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let max_idle_secs = max_idle_days as i64 * 24 * 60 * 60;

                match pruning_session_store.prune_idle_sessions(max_idle_secs) {
                    Ok(count) => {
                        if count > 0 {
                            info!("Pruned {} idle buyer sessions", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to prune buyer sessions: {}", e);
                    }
                }
            }
        });
    }

    if config.completion_hook_secret.is_some() {
        info!("Marketplace completion hook enabled");
    }

    info!("Ready to serve at port {}!", config.port);
    run_server(
        catalog_store,
        grant_store,
        session_store,
        config.logging_level,
        config.port,
        config.completion_hook_secret,
        config.downloads.audit_tail_len,
    )
    .await
}
