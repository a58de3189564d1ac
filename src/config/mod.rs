mod file_config;

pub use file_config::{DownloadsConfig, FileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub session_max_idle_days: u64,
    pub session_prune_interval_hours: u64,
    pub completion_hook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub data_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub session_max_idle_days: u64,
    pub session_prune_interval_hours: u64,
    pub completion_hook_secret: Option<String>,

    // Feature configs (with defaults)
    pub downloads: DownloadsSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;

        // Validate data_dir exists
        if !data_dir.exists() {
            bail!("Data directory does not exist: {:?}", data_dir);
        }
        if !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let session_max_idle_days = file
            .session_max_idle_days
            .unwrap_or(cli.session_max_idle_days);
        let session_prune_interval_hours = file
            .session_prune_interval_hours
            .unwrap_or(cli.session_prune_interval_hours);

        let completion_hook_secret = file
            .completion_hook_secret
            .or_else(|| cli.completion_hook_secret.clone());

        // Downloads settings - merge file config with defaults
        let downloads_file = file.downloads.unwrap_or_default();
        let downloads = DownloadsSettings {
            audit_tail_len: downloads_file.audit_tail_len.unwrap_or(10),
        };

        Ok(Self {
            data_dir,
            port,
            logging_level,
            session_max_idle_days,
            session_prune_interval_hours,
            completion_hook_secret,
            downloads,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.data_dir.join("catalog.db")
    }

    pub fn downloads_db_path(&self) -> PathBuf {
        self.data_dir.join("downloads.db")
    }

    pub fn buyers_db_path(&self) -> PathBuf {
        self.data_dir.join("buyers.db")
    }
}

#[derive(Debug, Clone)]
pub struct DownloadsSettings {
    pub audit_tail_len: usize,
}

impl Default for DownloadsSettings {
    fn default() -> Self {
        Self { audit_tail_len: 10 }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
