mod file_config;

pub use file_config::{FileConfig, NotificationsConfig, VersioningConfig};

use crate::notifications::{DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};
use crate::server::RequestsLoggingLevel;
use crate::versioning::DEFAULT_LEASE_TIMEOUT_MS;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that take part in config resolution. TOML values override
/// these where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub notifications: NotificationSettings,
    pub versioning: VersioningSettings,
}

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    /// Delivery attempts before a job is dead-lettered.
    pub max_attempts: i64,
    /// Fixed delay between attempts, in milliseconds.
    pub backoff_ms: i64,
    /// Worker poll interval.
    pub poll_interval_ms: u64,
    /// Jobs IN_PROGRESS longer than this are considered stranded.
    pub stale_in_progress_threshold_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
            poll_interval_ms: 1000,
            stale_in_progress_threshold_secs: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersioningSettings {
    /// Bounded wait for the per-form publish lease, in milliseconds.
    pub lease_timeout_ms: u64,
}

impl Default for VersioningSettings {
    fn default() -> Self {
        Self {
            lease_timeout_ms: DEFAULT_LEASE_TIMEOUT_MS,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let notifications_file = file.notifications.unwrap_or_default();
        let notifications_defaults = NotificationSettings::default();
        let notifications = NotificationSettings {
            max_attempts: notifications_file
                .max_attempts
                .unwrap_or(notifications_defaults.max_attempts),
            backoff_ms: notifications_file
                .backoff_ms
                .unwrap_or(notifications_defaults.backoff_ms),
            poll_interval_ms: notifications_file
                .poll_interval_ms
                .unwrap_or(notifications_defaults.poll_interval_ms),
            stale_in_progress_threshold_secs: notifications_file
                .stale_in_progress_threshold_secs
                .unwrap_or(notifications_defaults.stale_in_progress_threshold_secs),
        };
        if notifications.max_attempts < 1 {
            bail!("notifications.max_attempts must be at least 1");
        }

        let versioning_file = file.versioning.unwrap_or_default();
        let versioning = VersioningSettings {
            lease_timeout_ms: versioning_file
                .lease_timeout_ms
                .unwrap_or(DEFAULT_LEASE_TIMEOUT_MS),
        };

        Ok(Self {
            db_dir,
            port,
            logging_level,
            notifications,
            versioning,
        })
    }

    pub fn forms_db_path(&self) -> PathBuf {
        self.db_dir.join("forms.db")
    }

    pub fn notification_queue_db_path(&self) -> PathBuf {
        self.db_dir.join("notifications.db")
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
