use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use formforge_server::config::{AppConfig, CliConfig, FileConfig};
use formforge_server::form_store::{FormStore, SqliteFormStore};
use formforge_server::notifications::{
    LogNotifier, NotificationQueueStore, NotificationWorker, RetryPolicy,
    SqliteNotificationQueueStore,
};
use formforge_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use formforge_server::submissions::{AuditLogger, SubmissionRecorder};
use formforge_server::versioning::VersionAllocator;

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
    /// Directory holding the SQLite databases (forms.db, notifications.db).
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. File values override CLI values.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3003)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,
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

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = AppConfig::resolve(
        &CliConfig {
            db_dir: cli_args.db_dir,
            port: cli_args.port,
            logging_level: cli_args.logging_level,
        },
        file_config,
    )?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Opening form database at {:?}...", config.forms_db_path());
    let form_store: Arc<dyn FormStore> = Arc::new(SqliteFormStore::new(config.forms_db_path())?);

    info!(
        "Opening notification queue at {:?}...",
        config.notification_queue_db_path()
    );
    let queue_store: Arc<dyn NotificationQueueStore> = Arc::new(
        SqliteNotificationQueueStore::new(config.notification_queue_db_path())?,
    );

    let retry_policy = RetryPolicy::new(&config.notifications);
    let version_allocator = Arc::new(VersionAllocator::new(
        form_store.clone(),
        Duration::from_millis(config.versioning.lease_timeout_ms),
    ));
    let submission_recorder = Arc::new(SubmissionRecorder::new(
        form_store.clone(),
        queue_store.clone(),
        AuditLogger::new(form_store.clone()),
        retry_policy,
    ));

    let shutdown = CancellationToken::new();
    let worker = NotificationWorker::new(
        queue_store,
        Arc::new(LogNotifier),
        retry_policy,
        Duration::from_millis(config.notifications.poll_interval_ms),
        Duration::from_secs(config.notifications.stale_in_progress_threshold_secs),
    );
    let worker_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { worker.run(shutdown).await }
    });

    info!("Ready to serve at port {}!", config.port);
    let server_config = ServerConfig {
        port: config.port,
        requests_logging_level: config.logging_level,
    };
    let result = tokio::select! {
        result = run_server(server_config, form_store, version_allocator, submission_recorder) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    shutdown.cancel();
    let _ = worker_handle.await;

    result
}
