//! Tracing Setup
//!
//! Stdout logging with local timestamps, plus an optional daily rolling file.

use crate::domain::LogConfig;
use crate::error::{Error, Result};
use crate::helpers::resolve_log_dir;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_PREFIX: &str = "keyspace-browser.log";

/// Build the filter: `RUST_LOG` wins over the configured level
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer and must live as long as the
/// process logs.
pub fn init_tracing(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let stdout_layer = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(true);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let dir = resolve_log_dir(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::invalid(format!("Failed to install tracing subscriber: {e}")))?;

    Ok(guard)
}
