//! Structured logging setup.
//!
//! Initializes a `tracing-subscriber` pipeline writing to a daily-rotating
//! file under `<state_dir>/logs/` via `tracing-appender`, plus a stderr
//! layer gated by `RUST_LOG` (default `info`). Never panics on setup
//! failure: if the log directory cannot be created, falls back to
//! stderr-only.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Must be kept alive for the process lifetime; dropping it stops the
/// background flush thread for the file appender.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".turnforge")
        .join("logs")
}

pub fn init(log_dir: Option<PathBuf>) -> LoggingGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let dir = log_dir.unwrap_or_else(default_log_dir);
    match std::fs::create_dir_all(&dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::daily(&dir, "turnforge.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            let stderr_layer = fmt::layer().with_writer(std::io::stderr);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(stderr_layer)
                .init();

            LoggingGuard { _file_guard: Some(guard) }
        }
        Err(e) => {
            eprintln!("turnforge: could not create log dir {}: {e} (stderr only)", dir.display());
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            LoggingGuard { _file_guard: None }
        }
    }
}
