use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::{WikiError, WikiResult};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Logs go to `<data_dir>/logs/sethael.log.<date>`; the terminal belongs
/// to the UI. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(data_dir: &Path) -> WikiResult<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "sethael.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| WikiError::Io(error.to_string()))
}
