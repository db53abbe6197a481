use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "warn,hush_ledger=info,hush_app=info";

const LOG_FILE_PREFIX: &str = "hush";

/// Keeps the non-blocking file writer alive. Dropping it flushes pending
/// log lines, so the binary holds it until exit.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard(Option<WorkerGuard>);

impl LogGuard {
    /// Whether a file layer was installed.
    pub fn writes_file(&self) -> bool {
        self.0.is_some()
    }
}

/// Initializes logging: compact stderr output, plus a daily-rotated file in
/// `log_dir` when one is given.
///
/// Stdout is left alone for command results.
pub fn init_logging(log_dir: Option<&Path>, fallback_filter: &str) -> Result<LogGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(LogGuard(guard))
}
