//! Log setup: console plus an append-only file under `<exe_dir>/logs/`.

use chrono::Local;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::paths;

const LOG_FILE_NAME: &str = "gauge_fisher.log";

/// Local wall-clock timestamps with milliseconds.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Installs the global subscriber.
///
/// The level comes from `RUST_LOG` and defaults to `info`. If the log file
/// cannot be opened, logging continues on the console only.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_path = paths::get_logs_dir().join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);
    let file_error = file.as_ref().err().map(|e| e.to_string());

    let file_layer = file.ok().map(|file| {
        fmt::layer()
            .with_timer(LocalTime)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    let init = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(LocalTime))
        .with(file_layer)
        .try_init();

    if let Err(e) = init {
        eprintln!("Logging already initialized: {}", e);
        return;
    }

    match file_error {
        Some(e) => tracing::warn!("Could not open {}: {}", log_path.display(), e),
        None => tracing::info!("Logging to {}", log_path.display()),
    }
}
