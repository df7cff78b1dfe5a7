//! Gauge Fisher
//!
//! A Windows desktop helper that watches the fishing gauge of a game in a
//! user-selected screen region and clicks to keep the indicator inside the
//! safe zone.

// Hide console window on Windows for GUI mode
#![cfg_attr(windows, windows_subsystem = "windows")]
// Detection only runs on Windows; elsewhere the core is built for its tests
#![cfg_attr(not(windows), allow(dead_code))]

#[cfg(windows)]
mod capture;
mod fishing;
#[cfg(windows)]
mod gui;
#[cfg(windows)]
mod input;
mod logging;
mod paths;

use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info};

use fishing::DetectionConfig;

fn main() -> Result<()> {
    // Ensure output directories exist
    paths::ensure_directories()?;
    logging::init_logging();

    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        error!("[PANIC]{} {}", location, msg);
    }));

    info!("Gauge Fisher {} starting", env!("CARGO_PKG_VERSION"));

    let config_path = fishing::default_config_path();
    let config = fishing::load_config(&config_path);

    run(config_path, config)
}

#[cfg(windows)]
fn run(config_path: PathBuf, config: DetectionConfig) -> Result<()> {
    info!("Starting GUI application...");
    match gui::run_gui(config_path, config) {
        Ok(()) => {
            info!("GUI application exited normally");
            Ok(())
        }
        Err(e) => {
            error!("GUI error: {}", e);
            Err(anyhow::anyhow!("GUI error: {}", e))
        }
    }
}

#[cfg(not(windows))]
fn run(_config_path: PathBuf, _config: DetectionConfig) -> Result<()> {
    error!("Screen capture and input are only implemented for Windows");
    Err(anyhow::anyhow!("unsupported platform: {}", std::env::consts::OS))
}
