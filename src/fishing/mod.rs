//! Fishing gauge detection and auto-clicking.
//!
//! This module provides:
//! - Gauge analysis of a captured region (indicator line, zone colors)
//! - Zone classification and the per-iteration click decision
//! - Configuration loading, sharing, and reload on file change
//! - The detection lifecycle and polling loop

pub mod analyzer;
pub mod config;
pub mod controller;
pub mod region;
pub mod runner;
pub mod status;
pub mod zone;

pub use config::{
    default_config_path, load_config, save_config, ConfigWatcher, DetectionConfig, SharedConfig,
};
pub use region::CaptureRegion;
pub use runner::{Clicker, Detector, DetectorState, FrameSource, SessionSummary};
pub use status::{Severity, StatusBoard, StatusSink};
