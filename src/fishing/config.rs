//! Detection thresholds and timing parameters.
//!
//! Loaded from config.json at startup. The running loop never reads the file
//! directly: it takes a fresh [`DetectionConfig`] snapshot from a
//! [`ConfigSource`] at the top of every iteration, so the GUI sliders and
//! on-disk edits both apply without restarting detection.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::fishing::region::CaptureRegion;

const CONFIG_FILE_NAME: &str = "config.json";

/// An opaque RGB reference color. Alpha is accepted in text form but ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `rgba(r,g,b,a)` or `rgb(r,g,b)`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let inner = text
            .strip_prefix("rgba(")
            .or_else(|| text.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| anyhow!("expected rgba(r,g,b,a), got {:?}", text))?;

        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(anyhow!("expected 3 or 4 components, got {}", parts.len()));
        }

        let channel = |s: &str| -> Result<u8> {
            s.parse::<u8>()
                .with_context(|| format!("invalid color channel {:?}", s))
        };

        Ok(Self {
            r: channel(parts[0])?,
            g: channel(parts[1])?,
            b: channel(parts[2])?,
        })
    }
}

impl TryFrom<String> for RgbColor {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RgbColor> for String {
    fn from(color: RgbColor) -> Self {
        format!("rgba({},{},{},255)", color.r, color.g, color.b)
    }
}

/// Default color of the safe (green) part of the gauge.
pub const DEFAULT_GREEN: RgbColor = RgbColor::new(83, 250, 83);
/// Default color of the danger (red) part of the gauge.
pub const DEFAULT_RED: RgbColor = RgbColor::new(251, 98, 76);

/// Complete detection configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum luma (0-255) for a pixel to count as part of the indicator line
    pub line_threshold: u8,
    /// Maximum sum of absolute channel differences for a reference color match
    #[serde(alias = "color_tolerance", alias = "green_tolerance")]
    pub color_threshold: u32,
    /// Width of each outer danger zone as a fraction of the gauge (0.0-1.0)
    pub red_zone_threshold: f64,
    /// Width of each caution band next to a danger zone (0.0-1.0)
    pub buffer_zone_size: f64,
    /// Minimum seconds between position-triggered clicks
    pub action_cooldown: f64,
    /// Seconds the gauge must be missing before the first recovery click
    pub first_click_delay: f64,
    /// Minimum seconds between recovery clicks
    pub periodic_click_interval: f64,
    pub green_color: RgbColor,
    pub red_color: RgbColor,
    /// Horizontal distance in pixels between color samples on the scan line
    pub color_sample_stride: u32,
    /// Sleep between iterations (milliseconds)
    pub poll_interval_ms: u64,
    /// Sleep after a failed iteration (milliseconds)
    pub error_backoff_ms: u64,
    /// Last selected capture region, if any
    pub region: Option<CaptureRegion>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            line_threshold: 200,
            color_threshold: 30,
            red_zone_threshold: 0.2,
            buffer_zone_size: 0.13,
            action_cooldown: 0.1,
            first_click_delay: 1.0,
            periodic_click_interval: 4.0,
            green_color: DEFAULT_GREEN,
            red_color: DEFAULT_RED,
            color_sample_stride: 5,
            poll_interval_ms: 10,
            error_backoff_ms: 1000,
            region: None,
        }
    }
}

/// Converts a seconds value from the config into a Duration.
///
/// Negative and NaN values become zero; values too large for a Duration saturate.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

impl DetectionConfig {
    pub fn action_cooldown(&self) -> Duration {
        seconds(self.action_cooldown)
    }

    pub fn first_click_delay(&self) -> Duration {
        seconds(self.first_click_delay)
    }

    pub fn periodic_click_interval(&self) -> Duration {
        seconds(self.periodic_click_interval)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Returns the safe band `(min, max)` in relative gauge coordinates.
    ///
    /// The band is empty when `min > max`.
    pub fn safe_band(&self) -> (f64, f64) {
        let edge = self.red_zone_threshold + self.buffer_zone_size;
        (edge, 1.0 - edge)
    }

    /// Lists settings that will make detection misbehave.
    ///
    /// Nothing here is fatal: a config with no safe band simply classifies
    /// every position as caution or danger.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, value) in [
            ("red_zone_threshold", self.red_zone_threshold),
            ("buffer_zone_size", self.buffer_zone_size),
        ] {
            if !(0.0..=1.0).contains(&value) {
                warnings.push(format!("{} = {} is outside 0.0-1.0", name, value));
            }
        }

        if self.red_zone_threshold + self.buffer_zone_size >= 0.5 {
            warnings.push(format!(
                "red_zone_threshold + buffer_zone_size = {:.3} leaves no safe zone",
                self.red_zone_threshold + self.buffer_zone_size
            ));
        }

        if self.color_sample_stride == 0 {
            warnings.push("color_sample_stride = 0, using 1".to_string());
        }

        for (name, value) in [
            ("action_cooldown", self.action_cooldown),
            ("first_click_delay", self.first_click_delay),
            ("periodic_click_interval", self.periodic_click_interval),
        ] {
            if !(value >= 0.0) {
                warnings.push(format!("{} = {} is negative, treated as 0", name, value));
            }
        }

        warnings
    }
}

/// Returns the config.json location: next to the executable, or in the
/// working directory when only that one exists.
pub fn default_config_path() -> PathBuf {
    let beside_exe = crate::paths::get_exe_dir().join(CONFIG_FILE_NAME);
    if beside_exe.exists() {
        return beside_exe;
    }
    let in_cwd = PathBuf::from(CONFIG_FILE_NAME);
    if in_cwd.exists() { in_cwd } else { beside_exe }
}

/// Loads configuration from `path`, falling back to defaults on any problem.
pub fn load_config(path: &Path) -> DetectionConfig {
    info!("Looking for config at: {}", path.display());

    let config = if path.exists() {
        match read_config(path) {
            Ok(config) => {
                info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{:#}. Using defaults.", e);
                DetectionConfig::default()
            }
        }
    } else {
        info!("config.json not found. Using default config.");
        DetectionConfig::default()
    };

    for warning in config.validate() {
        warn!("Config: {}", warning);
    }

    config
}

/// Reads and parses a config file without any fallback.
pub fn read_config(path: &Path) -> Result<DetectionConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Writes configuration to `path` as pretty-printed JSON.
pub fn save_config(path: &Path, config: &DetectionConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Config saved to {}", path.display());
    Ok(())
}

/// Something the detection loop can take a configuration snapshot from.
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> DetectionConfig;
}

/// Configuration shared between the GUI thread and the detection thread.
#[derive(Clone, Debug, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<DetectionConfig>>,
}

impl SharedConfig {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Replaces the whole configuration.
    pub fn publish(&self, config: DetectionConfig) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Applies an in-place edit.
    pub fn update(&self, edit: impl FnOnce(&mut DetectionConfig)) {
        edit(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl ConfigSource for SharedConfig {
    fn snapshot(&self) -> DetectionConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Republishes config.json into a [`SharedConfig`] when the file changes on disk.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Starts watching `path`, treating its current contents as already loaded.
    pub fn new(path: PathBuf) -> Self {
        let last_modified = modified_time(&path);
        Self {
            path,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Marks the file's current state as seen, e.g. after saving it ourselves.
    pub fn mark_seen(&mut self) {
        self.last_modified = modified_time(&self.path);
    }

    /// Checks the file once.
    ///
    /// Returns `Ok(true)` when a changed file was loaded and published.
    /// A file that changed but fails to parse is reported as an error and
    /// not retried until it changes again.
    pub fn poll(&mut self, shared: &SharedConfig) -> Result<bool> {
        let Some(modified) = modified_time(&self.path) else {
            return Ok(false);
        };
        if self.last_modified == Some(modified) {
            return Ok(false);
        }
        self.last_modified = Some(modified);

        let config = read_config(&self.path)?;
        for warning in config.validate() {
            warn!("Config: {}", warning);
        }
        shared.publish(config);
        info!("Config reloaded from {}", self.path.display());
        Ok(true)
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_rgba() {
        assert_eq!(
            RgbColor::parse("rgba(251,98,76,255)").unwrap(),
            RgbColor::new(251, 98, 76)
        );
        assert_eq!(
            RgbColor::parse(" rgb(1, 2, 3) ").unwrap(),
            RgbColor::new(1, 2, 3)
        );
        assert!(RgbColor::parse("#ff0000").is_err());
        assert!(RgbColor::parse("rgba(300,0,0,255)").is_err());
        assert!(RgbColor::parse("rgba(1,2)").is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DetectionConfig =
            serde_json::from_str(r#"{"line_threshold": 180, "green_tolerance": 45}"#).unwrap();
        assert_eq!(config.line_threshold, 180);
        assert_eq!(config.color_threshold, 45);
        assert_eq!(config.buffer_zone_size, 0.13);
        assert_eq!(config.red_color, DEFAULT_RED);
        assert!(config.region.is_none());
    }

    #[test]
    fn test_durations() {
        let config = DetectionConfig {
            action_cooldown: -1.0,
            first_click_delay: 1.5,
            ..Default::default()
        };
        assert_eq!(config.action_cooldown(), Duration::ZERO);
        assert_eq!(config.first_click_delay(), Duration::from_millis(1500));
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_validate() {
        assert!(DetectionConfig::default().validate().is_empty());

        let degenerate = DetectionConfig {
            red_zone_threshold: 0.3,
            buffer_zone_size: 0.25,
            ..Default::default()
        };
        let warnings = degenerate.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no safe zone"));
    }

    #[test]
    fn test_safe_band() {
        let (min, max) = DetectionConfig::default().safe_band();
        assert!((min - 0.33).abs() < 1e-9);
        assert!((max - 0.67).abs() < 1e-9);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = DetectionConfig {
            line_threshold: 220,
            region: Some(CaptureRegion::new(10, 20, 390, 50).unwrap()),
            ..Default::default()
        };
        save_config(&path, &config).unwrap();

        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn test_load_invalid_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(load_config(&path), DetectionConfig::default());
        assert_eq!(
            load_config(&dir.path().join("missing.json")),
            DetectionConfig::default()
        );
    }

    #[test]
    fn test_shared_config_snapshot_is_independent() {
        let shared = SharedConfig::new(DetectionConfig::default());
        let before = shared.snapshot();

        shared.update(|c| c.line_threshold = 90);

        assert_eq!(before.line_threshold, 200);
        assert_eq!(shared.snapshot().line_threshold, 90);
    }

    #[test]
    fn test_watcher_publishes_changed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        save_config(&path, &DetectionConfig::default()).unwrap();

        let shared = SharedConfig::new(DetectionConfig::default());
        let mut watcher = ConfigWatcher::new(path.clone());
        assert!(!watcher.poll(&shared).unwrap());

        // Force a different modification time regardless of filesystem resolution.
        fs::write(&path, r#"{"line_threshold": 150}"#).unwrap();
        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
        drop(file);

        assert!(watcher.poll(&shared).unwrap());
        assert_eq!(shared.snapshot().line_threshold, 150);
        assert!(!watcher.poll(&shared).unwrap());
    }
}
