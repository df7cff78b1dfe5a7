//! GUI module for the application.
//!
//! Provides a graphical interface using egui/eframe for selecting the gauge
//! region, starting and stopping detection, and tuning the thresholds.

pub mod render;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Vec2};
use tracing::{info, warn};

use crate::capture::GdiScreenCapture;
use crate::fishing::config::ConfigSource;
use crate::fishing::{
    save_config, ConfigWatcher, DetectionConfig, Detector, Severity, SharedConfig,
    StatusBoard, StatusSink,
};
use crate::input::{get_cursor_position, SendInputClicker};

use state::GuiState;

/// How often config.json is checked for outside edits.
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Main GUI application struct.
pub struct GuiApp {
    /// Application state.
    state: GuiState,
    detector: Detector,
    config: SharedConfig,
    board: StatusBoard,
    watcher: ConfigWatcher,
    last_config_check: Instant,
}

impl GuiApp {
    /// Create a new GUI application instance.
    pub fn new(config_path: PathBuf, config: DetectionConfig) -> Self {
        let mut state = GuiState::default();
        let mut detector = Detector::new();
        let board = StatusBoard::new();

        if let Some(region) = config.region {
            state.set_region_inputs(region);
            if detector.select_region(region).is_ok() {
                board.update_status(&format!("Region {} - Ready", region), Severity::Info);
            }
        }

        Self {
            state,
            detector,
            config: SharedConfig::new(config),
            board,
            watcher: ConfigWatcher::new(config_path),
            last_config_check: Instant::now(),
        }
    }

    /// Reload config.json if it changed on disk.
    fn poll_config(&mut self) {
        if self.last_config_check.elapsed() < CONFIG_POLL_INTERVAL {
            return;
        }
        self.last_config_check = Instant::now();

        match self.watcher.poll(&self.config) {
            Ok(true) => self.state.message = Some("Config reloaded from disk".to_string()),
            Ok(false) => {}
            Err(e) => {
                warn!("Config reload failed: {:#}", e);
                self.state.message = Some(format!("Config reload failed: {:#}", e));
            }
        }
    }

    /// Read the cursor once a corner pick countdown has elapsed.
    fn update_pick(&mut self) {
        let Some(corner) = self.state.take_due_pick(Instant::now()) else {
            return;
        };
        match get_cursor_position() {
            Ok(position) => {
                info!("GUI: Picked {:?} corner at {:?}", corner, position);
                self.state.set_corner(corner, position);
            }
            Err(e) => self.state.message = Some(format!("Failed to read cursor: {}", e)),
        }
    }

    /// Handle "Use region" button click.
    fn handle_apply_region(&mut self) {
        let region = match self.state.region_from_inputs() {
            Ok(region) => region,
            Err(e) => {
                self.state.message = Some(e.to_string());
                return;
            }
        };

        match self.detector.select_region(region) {
            Ok(()) => {
                self.config.update(|config| config.region = Some(region));
                self.state.set_region_inputs(region);
                self.state.message = None;
                self.board
                    .update_status(&format!("Region {} - Ready", region), Severity::Info);
            }
            Err(e) => self.state.message = Some(e.to_string()),
        }
    }

    /// Handle start button click.
    fn handle_start(&mut self) {
        self.board.clear_position();
        let result = self.detector.start(
            Box::new(GdiScreenCapture),
            Box::new(SendInputClicker),
            Arc::new(self.board.clone()),
            Arc::new(self.config.clone()),
        );

        match result {
            Ok(()) => {
                self.state.message = None;
                info!("GUI: Started detection");
            }
            Err(e) => {
                warn!("GUI: Failed to start detection: {}", e);
                self.state.message = Some(e.to_string());
            }
        }
    }

    /// Handle stop button click.
    fn handle_stop(&mut self) {
        match self.detector.stop() {
            Ok(summary) => {
                info!("GUI: Session finished: {}", summary);
                self.board.update_status("Stopped", Severity::Info);
                self.state.last_summary = Some(summary);
            }
            Err(e) => {
                warn!("GUI: Failed to stop detection: {}", e);
                self.state.message = Some(e.to_string());
            }
        }
    }

    /// Handle save button click.
    fn handle_save(&mut self) {
        let snapshot = self.config.snapshot();
        match save_config(self.watcher.path(), &snapshot) {
            Ok(()) => {
                self.watcher.mark_seen();
                self.state.message = Some("Settings saved".to_string());
            }
            Err(e) => {
                warn!("GUI: {:#}", e);
                self.state.message = Some(format!("{:#}", e));
            }
        }
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_config();
        self.update_pick();

        // Request repaint while running or counting down (for status updates)
        if self.detector.is_running() || self.state.pick.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else {
            ctx.request_repaint_after(CONFIG_POLL_INTERVAL);
        }

        let running = self.detector.is_running();
        let status = self.board.snapshot();
        let mut settings = self.config.snapshot();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Gauge Fisher");
            ui.add_space(16.0);

            egui::ScrollArea::vertical().show(ui, |ui| {
                let region = render::render_region(ui, &mut self.state, running);
                if let Some(corner) = region.pick {
                    self.state.start_pick(corner, Instant::now());
                }
                if region.apply {
                    self.handle_apply_region();
                }

                let (start_clicked, stop_clicked) =
                    render::render_controls(ui, self.detector.state());
                if start_clicked {
                    self.handle_start();
                }
                if stop_clicked {
                    self.handle_stop();
                }

                render::render_status(ui, &status);
                render::render_gauge(ui, &settings, status.position);

                let (changed, save_clicked) = render::render_settings(ui, &mut settings);
                if changed {
                    self.config.publish(settings.clone());
                }
                if save_clicked {
                    self.handle_save();
                }

                render::render_summary(ui, self.state.last_summary.as_ref());

                if let Some(message) = &self.state.message {
                    ui.add_space(8.0);
                    ui.label(message);
                }
            });
        });
    }
}

/// Run the GUI application.
/// This function blocks until the window is closed.
pub fn run_gui(config_path: PathBuf, config: DetectionConfig) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(460.0, 520.0))
            .with_min_inner_size(Vec2::new(380.0, 360.0))
            .with_title("Gauge Fisher")
            .with_always_on_top(),
        ..Default::default()
    };

    eframe::run_native(
        "Gauge Fisher",
        options,
        Box::new(move |_cc| Ok(Box::new(GuiApp::new(config_path, config)))),
    )
}
