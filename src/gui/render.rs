//! GUI rendering functions.
//!
//! Contains UI layout and component rendering logic.

use std::time::Instant;

use eframe::egui::{self, Color32, Pos2, Rect, RichText, Stroke, Vec2};

use super::state::{Corner, GuiState};
use crate::fishing::{DetectionConfig, DetectorState, SessionSummary, Severity};
use crate::fishing::status::StatusSnapshot;

const GAUGE_HEIGHT: f32 = 28.0;

/// Actions requested from the region section.
#[derive(Default)]
pub struct RegionActions {
    pub apply: bool,
    pub pick: Option<Corner>,
}

/// Display color for a status severity.
pub fn severity_color(severity: Severity) -> Color32 {
    match severity {
        Severity::Success => Color32::from_rgb(46, 204, 113),
        Severity::Warning => Color32::from_rgb(243, 156, 18),
        Severity::Danger => Color32::from_rgb(231, 76, 60),
        Severity::Info => Color32::from_rgb(52, 152, 219),
    }
}

fn corner_inputs(ui: &mut egui::Ui, label: &str, corner: &mut (i32, i32)) {
    ui.label(label);
    ui.add(egui::DragValue::new(&mut corner.0).range(-16384..=16384).prefix("x "));
    ui.add(egui::DragValue::new(&mut corner.1).range(-16384..=16384).prefix("y "));
}

/// Render the region inputs and corner pick buttons.
pub fn render_region(ui: &mut egui::Ui, state: &mut GuiState, running: bool) -> RegionActions {
    let mut actions = RegionActions::default();

    ui.label(RichText::new("Gauge region").strong());
    ui.add_space(4.0);

    ui.add_enabled_ui(!running, |ui| {
        ui.horizontal(|ui| {
            corner_inputs(ui, "Corner 1:", &mut state.corner_a);
            if ui.button("Pick").clicked() {
                actions.pick = Some(Corner::First);
            }
        });
        ui.horizontal(|ui| {
            corner_inputs(ui, "Corner 2:", &mut state.corner_b);
            if ui.button("Pick").clicked() {
                actions.pick = Some(Corner::Second);
            }
        });

        ui.horizontal(|ui| {
            if ui.button("Use region").clicked() {
                actions.apply = true;
            }
            if let Some(pick) = &state.pick {
                ui.label(format!(
                    "Move the cursor to the corner... {}",
                    pick.remaining_secs(Instant::now())
                ));
            }
        });
    });

    actions
}

/// Render the start/stop buttons.
/// Returns (start_clicked, stop_clicked).
pub fn render_controls(ui: &mut egui::Ui, detector: DetectorState) -> (bool, bool) {
    let mut start_clicked = false;
    let mut stop_clicked = false;

    ui.add_space(8.0);
    ui.separator();
    ui.add_space(8.0);

    ui.horizontal(|ui| {
        let can_start = matches!(detector, DetectorState::Armed | DetectorState::Stopped);
        let running = detector == DetectorState::Running;

        ui.add_enabled_ui(can_start, |ui| {
            if ui.button(RichText::new("▶ Start").size(16.0)).clicked() {
                start_clicked = true;
            }
        });

        ui.add_space(20.0);

        ui.add_enabled_ui(running, |ui| {
            if ui.button(RichText::new("◼ Stop").size(16.0)).clicked() {
                stop_clicked = true;
            }
        });

        ui.add_space(20.0);
        ui.label(format!("State: {}", detector));
    });

    (start_clicked, stop_clicked)
}

/// Render the latest status line.
pub fn render_status(ui: &mut egui::Ui, snapshot: &StatusSnapshot) {
    ui.add_space(8.0);
    ui.horizontal(|ui| {
        ui.label("Status:");
        ui.label(
            RichText::new(&snapshot.status.text)
                .color(severity_color(snapshot.status.severity))
                .strong(),
        );
    });
    if let Some(position) = snapshot.position {
        ui.label(format!("Position: {:.1}%", position * 100.0));
    }
}

/// Horizontal slice of `rect` between two relative positions.
fn band(rect: Rect, from: f64, to: f64) -> Rect {
    let from = from.clamp(0.0, 1.0) as f32;
    let to = to.clamp(0.0, 1.0) as f32;
    Rect::from_min_max(
        Pos2::new(rect.left() + rect.width() * from, rect.top()),
        Pos2::new(rect.left() + rect.width() * to, rect.bottom()),
    )
}

/// Render the gauge with its zones and the last indicator position.
pub fn render_gauge(ui: &mut egui::Ui, config: &DetectionConfig, position: Option<f64>) {
    ui.add_space(8.0);

    let (rect, _response) = ui.allocate_exact_size(
        Vec2::new(ui.available_width(), GAUGE_HEIGHT),
        egui::Sense::hover(),
    );
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 2.0, Color32::from_gray(40));

    let red = config.red_zone_threshold;
    let (safe_min, safe_max) = config.safe_band();
    let danger = severity_color(Severity::Danger);
    let caution = severity_color(Severity::Warning);

    painter.rect_filled(band(rect, 0.0, red), 0.0, danger);
    painter.rect_filled(band(rect, red, safe_min), 0.0, caution);
    painter.rect_filled(band(rect, safe_max, 1.0 - red), 0.0, caution);
    painter.rect_filled(band(rect, 1.0 - red, 1.0), 0.0, danger);
    if safe_min < safe_max {
        painter.rect_filled(
            band(rect, safe_min, safe_max),
            0.0,
            severity_color(Severity::Success),
        );
    }

    if let Some(position) = position {
        let x = rect.left() + rect.width() * position.clamp(0.0, 1.0) as f32;
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            Stroke::new(3.0, Color32::WHITE),
        );
    }
}

/// Render the tuning sliders.
/// Returns (changed, save_clicked).
pub fn render_settings(ui: &mut egui::Ui, config: &mut DetectionConfig) -> (bool, bool) {
    let mut changed = false;
    let mut save_clicked = false;

    ui.add_space(8.0);
    ui.separator();

    egui::CollapsingHeader::new("Settings").show(ui, |ui| {
        changed |= ui
            .add(egui::Slider::new(&mut config.red_zone_threshold, 0.0..=0.5).text("Red zone"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut config.buffer_zone_size, 0.0..=0.5).text("Buffer zone"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut config.line_threshold, 0..=255).text("Line threshold"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut config.color_threshold, 0..=255).text("Color threshold"))
            .changed();
        changed |= ui
            .add(
                egui::Slider::new(&mut config.action_cooldown, 0.0..=2.0)
                    .text("Click cooldown (s)"),
            )
            .changed();
        changed |= ui
            .add(
                egui::Slider::new(&mut config.first_click_delay, 0.0..=10.0)
                    .text("First recovery click (s)"),
            )
            .changed();
        changed |= ui
            .add(
                egui::Slider::new(&mut config.periodic_click_interval, 0.5..=30.0)
                    .text("Recovery interval (s)"),
            )
            .changed();

        for warning in config.validate() {
            ui.label(RichText::new(warning).color(severity_color(Severity::Warning)));
        }

        ui.add_space(4.0);
        if ui.button("Save to config.json").clicked() {
            save_clicked = true;
        }
    });

    (changed, save_clicked)
}

/// Render the counters of the last finished run.
pub fn render_summary(ui: &mut egui::Ui, summary: Option<&SessionSummary>) {
    let Some(summary) = summary else {
        return;
    };

    ui.add_space(8.0);
    ui.separator();
    ui.label(RichText::new("Last session").strong());
    ui.label(format!(
        "{:.1}s, {} iterations, {} failed",
        summary.duration.as_secs_f32(),
        summary.iterations,
        summary.failed_iterations
    ));
    ui.label(format!(
        "{} clicks ({} position, {} recovery)",
        summary.total_clicks(),
        summary.position_clicks,
        summary.recovery_clicks
    ));
}
