//! Per-iteration click decisions.
//!
//! The controller sees one reading at a time and decides whether to click:
//! - Complete gauge: click while the indicator is in or left of the safe band,
//!   at most once per `action_cooldown`. Never click right of the safe band.
//! - Incomplete gauge: recovery click every `periodic_click_interval`.
//! - Missing gauge (after it was seen once): recovery click every
//!   `periodic_click_interval`, starting `first_click_delay` after the last
//!   complete reading.

use std::time::{Duration, Instant};

use crate::fishing::analyzer::{Completeness, GaugeReading};
use crate::fishing::config::DetectionConfig;
use crate::fishing::status::{Severity, Status};
use crate::fishing::zone::Zone;

/// Why a click was issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickKind {
    /// The indicator is at a position where clicking is wanted
    Position,
    /// The gauge is missing or partial and a click may bring it back
    Recovery,
}

/// What one iteration should do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub click: Option<ClickKind>,
    pub status: Status,
}

impl Decision {
    fn idle(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            click: None,
            status: Status::new(text, severity),
        }
    }

    fn click(kind: ClickKind, text: impl Into<String>, severity: Severity) -> Self {
        Self {
            click: Some(kind),
            status: Status::new(text, severity),
        }
    }
}

/// Timers carried between iterations of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub last_action_time: Option<Instant>,
    pub last_recovery_click_time: Option<Instant>,
    pub last_detection_time: Option<Instant>,
    pub gauge_ever_detected: bool,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Time since `then`, or `None` if it never happened.
fn since(now: Instant, then: Option<Instant>) -> Option<Duration> {
    then.map(|t| now.saturating_duration_since(t))
}

/// Decides the action for one reading and updates the timers accordingly.
///
/// `zone` is the classification of `reading`; it is only consulted for
/// complete readings.
pub fn decide(
    state: &mut ControllerState,
    reading: &GaugeReading,
    zone: Zone,
    config: &DetectionConfig,
    now: Instant,
) -> Decision {
    let recovery_due = since(now, state.last_recovery_click_time)
        .is_none_or(|elapsed| elapsed >= config.periodic_click_interval());

    match reading.completeness() {
        Completeness::Complete => {
            state.last_detection_time = Some(now);
            state.gauge_ever_detected = true;
            decide_position(state, zone, config, now)
        }

        Completeness::Incomplete => {
            if recovery_due {
                state.last_recovery_click_time = Some(now);
                Decision::click(
                    ClickKind::Recovery,
                    format!(
                        "Incomplete gauge - Clicking every {}s",
                        config.periodic_click_interval
                    ),
                    Severity::Warning,
                )
            } else {
                Decision::idle("Incomplete gauge detected", Severity::Warning)
            }
        }

        Completeness::Absent if state.gauge_ever_detected => {
            let missing_long_enough = since(now, state.last_detection_time)
                .is_some_and(|elapsed| elapsed >= config.first_click_delay());

            if missing_long_enough && recovery_due {
                state.last_recovery_click_time = Some(now);
                Decision::click(
                    ClickKind::Recovery,
                    format!(
                        "Gauge missing - Clicking every {}s",
                        config.periodic_click_interval
                    ),
                    Severity::Warning,
                )
            } else {
                Decision::idle("Gauge missing", Severity::Warning)
            }
        }

        Completeness::Absent => Decision::idle("No gauge", Severity::Info),
    }
}

fn decide_position(
    state: &mut ControllerState,
    zone: Zone,
    config: &DetectionConfig,
    now: Instant,
) -> Decision {
    let severity = match zone {
        Zone::Safe => Severity::Success,
        Zone::CautionLeft | Zone::DangerLeft => Severity::Warning,
        Zone::CautionRight | Zone::DangerRight => Severity::Danger,
        Zone::Unknown => Severity::Info,
    };

    if zone.is_right_side() {
        return Decision::idle(format!("{} - Stop Clicking!", zone), severity);
    }
    if !zone.wants_click() {
        return Decision::idle("Monitoring...", severity);
    }

    let cooled_down = since(now, state.last_action_time)
        .is_none_or(|elapsed| elapsed > config.action_cooldown());

    if cooled_down {
        state.last_action_time = Some(now);
        Decision::click(ClickKind::Position, format!("{} - Clicking!", zone), severity)
    } else {
        Decision::idle(format!("{} - Cooldown", zone), severity)
    }
}
