//! Mapping of an indicator position onto the gauge's colored zones.

use crate::fishing::config::DetectionConfig;

/// Where the indicator sits on the gauge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Zone {
    Safe,
    CautionLeft,
    CautionRight,
    DangerLeft,
    DangerRight,
    /// Indicator not found, or the gauge colors are missing
    Unknown,
}

impl Zone {
    /// True for the zones where clicking pushes the indicator back toward the middle.
    pub fn wants_click(self) -> bool {
        matches!(self, Zone::Safe | Zone::CautionLeft | Zone::DangerLeft)
    }

    /// True for the zones right of the safe band, where clicking would overshoot.
    pub fn is_right_side(self) -> bool {
        matches!(self, Zone::CautionRight | Zone::DangerRight)
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Zone::Safe => write!(f, "SAFE"),
            Zone::CautionLeft => write!(f, "NEAR LEFT RED"),
            Zone::CautionRight => write!(f, "NEAR RIGHT RED"),
            Zone::DangerLeft => write!(f, "LEFT RED"),
            Zone::DangerRight => write!(f, "RIGHT RED"),
            Zone::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classifies a relative position (0.0 = left edge, 1.0 = right edge).
///
/// Comparisons are strict on both sides, so a position exactly on a boundary
/// belongs to the zone nearer the middle: `red_zone_threshold` itself is
/// CautionLeft, and `red_zone_threshold + buffer_zone_size` is Safe. When the
/// thresholds leave no safe band the left-side checks win and nothing is Safe.
pub fn classify(position: f64, config: &DetectionConfig) -> Zone {
    let red = config.red_zone_threshold;
    let buffer = config.buffer_zone_size;

    if position < red {
        Zone::DangerLeft
    } else if position < red + buffer {
        Zone::CautionLeft
    } else if position > 1.0 - red {
        Zone::DangerRight
    } else if position > 1.0 - red - buffer {
        Zone::CautionRight
    } else {
        Zone::Safe
    }
}
