//! GUI application state management.
//!
//! Tracks the region being edited, cursor-based corner picking, and the
//! last finished session for display.

use std::time::{Duration, Instant};

use crate::fishing::region::RegionError;
use crate::fishing::{CaptureRegion, SessionSummary};

/// Time the user gets to move the cursor onto a gauge corner.
pub const PICK_DELAY: Duration = Duration::from_secs(3);

/// Which corner of the region a pick fills in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    First,
    Second,
}

/// A pending cursor pick.
#[derive(Clone, Copy, Debug)]
pub struct CornerPick {
    pub corner: Corner,
    pub due: Instant,
}

impl CornerPick {
    /// Whole seconds left before the cursor is read, for the countdown label.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        let left = self.due.saturating_duration_since(now);
        left.as_secs() + u64::from(left.subsec_nanos() > 0)
    }
}

/// GUI application state.
#[derive(Debug, Default)]
pub struct GuiState {
    /// First corner of the region (screen pixels).
    pub corner_a: (i32, i32),
    /// Opposite corner of the region (screen pixels).
    pub corner_b: (i32, i32),
    /// Corner waiting for the cursor position.
    pub pick: Option<CornerPick>,
    /// Last error or notice shown under the controls.
    pub message: Option<String>,
    /// Counters of the last stopped run.
    pub last_summary: Option<SessionSummary>,
}

impl GuiState {
    /// Builds a region from the two corners in any order.
    pub fn region_from_inputs(&self) -> Result<CaptureRegion, RegionError> {
        CaptureRegion::from_corners(self.corner_a, self.corner_b)
    }

    /// Fills the corner inputs from an existing region.
    pub fn set_region_inputs(&mut self, region: CaptureRegion) {
        self.corner_a = (region.x1(), region.y1());
        self.corner_b = (region.x2(), region.y2());
    }

    pub fn start_pick(&mut self, corner: Corner, now: Instant) {
        self.pick = Some(CornerPick {
            corner,
            due: now + PICK_DELAY,
        });
    }

    /// Returns the pending corner once its countdown has elapsed.
    pub fn take_due_pick(&mut self, now: Instant) -> Option<Corner> {
        match self.pick {
            Some(pick) if now >= pick.due => {
                self.pick = None;
                Some(pick.corner)
            }
            _ => None,
        }
    }

    pub fn set_corner(&mut self, corner: Corner, position: (i32, i32)) {
        match corner {
            Corner::First => self.corner_a = position,
            Corner::Second => self.corner_b = position,
        }
    }
}
