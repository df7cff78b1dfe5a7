//! Screen rectangle that contains the gauge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a rectangle cannot be used as a capture region.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("region has zero or negative width ({x1}..{x2})")]
    EmptyWidth { x1: i32, x2: i32 },
    #[error("region has zero or negative height ({y1}..{y2})")]
    EmptyHeight { y1: i32, y2: i32 },
}

/// A rectangle in screen coordinates with `x1 < x2` and `y1 < y2`.
///
/// Serialized as a four-element array `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct CaptureRegion {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl CaptureRegion {
    /// Creates a region from already-ordered corners.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self, RegionError> {
        if x2 <= x1 {
            return Err(RegionError::EmptyWidth { x1, x2 });
        }
        if y2 <= y1 {
            return Err(RegionError::EmptyHeight { y1, y2 });
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Creates a region from two opposite corners picked in any order.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Result<Self, RegionError> {
        Self::new(a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1))
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn x2(&self) -> i32 {
        self.x2
    }

    pub fn y2(&self) -> i32 {
        self.y2
    }

    pub fn width(&self) -> u32 {
        self.x2.abs_diff(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.abs_diff(self.y1)
    }
}

impl TryFrom<[i32; 4]> for CaptureRegion {
    type Error = RegionError;

    fn try_from([x1, y1, x2, y2]: [i32; 4]) -> Result<Self, Self::Error> {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<CaptureRegion> for [i32; 4] {
    fn from(region: CaptureRegion) -> Self {
        [region.x1, region.y1, region.x2, region.y2]
    }
}

impl std::fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) - ({}, {}) [{}x{}]",
            self.x1,
            self.y1,
            self.x2,
            self.y2,
            self.width(),
            self.height()
        )
    }
}
