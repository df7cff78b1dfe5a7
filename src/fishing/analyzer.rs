//! Gauge analysis: turns one captured frame into a [`GaugeReading`].
//!
//! Two independent passes run over the frame:
//! - Line localization: the bright vertical indicator is the column with the
//!   most pixels at or above `line_threshold` luma.
//! - Color scan: pixels along the vertical midpoint are sampled at a fixed
//!   stride and matched against the green and red reference colors.

use image::{Rgba, RgbaImage};

use crate::fishing::config::{DetectionConfig, RgbColor};
use crate::fishing::zone::{classify, Zone};

/// Result of analyzing a single frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaugeReading {
    /// Pixel column of the indicator within the frame, if one was found
    pub indicator_x: Option<u32>,
    /// Width of the analyzed frame in pixels
    pub width: u32,
    pub has_green_zone: bool,
    pub has_red_zone: bool,
}

/// How much of the gauge a reading contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completeness {
    /// Indicator and both zone colors present
    Complete,
    /// Indicator present, one or both zone colors missing
    Incomplete,
    /// No indicator
    Absent,
}

impl GaugeReading {
    /// Indicator position as a fraction of the frame width.
    pub fn relative_position(&self) -> Option<f64> {
        match self.indicator_x {
            Some(x) if self.width > 0 => Some(x as f64 / self.width as f64),
            _ => None,
        }
    }

    pub fn completeness(&self) -> Completeness {
        match self.indicator_x {
            None => Completeness::Absent,
            Some(_) if self.has_green_zone && self.has_red_zone => Completeness::Complete,
            Some(_) => Completeness::Incomplete,
        }
    }

    /// Zone of the indicator. Only complete readings carry a usable position.
    pub fn zone(&self, config: &DetectionConfig) -> Zone {
        match (self.completeness(), self.relative_position()) {
            (Completeness::Complete, Some(position)) => classify(position, config),
            _ => Zone::Unknown,
        }
    }
}

/// Outcome of matching one sampled pixel against the reference colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelColor {
    Green,
    Red,
    Other,
}

/// Luma of a pixel using the ITU-R BT.601 weights, rounded to 0-255.
pub fn luma(pixel: &Rgba<u8>) -> u8 {
    let r = pixel[0] as f32;
    let g = pixel[1] as f32;
    let b = pixel[2] as f32;
    (0.299 * r + 0.587 * g + 0.114 * b).round().min(255.0) as u8
}

/// Finds the x position of the vertical indicator line.
///
/// Returns the first column with the highest count of pixels whose luma is at
/// least `threshold`, or `None` when no pixel reaches the threshold.
pub fn find_white_line(img: &RgbaImage, threshold: u8) -> Option<u32> {
    let mut column_counts = vec![0u32; img.width() as usize];

    for (x, _y, pixel) in img.enumerate_pixels() {
        if luma(pixel) >= threshold {
            column_counts[x as usize] += 1;
        }
    }

    let mut best: Option<(u32, u32)> = None;
    for (x, &count) in column_counts.iter().enumerate() {
        if count > 0 && best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((x as u32, count));
        }
    }

    best.map(|(x, _)| x)
}

/// Sum of absolute per-channel differences.
pub fn color_distance(pixel: &Rgba<u8>, reference: RgbColor) -> u32 {
    pixel[0].abs_diff(reference.r) as u32
        + pixel[1].abs_diff(reference.g) as u32
        + pixel[2].abs_diff(reference.b) as u32
}

/// Matches a pixel against the green and red reference colors.
///
/// A pixel matches a color when its distance is below `color_threshold` and
/// strictly smaller than its distance to the other color.
pub fn classify_pixel(pixel: &Rgba<u8>, config: &DetectionConfig) -> PixelColor {
    let green = color_distance(pixel, config.green_color);
    let red = color_distance(pixel, config.red_color);

    if green < config.color_threshold && green < red {
        PixelColor::Green
    } else if red < config.color_threshold && red < green {
        PixelColor::Red
    } else {
        PixelColor::Other
    }
}

/// Classifies the pixel at `(x, y)`; coordinates outside the frame are `Other`.
pub fn sample_color(img: &RgbaImage, x: u32, y: u32, config: &DetectionConfig) -> PixelColor {
    img.get_pixel_checked(x, y)
        .map_or(PixelColor::Other, |pixel| classify_pixel(pixel, config))
}

/// Scans the vertical midpoint for the zone colors.
///
/// Returns `(has_green, has_red)`. Stops as soon as both have been seen.
pub fn scan_zone_colors(img: &RgbaImage, config: &DetectionConfig) -> (bool, bool) {
    let y = img.height() / 2;
    let stride = config.color_sample_stride.max(1) as usize;

    let mut found_green = false;
    let mut found_red = false;

    for x in (0..img.width()).step_by(stride) {
        match sample_color(img, x, y, config) {
            PixelColor::Green => found_green = true,
            PixelColor::Red => found_red = true,
            PixelColor::Other => {}
        }
        if found_green && found_red {
            break;
        }
    }

    (found_green, found_red)
}

/// Runs both passes over a frame.
pub fn analyze(img: &RgbaImage, config: &DetectionConfig) -> GaugeReading {
    let indicator_x = find_white_line(img, config.line_threshold);
    let (has_green_zone, has_red_zone) = scan_zone_colors(img, config);

    GaugeReading {
        indicator_x,
        width: img.width(),
        has_green_zone,
        has_red_zone,
    }
}
