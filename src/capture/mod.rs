//! Screen capture of a fixed desktop region.
//!
//! This module provides:
//! - Region capture through GDI (`capture_screen_region`)
//! - A [`FrameSource`](crate::fishing::FrameSource) for the detection loop (`GdiScreenCapture`)

pub mod screen;

pub use screen::GdiScreenCapture;
