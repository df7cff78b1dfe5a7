//! Status reporting from the detection loop to whoever displays it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// How a status message should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Warning,
    Danger,
    Info,
}

/// One status message produced by an iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub severity: Severity,
}

impl Status {
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }
}

/// Receiver of per-iteration updates. Implementations must not block.
pub trait StatusSink: Send + Sync {
    fn update_status(&self, text: &str, severity: Severity);
    fn update_position(&self, relative: f64);
}

/// Latest values seen by a [`StatusBoard`].
#[derive(Clone, Debug)]
pub struct StatusSnapshot {
    pub status: Status,
    /// Last reported indicator position
    pub position: Option<f64>,
    /// When the last status arrived
    pub updated_at: Option<Instant>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            status: Status::new("Select a region", Severity::Info),
            position: None,
            updated_at: None,
        }
    }
}

/// A [`StatusSink`] that keeps only the latest values for a UI to poll.
#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forgets the last position, e.g. when a new run starts.
    pub fn clear_position(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .position = None;
    }
}

impl StatusSink for StatusBoard {
    fn update_status(&self, text: &str, severity: Severity) {
        let mut snapshot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot.status = Status::new(text, severity);
        snapshot.updated_at = Some(Instant::now());
    }

    fn update_position(&self, relative: f64) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .position = Some(relative);
    }
}
