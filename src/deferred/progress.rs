//! Transfer progress events.

/// A download or upload progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes transferred so far.
    pub loaded: u64,
    /// Total bytes expected, when the transport knows it.
    pub total: Option<u64>,
}

impl Progress {
    /// Creates a progress event.
    pub fn new(loaded: u64, total: Option<u64>) -> Self {
        Self { loaded, total }
    }

    /// Completed fraction in `[0, 1]`, when the total is known and
    /// non-zero.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.loaded as f64 / total as f64),
            _ => None,
        }
    }
}
