//! Upload/download progress reporting.

use std::sync::Arc;

/// Which direction a progress event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Request body leaving the client.
    Upload,
    /// Response body arriving from the server.
    Download,
}

/// One progress event. Only emitted when the total is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes transferred so far.
    pub loaded: u64,
    /// Total bytes expected.
    pub total: u64,
    /// `round(100 * loaded / total)`.
    pub percent: u32,
    /// Transfer direction.
    pub phase: ProgressPhase,
}

impl Progress {
    /// Builds an event, computing the rounded percentage.
    #[must_use]
    pub fn new(loaded: u64, total: u64, phase: ProgressPhase) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((loaded as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            loaded,
            total,
            percent,
            phase,
        }
    }
}

/// The per-call progress hook. Its presence switches the transport to the
/// streaming path.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds() {
        assert_eq!(Progress::new(1, 3, ProgressPhase::Upload).percent, 33);
        assert_eq!(Progress::new(2, 3, ProgressPhase::Upload).percent, 67);
        assert_eq!(Progress::new(3, 3, ProgressPhase::Download).percent, 100);
        assert_eq!(Progress::new(0, 0, ProgressPhase::Download).percent, 0);
    }
}
