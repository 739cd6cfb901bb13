//! Severity Tracking

use std::sync::atomic::{AtomicU8, Ordering};

use crate::event::InfoType;

/// The worst severity seen so far, safe to update from many threads.
#[derive(Debug, Default)]
pub struct SeverityTracker {
    // rank + 1, zero while nothing was recorded
    worst: AtomicU8,
}

impl SeverityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, severity: InfoType) {
        self.worst.fetch_max(severity.rank() + 1, Ordering::SeqCst);
    }

    pub fn value(&self) -> Option<InfoType> {
        match self.worst.load(Ordering::SeqCst) {
            0 => None,
            stored => InfoType::from_rank(stored - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_tracker() {
        assert_eq!(SeverityTracker::new().value(), None);
    }

    #[test]
    fn test_keeps_maximum() {
        let tracker = SeverityTracker::new();
        tracker.record(InfoType::Warning);
        tracker.record(InfoType::Debug);
        assert_eq!(tracker.value(), Some(InfoType::Warning));
        tracker.record(InfoType::Fatal);
        assert_eq!(tracker.value(), Some(InfoType::Fatal));
    }

    #[test]
    fn test_concurrent_updates() {
        let tracker = SeverityTracker::new();
        thread::scope(|scope| {
            for severity in InfoType::ALL {
                let tracker = &tracker;
                scope.spawn(move || {
                    for _ in 0..100 {
                        tracker.record(severity);
                    }
                });
            }
        });
        assert_eq!(tracker.value(), Some(InfoType::Deadly));
    }
}
