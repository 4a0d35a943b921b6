//! Viewer-count reconciliation.
//!
//! Deltas are applied speculatively between authoritative snapshots. No
//! ordering between the two is assumed: the count is always the most recent
//! snapshot plus the deltas applied after it, clamped at zero.

/// Incremental viewer change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerDelta {
    /// One viewer joined (+1).
    Join,
    /// One viewer left (-1).
    Leave,
}

/// Non-negative viewer counter for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerCountAggregator {
    count: u64,
    deltas_since_snapshot: u32,
}

impl ViewerCountAggregator {
    /// Start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a delta. A leave at zero stays at zero.
    pub fn apply_delta(&mut self, delta: ViewerDelta) -> u64 {
        self.count = match delta {
            ViewerDelta::Join => self.count.saturating_add(1),
            ViewerDelta::Leave => self.count.saturating_sub(1),
        };
        self.deltas_since_snapshot = self.deltas_since_snapshot.saturating_add(1);
        self.count
    }

    /// Replace the count with an authoritative value.
    pub fn apply_snapshot(&mut self, count: u64) -> u64 {
        self.count = count;
        self.deltas_since_snapshot = 0;
        self.count
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Deltas applied since the last snapshot. Zero means the count is
    /// exactly what the server last reported.
    pub fn deltas_since_snapshot(&self) -> u32 {
        self.deltas_since_snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_clamps_at_zero() {
        let mut viewers = ViewerCountAggregator::new();
        viewers.apply_delta(ViewerDelta::Join);
        viewers.apply_delta(ViewerDelta::Leave);
        viewers.apply_delta(ViewerDelta::Leave);
        assert_eq!(viewers.count(), 0);

        assert_eq!(viewers.apply_delta(ViewerDelta::Join), 1);
    }

    #[test]
    fn snapshot_overrides_deltas() {
        let mut viewers = ViewerCountAggregator::new();
        for _ in 0..10 {
            viewers.apply_delta(ViewerDelta::Join);
        }
        assert_eq!(viewers.apply_snapshot(3), 3);
        assert_eq!(viewers.deltas_since_snapshot(), 0);

        viewers.apply_delta(ViewerDelta::Join);
        assert_eq!(viewers.count(), 4);
        assert_eq!(viewers.deltas_since_snapshot(), 1);
    }
}
