//! Counters a stats façade would read, out of scope for this crate itself.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub frame_requests_sent: AtomicU64,
    /// Incremented when the dispatcher is entered, not at persistence —
    /// the two counters can diverge when a provider call or insert fails.
    pub analyses_triggered: AtomicU64,
    pub analyses_persisted: AtomicU64,
    pub messages_dropped_malformed: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_request_sent(&self) {
        self.frame_requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analysis_triggered(&self) {
        self.analyses_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analysis_persisted(&self) {
        self.analyses_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_dropped(&self) {
        self.messages_dropped_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            frame_requests_sent: self.frame_requests_sent.load(Ordering::Relaxed),
            analyses_triggered: self.analyses_triggered.load(Ordering::Relaxed),
            analyses_persisted: self.analyses_persisted.load(Ordering::Relaxed),
            messages_dropped_malformed: self.messages_dropped_malformed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PipelineStatsSnapshot {
    pub frame_requests_sent: u64,
    pub analyses_triggered: u64,
    pub analyses_persisted: u64,
    pub messages_dropped_malformed: u64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn triggered_can_exceed_persisted() {
        let stats = PipelineStats::new();
        stats.record_analysis_triggered();
        stats.record_analysis_triggered();
        stats.record_analysis_persisted();
        let snap = stats.snapshot();
        assert_eq!(snap.analyses_triggered, 2);
        assert_eq!(snap.analyses_persisted, 1);
    }
}
