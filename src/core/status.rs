//! Process health/status reporting, consumed by the `status` sink channel.
//!
//! Grounded on the teacher's `infrastructure::orchestration::health` module:
//! same "accumulate named checks, report a single health verdict" shape,
//! generalized here from a one-shot config validation into a running
//! snapshot of engine activity updated after every scan.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::core::pipeline::{ScanReport, ScanState};

const MAX_ERROR_SAMPLES: usize = 20;

/// A single recent failure, kept for operator visibility.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorSample {
    pub reason: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub uptime: Duration,
    pub last_scan_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_scan_state: Option<String>,
    pub markets_tracked_last_scan: usize,
    pub opportunities_emitted_last_scan: usize,
    pub total_scans: u64,
    pub recent_errors: Vec<ErrorSample>,
}

impl EngineStatus {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !matches!(self.last_scan_state.as_deref(), Some("aborted"))
    }
}

struct Inner {
    last_scan_at: Option<chrono::DateTime<chrono::Utc>>,
    last_scan_state: Option<String>,
    markets_tracked_last_scan: usize,
    opportunities_emitted_last_scan: usize,
    total_scans: u64,
    recent_errors: Vec<ErrorSample>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            last_scan_at: None,
            last_scan_state: None,
            markets_tracked_last_scan: 0,
            opportunities_emitted_last_scan: 0,
            total_scans: 0,
            recent_errors: Vec::new(),
        }
    }
}

/// Shared, thread-safe engine status. One instance lives for the process
/// lifetime; the pipeline updates it after every scan.
pub struct StatusTracker {
    started_at: Instant,
    inner: RwLock<Inner>,
}

impl StatusTracker {
    #[must_use]
    pub fn new() -> Self {
        Self { started_at: Instant::now(), inner: RwLock::new(Inner::default()) }
    }

    /// Folds one scan's outcome into the running status.
    pub fn record_scan(&self, report: &ScanReport) {
        let mut inner = self.inner.write();
        inner.last_scan_at = Some(chrono::Utc::now());
        inner.last_scan_state = Some(state_label(report.final_state).to_string());
        inner.markets_tracked_last_scan = report.markets_considered;
        inner.opportunities_emitted_last_scan = report.opportunities_emitted;
        inner.total_scans += 1;
        if let Some(reason) = &report.aborted_reason {
            push_error(&mut inner.recent_errors, reason.clone());
        }
    }

    /// Records a failure that didn't come from a `ScanReport` (e.g. a
    /// config or fetch-layer error surfaced outside the pipeline).
    pub fn record_error(&self, reason: impl Into<String>) {
        push_error(&mut self.inner.write(), reason.into());
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineStatus {
        let inner = self.inner.read();
        EngineStatus {
            uptime: self.started_at.elapsed(),
            last_scan_at: inner.last_scan_at,
            last_scan_state: inner.last_scan_state.clone(),
            markets_tracked_last_scan: inner.markets_tracked_last_scan,
            opportunities_emitted_last_scan: inner.opportunities_emitted_last_scan,
            total_scans: inner.total_scans,
            recent_errors: inner.recent_errors.clone(),
        }
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn push_error(inner: &mut Inner, reason: String) {
    inner.recent_errors.push(ErrorSample { reason, at: chrono::Utc::now() });
    if inner.recent_errors.len() > MAX_ERROR_SAMPLES {
        inner.recent_errors.remove(0);
    }
}

fn state_label(state: ScanState) -> &'static str {
    match state {
        ScanState::Idle => "idle",
        ScanState::Planning => "planning",
        ScanState::Fetching => "fetching",
        ScanState::Detecting => "detecting",
        ScanState::Gating => "gating",
        ScanState::Routing => "routing",
        ScanState::Done => "done",
        ScanState::Aborted => "aborted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::GateDropCounts;

    fn report(state: ScanState, aborted_reason: Option<&str>) -> ScanReport {
        ScanReport {
            final_state: state,
            markets_considered: 42,
            opportunities_detected: 5,
            opportunities_emitted: 3,
            drops: GateDropCounts::default(),
            duration: Duration::from_millis(10),
            aborted_reason: aborted_reason.map(str::to_string),
        }
    }

    #[test]
    fn fresh_tracker_has_no_scans() {
        let tracker = StatusTracker::new();
        let status = tracker.snapshot();
        assert_eq!(status.total_scans, 0);
        assert!(status.last_scan_at.is_none());
        assert!(status.is_healthy());
    }

    #[test]
    fn record_scan_updates_snapshot() {
        let tracker = StatusTracker::new();
        tracker.record_scan(&report(ScanState::Done, None));
        let status = tracker.snapshot();
        assert_eq!(status.total_scans, 1);
        assert_eq!(status.markets_tracked_last_scan, 42);
        assert_eq!(status.opportunities_emitted_last_scan, 3);
        assert_eq!(status.last_scan_state.as_deref(), Some("done"));
        assert!(status.is_healthy());
    }

    #[test]
    fn aborted_scan_is_unhealthy_and_recorded_as_error() {
        let tracker = StatusTracker::new();
        tracker.record_scan(&report(ScanState::Aborted, Some("deadline exceeded")));
        let status = tracker.snapshot();
        assert!(!status.is_healthy());
        assert_eq!(status.recent_errors.len(), 1);
        assert_eq!(status.recent_errors[0].reason, "deadline exceeded");
    }

    #[test]
    fn error_samples_are_capped() {
        let tracker = StatusTracker::new();
        for i in 0..(MAX_ERROR_SAMPLES + 5) {
            tracker.record_error(format!("error {i}"));
        }
        let status = tracker.snapshot();
        assert_eq!(status.recent_errors.len(), MAX_ERROR_SAMPLES);
        assert_eq!(status.recent_errors.last().unwrap().reason, format!("error {}", MAX_ERROR_SAMPLES + 4));
    }
}
