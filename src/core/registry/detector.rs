//! Detector plug-in contract and registry entry.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::domain::{Market, Opportunity, SourceData};

/// A plug-in that evaluates markets against source data and emits
/// candidate opportunities. Detectors never throw (spec §6): a detector
/// that finds nothing returns an empty vec.
///
/// `detect` is async so a detector may itself await further bounded
/// internal work (spec §5, "detectors may issue their own concurrent
/// work"); the pipeline awaits every enabled detector concurrently.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, markets: &[Market], source_data: &SourceData) -> Vec<Opportunity>;
}

/// Immutable configuration for a registered detector.
pub struct DetectorDescriptor {
    name: String,
    enabled: bool,
    required_sources: Vec<String>,
    tolerates_missing_sources: bool,
    min_edge: f64,
    min_confidence: f64,
    detect: Arc<dyn Detector>,
}

impl DetectorDescriptor {
    /// `min_edge`/`min_confidence` are the detector's declared thresholds
    /// (spec §3, §4.4): the pipeline drops an opportunity this detector
    /// emits if its edge or confidence falls below them, before the
    /// opportunity ever reaches the gate.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        required_sources: Vec<String>,
        min_edge: f64,
        min_confidence: f64,
        detect: Arc<dyn Detector>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            required_sources,
            tolerates_missing_sources: false,
            min_edge,
            min_confidence,
            detect,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Opt in to running even when some declared sources are missing
    /// from this scan's [`SourceData`] (spec §4.6's "cooperative
    /// tolerance" convention — most detectors should not set this).
    #[must_use]
    pub fn tolerating_missing_sources(mut self) -> Self {
        self.tolerates_missing_sources = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn required_sources(&self) -> &[String] {
        &self.required_sources
    }

    #[must_use]
    pub fn tolerates_missing_sources(&self) -> bool {
        self.tolerates_missing_sources
    }

    #[must_use]
    pub fn min_edge(&self) -> f64 {
        self.min_edge
    }

    #[must_use]
    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Whether this detector should run against `source_data` this scan.
    #[must_use]
    pub fn should_run(&self, source_data: &SourceData) -> bool {
        self.enabled && (self.tolerates_missing_sources || source_data.has_all(self.required_sources.as_slice()))
    }

    #[must_use]
    pub fn detect_handle(&self) -> Arc<dyn Detector> {
        Arc::clone(&self.detect)
    }
}

impl std::fmt::Debug for DetectorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorDescriptor")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("required_sources", &self.required_sources)
            .field("tolerates_missing_sources", &self.tolerates_missing_sources)
            .field("min_edge", &self.min_edge)
            .field("min_confidence", &self.min_confidence)
            .finish()
    }
}
