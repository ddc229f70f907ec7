//! Scan pipeline: the orchestrator driving one *scan* through its phases
//! (spec §4.6). Grounded on the teacher's `app::orchestrator::App::run` —
//! same shape of "build dependencies, fan out over a plugin registry,
//! hand survivors to notifiers" — generalized from a single WebSocket
//! message handler into the Plan→Fetch→Markets→Detect→Gate→Calibrate→
//! Route→Mark phase sequence §4.6 and §5 require.

mod gate;

pub use gate::GateReason;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::core::cache::SourceCache;
use crate::core::domain::{Market, Opportunity, SourceData};
use crate::core::ledger::CalibrationLedger;
use crate::core::registry::Registry;
use crate::core::router::{Router, RouteOutcome};

/// Scan state machine (spec §4.6): `Idle → Planning → Fetching →
/// Detecting → Gating → Routing → Done | Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Planning,
    Fetching,
    Detecting,
    Gating,
    Routing,
    Done,
    Aborted,
}

/// Count of opportunities dropped per gate reason, for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateDropCounts {
    pub extreme: usize,
    pub suspicious: usize,
    pub low_confidence: usize,
    pub duplicate: usize,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub final_state: ScanState,
    pub markets_considered: usize,
    pub opportunities_detected: usize,
    pub opportunities_emitted: usize,
    pub drops: GateDropCounts,
    pub duration: Duration,
    pub aborted_reason: Option<String>,
}

/// Configuration the pipeline needs beyond what's already captured by its
/// collaborators (registry, cache, ledger, router).
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub primary_source: String,
    pub scan_deadline: Duration,
    pub sink_deadline: Duration,
}

pub struct ScanPipeline {
    registry: Arc<Registry>,
    cache: Arc<SourceCache>,
    ledger: Arc<CalibrationLedger>,
    router: Arc<Router>,
    config: ScanConfig,
}

impl ScanPipeline {
    #[must_use]
    pub fn new(registry: Arc<Registry>, cache: Arc<SourceCache>, ledger: Arc<CalibrationLedger>, router: Arc<Router>, config: ScanConfig) -> Self {
        Self { registry, cache, ledger, router, config }
    }

    /// Runs one scan start to finish. Never returns an `Err` — per spec
    /// §7's propagation policy, a fatal condition ends the scan with
    /// `ScanState::Aborted` in the report, not a propagated exception.
    pub async fn run_scan(&self) -> ScanReport {
        let started_at = Instant::now();
        let deadline_at = started_at + self.config.scan_deadline;

        // --- Phase A: Plan ---
        let mut state = ScanState::Planning;
        let detectors = self.registry.enabled_detectors();
        let processors = self.registry.all_processors();

        let mut wanted_sources: HashSet<String> = detectors.iter().flat_map(|d| d.required_sources().to_vec()).collect();
        wanted_sources.extend(processors.iter().flat_map(|p| p.input_sources().to_vec()));
        wanted_sources.insert(self.config.primary_source.clone());
        let wanted_sources: Vec<String> = wanted_sources.into_iter().collect();

        info!(detectors = detectors.len(), processors = processors.len(), sources = wanted_sources.len(), "scan planned");

        // --- Phase B: Fetch ---
        state = ScanState::Fetching;
        let fetch_budget = remaining(deadline_at);
        let mut source_data = match tokio::time::timeout(fetch_budget, self.cache.fetch_sources(&wanted_sources)).await {
            Ok(data) => data,
            Err(_) => {
                return self.abort(started_at, state, "scan deadline exceeded during fetch");
            }
        };

        for processor in &processors {
            if let Some(payload) = processor.process_handle().process(&source_data).await {
                source_data.insert(processor.output_name().to_string(), payload);
            }
        }

        // --- Phase C: Markets ---
        let markets: Vec<Market> = source_data.get_as(&self.config.primary_source).unwrap_or_default();
        if markets.is_empty() {
            warn!(primary = %self.config.primary_source, "no markets in primary source, scan exits cleanly");
            return ScanReport {
                final_state: ScanState::Done,
                markets_considered: 0,
                opportunities_detected: 0,
                opportunities_emitted: 0,
                drops: GateDropCounts::default(),
                duration: started_at.elapsed(),
                aborted_reason: None,
            };
        }

        // --- Phase D: Detect ---
        state = ScanState::Detecting;
        let detect_budget = remaining(deadline_at);
        let detected = match tokio::time::timeout(detect_budget, self.detect_all(&detectors, &markets, &source_data)).await {
            Ok(opportunities) => opportunities,
            Err(_) => {
                return self.abort(started_at, state, "scan deadline exceeded during detection");
            }
        };
        let opportunities_detected = detected.len();

        // --- Phase E: Gate ---
        state = ScanState::Gating;
        let mut emitted_this_scan: HashSet<String> = HashSet::new();
        let mut drops = GateDropCounts::default();
        let mut survivors = Vec::with_capacity(detected.len());
        for opportunity in detected {
            match gate::evaluate(&opportunity, &mut emitted_this_scan) {
                Ok(()) => survivors.push(opportunity),
                Err(GateReason::Extreme) => drops.extreme += 1,
                Err(GateReason::Suspicious) => drops.suspicious += 1,
                Err(GateReason::LowConfidence) => drops.low_confidence += 1,
                Err(GateReason::Duplicate) => drops.duplicate += 1,
            }
        }
        debug!(survivors = survivors.len(), dropped = opportunities_detected - survivors.len(), "gate complete");

        // --- Phase F: Calibrate ---
        for opportunity in &mut survivors {
            self.calibrate(opportunity);
        }

        // --- Phase G: Route ---
        state = ScanState::Routing;
        let outcomes = self.router.route_batch(survivors, self.config.sink_deadline).await;
        let opportunities_emitted = outcomes.iter().filter(|o| matches!(o, RouteOutcome::Delivered(_))).count();

        // --- Phase H: Mark --- (emitted_this_scan drops here, scoped to this call)
        let _ = state;

        ScanReport {
            final_state: ScanState::Done,
            markets_considered: markets.len(),
            opportunities_detected,
            opportunities_emitted,
            drops,
            duration: started_at.elapsed(),
            aborted_reason: None,
        }
    }

    async fn detect_all(
        &self,
        detectors: &[Arc<crate::core::registry::DetectorDescriptor>],
        markets: &[Market],
        source_data: &SourceData,
    ) -> Vec<Opportunity> {
        let tasks = detectors.iter().filter(|d| d.should_run(source_data)).map(|descriptor| {
            let detector = descriptor.detect_handle();
            let name = descriptor.name().to_string();
            let min_edge = descriptor.min_edge();
            let min_confidence = descriptor.min_confidence();
            let markets = markets.to_vec();
            let source_data = source_data.clone();
            tokio::spawn(async move {
                detector
                    .detect(&markets, &source_data)
                    .await
                    .into_iter()
                    .filter(|o| o.edge() >= min_edge && o.confidence() >= min_confidence)
                    .collect::<Vec<_>>()
            })
            .then_log(name)
        });

        futures::future::join_all(tasks).await.into_iter().flatten().collect()
    }

    fn calibrate(&self, opportunity: &mut Opportunity) {
        let estimate = opportunity.estimated_probability();
        let category = opportunity.market().category();
        let signal_sources: Vec<_> = opportunity.signals().tags().collect();

        self.ledger.record_prediction(
            opportunity.market().platform().clone(),
            opportunity.market().id().clone(),
            category,
            estimate,
            opportunity.market().price(),
            signal_sources.clone(),
            opportunity.confidence(),
        );

        let adjustment = self.ledger.adjust_for_calibration(estimate, category, &signal_sources);
        debug!(reasoning = %adjustment.reasoning, "calibration adjustment applied");
        opportunity.set_confidence(adjustment.confidence);
    }

    fn abort(&self, started_at: Instant, state: ScanState, reason: &str) -> ScanReport {
        error!(reason, ?state, "scan aborted");
        ScanReport {
            final_state: ScanState::Aborted,
            markets_considered: 0,
            opportunities_detected: 0,
            opportunities_emitted: 0,
            drops: GateDropCounts::default(),
            duration: started_at.elapsed(),
            aborted_reason: Some(reason.to_string()),
        }
    }
}

fn remaining(deadline_at: Instant) -> Duration {
    deadline_at.saturating_duration_since(Instant::now())
}

/// Extension trait turning a detector's `JoinHandle` into a plain
/// `Vec<Opportunity>`, logging (and isolating) a panic instead of
/// propagating it (spec §4.4: a detector failure is isolated, never
/// crashes the scan).
trait JoinHandleExt {
    fn then_log(self, detector_name: String) -> futures::future::BoxFuture<'static, Vec<Opportunity>>;
}

impl JoinHandleExt for tokio::task::JoinHandle<Vec<Opportunity>> {
    fn then_log(self, detector_name: String) -> futures::future::BoxFuture<'static, Vec<Opportunity>> {
        use futures::FutureExt;
        async move {
            match self.await {
                Ok(opportunities) => opportunities,
                Err(err) => {
                    error!(detector = %detector_name, error = %err, "detector task panicked, yielding no opportunities");
                    Vec::new()
                }
            }
        }
        .boxed()
    }
}
