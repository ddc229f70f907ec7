//! Application layer - orchestration, configuration, and shared state.
//!
//! Grounded on the teacher's `app::orchestrator::App`: a thin struct whose
//! `run` builds the engine's collaborators once and drives either a single
//! pass or a timer loop. Generalized here from "fetch markets, subscribe to
//! a websocket" into "build the registry/cache/ledger/router, run scans".

mod config;

pub use config::{Config, LedgerConfig, LoggingConfig, ScanConfig, SourcesConfig};

use std::sync::Arc;

use tracing::{error, info};

use crate::core::cache::SourceCache;
use crate::core::ledger::CalibrationLedger;
use crate::core::pipeline::{ScanConfig as PipelineScanConfig, ScanPipeline, ScanReport};
use crate::core::registry::Registry;
use crate::core::router::Router;
use crate::core::status::StatusTracker;
use crate::error::Result;

/// Bundles the engine's long-lived collaborators and drives scans against
/// them. Callers build a [`Registry`] (registering their own sources,
/// processors, detectors) and a [`Router`] (registering sinks) before
/// constructing an `App` — the core provides the plumbing between them,
/// not the plug-ins themselves (spec §1).
pub struct App {
    registry: Arc<Registry>,
    cache: Arc<SourceCache>,
    ledger: Arc<CalibrationLedger>,
    router: Arc<Router>,
    status: Arc<StatusTracker>,
    pipeline: ScanPipeline,
}

impl App {
    /// Assembles the engine from a config and caller-populated registry and
    /// router. Fails only if the ledger's on-disk state is malformed and
    /// unreadable as something other than "start empty" (see
    /// `CalibrationLedger::new`, which itself never errors — this
    /// constructor currently cannot fail but returns `Result` to leave room
    /// for future collaborators that can).
    pub fn new(config: &Config, registry: Arc<Registry>, router: Arc<Router>) -> Result<Self> {
        let cache = Arc::new(SourceCache::new(Arc::clone(&registry)));
        let ledger = Arc::new(CalibrationLedger::new(config.ledger.data_dir.clone()));
        let status = Arc::new(StatusTracker::new());

        let pipeline_config = PipelineScanConfig {
            primary_source: config.scan.primary_source.clone(),
            scan_deadline: config.scan.deadline(),
            sink_deadline: config.scan.sink_deadline(),
        };
        let pipeline = ScanPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&ledger),
            Arc::clone(&router),
            pipeline_config,
        );

        Ok(Self { registry, cache, ledger, router, status, pipeline })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SourceCache> {
        &self.cache
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<CalibrationLedger> {
        &self.ledger
    }

    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    #[must_use]
    pub fn status(&self) -> &Arc<StatusTracker> {
        &self.status
    }

    /// Runs exactly one scan and folds the result into the status tracker.
    pub async fn run_once(&self) -> ScanReport {
        let report = self.pipeline.run_scan().await;
        self.status.record_scan(&report);
        info!(
            state = ?report.final_state,
            markets = report.markets_considered,
            detected = report.opportunities_detected,
            emitted = report.opportunities_emitted,
            "scan complete"
        );
        report
    }

    /// Runs scans on a fixed interval until the process receives `Ctrl+C`
    /// (teacher: `App::run`'s foreground event loop).
    pub async fn run_forever(&self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }
    }

    /// Resolves predictions whose markets have settled, using `lookup` to
    /// determine each pending market's outcome (caller-supplied, since the
    /// core has no concept of a specific exchange's settlement API).
    pub fn resolve_settled(
        &self,
        lookup: impl FnMut(
            &crate::core::domain::MarketId,
            &crate::core::domain::Platform,
        ) -> crate::core::ledger::Resolution,
    ) -> usize {
        let resolved = self.ledger.check_and_resolve_predictions(lookup);
        if resolved > 0 {
            info!(resolved, "predictions resolved");
        }
        resolved
    }
}

/// Logs a status-channel-worthy error and records it for `EngineStatus`.
pub fn report_error(status: &StatusTracker, context: &str, err: &crate::error::Error) {
    error!(context, error = %err, "engine error");
    status.record_error(format!("{context}: {err}"));
}
