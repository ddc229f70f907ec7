//! In-memory test doubles and builder functions, gated behind the
//! `testkit` feature so the integration test suite and any embedding
//! binary's smoke tests can exercise the registry → cache → pipeline →
//! router chain without a real exchange.
//!
//! Grounded on the teacher's `testkit` module: concise factory functions so
//! tests focus on assertions rather than construction boilerplate.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::core::domain::{Category, Channel, Direction, Market, Opportunity, Signals, SourceData, Urgency};
use crate::core::registry::{Detector, DetectorDescriptor, FetchError, Source, SourceDescriptor};
use crate::core::router::Sink;

/// A [`Market`] with sensible test defaults; override what the scenario
/// needs.
#[must_use]
pub fn market(platform: &str, id: &str, category: Category, price: Decimal) -> Market {
    Market::new(platform, id, id, format!("test market {id}"), category, price)
        .expect("testkit market price must be in (0, 1)")
}

/// A minimal valid [`Opportunity`] passing every gate check by default.
#[must_use]
pub fn opportunity(market: Market, source: &str, edge: f64, confidence: f64) -> Opportunity {
    Opportunity::new(market, source, edge, confidence, Direction::BuyYes, Urgency::Standard, Signals::new(), None)
}

/// A [`Source`] that always returns a fixed JSON payload.
pub struct FixedSource(Value);

impl FixedSource {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }
}

#[async_trait]
impl Source for FixedSource {
    async fn fetch(&self) -> Result<Value, FetchError> {
        Ok(self.0.clone())
    }
}

/// A [`Source`] that always fails, for exercising stale/unavailable paths.
pub struct FailingSource(pub String);

#[async_trait]
impl Source for FailingSource {
    async fn fetch(&self) -> Result<Value, FetchError> {
        Err(FetchError(self.0.clone()))
    }
}

/// Wraps a `FixedSource` into a [`SourceDescriptor`] under `name`.
#[must_use]
pub fn fixed_source_descriptor(name: &str, category: Category, value: Value) -> SourceDescriptor {
    SourceDescriptor::new(name, category, Arc::new(FixedSource::new(value)))
}

/// A [`Detector`] that emits one fixed opportunity per market it sees,
/// regardless of source data, useful for pipeline smoke tests.
pub struct AlwaysDetect {
    pub edge: f64,
    pub confidence: f64,
}

#[async_trait]
impl Detector for AlwaysDetect {
    async fn detect(&self, markets: &[Market], _source_data: &SourceData) -> Vec<Opportunity> {
        markets
            .iter()
            .map(|m| opportunity(m.clone(), "testkit", self.edge, self.confidence))
            .collect()
    }
}

/// Wraps `AlwaysDetect` into a [`DetectorDescriptor`] requiring no sources
/// and no declared edge/confidence floor.
#[must_use]
pub fn always_detect_descriptor(name: &str, edge: f64, confidence: f64) -> DetectorDescriptor {
    DetectorDescriptor::new(name, Vec::new(), 0.0, 0.0, Arc::new(AlwaysDetect { edge, confidence }))
}

/// A [`Sink`] that records every delivered opportunity for later
/// assertions.
pub struct RecordingSink {
    pub delivered: parking_lot::Mutex<Vec<Opportunity>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self { delivered: parking_lot::Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn deliver(&self, _channel: Channel, opportunity: &Opportunity) -> bool {
        self.delivered.lock().push(opportunity.clone());
        true
    }
}
