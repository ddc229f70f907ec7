//! End-to-end integration tests driving the registry → cache → pipeline →
//! router chain as a black box, grounded on the teacher's `tests/`
//! convention of exercising the crate through its public surface rather
//! than internal unit seams.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edge_signal_engine::core::cache::SourceCache;
use edge_signal_engine::core::domain::{Category, Channel, Market, Opportunity, SourceData};
use edge_signal_engine::core::ledger::CalibrationLedger;
use edge_signal_engine::core::pipeline::{ScanConfig, ScanPipeline, ScanState};
use edge_signal_engine::core::registry::{Detector, DetectorDescriptor, Processor, ProcessorDescriptor, Registry};
use edge_signal_engine::core::router::Router;
use edge_signal_engine::testkit::{always_detect_descriptor, fixed_source_descriptor, RecordingSink};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn config(primary_source: &str) -> ScanConfig {
    ScanConfig {
        primary_source: primary_source.to_string(),
        scan_deadline: Duration::from_secs(5),
        sink_deadline: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn full_scan_detects_and_routes_an_opportunity() {
    let registry = Arc::new(Registry::new());
    registry.register_source(fixed_source_descriptor(
        "polymarket",
        Category::Crypto,
        json!([{
            "platform": "polymarket",
            "id": "BTC-100K",
            "ticker": "BTC-100K",
            "title": "Will BTC hit 100k?",
            "category": "crypto",
            "price": "0.4"
        }]),
    ));
    registry.register_detector(always_detect_descriptor("always", 0.1, 0.6));

    let cache = Arc::new(SourceCache::new(Arc::clone(&registry)));
    let temp = tempfile::tempdir().unwrap();
    let ledger = Arc::new(CalibrationLedger::new(temp.path()));
    let router = Arc::new(Router::new());
    let sink = Arc::new(RecordingSink::default());
    router.register_sink(Channel::Crypto, sink.clone());

    let pipeline = ScanPipeline::new(registry, cache, ledger, router, config("polymarket"));
    let report = pipeline.run_scan().await;

    assert_eq!(report.final_state, ScanState::Done);
    assert_eq!(report.markets_considered, 1);
    assert_eq!(report.opportunities_detected, 1);
    assert_eq!(report.opportunities_emitted, 1);
    assert_eq!(sink.delivered.lock().len(), 1);
}

#[tokio::test]
async fn scan_with_no_markets_exits_cleanly_without_detecting() {
    let registry = Arc::new(Registry::new());
    registry.register_source(fixed_source_descriptor("polymarket", Category::Crypto, json!([])));

    let cache = Arc::new(SourceCache::new(Arc::clone(&registry)));
    let temp = tempfile::tempdir().unwrap();
    let ledger = Arc::new(CalibrationLedger::new(temp.path()));
    let router = Arc::new(Router::new());

    let pipeline = ScanPipeline::new(registry, cache, ledger, router, config("polymarket"));
    let report = pipeline.run_scan().await;

    assert_eq!(report.final_state, ScanState::Done);
    assert_eq!(report.markets_considered, 0);
    assert_eq!(report.opportunities_detected, 0);
    assert_eq!(report.opportunities_emitted, 0);
}

#[tokio::test]
async fn duplicate_markets_within_a_scan_are_gated_once() {
    let registry = Arc::new(Registry::new());
    registry.register_source(fixed_source_descriptor(
        "polymarket",
        Category::Crypto,
        json!([
            {"platform": "polymarket", "id": "BTC-100K", "ticker": "BTC-100K", "title": "t", "category": "crypto", "price": "0.4"},
        ]),
    ));
    // Two detectors both emit an opportunity for the same market; the
    // second must be dropped as a duplicate within the scan.
    registry.register_detector(always_detect_descriptor("a", 0.1, 0.6));
    registry.register_detector(always_detect_descriptor("b", 0.1, 0.6));

    let cache = Arc::new(SourceCache::new(Arc::clone(&registry)));
    let temp = tempfile::tempdir().unwrap();
    let ledger = Arc::new(CalibrationLedger::new(temp.path()));
    let router = Arc::new(Router::new());
    let sink = Arc::new(RecordingSink::default());
    router.register_sink(Channel::Crypto, sink.clone());

    let pipeline = ScanPipeline::new(registry, cache, ledger, router, config("polymarket"));
    let report = pipeline.run_scan().await;

    assert_eq!(report.opportunities_detected, 2);
    assert_eq!(report.drops.duplicate, 1);
    assert_eq!(report.opportunities_emitted, 1);
}

#[tokio::test]
async fn calibration_ledger_records_a_prediction_per_survivor() {
    let registry = Arc::new(Registry::new());
    registry.register_source(fixed_source_descriptor(
        "polymarket",
        Category::Crypto,
        json!([{"platform": "polymarket", "id": "BTC-100K", "ticker": "BTC-100K", "title": "t", "category": "crypto", "price": "0.4"}]),
    ));
    registry.register_detector(always_detect_descriptor("always", 0.1, 0.6));

    let cache = Arc::new(SourceCache::new(Arc::clone(&registry)));
    let temp = tempfile::tempdir().unwrap();
    let ledger = Arc::new(CalibrationLedger::new(temp.path()));
    let router = Arc::new(Router::new());

    let pipeline = ScanPipeline::new(registry, Arc::clone(&cache), Arc::clone(&ledger), router, config("polymarket"));
    let _ = pipeline.run_scan().await;

    assert_eq!(ledger.prediction_count(), 1);
}

#[tokio::test]
async fn extreme_price_markets_are_gated_out() {
    let registry = Arc::new(Registry::new());
    registry.register_source(fixed_source_descriptor(
        "polymarket",
        Category::Crypto,
        json!([{"platform": "polymarket", "id": "LONGSHOT", "ticker": "LONGSHOT", "title": "t", "category": "crypto", "price": "0.99"}]),
    ));
    registry.register_detector(always_detect_descriptor("always", 0.01, 0.6));

    let cache = Arc::new(SourceCache::new(Arc::clone(&registry)));
    let temp = tempfile::tempdir().unwrap();
    let ledger = Arc::new(CalibrationLedger::new(temp.path()));
    let router = Arc::new(Router::new());

    let pipeline = ScanPipeline::new(registry, cache, ledger, router, config("polymarket"));
    let report = pipeline.run_scan().await;

    assert_eq!(report.drops.extreme, 1);
    assert_eq!(report.opportunities_emitted, 0);
}

#[test]
fn decimal_prices_parse_from_json_strings() {
    // Sanity check on the fixture shape used throughout this file: a
    // quoted decimal string decodes to the same value as the `dec!` macro.
    let v: rust_decimal::Decimal = serde_json::from_value(json!("0.4")).unwrap();
    assert_eq!(v, dec!(0.4));
}

struct DoubleProcessor;

#[async_trait]
impl Processor for DoubleProcessor {
    async fn process(&self, inputs: &SourceData) -> Option<Value> {
        let raw: f64 = inputs.get_as("raw")?;
        Some(json!(raw * 2.0))
    }
}

struct TripleProcessor;

#[async_trait]
impl Processor for TripleProcessor {
    async fn process(&self, inputs: &SourceData) -> Option<Value> {
        let doubled: f64 = inputs.get_as("doubled")?;
        Some(json!(doubled * 3.0))
    }
}

struct ChainObserverDetector {
    observed: Arc<Mutex<Option<f64>>>,
}

#[async_trait]
impl Detector for ChainObserverDetector {
    async fn detect(&self, _markets: &[Market], source_data: &SourceData) -> Vec<Opportunity> {
        if let Some(value) = source_data.get_as::<f64>("chained_result") {
            *self.observed.lock() = Some(value);
        }
        Vec::new()
    }
}

#[tokio::test]
async fn processors_compose_linearly_in_name_order() {
    let registry = Arc::new(Registry::new());
    registry.register_source(fixed_source_descriptor(
        "polymarket",
        Category::Crypto,
        json!([{"platform": "polymarket", "id": "BTC-100K", "ticker": "BTC-100K", "title": "t", "category": "crypto", "price": "0.4"}]),
    ));
    registry.register_source(fixed_source_descriptor("raw", Category::Crypto, json!(4.0)));
    // "a_double" must run before "b_triple" for the chain to produce a
    // value at all; registered in reverse order to prove the pipeline
    // doesn't rely on registration order.
    registry.register_processor(ProcessorDescriptor::new("b_triple", vec!["doubled".to_string()], "chained_result", Arc::new(TripleProcessor)));
    registry.register_processor(ProcessorDescriptor::new("a_double", vec!["raw".to_string()], "doubled", Arc::new(DoubleProcessor)));

    let observed = Arc::new(Mutex::new(None));
    registry.register_detector(DetectorDescriptor::new(
        "chain-observer",
        vec!["chained_result".to_string()],
        0.0,
        0.0,
        Arc::new(ChainObserverDetector { observed: Arc::clone(&observed) }),
    ));

    let cache = Arc::new(SourceCache::new(Arc::clone(&registry)));
    let temp = tempfile::tempdir().unwrap();
    let ledger = Arc::new(CalibrationLedger::new(temp.path()));
    let router = Arc::new(Router::new());

    let pipeline = ScanPipeline::new(registry, cache, ledger, router, config("polymarket"));
    let _ = pipeline.run_scan().await;

    assert_eq!(*observed.lock(), Some(24.0));
}
