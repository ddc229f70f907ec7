//! Plug-in registry: name-keyed collections of sources, processors, and
//! detectors.
//!
//! Grounded on the teacher's `core::strategy::StrategyRegistry`, generalized
//! from a single unkeyed `Vec<Box<dyn Strategy>>` to three name-keyed maps
//! behind a [`parking_lot::RwLock`] so descriptors can be looked up,
//! replaced, and queried by category at runtime (spec §4.1).

mod detector;
mod processor;
mod source;

pub use detector::{Detector, DetectorDescriptor};
pub use processor::{Processor, ProcessorDescriptor};
pub use source::{FetchError, Source, SourceDescriptor, DEFAULT_CACHE_TTL};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::core::domain::Category;

/// Point-in-time counts of what's registered, for status reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RegistryStats {
    pub sources: usize,
    pub processors: usize,
    pub detectors: usize,
    pub enabled_detectors: usize,
}

/// Process-wide indexed collection of the three plug-in kinds.
///
/// Registering under a name that already exists overwrites the prior
/// descriptor; a warning is logged rather than rejecting the call, since
/// re-registration happens deliberately during tests and hot-reload-style
/// setup.
#[derive(Default)]
pub struct Registry {
    sources: RwLock<HashMap<String, Arc<SourceDescriptor>>>,
    processors: RwLock<HashMap<String, Arc<ProcessorDescriptor>>>,
    detectors: RwLock<HashMap<String, Arc<DetectorDescriptor>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_source(&self, descriptor: SourceDescriptor) {
        let name = descriptor.name().to_string();
        if self.sources.read().contains_key(&name) {
            warn!(source = %name, "overwriting previously registered source");
        }
        self.sources.write().insert(name, Arc::new(descriptor));
    }

    pub fn register_processor(&self, descriptor: ProcessorDescriptor) {
        let name = descriptor.name().to_string();
        if self.processors.read().contains_key(&name) {
            warn!(processor = %name, "overwriting previously registered processor");
        }
        self.processors.write().insert(name, Arc::new(descriptor));
    }

    pub fn register_detector(&self, descriptor: DetectorDescriptor) {
        let name = descriptor.name().to_string();
        for required in descriptor.required_sources() {
            if !self.sources.read().contains_key(required) {
                warn!(detector = %name, source = %required, "detector declares an unregistered source");
            }
        }
        if self.detectors.read().contains_key(&name) {
            warn!(detector = %name, "overwriting previously registered detector");
        }
        self.detectors.write().insert(name, Arc::new(descriptor));
    }

    #[must_use]
    pub fn get_source(&self, name: &str) -> Option<Arc<SourceDescriptor>> {
        self.sources.read().get(name).cloned()
    }

    #[must_use]
    pub fn get_processor(&self, name: &str) -> Option<Arc<ProcessorDescriptor>> {
        self.processors.read().get(name).cloned()
    }

    #[must_use]
    pub fn get_detector(&self, name: &str) -> Option<Arc<DetectorDescriptor>> {
        self.detectors.read().get(name).cloned()
    }

    #[must_use]
    pub fn all_sources(&self) -> Vec<Arc<SourceDescriptor>> {
        self.sources.read().values().cloned().collect()
    }

    /// Returns every registered processor, ordered by name. Processors
    /// compose linearly (spec §4.3: one processor's output can feed a
    /// later one via the shared `SourceData` map) so this order must be
    /// deterministic rather than the `HashMap`'s iteration order.
    #[must_use]
    pub fn all_processors(&self) -> Vec<Arc<ProcessorDescriptor>> {
        let mut processors: Vec<Arc<ProcessorDescriptor>> = self.processors.read().values().cloned().collect();
        processors.sort_by(|a, b| a.name().cmp(b.name()));
        processors
    }

    #[must_use]
    pub fn all_detectors(&self) -> Vec<Arc<DetectorDescriptor>> {
        self.detectors.read().values().cloned().collect()
    }

    /// Sources registered under a given category (spec §4.1's `byCategory`).
    #[must_use]
    pub fn sources_by_category(&self, category: Category) -> Vec<Arc<SourceDescriptor>> {
        self.sources
            .read()
            .values()
            .filter(|d| d.category() == category)
            .cloned()
            .collect()
    }

    /// Detectors currently enabled (spec §4.1's `enabledDetectors`); does
    /// not filter on source availability — see [`DetectorDescriptor::should_run`]
    /// for that per-scan decision.
    #[must_use]
    pub fn enabled_detectors(&self) -> Vec<Arc<DetectorDescriptor>> {
        self.detectors
            .read()
            .values()
            .filter(|d| d.is_enabled())
            .cloned()
            .collect()
    }

    /// Clears every registered descriptor. Used by tests and by a
    /// from-scratch config reload.
    pub fn reset(&self) {
        self.sources.write().clear();
        self.processors.write().clear();
        self.detectors.write().clear();
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            sources: self.sources.read().len(),
            processors: self.processors.read().len(),
            detectors: self.detectors.read().len(),
            enabled_detectors: self.detectors.read().values().filter(|d| d.is_enabled()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Market, Opportunity, SourceData};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct MockSource;

    #[async_trait]
    impl Source for MockSource {
        async fn fetch(&self) -> Result<Value, FetchError> {
            Ok(json!({"ok": true}))
        }
    }

    struct MockDetector;

    #[async_trait]
    impl Detector for MockDetector {
        async fn detect(&self, _markets: &[Market], _source_data: &SourceData) -> Vec<Opportunity> {
            vec![]
        }
    }

    #[test]
    fn register_and_fetch_source() {
        let registry = Registry::new();
        registry.register_source(SourceDescriptor::new("binance", Category::Crypto, Arc::new(MockSource)));
        assert!(registry.get_source("binance").is_some());
        assert_eq!(registry.stats().sources, 1);
    }

    #[test]
    fn sources_by_category_filters() {
        let registry = Registry::new();
        registry.register_source(SourceDescriptor::new("binance", Category::Crypto, Arc::new(MockSource)));
        registry.register_source(SourceDescriptor::new("noaa", Category::Weather, Arc::new(MockSource)));
        assert_eq!(registry.sources_by_category(Category::Crypto).len(), 1);
        assert_eq!(registry.sources_by_category(Category::Weather).len(), 1);
    }

    #[test]
    fn enabled_detectors_excludes_disabled() {
        let registry = Registry::new();
        registry.register_detector(DetectorDescriptor::new("a", vec![], 0.0, 0.0, Arc::new(MockDetector)));
        registry.register_detector(DetectorDescriptor::new("b", vec![], 0.0, 0.0, Arc::new(MockDetector)).disabled());
        assert_eq!(registry.enabled_detectors().len(), 1);
        assert_eq!(registry.stats().enabled_detectors, 1);
    }

    #[test]
    fn reset_clears_everything() {
        let registry = Registry::new();
        registry.register_source(SourceDescriptor::new("binance", Category::Crypto, Arc::new(MockSource)));
        registry.reset();
        assert_eq!(registry.stats().sources, 0);
    }

    struct PassthroughProcessor;

    #[async_trait]
    impl Processor for PassthroughProcessor {
        async fn process(&self, _inputs: &SourceData) -> Option<Value> {
            Some(json!(1))
        }
    }

    #[test]
    fn all_processors_is_ordered_by_name_regardless_of_registration_order() {
        let registry = Registry::new();
        registry.register_processor(ProcessorDescriptor::new("zeta", vec![], "zeta_out", Arc::new(PassthroughProcessor)));
        registry.register_processor(ProcessorDescriptor::new("alpha", vec![], "alpha_out", Arc::new(PassthroughProcessor)));
        registry.register_processor(ProcessorDescriptor::new("mid", vec![], "mid_out", Arc::new(PassthroughProcessor)));

        let names: Vec<&str> = registry.all_processors().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn re_registering_overwrites() {
        let registry = Registry::new();
        registry.register_detector(DetectorDescriptor::new("a", vec![], 0.0, 0.0, Arc::new(MockDetector)));
        registry.register_detector(DetectorDescriptor::new("a", vec![], 0.0, 0.0, Arc::new(MockDetector)).disabled());
        assert_eq!(registry.stats().detectors, 1);
        assert!(!registry.get_detector("a").unwrap().is_enabled());
    }
}
