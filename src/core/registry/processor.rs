//! Processor plug-in contract and registry entry.
//!
//! Processors sit between the source cache and detectors (Phase B):
//! they derive a new named payload from one or more already-fetched
//! sources, so several detectors can share a single expensive
//! normalization step.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::core::domain::SourceData;

/// A plug-in that derives a new source-shaped payload from existing ones.
///
/// Returns `None` when its declared inputs are missing or malformed —
/// that is not an error, just "nothing to contribute this scan."
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, inputs: &SourceData) -> Option<Value>;
}

/// Immutable configuration for a registered processor.
pub struct ProcessorDescriptor {
    name: String,
    input_sources: Vec<String>,
    output_name: String,
    process: Arc<dyn Processor>,
}

impl ProcessorDescriptor {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        input_sources: Vec<String>,
        output_name: impl Into<String>,
        process: Arc<dyn Processor>,
    ) -> Self {
        Self {
            name: name.into(),
            input_sources,
            output_name: output_name.into(),
            process,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn input_sources(&self) -> &[String] {
        &self.input_sources
    }

    #[must_use]
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    #[must_use]
    pub fn process_handle(&self) -> Arc<dyn Processor> {
        Arc::clone(&self.process)
    }
}

impl std::fmt::Debug for ProcessorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorDescriptor")
            .field("name", &self.name)
            .field("input_sources", &self.input_sources)
            .field("output_name", &self.output_name)
            .finish()
    }
}
