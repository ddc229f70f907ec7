//! Source plug-in contract and registry entry.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::core::domain::Category;

/// Error returned by a [`Source::fetch`] implementation.
///
/// Sources must never panic or unwind across the contract boundary (spec
/// §6); a failure is this explicit value, which the source cache
/// interprets as "fall back to stale data."
#[derive(Debug, Clone, thiserror::Error)]
#[error("source fetch failed: {0}")]
pub struct FetchError(pub String);

impl FetchError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A plug-in that fetches external state and returns an opaque payload.
///
/// Implementations are black boxes to the pipeline (spec §1/§4.2); the
/// core only requires that `fetch` resolves within a bounded time and
/// signals failure by `Err` rather than panicking.
#[async_trait]
pub trait Source: Send + Sync {
    async fn fetch(&self) -> Result<Value, FetchError>;
}

/// Immutable configuration for a registered source.
///
/// Per §9's "mutable cache slots on descriptors" design note, the
/// descriptor itself carries no mutable cache state — that lives in
/// [`crate::core::cache::SourceCache`], keyed by `name`, protected by the
/// cache's own synchronization.
pub struct SourceDescriptor {
    name: String,
    category: Category,
    cache_ttl: Duration,
    fetch: std::sync::Arc<dyn Source>,
}

/// Default TTL for a source that doesn't declare its own (spec §3: 300s).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

impl SourceDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, category: Category, fetch: std::sync::Arc<dyn Source>) -> Self {
        Self {
            name: name.into(),
            category,
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    #[must_use]
    pub fn fetch_handle(&self) -> std::sync::Arc<dyn Source> {
        std::sync::Arc::clone(&self.fetch)
    }
}

impl std::fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}
