//! Source cache: per-source TTL memoization, stale-on-error fallback, and
//! single-flight deduplication of concurrent fetches.
//!
//! Grounded on the teacher's `core::cache::OrderBookCache` (a
//! `parking_lot::RwLock`-guarded map as the steady-state read path) but
//! generalized with `dashmap` for per-key entries and a detached
//! `tokio::spawn` per in-flight fetch so that an abandoned caller (a scan
//! whose deadline expired) never aborts the underlying request — the
//! fetch keeps running and still populates the cache for the next scan
//! (spec §4.2's cancellation contract).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::domain::SourceData;
use crate::core::registry::{Registry, SourceDescriptor};

/// Upper bound on how long a single fetch attempt is awaited, regardless
/// of the source's configured TTL (spec §4.2: "derived from TTL or a
/// fixed ceiling, whichever is shorter").
pub const FETCH_CEILING: Duration = Duration::from_secs(30);

/// Result of a single `fetch_source` call.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Freshly fetched (or still-within-TTL cached) payload.
    Fresh(Value),
    /// The underlying fetch failed; this is the last good payload.
    Stale(Value),
    /// No cached payload exists and the fetch failed or the source is
    /// unregistered.
    Unavailable,
}

impl FetchOutcome {
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            FetchOutcome::Fresh(v) | FetchOutcome::Stale(v) => Some(v),
            FetchOutcome::Unavailable => None,
        }
    }
}

#[derive(Default)]
struct CacheEntry {
    data: Option<Value>,
    fetched_at: Option<Instant>,
}

type SharedFetch = Shared<BoxFuture<'static, Option<Value>>>;

/// Memoizes source fetches keyed by source name.
pub struct SourceCache {
    registry: Arc<Registry>,
    entries: DashMap<String, Arc<RwLock<CacheEntry>>>,
    inflight: Arc<DashMap<String, SharedFetch>>,
}

impl SourceCache {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            entries: DashMap::new(),
            inflight: Arc::new(DashMap::new()),
        }
    }

    fn entry_for(&self, name: &str) -> Arc<RwLock<CacheEntry>> {
        Arc::clone(
            self.entries
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(CacheEntry::default())))
                .value(),
        )
    }

    /// Fetch a single source by name, observing TTL, stale fallback, and
    /// single-flight coalescing (spec §4.2).
    pub async fn fetch_source(&self, name: &str) -> FetchOutcome {
        let Some(descriptor) = self.registry.get_source(name) else {
            warn!(source = %name, "fetchSource: source is not registered");
            return FetchOutcome::Unavailable;
        };

        let entry = self.entry_for(name);
        if let Some(outcome) = self.fresh_if_within_ttl(&entry, &descriptor) {
            return outcome;
        }

        let shared = self.shared_fetch_for(name, &descriptor, Arc::clone(&entry));
        let ceiling = descriptor.cache_ttl().min(FETCH_CEILING);

        match tokio::time::timeout(ceiling, shared).await {
            Ok(Some(value)) => FetchOutcome::Fresh(value),
            Ok(None) => self.stale_or_unavailable(&entry, name),
            Err(_) => {
                debug!(source = %name, timeout_secs = ceiling.as_secs(), "fetch still in flight past ceiling, falling back");
                self.stale_or_unavailable(&entry, name)
            }
        }
    }

    fn fresh_if_within_ttl(&self, entry: &Arc<RwLock<CacheEntry>>, descriptor: &SourceDescriptor) -> Option<FetchOutcome> {
        let guard = entry.read();
        let (data, fetched_at) = (guard.data.clone(), guard.fetched_at);
        match (data, fetched_at) {
            (Some(data), Some(fetched_at)) if fetched_at.elapsed() < descriptor.cache_ttl() => {
                debug!(source = %descriptor.name(), age_secs = fetched_at.elapsed().as_secs(), "cache hit");
                Some(FetchOutcome::Fresh(data))
            }
            _ => None,
        }
    }

    fn stale_or_unavailable(&self, entry: &Arc<RwLock<CacheEntry>>, name: &str) -> FetchOutcome {
        match entry.read().data.clone() {
            Some(data) => {
                warn!(source = %name, "fetch failed, returning stale cache");
                FetchOutcome::Stale(data)
            }
            None => FetchOutcome::Unavailable,
        }
    }

    /// Returns the in-flight shared future for `name`, creating (and
    /// spawning) one if none exists. The spawned task owns the write to
    /// `entry` on success, independent of whether this caller keeps
    /// polling the returned future.
    fn shared_fetch_for(&self, name: &str, descriptor: &SourceDescriptor, entry: Arc<RwLock<CacheEntry>>) -> SharedFetch {
        if let Some(existing) = self.inflight.get(name) {
            return existing.clone();
        }

        let source = descriptor.fetch_handle();
        let name_owned = name.to_string();
        let inflight_table_key = name_owned.clone();
        let task: Pin<Box<dyn Future<Output = Option<Value>> + Send>> = Box::pin(async move {
            let result = source.fetch().await;
            match result {
                Ok(value) => {
                    let mut guard = entry.write();
                    guard.data = Some(value.clone());
                    guard.fetched_at = Some(Instant::now());
                    Some(value)
                }
                Err(err) => {
                    warn!(source = %name_owned, error = %err, "source fetch returned an error");
                    None
                }
            }
        });

        let handle = tokio::spawn(task);
        let shared: SharedFetch = async move { handle.await.unwrap_or(None) }.boxed().shared();

        self.inflight.insert(inflight_table_key.clone(), shared.clone());
        tokio::spawn(Self::cleanup_inflight(Arc::clone(&self.inflight), inflight_table_key, shared.clone()));
        shared
    }

    /// Once the fetch settles, drop its entry from the in-flight table so
    /// the next TTL expiry starts a fresh single-flight fetch instead of
    /// replaying this one's (possibly stale) result forever.
    async fn cleanup_inflight(table: Arc<DashMap<String, SharedFetch>>, key: String, fut: SharedFetch) {
        let _ = fut.await;
        table.remove(&key);
    }

    /// Fetch every name in `names` concurrently; names that resolve to
    /// `Unavailable` are simply absent from the result (spec §4.2).
    pub async fn fetch_sources(&self, names: &[String]) -> SourceData {
        let fetches = names.iter().map(|n| async move { (n.clone(), self.fetch_source(n).await) });
        let results = futures::future::join_all(fetches).await;
        let mut data = SourceData::new();
        for (name, outcome) in results {
            if let Some(value) = outcome.into_value() {
                data.insert(name, value);
            }
        }
        data
    }

    /// Fetch every currently registered source.
    pub async fn fetch_all_sources(&self) -> SourceData {
        let names: Vec<String> = self.registry.all_sources().iter().map(|d| d.name().to_string()).collect();
        self.fetch_sources(&names).await
    }

    /// Resets every cache entry. In-flight fetches are left to complete
    /// and will repopulate a fresh entry; this only discards what's
    /// already settled.
    pub fn clear_all_caches(&self) {
        for mut entry in self.entries.iter_mut() {
            let mut guard = entry.value_mut().write();
            guard.data = None;
            guard.fetched_at = None;
        }
    }
}
