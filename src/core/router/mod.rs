//! Router & sink layer: classifies opportunities into channels, dedupes
//! against a long-lived `seenMarkets` set, and dispatches to pluggable
//! sinks (spec §4.7 / §4.8).
//!
//! Grounded on the teacher's `core::service::notification::NotifierRegistry`
//! (`Vec<Box<dyn Notifier>>` fanning a single event out to every
//! registered handler) — generalized to a name-keyed, single-sink-per-
//! channel table since routing here picks exactly one destination per
//! opportunity rather than broadcasting.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::core::domain::{Channel, Opportunity, SignalTag};

/// A pluggable delivery destination. Must not throw across the contract
/// boundary (spec §6); failure is communicated by returning `false`.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, channel: Channel, opportunity: &Opportunity) -> bool;

    /// Deliver a multi-outcome group as one combined payload (spec §4.8).
    /// Cooperative convention, not enforced: the default delivers only the
    /// group's highest-edge opportunity individually.
    async fn deliver_group(&self, channel: Channel, opportunities: &[Opportunity]) -> bool {
        match opportunities
            .iter()
            .max_by(|a, b| a.edge().partial_cmp(&b.edge()).unwrap_or(std::cmp::Ordering::Equal))
        {
            Some(top) => self.deliver(channel, top).await,
            None => true,
        }
    }
}

/// Per-route delivery outcome, for pipeline-level statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered(Channel),
    DroppedNoSink(Channel),
    DroppedDuplicate,
    DroppedTimeout(Channel),
}

pub struct Router {
    sinks: RwLock<HashMap<Channel, Arc<dyn Sink>>>,
    seen_markets: Mutex<HashSet<String>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(HashMap::new()),
            seen_markets: Mutex::new(HashSet::new()),
        }
    }

    pub fn register_sink(&self, channel: Channel, sink: Arc<dyn Sink>) {
        if self.sinks.read().contains_key(&channel) {
            warn!(channel = %channel, "overwriting previously registered sink");
        }
        self.sinks.write().insert(channel, sink);
    }

    /// Route and deliver a single opportunity within `sink_deadline`.
    pub async fn route(&self, opportunity: &Opportunity, sink_deadline: Duration) -> RouteOutcome {
        let channel = classify(opportunity);
        let key = market_key(opportunity);

        {
            let mut seen = self.seen_markets.lock();
            if !seen.insert(key) {
                debug!(channel = %channel, "dropping duplicate against seenMarkets");
                return RouteOutcome::DroppedDuplicate;
            }
        }

        let Some(sink) = self.sinks.read().get(&channel).cloned() else {
            debug!(channel = %channel, "no sink registered for channel, dropping");
            return RouteOutcome::DroppedNoSink(channel);
        };

        match tokio::time::timeout(sink_deadline, sink.deliver(channel, opportunity)).await {
            Ok(true) => RouteOutcome::Delivered(channel),
            Ok(false) => {
                warn!(channel = %channel, "sink reported delivery failure");
                RouteOutcome::DroppedTimeout(channel)
            }
            Err(_) => {
                warn!(channel = %channel, deadline_secs = sink_deadline.as_secs(), "sink delivery timed out");
                RouteOutcome::DroppedTimeout(channel)
            }
        }
    }

    /// Route a full batch, applying multi-outcome grouping (spec §4.8)
    /// before delivery; singles are routed individually.
    pub async fn route_batch(&self, opportunities: Vec<Opportunity>, sink_deadline: Duration) -> Vec<RouteOutcome> {
        let (grouped, singles) = partition_multi_outcome(opportunities);

        let mut outcomes = Vec::new();
        for (_key, group) in grouped {
            let Some(first) = group.first() else { continue };
            let channel = classify(first);

            let mut seen = self.seen_markets.lock();
            let new_keys: Vec<&Opportunity> = group.iter().filter(|o| seen.insert(market_key(o))).collect();
            drop(seen);
            if new_keys.is_empty() {
                outcomes.push(RouteOutcome::DroppedDuplicate);
                continue;
            }

            let Some(sink) = self.sinks.read().get(&channel).cloned() else {
                outcomes.push(RouteOutcome::DroppedNoSink(channel));
                continue;
            };
            let fresh: Vec<Opportunity> = new_keys.into_iter().cloned().collect();
            match tokio::time::timeout(sink_deadline, sink.deliver_group(channel, &fresh)).await {
                Ok(true) => outcomes.push(RouteOutcome::Delivered(channel)),
                Ok(false) => outcomes.push(RouteOutcome::DroppedTimeout(channel)),
                Err(_) => outcomes.push(RouteOutcome::DroppedTimeout(channel)),
            }
        }

        for opportunity in singles {
            outcomes.push(self.route(&opportunity, sink_deadline).await);
        }

        outcomes
    }

    /// Clears the cross-scan `seenMarkets` dedup set (spec §4.7
    /// `clearSentMarketsCache`). Not called automatically between scans.
    pub fn clear_sent_markets_cache(&self) {
        self.seen_markets.lock().clear();
    }
}

fn market_key(opportunity: &Opportunity) -> String {
    format!("{}:{}", opportunity.market().platform(), opportunity.market().id())
}

/// Channel selection priority cascade (spec §4.7).
#[must_use]
pub fn classify(opportunity: &Opportunity) -> Channel {
    if let Some(channel) = classify_by_source(opportunity.source()) {
        return channel;
    }
    if let Some(channel) = classify_by_signals(opportunity) {
        return channel;
    }
    classify_by_category(opportunity)
}

fn classify_by_source(source: &str) -> Option<Channel> {
    match source {
        "measles" => Some(Channel::Health),
        "earnings" => Some(Channel::Mentions),
        "sports" => Some(Channel::Sports),
        "macro" | "options" => Some(Channel::Economics),
        "whale" => Some(Channel::Economics),
        "new-market" => Some(Channel::Digest),
        _ => None,
    }
}

fn classify_by_signals(opportunity: &Opportunity) -> Option<Channel> {
    let signals = opportunity.signals();
    let priority: [(SignalTag, Channel); 1] = [(SignalTag::WhaleConviction, Channel::Economics)];
    for (tag, channel) in priority {
        if signals.contains(tag) {
            return Some(channel);
        }
    }
    if signals.contains(SignalTag::NewMarket) {
        return Some(Channel::Digest);
    }
    if signals.contains(SignalTag::FedSpeech) {
        return Some(Channel::Mentions);
    }
    if signals.contains(SignalTag::Measles) {
        return Some(Channel::Health);
    }
    if signals.contains_any(&[SignalTag::EnhancedSports, SignalTag::SportsConsensus]) {
        return Some(Channel::Sports);
    }
    if signals.contains_any(&[SignalTag::MacroEdge, SignalTag::OptionsImplied]) {
        return Some(Channel::Economics);
    }
    if signals.contains(SignalTag::Entertainment) {
        return Some(Channel::Entertainment);
    }
    None
}

fn classify_by_category(opportunity: &Opportunity) -> Channel {
    use crate::core::domain::Category;
    match opportunity.market().category() {
        Category::Sports => Channel::Sports,
        Category::Weather => Channel::Weather,
        Category::Macro => Channel::Economics,
        Category::Politics | Category::Geopolitics => Channel::Politics,
        Category::Crypto => Channel::Crypto,
        Category::Entertainment => Channel::Entertainment,
        Category::Tech => Channel::Economics,
        Category::Health | Category::Other => Channel::Digest,
    }
}

/// Whether an opportunity is a multi-outcome candidate (spec §4.8):
/// `earnings`/`fedSpeech` signal present, or the market carries a subtitle.
#[must_use]
pub fn is_multi_outcome(opportunity: &Opportunity) -> bool {
    opportunity.signals().contains_any(&[SignalTag::Earnings, SignalTag::FedSpeech]) || opportunity.market().has_subtitle()
}

/// Grouping key for a multi-outcome opportunity (spec §4.8). There is no
/// separate "company" field in the data model, so the market's ticker
/// stands in for it — see DESIGN.md's Open Question resolution.
fn grouping_key(opportunity: &Opportunity) -> String {
    if opportunity.signals().contains(SignalTag::FedSpeech) {
        "fed:speech".to_string()
    } else if opportunity.signals().contains(SignalTag::Earnings) {
        format!("earnings:{}", opportunity.market().ticker())
    } else {
        format!("market:{}", opportunity.market().title())
    }
}

fn partition_multi_outcome(opportunities: Vec<Opportunity>) -> (Vec<(String, Vec<Opportunity>)>, Vec<Opportunity>) {
    let mut groups: HashMap<String, Vec<Opportunity>> = HashMap::new();
    let mut singles = Vec::new();

    for opportunity in opportunities {
        if is_multi_outcome(&opportunity) {
            groups.entry(grouping_key(&opportunity)).or_default().push(opportunity);
        } else {
            singles.push(opportunity);
        }
    }

    let mut grouped: Vec<(String, Vec<Opportunity>)> = groups.into_iter().collect();
    for (_, group) in &mut grouped {
        group.sort_by(|a, b| b.edge().partial_cmp(&a.edge()).unwrap_or(std::cmp::Ordering::Equal));
    }
    (grouped, singles)
}
