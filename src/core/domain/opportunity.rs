//! Opportunity types emitted by the scan pipeline.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::{price_to_f64, Market};

/// Which side of the binary contract an opportunity recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    BuyYes,
    BuyNo,
}

/// How quickly an opportunity should be acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Urgency {
    Fyi,
    Standard,
    Critical,
}

/// The closed set of signal tags a detector may attach to an opportunity.
///
/// This is the union of every tag name spec.md's §3 data model, §4.6 gate,
/// and §4.7 router sections reference. Several of these (`sports_consensus`,
/// `enhanced_sports`, `whale_conviction`, `macro_edge`, `options_implied`)
/// appear only in the gate/router sections and not in §3's own enumeration;
/// per §9's note on divergent sink-routing copies, this spec does not
/// silently unify them with their §3 near-namesakes (`sports`, `whale`,
/// `macro`, `options`) — each is kept as its own distinct tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalTag {
    Sports,
    Earnings,
    Measles,
    FedSpeech,
    Whale,
    NewMarket,
    CrossPlatform,
    Sentiment,
    Entertainment,
    Macro,
    Options,
    LineMove,
    PlayerProp,
    RecencyBias,
    WeatherBias,
    TimeDecay,
    SportsConsensus,
    EnhancedSports,
    WhaleConviction,
    MacroEdge,
    OptionsImplied,
}

impl SignalTag {
    /// Every tag, for ledger per-signal breakdowns and registry iteration.
    pub const ALL: [SignalTag; 21] = [
        SignalTag::Sports,
        SignalTag::Earnings,
        SignalTag::Measles,
        SignalTag::FedSpeech,
        SignalTag::Whale,
        SignalTag::NewMarket,
        SignalTag::CrossPlatform,
        SignalTag::Sentiment,
        SignalTag::Entertainment,
        SignalTag::Macro,
        SignalTag::Options,
        SignalTag::LineMove,
        SignalTag::PlayerProp,
        SignalTag::RecencyBias,
        SignalTag::WeatherBias,
        SignalTag::TimeDecay,
        SignalTag::SportsConsensus,
        SignalTag::EnhancedSports,
        SignalTag::WhaleConviction,
        SignalTag::MacroEdge,
        SignalTag::OptionsImplied,
    ];
}

/// The open-ended envelope of signal tags carried by an opportunity.
///
/// Each present tag maps to a detector-defined strength/weight value; a
/// missing tag means "no signal of that kind", not zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signals(BTreeMap<SignalTag, f64>);

impl Signals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, tag: SignalTag, value: f64) -> Self {
        self.0.insert(tag, value);
        self
    }

    #[must_use]
    pub fn get(&self, tag: SignalTag) -> Option<f64> {
        self.0.get(&tag).copied()
    }

    #[must_use]
    pub fn contains(&self, tag: SignalTag) -> bool {
        self.0.contains_key(&tag)
    }

    #[must_use]
    pub fn contains_any(&self, tags: &[SignalTag]) -> bool {
        tags.iter().any(|t| self.contains(*t))
    }

    pub fn tags(&self) -> impl Iterator<Item = SignalTag> + '_ {
        self.0.keys().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(SignalTag, f64)> for Signals {
    fn from_iter<T: IntoIterator<Item = (SignalTag, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Optional position-sizing hint a detector may attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sizing {
    pub suggested_stake: Decimal,
    pub max_stake: Decimal,
}

/// The pipeline's output unit: a candidate edge to route and deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    market: Market,
    source: String,
    edge: f64,
    confidence: f64,
    direction: Direction,
    urgency: Urgency,
    signals: Signals,
    sizing: Option<Sizing>,
}

/// The families of signal tags that relax the edge ceiling in Phase E of
/// the scan pipeline (spec §4.6, step 2).
pub const RELAXED_EDGE_SIGNALS: [SignalTag; 5] = [
    SignalTag::PlayerProp,
    SignalTag::SportsConsensus,
    SignalTag::EnhancedSports,
    SignalTag::Earnings,
    SignalTag::FedSpeech,
];

impl Opportunity {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: Market,
        source: impl Into<String>,
        edge: f64,
        confidence: f64,
        direction: Direction,
        urgency: Urgency,
        signals: Signals,
        sizing: Option<Sizing>,
    ) -> Self {
        Self {
            market,
            source: source.into(),
            edge,
            confidence,
            direction,
            urgency,
            signals,
            sizing,
        }
    }

    #[must_use]
    pub fn market(&self) -> &Market {
        &self.market
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn edge(&self) -> f64 {
        self.edge
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Lower the reported confidence without changing direction (§4.6 Phase F).
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence;
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    #[must_use]
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    #[must_use]
    pub fn sizing(&self) -> Option<&Sizing> {
        self.sizing.as_ref()
    }

    /// The maximum edge permitted for this opportunity's signal family
    /// (spec §4.6 Phase E, step 2 / §3 `maxEdgeForKind`).
    #[must_use]
    pub fn max_edge(&self) -> f64 {
        if self.signals.contains_any(&RELAXED_EDGE_SIGNALS) {
            0.90
        } else {
            0.50
        }
    }

    /// Our implied probability estimate: the market price shifted by
    /// `edge` in the direction we're betting. `edge` is defined as the
    /// magnitude of that shift (spec §3), so the sign depends on
    /// `direction`. Used by Phase F to feed the calibration ledger.
    #[must_use]
    pub fn estimated_probability(&self) -> f64 {
        let price = price_to_f64(self.market.price());
        match self.direction {
            Direction::BuyYes => (price + self.edge).min(1.0),
            Direction::BuyNo => (price - self.edge).max(0.0),
        }
    }

    /// Validity predicate from §3's `Opportunity` invariants.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let price = self.market.price();
        price >= Decimal::new(2, 2)
            && price <= Decimal::new(98, 2)
            && self.edge >= 0.0
            && self.edge <= self.max_edge()
            && self.confidence >= 0.35
    }
}
