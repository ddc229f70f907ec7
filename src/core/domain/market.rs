//! Market snapshot types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange/platform tag a market snapshot originated from (e.g. `"kalshi"`,
/// `"polymarket"`). Deliberately not a closed enum: the core treats the set
/// of platforms as open, since new exchanges are a source-layer concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform(String);

impl Platform {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<String>> From<T> for Platform {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// Per-market identifier, unique within its platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketId(String);

impl MarketId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<String>> From<T> for MarketId {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// The closed set of market categories named by the spec's data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sports,
    Weather,
    Macro,
    Politics,
    Geopolitics,
    Crypto,
    Entertainment,
    Tech,
    Health,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Sports => "sports",
            Category::Weather => "weather",
            Category::Macro => "macro",
            Category::Politics => "politics",
            Category::Geopolitics => "geopolitics",
            Category::Crypto => "crypto",
            Category::Entertainment => "entertainment",
            Category::Tech => "tech",
            Category::Health => "health",
            Category::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// An immutable per-scan snapshot of one binary contract.
///
/// Construction validates the invariant `0 < price < 1` (spec §3); there is
/// no setter that can violate it afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    platform: Platform,
    id: MarketId,
    ticker: String,
    title: String,
    subtitle: Option<String>,
    category: Category,
    price: Decimal,
    volume: Option<Decimal>,
    liquidity: Option<Decimal>,
    url: Option<String>,
    close_time: Option<DateTime<Utc>>,
}

/// Error constructing a `Market` whose price invariant does not hold.
#[derive(Debug, Clone, thiserror::Error)]
#[error("market price {0} is outside the open interval (0, 1)")]
pub struct InvalidPrice(pub Decimal);

impl Market {
    /// Create a new market snapshot, rejecting prices outside `(0, 1)`.
    pub fn new(
        platform: impl Into<Platform>,
        id: impl Into<MarketId>,
        ticker: impl Into<String>,
        title: impl Into<String>,
        category: Category,
        price: Decimal,
    ) -> Result<Self, InvalidPrice> {
        if price <= Decimal::ZERO || price >= Decimal::ONE {
            return Err(InvalidPrice(price));
        }
        Ok(Self {
            platform: platform.into(),
            id: id.into(),
            ticker: ticker.into(),
            title: title.into(),
            subtitle: None,
            category,
            price,
            volume: None,
            liquidity: None,
            url: None,
            close_time: None,
        })
    }

    #[must_use]
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume: Decimal) -> Self {
        self.volume = Some(volume);
        self
    }

    #[must_use]
    pub fn with_liquidity(mut self, liquidity: Decimal) -> Self {
        self.liquidity = Some(liquidity);
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_close_time(mut self, close_time: DateTime<Utc>) -> Self {
        self.close_time = Some(close_time);
        self
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    #[must_use]
    pub fn id(&self) -> &MarketId {
        &self.id
    }

    #[must_use]
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn price(&self) -> Decimal {
        self.price
    }

    #[must_use]
    pub fn volume(&self) -> Option<Decimal> {
        self.volume
    }

    #[must_use]
    pub fn liquidity(&self) -> Option<Decimal> {
        self.liquidity
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    #[must_use]
    pub fn close_time(&self) -> Option<DateTime<Utc>> {
        self.close_time
    }

    /// Whether this market is a multi-outcome candidate per §4.8: it has a
    /// non-empty subtitle.
    #[must_use]
    pub fn has_subtitle(&self) -> bool {
        self.subtitle.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// Lossy `Decimal` → `f64` conversion shared by the calibration ledger and
/// opportunity estimate derivation, both of which only need probability
/// arithmetic precision, not money precision.
#[must_use]
pub(crate) fn price_to_f64(price: Decimal) -> f64 {
    use std::str::FromStr;
    f64::from_str(&price.to_string()).unwrap_or(0.5)
}
