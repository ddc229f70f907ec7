//! Core domain types.
//!
//! - [`Market`] / [`Category`] / [`Platform`] / [`MarketId`] — per-scan market snapshot.
//! - [`Opportunity`] / [`Direction`] / [`Urgency`] / [`Signals`] / [`SignalTag`] — emission candidates.
//! - [`SourceData`] — the per-scan view assembled from the source cache.
//! - [`PredictionRecord`] — calibration ledger entries.
//! - [`Channel`] — routing destinations.

mod channel;
mod market;
mod opportunity;
mod prediction;
mod source_data;

pub use channel::Channel;
pub use market::{Category, InvalidPrice, Market, MarketId, Platform};
pub(crate) use market::price_to_f64;
pub use opportunity::{Direction, Opportunity, RELAXED_EDGE_SIGNALS, SignalTag, Signals, Sizing, Urgency};
pub use prediction::{PredictionRecord, NOTIONAL_STAKE};
pub use source_data::SourceData;
