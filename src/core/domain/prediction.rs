//! Ledger entries: a prediction and its (eventual) resolved outcome.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::{price_to_f64, Category, MarketId, Platform};
use super::opportunity::SignalTag;

/// An append-only ledger entry: a probability estimate recorded at
/// emission time, and (once the market settles) its realized outcome.
///
/// Lifecycle: created by [`crate::core::ledger::CalibrationLedger::record_prediction`],
/// resolved exactly once by `resolve_prediction`, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub platform: Platform,
    pub market_id: MarketId,
    pub category: Category,
    pub predicted_at: DateTime<Utc>,
    pub estimate: f64,
    pub market_price_at_prediction: Decimal,
    pub signal_sources: Vec<SignalTag>,
    pub confidence: f64,
    pub resolved_at: Option<DateTime<Utc>>,
    pub outcome: Option<bool>,
    pub final_market_price: Option<Decimal>,
    pub brier_contribution: Option<f64>,
    pub was_correct_direction: Option<bool>,
    pub profit_loss: Option<Decimal>,
}

/// $100 notional assumption used to derive `profit_loss` on resolution
/// (spec §3). Buying the side implied by the estimate (YES if
/// `estimate > price_at_prediction`, else NO) at the recorded market
/// price: a correct call pays out `stake * (1 - side_price) / side_price`;
/// an incorrect call loses the full stake. The exact payout formula is
/// left open by §3's "$100 notional assumption" — see DESIGN.md's "Open
/// Questions resolved" section for the resolution.
pub const NOTIONAL_STAKE: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

impl PredictionRecord {
    #[must_use]
    pub fn new(
        platform: Platform,
        market_id: MarketId,
        category: Category,
        predicted_at: DateTime<Utc>,
        estimate: f64,
        market_price_at_prediction: Decimal,
        signal_sources: Vec<SignalTag>,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            platform,
            market_id,
            category,
            predicted_at,
            estimate,
            market_price_at_prediction,
            signal_sources,
            confidence,
            resolved_at: None,
            outcome: None,
            final_market_price: None,
            brier_contribution: None,
            was_correct_direction: None,
            profit_loss: None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// We effectively bet YES when our estimate exceeds the market's
    /// implied probability at prediction time, NO otherwise.
    #[must_use]
    pub fn predicted_yes(&self) -> bool {
        self.estimate > price_to_f64(self.market_price_at_prediction)
    }

    /// Resolve this record in place. Idempotency is the caller's
    /// responsibility (the ledger only calls this once per record).
    pub fn resolve(&mut self, resolved_at: DateTime<Utc>, outcome: bool, final_price: Option<Decimal>) {
        let estimate = self.estimate;
        let outcome_f = if outcome { 1.0 } else { 0.0 };
        let brier = (estimate - outcome_f).powi(2);
        let predicted_yes = self.predicted_yes();
        let was_correct = predicted_yes == outcome;

        let side_price = if predicted_yes {
            self.market_price_at_prediction
        } else {
            Decimal::ONE - self.market_price_at_prediction
        };

        let profit_loss = if was_correct {
            NOTIONAL_STAKE * (Decimal::ONE - side_price) / side_price
        } else {
            -NOTIONAL_STAKE
        };

        self.resolved_at = Some(resolved_at);
        self.outcome = Some(outcome);
        self.final_market_price = final_price;
        self.brier_contribution = Some(brier);
        self.was_correct_direction = Some(was_correct);
        self.profit_loss = Some(profit_loss);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(estimate: f64, price: Decimal) -> PredictionRecord {
        PredictionRecord::new(
            Platform::new("kalshi"),
            MarketId::new("KXBTC-Y"),
            Category::Crypto,
            Utc::now(),
            estimate,
            price,
            vec![SignalTag::Whale],
            0.7,
        )
    }

    #[test]
    fn brier_contribution_is_squared_error() {
        let mut r = record(0.8, dec!(0.5));
        r.resolve(Utc::now(), true, Some(dec!(0.99)));
        assert!((r.brier_contribution.unwrap() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn brier_in_range_zero_one() {
        let mut r = record(0.1, dec!(0.5));
        r.resolve(Utc::now(), true, None);
        let b = r.brier_contribution.unwrap();
        assert!((0.0..=1.0).contains(&b));
    }

    #[test]
    fn correct_direction_yes_profits() {
        let mut r = record(0.8, dec!(0.5));
        r.resolve(Utc::now(), true, None);
        assert_eq!(r.was_correct_direction, Some(true));
        assert_eq!(r.profit_loss.unwrap(), dec!(100));
    }

    #[test]
    fn incorrect_direction_loses_stake() {
        let mut r = record(0.8, dec!(0.5));
        r.resolve(Utc::now(), false, None);
        assert_eq!(r.was_correct_direction, Some(false));
        assert_eq!(r.profit_loss.unwrap(), dec!(-100));
    }

    #[test]
    fn resolved_at_is_set_exactly_once() {
        let mut r = record(0.8, dec!(0.5));
        assert!(!r.is_resolved());
        r.resolve(Utc::now(), true, None);
        assert!(r.is_resolved());
    }
}
