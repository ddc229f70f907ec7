//! Phase E gate: the ordered filter every detected opportunity passes
//! through before it's eligible for calibration and routing (spec §4.6).

use std::collections::HashSet;

use crate::core::domain::Opportunity;

/// Why an opportunity was dropped at the gate, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    /// Market price outside `[0.02, 0.98]`.
    Extreme,
    /// Edge exceeds this opportunity's signal-family ceiling.
    Suspicious,
    /// Confidence below the floor of `0.35`.
    LowConfidence,
    /// Same market already emitted this scan.
    Duplicate,
}

const MIN_PRICE: f64 = 0.02;
const MAX_PRICE: f64 = 0.98;
const MIN_CONFIDENCE: f64 = 0.35;

/// Runs the four ordered checks from spec §4.6 step 2-4 against one
/// opportunity, recording it in `emitted_this_scan` on success.
pub fn evaluate(opportunity: &Opportunity, emitted_this_scan: &mut HashSet<String>) -> Result<(), GateReason> {
    let price = crate::core::domain::price_to_f64(opportunity.market().price());
    if !(MIN_PRICE..=MAX_PRICE).contains(&price) {
        return Err(GateReason::Extreme);
    }

    if opportunity.edge() > opportunity.max_edge() {
        return Err(GateReason::Suspicious);
    }

    if opportunity.confidence() < MIN_CONFIDENCE {
        return Err(GateReason::LowConfidence);
    }

    let key = format!("{}:{}", opportunity.market().platform(), opportunity.market().id());
    if !emitted_this_scan.insert(key) {
        return Err(GateReason::Duplicate);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Category, Direction, Market, Signals, Urgency};
    use rust_decimal_macros::dec;

    fn market(price: rust_decimal::Decimal) -> Market {
        Market::new("kalshi", "KXBTC-Y", "KXBTC-Y", "Will BTC hit 100k?", Category::Crypto, price).unwrap()
    }

    fn opp(edge: f64, confidence: f64, price: rust_decimal::Decimal) -> Opportunity {
        Opportunity::new(market(price), "crypto-whale", edge, confidence, Direction::BuyYes, Urgency::Standard, Signals::new(), None)
    }

    #[test]
    fn passes_all_checks() {
        let mut seen = HashSet::new();
        let o = opp(0.1, 0.5, dec!(0.5));
        assert!(evaluate(&o, &mut seen).is_ok());
    }

    #[test]
    fn rejects_extreme_price() {
        let mut seen = HashSet::new();
        let o = opp(0.1, 0.5, dec!(0.99));
        assert_eq!(evaluate(&o, &mut seen), Err(GateReason::Extreme));
    }

    #[test]
    fn boundary_prices_pass() {
        let mut seen = HashSet::new();
        assert!(evaluate(&opp(0.1, 0.5, dec!(0.02)), &mut seen).is_ok());
        let mut seen = HashSet::new();
        assert!(evaluate(&opp(0.1, 0.5, dec!(0.98)), &mut seen).is_ok());
    }

    #[test]
    fn rejects_edge_over_ceiling() {
        let mut seen = HashSet::new();
        let o = opp(0.6, 0.5, dec!(0.5));
        assert_eq!(evaluate(&o, &mut seen), Err(GateReason::Suspicious));
    }

    #[test]
    fn rejects_low_confidence() {
        let mut seen = HashSet::new();
        let o = opp(0.1, 0.1, dec!(0.5));
        assert_eq!(evaluate(&o, &mut seen), Err(GateReason::LowConfidence));
    }

    #[test]
    fn rejects_duplicate_within_scan() {
        let mut seen = HashSet::new();
        let first = opp(0.1, 0.5, dec!(0.5));
        let second = opp(0.1, 0.5, dec!(0.5));
        assert!(evaluate(&first, &mut seen).is_ok());
        assert_eq!(evaluate(&second, &mut seen), Err(GateReason::Duplicate));
    }

    #[test]
    fn check_order_is_extreme_then_edge_then_confidence_then_duplicate() {
        let mut seen = HashSet::new();
        let bad_everything = opp(0.99, 0.0, dec!(0.99));
        assert_eq!(evaluate(&bad_everything, &mut seen), Err(GateReason::Extreme));
    }
}
