//! Order sizing: converts a desired trade into a quantized, filter-compliant
//! order quantity. Pure computation, no I/O.

use crate::engine::error::EngineError;
use crate::models::LotFilter;

/// Added to the lot granularity whenever `round(1/step_size)` lands on a
/// multiple of 9. Step sizes like 0.1 have no exact binary representation,
/// and the reciprocal can truncate to 9, 99, 999... producing off-by-one lot
/// counts; bumping the granularity by one keeps the quantized quantity on
/// the safe side of the filter.
pub const LOT_GRANULARITY_ADJUSTMENT: i64 = 1;

/// Safety margin over the exchange minimum notional on buys. Absorbs price
/// slippage between quote time and fill time.
pub const MIN_NOTIONAL_MARGIN: f64 = 1.1;

/// Number of lots per whole unit, derived from the filter's step size.
pub fn lot_granularity(step_size: f64) -> i64 {
    let mut granularity = (1.0 / step_size).round() as i64;
    if granularity % 9 == 0 {
        granularity += LOT_GRANULARITY_ADJUSTMENT;
    }
    granularity
}

/// A sized, submittable buy order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuyOrder {
    /// Quantized order quantity, rounded UP so the minimum notional still
    /// holds after quantization.
    pub quantity: f64,
    /// Quote amount the buy is budgeted against; the balance precondition
    /// checks this, not the post-quantization notional.
    pub required_quote: f64,
    pub projected_notional: f64,
}

/// Outcome of sizing a sell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SellSizing {
    Order {
        quantity: f64,
        projected_notional: f64,
    },
    /// The position cannot produce a compliant order. A policy event, not a
    /// hard error: triggers the force-sell top-up or a skipped action.
    BelowMinimum {
        quantity: f64,
        projected_notional: f64,
    },
}

/// Size a buy of `requested_quote` quote currency at the current price.
///
/// The target spend is floored at `min_notional * MIN_NOTIONAL_MARGIN`, so a
/// successful buy always clears the exchange minimum.
pub fn size_buy(requested_quote: f64, price: f64, filter: &LotFilter) -> BuyOrder {
    let required_quote = (filter.min_notional * MIN_NOTIONAL_MARGIN).max(requested_quote);
    let raw_quantity = (required_quote / price).max(filter.min_qty);

    let granularity = lot_granularity(filter.step_size);
    // Round UP: quantization must never drop the order back under the minimum
    let quantity = (raw_quantity / filter.step_size).ceil() / granularity as f64;

    BuyOrder {
        quantity,
        required_quote,
        projected_notional: quantity * price,
    }
}

/// Size a sell of `requested` units out of an `available` holding.
///
/// Fails with `InsufficientPosition` when the request exceeds the holding.
/// The quantity is rounded DOWN so the order never exceeds the available
/// balance.
pub fn size_sell(
    symbol: &str,
    requested: f64,
    available: f64,
    price: f64,
    filter: &LotFilter,
) -> Result<SellSizing, EngineError> {
    if requested > available {
        return Err(EngineError::InsufficientPosition {
            symbol: symbol.to_string(),
            available,
            requested,
        });
    }

    let granularity = lot_granularity(filter.step_size);
    let quantity = (requested / filter.step_size).floor() / granularity as f64;
    let projected_notional = quantity * price;

    if projected_notional < filter.min_notional || quantity < filter.min_qty {
        return Ok(SellSizing::BelowMinimum {
            quantity,
            projected_notional,
        });
    }

    Ok(SellSizing::Order {
        quantity,
        projected_notional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(step_size: f64, min_qty: f64, min_notional: f64) -> LotFilter {
        LotFilter {
            step_size,
            min_qty,
            min_notional,
        }
    }

    #[test]
    fn test_granularity_plain() {
        assert_eq!(lot_granularity(0.001), 1000);
        assert_eq!(lot_granularity(0.01), 100);
        assert_eq!(lot_granularity(1.0), 1);
    }

    #[test]
    fn test_granularity_multiple_of_nine_bumped() {
        // 1/step landing exactly on a multiple of 9 gets the adjustment
        assert_eq!(lot_granularity(1.0 / 9.0), 10);
        assert_eq!(lot_granularity(1.0 / 99.0), 100);
    }

    #[test]
    fn test_sell_already_on_step_boundary() {
        // step 0.001 -> granularity 1000; 0.015 is already a multiple
        let f = filter(0.001, 0.01, 10.0);
        let sized = size_sell("ETHUSDT", 0.015, 0.015, 2000.0, &f).unwrap();

        match sized {
            SellSizing::Order {
                quantity,
                projected_notional,
            } => {
                assert!((quantity - 0.015).abs() < 1e-12);
                assert!((projected_notional - 30.0).abs() < 1e-9);
            }
            other => panic!("expected sized order, got {:?}", other),
        }
    }

    #[test]
    fn test_sell_rounds_down_and_never_exceeds_available() {
        let f = filter(0.001, 0.01, 10.0);
        let sized = size_sell("ETHUSDT", 0.0157, 0.0157, 2000.0, &f).unwrap();

        match sized {
            SellSizing::Order { quantity, .. } => {
                assert!(quantity <= 0.0157);
                // integer multiple of step within floating tolerance
                let lots = quantity / 0.001;
                assert!((lots - lots.round()).abs() < 1e-9);
            }
            other => panic!("expected sized order, got {:?}", other),
        }
    }

    #[test]
    fn test_sell_more_than_available_is_rejected() {
        let f = filter(0.001, 0.01, 10.0);
        let err = size_sell("ETHUSDT", 2.0, 1.0, 2000.0, &f).unwrap_err();

        assert!(matches!(err, EngineError::InsufficientPosition { .. }));
    }

    #[test]
    fn test_sell_below_min_notional_is_flagged() {
        // 0.002 ETH at 2000 = 4.0 notional, under the 10.0 floor
        let f = filter(0.001, 0.001, 10.0);
        let sized = size_sell("ETHUSDT", 0.002, 0.002, 2000.0, &f).unwrap();

        assert!(matches!(sized, SellSizing::BelowMinimum { .. }));
    }

    #[test]
    fn test_sell_below_min_qty_is_flagged() {
        let f = filter(0.001, 0.05, 1.0);
        let sized = size_sell("ETHUSDT", 0.01, 0.01, 2000.0, &f).unwrap();

        assert!(matches!(sized, SellSizing::BelowMinimum { .. }));
    }

    #[test]
    fn test_buy_meets_min_notional_after_quantization() {
        // price 1, min_notional 5 -> target spend 5.5
        let f = filter(0.1, 0.1, 5.0);
        let order = size_buy(5.5, 1.0, &f);

        assert!((order.required_quote - 5.5).abs() < 1e-12);
        assert!(order.projected_notional >= 5.0);
        assert!(order.quantity > 0.0);
    }

    #[test]
    fn test_buy_small_request_floored_to_min_notional() {
        // Asking for 1 USDT of ETH still buys min_notional * 1.1 worth
        let f = filter(0.0001, 0.0001, 10.0);
        let order = size_buy(1.0, 2000.0, &f);

        assert!((order.required_quote - 11.0).abs() < 1e-9);
        assert!(order.projected_notional >= 10.0);
    }

    #[test]
    fn test_buy_large_request_wins_over_floor() {
        let f = filter(0.0001, 0.0001, 10.0);
        let order = size_buy(500.0, 2000.0, &f);

        assert!((order.required_quote - 500.0).abs() < 1e-9);
        assert!(order.projected_notional >= 500.0 - 1e-6);
    }

    #[test]
    fn test_buy_quantity_floored_to_min_qty() {
        // min_qty dominates the notional-derived quantity
        let f = filter(0.1, 5.0, 1.0);
        let order = size_buy(1.1, 1.0, &f);

        assert!(order.quantity >= 5.0 - 1e-9);
    }

    #[test]
    fn test_buy_rounds_up() {
        // 10.34 quantity at step 0.1 must round up, not down
        let f = filter(0.1, 0.1, 1.0);
        let order = size_buy(10.34, 1.0, &f);

        assert!(order.quantity >= 10.34 - 1e-9);
    }
}
