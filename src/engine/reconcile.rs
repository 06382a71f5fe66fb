//! Reconciliation bookkeeping: decides when the ledger is stale and carries
//! cost basis across full resyncs.
//!
//! The exchange account endpoint reports quantities but never cost basis, so
//! a naive resync would silently reset every bought price to the current
//! market price. `merge_cost_basis` is the piece that prevents that.

use chrono::{DateTime, Utc};

use crate::models::Position;

/// Balances at or below this are ignored during a resync.
pub const BALANCE_EPSILON: f64 = 1e-9;

/// Dirty-state tracker for the ledger.
///
/// Starts dirty so the first `reset_if_dirty` performs the initial sync.
#[derive(Debug, Clone)]
pub struct Reconciler {
    dirty: bool,
    last_reset: DateTime<Utc>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            dirty: true,
            last_reset: Utc::now(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the ledger stale. Called after every fill and after every failed
    /// order submission, since the exchange state is unknown either way.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.dirty = false;
        self.last_reset = Utc::now();
    }

    pub fn last_reset(&self) -> DateTime<Utc> {
        self.last_reset
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy a positive cost basis from the previous ledger snapshot onto every
/// fresh position with a matching symbol.
pub fn merge_cost_basis(old: &[Position], fresh: &mut [Position]) {
    for position in fresh.iter_mut() {
        if let Some(previous) = old.iter().find(|p| p.symbol == position.symbol) {
            if previous.cost_basis_price > 0.0 {
                position.cost_basis_price = previous.cost_basis_price;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(symbol: &str, quantity: f64, basis: f64) -> Position {
        let mut p = Position::new(symbol, "crypto", "BINANCE");
        p.available_quantity = quantity;
        p.cost_basis_price = basis;
        p
    }

    #[test]
    fn test_merge_preserves_old_cost_basis() {
        let old = vec![position("ETHUSDT", 1.0, 1950.0)];
        // resync defaulted the bought price to the current market price
        let mut fresh = vec![position("ETHUSDT", 1.2, 2100.0)];

        merge_cost_basis(&old, &mut fresh);

        assert_eq!(fresh[0].cost_basis_price, 1950.0);
        assert_eq!(fresh[0].available_quantity, 1.2);
    }

    #[test]
    fn test_merge_ignores_zero_old_basis() {
        let old = vec![position("ETHUSDT", 1.0, 0.0)];
        let mut fresh = vec![position("ETHUSDT", 1.0, 2100.0)];

        merge_cost_basis(&old, &mut fresh);

        assert_eq!(fresh[0].cost_basis_price, 2100.0);
    }

    #[test]
    fn test_merge_leaves_new_symbols_alone() {
        let old = vec![position("ETHUSDT", 1.0, 1950.0)];
        let mut fresh = vec![position("BTCUSDT", 0.1, 60000.0)];

        merge_cost_basis(&old, &mut fresh);

        assert_eq!(fresh[0].cost_basis_price, 60000.0);
    }

    #[test]
    fn test_reconciler_starts_dirty() {
        let reconciler = Reconciler::new();
        assert!(reconciler.is_dirty());
    }

    #[test]
    fn test_reconciler_clear_and_mark() {
        let mut reconciler = Reconciler::new();
        reconciler.clear();
        assert!(!reconciler.is_dirty());

        reconciler.mark_dirty();
        assert!(reconciler.is_dirty());
    }
}
