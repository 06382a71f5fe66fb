//! In-memory position ledger: the quote-currency balance plus every tracked
//! base-asset position.
//!
//! All mutation flows through confirmed fills (`upsert_after_fill`) or a full
//! resynchronization (see `reconcile`); nothing else writes to it.

use crate::models::{Position, Side};

/// Residual quantity below this is treated as fully liquidated.
pub const DUST_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct PositionLedger {
    quote: Position,
    positions: Vec<Position>,
    market: String,
    venue: String,
}

impl PositionLedger {
    pub fn new(quote_asset: &str, market: &str, venue: &str) -> Self {
        Self {
            quote: Position::new(quote_asset, market, venue),
            positions: Vec::new(),
            market: market.to_string(),
            venue: venue.to_string(),
        }
    }

    pub fn quote(&self) -> &Position {
        &self.quote
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn find(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// Symbols currently held with a non-zero quantity.
    pub fn held_symbols(&self) -> Vec<String> {
        self.positions
            .iter()
            .filter(|p| p.is_held())
            .map(|p| p.symbol.clone())
            .collect()
    }

    /// Wholesale replacement of the quote balance from an account snapshot.
    pub fn set_quote(&mut self, quote: Position) {
        self.quote = quote;
    }

    /// Wholesale replacement of the position list from an account snapshot.
    /// Cost-basis preservation happens before this call, in the merge step.
    pub fn replace_positions(&mut self, positions: Vec<Position>) {
        self.positions = positions;
    }

    /// Apply a confirmed fill.
    ///
    /// BUY accumulates quantity and ratchets the cost basis upward:
    /// `max(existing, fill_price)`, never averaged and never lowered.
    /// SELL reduces quantity; a residual under `DUST_EPSILON` clears both
    /// quantity and cost basis to zero.
    pub fn upsert_after_fill(&mut self, symbol: &str, side: Side, filled_quantity: f64, fill_price: f64) {
        match side {
            Side::Buy => {
                if let Some(position) = self.positions.iter_mut().find(|p| p.symbol == symbol) {
                    position.available_quantity += filled_quantity;
                    if fill_price > position.cost_basis_price {
                        position.cost_basis_price = fill_price;
                    }
                } else {
                    let mut position = Position::new(symbol, &self.market, &self.venue);
                    position.available_quantity = filled_quantity;
                    position.cost_basis_price = fill_price;
                    self.positions.push(position);
                }
            }
            Side::Sell => {
                let Some(position) = self.positions.iter_mut().find(|p| p.symbol == symbol) else {
                    tracing::warn!("sell fill for {} but no ledger position", symbol);
                    return;
                };
                position.available_quantity -= filled_quantity;
                if position.available_quantity <= DUST_EPSILON {
                    position.available_quantity = 0.0;
                    position.cost_basis_price = 0.0;
                }
            }
        }
    }

    /// Reduce the quote balance after a buy fill. Interim estimate only; the
    /// next resync replaces it with the exchange's number.
    pub fn debit_quote(&mut self, amount: f64) {
        self.quote.available_quantity = (self.quote.available_quantity - amount).max(0.0);
    }

    /// Increase the quote balance after a sell fill.
    pub fn credit_quote(&mut self, amount: f64) {
        self.quote.available_quantity += amount;
    }
}
