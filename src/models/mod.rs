use serde::{Deserialize, Serialize};

/// Order side sent to the exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire representation used by the exchange API
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Per-symbol advice from a decision provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Advice {
    Buy,
    Sell,
    Neutral,
}

/// One held or tracked asset.
///
/// The quote-currency balance reuses this shape with no cost-basis semantics.
/// `cost_basis_price == 0.0` means no cost basis recorded; a fully liquidated
/// position keeps its record with quantity and cost basis cleared to zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub market: String, // e.g. "crypto"
    pub venue: String,  // e.g. "BINANCE"
    pub available_quantity: f64,
    pub cost_basis_price: f64,
}

impl Position {
    pub fn new(
        symbol: impl Into<String>,
        market: impl Into<String>,
        venue: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            market: market.into(),
            venue: venue.into(),
            available_quantity: 0.0,
            cost_basis_price: 0.0,
        }
    }

    pub fn is_held(&self) -> bool {
        self.available_quantity > 0.0
    }
}

/// One balance row as reported by the exchange account endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: f64,
}

/// Per-symbol quantization constraints.
///
/// Fetched fresh from the exchange for every order; filters rarely change
/// but can, so nothing caches them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LotFilter {
    /// Quantity granularity
    pub step_size: f64,
    /// Smallest order quantity the exchange accepts
    pub min_qty: f64,
    /// Smallest order value in quote currency the exchange accepts
    pub min_notional: f64,
}

/// Terminal status of a submitted market order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Filled,
    Rejected,
    Expired,
    Other(String),
}

/// Result of one market order submission.
///
/// Anything other than `Filled` is treated as a non-fatal failure: logged,
/// ledger left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReport {
    pub status: OrderStatus,
    pub filled_quantity: f64,
    pub fill_price: f64,
}
