//! Exchange-neutral contracts consumed by the trading engine.
//!
//! The engine never talks HTTP itself; it goes through these traits so that
//! tests can inject a deterministic in-memory exchange.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AssetBalance, LotFilter, OrderReport, Side};

/// Transport-level failure from the exchange.
///
/// The engine catches these at the order-submission boundary, logs them and
/// leaves the ledger untouched; the dirty flag forces a resync from ground
/// truth on the next cycle.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("exchange api error: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            GatewayError::Network(e.to_string())
        } else if e.is_decode() {
            GatewayError::Parse(e.to_string())
        } else {
            GatewayError::Api(e.to_string())
        }
    }
}

/// Narrow view of an exchange account.
///
/// Timeout/retry policy belongs to the implementation, not to the engine.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// All account balances, including dust and the quote currency.
    async fn account_balances(&self) -> Result<Vec<AssetBalance>, GatewayError>;

    /// Current market price for a symbol.
    async fn price(&self, symbol: &str) -> Result<f64, GatewayError>;

    /// Quantization constraints for a symbol.
    async fn lot_filter(&self, symbol: &str) -> Result<LotFilter, GatewayError>;

    /// Submit a market order. A non-`Filled` report is a valid response,
    /// not an error.
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<OrderReport, GatewayError>;
}

/// Maps a raw balance asset code (e.g. "ETH") to a tradable pair id
/// (e.g. "ETHUSDT"), or `None` when no such pair is listed.
pub trait SymbolResolver: Send + Sync {
    fn resolve(&self, base_asset: &str) -> Option<String>;
}
