use thiserror::Error;

use crate::gateway::GatewayError;

/// Engine-level failure taxonomy.
///
/// Failures inside one symbol's buy/sell are contained to that symbol; the
/// run loop logs them and moves on to the next candidate. A below-minimum
/// order is not an error: sizing reports it as a `SellSizing` value and the
/// engine as a `TradeOutcome`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not enough {quote_asset}: have {available:.8}, need {required:.8}")]
    InsufficientQuoteBalance {
        quote_asset: String,
        available: f64,
        required: f64,
    },

    #[error("not enough {symbol}: have {available:.8}, requested {requested:.8}")]
    InsufficientPosition {
        symbol: String,
        available: f64,
        requested: f64,
    },

    /// Advice referenced a symbol that is not in the ledger. Reported as a
    /// logical inconsistency, never retried.
    #[error("no position held for {0}")]
    PositionNotFound(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
