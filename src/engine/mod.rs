//! The trading engine: sizing, ledger, execution, reconciliation, run loop.

pub mod error;
pub mod executor;
pub mod ledger;
pub mod reconcile;
pub mod runner;
pub mod sizing;

pub use error::EngineError;
pub use executor::{EngineConfig, TradeOutcome, TradingEngine};
pub use ledger::PositionLedger;
pub use reconcile::Reconciler;
