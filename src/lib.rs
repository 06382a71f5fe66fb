// Core modules
pub mod api;
pub mod decision;
pub mod engine;
pub mod gateway;
pub mod models;

// Re-export commonly used types
pub use decision::DecisionProvider;
pub use engine::{EngineConfig, EngineError, TradeOutcome, TradingEngine};
pub use gateway::{ExchangeGateway, GatewayError, SymbolResolver};
pub use models::*;
