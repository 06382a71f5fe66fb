pub mod binance;

pub use binance::{BinanceClient, SymbolDirectory, BINANCE_TESTNET_URL};
