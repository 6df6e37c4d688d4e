// 8.0: the clearing house. coordinates trade execution against the market pools,
// the debt ledger, the price-impact guard, margin and liquidation.
// deterministic; the pool, oracle and vault are injected behind traits.

mod admin;
mod config;
mod core;
mod liquidations;
mod results;
mod trading;

pub use self::config::EngineConfig;
pub use self::core::ClearingHouse;
pub use self::results::{EngineError, ErrorKind, LiquidationResult, TradeResult};
pub use self::trading::OpenPositionParams;
