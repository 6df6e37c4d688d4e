// clearing-core: perpetual clearing engine over virtual pools.
// positions are debt-ledger balances of virtual base/quote tokens; trades swap them
// against a per-market pool, margin is valued at the index price, never the pool price.
// all computation is deterministic; pool, oracle and vault are injected behind traits.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: MarketId, AccountId, Price, Quote, Tick, BlockNumber
//   2.x  balance.rs: (available, debt) token ledger, mint shortfall / burn matched pairs
//   3.x  margin.rs: account value, IM/MM requirements at index price
//   4.x  position.rs: fill classification, realized pnl split
//   5.x  price_impact.rs: per-block tick cap, reject / downgrade decisions
//   6.x  liquidation.rs: penalty split, partial close size, insurance fund
//   7.x  config.rs: owner, ratios, limits, env presets
//   8.x  engine/: clearing house: trading, liquidations, admin
//   9.1  oracle.rs: index price source + in-memory TWAP feed
//   9.2  vault.rs: collateral custody seam + in-memory vault
//   9.3  pool.rs: pool seam + constant product reference pool
//   10.x account.rs: per-market balances, owed realized pnl, open markets
//   11.x events.rs: state transition events for audit
//   12.x market.rs: market config + runtime state

// core clearing modules
pub mod account;
pub mod balance;
pub mod engine;
pub mod events;
pub mod liquidation;
pub mod margin;
pub mod market;
pub mod position;
pub mod price_impact;
pub mod types;

// collaborator seams and settings
pub mod config;
pub mod oracle;
pub mod pool;
pub mod vault;

// re exports for convenience
pub use account::*;
pub use balance::*;
pub use engine::*;
pub use events::*;
pub use liquidation::*;
pub use margin::*;
pub use market::*;
pub use position::*;
pub use price_impact::*;
pub use types::*;
pub use config::{ClearingHouseConfig, ConfigError, Environment};
pub use oracle::{IndexPriceFeed, Oracle, OracleError};
pub use pool::{ConstantProductPool, Pool, PoolError, SwapOutcome, SwapRequest};
pub use vault::{InMemoryVault, Vault, VaultError};
