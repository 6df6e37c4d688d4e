//! Market configuration and state.
//!
//! A market is a base/quote pair of virtual tokens traded against one pool.
//! It carries its own fee ratio and per-block price-impact cap.

use crate::config::ConfigError;
use crate::pool::Pool;
use crate::price_impact::PriceImpactGuard;
use crate::types::{MarketId, Quote};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Static market configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub id: MarketId,
    /// Human-readable name (e.g., "ETH-PERP")
    pub name: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    /// Fee charged on the quote leg of every trade, in [0, 1)
    pub fee_ratio: Decimal,
    /// Ticks the pool may move from the block's start tick before new risk is refused. 0 disables.
    pub max_tick_crossed_within_block: u32,
}

impl MarketConfig {
    /// ETH-PERP with a 1% fee and a 100 tick cap
    pub fn eth_perp() -> Self {
        Self {
            id: MarketId(1),
            name: "ETH-PERP".to_string(),
            base_symbol: "vETH".to_string(),
            quote_symbol: "vUSD".to_string(),
            fee_ratio: dec!(0.01),
            max_tick_crossed_within_block: 100,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fee_ratio < Decimal::ZERO || self.fee_ratio >= Decimal::ONE {
            return Err(ConfigError::InvalidMarket {
                reason: format!("fee ratio {} outside [0, 1)", self.fee_ratio),
            });
        }
        if self.base_symbol.is_empty() || self.quote_symbol.is_empty() {
            return Err(ConfigError::InvalidMarket {
                reason: "token symbols must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Runtime market state
#[derive(Debug)]
pub struct MarketState {
    pub config: MarketConfig,
    pub pool: Box<dyn Pool>,
    pub guard: PriceImpactGuard,
    /// Fees taken on the quote leg since the market was added
    pub collected_fees: Quote,
    /// Quote volume through the pool, fees included
    pub volume: Quote,
}

impl MarketState {
    pub fn new(config: MarketConfig, pool: Box<dyn Pool>) -> Self {
        Self {
            config,
            pool,
            guard: PriceImpactGuard::new(),
            collected_fees: Quote::zero(),
            volume: Quote::zero(),
        }
    }

    pub fn id(&self) -> MarketId {
        self.config.id
    }

    pub fn fee_ratio(&self) -> Decimal {
        self.config.fee_ratio
    }

    pub fn max_tick_crossed_within_block(&self) -> u32 {
        self.config.max_tick_crossed_within_block
    }

    pub fn record_trade(&mut self, notional: Decimal, fee: Decimal) {
        self.collected_fees = self.collected_fees.add(Quote::new(fee));
        self.volume = self.volume.add(Quote::new(notional.abs()));
    }
}
