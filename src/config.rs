// 7.0 config.rs: clearing house settings in one place. owner, liquidation, margin, account limits.
// 7.1 every value here is owner-mutable at runtime through the admin setters; validate() guards both paths.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::liquidation::LiquidationParams;
use crate::margin::MarginParams;
use crate::types::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingHouseConfig {
    // The only identity allowed through the admin setters
    pub owner: AccountId,
    pub liquidation: LiquidationParams,
    // Fraction of a position closed when a full close is blocked by the price-impact guard
    pub partial_close_ratio: Decimal,
    // Markets one account may hold balances in at once. 0 = unlimited
    pub max_markets_per_account: usize,
    pub margin: MarginParams,
}

impl Default for ClearingHouseConfig {
    fn default() -> Self {
        Self {
            owner: AccountId(0),
            liquidation: LiquidationParams::default(),
            partial_close_ratio: dec!(0.25),
            max_markets_per_account: 0,
            margin: MarginParams::default(),
        }
    }
}

impl ClearingHouseConfig {
    pub fn with_owner(owner: AccountId) -> Self {
        Self {
            owner,
            ..Self::default()
        }
    }

    // Testnet: looser margin, a cap on markets so limits get exercised
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.margin.initial_margin_ratio = dec!(0.05);
        config.margin.maintenance_margin_ratio = dec!(0.03);
        config.max_markets_per_account = 10;
        config
    }

    // Mainnet with conservative settings
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.margin.initial_margin_ratio = dec!(0.2);
        config.margin.maintenance_margin_ratio = dec!(0.1);
        config.liquidation.penalty_ratio = dec!(0.05);
        config.max_markets_per_account = 5;
        config
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let margin = &self.margin;
        if margin.initial_margin_ratio <= Decimal::ZERO || margin.initial_margin_ratio > Decimal::ONE {
            return Err(ConfigError::InvalidMargin {
                reason: "IM ratio must be in (0, 1]".to_string(),
            });
        }
        if margin.maintenance_margin_ratio <= Decimal::ZERO
            || margin.maintenance_margin_ratio > margin.initial_margin_ratio
        {
            return Err(ConfigError::InvalidMargin {
                reason: "MM ratio must be positive and not above IM".to_string(),
            });
        }

        check_ratio("liquidation penalty ratio", self.liquidation.penalty_ratio)?;
        check_ratio("liquidator reward share", self.liquidation.liquidator_reward_share)?;

        if self.partial_close_ratio <= Decimal::ZERO || self.partial_close_ratio >= Decimal::ONE {
            return Err(ConfigError::InvalidRatio {
                name: "partial close ratio",
                value: self.partial_close_ratio,
            });
        }

        Ok(())
    }
}

// ratio in [0, 1]
pub(crate) fn check_ratio(name: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ConfigError::InvalidRatio { name, value });
    }
    Ok(())
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid margin: {reason}")]
    InvalidMargin { reason: String },

    #[error("Invalid market: {reason}")]
    InvalidMarket { reason: String },

    #[error("Invalid {name}: {value}")]
    InvalidRatio { name: &'static str, value: Decimal },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ClearingHouseConfig {
        match self {
            Environment::Development => ClearingHouseConfig::default(),
            Environment::Testnet => ClearingHouseConfig::testnet(),
            Environment::Mainnet => ClearingHouseConfig::mainnet_conservative(),
        }
    }
}
