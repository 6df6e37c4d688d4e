// 8.0.2: result types and errors for clearing house operations.

use crate::balance::LedgerError;
use crate::config::ConfigError;
use crate::liquidation::LiquidationOutcome;
use crate::margin::MarginError;
use crate::oracle::OracleError;
use crate::pool::PoolError;
use crate::position::PositionChange;
use crate::types::{AccountId, MarketId, Quote, SignedSize};
use crate::vault::VaultError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeResult {
    pub market: MarketId,
    // signed from the trader's side: + bought base, - sold base
    pub exchanged_position_size: Decimal,
    // signed quote that moved, fee included: + received, - paid
    pub exchanged_notional: Decimal,
    pub fee: Quote,
    pub realized_pnl: Quote,
    pub change: PositionChange,
    pub minted_base: Decimal,
    pub minted_quote: Decimal,
    pub position_size: SignedSize,
    pub open_notional: Decimal,
    // true when a blocked full close was shrunk to the partial close ratio
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationResult {
    pub account: AccountId,
    pub market: MarketId,
    pub liquidator: AccountId,
    pub liquidated_size: Decimal,
    pub liquidation_notional: Quote,
    pub penalty: Quote,
    pub liquidator_reward: Quote,
    pub insurance_contribution: Quote,
    pub realized_pnl: Quote,
    pub remaining_size: SignedSize,
    pub outcome: LiquidationOutcome,
}

/// Flat error kind for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidMarket,
    ZeroAmount,
    SlippageExceeded,
    InsufficientLiquidity,
    AmountTooLarge,
    PriceImpactExceeded,
    InsufficientAccountValue,
    MarketLimitExceeded,
    MarginRatioAboveRequirement,
    SelfLiquidation,
    Unauthorized,
    NegativeBalance,
    Oracle,
    Vault,
    InvalidConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Market {0} is not registered")]
    InvalidMarket(MarketId),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Slippage exceeded: price {price} crosses limit {limit}")]
    SlippageExceeded { price: Decimal, limit: Decimal },

    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Decimal, available: Decimal },

    #[error("Amount {0} is too large to clear")]
    AmountTooLarge(Decimal),

    #[error("Price impact exceeded in {market}: {tick_delta} ticks crossed, max {max}")]
    PriceImpactExceeded {
        market: MarketId,
        tick_delta: u32,
        max: u32,
    },

    #[error("Insufficient account value: free collateral {free_collateral} after trade")]
    InsufficientAccountValue { free_collateral: Quote },

    #[error("Account already holds the maximum of {max} markets")]
    MarketLimitExceeded { max: usize },

    #[error("Account value {account_value} is above maintenance requirement {maintenance}")]
    MarginRatioAboveRequirement {
        account_value: Quote,
        maintenance: Quote,
    },

    #[error("{0} cannot liquidate itself")]
    SelfLiquidation(AccountId),

    #[error("{0} is not the owner")]
    Unauthorized(AccountId),

    #[error("Ledger invariant violated: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Margin error: {0}")]
    Margin(#[from] MarginError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<PoolError> for EngineError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::InsufficientLiquidity {
                requested,
                available,
            } => EngineError::InsufficientLiquidity {
                requested,
                available,
            },
            PoolError::SlippageExceeded { price, limit } => {
                EngineError::SlippageExceeded { price, limit }
            }
            PoolError::AmountTooLarge { amount } => EngineError::AmountTooLarge(amount),
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidMarket(_) => ErrorKind::InvalidMarket,
            EngineError::ZeroAmount => ErrorKind::ZeroAmount,
            EngineError::SlippageExceeded { .. } => ErrorKind::SlippageExceeded,
            EngineError::InsufficientLiquidity { .. } => ErrorKind::InsufficientLiquidity,
            EngineError::AmountTooLarge(_)
            | EngineError::Margin(_)
            | EngineError::Ledger(LedgerError::Overflow { .. }) => ErrorKind::AmountTooLarge,
            EngineError::PriceImpactExceeded { .. } => ErrorKind::PriceImpactExceeded,
            EngineError::InsufficientAccountValue { .. } => ErrorKind::InsufficientAccountValue,
            EngineError::MarketLimitExceeded { .. } => ErrorKind::MarketLimitExceeded,
            EngineError::MarginRatioAboveRequirement { .. } => {
                ErrorKind::MarginRatioAboveRequirement
            }
            EngineError::SelfLiquidation(_) => ErrorKind::SelfLiquidation,
            EngineError::Unauthorized(_) => ErrorKind::Unauthorized,
            EngineError::Ledger(LedgerError::NegativeBalance { .. }) => ErrorKind::NegativeBalance,
            EngineError::Oracle(_) => ErrorKind::Oracle,
            EngineError::Vault(_) => ErrorKind::Vault,
            EngineError::Config(_) => ErrorKind::InvalidConfig,
        }
    }
}
