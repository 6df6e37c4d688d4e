//! Account-wide margin.
//!
//! Account value is collateral plus every open position marked at the index
//! price plus realized PnL not yet settled to the vault. Requirements are a
//! ratio of the absolute open notional (net quote balance) in each market:
//! the initial ratio gates new risk, the maintenance ratio gates liquidation.

use crate::position::position_value;
use crate::types::{MarketId, Price, Quote, SignedSize};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MarginError {
    #[error("Position in {0} is too large to value")]
    Overflow(MarketId),
    #[error("Account value does not fit in a decimal")]
    AccountValueOverflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginParams {
    pub initial_margin_ratio: Decimal,
    pub maintenance_margin_ratio: Decimal,
    /// Window handed to the oracle when reading index prices.
    pub twap_window_secs: u64,
}

impl Default for MarginParams {
    fn default() -> Self {
        Self {
            initial_margin_ratio: dec!(0.1),
            maintenance_margin_ratio: dec!(0.0625),
            twap_window_secs: 900,
        }
    }
}

/// One market's contribution to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketExposure {
    pub market: MarketId,
    pub size: SignedSize,
    pub open_notional: Decimal,
    pub index_price: Price,
}

impl MarketExposure {
    pub fn value(&self) -> Option<Quote> {
        position_value(self.size, self.open_notional, self.index_price)
    }

    pub fn requirement_base(&self) -> Quote {
        Quote::new(self.open_notional.abs())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginStatus {
    Healthy,
    /// Below initial margin but above maintenance. No new risk allowed.
    Warning,
    Liquidatable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMargin {
    pub collateral: Quote,
    pub position_value: Quote,
    pub owed_realized_pnl: Quote,
    pub account_value: Quote,
    pub initial_requirement: Quote,
    pub maintenance_requirement: Quote,
}

impl AccountMargin {
    /// account value minus initial requirement, may be negative
    pub fn free_collateral_unfloored(&self) -> Quote {
        Quote::new(
            self.account_value
                .value()
                .saturating_sub(self.initial_requirement.value()),
        )
    }

    pub fn free_collateral(&self) -> Quote {
        self.free_collateral_unfloored().floor_zero()
    }

    pub fn is_liquidatable(&self) -> bool {
        self.account_value < self.maintenance_requirement
    }

    pub fn status(&self) -> MarginStatus {
        if self.is_liquidatable() {
            MarginStatus::Liquidatable
        } else if self.free_collateral_unfloored().is_negative() {
            MarginStatus::Warning
        } else {
            MarginStatus::Healthy
        }
    }
}

pub fn evaluate_account(
    collateral: Quote,
    owed_realized_pnl: Quote,
    exposures: &[MarketExposure],
    params: &MarginParams,
) -> Result<AccountMargin, MarginError> {
    let mut position_value = Quote::zero();
    let mut notional = Quote::zero();
    for exposure in exposures {
        let overflow = MarginError::Overflow(exposure.market);
        let value = exposure.value().ok_or(overflow)?;
        position_value = position_value.checked_add(value).ok_or(overflow)?;
        notional = notional
            .checked_add(exposure.requirement_base())
            .ok_or(overflow)?;
    }

    let account_value = collateral
        .checked_add(position_value)
        .and_then(|value| value.checked_add(owed_realized_pnl))
        .ok_or(MarginError::AccountValueOverflow)?;

    Ok(AccountMargin {
        collateral,
        position_value,
        owed_realized_pnl,
        account_value,
        initial_requirement: notional.mul(params.initial_margin_ratio),
        maintenance_requirement: notional.mul(params.maintenance_margin_ratio),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn short_25(index: Decimal) -> MarketExposure {
        MarketExposure {
            market: MarketId(1),
            size: SignedSize::new(dec!(-25)),
            open_notional: dec!(198),
            index_price: Price::new_unchecked(index),
        }
    }

    #[test]
    fn empty_account_is_just_collateral() {
        let margin = evaluate_account(
            Quote::new(dec!(1000)),
            Quote::zero(),
            &[],
            &MarginParams::default(),
        )
        .unwrap();
        assert_eq!(margin.account_value.value(), dec!(1000));
        assert_eq!(margin.free_collateral().value(), dec!(1000));
        assert_eq!(margin.status(), MarginStatus::Healthy);
    }

    #[test]
    fn short_position_at_index() {
        let margin = evaluate_account(
            Quote::new(dec!(1000)),
            Quote::zero(),
            &[short_25(dec!(10))],
            &MarginParams::default(),
        )
        .unwrap();
        // 1000 + (-250 + 198)
        assert_eq!(margin.account_value.value(), dec!(948));
        assert_eq!(margin.initial_requirement.value(), dec!(19.8));
        assert_eq!(margin.maintenance_requirement.value(), dec!(12.375));
        assert_eq!(margin.free_collateral().value(), dec!(928.2));
        assert!(!margin.is_liquidatable());
    }

    #[test]
    fn index_spike_makes_short_liquidatable() {
        let margin = evaluate_account(
            Quote::new(dec!(1000)),
            Quote::zero(),
            &[short_25(dec!(10000000))],
            &MarginParams::default(),
        )
        .unwrap();
        assert!(margin.account_value.is_negative());
        assert!(margin.free_collateral().is_zero());
        assert!(margin.free_collateral_unfloored().is_negative());
        assert_eq!(margin.status(), MarginStatus::Liquidatable);
    }

    #[test]
    fn owed_pnl_counts_toward_value() {
        let margin = evaluate_account(
            Quote::new(dec!(10)),
            Quote::new(dec!(-4)),
            &[],
            &MarginParams::default(),
        )
        .unwrap();
        assert_eq!(margin.account_value.value(), dec!(6));
    }

    #[test]
    fn warning_between_requirements() {
        // value 15: above maintenance 12.375, below initial 19.8
        let margin = evaluate_account(
            Quote::new(dec!(67)),
            Quote::zero(),
            &[short_25(dec!(10))],
            &MarginParams::default(),
        )
        .unwrap();
        assert_eq!(margin.account_value.value(), dec!(15));
        assert_eq!(margin.status(), MarginStatus::Warning);
    }

    #[test]
    fn oversized_position_is_an_error() {
        let whale = MarketExposure {
            size: SignedSize::new(dec!(-10_000_000_000_000_000_000_000)),
            ..short_25(dec!(10_000_000))
        };
        let err = evaluate_account(Quote::zero(), Quote::zero(), &[whale], &MarginParams::default())
            .unwrap_err();
        assert_eq!(err, MarginError::Overflow(MarketId(1)));
    }

    #[test]
    fn free_collateral_saturates() {
        let margin = AccountMargin {
            collateral: Quote::zero(),
            position_value: Quote::new(Decimal::MIN),
            owed_realized_pnl: Quote::zero(),
            account_value: Quote::new(Decimal::MIN),
            initial_requirement: Quote::new(Decimal::MAX),
            maintenance_requirement: Quote::new(Decimal::MAX),
        };
        assert_eq!(margin.free_collateral_unfloored().value(), Decimal::MIN);
        assert_eq!(margin.status(), MarginStatus::Liquidatable);
    }
}
