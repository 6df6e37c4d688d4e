//! Liquidation parameters, penalty distribution and the insurance fund.
//!
//! The liquidated account pays `notional * penalty_ratio`. The liquidator's
//! share is credited to its realized PnL, the rest goes to the insurance fund,
//! which in turn absorbs bad debt left behind by fully liquidated accounts.

use crate::types::{round_down, Quote, SignedSize};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationParams {
    pub penalty_ratio: Decimal,
    /// Share of the penalty paid to the liquidator.
    pub liquidator_reward_share: Decimal,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            penalty_ratio: dec!(0.025),
            liquidator_reward_share: dec!(0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationPenalty {
    pub total: Quote,
    pub liquidator_reward: Quote,
    pub insurance_contribution: Quote,
}

pub fn calculate_liquidation_penalty(notional: Quote, params: &LiquidationParams) -> LiquidationPenalty {
    let total = Quote::new(round_down(notional.value().abs() * params.penalty_ratio));
    let liquidator_reward = Quote::new(round_down(total.value() * params.liquidator_reward_share));
    let insurance_contribution = total.sub(liquidator_reward);

    LiquidationPenalty {
        total,
        liquidator_reward,
        insurance_contribution,
    }
}

/// Base amount a blocked full close is shrunk to. Dust that rounds to nothing closes whole.
pub fn partial_close_amount(size: SignedSize, partial_close_ratio: Decimal) -> Decimal {
    let amount = round_down(size.abs() * partial_close_ratio);
    if amount.is_zero() {
        size.abs()
    } else {
        amount
    }
}

/// Where a liquidation left the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationOutcome {
    /// Position in the market is gone.
    FullyLiquidated,
    /// Partially closed and still under maintenance margin.
    StillEligible,
    /// Partially closed and back above maintenance margin.
    Recovered,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsuranceFund {
    pub balance: Quote,
    pub total_deposits: Quote,
    pub total_payouts: Quote,
}

impl InsuranceFund {
    pub fn deposit(&mut self, amount: Quote) {
        self.balance = self.balance.add(amount);
        self.total_deposits = self.total_deposits.add(amount);
    }

    /// Pay out as much of `amount` as the fund holds. Returns what was covered.
    pub fn cover_bad_debt(&mut self, amount: Quote) -> Quote {
        let covered = amount.min(self.balance).floor_zero();
        self.balance = self.balance.sub(covered);
        self.total_payouts = self.total_payouts.add(covered);
        covered
    }
}
