//! Liquidation execution.
//!
//! A liquidator may force-close another account's position in one market once
//! the account is under maintenance margin. The close goes through the same
//! planner as `close_position`, without a price limit, so it is shrunk to a
//! partial close when the full close would cross the block's price-impact cap.

use super::core::ClearingHouse;
use super::results::{EngineError, LiquidationResult};
use super::trading::ForcedClose;
use crate::account::Account;
use crate::events::{BadDebtEvent, EventPayload, PositionLiquidatedEvent};
use crate::liquidation::{calculate_liquidation_penalty, LiquidationOutcome};
use crate::oracle::Oracle;
use crate::types::{AccountId, MarketId, Quote};
use crate::vault::Vault;
use tracing::{info, warn};

impl<O: Oracle, V: Vault> ClearingHouse<O, V> {
    pub fn liquidate(
        &mut self,
        liquidator: AccountId,
        account_id: AccountId,
        market: MarketId,
    ) -> Result<LiquidationResult, EngineError> {
        if liquidator == account_id {
            return Err(EngineError::SelfLiquidation(account_id));
        }
        if !self.markets.contains_key(&market) {
            return Err(EngineError::InvalidMarket(market));
        }

        let margin = self.get_account_margin(account_id)?;
        if !margin.is_liquidatable() {
            return Err(EngineError::MarginRatioAboveRequirement {
                account_value: margin.account_value,
                maintenance: margin.maintenance_requirement,
            });
        }

        let ForcedClose {
            mut plan,
            size_before,
            partial,
        } = self.plan_forced_close(account_id, market, None)?;

        // notional is the pool-side quote leg, fee excluded
        let liquidation_notional = Quote::new(plan.outcome.quote);
        let penalty = calculate_liquidation_penalty(liquidation_notional, &self.config.liquidation);
        plan.penalty = penalty.total;

        // oracle and vault are read against the quoted fill before anything is written
        let mut quoted = plan.staged.clone();
        quoted.add_owed_realized_pnl(penalty.total.negate());
        let quoted_margin = self.evaluate_margin(&quoted)?;

        let trade = self.commit_trade(account_id, *plan)?;

        // the executed swap may differ from the quote; judge what was actually committed
        let post = self.get_account_margin(account_id).unwrap_or_else(|err| {
            warn!(
                account = %account_id,
                %err,
                "margin unavailable after liquidation, using the quoted fill"
            );
            quoted_margin
        });
        let flat = self.open_markets(account_id).is_empty();

        self.accounts
            .entry(liquidator)
            .or_insert_with(|| Account::new(liquidator))
            .add_owed_realized_pnl(penalty.liquidator_reward);
        self.insurance_fund.deposit(penalty.insurance_contribution);

        let liquidated_size = trade.exchanged_position_size.abs();
        let mut events_to_emit: Vec<EventPayload> = vec![EventPayload::PositionLiquidated(PositionLiquidatedEvent {
            account_id,
            market_id: market,
            liquidator,
            liquidated_size,
            liquidation_notional,
            penalty: penalty.total,
            liquidator_reward: penalty.liquidator_reward,
            partial,
        })];

        // nothing left to close and the account is under water: insurance absorbs what it can
        if flat && post.account_value.is_negative() {
            let debt_amount = post.account_value.negate();
            let covered = self.insurance_fund.cover_bad_debt(debt_amount);
            if let Some(account) = self.accounts.get_mut(&account_id) {
                account.add_owed_realized_pnl(covered);
            }
            let uncovered = debt_amount.sub(covered);
            warn!(
                account = %account_id,
                market = %market,
                %debt_amount,
                %covered,
                %uncovered,
                "bad debt after liquidation"
            );
            events_to_emit.push(EventPayload::BadDebt(BadDebtEvent {
                account_id,
                market_id: market,
                debt_amount,
                covered_by_insurance: covered,
                uncovered,
            }));
        }

        let outcome = if trade.position_size.is_zero() {
            LiquidationOutcome::FullyLiquidated
        } else if post.is_liquidatable() {
            LiquidationOutcome::StillEligible
        } else {
            LiquidationOutcome::Recovered
        };

        info!(
            account = %account_id,
            market = %market,
            liquidator = %liquidator,
            %size_before,
            %liquidated_size,
            penalty = %penalty.total,
            ?outcome,
            "position liquidated"
        );

        for payload in events_to_emit {
            self.emit_event(payload);
        }

        Ok(LiquidationResult {
            account: account_id,
            market,
            liquidator,
            liquidated_size,
            liquidation_notional,
            penalty: penalty.total,
            liquidator_reward: penalty.liquidator_reward,
            insurance_contribution: penalty.insurance_contribution,
            realized_pnl: trade.realized_pnl,
            remaining_size: trade.position_size,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClearingHouseConfig;
    use crate::engine::{EngineConfig, ErrorKind, OpenPositionParams};
    use crate::market::MarketConfig;
    use crate::oracle::IndexPriceFeed;
    use crate::pool::{ConstantProductPool, Pool, PoolError, SwapOutcome, SwapRequest};
    use crate::types::{BlockNumber, Direction, Price, Tick};
    use crate::vault::InMemoryVault;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const OWNER: AccountId = AccountId(0);
    const TRADER: AccountId = AccountId(1);
    const KEEPER: AccountId = AccountId(2);
    const ETH: MarketId = MarketId(1);

    // trader short 25 against a 100/1000 pool with 100 collateral, no tick cap
    fn shorted_house() -> ClearingHouse<IndexPriceFeed, InMemoryVault> {
        shorted_house_on(Box::new(ConstantProductPool::new(dec!(100), dec!(1000))))
    }

    fn shorted_house_on(pool: Box<dyn Pool>) -> ClearingHouse<IndexPriceFeed, InMemoryVault> {
        let mut oracle = IndexPriceFeed::new();
        oracle.set_price(ETH, Price::new_unchecked(dec!(10)));
        let mut vault = InMemoryVault::new();
        vault.deposit(TRADER, dec!(100)).unwrap();

        let mut house = ClearingHouse::new(
            ClearingHouseConfig::with_owner(OWNER),
            EngineConfig::default(),
            oracle,
            vault,
        )
        .unwrap();
        let mut market = MarketConfig::eth_perp();
        market.max_tick_crossed_within_block = 0;
        house.add_market(OWNER, market, pool).unwrap();
        house.advance_block(BlockNumber(1));
        house
            .open_position(
                TRADER,
                OpenPositionParams::exact_input(ETH, Direction::BaseToQuote, dec!(25)),
            )
            .unwrap();
        house.advance_block(BlockNumber(2));
        house
    }

    // fills as quoted for the first `honest_swaps` swaps, then reports `factor` times the quote leg
    #[derive(Debug)]
    struct DriftingPool {
        inner: ConstantProductPool,
        honest_swaps: usize,
        factor: Decimal,
    }

    impl Pool for DriftingPool {
        fn current_tick(&self) -> Tick {
            self.inner.current_tick()
        }

        fn simulate_swap(&self, request: &SwapRequest) -> Result<SwapOutcome, PoolError> {
            self.inner.simulate_swap(request)
        }

        fn swap(&mut self, request: &SwapRequest) -> Result<SwapOutcome, PoolError> {
            let mut outcome = self.inner.swap(request)?;
            if self.honest_swaps == 0 {
                outcome.quote *= self.factor;
            } else {
                self.honest_swaps -= 1;
            }
            Ok(outcome)
        }
    }

    fn set_index(house: &mut ClearingHouse<IndexPriceFeed, InMemoryVault>, price: Decimal) {
        house.oracle_mut().set_price(ETH, Price::new_unchecked(price));
    }

    #[test]
    fn self_liquidation_rejected_without_side_effects() {
        let mut house = shorted_house();
        set_index(&mut house, dec!(100));
        let before = house.account(TRADER).cloned();

        let err = house.liquidate(TRADER, TRADER, ETH).unwrap_err();
        assert_eq!(err, EngineError::SelfLiquidation(TRADER));
        assert_eq!(house.account(TRADER).cloned(), before);
    }

    #[test]
    fn healthy_account_cannot_be_liquidated() {
        let mut house = shorted_house();
        let err = house.liquidate(KEEPER, TRADER, ETH).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MarginRatioAboveRequirement);
        assert_eq!(house.get_position_size(TRADER, ETH).value(), dec!(-25));
    }

    #[test]
    fn full_liquidation_pays_keeper_and_insurance() {
        let mut house = shorted_house();
        // 100 + 198 - 25 * 20 = -202
        set_index(&mut house, dec!(20));
        assert!(house.is_liquidatable(TRADER).unwrap());

        let result = house.liquidate(KEEPER, TRADER, ETH).unwrap();
        assert_eq!(result.outcome, LiquidationOutcome::FullyLiquidated);
        assert_eq!(result.liquidated_size, dec!(25));
        assert!(result.remaining_size.is_zero());

        // buying 25 back out of a 125/800 pool costs exactly 200 pool-side
        assert_eq!(result.liquidation_notional.value(), dec!(200));
        assert_eq!(result.penalty.value(), dec!(5));
        assert_eq!(result.liquidator_reward.value(), dec!(2.5));
        assert_eq!(result.insurance_contribution.value(), dec!(2.5));

        assert_eq!(house.get_owed_realized_pnl(KEEPER).value(), dec!(2.5));
        assert_eq!(house.insurance_fund_balance().value(), dec!(2.5));
        assert_eq!(
            house.get_owed_realized_pnl(TRADER),
            result.realized_pnl.sub(result.penalty)
        );
        assert!(house.open_markets(TRADER).is_empty());
    }

    #[test]
    fn bad_debt_drawn_from_insurance() {
        let mut house = shorted_house();
        house.fund_insurance(Quote::new(dec!(1000))).unwrap();
        house.vault_mut().deposit(KEEPER, dec!(1_000_000)).unwrap();
        set_index(&mut house, dec!(20));
        // someone else lifts the pool, so buying the short back costs far more than the collateral
        house
            .open_position(
                KEEPER,
                OpenPositionParams::exact_input(ETH, Direction::QuoteToBase, dec!(500)),
            )
            .unwrap();

        let result = house.liquidate(AccountId(3), TRADER, ETH).unwrap();
        assert_eq!(result.outcome, LiquidationOutcome::FullyLiquidated);

        let bad = house
            .events()
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::BadDebt(bad) => Some(bad.clone()),
                _ => None,
            })
            .expect("bad debt event");
        assert!(bad.debt_amount.value() > Decimal::ZERO);
        assert_eq!(bad.covered_by_insurance, bad.debt_amount);
        assert!(bad.uncovered.is_zero());

        // the covered debt lands on owed pnl and brings the account back to exactly zero
        assert!(house.get_account_value(TRADER).unwrap().is_zero());
        assert_eq!(
            house.insurance_fund_balance(),
            Quote::new(dec!(1000))
                .add(result.insurance_contribution)
                .sub(bad.debt_amount)
        );
    }

    #[test]
    fn bad_debt_follows_the_executed_fill() {
        let mut house = shorted_house_on(Box::new(DriftingPool {
            inner: ConstantProductPool::new(dec!(100), dec!(1000)),
            honest_swaps: 1,
            factor: dec!(10),
        }));
        house.fund_insurance(Quote::new(dec!(5000))).unwrap();
        set_index(&mut house, dec!(20));

        // quoted at 200 pool-side the close would leave about 91 of value; it executes at 2000
        let result = house.liquidate(KEEPER, TRADER, ETH).unwrap();
        assert_eq!(result.outcome, LiquidationOutcome::FullyLiquidated);
        assert_eq!(result.liquidation_notional.value(), dec!(200));
        assert!(result.realized_pnl.value() < dec!(-1800));

        let bad = house
            .events()
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::BadDebt(bad) => Some(bad.clone()),
                _ => None,
            })
            .expect("bad debt event");
        // 100 collateral + realized pnl - 5 penalty
        assert_eq!(
            bad.debt_amount,
            Quote::new(dec!(-95)).sub(result.realized_pnl)
        );
        assert_eq!(bad.covered_by_insurance, bad.debt_amount);
        assert!(house.get_account_value(TRADER).unwrap().is_zero());
    }
}
