//! Trade execution against a market's pool.
//!
//! Every trade runs in two phases. `plan_trade` quotes the swap with
//! `Pool::simulate_swap`, applies the fee, runs the price-impact guard, stages
//! the fill on a clone of the account and margin-checks the result. Nothing is
//! written until `commit_trade` executes the real swap and swaps the staged
//! account in, so any failure before that point leaves no trace.

use super::core::ClearingHouse;
use super::results::{EngineError, TradeResult};
use crate::account::Account;
use crate::balance::Burned;
use crate::events::{BurnedEvent, EventPayload, MintedEvent, PositionClosedEvent, SwappedEvent};
use crate::liquidation::partial_close_amount;
use crate::oracle::Oracle;
use crate::pool::{SwapOutcome, SwapRequest};
use crate::position::{classify, settle_trade, TradeSettlement};
use crate::price_impact::{decide, GuardDecision};
use crate::types::{round_down, round_up, AccountId, Direction, MarketId, Price, Quote, SignedSize, TokenSide};
use crate::vault::Vault;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPositionParams {
    pub market: MarketId,
    pub direction: Direction,
    pub is_exact_input: bool,
    /// Exact input or output amount, denominated in the token on that side of the trade.
    pub amount: Decimal,
    pub price_limit: Option<Price>,
}

impl OpenPositionParams {
    pub fn exact_input(market: MarketId, direction: Direction, amount: Decimal) -> Self {
        Self {
            market,
            direction,
            is_exact_input: true,
            amount,
            price_limit: None,
        }
    }

    pub fn exact_output(market: MarketId, direction: Direction, amount: Decimal) -> Self {
        Self {
            is_exact_input: false,
            ..Self::exact_input(market, direction, amount)
        }
    }

    pub fn with_price_limit(mut self, limit: Price) -> Self {
        self.price_limit = Some(limit);
        self
    }

    /// The trade that nets `amount` base off a position of `size`.
    /// Shorts buy back exact base, longs sell exact base. None when flat.
    pub fn closing(market: MarketId, size: SignedSize, amount: Decimal, price_limit: Option<Price>) -> Option<Self> {
        let direction = Direction::closing(size.side()?);
        Some(Self {
            market,
            direction,
            is_exact_input: direction.consumed() == TokenSide::Base,
            amount,
            price_limit,
        })
    }
}

/// One swap seen from the trader's side, fee included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Fill {
    /// + bought, - sold
    pub base: Decimal,
    /// + received, - paid
    pub quote: Decimal,
    pub fee: Decimal,
}

/// What the pool is asked to do. Fees come off the quote leg before or after the pool.
pub(super) fn pool_request(params: &OpenPositionParams, fee_ratio: Decimal) -> Result<SwapRequest, EngineError> {
    let net = Decimal::ONE - fee_ratio;
    let amount = match (params.direction, params.is_exact_input) {
        (Direction::QuoteToBase, true) => params.amount.checked_mul(net).map(round_down),
        (Direction::BaseToQuote, false) => params.amount.checked_div(net).map(round_up),
        _ => Some(params.amount),
    }
    .ok_or(EngineError::AmountTooLarge(params.amount))?;
    if amount <= Decimal::ZERO {
        return Err(EngineError::ZeroAmount);
    }
    Ok(SwapRequest {
        direction: params.direction,
        is_exact_input: params.is_exact_input,
        amount,
        price_limit: params.price_limit,
    })
}

pub(super) fn fill_from_outcome(
    params: &OpenPositionParams,
    fee_ratio: Decimal,
    outcome: &SwapOutcome,
) -> Result<Fill, EngineError> {
    let net = Decimal::ONE - fee_ratio;
    let too_large = EngineError::AmountTooLarge(outcome.quote);
    let fill = match (params.direction, params.is_exact_input) {
        (Direction::QuoteToBase, true) => Fill {
            base: outcome.base,
            quote: -params.amount,
            fee: params.amount - outcome.quote,
        },
        (Direction::QuoteToBase, false) => {
            let spent = outcome.quote.checked_div(net).map(round_up).ok_or(too_large)?;
            Fill {
                base: outcome.base,
                quote: -spent,
                fee: spent - outcome.quote,
            }
        }
        (Direction::BaseToQuote, true) => {
            let received = outcome.quote.checked_mul(net).map(round_down).ok_or(too_large)?;
            Fill {
                base: -outcome.base,
                quote: received,
                fee: outcome.quote - received,
            }
        }
        (Direction::BaseToQuote, false) => Fill {
            base: -outcome.base,
            quote: params.amount,
            fee: outcome.quote - params.amount,
        },
    };
    Ok(fill)
}

/// Ledger effects of one fill on a staged account.
#[derive(Debug, Clone, Copy)]
pub(super) struct StagedFill {
    pub settlement: TradeSettlement,
    pub minted: Decimal,
    pub burned: Burned,
}

// mint the consumed side's shortfall, move both legs, book realized pnl, then burn matched pairs
pub(super) fn stage_fill(
    account: &mut Account,
    market: MarketId,
    direction: Direction,
    fill: &Fill,
) -> Result<StagedFill, EngineError> {
    let before = account.balance(market);
    let (consumed, received) = match direction {
        Direction::BaseToQuote => (-fill.base, fill.quote),
        Direction::QuoteToBase => (-fill.quote, fill.base),
    };

    let minted = account
        .balance_mut(market)
        .mint_to_cover_shortfall(direction.consumed(), consumed)?;
    account.adjust(market, direction.consumed(), -consumed, Decimal::ZERO)?;
    account.adjust(market, direction.received(), received, Decimal::ZERO)?;

    let settlement = settle_trade(before.position_size(), before.net_quote(), fill.base, fill.quote);
    account
        .balance_mut(market)
        .shift_quote(-settlement.realized_pnl.value())?;
    account.add_owed_realized_pnl(settlement.realized_pnl);

    let burned = account.settle_market(market);
    Ok(StagedFill {
        settlement,
        minted,
        burned,
    })
}

/// A fully checked trade waiting for its swap.
#[derive(Debug, Clone)]
pub(super) struct TradePlan {
    pub params: OpenPositionParams,
    pub request: SwapRequest,
    pub outcome: SwapOutcome,
    pub fill: Fill,
    pub staged_fill: StagedFill,
    pub original: Account,
    pub staged: Account,
    /// Liquidation penalty debited from the staged account before the swap.
    pub penalty: Quote,
}

pub(super) enum Planned {
    Ready(Box<TradePlan>),
    /// A forced full close hit the price-impact cap.
    Downgrade { tick_delta: u32, max: u32 },
}

pub(super) struct ForcedClose {
    pub plan: Box<TradePlan>,
    pub size_before: SignedSize,
    pub partial: bool,
}

impl<O: Oracle, V: Vault> ClearingHouse<O, V> {
    pub fn open_position(&mut self, account_id: AccountId, params: OpenPositionParams) -> Result<TradeResult, EngineError> {
        let plan = match self.plan_trade(account_id, &params, false)? {
            Planned::Ready(plan) => plan,
            Planned::Downgrade { tick_delta, max } => {
                return Err(EngineError::PriceImpactExceeded {
                    market: params.market,
                    tick_delta,
                    max,
                })
            }
        };
        let result = self.commit_trade(account_id, *plan)?;

        info!(
            account = %account_id,
            market = %params.market,
            base = %result.exchanged_position_size,
            quote = %result.exchanged_notional,
            size = %result.position_size,
            "position opened"
        );
        Ok(result)
    }

    /// Net the whole position. Falls back to a partial close when the full close is over the price-impact cap.
    pub fn close_position(
        &mut self,
        account_id: AccountId,
        market: MarketId,
        price_limit: Option<Price>,
    ) -> Result<TradeResult, EngineError> {
        let close = self.plan_forced_close(account_id, market, price_limit)?;
        let mut result = self.commit_trade(account_id, *close.plan)?;
        result.partial = close.partial;

        info!(
            account = %account_id,
            market = %market,
            closed = %result.exchanged_position_size.abs(),
            remaining = %result.position_size,
            partial = close.partial,
            "position closed"
        );
        self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
            account_id,
            market_id: market,
            closed_size: result.exchanged_position_size.abs(),
            remaining_size: result.position_size,
            realized_pnl: result.realized_pnl,
            partial: close.partial,
        }));
        Ok(result)
    }

    // full close first; if the guard downgrades it, re-plan at partial_close_ratio of the size.
    // the downgrade is judged on the simulated post-swap tick, the re-planned reduction is never refused
    pub(super) fn plan_forced_close(
        &self,
        account_id: AccountId,
        market: MarketId,
        price_limit: Option<Price>,
    ) -> Result<ForcedClose, EngineError> {
        if !self.markets.contains_key(&market) {
            return Err(EngineError::InvalidMarket(market));
        }
        let size = self.get_position_size(account_id, market);
        let full = OpenPositionParams::closing(market, size, size.abs(), price_limit)
            .ok_or(EngineError::ZeroAmount)?;

        match self.plan_trade(account_id, &full, true)? {
            Planned::Ready(plan) => Ok(ForcedClose {
                plan,
                size_before: size,
                partial: false,
            }),
            Planned::Downgrade { tick_delta, max } => {
                let amount = partial_close_amount(size, self.config.partial_close_ratio);
                warn!(
                    account = %account_id,
                    market = %market,
                    tick_delta,
                    max,
                    %amount,
                    "full close over price-impact cap, closing partially"
                );
                let partial = OpenPositionParams::closing(market, size, amount, price_limit)
                    .ok_or(EngineError::ZeroAmount)?;
                match self.plan_trade(account_id, &partial, false)? {
                    Planned::Ready(plan) => Ok(ForcedClose {
                        plan,
                        size_before: size,
                        partial: amount < size.abs(),
                    }),
                    Planned::Downgrade { tick_delta, max } => Err(EngineError::PriceImpactExceeded {
                        market,
                        tick_delta,
                        max,
                    }),
                }
            }
        }
    }

    /// Quote, guard and stage a trade without touching engine state.
    pub(super) fn plan_trade(
        &self,
        account_id: AccountId,
        params: &OpenPositionParams,
        forced_close: bool,
    ) -> Result<Planned, EngineError> {
        let market = self
            .markets
            .get(&params.market)
            .ok_or(EngineError::InvalidMarket(params.market))?;
        if params.amount <= Decimal::ZERO {
            return Err(EngineError::ZeroAmount);
        }

        let original = self
            .accounts
            .get(&account_id)
            .cloned()
            .unwrap_or_else(|| Account::new(account_id));

        let request = pool_request(params, market.fee_ratio())?;
        let outcome = market.pool.simulate_swap(&request)?;
        let fill = fill_from_outcome(params, market.fee_ratio(), &outcome)?;
        let change = classify(original.position_size(params.market), fill.base);

        let reading = market.guard.check(
            self.block,
            outcome.tick_before,
            outcome.tick_after,
            market.max_tick_crossed_within_block(),
        );
        match decide(reading, change, forced_close) {
            GuardDecision::Proceed => {}
            GuardDecision::Downgrade { tick_delta, max } => {
                return Ok(Planned::Downgrade { tick_delta, max });
            }
            GuardDecision::Reject { tick_delta, max } => {
                warn!(
                    account = %account_id,
                    market = %params.market,
                    ?change,
                    tick_delta,
                    max,
                    "trade rejected by price-impact guard"
                );
                return Err(EngineError::PriceImpactExceeded {
                    market: params.market,
                    tick_delta,
                    max,
                });
            }
        }

        let max_markets = self.config.max_markets_per_account;
        if original.exceeds_market_limit(params.market, max_markets) {
            return Err(EngineError::MarketLimitExceeded { max: max_markets });
        }

        let mut staged = original.clone();
        let staged_fill = stage_fill(&mut staged, params.market, params.direction, &fill)?;

        if change.adds_exposure() {
            let margin = self.evaluate_margin(&staged)?;
            let free_collateral = margin.free_collateral_unfloored();
            if free_collateral.is_negative() {
                warn!(
                    account = %account_id,
                    market = %params.market,
                    %free_collateral,
                    "trade rejected, insufficient account value"
                );
                return Err(EngineError::InsufficientAccountValue { free_collateral });
            }
        }

        Ok(Planned::Ready(Box::new(TradePlan {
            params: *params,
            request,
            outcome,
            fill,
            staged_fill,
            original,
            staged,
            penalty: Quote::zero(),
        })))
    }

    /// Execute the planned swap and commit the staged account.
    pub(super) fn commit_trade(&mut self, account_id: AccountId, plan: TradePlan) -> Result<TradeResult, EngineError> {
        let TradePlan {
            params,
            request,
            outcome: simulated,
            mut fill,
            mut staged_fill,
            original,
            mut staged,
            penalty,
        } = plan;
        let market_id = params.market;
        let block = self.block;

        staged.add_owed_realized_pnl(penalty.negate());

        let market = self
            .markets
            .get_mut(&market_id)
            .ok_or(EngineError::InvalidMarket(market_id))?;
        let outcome = market.pool.swap(&request)?;

        if outcome != simulated {
            warn!(
                market = %market_id,
                simulated = ?simulated,
                executed = ?outcome,
                "pool swap differs from its simulation, restaging"
            );
            fill = fill_from_outcome(&params, market.fee_ratio(), &outcome)?;
            staged = original;
            staged_fill = stage_fill(&mut staged, market_id, params.direction, &fill)?;
            staged.add_owed_realized_pnl(penalty.negate());
        }

        market.guard.arm(block, outcome.tick_before);
        market.record_trade(fill.quote, fill.fee);

        let (minted_base, minted_quote) = match params.direction.consumed() {
            TokenSide::Base => (staged_fill.minted, Decimal::ZERO),
            TokenSide::Quote => (Decimal::ZERO, staged_fill.minted),
        };
        let settlement = staged_fill.settlement;
        let result = TradeResult {
            market: market_id,
            exchanged_position_size: fill.base,
            exchanged_notional: fill.quote,
            fee: Quote::new(fill.fee),
            realized_pnl: settlement.realized_pnl,
            change: settlement.change,
            minted_base,
            minted_quote,
            position_size: staged.position_size(market_id),
            open_notional: staged.net_quote(market_id),
            partial: false,
        };
        self.accounts.insert(account_id, staged);

        let mut events_to_emit: Vec<EventPayload> = Vec::new();
        if staged_fill.minted > Decimal::ZERO {
            events_to_emit.push(EventPayload::Minted(MintedEvent {
                account_id,
                market_id,
                token: params.direction.consumed(),
                amount: staged_fill.minted,
            }));
        }
        for (token, amount) in [
            (TokenSide::Base, staged_fill.burned.base),
            (TokenSide::Quote, staged_fill.burned.quote),
        ] {
            if amount > Decimal::ZERO {
                events_to_emit.push(EventPayload::Burned(BurnedEvent {
                    account_id,
                    market_id,
                    token,
                    amount,
                }));
            }
        }
        events_to_emit.push(EventPayload::Swapped(SwappedEvent {
            account_id,
            market_id,
            direction: params.direction,
            exchanged_position_size: fill.base,
            exchanged_notional: fill.quote,
            fee: result.fee,
            realized_pnl: result.realized_pnl,
            change: result.change,
            tick_after: outcome.tick_after,
        }));

        for payload in events_to_emit {
            self.emit_event(payload);
        }

        Ok(result)
    }
}
