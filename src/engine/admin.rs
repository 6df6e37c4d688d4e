// 8.4 engine/admin.rs: owner-guarded market registration and parameter setters.
// each setter validates the candidate value against a copy first, then swaps it in and records the change.

use super::core::ClearingHouse;
use super::results::EngineError;
use crate::config::ClearingHouseConfig;
use crate::events::{EventPayload, MarketAddedEvent, ParameterUpdatedEvent};
use crate::market::{MarketConfig, MarketState};
use crate::oracle::Oracle;
use crate::pool::Pool;
use crate::types::{AccountId, MarketId};
use crate::vault::Vault;
use rust_decimal::Decimal;
use std::fmt::Display;
use tracing::info;

impl<O: Oracle, V: Vault> ClearingHouse<O, V> {
    pub fn owner(&self) -> AccountId {
        self.config.owner
    }

    fn ensure_owner(&self, caller: AccountId) -> Result<(), EngineError> {
        if caller != self.config.owner {
            return Err(EngineError::Unauthorized(caller));
        }
        Ok(())
    }

    pub fn add_market(
        &mut self,
        caller: AccountId,
        config: MarketConfig,
        pool: Box<dyn Pool>,
    ) -> Result<MarketId, EngineError> {
        self.ensure_owner(caller)?;
        config.validate()?;
        let market_id = config.id;
        if self.markets.contains_key(&market_id) {
            return Err(EngineError::InvalidMarket(market_id));
        }

        info!(market = %market_id, name = %config.name, fee_ratio = %config.fee_ratio, "market added");
        let event = MarketAddedEvent {
            market_id,
            name: config.name.clone(),
            fee_ratio: config.fee_ratio,
            max_tick_crossed_within_block: config.max_tick_crossed_within_block,
        };
        self.markets.insert(market_id, MarketState::new(config, pool));
        self.emit_event(EventPayload::MarketAdded(event));
        Ok(market_id)
    }

    pub fn set_liquidation_penalty_ratio(&mut self, caller: AccountId, ratio: Decimal) -> Result<(), EngineError> {
        let old = self.config.liquidation.penalty_ratio;
        self.update_config(caller, |c| c.liquidation.penalty_ratio = ratio)?;
        self.parameter_updated("liquidation_penalty_ratio", None, old, ratio);
        Ok(())
    }

    pub fn set_liquidator_reward_share(&mut self, caller: AccountId, share: Decimal) -> Result<(), EngineError> {
        let old = self.config.liquidation.liquidator_reward_share;
        self.update_config(caller, |c| c.liquidation.liquidator_reward_share = share)?;
        self.parameter_updated("liquidator_reward_share", None, old, share);
        Ok(())
    }

    pub fn set_partial_close_ratio(&mut self, caller: AccountId, ratio: Decimal) -> Result<(), EngineError> {
        let old = self.config.partial_close_ratio;
        self.update_config(caller, |c| c.partial_close_ratio = ratio)?;
        self.parameter_updated("partial_close_ratio", None, old, ratio);
        Ok(())
    }

    /// Zero lifts the limit. Accounts already above a lowered limit keep their markets.
    pub fn set_max_markets_per_account(&mut self, caller: AccountId, max: usize) -> Result<(), EngineError> {
        let old = self.config.max_markets_per_account;
        self.update_config(caller, |c| c.max_markets_per_account = max)?;
        self.parameter_updated("max_markets_per_account", None, old, max);
        Ok(())
    }

    /// Zero disables the guard for the market.
    pub fn set_max_tick_crossed_within_block(
        &mut self,
        caller: AccountId,
        market: MarketId,
        max_tick: u32,
    ) -> Result<(), EngineError> {
        let old = self.update_market(caller, market, |c| {
            std::mem::replace(&mut c.max_tick_crossed_within_block, max_tick)
        })?;
        self.parameter_updated("max_tick_crossed_within_block", Some(market), old, max_tick);
        Ok(())
    }

    pub fn set_fee_ratio(&mut self, caller: AccountId, market: MarketId, ratio: Decimal) -> Result<(), EngineError> {
        let old = self.update_market(caller, market, |c| std::mem::replace(&mut c.fee_ratio, ratio))?;
        self.parameter_updated("fee_ratio", Some(market), old, ratio);
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: AccountId, new_owner: AccountId) -> Result<(), EngineError> {
        let old = self.config.owner;
        self.update_config(caller, |c| c.owner = new_owner)?;
        self.parameter_updated("owner", None, old, new_owner);
        Ok(())
    }

    fn update_config(
        &mut self,
        caller: AccountId,
        apply: impl FnOnce(&mut ClearingHouseConfig),
    ) -> Result<(), EngineError> {
        self.ensure_owner(caller)?;
        let mut next = self.config.clone();
        apply(&mut next);
        next.validate()?;
        self.config = next;
        Ok(())
    }

    // returns whatever `apply` hands back, usually the replaced value
    fn update_market<T>(
        &mut self,
        caller: AccountId,
        market: MarketId,
        apply: impl FnOnce(&mut MarketConfig) -> T,
    ) -> Result<T, EngineError> {
        self.ensure_owner(caller)?;
        let state = self
            .markets
            .get_mut(&market)
            .ok_or(EngineError::InvalidMarket(market))?;
        let mut next = state.config.clone();
        let out = apply(&mut next);
        next.validate()?;
        state.config = next;
        Ok(out)
    }

    fn parameter_updated(&mut self, name: &str, market_id: Option<MarketId>, old: impl Display, new: impl Display) {
        let (old_value, new_value) = (old.to_string(), new.to_string());
        info!(parameter = name, market = ?market_id, %old_value, %new_value, "parameter updated");
        self.emit_event(EventPayload::ParameterUpdated(ParameterUpdatedEvent {
            name: name.to_string(),
            market_id,
            old_value,
            new_value,
        }));
    }
}
