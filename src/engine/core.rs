// 8.0 engine/core.rs: the clearing house. holds markets, accounts, insurance fund and the
// three collaborators. every public mutator takes &mut self, so one operation runs at a time.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::account::Account;
use crate::balance::TokenBalance;
use crate::config::ClearingHouseConfig;
use crate::events::{BlockAdvancedEvent, Event, EventId, EventPayload, RealizedPnlSettledEvent};
use crate::liquidation::InsuranceFund;
use crate::margin::{evaluate_account, AccountMargin, MarketExposure};
use crate::market::MarketState;
use crate::oracle::Oracle;
use crate::types::{AccountId, BlockNumber, MarketId, Quote, SignedSize, Timestamp, TokenSide};
use crate::vault::Vault;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/** 8.1: main clearing house struct. all state lives here */
pub struct ClearingHouse<O: Oracle, V: Vault> {
    pub(super) config: ClearingHouseConfig,
    pub(super) engine_config: EngineConfig,
    pub(super) markets: BTreeMap<MarketId, MarketState>,
    pub(super) accounts: HashMap<AccountId, Account>,
    pub(super) insurance_fund: InsuranceFund,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) block: BlockNumber,
    pub(super) current_time: Timestamp,
    pub(super) oracle: O,
    pub(super) vault: V,
}

impl<O: Oracle, V: Vault> ClearingHouse<O, V> {
    pub fn new(
        config: ClearingHouseConfig,
        engine_config: EngineConfig,
        oracle: O,
        vault: V,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            engine_config,
            markets: BTreeMap::new(),
            accounts: HashMap::new(),
            insurance_fund: InsuranceFund::default(),
            events: Vec::new(),
            next_event_id: 1,
            block: BlockNumber::default(),
            current_time: Timestamp::from_millis(0),
            oracle,
            vault,
        })
    }

    pub fn config(&self) -> &ClearingHouseConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }

    pub fn account(&self, account_id: AccountId) -> Option<&Account> {
        self.accounts.get(&account_id)
    }

    pub fn market(&self, market_id: MarketId) -> Option<&MarketState> {
        self.markets.get(&market_id)
    }

    pub fn block(&self) -> BlockNumber {
        self.block
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    /// Block boundary from the execution environment. Non-increasing numbers are ignored.
    pub fn advance_block(&mut self, block: BlockNumber) {
        if block <= self.block {
            debug!(current = %self.block, requested = %block, "ignoring stale block");
            return;
        }
        let from = self.block;
        self.block = block;
        for market in self.markets.values_mut() {
            market.guard.observe_block(block);
        }
        self.emit_event(EventPayload::BlockAdvanced(BlockAdvancedEvent { from, to: block }));
    }

    // 8.2: ledger queries. unknown accounts read as empty.

    pub fn get_position_size(&self, account_id: AccountId, market: MarketId) -> SignedSize {
        self.accounts
            .get(&account_id)
            .map_or(SignedSize::zero(), |a| a.position_size(market))
    }

    pub fn get_open_notional(&self, account_id: AccountId, market: MarketId) -> Decimal {
        self.accounts
            .get(&account_id)
            .map_or(Decimal::ZERO, |a| a.net_quote(market))
    }

    /// Net quote balance in `market`, or summed over every market when `market` is None.
    pub fn get_net_quote_balance(&self, account_id: AccountId, market: Option<MarketId>) -> Decimal {
        let Some(account) = self.accounts.get(&account_id) else {
            return Decimal::ZERO;
        };
        match market {
            Some(market) => account.net_quote(market),
            None => account
                .balances
                .values()
                .fold(Decimal::ZERO, |total, b| total.saturating_add(b.net_quote())),
        }
    }

    pub fn get_owed_realized_pnl(&self, account_id: AccountId) -> Quote {
        self.accounts
            .get(&account_id)
            .map_or(Quote::zero(), |a| a.owed_realized_pnl)
    }

    pub fn get_token_info(&self, account_id: AccountId, market: MarketId, token: TokenSide) -> TokenBalance {
        self.accounts
            .get(&account_id)
            .map_or(TokenBalance::default(), |a| a.token_info(market, token))
    }

    pub fn open_markets(&self, account_id: AccountId) -> BTreeSet<MarketId> {
        self.accounts
            .get(&account_id)
            .map(|a| a.open_markets.clone())
            .unwrap_or_default()
    }

    // 8.3: margin queries, valued at the oracle's index price

    pub fn get_account_margin(&self, account_id: AccountId) -> Result<AccountMargin, EngineError> {
        match self.accounts.get(&account_id) {
            Some(account) => self.evaluate_margin(account),
            None => self.evaluate_margin(&Account::new(account_id)),
        }
    }

    pub fn get_account_value(&self, account_id: AccountId) -> Result<Quote, EngineError> {
        Ok(self.get_account_margin(account_id)?.account_value)
    }

    pub fn get_free_collateral(&self, account_id: AccountId) -> Result<Quote, EngineError> {
        Ok(self.get_account_margin(account_id)?.free_collateral())
    }

    pub fn is_liquidatable(&self, account_id: AccountId) -> Result<bool, EngineError> {
        Ok(self.get_account_margin(account_id)?.is_liquidatable())
    }

    pub(super) fn evaluate_margin(&self, account: &Account) -> Result<AccountMargin, EngineError> {
        let collateral = self.vault.collateral_value(account.id)?;
        let window = self.config.margin.twap_window_secs;

        let mut exposures = Vec::with_capacity(account.open_markets.len());
        for &market in &account.open_markets {
            let balance = account.balance(market);
            exposures.push(MarketExposure {
                market,
                size: balance.position_size(),
                open_notional: balance.net_quote(),
                index_price: self.oracle.index_price(market, window)?,
            });
        }

        Ok(evaluate_account(
            collateral,
            account.owed_realized_pnl,
            &exposures,
            &self.config.margin,
        )?)
    }

    pub fn insurance_fund(&self) -> &InsuranceFund {
        &self.insurance_fund
    }

    pub fn insurance_fund_balance(&self) -> Quote {
        self.insurance_fund.balance
    }

    pub fn fund_insurance(&mut self, amount: Quote) -> Result<(), EngineError> {
        if amount.value() <= Decimal::ZERO {
            return Err(EngineError::ZeroAmount);
        }
        self.insurance_fund.deposit(amount);
        info!(%amount, balance = %self.insurance_fund.balance, "insurance fund topped up");
        Ok(())
    }

    pub fn collected_fees(&self, market: MarketId) -> Result<Quote, EngineError> {
        self.markets
            .get(&market)
            .map(|m| m.collected_fees)
            .ok_or(EngineError::InvalidMarket(market))
    }

    /// Hand the account's realized PnL to the vault. The amount is put back if the vault refuses it.
    pub fn settle_owed_realized_pnl(&mut self, account_id: AccountId) -> Result<Quote, EngineError> {
        let amount = match self.accounts.get_mut(&account_id) {
            Some(account) => account.take_owed_realized_pnl(),
            None => return Ok(Quote::zero()),
        };
        if amount.is_zero() {
            return Ok(amount);
        }

        if let Err(err) = self.vault.settle_pnl(account_id, amount) {
            if let Some(account) = self.accounts.get_mut(&account_id) {
                account.add_owed_realized_pnl(amount);
            }
            warn!(account = %account_id, %amount, error = %err, "realized pnl settlement refused");
            return Err(err.into());
        }

        info!(account = %account_id, %amount, "realized pnl settled");
        self.emit_event(EventPayload::RealizedPnlSettled(RealizedPnlSettledEvent {
            account_id,
            amount,
        }));
        Ok(amount)
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(
            EventId(self.next_event_id),
            self.block,
            self.current_time,
            payload,
        );
        self.next_event_id += 1;

        debug!(id = event.id.0, block = %event.block, payload = ?event.payload, "event");

        self.events.push(event);

        if self.events.len() > self.engine_config.max_events {
            let drain_count = self.events.len() - self.engine_config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
