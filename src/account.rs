//! Trader accounts.
//!
//! An account owns one [`MarketBalance`] per market it has touched, the
//! running realized-PnL total, and the set of markets where it still holds
//! a non-zero net balance. Collateral lives in the vault, not here.

use crate::balance::{Burned, LedgerError, MarketBalance, TokenBalance};
use crate::types::{AccountId, MarketId, Quote, SignedSize, TokenSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balances: BTreeMap<MarketId, MarketBalance>,
    pub owed_realized_pnl: Quote,
    pub open_markets: BTreeSet<MarketId>,
}

impl Account {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balances: BTreeMap::new(),
            owed_realized_pnl: Quote::zero(),
            open_markets: BTreeSet::new(),
        }
    }

    pub fn balance(&self, market: MarketId) -> MarketBalance {
        self.balances.get(&market).copied().unwrap_or_default()
    }

    // balances are created lazily on first touch
    pub fn balance_mut(&mut self, market: MarketId) -> &mut MarketBalance {
        self.balances.entry(market).or_default()
    }

    pub fn token_info(&self, market: MarketId, side: TokenSide) -> TokenBalance {
        *self.balance(market).token(side)
    }

    pub fn position_size(&self, market: MarketId) -> SignedSize {
        self.balance(market).position_size()
    }

    /// Net quote balance. This is the open notional carried by the position.
    pub fn net_quote(&self, market: MarketId) -> Decimal {
        self.balance(market).net_quote()
    }

    pub fn adjust(
        &mut self,
        market: MarketId,
        side: TokenSide,
        delta_available: Decimal,
        delta_debt: Decimal,
    ) -> Result<(), LedgerError> {
        self.balance_mut(market)
            .adjust(side, delta_available, delta_debt)
    }

    pub fn add_owed_realized_pnl(&mut self, amount: Quote) {
        self.owed_realized_pnl = self.owed_realized_pnl.add(amount);
    }

    /// Hand the accumulated realized PnL over to settlement.
    pub fn take_owed_realized_pnl(&mut self) -> Quote {
        std::mem::take(&mut self.owed_realized_pnl)
    }

    pub fn is_open(&self, market: MarketId) -> bool {
        self.open_markets.contains(&market)
    }

    /// Burn matched pairs in `market` and refresh its open-market membership.
    pub fn settle_market(&mut self, market: MarketId) -> Burned {
        let balance = self.balance_mut(market);
        let burned = balance.settle();
        let flat = balance.is_flat();
        let empty = balance.is_empty();

        if flat {
            self.open_markets.remove(&market);
            if empty {
                self.balances.remove(&market);
            }
        } else {
            self.open_markets.insert(market);
        }
        burned
    }

    /// Whether holding a balance in `market` would push the account past `max_markets`.
    /// zero means no limit.
    pub fn exceeds_market_limit(&self, market: MarketId, max_markets: usize) -> bool {
        max_markets != 0 && !self.is_open(market) && self.open_markets.len() >= max_markets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn balances_are_lazy() {
        let account = Account::new(AccountId(1));
        assert!(account.balances.is_empty());
        assert_eq!(account.position_size(MarketId(1)), SignedSize::zero());
        assert_eq!(
            account.token_info(MarketId(1), TokenSide::Quote),
            TokenBalance::default()
        );
    }

    #[test]
    fn settle_tracks_open_markets() {
        let mut account = Account::new(AccountId(1));
        let market = MarketId(7);

        account.adjust(market, TokenSide::Base, dec!(0), dec!(25)).unwrap();
        account.adjust(market, TokenSide::Quote, dec!(198), dec!(0)).unwrap();
        account.settle_market(market);
        assert!(account.is_open(market));
        assert_eq!(account.position_size(market).value(), dec!(-25));

        // buy back the base and hand the quote to realized pnl
        account.adjust(market, TokenSide::Base, dec!(25), dec!(0)).unwrap();
        account.adjust(market, TokenSide::Quote, dec!(-198), dec!(0)).unwrap();
        account.add_owed_realized_pnl(Quote::new(dec!(-2)));
        account.settle_market(market);

        assert!(!account.is_open(market));
        assert!(account.balances.is_empty());
        assert_eq!(account.owed_realized_pnl.value(), dec!(-2));
    }

    #[test]
    fn market_limit() {
        let mut account = Account::new(AccountId(1));
        account.adjust(MarketId(1), TokenSide::Base, dec!(1), dec!(0)).unwrap();
        account.settle_market(MarketId(1));

        assert!(account.exceeds_market_limit(MarketId(2), 1));
        assert!(!account.exceeds_market_limit(MarketId(1), 1));
        assert!(!account.exceeds_market_limit(MarketId(2), 0));
        assert!(!account.exceeds_market_limit(MarketId(2), 2));
    }

    #[test]
    fn take_owed_realized_pnl_zeroes() {
        let mut account = Account::new(AccountId(3));
        account.add_owed_realized_pnl(Quote::new(dec!(12.5)));
        assert_eq!(account.take_owed_realized_pnl().value(), dec!(12.5));
        assert!(account.owed_realized_pnl.is_zero());
    }
}
