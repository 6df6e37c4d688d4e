//! Per-market token ledger.
//!
//! Every virtual token an account touches is tracked as an `(available, debt)`
//! pair. Debt is minted against the account when a trade needs more tokens than
//! it holds; matched available/debt is burned after every mutation so at most one
//! of the two is non-zero per token once an operation settles.
//!
//! Net base (`available - debt`) is the signed position size. Net quote is the
//! open notional still attached to that position.

use crate::types::{SignedSize, TokenSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenBalance {
    pub available: Decimal,
    pub debt: Decimal,
}

impl TokenBalance {
    pub fn new(available: Decimal, debt: Decimal) -> Self {
        Self { available, debt }
    }

    pub fn net(&self) -> Decimal {
        self.available - self.debt
    }

    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.debt.is_zero()
    }

    /// Mint only the part of `required` not already covered by available. Returns the minted amount,
    /// or None when the debt counter cannot hold it.
    pub fn mint_to_cover_shortfall(&mut self, required: Decimal) -> Option<Decimal> {
        let shortfall = (required - self.available).max(Decimal::ZERO);
        if shortfall > Decimal::ZERO {
            self.debt = self.debt.checked_add(shortfall)?;
            self.available = required;
        }
        Some(shortfall)
    }

    /// Burn `min(available, debt)` from both counters. Returns the burned amount.
    pub fn burn_matched(&mut self) -> Decimal {
        let burned = self.available.min(self.debt);
        if burned > Decimal::ZERO {
            self.available -= burned;
            self.debt -= burned;
        }
        burned
    }
}

/// The four counters an account holds for one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarketBalance {
    pub base: TokenBalance,
    pub quote: TokenBalance,
}

/// What a settlement pass burned on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Burned {
    pub base: Decimal,
    pub quote: Decimal,
}

impl MarketBalance {
    pub fn token(&self, side: TokenSide) -> &TokenBalance {
        match side {
            TokenSide::Base => &self.base,
            TokenSide::Quote => &self.quote,
        }
    }

    fn token_mut(&mut self, side: TokenSide) -> &mut TokenBalance {
        match side {
            TokenSide::Base => &mut self.base,
            TokenSide::Quote => &mut self.quote,
        }
    }

    /// Apply signed deltas to one token. Nothing is written if either counter would go negative.
    pub fn adjust(
        &mut self,
        side: TokenSide,
        delta_available: Decimal,
        delta_debt: Decimal,
    ) -> Result<(), LedgerError> {
        let token = self.token_mut(side);
        let (Some(available), Some(debt)) = (
            token.available.checked_add(delta_available),
            token.debt.checked_add(delta_debt),
        ) else {
            return Err(LedgerError::Overflow { side });
        };
        if available < Decimal::ZERO || debt < Decimal::ZERO {
            return Err(LedgerError::NegativeBalance {
                side,
                available,
                debt,
            });
        }
        token.available = available;
        token.debt = debt;
        Ok(())
    }

    pub fn mint_to_cover_shortfall(&mut self, side: TokenSide, required: Decimal) -> Result<Decimal, LedgerError> {
        self.token_mut(side)
            .mint_to_cover_shortfall(required)
            .ok_or(LedgerError::Overflow { side })
    }

    pub fn burn_matched_pairs(&mut self, side: TokenSide) -> Decimal {
        self.token_mut(side).burn_matched()
    }

    /// Restores the one-of-available-or-debt invariant on both tokens.
    /// Called once at the end of every balance-affecting operation.
    pub fn settle(&mut self) -> Burned {
        Burned {
            base: self.burn_matched_pairs(TokenSide::Base),
            quote: self.burn_matched_pairs(TokenSide::Quote),
        }
    }

    /// Move the net quote balance by `delta` without touching base.
    /// positive credits available, negative books debt; `settle` nets them afterwards.
    pub fn shift_quote(&mut self, delta: Decimal) -> Result<(), LedgerError> {
        if delta >= Decimal::ZERO {
            self.adjust(TokenSide::Quote, delta, Decimal::ZERO)
        } else {
            self.adjust(TokenSide::Quote, Decimal::ZERO, -delta)
        }
    }

    pub fn position_size(&self) -> SignedSize {
        SignedSize::new(self.base.net())
    }

    pub fn net_quote(&self) -> Decimal {
        self.quote.net()
    }

    /// Both net balances are zero. the market can leave the account's open set.
    pub fn is_flat(&self) -> bool {
        self.base.net().is_zero() && self.quote.net().is_zero()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_zero() && self.quote.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Negative {side:?} balance: available {available}, debt {debt}")]
    NegativeBalance {
        side: TokenSide,
        available: Decimal,
        debt: Decimal,
    },

    #[error("{side:?} balance does not fit in a decimal")]
    Overflow { side: TokenSide },
}
