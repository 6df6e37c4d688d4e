// 9.2 vault.rs: collateral custody as the clearing house sees it.
// the engine reads collateral value for margin and hands realized pnl over for settlement.
// deposits and withdrawals themselves belong to the vault.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::types::{AccountId, Quote};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("Insufficient collateral: available {available}, requested {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),
}

pub trait Vault: Send {
    // collateral counted toward account value
    fn collateral_value(&self, account: AccountId) -> Result<Quote, VaultError>;

    // credit (positive) or debit (negative) realized pnl against collateral
    fn settle_pnl(&mut self, account: AccountId, amount: Quote) -> Result<(), VaultError>;
}

// Collateral ledger kept in memory. used by the simulator and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVault {
    balances: HashMap<AccountId, Decimal>,
    // total deposits processed
    total_deposited: Decimal,
    // total withdrawals processed
    total_withdrawn: Decimal,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, account: AccountId, amount: Decimal) -> Result<(), VaultError> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::InvalidAmount(amount));
        }
        *self.balances.entry(account).or_default() += amount;
        self.total_deposited += amount;
        Ok(())
    }

    pub fn withdraw(&mut self, account: AccountId, amount: Decimal) -> Result<(), VaultError> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::InvalidAmount(amount));
        }
        let available = self.balance(account);
        if amount > available {
            return Err(VaultError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        self.balances.insert(account, available - amount);
        self.total_withdrawn += amount;
        Ok(())
    }

    pub fn balance(&self, account: AccountId) -> Decimal {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn total_deposited(&self) -> Decimal {
        self.total_deposited
    }

    pub fn total_withdrawn(&self) -> Decimal {
        self.total_withdrawn
    }
}

impl Vault for InMemoryVault {
    fn collateral_value(&self, account: AccountId) -> Result<Quote, VaultError> {
        Ok(Quote::new(self.balance(account)))
    }

    fn settle_pnl(&mut self, account: AccountId, amount: Quote) -> Result<(), VaultError> {
        let available = self.balance(account);
        let after = available + amount.value();
        // losses can't take collateral below zero
        if after < Decimal::ZERO {
            return Err(VaultError::InsufficientBalance {
                available,
                requested: -amount.value(),
            });
        }
        self.balances.insert(account, after);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deposit_withdraw() {
        let mut vault = InMemoryVault::new();
        let alice = AccountId(1);

        vault.deposit(alice, dec!(1000)).unwrap();
        vault.withdraw(alice, dec!(250)).unwrap();
        assert_eq!(vault.balance(alice), dec!(750));
        assert_eq!(vault.total_deposited(), dec!(1000));
        assert_eq!(vault.total_withdrawn(), dec!(250));

        assert!(matches!(
            vault.withdraw(alice, dec!(751)),
            Err(VaultError::InsufficientBalance { .. })
        ));
        assert_eq!(vault.deposit(alice, dec!(0)), Err(VaultError::InvalidAmount(dec!(0))));
    }

    #[test]
    fn settle_pnl_credits_and_debits() {
        let mut vault = InMemoryVault::new();
        let bob = AccountId(2);
        vault.deposit(bob, dec!(100)).unwrap();

        vault.settle_pnl(bob, Quote::new(dec!(25))).unwrap();
        vault.settle_pnl(bob, Quote::new(dec!(-5))).unwrap();
        assert_eq!(vault.collateral_value(bob).unwrap().value(), dec!(120));
    }

    #[test]
    fn settle_loss_beyond_collateral_fails() {
        let mut vault = InMemoryVault::new();
        let bob = AccountId(2);
        vault.deposit(bob, dec!(10)).unwrap();

        let err = vault.settle_pnl(bob, Quote::new(dec!(-11))).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientBalance { .. }));
        assert_eq!(vault.balance(bob), dec!(10));
    }
}
