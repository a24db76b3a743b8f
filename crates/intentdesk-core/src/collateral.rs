use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProtocolError;
use crate::types::{Address, Amount};

/// Balances and allowances of a single collateral token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenBook {
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
}

/// In-process stand-in for the external collateral token contracts.
///
/// Keyed by token address. The protocol only moves funds through
/// `transfer_from` (deposits) and `transfer` (withdrawals).
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    tokens: BTreeMap<Address, TokenBook>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, token: &Address, owner: &Address) -> Amount {
        self.tokens
            .get(token)
            .and_then(|book| book.balances.get(owner))
            .copied()
            .unwrap_or(0)
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.tokens
            .get(token)
            .and_then(|book| book.allowances.get(&(owner.clone(), spender.clone())))
            .copied()
            .unwrap_or(0)
    }

    pub fn mint(&mut self, token: &Address, to: &Address, amount: Amount) -> Result<(), ProtocolError> {
        let book = self.tokens.entry(token.clone()).or_default();
        let balance = book.balances.entry(to.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(ProtocolError::Overflow("token mint"))?;
        Ok(())
    }

    pub fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: Amount) {
        self.tokens
            .entry(token.clone())
            .or_default()
            .allowances
            .insert((owner.clone(), spender.clone()), amount);
    }

    pub fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), ProtocolError> {
        let balance = self.balance_of(token, from);
        if balance < amount {
            return Err(ProtocolError::InsufficientTokenBalance {
                balance,
                required: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(ProtocolError::Overflow("token transfer"))?;

        let book = self.tokens.entry(token.clone()).or_default();
        book.balances.insert(from.clone(), balance - amount);
        book.balances.insert(to.clone(), credited);
        Ok(())
    }

    /// Move `amount` from `owner` to `to` on behalf of `spender`.
    ///
    /// An allowance of `Amount::MAX` is treated as unlimited and never decremented.
    pub fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), ProtocolError> {
        let allowed = self.allowance(token, owner, spender);
        if allowed < amount {
            return Err(ProtocolError::InsufficientAllowance {
                allowed,
                required: amount,
            });
        }

        self.transfer(token, owner, to, amount)?;

        if allowed != Amount::MAX {
            self.approve(token, owner, spender, allowed - amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Address {
        Address::from_index(0xc0)
    }

    #[test]
    fn transfer_from_consumes_finite_allowance() {
        let mut ledger = TokenLedger::new();
        let owner = Address::from_index(1);
        let vault = Address::from_index(2);
        ledger.mint(&token(), &owner, 500).unwrap();
        ledger.approve(&token(), &owner, &vault, 150);

        ledger
            .transfer_from(&token(), &vault, &owner, &vault, 100)
            .unwrap();
        assert_eq!(ledger.balance_of(&token(), &owner), 400);
        assert_eq!(ledger.balance_of(&token(), &vault), 100);
        assert_eq!(ledger.allowance(&token(), &owner, &vault), 50);

        let err = ledger
            .transfer_from(&token(), &vault, &owner, &vault, 100)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InsufficientAllowance { .. }));
    }

    #[test]
    fn unlimited_allowance_is_not_decremented() {
        let mut ledger = TokenLedger::new();
        let owner = Address::from_index(1);
        let vault = Address::from_index(2);
        ledger.mint(&token(), &owner, 10).unwrap();
        ledger.approve(&token(), &owner, &vault, Amount::MAX);

        ledger.transfer_from(&token(), &vault, &owner, &vault, 10).unwrap();
        assert_eq!(ledger.allowance(&token(), &owner, &vault), Amount::MAX);
    }

    #[test]
    fn transfer_rejects_overdraft_and_keeps_balances() {
        let mut ledger = TokenLedger::new();
        let owner = Address::from_index(1);
        let other = Address::from_index(3);
        ledger.mint(&token(), &owner, 10).unwrap();

        let err = ledger.transfer(&token(), &owner, &other, 11).unwrap_err();
        assert!(matches!(err, ProtocolError::InsufficientTokenBalance { .. }));
        assert_eq!(ledger.balance_of(&token(), &owner), 10);
        assert_eq!(ledger.balance_of(&token(), &other), 0);
    }

    #[test]
    fn self_transfer_is_a_no_op() {
        let mut ledger = TokenLedger::new();
        let owner = Address::from_index(1);
        ledger.mint(&token(), &owner, 10).unwrap();
        ledger.transfer(&token(), &owner, &owner, 4).unwrap();
        assert_eq!(ledger.balance_of(&token(), &owner), 10);
    }
}
