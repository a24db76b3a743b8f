use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProtocolError;
use crate::types::{Address, Amount};

/// Available and locked funds of one user in one collateral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(with = "crate::types::amount")]
    pub available: Amount,
    #[serde(with = "crate::types::amount")]
    pub locked: Amount,
}

impl Balance {
    pub fn total(&self) -> Option<Amount> {
        self.available.checked_add(self.locked)
    }
}

/// Per-user, per-collateral bookkeeping of protocol-held funds.
///
/// Accounts appear on first credit and are never removed.
#[derive(Debug, Clone, Default)]
pub struct AccountLedger {
    balances: BTreeMap<(Address, Address), Balance>,
}

impl AccountLedger {
    pub fn balance(&self, user: &Address, collateral: &Address) -> Balance {
        self.balances
            .get(&(user.clone(), collateral.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn entry(&mut self, user: &Address, collateral: &Address) -> &mut Balance {
        self.balances
            .entry((user.clone(), collateral.clone()))
            .or_default()
    }

    pub fn credit(&mut self, user: &Address, collateral: &Address, amount: Amount) -> Result<(), ProtocolError> {
        let balance = self.entry(user, collateral);
        let next = balance
            .available
            .checked_add(amount)
            .ok_or(ProtocolError::Overflow("available balance"))?;
        balance
            .total()
            .and_then(|total| total.checked_add(amount))
            .ok_or(ProtocolError::Overflow("account total"))?;
        balance.available = next;
        Ok(())
    }

    /// Withdrawal-side debit; reports the plain "Insufficient balance" error.
    pub fn debit(&mut self, user: &Address, collateral: &Address, amount: Amount) -> Result<(), ProtocolError> {
        let current = self.balance(user, collateral);
        if current.available < amount {
            return Err(ProtocolError::InsufficientBalance {
                available: current.available,
                required: amount,
            });
        }
        self.entry(user, collateral).available -= amount;
        Ok(())
    }

    pub fn lock(&mut self, user: &Address, collateral: &Address, amount: Amount) -> Result<(), ProtocolError> {
        let current = self.balance(user, collateral);
        if current.available < amount {
            return Err(ProtocolError::InsufficientAvailableBalance {
                available: current.available,
                required: amount,
            });
        }
        let balance = self.entry(user, collateral);
        balance.available -= amount;
        balance.locked += amount;
        Ok(())
    }

    pub fn release(&mut self, user: &Address, collateral: &Address, amount: Amount) -> Result<(), ProtocolError> {
        let current = self.balance(user, collateral);
        if current.locked < amount {
            return Err(ProtocolError::InsufficientLockedBalance {
                locked: current.locked,
                required: amount,
            });
        }
        let balance = self.entry(user, collateral);
        balance.locked -= amount;
        balance.available += amount;
        Ok(())
    }

    /// Move available funds between two accounts of the same collateral.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        collateral: &Address,
        amount: Amount,
    ) -> Result<(), ProtocolError> {
        let current = self.balance(from, collateral);
        if current.available < amount {
            return Err(ProtocolError::InsufficientAvailableBalance {
                available: current.available,
                required: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        self.credit(to, collateral, amount)?;
        self.entry(from, collateral).available -= amount;
        Ok(())
    }

    /// Sum of every account's holdings in `collateral`.
    pub fn total_in(&self, collateral: &Address) -> Option<Amount> {
        self.balances
            .iter()
            .filter(|((_, c), _)| c == collateral)
            .try_fold(0u128, |acc, (_, balance)| acc.checked_add(balance.total()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collateral() -> Address {
        Address::from_index(0xc0)
    }

    #[test]
    fn lock_and_release_move_between_buckets() {
        let mut ledger = AccountLedger::default();
        let user = Address::from_index(1);
        ledger.credit(&user, &collateral(), 100_000).unwrap();

        ledger.lock(&user, &collateral(), 700).unwrap();
        assert_eq!(
            ledger.balance(&user, &collateral()),
            Balance {
                available: 99_300,
                locked: 700
            }
        );

        ledger.release(&user, &collateral(), 700).unwrap();
        assert_eq!(ledger.balance(&user, &collateral()).available, 100_000);
        assert_eq!(ledger.balance(&user, &collateral()).locked, 0);
    }

    #[test]
    fn debit_and_lock_report_different_errors() {
        let mut ledger = AccountLedger::default();
        let user = Address::from_index(1);
        ledger.credit(&user, &collateral(), 5).unwrap();

        assert!(matches!(
            ledger.debit(&user, &collateral(), 6),
            Err(ProtocolError::InsufficientBalance { available: 5, required: 6 })
        ));
        assert!(matches!(
            ledger.lock(&user, &collateral(), 6),
            Err(ProtocolError::InsufficientAvailableBalance { .. })
        ));
        assert!(matches!(
            ledger.release(&user, &collateral(), 1),
            Err(ProtocolError::InsufficientLockedBalance { .. })
        ));
    }

    #[test]
    fn transfer_credits_receiver() {
        let mut ledger = AccountLedger::default();
        let a = Address::from_index(1);
        let b = Address::from_index(2);
        ledger.credit(&a, &collateral(), 10).unwrap();
        ledger.transfer(&a, &b, &collateral(), 4).unwrap();
        assert_eq!(ledger.balance(&a, &collateral()).available, 6);
        assert_eq!(ledger.balance(&b, &collateral()).available, 4);
    }

    #[derive(Debug, Clone)]
    enum LedgerOp {
        Lock(u8, u32),
        Release(u8, u32),
        Transfer(u8, u8, u32),
    }

    fn op_strategy() -> impl Strategy<Value = Vec<LedgerOp>> {
        proptest::collection::vec(
            prop_oneof![
                (0u8..3, any::<u32>()).prop_map(|(user, amount)| LedgerOp::Lock(user, amount)),
                (0u8..3, any::<u32>()).prop_map(|(user, amount)| LedgerOp::Release(user, amount)),
                (0u8..3, 0u8..3, any::<u32>())
                    .prop_map(|(from, to, amount)| LedgerOp::Transfer(from, to, amount)),
            ],
            0..40,
        )
    }

    proptest! {
        #[test]
        fn internal_moves_conserve_total(ops in op_strategy()) {
            let mut ledger = AccountLedger::default();
            for user in 0..3u64 {
                ledger
                    .credit(&Address::from_index(user), &collateral(), u32::MAX as Amount)
                    .unwrap();
            }
            let before = ledger.total_in(&collateral());

            for op in ops {
                let snapshot = ledger.clone();
                let result = match op {
                    LedgerOp::Lock(user, amount) => ledger.lock(
                        &Address::from_index(user as u64),
                        &collateral(),
                        amount as Amount,
                    ),
                    LedgerOp::Release(user, amount) => ledger.release(
                        &Address::from_index(user as u64),
                        &collateral(),
                        amount as Amount,
                    ),
                    LedgerOp::Transfer(from, to, amount) => ledger.transfer(
                        &Address::from_index(from as u64),
                        &Address::from_index(to as u64),
                        &collateral(),
                        amount as Amount,
                    ),
                };
                if result.is_err() {
                    for user in 0..3u64 {
                        let user = Address::from_index(user);
                        prop_assert_eq!(
                            ledger.balance(&user, &collateral()),
                            snapshot.balance(&user, &collateral())
                        );
                    }
                }
                prop_assert_eq!(ledger.total_in(&collateral()), before);
            }
        }
    }
}
