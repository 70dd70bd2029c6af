//! Speculative account projection.
//!
//! Proposal and block processing replay transactions against a snapshot
//! so that authoritative state is only touched once a whole block checks out.

use simchain_consensus::{AccountLookup, AccountState, TransactionValidator, ValidationError};
use simchain_core::{Account, Address, Transaction};
use std::collections::BTreeMap;

/// Point-in-time copy of every account's balance and nonce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    accounts: BTreeMap<Address, AccountState>,
}

impl Snapshot {
    /// Take a snapshot of an account table.
    pub fn of(accounts: &BTreeMap<Address, Account>) -> Self {
        Self {
            accounts: accounts
                .iter()
                .map(|(address, account)| (*address, AccountState::from(account)))
                .collect(),
        }
    }

    pub fn get(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Validate `tx` against the projected state and, if it passes, apply it.
    ///
    /// The sender pays `amount + fee`, its nonce advances and the receiver
    /// is credited `amount`, created if unseen. A credit that would overflow
    /// the receiver's balance is refused. Nothing changes on failure.
    pub fn try_apply(&mut self, tx: &Transaction) -> Result<(), ValidationError> {
        TransactionValidator::validate_tx(tx, self)?;

        // validate_tx has checked the sender exists and that the cost fits.
        let cost = tx.total_cost().ok_or(ValidationError::AmountOverflow {
            amount: tx.amount(),
            fee: tx.fee(),
        })?;
        if !tx.is_self_transfer() {
            let balance = self.get(tx.to()).map_or(0, |state| state.balance);
            if balance.checked_add(tx.amount()).is_none() {
                return Err(ValidationError::BalanceOverflow {
                    address: *tx.to(),
                    balance,
                    amount: tx.amount(),
                });
            }
        }

        let sender = self
            .accounts
            .get_mut(tx.from())
            .ok_or(ValidationError::UnknownSender(*tx.from()))?;
        sender.balance -= cost;
        sender.nonce += 1;

        // A self-transfer credits back less than it just paid.
        let receiver = self.accounts.entry(*tx.to()).or_default();
        receiver.balance += tx.amount();
        Ok(())
    }
}

impl AccountLookup for Snapshot {
    fn account_state(&self, address: &Address) -> Option<AccountState> {
        self.accounts.get(address).copied()
    }
}
