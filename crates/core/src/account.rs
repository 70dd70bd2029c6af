//! Account state representation.
//!
//! An account never owns the transactions that touch it. It keeps
//! [`TxRef`] locator keys pointing into the mempool or a block, which the
//! ledger rewrites when a transaction moves from one to the other.

use crate::address::Address;
use crate::error::ErrorKind;
use crate::hash::Fingerprint;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("insufficient funds (required {required}, available {available})")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("balance overflow on {address} (balance {balance}, credit {amount})")]
    BalanceOverflow {
        address: Address,
        balance: u64,
        amount: u64,
    },

    #[error("dangling reference: {address} has no entry for transaction {fingerprint}")]
    DanglingReference {
        address: Address,
        fingerprint: Fingerprint,
    },
}

impl AccountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccountError::InsufficientFunds { .. } | AccountError::BalanceOverflow { .. } => {
                ErrorKind::Validation
            }
            AccountError::DanglingReference { .. } => ErrorKind::DanglingReference,
        }
    }
}

/// Where the resident copy of a transaction lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxLocation {
    /// Pending in the mempool, looked up by fingerprint.
    Mempool,
    /// Included in the block at `height`, at position `index`.
    Block { height: u64, index: usize },
}

/// A back-reference from an account to a transaction it takes part in.
///
/// Nonce and amount are copied from the transaction. They are immutable
/// parts of its fingerprinted content, so the copy cannot go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxRef {
    pub fingerprint: Fingerprint,
    pub nonce: u64,
    pub amount: u64,
    /// True when the owning account is the sender.
    pub outgoing: bool,
    pub location: TxLocation,
}

impl TxRef {
    /// Build the reference `owner` keeps to `tx` stored at `location`.
    pub fn new(tx: &Transaction, owner: &Address, location: TxLocation) -> Self {
        Self {
            fingerprint: tx.fingerprint(),
            nonce: tx.nonce(),
            amount: tx.amount(),
            outgoing: tx.from() == owner,
            location,
        }
    }

    /// Same reference, pointing somewhere else.
    pub fn relocated(self, location: TxLocation) -> Self {
        Self { location, ..self }
    }

    pub fn is_pending(&self) -> bool {
        self.location == TxLocation::Mempool
    }
}

/// Ledger entry for one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    address: Address,
    balance: u64,
    /// Number of applied sends from this address.
    nonce: u64,
    /// Sorted by nonce; equal nonces keep insertion order.
    tx_refs: Vec<TxRef>,
    average_spent: f64,
}

impl Account {
    /// Create an account with the given balance and no history.
    pub fn new(address: Address, balance: u64) -> Self {
        Self {
            address,
            balance,
            nonce: 0,
            tx_refs: Vec::new(),
            average_spent: 0.0,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Nonce the next outgoing transaction must carry.
    pub fn next_nonce(&self) -> u64 {
        self.nonce.saturating_add(1)
    }

    pub fn tx_refs(&self) -> &[TxRef] {
        &self.tx_refs
    }

    /// Mean amount of outgoing transactions referenced by this account.
    pub fn average_spent(&self) -> f64 {
        self.average_spent
    }

    /// Whether the account is the permanent root account.
    pub fn is_root(&self) -> bool {
        self.address.is_root()
    }

    /// No transaction references this account.
    pub fn is_dormant(&self) -> bool {
        self.tx_refs.is_empty()
    }

    /// Check if the account has sufficient balance.
    pub fn has_balance(&self, amount: u64) -> bool {
        self.balance >= amount
    }

    /// Add balance to the account. The balance is left untouched on overflow.
    pub fn credit(&mut self, amount: u64) -> Result<(), AccountError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(AccountError::BalanceOverflow {
                address: self.address,
                balance: self.balance,
                amount,
            })?;
        Ok(())
    }

    /// Subtract balance from the account. The balance is left untouched on failure.
    pub fn debit(&mut self, amount: u64) -> Result<(), AccountError> {
        if self.balance < amount {
            return Err(AccountError::InsufficientFunds {
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Record one more applied send.
    pub fn advance_nonce(&mut self) {
        self.nonce = self.nonce.saturating_add(1);
    }

    /// Insert a reference, keeping the list ordered by nonce.
    pub fn attach(&mut self, tx_ref: TxRef) {
        let pos = self
            .tx_refs
            .iter()
            .position(|r| r.nonce > tx_ref.nonce)
            .unwrap_or(self.tx_refs.len());
        self.tx_refs.insert(pos, tx_ref);
        self.update_average_spent();
    }

    /// Replace the reference identified by `old` with `tx_ref`.
    ///
    /// A missing entry means an earlier step lost track of a transaction;
    /// callers must treat [`AccountError::DanglingReference`] as an internal fault.
    pub fn retarget(&mut self, old: &Fingerprint, tx_ref: TxRef) -> Result<(), AccountError> {
        let slot = self
            .tx_refs
            .iter_mut()
            .find(|r| r.fingerprint == *old)
            .ok_or(AccountError::DanglingReference {
                address: self.address,
                fingerprint: *old,
            })?;
        *slot = tx_ref;
        // Retargeting may change the nonce if callers swap in a different transaction.
        self.tx_refs.sort_by_key(|r| r.nonce);
        self.update_average_spent();
        Ok(())
    }

    /// Remove the reference to `fingerprint`, returning it if present.
    pub fn detach(&mut self, fingerprint: &Fingerprint) -> Option<TxRef> {
        let pos = self
            .tx_refs
            .iter()
            .position(|r| r.fingerprint == *fingerprint)?;
        let removed = self.tx_refs.remove(pos);
        self.update_average_spent();
        Some(removed)
    }

    /// Find the reference to `fingerprint`.
    pub fn find_ref(&self, fingerprint: &Fingerprint) -> Option<&TxRef> {
        self.tx_refs.iter().find(|r| r.fingerprint == *fingerprint)
    }

    fn update_average_spent(&mut self) {
        let (sum, count) = self
            .tx_refs
            .iter()
            .filter(|r| r.outgoing)
            .fold((0u128, 0u64), |(sum, count), r| {
                (sum + u128::from(r.amount), count + 1)
            });
        self.average_spent = if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_bytes([1u8; 20])
    }

    fn bob() -> Address {
        Address::from_bytes([2u8; 20])
    }

    fn pending_ref(tx: &Transaction, owner: &Address) -> TxRef {
        TxRef::new(tx, owner, TxLocation::Mempool)
    }

    #[test]
    fn test_new_account() {
        let account = Account::new(alice(), 1000);
        assert_eq!(account.nonce(), 0);
        assert_eq!(account.next_nonce(), 1);
        assert_eq!(account.balance(), 1000);
        assert!(account.is_dormant());
        assert!(!account.is_root());
        assert_eq!(account.average_spent(), 0.0);
    }

    #[test]
    fn test_credit_and_debit() {
        let mut account = Account::new(alice(), 100);

        account.credit(50).unwrap();
        assert_eq!(account.balance(), 150);

        assert!(account.debit(100).is_ok());
        assert_eq!(account.balance(), 50);

        assert_eq!(
            account.debit(100),
            Err(AccountError::InsufficientFunds {
                required: 100,
                available: 50
            })
        );
        assert_eq!(account.balance(), 50);
    }

    #[test]
    fn test_credit_overflow_keeps_balance() {
        let mut account = Account::new(alice(), u64::MAX - 10);

        assert_eq!(
            account.credit(11),
            Err(AccountError::BalanceOverflow {
                address: alice(),
                balance: u64::MAX - 10,
                amount: 11
            })
        );
        assert_eq!(account.balance(), u64::MAX - 10);

        account.credit(10).unwrap();
        assert_eq!(account.balance(), u64::MAX);
    }

    #[test]
    fn test_debit_entire_balance() {
        let mut account = Account::new(alice(), 100);
        assert!(account.debit(100).is_ok());
        assert_eq!(account.balance(), 0);
        assert!(!account.has_balance(1));
    }

    #[test]
    fn test_advance_nonce() {
        let mut account = Account::new(alice(), 0);
        account.advance_nonce();
        account.advance_nonce();
        assert_eq!(account.nonce(), 2);
        assert_eq!(account.next_nonce(), 3);
    }

    #[test]
    fn test_attach_keeps_nonce_order() {
        let mut account = Account::new(alice(), 0);
        let tx3 = Transaction::new(alice(), bob(), 30, 1, 3);
        let tx1 = Transaction::new(alice(), bob(), 10, 1, 1);
        let tx2 = Transaction::new(alice(), bob(), 20, 1, 2);

        account.attach(pending_ref(&tx3, &alice()));
        account.attach(pending_ref(&tx1, &alice()));
        account.attach(pending_ref(&tx2, &alice()));

        let nonces: Vec<u64> = account.tx_refs().iter().map(|r| r.nonce).collect();
        assert_eq!(nonces, vec![1, 2, 3]);
    }

    #[test]
    fn test_attach_equal_nonces_keep_insertion_order() {
        let mut account = Account::new(alice(), 0);
        let first = Transaction::new(alice(), bob(), 10, 1, 1);
        let second = Transaction::new(alice(), bob(), 20, 1, 1);

        account.attach(pending_ref(&first, &alice()));
        account.attach(pending_ref(&second, &alice()));

        assert_eq!(account.tx_refs()[0].fingerprint, first.fingerprint());
        assert_eq!(account.tx_refs()[1].fingerprint, second.fingerprint());
    }

    #[test]
    fn test_average_spent_counts_outgoing_only() {
        let mut account = Account::new(alice(), 0);
        let sent_a = Transaction::new(alice(), bob(), 100, 1, 1);
        let sent_b = Transaction::new(alice(), bob(), 300, 1, 2);
        let received = Transaction::new(bob(), alice(), 10_000, 1, 1);

        account.attach(pending_ref(&sent_a, &alice()));
        account.attach(pending_ref(&received, &alice()));
        account.attach(pending_ref(&sent_b, &alice()));

        assert_eq!(account.average_spent(), 200.0);

        account.detach(&sent_b.fingerprint());
        assert_eq!(account.average_spent(), 100.0);
    }

    #[test]
    fn test_retarget_moves_location() {
        let mut account = Account::new(alice(), 0);
        let tx = Transaction::new(alice(), bob(), 10, 1, 1);
        account.attach(pending_ref(&tx, &alice()));

        let mined = TxRef::new(&tx, &alice(), TxLocation::Block { height: 1, index: 0 });
        account.retarget(&tx.fingerprint(), mined).unwrap();

        let stored = account.find_ref(&tx.fingerprint()).unwrap();
        assert_eq!(stored.location, TxLocation::Block { height: 1, index: 0 });
        assert!(!stored.is_pending());
        assert_eq!(account.tx_refs().len(), 1);
    }

    #[test]
    fn test_retarget_missing_is_dangling() {
        let mut account = Account::new(alice(), 0);
        let tx = Transaction::new(alice(), bob(), 10, 1, 1);

        let err = account
            .retarget(
                &tx.fingerprint(),
                TxRef::new(&tx, &alice(), TxLocation::Mempool),
            )
            .unwrap_err();

        assert!(matches!(err, AccountError::DanglingReference { .. }));
        assert_eq!(err.kind(), ErrorKind::DanglingReference);
        assert!(account.is_dormant());
    }

    #[test]
    fn test_detach() {
        let mut account = Account::new(bob(), 0);
        let tx = Transaction::new(alice(), bob(), 10, 1, 1);
        account.attach(pending_ref(&tx, &bob()));
        assert!(!account.tx_refs()[0].outgoing);

        assert!(account.detach(&tx.fingerprint()).is_some());
        assert!(account.detach(&tx.fingerprint()).is_none());
        assert!(account.is_dormant());
    }

    #[test]
    fn test_relocated_keeps_identity() {
        let tx = Transaction::new(alice(), bob(), 10, 1, 1);
        let pending = TxRef::new(&tx, &alice(), TxLocation::Mempool);
        let moved = pending.relocated(TxLocation::Block { height: 4, index: 2 });
        assert_eq!(moved.fingerprint, pending.fingerprint);
        assert_eq!(moved.nonce, pending.nonce);
        assert!(pending.is_pending());
        assert!(!moved.is_pending());
    }
}
