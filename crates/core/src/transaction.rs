//! Transfer transactions.

use crate::address::{Address, AddressError};
use crate::error::ErrorKind;
use crate::hash::{Fingerprint, Hasher};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::Hash;
use thiserror::Error;

/// Errors that can occur during transaction operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("supplied fingerprint {supplied} does not match computed {computed}")]
    FingerprintMismatch {
        supplied: Fingerprint,
        computed: Fingerprint,
    },

    #[error("transaction {0} is not well-formed")]
    NotWellFormed(Fingerprint),
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// A transfer of `amount` minor units from one address to another.
///
/// All fingerprinted fields are fixed at construction, so the stored
/// fingerprint cannot drift from its inputs. The `mined` flag is not part
/// of the fingerprint and is only set when a block takes the transaction in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TransactionRecord", into = "TransactionRecord")]
pub struct Transaction {
    fingerprint: Fingerprint,
    from: Address,
    to: Address,
    amount: u64,
    fee: u64,
    nonce: u64,
    mined: bool,
}

/// Wire form of a transaction with an explicit fingerprint.
///
/// Converting a record into a [`Transaction`] recomputes the fingerprint and
/// rejects the record if the supplied one disagrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub fingerprint: Fingerprint,
    pub from: Address,
    pub to: Address,
    pub amount: u64,
    pub fee: u64,
    pub nonce: u64,
    #[serde(default)]
    pub mined: bool,
}

impl Transaction {
    /// Create a new pending transaction and fingerprint it.
    pub fn new(from: Address, to: Address, amount: u64, fee: u64, nonce: u64) -> Self {
        Self {
            fingerprint: Self::compute_fingerprint(&from, &to, amount, fee, nonce),
            from,
            to,
            amount,
            fee,
            nonce,
            mined: false,
        }
    }

    /// Create a transaction from textual addresses.
    pub fn create(
        from: &str,
        to: &str,
        amount: u64,
        fee: u64,
        nonce: u64,
    ) -> Result<Self, TransactionError> {
        let from = Address::from_hex(from)?;
        let to = Address::from_hex(to)?;
        Ok(Self::new(from, to, amount, fee, nonce))
    }

    /// Create a transaction carrying an externally supplied fingerprint.
    ///
    /// Fails closed: a fingerprint that disagrees with the fields is rejected.
    pub fn with_fingerprint(
        fingerprint: Fingerprint,
        from: Address,
        to: Address,
        amount: u64,
        fee: u64,
        nonce: u64,
    ) -> Result<Self, TransactionError> {
        let tx = Self::new(from, to, amount, fee, nonce);
        if tx.fingerprint != fingerprint {
            return Err(TransactionError::FingerprintMismatch {
                supplied: fingerprint,
                computed: tx.fingerprint,
            });
        }
        Ok(tx)
    }

    /// Fingerprint over (from, to, amount, fee, nonce).
    ///
    /// The two address renderings are absorbed character by character,
    /// interleaved, followed by the three numeric fields.
    pub fn compute_fingerprint(
        from: &Address,
        to: &Address,
        amount: u64,
        fee: u64,
        nonce: u64,
    ) -> Fingerprint {
        let from_hex = from.to_hex();
        let to_hex = to.to_hex();
        let mut hasher = Hasher::new();
        for (f, t) in from_hex.bytes().zip(to_hex.bytes()) {
            hasher.update(u64::from(f)).update(u64::from(t));
        }
        hasher.update(amount).update(fee).update(nonce);
        hasher.finish()
    }

    /// Recompute the fingerprint from the current fields.
    pub fn recompute_fingerprint(&self) -> Fingerprint {
        Self::compute_fingerprint(&self.from, &self.to, self.amount, self.fee, self.nonce)
    }

    /// Whether the stored fingerprint matches the fields.
    pub fn verify_fingerprint(&self) -> bool {
        self.fingerprint == self.recompute_fingerprint()
    }

    /// Syntactic check: positive fee and a consistent fingerprint.
    ///
    /// Address validity and non-negative amounts are guaranteed by the types.
    /// Balances and nonces are checked against account state elsewhere.
    pub fn is_well_formed(&self) -> bool {
        self.fee > 0 && self.verify_fingerprint()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> &Address {
        &self.to
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_mined(&self) -> bool {
        self.mined
    }

    pub(crate) fn mark_mined(&mut self) {
        self.mined = true;
    }

    /// Whether sender and receiver are the same account.
    pub fn is_self_transfer(&self) -> bool {
        self.from == self.to
    }

    /// `amount + fee`, or `None` on overflow.
    pub fn total_cost(&self) -> Option<u64> {
        self.amount.checked_add(self.fee)
    }

    /// Ordering by nonce, used when sorting pending transactions.
    pub fn cmp_by_nonce(&self, other: &Self) -> Ordering {
        self.nonce.cmp(&other.nonce)
    }

    /// Ordering by amount transferred.
    pub fn cmp_by_amount(&self, other: &Self) -> Ordering {
        self.amount.cmp(&other.amount)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = TransactionError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        let mut tx = Self::with_fingerprint(
            record.fingerprint,
            record.from,
            record.to,
            record.amount,
            record.fee,
            record.nonce,
        )?;
        tx.mined = record.mined;
        Ok(tx)
    }
}

impl From<Transaction> for TransactionRecord {
    fn from(tx: Transaction) -> Self {
        Self {
            fingerprint: tx.fingerprint,
            from: tx.from,
            to: tx.to,
            amount: tx.amount,
            fee: tx.fee,
            nonce: tx.nonce,
            mined: tx.mined,
        }
    }
}
