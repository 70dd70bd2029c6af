//! Transaction mempool for pending transactions.
//!
//! The mempool is the arena that owns every not-yet-mined transaction.
//! Entries keep their insertion order; accounts refer to them by fingerprint.

use serde::{Deserialize, Serialize};
use simchain_core::{Address, ErrorKind, Fingerprint, Transaction};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during mempool operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MempoolError {
    #[error("transaction {0} is not well-formed")]
    NotWellFormed(Fingerprint),

    #[error("transaction {0} is already mined")]
    AlreadyMined(Fingerprint),

    #[error("transaction {0} already in mempool")]
    Duplicate(Fingerprint),

    #[error("mempool is full (capacity: {0})")]
    Full(usize),

    #[error("fee {fee} below mempool minimum {min_fee}")]
    FeeTooLow { fee: u64, min_fee: u64 },

    #[error("incompatible mempools (ours {ours:?}, theirs {theirs:?})")]
    IncompatiblePools {
        ours: MempoolConfig,
        theirs: MempoolConfig,
    },
}

impl MempoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MempoolError::NotWellFormed(_)
            | MempoolError::AlreadyMined(_)
            | MempoolError::Duplicate(_)
            | MempoolError::FeeTooLow { .. } => ErrorKind::Validation,
            MempoolError::Full(_) => ErrorKind::Capacity,
            MempoolError::IncompatiblePools { .. } => ErrorKind::PoolIncompatibility,
        }
    }
}

pub type Result<T> = std::result::Result<T, MempoolError>;

/// Configuration for the mempool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Maximum number of transactions in the mempool.
    pub max_size: usize,
    /// Minimum fee, in minor units, for admission.
    pub min_fee: u64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_size: 1024,
            min_fee: 25,
        }
    }
}

/// Transaction mempool.
#[derive(Debug, Clone)]
pub struct Mempool {
    /// Configuration.
    config: MempoolConfig,
    /// Transactions in insertion order.
    transactions: Vec<Transaction>,
    /// Set of fingerprints for fast lookup.
    fingerprints: HashSet<Fingerprint>,
    /// Mean fee of resident transactions, 0 when empty.
    average_fee: f64,
}

impl Mempool {
    /// Create a new mempool with default configuration.
    pub fn new() -> Self {
        Self::with_config(MempoolConfig::default())
    }

    /// Create a new mempool with the given configuration.
    pub fn with_config(config: MempoolConfig) -> Self {
        Self {
            config,
            transactions: Vec::new(),
            fingerprints: HashSet::new(),
            average_fee: 0.0,
        }
    }

    pub fn config(&self) -> MempoolConfig {
        self.config
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    pub fn min_fee(&self) -> u64 {
        self.config.min_fee
    }

    pub fn average_fee(&self) -> f64 {
        self.average_fee
    }

    /// Get the number of transactions in the mempool.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the mempool is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.transactions.len() >= self.config.max_size
    }

    /// Check if a transaction is in the mempool.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    /// Get a transaction from the mempool.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Transaction> {
        if !self.contains(fingerprint) {
            return None;
        }
        self.transactions
            .iter()
            .find(|tx| tx.fingerprint() == *fingerprint)
    }

    /// Transactions in insertion order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    /// Transactions sorted by nonce; ties keep insertion order.
    pub fn by_nonce(&self) -> Vec<&Transaction> {
        let mut sorted: Vec<&Transaction> = self.transactions.iter().collect();
        // sort_by is stable
        sorted.sort_by(|a, b| a.cmp_by_nonce(b));
        sorted
    }

    /// Add a transaction to the mempool.
    pub fn add(&mut self, tx: Transaction) -> Result<()> {
        if !tx.is_well_formed() {
            return Err(MempoolError::NotWellFormed(tx.fingerprint()));
        }

        if tx.is_mined() {
            return Err(MempoolError::AlreadyMined(tx.fingerprint()));
        }

        if self.is_full() {
            return Err(MempoolError::Full(self.config.max_size));
        }

        if tx.fee() < self.config.min_fee {
            return Err(MempoolError::FeeTooLow {
                fee: tx.fee(),
                min_fee: self.config.min_fee,
            });
        }

        if self.contains(&tx.fingerprint()) {
            return Err(MempoolError::Duplicate(tx.fingerprint()));
        }

        self.fingerprints.insert(tx.fingerprint());
        self.transactions.push(tx);
        self.update_average_fee();

        Ok(())
    }

    /// Remove a transaction from the mempool.
    ///
    /// Removing an absent transaction is reported and otherwise a no-op.
    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<Transaction> {
        if !self.fingerprints.remove(fingerprint) {
            warn!(tx = %fingerprint, "transaction not found in mempool");
            return None;
        }
        let pos = self
            .transactions
            .iter()
            .position(|tx| tx.fingerprint() == *fingerprint)?;
        let removed = self.transactions.remove(pos);
        self.update_average_fee();
        Some(removed)
    }

    /// Remove the most recently added transaction.
    pub fn pop_last(&mut self) -> Option<Transaction> {
        let Some(tx) = self.transactions.pop() else {
            warn!("mempool is empty, nothing to pop");
            return None;
        };
        self.fingerprints.remove(&tx.fingerprint());
        self.update_average_fee();
        Some(tx)
    }

    /// Add every transaction of `other` that this pool accepts.
    ///
    /// Returns how many were added. Pools with different parameters are
    /// refused without touching either one.
    pub fn merge(&mut self, other: &Mempool) -> Result<usize> {
        self.ensure_compatible(other)?;
        let mut added = 0;
        for tx in other.iter() {
            match self.add(tx.clone()) {
                Ok(()) => added += 1,
                Err(e) => debug!(tx = %tx.fingerprint(), error = %e, "skipped during merge"),
            }
        }
        Ok(added)
    }

    /// Remove every transaction that is also in `other`, returning how many were removed.
    pub fn subtract(&mut self, other: &Mempool) -> Result<usize> {
        self.ensure_compatible(other)?;
        let before = self.transactions.len();
        self.transactions
            .retain(|tx| !other.fingerprints.contains(&tx.fingerprint()));
        self.fingerprints.retain(|fp| !other.fingerprints.contains(fp));
        self.update_average_fee();
        Ok(before - self.transactions.len())
    }

    fn ensure_compatible(&self, other: &Mempool) -> Result<()> {
        if self.config != other.config {
            warn!(
                ours = ?self.config,
                theirs = ?other.config,
                "refusing to combine incompatible mempools"
            );
            return Err(MempoolError::IncompatiblePools {
                ours: self.config,
                theirs: other.config,
            });
        }
        Ok(())
    }

    /// Clear all transactions from the mempool.
    pub fn clear(&mut self) {
        self.transactions.clear();
        self.fingerprints.clear();
        self.average_fee = 0.0;
    }

    fn update_average_fee(&mut self) {
        self.average_fee = if self.transactions.is_empty() {
            0.0
        } else {
            let total: u128 = self.transactions.iter().map(|tx| u128::from(tx.fee())).sum();
            total as f64 / self.transactions.len() as f64
        };
    }

    /// Get mempool statistics.
    pub fn stats(&self) -> MempoolStats {
        let senders: HashSet<&Address> = self.transactions.iter().map(|tx| tx.from()).collect();
        MempoolStats {
            total_transactions: self.len(),
            unique_senders: senders.len(),
            capacity: self.config.max_size,
            average_fee: self.average_fee,
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Mempool {
    /// Same parameters and the same set of transactions, regardless of order.
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config && self.fingerprints == other.fingerprints
    }
}

/// Mempool statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MempoolStats {
    /// Total number of transactions.
    pub total_transactions: usize,
    /// Number of unique senders.
    pub unique_senders: usize,
    /// Mempool capacity.
    pub capacity: usize,
    pub average_fee: f64,
}
