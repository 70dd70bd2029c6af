//! Blocks: ordered batches of transactions linked to a parent by fingerprint.

use crate::hash::{Fingerprint, FingerprintError, Hasher};
use crate::transaction::{Transaction, TransactionError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

/// An ordered batch of transactions.
///
/// The fingerprint covers the parent fingerprint, the height and every
/// transaction fingerprint in order, and is refreshed by each mutating
/// method. Once the chain accepts a block it is never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BlockRecord", into = "BlockRecord")]
pub struct Block {
    fingerprint: Fingerprint,
    parent_fingerprint: Fingerprint,
    height: u64,
    transactions: Vec<Transaction>,
}

/// Wire form of a block. Converting back checks the supplied fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRecord {
    pub fingerprint: Fingerprint,
    pub parent_fingerprint: Fingerprint,
    pub height: u64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create an empty block at `height` on top of `parent`.
    pub fn new(parent_fingerprint: Fingerprint, height: u64) -> Self {
        let mut block = Self {
            fingerprint: Fingerprint::ZERO,
            parent_fingerprint,
            height,
            transactions: Vec::new(),
        };
        block.refresh_fingerprint();
        block
    }

    /// Create the genesis block (height 0) with a sentinel parent.
    pub fn genesis(parent_fingerprint: Fingerprint) -> Self {
        Self::new(parent_fingerprint, 0)
    }

    /// Build a candidate block from an ordered list of transactions.
    ///
    /// Transactions that are not well-formed are skipped and reported.
    pub fn propose(
        parent_fingerprint: Fingerprint,
        height: u64,
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> Self {
        let mut block = Self::new(parent_fingerprint, height);
        for tx in transactions {
            // add_tx already reports the rejection.
            let _ = block.add_tx(tx);
        }
        block
    }

    /// Fingerprint over (parent, height, tx fingerprints...).
    pub fn compute_fingerprint(
        parent_fingerprint: &Fingerprint,
        height: u64,
        transactions: &[Transaction],
    ) -> Fingerprint {
        let mut hasher = Hasher::new();
        hasher.update(parent_fingerprint.as_u64()).update(height);
        for tx in transactions {
            hasher.update(tx.fingerprint().as_u64());
        }
        hasher.finish()
    }

    /// Recompute the fingerprint from the current fields.
    pub fn recompute_fingerprint(&self) -> Fingerprint {
        Self::compute_fingerprint(&self.parent_fingerprint, self.height, &self.transactions)
    }

    /// Whether the stored fingerprint matches the fields.
    pub fn verify_fingerprint(&self) -> bool {
        self.fingerprint == self.recompute_fingerprint()
    }

    fn refresh_fingerprint(&mut self) {
        self.fingerprint = self.recompute_fingerprint();
    }

    /// Append a transaction, marking it mined.
    pub fn add_tx(&mut self, mut tx: Transaction) -> Result<(), TransactionError> {
        if !tx.is_well_formed() {
            warn!(
                tx = %tx.fingerprint(),
                height = self.height,
                "rejecting transaction that is not well-formed"
            );
            return Err(TransactionError::NotWellFormed(tx.fingerprint()));
        }
        tx.mark_mined();
        self.transactions.push(tx);
        self.refresh_fingerprint();
        Ok(())
    }

    /// Remove the transaction with the given fingerprint.
    pub fn remove_tx(&mut self, fingerprint: &Fingerprint) -> Option<Transaction> {
        let pos = self
            .transactions
            .iter()
            .position(|tx| tx.fingerprint() == *fingerprint);
        let Some(pos) = pos else {
            warn!(tx = %fingerprint, height = self.height, "transaction not in block");
            return None;
        };
        let removed = self.transactions.remove(pos);
        self.refresh_fingerprint();
        Some(removed)
    }

    /// Remove the last transaction.
    pub fn pop_tx(&mut self) -> Option<Transaction> {
        let popped = self.transactions.pop()?;
        self.refresh_fingerprint();
        Some(popped)
    }

    /// Append every well-formed transaction of `other`, returning how many were taken.
    pub fn extend(&mut self, other: &Block) -> usize {
        let before = self.transactions.len();
        for tx in other.transactions() {
            let _ = self.add_tx(tx.clone());
        }
        self.transactions.len() - before
    }

    /// Find a transaction by fingerprint.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|tx| tx.fingerprint() == *fingerprint)
    }

    /// Position of a transaction within the block.
    pub fn position(&self, fingerprint: &Fingerprint) -> Option<usize> {
        self.transactions
            .iter()
            .position(|tx| tx.fingerprint() == *fingerprint)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn parent_fingerprint(&self) -> Fingerprint {
        self.parent_fingerprint
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Sum of transferred amounts.
    pub fn total_amount(&self) -> u128 {
        self.transactions
            .iter()
            .map(|tx| u128::from(tx.amount()))
            .sum()
    }

    /// Sum of fees; these are burned when the block is applied.
    pub fn total_fees(&self) -> u128 {
        self.transactions.iter().map(|tx| u128::from(tx.fee())).sum()
    }

    /// Mean transferred amount, 0 for an empty block.
    pub fn average_amount(&self) -> f64 {
        if self.transactions.is_empty() {
            return 0.0;
        }
        self.total_amount() as f64 / self.transactions.len() as f64
    }

    /// Ordering by height.
    pub fn cmp_by_height(&self, other: &Self) -> Ordering {
        self.height.cmp(&other.height)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Block {}

impl TryFrom<BlockRecord> for Block {
    type Error = FingerprintError;

    fn try_from(record: BlockRecord) -> Result<Self, Self::Error> {
        let computed = Self::compute_fingerprint(
            &record.parent_fingerprint,
            record.height,
            &record.transactions,
        );
        if computed != record.fingerprint {
            return Err(FingerprintError::Mismatch {
                supplied: record.fingerprint,
                computed,
            });
        }
        Ok(Self {
            fingerprint: computed,
            parent_fingerprint: record.parent_fingerprint,
            height: record.height,
            transactions: record.transactions,
        })
    }
}

impl From<Block> for BlockRecord {
    fn from(block: Block) -> Self {
        Self {
            fingerprint: block.fingerprint,
            parent_fingerprint: block.parent_fingerprint,
            height: block.height,
            transactions: block.transactions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    const SENTINEL: Fingerprint = Fingerprint(0xdeadbeef);

    fn tx(amount: u64, nonce: u64) -> Transaction {
        Transaction::new(
            Address::ROOT,
            Address::from_bytes([2u8; 20]),
            amount,
            100,
            nonce,
        )
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis(SENTINEL);

        assert!(genesis.is_genesis());
        assert!(genesis.is_empty());
        assert_eq!(genesis.height(), 0);
        assert_eq!(genesis.parent_fingerprint(), SENTINEL);
        assert!(genesis.verify_fingerprint());
    }

    #[test]
    fn test_block_fingerprint_deterministic() {
        let a = Block::propose(SENTINEL, 1, vec![tx(10, 1), tx(20, 2)]);
        let b = Block::propose(SENTINEL, 1, vec![tx(10, 1), tx(20, 2)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a, b);
    }

    #[test]
    fn test_block_fingerprint_order_sensitive() {
        let a = Block::propose(SENTINEL, 1, vec![tx(10, 1), tx(20, 2)]);
        let b = Block::propose(SENTINEL, 1, vec![tx(20, 2), tx(10, 1)]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_block_fingerprint_covers_linkage() {
        let base = Block::new(SENTINEL, 1);
        assert_ne!(base.fingerprint(), Block::new(SENTINEL, 2).fingerprint());
        assert_ne!(base.fingerprint(), Block::new(Fingerprint(1), 1).fingerprint());
    }

    #[test]
    fn test_add_tx_marks_mined_and_refreshes() {
        let mut block = Block::new(SENTINEL, 1);
        let before = block.fingerprint();

        block.add_tx(tx(10, 1)).unwrap();

        assert_ne!(block.fingerprint(), before);
        assert!(block.verify_fingerprint());
        assert!(block.transactions()[0].is_mined());
    }

    #[test]
    fn test_add_tx_rejects_zero_fee() {
        let mut block = Block::new(SENTINEL, 1);
        let before = block.fingerprint();
        let free = Transaction::new(Address::ROOT, Address::from_bytes([2u8; 20]), 10, 0, 1);

        let result = block.add_tx(free.clone());

        assert_eq!(result, Err(TransactionError::NotWellFormed(free.fingerprint())));
        assert!(block.is_empty());
        assert_eq!(block.fingerprint(), before);
    }

    #[test]
    fn test_propose_skips_malformed() {
        let free = Transaction::new(Address::ROOT, Address::from_bytes([2u8; 20]), 10, 0, 1);
        let block = Block::propose(SENTINEL, 1, vec![tx(10, 1), free, tx(30, 2)]);
        assert_eq!(block.tx_count(), 2);
    }

    #[test]
    fn test_remove_and_pop() {
        let first = tx(10, 1);
        let mut block = Block::propose(SENTINEL, 1, vec![first.clone(), tx(20, 2), tx(30, 3)]);

        assert!(block.remove_tx(&first.fingerprint()).is_some());
        assert!(block.remove_tx(&first.fingerprint()).is_none());
        assert_eq!(block.pop_tx().map(|t| t.amount()), Some(30));
        assert_eq!(block.tx_count(), 1);
        assert!(block.verify_fingerprint());

        // Emptying a block returns it to the empty fingerprint.
        block.pop_tx();
        assert_eq!(block.fingerprint(), Block::new(SENTINEL, 1).fingerprint());
        assert!(block.pop_tx().is_none());
    }

    #[test]
    fn test_extend_and_get() {
        let mut a = Block::propose(SENTINEL, 1, vec![tx(10, 1)]);
        let b = Block::propose(SENTINEL, 1, vec![tx(20, 2), tx(30, 3)]);

        assert_eq!(a.extend(&b), 2);
        assert_eq!(a.tx_count(), 3);
        assert!(a.verify_fingerprint());

        let wanted = tx(20, 2).fingerprint();
        assert_eq!(a.get(&wanted).map(|t| t.amount()), Some(20));
        assert_eq!(a.position(&wanted), Some(1));
    }

    #[test]
    fn test_statistics() {
        let block = Block::propose(SENTINEL, 1, vec![tx(100, 1), tx(300, 2)]);
        assert_eq!(block.total_amount(), 400);
        assert_eq!(block.total_fees(), 200);
        assert_eq!(block.average_amount(), 200.0);
        assert_eq!(Block::new(SENTINEL, 1).average_amount(), 0.0);
    }

    #[test]
    fn test_ordering_by_height() {
        let low = Block::new(SENTINEL, 1);
        let high = Block::new(SENTINEL, 2);
        assert_eq!(low.cmp_by_height(&high), Ordering::Less);
        assert_eq!(high.cmp_by_height(&low), Ordering::Greater);
    }

    #[test]
    fn test_serde_roundtrip() {
        let block = Block::propose(SENTINEL, 3, vec![tx(10, 1)]);
        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
        assert_eq!(back.height(), 3);
        assert!(back.transactions()[0].is_mined());
    }

    #[test]
    fn test_deserialize_rejects_tampered_height() {
        let block = Block::propose(SENTINEL, 3, vec![tx(10, 1)]);
        let mut value = serde_json::to_value(&block).unwrap();
        value["height"] = serde_json::json!(4);
        assert!(serde_json::from_value::<Block>(value).is_err());
    }
}
