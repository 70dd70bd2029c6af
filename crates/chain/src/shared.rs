//! Thread-safe handle to a ledger.
//!
//! Mutating operations are serialized behind one write lock. Readers get
//! either a closure over the current state or a cloned snapshot, never a
//! partially applied block.

use crate::blockchain::{BlockError, Blockchain, ChainStats, Checkpoint, StateError, SubmitError};
use crate::config::ChainConfig;
use parking_lot::RwLock;
use simchain_core::{Address, Block, Fingerprint, Transaction};
use std::sync::Arc;

/// Cloneable handle sharing one [`Blockchain`].
#[derive(Debug, Clone)]
pub struct SharedBlockchain {
    inner: Arc<RwLock<Blockchain>>,
}

impl SharedBlockchain {
    pub fn new(chain: Blockchain) -> Self {
        Self {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    /// Create an uninitialized chain behind a handle.
    pub fn with_config(config: ChainConfig) -> Self {
        Self::new(Blockchain::new(config))
    }

    pub fn generate_genesis(&self) -> Result<(), StateError> {
        self.inner.write().generate_genesis()
    }

    pub fn bootstrap(&self, checkpoint: Checkpoint) -> Result<(), StateError> {
        self.inner.write().bootstrap(checkpoint)
    }

    pub fn submit_transaction(&self, tx: Transaction) -> Result<(), SubmitError> {
        self.inner.write().submit_transaction(tx)
    }

    /// See [`Blockchain::transfer`].
    pub fn transfer(
        &self,
        from: Address,
        to: Address,
        amount: u64,
        fee: u64,
        nonce: u64,
    ) -> Result<Fingerprint, SubmitError> {
        self.inner.write().transfer(from, to, amount, fee, nonce)
    }

    pub fn drop_pending(&self, fingerprint: &Fingerprint) -> Option<Transaction> {
        self.inner.write().drop_pending(fingerprint)
    }

    /// Propose while holding the read lock, so no mutation can interleave.
    pub fn propose_block(&self) -> Block {
        self.inner.read().propose_block()
    }

    pub fn process_block(&self, block: Block) -> Result<(), BlockError> {
        self.inner.write().process_block(block)
    }

    /// Propose and apply a block under one write lock.
    pub fn mine(&self) -> Result<Block, BlockError> {
        let mut chain = self.inner.write();
        let block = chain.propose_block();
        chain.process_block(block.clone())?;
        Ok(block)
    }

    /// Run `f` against the current state under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&Blockchain) -> R) -> R {
        f(&self.inner.read())
    }

    /// Clone the whole ledger.
    pub fn snapshot(&self) -> Blockchain {
        self.inner.read().clone()
    }

    pub fn height(&self) -> u64 {
        self.inner.read().height()
    }

    pub fn stats(&self) -> ChainStats {
        self.inner.read().stats()
    }
}

impl From<Blockchain> for SharedBlockchain {
    fn from(chain: Blockchain) -> Self {
        Self::new(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_handles_share_state() {
        let chain = SharedBlockchain::with_config(ChainConfig::default());
        chain.generate_genesis().unwrap();
        let other = chain.clone();

        other
            .transfer(Address::ROOT, Address::from_bytes([2u8; 20]), 500, 100, 0)
            .unwrap();
        chain.mine().unwrap();

        assert_eq!(other.height(), 1);
        assert_eq!(other.read(|c| c.mempool().len()), 0);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let chain = SharedBlockchain::new(Blockchain::with_genesis(ChainConfig::default()));
        let before = chain.snapshot();

        chain.mine().unwrap();

        assert_eq!(before.height(), 0);
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_concurrent_submissions_serialize() {
        let chain = SharedBlockchain::new(Blockchain::with_genesis(ChainConfig::default()));

        let workers: Vec<_> = (0..4u8)
            .map(|i| {
                let chain = chain.clone();
                thread::spawn(move || {
                    let to = Address::from_bytes([i + 10; 20]);
                    chain.transfer(Address::ROOT, to, 10, 100, 0)
                })
            })
            .collect();
        let accepted = workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .filter(Result::is_ok)
            .count();

        // Every submission sees nonce 0 and picks nonce 1.
        assert_eq!(accepted, 4);
        let block = chain.mine().unwrap();
        assert_eq!(block.tx_count(), 1);
        assert_eq!(chain.read(|c| c.mempool().len()), 0);
        assert_eq!(chain.stats().accounts, 2);
    }
}
