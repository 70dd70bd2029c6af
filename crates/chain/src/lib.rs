//! Ledger orchestration for simchain.
//!
//! This crate brings together all components to run the ledger state machine:
//! - **Mempool**: bounded, fee-filtered pool of pending transactions
//! - **Snapshot**: speculative account projection for proposal and validation
//! - **Blockchain**: submission, proposal and block application
//! - **Shared**: thread-safe handle serializing every mutation
//!
//! # Example
//!
//! ```rust,no_run
//! use simchain_chain::{Blockchain, ChainConfig};
//! use simchain_core::Address;
//!
//! // Create the chain and its root account
//! let mut chain = Blockchain::new(ChainConfig::default());
//! chain.generate_genesis().unwrap();
//!
//! // Submit a transfer; nonce 0 picks the sender's next nonce
//! let receiver = Address::random();
//! chain.transfer(Address::ROOT, receiver, 500, 100, 0).unwrap();
//!
//! // Propose a block from the mempool and apply it
//! let block = chain.propose_block();
//! chain.process_block(block).unwrap();
//!
//! assert_eq!(chain.height(), 1);
//! assert_eq!(chain.account(&receiver).unwrap().balance(), 500);
//! ```

pub mod blockchain;
pub mod config;
pub mod mempool;
pub mod shared;
pub mod snapshot;

// Re-export commonly used types
pub use blockchain::{
    BlockError, Blockchain, ChainStats, ChainStatus, Checkpoint, StateError, SubmitError,
};
pub use config::{ChainConfig, ConfigError};
pub use mempool::{Mempool, MempoolConfig, MempoolError, MempoolStats};
pub use shared::SharedBlockchain;
pub use snapshot::Snapshot;
