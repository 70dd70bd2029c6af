//! Validation rules for simchain.
//!
//! This crate provides the checks every transaction and block must pass
//! before the ledger touches its state:
//! - Transaction validation (well-formedness, sender, balance, nonce)
//! - Block validation (fingerprint, duplicates, height and parent links)
//!
//! # Example
//!
//! ```rust,no_run
//! use simchain_consensus::{AccountState, BlockValidator, TransactionValidator};
//! use simchain_core::{Address, Block, Fingerprint, Transaction};
//! use std::collections::BTreeMap;
//!
//! let mut accounts = BTreeMap::new();
//! accounts.insert(Address::ROOT, AccountState { balance: 1_000, nonce: 0 });
//!
//! let tx = Transaction::new(Address::ROOT, Address::random(), 500, 100, 1);
//! TransactionValidator::validate_tx(&tx, &accounts).unwrap();
//!
//! let parent = Fingerprint(0xdeadbeef);
//! let block = Block::propose(parent, 1, vec![tx]);
//! BlockValidator::validate_full(&block, parent, 0).unwrap();
//! ```

pub mod validator;

// Re-export commonly used types
pub use validator::{
    AccountLookup, AccountState, BlockValidator, Result, TransactionValidator, ValidationError,
};
