//! Core ledger primitives for simchain.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - The fingerprint function and its 64-bit identifiers
//! - Account addresses
//! - Transactions
//! - Accounts and their transaction back-references
//! - Blocks
//! - The shared error taxonomy

pub mod account;
pub mod address;
pub mod block;
pub mod error;
pub mod hash;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use account::{Account, AccountError, TxLocation, TxRef};
pub use address::{Address, AddressError, ADDRESS_LEN};
pub use block::{Block, BlockRecord};
pub use error::ErrorKind;
pub use hash::{fingerprint, Fingerprint, FingerprintError, Hasher};
pub use transaction::{Transaction, TransactionError, TransactionRecord};
