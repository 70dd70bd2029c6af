//! Transaction and block validation rules.
//!
//! Validation never mutates anything. Account state is read through the
//! [`AccountLookup`] trait so the same rules run against the authoritative
//! account table and against a speculative snapshot.

use simchain_core::{Account, Address, Block, ErrorKind, Fingerprint, Transaction};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors that can occur during validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transaction {0} is not well-formed")]
    NotWellFormed(Fingerprint),

    #[error("unknown sender {0}")]
    UnknownSender(Address),

    #[error("amount {amount} plus fee {fee} overflows")]
    AmountOverflow { amount: u64, fee: u64 },

    #[error("insufficient balance (required {required}, available {available})")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("crediting {amount} to {address} (balance {balance}) overflows")]
    BalanceOverflow {
        address: Address,
        balance: u64,
        amount: u64,
    },

    #[error("transaction nonce mismatch (expected {expected}, got {got})")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("no block can follow height {0}")]
    HeightOverflow(u64),

    #[error("block height mismatch (expected {expected}, got {got})")]
    InvalidHeight { expected: u64, got: u64 },

    #[error("block parent mismatch (expected {expected}, got {got})")]
    InvalidParent {
        expected: Fingerprint,
        got: Fingerprint,
    },

    #[error("block fingerprint mismatch (stored {supplied}, computed {computed})")]
    FingerprintMismatch {
        supplied: Fingerprint,
        computed: Fingerprint,
    },

    #[error("duplicate transaction {0} in block")]
    DuplicateTransaction(Fingerprint),
}

impl ValidationError {
    /// Transaction-level failures are `Validation`; block-level ones are `Consistency`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::NotWellFormed(_)
            | ValidationError::UnknownSender(_)
            | ValidationError::AmountOverflow { .. }
            | ValidationError::InsufficientBalance { .. }
            | ValidationError::BalanceOverflow { .. }
            | ValidationError::InvalidNonce { .. } => ErrorKind::Validation,
            ValidationError::HeightOverflow(_)
            | ValidationError::InvalidHeight { .. }
            | ValidationError::InvalidParent { .. }
            | ValidationError::FingerprintMismatch { .. }
            | ValidationError::DuplicateTransaction(_) => ErrorKind::Consistency,
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// The parts of an account that validation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountState {
    pub balance: u64,
    pub nonce: u64,
}

impl From<&Account> for AccountState {
    fn from(account: &Account) -> Self {
        Self {
            balance: account.balance(),
            nonce: account.nonce(),
        }
    }
}

/// Read access to account state.
pub trait AccountLookup {
    fn account_state(&self, address: &Address) -> Option<AccountState>;
}

impl AccountLookup for BTreeMap<Address, Account> {
    fn account_state(&self, address: &Address) -> Option<AccountState> {
        self.get(address).map(AccountState::from)
    }
}

impl AccountLookup for BTreeMap<Address, AccountState> {
    fn account_state(&self, address: &Address) -> Option<AccountState> {
        self.get(address).copied()
    }
}

/// Transaction validator.
pub struct TransactionValidator;

impl TransactionValidator {
    /// Syntactic validation, independent of account state.
    pub fn validate_transaction(tx: &Transaction) -> Result<()> {
        if !tx.is_well_formed() {
            return Err(ValidationError::NotWellFormed(tx.fingerprint()));
        }
        Ok(())
    }

    /// Validate a transaction against the sender's balance and applied-send count.
    ///
    /// The nonce must be exactly one past `sender_nonce`. A nonce of 0 is
    /// never valid here; auto-assignment happens before submission.
    pub fn validate_against_state(
        tx: &Transaction,
        sender_nonce: u64,
        sender_balance: u64,
    ) -> Result<()> {
        let cost = tx.total_cost().ok_or(ValidationError::AmountOverflow {
            amount: tx.amount(),
            fee: tx.fee(),
        })?;

        if sender_balance < cost {
            return Err(ValidationError::InsufficientBalance {
                required: cost,
                available: sender_balance,
            });
        }

        let expected = sender_nonce.saturating_add(1);
        if tx.nonce() != expected {
            return Err(ValidationError::InvalidNonce {
                expected,
                got: tx.nonce(),
            });
        }

        Ok(())
    }

    /// Full transaction validation against a set of accounts.
    pub fn validate_tx(tx: &Transaction, accounts: &impl AccountLookup) -> Result<()> {
        Self::validate_transaction(tx)?;
        let sender = accounts
            .account_state(tx.from())
            .ok_or(ValidationError::UnknownSender(*tx.from()))?;
        Self::validate_against_state(tx, sender.nonce, sender.balance)
    }
}

/// Block validator.
pub struct BlockValidator;

impl BlockValidator {
    /// Validate block structure and contents.
    pub fn validate_block_structure(block: &Block) -> Result<()> {
        let computed = block.recompute_fingerprint();
        if computed != block.fingerprint() {
            return Err(ValidationError::FingerprintMismatch {
                supplied: block.fingerprint(),
                computed,
            });
        }

        let mut seen = HashSet::new();
        for tx in block.transactions() {
            if !seen.insert(tx.fingerprint()) {
                return Err(ValidationError::DuplicateTransaction(tx.fingerprint()));
            }
            TransactionValidator::validate_transaction(tx)?;
        }

        Ok(())
    }

    /// Validate block extends the parent correctly. Height is checked first.
    pub fn validate_block_extends_parent(
        block: &Block,
        parent_fingerprint: Fingerprint,
        parent_height: u64,
    ) -> Result<()> {
        let expected = parent_height
            .checked_add(1)
            .ok_or(ValidationError::HeightOverflow(parent_height))?;
        if block.height() != expected {
            return Err(ValidationError::InvalidHeight {
                expected,
                got: block.height(),
            });
        }

        if block.parent_fingerprint() != parent_fingerprint {
            return Err(ValidationError::InvalidParent {
                expected: parent_fingerprint,
                got: block.parent_fingerprint(),
            });
        }

        Ok(())
    }

    /// Linkage then structure. State-dependent checks are the ledger's job.
    pub fn validate_full(
        block: &Block,
        parent_fingerprint: Fingerprint,
        parent_height: u64,
    ) -> Result<()> {
        Self::validate_block_extends_parent(block, parent_fingerprint, parent_height)?;
        Self::validate_block_structure(block)?;
        Ok(())
    }
}
