//! Main ledger orchestration.
//!
//! This module brings together the account table, the mempool and the block
//! list, and drives them through submission, proposal and block application.

use crate::config::ChainConfig;
use crate::mempool::{Mempool, MempoolError};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use simchain_consensus::{BlockValidator, TransactionValidator, ValidationError};
use simchain_core::{
    Account, AccountError, Address, Block, ErrorKind, Fingerprint, Transaction, TxLocation, TxRef,
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors returned by [`Blockchain::submit_transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("chain is not active")]
    NotActive,

    #[error("invalid transaction: {0}")]
    Invalid(#[from] ValidationError),

    #[error("mempool rejected transaction: {0}")]
    Mempool(#[from] MempoolError),
}

impl SubmitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmitError::NotActive => ErrorKind::State,
            SubmitError::Invalid(e) => e.kind(),
            SubmitError::Mempool(e) => e.kind(),
        }
    }
}

/// Errors returned by [`Blockchain::process_block`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("chain is not active")]
    NotActive,

    #[error("block does not extend the chain: {0}")]
    Linkage(ValidationError),

    #[error("malformed block: {0}")]
    Malformed(ValidationError),

    #[error("transaction {index} ({fingerprint}) failed re-validation: {source}")]
    InvalidTransaction {
        index: usize,
        fingerprint: Fingerprint,
        #[source]
        source: ValidationError,
    },

    #[error("dangling reference: {address} has no entry for {fingerprint}")]
    DanglingReference {
        address: Address,
        fingerprint: Fingerprint,
    },
}

impl BlockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockError::NotActive => ErrorKind::State,
            BlockError::Linkage(_)
            | BlockError::Malformed(_)
            | BlockError::InvalidTransaction { .. } => ErrorKind::Consistency,
            BlockError::DanglingReference { .. } => ErrorKind::DanglingReference,
        }
    }
}

/// Errors from lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("chain is already active")]
    AlreadyActive,
}

impl StateError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::State
    }
}

/// Lifecycle of a chain. `Initializing` moves to `Active` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStatus {
    Initializing,
    Active,
}

/// Starting point for a chain that does not begin at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Height of the anchor block.
    pub height: u64,
    /// Parent fingerprint recorded in the anchor block.
    pub fingerprint: Fingerprint,
    /// Opening balances. The root account is added if absent.
    #[serde(default)]
    pub accounts: BTreeMap<Address, u64>,
}

/// The ledger state machine.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// Configuration.
    config: ChainConfig,
    status: ChainStatus,
    /// Height of the last accepted block.
    height: u64,
    /// Fingerprint of the last accepted block, zero before activation.
    current_fingerprint: Fingerprint,
    /// Pending transactions.
    mempool: Mempool,
    /// Accepted blocks, oldest first. The first entry is genesis or a checkpoint anchor.
    blocks: Vec<Block>,
    accounts: BTreeMap<Address, Account>,
    /// Height of the first block. Per-block statistics at or below it read as zero.
    stats_base: u64,
    /// Mean transferred amount of each block above `stats_base`.
    block_averages: Vec<f64>,
    average_transacted: f64,
}

impl Blockchain {
    /// Create an uninitialized chain with the given configuration.
    pub fn new(config: ChainConfig) -> Self {
        let mempool = Mempool::with_config(config.mempool);
        Self {
            config,
            status: ChainStatus::Initializing,
            height: 0,
            current_fingerprint: Fingerprint::ZERO,
            mempool,
            blocks: Vec::new(),
            accounts: BTreeMap::new(),
            stats_base: 0,
            block_averages: Vec::new(),
            average_transacted: 0.0,
        }
    }

    /// Create a chain and generate its genesis block.
    pub fn with_genesis(config: ChainConfig) -> Self {
        let mut chain = Self::new(config);
        // A fresh chain is always initializing.
        let _ = chain.generate_genesis();
        chain
    }

    /// Create block 0, allocate the root account and activate the chain.
    pub fn generate_genesis(&mut self) -> Result<(), StateError> {
        self.ensure_initializing()?;

        let genesis = Block::genesis(self.config.genesis_parent);
        self.accounts.insert(
            Address::ROOT,
            Account::new(Address::ROOT, self.config.genesis_balance),
        );
        self.activate(genesis, 0);

        info!(
            fingerprint = %self.current_fingerprint,
            balance = self.config.genesis_balance,
            "genesis block generated"
        );
        Ok(())
    }

    /// Start the chain from a checkpoint instead of genesis.
    ///
    /// An anchor block at `checkpoint.height` becomes the tip, the opening
    /// balances are loaded and per-block statistics below it read as zero.
    /// A checkpoint at height 0 is genesis: its fingerprint and balances are
    /// ignored in favour of the configured genesis.
    pub fn bootstrap(&mut self, checkpoint: Checkpoint) -> Result<(), StateError> {
        self.ensure_initializing()?;

        if checkpoint.height == 0 {
            if !checkpoint.accounts.is_empty() {
                warn!(
                    accounts = checkpoint.accounts.len(),
                    "checkpoint at height 0 is genesis, ignoring its balances"
                );
            }
            return self.generate_genesis();
        }

        let anchor = Block::new(checkpoint.fingerprint, checkpoint.height);
        for (address, balance) in &checkpoint.accounts {
            self.accounts
                .insert(*address, Account::new(*address, *balance));
        }
        self.accounts
            .entry(Address::ROOT)
            .or_insert_with(|| Account::new(Address::ROOT, 0));
        self.activate(anchor, checkpoint.height);

        info!(
            height = self.height,
            fingerprint = %self.current_fingerprint,
            accounts = self.accounts.len(),
            "chain bootstrapped from checkpoint"
        );
        Ok(())
    }

    fn ensure_initializing(&self) -> Result<(), StateError> {
        if self.status != ChainStatus::Initializing {
            warn!("chain is not initializing, refusing to create a first block");
            return Err(StateError::AlreadyActive);
        }
        Ok(())
    }

    fn activate(&mut self, first: Block, height: u64) {
        self.height = height;
        self.current_fingerprint = first.fingerprint();
        self.blocks.push(first);
        self.stats_base = height;
        self.block_averages.clear();
        self.average_transacted = 0.0;
        self.status = ChainStatus::Active;
    }

    /// Validate a transaction and admit it to the mempool.
    ///
    /// The receiver account is created if needed and both parties record a
    /// back-reference to the pending copy. Nothing changes on failure.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<(), SubmitError> {
        if !self.is_active() {
            return Err(SubmitError::NotActive);
        }

        TransactionValidator::validate_tx(&tx, &self.accounts)?;
        self.mempool.add(tx.clone())?;

        if let Some(sender) = self.accounts.get_mut(tx.from()) {
            sender.attach(TxRef::new(&tx, tx.from(), TxLocation::Mempool));
        }
        let receiver = self
            .accounts
            .entry(*tx.to())
            .or_insert_with(|| Account::new(*tx.to(), 0));
        if !tx.is_self_transfer() {
            receiver.attach(TxRef::new(&tx, tx.to(), TxLocation::Mempool));
        }

        debug!(
            tx = %tx.fingerprint(),
            from = %tx.from(),
            to = %tx.to(),
            amount = tx.amount(),
            nonce = tx.nonce(),
            "transaction admitted"
        );
        Ok(())
    }

    /// Nonce the next transaction from `address` should carry.
    pub fn next_nonce(&self, address: &Address) -> u64 {
        match self.accounts.get(address) {
            Some(account) => account.next_nonce(),
            None => {
                warn!(%address, "sender does not exist");
                1
            }
        }
    }

    /// Build and submit a transfer. A nonce of 0 is replaced with the sender's next nonce.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: u64,
        fee: u64,
        nonce: u64,
    ) -> Result<Fingerprint, SubmitError> {
        let nonce = if nonce == 0 {
            self.next_nonce(&from)
        } else {
            nonce
        };
        let tx = Transaction::new(from, to, amount, fee, nonce);
        let fingerprint = tx.fingerprint();
        self.submit_transaction(tx)?;
        Ok(fingerprint)
    }

    /// Withdraw a pending transaction and forget its back-references.
    pub fn drop_pending(&mut self, fingerprint: &Fingerprint) -> Option<Transaction> {
        let tx = self.mempool.remove(fingerprint)?;
        detach_both(&mut self.accounts, &tx);
        collect_dormant(&mut self.accounts);
        debug!(tx = %fingerprint, "pending transaction dropped");
        Some(tx)
    }

    /// Assemble a candidate block from the mempool without changing any state.
    ///
    /// Transactions are tried in nonce order against a snapshot; those that do
    /// not apply are skipped and reported.
    pub fn propose_block(&self) -> Block {
        let Some(height) = self.height.checked_add(1) else {
            warn!(height = self.height, "no block can follow the tip, proposing an empty block");
            return Block::new(self.current_fingerprint, self.height);
        };
        let mut block = Block::new(self.current_fingerprint, height);

        if !self.is_active() {
            warn!("chain is not active, proposing an empty block");
            return block;
        }
        if self.mempool.is_empty() {
            info!(height, "mempool is empty, proposing an empty block");
            return block;
        }

        let mut snapshot = Snapshot::of(&self.accounts);
        for tx in self.mempool.by_nonce() {
            match snapshot.try_apply(tx) {
                // try_apply has already checked well-formedness.
                Ok(()) => {
                    let _ = block.add_tx(tx.clone());
                }
                Err(e) => warn!(tx = %tx.fingerprint(), error = %e, "transaction skipped"),
            }
        }

        debug!(
            height,
            included = block.tx_count(),
            pending = self.mempool.len(),
            "block proposed"
        );
        block
    }

    /// Validate `block` against the current state and, if it passes, apply it.
    ///
    /// The next state is computed on copies and committed at once, so a
    /// rejected block leaves the chain exactly as it was.
    pub fn process_block(&mut self, block: Block) -> Result<(), BlockError> {
        if !self.is_active() {
            warn!("chain is not active, block not processed");
            return Err(BlockError::NotActive);
        }

        if let Err(e) = BlockValidator::validate_block_extends_parent(
            &block,
            self.current_fingerprint,
            self.height,
        ) {
            warn!(height = block.height(), error = %e, "block not processed");
            return Err(BlockError::Linkage(e));
        }

        if let Err(e) = BlockValidator::validate_block_structure(&block) {
            warn!(height = block.height(), error = %e, "block not processed");
            return Err(BlockError::Malformed(e));
        }

        let mut snapshot = Snapshot::of(&self.accounts);
        for (index, tx) in block.transactions().iter().enumerate() {
            if let Err(source) = snapshot.try_apply(tx) {
                warn!(
                    height = block.height(),
                    index,
                    tx = %tx.fingerprint(),
                    error = %source,
                    "block contains invalid transactions"
                );
                return Err(BlockError::InvalidTransaction {
                    index,
                    fingerprint: tx.fingerprint(),
                    source,
                });
            }
        }

        let height = block.height();
        let mut accounts = self.accounts.clone();
        let mut mempool = self.mempool.clone();
        for (index, tx) in block.transactions().iter().enumerate() {
            apply_transaction(&mut accounts, &mut mempool, tx, height, index)?;
        }
        let pruned = prune_stale(&mut accounts, &mut mempool);
        collect_dormant(&mut accounts);

        self.accounts = accounts;
        self.mempool = mempool;
        self.block_averages.push(block.average_amount());
        self.height = height;
        // Heights 1..=stats_base count as zero-average blocks.
        self.average_transacted = self.block_averages.iter().sum::<f64>() / height as f64;
        self.current_fingerprint = block.fingerprint();

        info!(
            height,
            fingerprint = %self.current_fingerprint,
            transactions = block.tx_count(),
            pruned,
            "block applied"
        );
        self.blocks.push(block);
        Ok(())
    }

    /// Find a transaction in the mempool or in any accepted block.
    pub fn find_transaction(&self, fingerprint: &Fingerprint) -> Option<(&Transaction, TxLocation)> {
        if let Some(tx) = self.mempool.get(fingerprint) {
            return Some((tx, TxLocation::Mempool));
        }
        self.blocks.iter().rev().find_map(|block| {
            let index = block.position(fingerprint)?;
            let location = TxLocation::Block {
                height: block.height(),
                index,
            };
            Some((&block.transactions()[index], location))
        })
    }

    /// Dereference an account's back-reference.
    pub fn resolve(&self, tx_ref: &TxRef) -> Option<&Transaction> {
        let tx = match tx_ref.location {
            TxLocation::Mempool => self.mempool.get(&tx_ref.fingerprint)?,
            TxLocation::Block { height, index } => {
                self.block_at(height)?.transactions().get(index)?
            }
        };
        (tx.fingerprint() == tx_ref.fingerprint).then_some(tx)
    }

    /// Every transaction touching `address`, in nonce order.
    pub fn account_transactions(&self, address: &Address) -> Vec<&Transaction> {
        self.accounts
            .get(address)
            .map(|account| {
                account
                    .tx_refs()
                    .iter()
                    .filter_map(|r| self.resolve(r))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Block at a given height, if it is held.
    pub fn block_at(&self, height: u64) -> Option<&Block> {
        let base = self.blocks.first()?.height();
        let offset = height.checked_sub(base)?;
        self.blocks.get(usize::try_from(offset).ok()?)
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn status(&self) -> ChainStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ChainStatus::Active
    }

    /// Get the current chain height.
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn current_fingerprint(&self) -> Fingerprint {
        self.current_fingerprint
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> &BTreeMap<Address, Account> {
        &self.accounts
    }

    /// Mean transferred amount of each block above [`stats_base`](Self::stats_base).
    pub fn block_averages(&self) -> &[f64] {
        &self.block_averages
    }

    /// Height of the genesis or checkpoint anchor block.
    pub fn stats_base(&self) -> u64 {
        self.stats_base
    }

    /// Mean of the per-block averages over every height above 0.
    pub fn average_transacted(&self) -> f64 {
        self.average_transacted
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> u128 {
        self.accounts
            .values()
            .map(|account| u128::from(account.balance()))
            .sum()
    }

    /// Get chain statistics.
    pub fn stats(&self) -> ChainStats {
        let skip = self.block_averages.len().saturating_sub(3);
        ChainStats {
            height: self.height,
            current_fingerprint: self.current_fingerprint,
            status: self.status,
            pending_transactions: self.mempool.len(),
            accounts: self.accounts.len(),
            blocks: self.blocks.len(),
            average_transacted: self.average_transacted,
            recent_averages: self.block_averages[skip..].to_vec(),
        }
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

/// Chain statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStats {
    /// Current chain height.
    pub height: u64,
    pub current_fingerprint: Fingerprint,
    pub status: ChainStatus,
    /// Number of transactions in the mempool.
    pub pending_transactions: usize,
    pub accounts: usize,
    pub blocks: usize,
    pub average_transacted: f64,
    /// Per-block averages of the last three blocks, oldest first.
    pub recent_averages: Vec<f64>,
}

/// Debit, credit and re-point back-references for one included transaction.
fn apply_transaction(
    accounts: &mut BTreeMap<Address, Account>,
    mempool: &mut Mempool,
    tx: &Transaction,
    height: u64,
    index: usize,
) -> Result<(), BlockError> {
    let fingerprint = tx.fingerprint();
    let location = TxLocation::Block { height, index };
    let pending = mempool.contains(&fingerprint);
    let invalid = |source| BlockError::InvalidTransaction {
        index,
        fingerprint,
        source,
    };

    let cost = tx.total_cost().ok_or_else(|| {
        invalid(ValidationError::AmountOverflow {
            amount: tx.amount(),
            fee: tx.fee(),
        })
    })?;

    let sender = accounts
        .get_mut(tx.from())
        .ok_or_else(|| invalid(ValidationError::UnknownSender(*tx.from())))?;
    sender
        .debit(cost)
        .map_err(|e| account_fault(e, index, fingerprint))?;
    sender.advance_nonce();
    relink(sender, tx, location, pending).map_err(|e| account_fault(e, index, fingerprint))?;

    let receiver = accounts
        .entry(*tx.to())
        .or_insert_with(|| Account::new(*tx.to(), 0));
    receiver
        .credit(tx.amount())
        .map_err(|e| account_fault(e, index, fingerprint))?;
    if !tx.is_self_transfer() {
        relink(receiver, tx, location, pending)
            .map_err(|e| account_fault(e, index, fingerprint))?;
    }

    if pending {
        mempool.remove(&fingerprint);
    }
    Ok(())
}

/// Point `account` at the block-resident copy of `tx`.
fn relink(
    account: &mut Account,
    tx: &Transaction,
    location: TxLocation,
    pending: bool,
) -> Result<(), AccountError> {
    let tx_ref = TxRef::new(tx, account.address(), location);
    if pending {
        account.retarget(&tx.fingerprint(), tx_ref)
    } else {
        // Included without passing through this mempool.
        account.attach(tx_ref);
        Ok(())
    }
}

fn account_fault(err: AccountError, index: usize, fingerprint: Fingerprint) -> BlockError {
    match err {
        AccountError::InsufficientFunds {
            required,
            available,
        } => BlockError::InvalidTransaction {
            index,
            fingerprint,
            source: ValidationError::InsufficientBalance {
                required,
                available,
            },
        },
        AccountError::BalanceOverflow {
            address,
            balance,
            amount,
        } => BlockError::InvalidTransaction {
            index,
            fingerprint,
            source: ValidationError::BalanceOverflow {
                address,
                balance,
                amount,
            },
        },
        AccountError::DanglingReference {
            address,
            fingerprint,
        } => {
            error!(
                %address,
                tx = %fingerprint,
                "back-reference missing while applying block, state left unchanged"
            );
            BlockError::DanglingReference {
                address,
                fingerprint,
            }
        }
    }
}

/// Drop pending transactions whose nonce the sender has already used.
fn prune_stale(accounts: &mut BTreeMap<Address, Account>, mempool: &mut Mempool) -> usize {
    let stale: Vec<Fingerprint> = mempool
        .iter()
        .filter(|tx| {
            accounts
                .get(tx.from())
                .is_some_and(|sender| tx.nonce() <= sender.nonce())
        })
        .map(|tx| tx.fingerprint())
        .collect();

    for fingerprint in &stale {
        if let Some(tx) = mempool.remove(fingerprint) {
            debug!(tx = %fingerprint, nonce = tx.nonce(), "pruning stale transaction");
            detach_both(accounts, &tx);
        }
    }
    stale.len()
}

fn detach_both(accounts: &mut BTreeMap<Address, Account>, tx: &Transaction) {
    let fingerprint = tx.fingerprint();
    if let Some(sender) = accounts.get_mut(tx.from()) {
        sender.detach(&fingerprint);
    }
    if !tx.is_self_transfer() {
        if let Some(receiver) = accounts.get_mut(tx.to()) {
            receiver.detach(&fingerprint);
        }
    }
}

/// Remove accounts nothing refers to. Root and funded accounts stay.
fn collect_dormant(accounts: &mut BTreeMap<Address, Account>) {
    accounts.retain(|address, account| {
        address.is_root() || !account.is_dormant() || account.balance() > 0
    });
}
