//! Scripted scenarios for `simchain run`.
//!
//! A scenario is a JSON document listing steps to replay against a fresh
//! ledger:
//!
//! ```json
//! {
//!   "steps": [
//!     { "transfer": { "from": "root", "amount": 500, "fee": 100 } },
//!     "mine",
//!     { "drop": "0x00000000000000ab" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use simchain_chain::{Blockchain, Checkpoint, SubmitError};
use simchain_core::{Address, Fingerprint};
use std::path::Path;
use tracing::debug;

fn default_fee() -> u64 {
    100
}

/// A transfer to submit. `from` and `to` accept `"root"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStep {
    pub from: String,
    /// A random address when absent.
    #[serde(default)]
    pub to: Option<String>,
    pub amount: u64,
    #[serde(default = "default_fee")]
    pub fee: u64,
    /// 0 picks the sender's next nonce.
    #[serde(default)]
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Transfer(TransferStep),
    Mine,
    Drop(Fingerprint),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Start from a checkpoint instead of genesis.
    #[serde(default)]
    pub checkpoint: Option<Checkpoint>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// What a single step did.
#[derive(Debug)]
pub enum StepOutcome {
    Submitted {
        fingerprint: Fingerprint,
        to: Address,
    },
    Rejected(SubmitError),
    Mined {
        height: u64,
        fingerprint: Fingerprint,
        transactions: usize,
    },
    Dropped(Fingerprint),
    NotPending(Fingerprint),
}

/// Parse `"root"` (any case) or a hex address.
pub fn parse_party(party: &str) -> Result<Address> {
    if party.eq_ignore_ascii_case("root") {
        return Ok(Address::ROOT);
    }
    Address::from_hex(party).with_context(|| format!("Invalid address: {}", party))
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        let scenario: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scenario: {}", path.display()))?;
        debug!(
            steps = scenario.steps.len(),
            checkpoint = scenario.checkpoint.is_some(),
            "Loaded scenario"
        );
        Ok(scenario)
    }

    /// Create the first block: genesis, or the checkpoint anchor.
    pub fn start(&self, chain: &mut Blockchain) -> Result<()> {
        match &self.checkpoint {
            Some(checkpoint) => chain
                .bootstrap(checkpoint.clone())
                .context("Failed to bootstrap from checkpoint"),
            None => chain
                .generate_genesis()
                .context("Failed to generate genesis block"),
        }
    }
}

impl Step {
    /// Apply one step. Rejected submissions are outcomes, not errors.
    pub fn apply(&self, chain: &mut Blockchain) -> Result<StepOutcome> {
        match self {
            Step::Transfer(step) => {
                let from = parse_party(&step.from)?;
                let to = match &step.to {
                    Some(to) => parse_party(to)?,
                    None => Address::random(),
                };
                Ok(
                    match chain.transfer(from, to, step.amount, step.fee, step.nonce) {
                        Ok(fingerprint) => StepOutcome::Submitted { fingerprint, to },
                        Err(e) => StepOutcome::Rejected(e),
                    },
                )
            }
            Step::Mine => {
                let block = chain.propose_block();
                let (height, fingerprint, transactions) =
                    (block.height(), block.fingerprint(), block.tx_count());
                chain
                    .process_block(block)
                    .with_context(|| format!("Failed to apply block {}", height))?;
                Ok(StepOutcome::Mined {
                    height,
                    fingerprint,
                    transactions,
                })
            }
            Step::Drop(fingerprint) => Ok(match chain.drop_pending(fingerprint) {
                Some(_) => StepOutcome::Dropped(*fingerprint),
                None => StepOutcome::NotPending(*fingerprint),
            }),
        }
    }
}
