//! Error classification shared by every crate in the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category of a ledger error.
///
/// Each concrete error enum exposes a `kind()` method mapping onto this, so a
/// front end can decide whether to retry, prompt or abandon without matching
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed transaction, address or numeric field. Fix the input and resubmit.
    Validation,
    /// Mempool full. Wait or raise the fee.
    Capacity,
    /// Block height/parent mismatch or failed re-validation. Discard and re-propose.
    Consistency,
    /// Mempool merge/subtract with mismatched parameters. The operation is refused.
    PoolIncompatibility,
    /// A back-reference had no matching entry. Internal invariant violation.
    DanglingReference,
    /// Operation not permitted in the current chain status.
    State,
}

impl ErrorKind {
    /// Whether the caller can recover by changing its input or waiting.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ErrorKind::DanglingReference)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Capacity => "capacity",
            ErrorKind::Consistency => "consistency",
            ErrorKind::PoolIncompatibility => "pool incompatibility",
            ErrorKind::DanglingReference => "dangling reference",
            ErrorKind::State => "state",
        };
        f.write_str(name)
    }
}
