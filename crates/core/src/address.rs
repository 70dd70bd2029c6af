//! Account addresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of the textual form: `0x` + 40 hex digits.
pub const ADDRESS_LEN: usize = 42;

/// A 20-byte address.
pub type AddressBytes = [u8; 20];

/// Errors that can occur when parsing an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid address {0:?}: expected 0x followed by 40 hex digits")]
    InvalidAddress(String),
}

/// An account address on the ledger.
///
/// The textual form is always 42 characters. Parsing accepts either hex case;
/// rendering is lowercase, and fingerprints are computed over the rendering.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct Address(pub AddressBytes);

impl Address {
    /// The all-zero address, reserved for the root (genesis) account.
    pub const ROOT: Self = Self([0u8; 20]);

    /// Create an address from raw bytes.
    pub fn from_bytes(bytes: AddressBytes) -> Self {
        Self(bytes)
    }

    /// Generate a random address.
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &AddressBytes {
        &self.0
    }

    /// Whether this is the root account address.
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    /// Convert to a hex string (with 0x prefix).
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from a 42-character `0x`-prefixed hex string.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let invalid = || AddressError::InvalidAddress(s.to_string());
        if s.len() != ADDRESS_LEN {
            return Err(invalid());
        }
        let body = s.strip_prefix("0x").ok_or_else(invalid)?;
        let bytes = hex::decode(body).map_err(|_| invalid())?;
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Check whether a string is a well-formed address.
    pub fn is_valid(s: &str) -> bool {
        Self::from_hex(s).is_ok()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_hex()
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
