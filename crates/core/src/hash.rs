//! Fingerprint function: deterministic 64-bit mixing of integer-coded inputs.
//!
//! This is a content identifier and chain-link, not a cryptographic hash.
//! Every input word goes through the same fixed number of shift/xor/add
//! rounds, so the result depends on both the values and their order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Mixing rounds applied per input word.
const ROUNDS: usize = 11;

/// Odd constant added to every word for dispersion (2^64 / golden ratio).
const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Errors produced when parsing or checking fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FingerprintError {
    #[error("invalid fingerprint {0:?}: expected 0x followed by 1-16 hex digits")]
    InvalidFormat(String),

    #[error("fingerprint mismatch (supplied {supplied}, computed {computed})")]
    Mismatch {
        supplied: Fingerprint,
        computed: Fingerprint,
    },
}

/// A 64-bit content fingerprint, rendered as `0x` + 16 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// The zero fingerprint.
    pub const ZERO: Self = Self(0);

    /// Get the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Render as a hex string with the `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{:016x}", self.0)
    }

    /// Parse from a `0x`-prefixed hex string of 1 to 16 digits.
    pub fn from_hex(s: &str) -> Result<Self, FingerprintError> {
        let invalid = || FingerprintError::InvalidFormat(s.to_string());
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(invalid)?;
        if digits.is_empty() || digits.len() > 16 || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(invalid());
        }
        u64::from_str_radix(digits, 16).map(Self).map_err(|_| invalid())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<u64> for Fingerprint {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// Incremental fingerprint builder.
///
/// Words are absorbed in call order; bytes are absorbed one word per byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hasher {
    state: u64,
}

impl Hasher {
    /// Start from a zero accumulator.
    pub const fn new() -> Self {
        Self { state: 0 }
    }

    /// Start from a fixed seed.
    pub const fn with_seed(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Absorb one integer-coded input.
    pub fn update(&mut self, word: u64) -> &mut Self {
        mix(&mut self.state, word);
        self
    }

    /// Absorb every byte of `bytes` as its own word.
    pub fn update_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        for byte in bytes {
            mix(&mut self.state, u64::from(*byte));
        }
        self
    }

    /// Current value of the accumulator.
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.state)
    }
}

fn mix(h: &mut u64, word: u64) {
    for _ in 0..ROUNDS {
        *h ^= word
            .wrapping_add(GOLDEN_GAMMA)
            .wrapping_add(*h << 6)
            .wrapping_add(*h >> 2);
        *h = h.wrapping_add(*h << 3);
        *h ^= h.rotate_right(11);
        *h = h.wrapping_add(*h << 15);
    }
}

/// Fingerprint a sequence of words from a zero accumulator.
pub fn fingerprint(words: &[u64]) -> Fingerprint {
    let mut hasher = Hasher::new();
    for word in words {
        hasher.update(*word);
    }
    hasher.finish()
}
