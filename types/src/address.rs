//! Chain-native account address type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An account address in its chain-native string form.
///
/// Addresses are opaque to the pipeline: a hex `0x…` address, a base58
/// Solana key, and a `tz1…` Tezos address are all carried verbatim. The
/// per-chain verifier is the only component that interprets the encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Longest address string accepted from the wire.
    pub const MAX_LEN: usize = 128;

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address is plausibly well-formed: non-empty, bounded
    /// length, printable ASCII. Chain-specific validation happens in the
    /// verifier for that chain.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= Self::MAX_LEN
            && self.0.bytes().all(|b| (0x21..=0x7e).contains(&b))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_addresses() {
        assert!(Address::new("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_valid());
        assert!(Address::new("tz1VSUr8wwNhLAzempoch5d6hLRiTh8Cjcjb").is_valid());
        assert!(Address::new("4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T").is_valid());
    }

    #[test]
    fn empty_address_invalid() {
        assert!(!Address::new("").is_valid());
    }

    #[test]
    fn whitespace_invalid() {
        assert!(!Address::new("0xabc def").is_valid());
    }

    #[test]
    fn overlong_invalid() {
        assert!(!Address::new("a".repeat(200)).is_valid());
    }
}
