//! Content-addressed item hashes and on-chain transaction hashes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an item hash addresses its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemHashKind {
    /// 64-character lowercase hex sha256 digest — native content storage.
    Storage,
    /// 46-character base58 CIDv0 (`Qm…`) — legacy network-addressed content.
    Ipfs,
}

/// The primary identity of a message: a content digest of its canonical
/// serialized content.
///
/// The same hash string addresses the content in the storage collaborator,
/// so an `ItemHash` doubles as a content reference.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemHash(String);

impl ItemHash {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the hash by shape, rejecting anything that is neither a
    /// sha256 hex digest nor a legacy CIDv0.
    pub fn kind(&self) -> Option<ItemHashKind> {
        let s = self.0.as_str();
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Some(ItemHashKind::Storage);
        }
        if s.len() == 46 && s.starts_with("Qm") && s.bytes().all(is_base58) {
            return Some(ItemHashKind::Ipfs);
        }
        None
    }

    pub fn is_valid(&self) -> bool {
        self.kind().is_some()
    }
}

fn is_base58(b: u8) -> bool {
    b.is_ascii_alphanumeric() && !matches!(b, b'0' | b'O' | b'I' | b'l')
}

impl fmt::Debug for ItemHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..12).unwrap_or(&self.0);
        write!(f, "ItemHash({short}…)")
    }
}

impl fmt::Display for ItemHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An on-chain transaction hash, carried verbatim in its chain-native
/// encoding (hex for hex chains, base58 elsewhere).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..12).unwrap_or(&self.0);
        write!(f, "TxHash({short}…)")
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TxHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORAGE_HASH: &str = "9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44";
    const IPFS_HASH: &str = "QmPZrB5SbcJSjemgFBBBnbyYmfK3NmLu43RP9TdPJ3xxJz";

    #[test]
    fn storage_hash_classified() {
        assert_eq!(ItemHash::from(STORAGE_HASH).kind(), Some(ItemHashKind::Storage));
    }

    #[test]
    fn ipfs_hash_classified() {
        assert_eq!(ItemHash::from(IPFS_HASH).kind(), Some(ItemHashKind::Ipfs));
    }

    #[test]
    fn uppercase_hex_rejected() {
        let upper = STORAGE_HASH.to_uppercase();
        assert_eq!(ItemHash::new(upper).kind(), None);
    }

    #[test]
    fn wrong_length_rejected() {
        assert_eq!(ItemHash::from("abc123").kind(), None);
        assert_eq!(ItemHash::new(&STORAGE_HASH[..63]).kind(), None);
    }

    #[test]
    fn base58_excludes_ambiguous_chars() {
        // 'l' and '0' never appear in base58
        let bad = format!("Qm{}", "l".repeat(44));
        assert_eq!(ItemHash::new(bad).kind(), None);
    }
}
