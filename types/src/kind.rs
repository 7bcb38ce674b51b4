//! Message and item type enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The application-level type of a message, selecting which applier
/// transition runs on admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    /// User content: created once, amendable via `ref`.
    Post,
    /// Key/value document deep-merged per owner and key.
    Aggregate,
    /// File pin for content-addressed data.
    Store,
    /// Marks earlier messages unusable and schedules their content for deletion.
    Forget,
    /// Compute-resource deployment.
    Resource,
}

impl MessageType {
    pub const ALL: [MessageType; 5] = [
        MessageType::Post,
        MessageType::Aggregate,
        MessageType::Store,
        MessageType::Forget,
        MessageType::Resource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Post => "POST",
            MessageType::Aggregate => "AGGREGATE",
            MessageType::Store => "STORE",
            MessageType::Forget => "FORGET",
            MessageType::Resource => "RESOURCE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a message's content lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Content serialized directly into the envelope.
    Inline,
    /// Content fetched from native storage by its sha256 hex hash.
    Storage,
    /// Content fetched from the legacy network by CIDv0.
    Ipfs,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Inline => "inline",
            ItemType::Storage => "storage",
            ItemType::Ipfs => "ipfs",
        }
    }

    /// Whether the content must be fetched through the storage collaborator.
    pub fn requires_fetch(&self) -> bool {
        !matches!(self, ItemType::Inline)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
