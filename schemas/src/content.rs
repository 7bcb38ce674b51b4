//! Typed content payloads behind a message envelope.
//!
//! Every content document declares the `address` it acts for (the owner,
//! which may differ from the envelope sender under a delegation grant) and
//! its own `time`. The rest of the shape depends on the message type.

use ccn_types::{Address, ItemHash, ItemType, MessageType, PaymentType};
use serde::{Deserialize, Serialize};

use crate::envelope::FormatError;

/// POST content: free-form document, amendable via `ref`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    pub address: Address,
    pub time: f64,
    /// Application-defined post type ("blog", "comment", …). An amend uses
    /// the reserved type `"amend"` with `ref` set to the original's hash.
    #[serde(rename = "type")]
    pub post_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
    /// Hash of the post this one amends, if any.
    #[serde(rename = "ref", default)]
    pub ref_hash: Option<ItemHash>,
}

impl PostContent {
    pub fn is_amend(&self) -> bool {
        self.post_type == "amend" && self.ref_hash.is_some()
    }
}

/// AGGREGATE content: a keyed document deep-merged into the owner's
/// aggregate under `key`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateContent {
    pub address: Address,
    pub time: f64,
    pub key: String,
    pub content: serde_json::Value,
}

/// STORE content: pins a file by its content hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreContent {
    pub address: Address,
    pub time: f64,
    pub item_type: ItemType,
    /// Hash of the pinned file (not of this content document).
    pub item_hash: ItemHash,
    /// Size in bytes, when the uploader knows it; otherwise sized from the
    /// fetched content.
    #[serde(default)]
    pub size: Option<u64>,
}

/// FORGET content: marks earlier messages unusable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForgetContent {
    pub address: Address,
    pub time: f64,
    pub hashes: Vec<ItemHash>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// RESOURCE content: a compute deployment with a payment model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceContent {
    pub address: Address,
    pub time: f64,
    #[serde(default)]
    pub name: Option<String>,
    pub resources: ComputeUnits,
    #[serde(default)]
    pub payment: PaymentType,
    /// Root filesystem volume, pinned like a STORE item.
    #[serde(default)]
    pub rootfs: Option<ItemHash>,
}

/// Declared compute requirements for a resource deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeUnits {
    pub vcpus: u32,
    pub memory_mib: u32,
}

impl ComputeUnits {
    /// Compute units for pricing: one unit per vcpu, plus one per 2 GiB of
    /// memory (rounded up).
    pub fn units(&self) -> u64 {
        let mem_units = (u64::from(self.memory_mib) + 2047) / 2048;
        u64::from(self.vcpus) + mem_units
    }
}

/// Parsed content of a candidate message, dispatched by message type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MessageContent {
    Post(PostContent),
    Aggregate(AggregateContent),
    Store(StoreContent),
    Forget(ForgetContent),
    Resource(ResourceContent),
}

impl MessageContent {
    /// Decode raw content bytes according to the envelope's message type.
    pub fn parse(message_type: MessageType, bytes: &[u8]) -> Result<Self, FormatError> {
        let text = std::str::from_utf8(bytes).map_err(|_| FormatError::Utf8)?;
        let json = |e: serde_json::Error| FormatError::Json(e.to_string());
        let content = match message_type {
            MessageType::Post => MessageContent::Post(serde_json::from_str(text).map_err(json)?),
            MessageType::Aggregate => {
                MessageContent::Aggregate(serde_json::from_str(text).map_err(json)?)
            }
            MessageType::Store => MessageContent::Store(serde_json::from_str(text).map_err(json)?),
            MessageType::Forget => {
                MessageContent::Forget(serde_json::from_str(text).map_err(json)?)
            }
            MessageType::Resource => {
                MessageContent::Resource(serde_json::from_str(text).map_err(json)?)
            }
        };
        Ok(content)
    }

    /// The address this content acts for (the message owner).
    pub fn address(&self) -> &Address {
        match self {
            MessageContent::Post(c) => &c.address,
            MessageContent::Aggregate(c) => &c.address,
            MessageContent::Store(c) => &c.address,
            MessageContent::Forget(c) => &c.address,
            MessageContent::Resource(c) => &c.address,
        }
    }

    /// The payment type driving cost rows, where the content declares one.
    pub fn payment_type(&self) -> PaymentType {
        match self {
            MessageContent::Resource(c) => c.payment,
            _ => PaymentType::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_content_parses() {
        let raw = br#"{"address":"0xabc","time":1700000000.0,"type":"blog","content":{"body":"hi"}}"#;
        let MessageContent::Post(post) = MessageContent::parse(MessageType::Post, raw).unwrap()
        else {
            panic!("expected post");
        };
        assert_eq!(post.post_type, "blog");
        assert!(!post.is_amend());
    }

    #[test]
    fn amend_post_detected() {
        let raw = br#"{"address":"0xabc","time":1700000001.0,"type":"amend","content":{},
            "ref":"9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44"}"#;
        let MessageContent::Post(post) = MessageContent::parse(MessageType::Post, raw).unwrap()
        else {
            panic!("expected post");
        };
        assert!(post.is_amend());
    }

    #[test]
    fn aggregate_content_parses() {
        let raw = br#"{"address":"0xabc","time":1.0,"key":"profile","content":{"name":"n"}}"#;
        let content = MessageContent::parse(MessageType::Aggregate, raw).unwrap();
        assert_eq!(content.address().as_str(), "0xabc");
    }

    #[test]
    fn store_content_parses() {
        let raw = br#"{"address":"0xabc","time":1.0,"item_type":"storage",
            "item_hash":"9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44","size":2048}"#;
        let MessageContent::Store(store) = MessageContent::parse(MessageType::Store, raw).unwrap()
        else {
            panic!("expected store");
        };
        assert_eq!(store.size, Some(2048));
    }

    #[test]
    fn resource_payment_type_flows_through() {
        let raw = br#"{"address":"0xabc","time":1.0,"resources":{"vcpus":2,"memory_mib":4096},
            "payment":"credit"}"#;
        let content = MessageContent::parse(MessageType::Resource, raw).unwrap();
        assert_eq!(content.payment_type(), PaymentType::Credit);
    }

    #[test]
    fn compute_units_round_up_memory() {
        let units = ComputeUnits { vcpus: 2, memory_mib: 3000 };
        // 2 vcpus + ceil(3000 / 2048) = 2 + 2
        assert_eq!(units.units(), 4);
    }

    #[test]
    fn wrong_shape_is_format_error() {
        let raw = br#"{"address":"0xabc"}"#;
        assert!(MessageContent::parse(MessageType::Aggregate, raw).is_err());
    }
}
