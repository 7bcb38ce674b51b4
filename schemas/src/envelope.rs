//! Candidate-message envelope decoding.
//!
//! Gossip delivers opaque byte payloads; chain expansion yields JSON values.
//! Both funnel through [`parse_envelope`] / [`CandidateMessage::from_value`],
//! which validate the envelope shape before anything else looks at it.

use ccn_types::{Address, Chain, ErrorCode, ItemHash, ItemHashKind, ItemType, MessageType, Timestamp};
use serde::{Deserialize, Serialize};

/// An unverified message as received from gossip or chain-tx expansion.
///
/// `item_hash` is the content digest of the canonical serialized content and
/// the message's primary identity across all sources. Immutable once admitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMessage {
    pub item_hash: ItemHash,
    pub sender: Address,
    pub chain: Chain,
    pub message_type: MessageType,
    pub signature: String,
    pub item_type: ItemType,
    /// Present iff `item_type` is inline.
    pub item_content: Option<String>,
    pub time: Timestamp,
    pub channel: Option<String>,
}

impl CandidateMessage {
    /// The canonical buffer every chain verifier authenticates:
    /// `chain\nsender\ntype\nitem_hash`, UTF-8 encoded.
    pub fn verification_buffer(&self) -> Vec<u8> {
        format!(
            "{}\n{}\n{}\n{}",
            self.chain,
            self.sender,
            self.message_type,
            self.item_hash
        )
        .into_bytes()
    }

    /// Decode a candidate from an already-parsed JSON value (chain-tx
    /// expansion path).
    pub fn from_value(value: &serde_json::Value) -> Result<Self, FormatError> {
        let raw: RawEnvelope =
            serde_json::from_value(value.clone()).map_err(|e| FormatError::Json(e.to_string()))?;
        raw.validate()
    }
}

/// Envelope as it appears on the wire. `time` is epoch seconds, fractional;
/// `chain` is an open string until validated against the compiled-in set.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    item_hash: String,
    sender: String,
    chain: String,
    #[serde(rename = "type")]
    message_type: MessageType,
    signature: String,
    #[serde(default = "default_item_type")]
    item_type: ItemType,
    #[serde(default)]
    item_content: Option<String>,
    time: f64,
    #[serde(default)]
    channel: Option<String>,
}

fn default_item_type() -> ItemType {
    ItemType::Inline
}

/// Why an envelope failed to decode.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("payload is not valid JSON: {0}")]
    Json(String),
    #[error("payload is not valid UTF-8")]
    Utf8,
    #[error("unknown chain: {0}")]
    UnknownChain(String),
    #[error("item hash has an unrecognized format: {0}")]
    UnknownHash(String),
    #[error("sender address is malformed: {0}")]
    BadAddress(String),
    #[error("time field is not a valid epoch timestamp")]
    BadTime,
    #[error("item_type {item_type} does not match the hash or content")]
    ItemMismatch { item_type: ItemType },
    #[error("inline content does not hash to the declared item_hash")]
    ContentHashMismatch,
    #[error("signature field is empty or oversized")]
    BadSignature,
}

impl FormatError {
    /// The stable numeric code persisted when this failure rejects a message.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            FormatError::UnknownChain(_) => ErrorCode::UnknownChain,
            FormatError::UnknownHash(_) => ErrorCode::UnknownHash,
            _ => ErrorCode::InvalidMessageFormat,
        }
    }
}

/// Longest signature payload accepted from the wire. Generous bound: the
/// largest chain payload (JSON with base58check signature and key) is well
/// under 1 KiB.
const MAX_SIGNATURE_LEN: usize = 4096;

/// Largest inline content accepted in an envelope.
const MAX_INLINE_CONTENT_LEN: usize = 1 << 20;

impl RawEnvelope {
    fn validate(self) -> Result<CandidateMessage, FormatError> {
        let chain: Chain = self
            .chain
            .parse()
            .map_err(|_| FormatError::UnknownChain(self.chain.clone()))?;

        let sender = Address::new(self.sender);
        if !sender.is_valid() {
            return Err(FormatError::BadAddress(sender.as_str().to_string()));
        }

        let item_hash = ItemHash::new(self.item_hash);
        let kind = item_hash
            .kind()
            .ok_or_else(|| FormatError::UnknownHash(item_hash.as_str().to_string()))?;

        if self.signature.is_empty() || self.signature.len() > MAX_SIGNATURE_LEN {
            return Err(FormatError::BadSignature);
        }

        if !self.time.is_finite() || self.time < 0.0 {
            return Err(FormatError::BadTime);
        }
        let time = Timestamp::from_millis((self.time * 1000.0) as u64);

        match self.item_type {
            ItemType::Inline => {
                let content = self.item_content.as_deref().unwrap_or("");
                if content.is_empty() || content.len() > MAX_INLINE_CONTENT_LEN {
                    return Err(FormatError::ItemMismatch {
                        item_type: self.item_type,
                    });
                }
                // Inline items still carry a storage-format digest of their
                // serialized content as identity.
                if kind != ItemHashKind::Storage
                    || ccn_crypto::sha256_hex(content.as_bytes()) != item_hash.as_str()
                {
                    return Err(FormatError::ContentHashMismatch);
                }
            }
            ItemType::Storage => {
                if kind != ItemHashKind::Storage || self.item_content.is_some() {
                    return Err(FormatError::ItemMismatch {
                        item_type: self.item_type,
                    });
                }
            }
            ItemType::Ipfs => {
                if kind != ItemHashKind::Ipfs || self.item_content.is_some() {
                    return Err(FormatError::ItemMismatch {
                        item_type: self.item_type,
                    });
                }
            }
        }

        Ok(CandidateMessage {
            item_hash,
            sender,
            chain,
            message_type: self.message_type,
            signature: self.signature,
            item_type: self.item_type,
            item_content: self.item_content,
            time,
            channel: self.channel,
        })
    }
}

/// Decode a gossip payload into a candidate message.
///
/// Non-UTF-8 bytes, non-JSON text, and schema-invalid envelopes are all
/// permanent format rejections.
pub fn parse_envelope(payload: &[u8]) -> Result<CandidateMessage, FormatError> {
    let text = std::str::from_utf8(payload).map_err(|_| FormatError::Utf8)?;
    let raw: RawEnvelope =
        serde_json::from_str(text).map_err(|e| FormatError::Json(e.to_string()))?;
    raw.validate()
}
