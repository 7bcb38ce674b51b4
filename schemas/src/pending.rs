//! Pending work records: unadmitted messages and unexpanded transactions.

use ccn_types::{Address, Chain, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

use crate::envelope::CandidateMessage;
use crate::message::Confirmation;

/// Which path delivered a candidate message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Received from the peer-to-peer gossip transport.
    Gossip,
    /// Expanded from an on-chain transaction payload.
    Chain,
}

/// A candidate message queued for admission.
///
/// Unique on `(sender, item_hash, signature)`: duplicate sightings of the
/// same signed message collapse at insertion, not at processing time. The
/// row is deleted on successful admission or permanent rejection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub candidate: CandidateMessage,
    pub origin: Origin,
    /// Number of failed admission attempts so far.
    pub retries: u32,
    /// Earliest time the next attempt may run. Monotonically non-decreasing.
    pub next_attempt: Timestamp,
    pub first_seen: Timestamp,
    /// Confirmation carried along when the candidate came out of a chain
    /// transaction, recorded on admission.
    #[serde(default)]
    pub confirmation: Option<Confirmation>,
}

impl PendingMessage {
    pub fn new(candidate: CandidateMessage, origin: Origin, now: Timestamp) -> Self {
        Self {
            candidate,
            origin,
            retries: 0,
            next_attempt: now,
            first_seen: now,
            confirmation: None,
        }
    }

    pub fn with_confirmation(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    /// Whether this entry is due for an attempt at `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.next_attempt <= now
    }
}

/// An on-chain transaction not yet expanded into candidate messages.
///
/// Processed in `(height asc, time asc)` order per chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingTx {
    pub tx_hash: TxHash,
    pub chain: Chain,
    pub height: u64,
    pub time: Timestamp,
    /// The address that published the transaction on chain.
    pub publisher: Address,
    /// Sync protocol name carried in the transaction payload.
    pub protocol: String,
    pub protocol_version: u16,
    /// Raw payload: inline message list or an off-chain content pointer.
    pub content: serde_json::Value,
}
