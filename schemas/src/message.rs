//! The final, converged message record.

use ccn_types::{
    Address, Chain, ErrorCode, ItemHash, ItemType, MessageType, PaymentType, Timestamp, TxHash,
};
use serde::{Deserialize, Serialize};

use crate::envelope::CandidateMessage;

/// Lifecycle state of an admitted message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Validated and applied; visible to queries.
    Processed,
    /// Target of an admitted FORGET; kept as a tombstone, content scheduled
    /// for deletion.
    Removed,
}

/// Evidence that one on-chain transaction carries this message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub chain: Chain,
    pub tx_hash: TxHash,
    pub height: u64,
    pub time: Timestamp,
}

/// A fully admitted message: candidate fields plus convergence state.
///
/// Mutated in place when a new confirmation arrives or an amend/forget
/// targets it; never deleted except through the permission-checked forget
/// path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub item_hash: ItemHash,
    pub sender: Address,
    pub chain: Chain,
    pub message_type: MessageType,
    pub signature: String,
    pub item_type: ItemType,
    pub item_content: Option<String>,
    pub time: Timestamp,
    pub channel: Option<String>,

    pub status: MessageStatus,
    pub reception_time: Timestamp,
    /// Append-only, unique per `(chain, tx_hash)`.
    pub confirmations: Vec<Confirmation>,
    /// Minimum confirmation time seen across all confirmations.
    pub confirmation_time: Option<Timestamp>,
    /// The address the content acts for (content `address`, not the sender).
    pub owner: Address,
    pub payment_type: PaymentType,
    /// Content reference this message points at: pinned file hash for STORE,
    /// amend target for POST amends.
    pub content_ref: Option<ItemHash>,
    /// Aggregate key for AGGREGATE messages.
    pub content_key: Option<String>,
}

impl Message {
    /// Build the admitted record for a candidate, owned by `owner`.
    pub fn from_candidate(
        candidate: &CandidateMessage,
        owner: Address,
        payment_type: PaymentType,
        reception_time: Timestamp,
    ) -> Self {
        Self {
            item_hash: candidate.item_hash.clone(),
            sender: candidate.sender.clone(),
            chain: candidate.chain,
            message_type: candidate.message_type,
            signature: candidate.signature.clone(),
            item_type: candidate.item_type,
            item_content: candidate.item_content.clone(),
            time: candidate.time,
            channel: candidate.channel.clone(),
            status: MessageStatus::Processed,
            reception_time,
            confirmations: Vec::new(),
            confirmation_time: None,
            owner,
            payment_type,
            content_ref: None,
            content_key: None,
        }
    }

    /// Idempotently record a confirmation. Returns `true` if the
    /// `(chain, tx_hash)` pair was new.
    pub fn add_confirmation(&mut self, confirmation: Confirmation) -> bool {
        let already = self
            .confirmations
            .iter()
            .any(|c| c.chain == confirmation.chain && c.tx_hash == confirmation.tx_hash);
        if already {
            return false;
        }
        self.confirmation_time = Some(match self.confirmation_time {
            Some(existing) => existing.min(confirmation.time),
            None => confirmation.time,
        });
        self.confirmations.push(confirmation);
        true
    }

    /// Whether at least one on-chain confirmation has been recorded.
    pub fn is_confirmed(&self) -> bool {
        !self.confirmations.is_empty()
    }
}

/// Audit record for a permanently rejected message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectedMessage {
    pub item_hash: ItemHash,
    pub sender: Address,
    pub error_code: ErrorCode,
    pub time: Timestamp,
    #[serde(default)]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmation(tx: &str, time_ms: u64) -> Confirmation {
        Confirmation {
            chain: Chain::Hex,
            tx_hash: TxHash::from(tx),
            height: 100,
            time: Timestamp::from_millis(time_ms),
        }
    }

    fn test_message() -> Message {
        Message {
            item_hash: ItemHash::from(
                "9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44",
            ),
            sender: Address::from("0xaaa"),
            chain: Chain::Hex,
            message_type: MessageType::Post,
            signature: "sig".into(),
            item_type: ItemType::Inline,
            item_content: Some("{}".into()),
            time: Timestamp::from_millis(1_000),
            channel: None,
            status: MessageStatus::Processed,
            reception_time: Timestamp::from_millis(2_000),
            confirmations: Vec::new(),
            confirmation_time: None,
            owner: Address::from("0xaaa"),
            payment_type: PaymentType::Hold,
            content_ref: None,
            content_key: None,
        }
    }

    #[test]
    fn first_confirmation_sets_time() {
        let mut msg = test_message();
        assert!(msg.add_confirmation(confirmation("0xt1", 5_000)));
        assert!(msg.is_confirmed());
        assert_eq!(msg.confirmation_time, Some(Timestamp::from_millis(5_000)));
    }

    #[test]
    fn duplicate_confirmation_is_noop() {
        let mut msg = test_message();
        assert!(msg.add_confirmation(confirmation("0xt1", 5_000)));
        assert!(!msg.add_confirmation(confirmation("0xt1", 4_000)));
        assert_eq!(msg.confirmations.len(), 1);
        // the duplicate's earlier time is ignored along with the entry
        assert_eq!(msg.confirmation_time, Some(Timestamp::from_millis(5_000)));
    }

    #[test]
    fn confirmation_time_is_minimum() {
        let mut msg = test_message();
        msg.add_confirmation(confirmation("0xt1", 5_000));
        msg.add_confirmation(confirmation("0xt2", 3_000));
        msg.add_confirmation(confirmation("0xt3", 9_000));
        assert_eq!(msg.confirmations.len(), 3);
        assert_eq!(msg.confirmation_time, Some(Timestamp::from_millis(3_000)));
    }

    #[test]
    fn same_tx_on_different_chain_is_distinct() {
        let mut msg = test_message();
        msg.add_confirmation(confirmation("0xt1", 5_000));
        let mut other = confirmation("0xt1", 6_000);
        other.chain = Chain::Solana;
        assert!(msg.add_confirmation(other));
        assert_eq!(msg.confirmations.len(), 2);
    }
}
