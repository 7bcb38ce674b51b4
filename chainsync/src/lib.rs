//! Confirmation reconciliation.
//!
//! Links messages to the on-chain transactions that carry them: expands a
//! pending transaction's payload into candidate messages, and idempotently
//! records confirmations against admitted messages. Per-chain sync progress
//! is a monotonic height watermark in the store; replaying from an earlier
//! watermark only re-applies confirmations that are already present.

pub mod expand;
pub mod source;

use ccn_schemas::{CandidateMessage, Confirmation, Message};
use ccn_store::{MessageStore, Store};
use ccn_types::{Address, PaymentType, Timestamp};

pub use expand::{expand, SyncError};
pub use source::{ChainTxSource, SourceError};

/// Idempotently record a confirmation for `item_hash`.
///
/// If the message is already admitted, the confirmation is merged into its
/// set. If it is not known locally yet, a message row is created directly in
/// confirmed state from the expanded candidate — its content was already
/// verified at expansion time, so admission is not repeated here.
///
/// Returns `true` when the `(chain, tx_hash)` pair was new for the message.
pub fn confirm(
    store: &dyn Store,
    candidate: &CandidateMessage,
    owner: &Address,
    confirmation: Confirmation,
) -> Result<bool, ccn_store::StoreError> {
    match store.get_message(&candidate.item_hash)? {
        Some(mut message) => {
            let added = message.add_confirmation(confirmation);
            if added {
                store.put_message(&message)?;
            }
            Ok(added)
        }
        None => {
            let mut message = Message::from_candidate(
                candidate,
                owner.clone(),
                PaymentType::Hold,
                Timestamp::now(),
            );
            message.add_confirmation(confirmation);
            store.put_message(&message)?;
            Ok(true)
        }
    }
}

/// The confirmation entry an expanded transaction contributes to each of
/// its messages.
pub fn confirmation_of(tx: &ccn_schemas::PendingTx) -> Confirmation {
    Confirmation {
        chain: tx.chain,
        tx_hash: tx.tx_hash.clone(),
        height: tx.height,
        time: tx.time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccn_store::{MemoryStore, MessageStore};
    use ccn_types::{Chain, ItemType, MessageType, TxHash};

    fn candidate() -> CandidateMessage {
        CandidateMessage {
            item_hash: "9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44".into(),
            sender: "0xaaa".into(),
            chain: Chain::Hex,
            message_type: MessageType::Post,
            signature: "sig".into(),
            item_type: ItemType::Storage,
            item_content: None,
            time: Timestamp::from_millis(1_000),
            channel: None,
        }
    }

    fn confirmation(tx: &str, time_ms: u64) -> Confirmation {
        Confirmation {
            chain: Chain::Hex,
            tx_hash: TxHash::from(tx),
            height: 77,
            time: Timestamp::from_millis(time_ms),
        }
    }

    #[test]
    fn confirming_unknown_message_creates_it_confirmed() {
        let store = MemoryStore::new();
        let cand = candidate();
        assert!(confirm(&store, &cand, &"0xaaa".into(), confirmation("0xt1", 5_000)).unwrap());

        let message = store.get_message(&cand.item_hash).unwrap().unwrap();
        assert!(message.is_confirmed());
        assert_eq!(message.confirmation_time, Some(Timestamp::from_millis(5_000)));
    }

    #[test]
    fn confirming_twice_is_idempotent() {
        let store = MemoryStore::new();
        let cand = candidate();
        assert!(confirm(&store, &cand, &"0xaaa".into(), confirmation("0xt1", 5_000)).unwrap());
        assert!(!confirm(&store, &cand, &"0xaaa".into(), confirmation("0xt1", 5_000)).unwrap());

        let message = store.get_message(&cand.item_hash).unwrap().unwrap();
        assert_eq!(message.confirmations.len(), 1);
    }

    #[test]
    fn second_transaction_extends_the_set() {
        let store = MemoryStore::new();
        let cand = candidate();
        confirm(&store, &cand, &"0xaaa".into(), confirmation("0xt1", 5_000)).unwrap();
        confirm(&store, &cand, &"0xaaa".into(), confirmation("0xt2", 3_000)).unwrap();

        let message = store.get_message(&cand.item_hash).unwrap().unwrap();
        assert_eq!(message.confirmations.len(), 2);
        assert_eq!(message.confirmation_time, Some(Timestamp::from_millis(3_000)));
    }
}
