//! LMDB implementation of message storage and the atomic admission commit.

use ccn_schemas::{Message, MessageStatus, RejectedMessage};
use ccn_store::messages::{AdmissionBatch, MessageStore};
use ccn_store::pending::PendingKey;
use ccn_store::StoreError;
use ccn_types::ItemHash;

use crate::environment::{decode, decode_u64, encode, LmdbStore};
use crate::LmdbError;

impl MessageStore for LmdbStore {
    fn get_message(&self, item_hash: &ItemHash) -> Result<Option<Message>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let raw = self
            .messages_db
            .get(&rtxn, item_hash.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        Ok(raw.map(decode).transpose()?)
    }

    fn message_exists(&self, item_hash: &ItemHash) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self
            .messages_db
            .get(&rtxn, item_hash.as_str().as_bytes())
            .map_err(LmdbError::from)?
            .is_some())
    }

    fn message_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.messages_db.len(&rtxn).map_err(LmdbError::from)?)
    }

    fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        let raw = encode(message)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.messages_db
            .put(&mut wtxn, message.item_hash.as_str().as_bytes(), &raw)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn commit_admission(&self, batch: AdmissionBatch) -> Result<(), StoreError> {
        // One LMDB write transaction covers the whole effect set. A failure
        // anywhere aborts the transaction on drop; nothing partial lands.
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        if let Some(message) = &batch.message {
            let raw = encode(message)?;
            self.messages_db
                .put(&mut wtxn, message.item_hash.as_str().as_bytes(), &raw)
                .map_err(LmdbError::from)?;
        }
        for message in &batch.updated_messages {
            let raw = encode(message)?;
            self.messages_db
                .put(&mut wtxn, message.item_hash.as_str().as_bytes(), &raw)
                .map_err(LmdbError::from)?;
        }
        if let Some(key) = &batch.delete_pending {
            self.delete_pending_in(&mut wtxn, key)?;
        }
        for cost in &batch.costs {
            self.upsert_cost_in(&mut wtxn, cost)?;
        }
        if let Some(element) = &batch.aggregate_element {
            self.insert_aggregate_element_in(&mut wtxn, element)?;
        }
        for pin in &batch.pins {
            self.add_pin_in(&mut wtxn, pin)?;
        }
        for content_ref in &batch.cancel_deletions {
            self.cancel_deletion_in(&mut wtxn, content_ref)?;
        }
        for item_hash in &batch.mark_removed {
            let key = item_hash.as_str().as_bytes();
            if let Some(raw) = self.messages_db.get(&wtxn, key).map_err(LmdbError::from)? {
                let mut message: Message = decode(raw)?;
                message.status = MessageStatus::Removed;
                let raw = encode(&message)?;
                self.messages_db
                    .put(&mut wtxn, key, &raw)
                    .map_err(LmdbError::from)?;
            }
        }
        for deletion in &batch.schedule_deletions {
            self.schedule_deletion_in(&mut wtxn, deletion)?;
        }
        for item_hash in &batch.remove_pins {
            self.remove_pins_for_message_in(&mut wtxn, item_hash)?;
        }
        for (owner, item_hash) in &batch.delete_costs {
            self.delete_costs_for_message_in(&mut wtxn, owner, item_hash)?;
        }
        for (address, amount) in &batch.balances {
            self.balances_db
                .put(&mut wtxn, address.as_str().as_bytes(), &amount.to_be_bytes())
                .map_err(LmdbError::from)?;
        }

        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn commit_rejection(
        &self,
        rejection: &RejectedMessage,
        delete_pending: Option<&PendingKey>,
    ) -> Result<(), StoreError> {
        let raw = encode(rejection)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.rejections_db
            .put(&mut wtxn, rejection.item_hash.as_str().as_bytes(), &raw)
            .map_err(LmdbError::from)?;
        if let Some(key) = delete_pending {
            self.delete_pending_in(&mut wtxn, key)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_rejection(&self, item_hash: &ItemHash) -> Result<Option<RejectedMessage>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let raw = self
            .rejections_db
            .get(&rtxn, item_hash.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        Ok(raw.map(decode).transpose()?)
    }

    fn try_claim(
        &self,
        item_hash: &ItemHash,
        now_millis: u64,
        ttl_millis: u64,
    ) -> Result<bool, StoreError> {
        // LMDB serializes write transactions, so the get-then-put below is
        // race-free even across worker processes sharing the environment.
        let key = item_hash.as_str().as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if let Some(raw) = self.claims_db.get(&wtxn, key).map_err(LmdbError::from)? {
            let expires = decode_u64(raw)?;
            if expires > now_millis {
                return Ok(false);
            }
        }
        self.claims_db
            .put(
                &mut wtxn,
                key,
                &now_millis.saturating_add(ttl_millis).to_be_bytes(),
            )
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn release_claim(&self, item_hash: &ItemHash) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.claims_db
            .delete(&mut wtxn, item_hash.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccn_schemas::{CandidateMessage, Origin, PendingMessage};
    use ccn_store::costs::AccountCost;
    use ccn_store::pending::PendingMessageStore;
    use ccn_store::AccountCostStore;
    use ccn_types::{Chain, ErrorCode, ItemType, MessageType, PaymentType, Timestamp};

    fn open_store() -> (tempfile::TempDir, LmdbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
        (dir, store)
    }

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

    fn message() -> Message {
        Message::from_candidate(
            &candidate(),
            "0xaaa".into(),
            PaymentType::Hold,
            Timestamp::from_millis(2_000),
        )
    }

    #[test]
    fn admission_batch_lands_atomically() {
        let (_dir, store) = open_store();
        let pending = PendingMessage::new(candidate(), Origin::Gossip, Timestamp::from_millis(0));
        store.insert_pending(&pending).unwrap();

        let msg = message();
        let mut batch = AdmissionBatch::for_message(msg.clone());
        batch.delete_pending = Some(PendingKey::of(&pending));
        batch.costs.push(AccountCost {
            owner: "0xaaa".into(),
            item_hash: msg.item_hash.clone(),
            message_type: MessageType::Post,
            name: String::new(),
            cost_hold: 42,
            cost_stream: 0,
            cost_credit: 0,
            payment_type: PaymentType::Hold,
        });
        store.commit_admission(batch).unwrap();

        assert!(store.message_exists(&msg.item_hash).unwrap());
        assert_eq!(store.pending_count().unwrap(), 0);
        assert_eq!(store.cost_count().unwrap(), 1);
    }

    #[test]
    fn rejection_records_code_and_drops_pending() {
        let (_dir, store) = open_store();
        let pending = PendingMessage::new(candidate(), Origin::Gossip, Timestamp::from_millis(0));
        store.insert_pending(&pending).unwrap();

        let rejection = RejectedMessage {
            item_hash: pending.candidate.item_hash.clone(),
            sender: pending.candidate.sender.clone(),
            error_code: ErrorCode::InvalidSignature,
            time: Timestamp::from_millis(3_000),
            detail: None,
        };
        store
            .commit_rejection(&rejection, Some(&PendingKey::of(&pending)))
            .unwrap();

        let stored = store.get_rejection(&rejection.item_hash).unwrap().unwrap();
        assert_eq!(stored.error_code, ErrorCode::InvalidSignature);
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[test]
    fn claims_are_exclusive_and_expire() {
        let (_dir, store) = open_store();
        let hash = message().item_hash;
        assert!(store.try_claim(&hash, 1_000, 5_000).unwrap());
        assert!(!store.try_claim(&hash, 2_000, 5_000).unwrap());
        assert!(store.try_claim(&hash, 7_000, 5_000).unwrap());
        store.release_claim(&hash).unwrap();
        assert!(store.try_claim(&hash, 7_500, 5_000).unwrap());
    }

    #[test]
    fn mark_removed_flips_status() {
        let (_dir, store) = open_store();
        let msg = message();
        store.put_message(&msg).unwrap();

        let batch = AdmissionBatch {
            mark_removed: vec![msg.item_hash.clone()],
            ..AdmissionBatch::default()
        };
        store.commit_admission(batch).unwrap();

        let stored = store.get_message(&msg.item_hash).unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Removed);
    }
}
