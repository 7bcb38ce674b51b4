//! End-to-end pipeline tests over the in-memory store and content backend.

use std::sync::Arc;

use ccn_content::{ContentStorage, MemoryContentStorage};
use ccn_node::pipeline::{Outcome, Pipeline, TxOutcome};
use ccn_node::NodeConfig;
use ccn_schemas::{CandidateMessage, Origin, PendingMessage, PendingTx};
use ccn_store::pending::PendingKey;
use ccn_store::{
    AccountCostStore, BalanceStore, MemoryStore, MessageStore, PendingMessageStore,
    PendingTxStore, PermissionStore, Store,
};
use ccn_store::permissions::{Permission, PermissionKind};
use ccn_types::{Address, Chain, ErrorCode, ItemType, MessageType, Timestamp};
use ccn_verifiers::Registry;

struct Harness {
    store: Arc<MemoryStore>,
    content: Arc<MemoryContentStorage>,
    pipeline: Pipeline,
    keypair: ccn_crypto::KeyPair,
    sender: Address,
}

fn config() -> NodeConfig {
    NodeConfig {
        retry_base_secs: 30,
        retry_max_secs: 3_600,
        balance_sync_address: "0xbalancesync".into(),
        // Keep test messages on the legacy 1x price scale.
        price_scale_cutover_secs: 4_102_444_800,
        ..NodeConfig::default()
    }
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let content = Arc::new(MemoryContentStorage::new());
    let keypair = ccn_crypto::generate_keypair();
    let sender = Address::new(format!("0x{}", hex::encode(keypair.public)));
    let pipeline = Pipeline::new(
        store.clone() as Arc<dyn Store>,
        Registry::with_all_chains(),
        content.clone() as Arc<dyn ContentStorage>,
        &config(),
    );
    Harness {
        store,
        content,
        pipeline,
        keypair,
        sender,
    }
}

impl Harness {
    /// Build a signed candidate whose content lives in the content store.
    fn stored_candidate(&self, message_type: MessageType, content_json: &str) -> CandidateMessage {
        let item_hash = self.content.insert(content_json.as_bytes());
        let mut candidate = CandidateMessage {
            item_hash,
            sender: self.sender.clone(),
            chain: Chain::Hex,
            message_type,
            signature: String::new(),
            item_type: ItemType::Storage,
            item_content: None,
            time: Timestamp::now(),
            channel: Some("TEST".into()),
        };
        self.sign(&mut candidate);
        candidate
    }

    fn sign(&self, candidate: &mut CandidateMessage) {
        let sig = ccn_crypto::sign_message(&candidate.verification_buffer(), &self.keypair.private);
        candidate.signature = format!(
            r#"{{"signature":"{}","publicKey":"{}"}}"#,
            hex::encode(sig),
            hex::encode(self.keypair.public)
        );
    }

    fn post_content(&self) -> String {
        format!(
            r#"{{"type":"blog","address":"{}","time":1700000000.0,"content":{{"body":"hello"}}}}"#,
            self.sender
        )
    }

    fn store_content(&self, file_hash: &str, size: u64) -> String {
        format!(
            r#"{{"address":"{}","time":1700000000.0,"item_type":"storage","item_hash":"{file_hash}","size":{size}}}"#,
            self.sender
        )
    }
}

#[test]
fn signed_post_is_admitted() {
    let h = harness();
    let candidate = h.stored_candidate(MessageType::Post, &h.post_content());

    let outcome = h.pipeline.process_candidate(&candidate, None, None);
    assert_eq!(outcome, Outcome::Applied);

    let message = h.store.get_message(&candidate.item_hash).unwrap().unwrap();
    assert_eq!(message.owner, h.sender);
    assert_eq!(message.message_type, MessageType::Post);
}

#[test]
fn tampered_signature_is_permanently_rejected() {
    let h = harness();
    let mut candidate = h.stored_candidate(MessageType::Post, &h.post_content());
    // Re-sign with a different key but keep the claimed sender.
    let other = ccn_crypto::generate_keypair();
    let sig = ccn_crypto::sign_message(&candidate.verification_buffer(), &other.private);
    candidate.signature = format!(
        r#"{{"signature":"{}","publicKey":"{}"}}"#,
        hex::encode(sig),
        hex::encode(other.public)
    );

    let pending = PendingMessage::new(candidate.clone(), Origin::Gossip, Timestamp::now());
    h.store.insert_pending(&pending).unwrap();

    let outcome = h.pipeline.process_pending(&pending);
    assert_eq!(outcome, Outcome::Rejected(ErrorCode::InvalidSignature));

    // The rejection is recorded, the pending row is gone, no message exists.
    let rejection = h.store.get_rejection(&candidate.item_hash).unwrap().unwrap();
    assert_eq!(rejection.error_code, ErrorCode::InvalidSignature);
    assert_eq!(h.store.pending_count().unwrap(), 0);
    assert!(!h.store.message_exists(&candidate.item_hash).unwrap());
}

#[test]
fn admission_is_idempotent() {
    let h = harness();
    let file = h.content.insert(b"file bytes for pinning");
    h.store.put_balance(&h.sender, 1_000_000).unwrap();
    let candidate =
        h.stored_candidate(MessageType::Store, &h.store_content(file.as_str(), 4_096));

    assert_eq!(h.pipeline.process_candidate(&candidate, None, None), Outcome::Applied);
    let first = h.store.get_message(&candidate.item_hash).unwrap().unwrap();

    assert_eq!(h.pipeline.process_candidate(&candidate, None, None), Outcome::Applied);
    let second = h.store.get_message(&candidate.item_hash).unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.message_count().unwrap(), 1);
    // No duplicate cost rows either.
    assert_eq!(h.store.cost_count().unwrap(), 1);
}

#[test]
fn content_unavailable_retries_then_succeeds() {
    let h = harness();
    let content_json = h.post_content();
    let candidate = h.stored_candidate(MessageType::Post, &content_json);
    // Simulate content that has not propagated yet.
    h.content.remove(&candidate.item_hash);

    let before = Timestamp::now();
    let pending = PendingMessage::new(candidate.clone(), Origin::Gossip, before);
    h.store.insert_pending(&pending).unwrap();

    let outcome = h.pipeline.process_pending(&pending);
    assert_eq!(outcome, Outcome::Retry(ErrorCode::ContentUnavailable));

    // The row still exists with retries = 1 and next_attempt = now + base.
    let key = PendingKey::of(&pending);
    let row = h.store.get_pending(&key).unwrap().unwrap();
    assert_eq!(row.retries, 1);
    let delay_ms = row.next_attempt.as_millis() - before.as_millis();
    assert!(delay_ms >= 30_000, "delay was {delay_ms}ms");
    assert!(delay_ms < 40_000, "delay was {delay_ms}ms");

    // Content arrives; the next attempt admits and consumes the row.
    h.content.insert(content_json.as_bytes());
    let outcome = h.pipeline.process_pending(&row);
    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(h.store.pending_count().unwrap(), 0);
    assert!(h.store.message_exists(&candidate.item_hash).unwrap());
}

#[test]
fn gossip_and_chain_sightings_collapse_to_one_message() {
    let h = harness();
    let candidate = h.stored_candidate(MessageType::Post, &h.post_content());
    let now = Timestamp::now();

    let from_gossip = PendingMessage::new(candidate.clone(), Origin::Gossip, now);
    let from_chain = PendingMessage::new(candidate.clone(), Origin::Chain, now);
    assert!(h.store.insert_pending(&from_gossip).unwrap());
    assert!(!h.store.insert_pending(&from_chain).unwrap());
    assert_eq!(h.store.pending_count().unwrap(), 1);

    assert_eq!(h.pipeline.process_pending(&from_gossip), Outcome::Applied);
    assert_eq!(h.store.message_count().unwrap(), 1);
}

#[test]
fn cost_gate_rejects_past_the_boundary() {
    let h = harness();
    // Default pricing: 20 units per MiB of holding.
    h.store.put_balance(&h.sender, 40).unwrap();

    let file_a = h.content.insert(b"first file");
    let first =
        h.stored_candidate(MessageType::Store, &h.store_content(file_a.as_str(), 1));
    assert_eq!(h.pipeline.process_candidate(&first, None, None), Outcome::Applied);

    let file_b = h.content.insert(b"second file");
    let second =
        h.stored_candidate(MessageType::Store, &h.store_content(file_b.as_str(), 1));
    // Committed 20, balance 40: another 20 fits exactly.
    assert_eq!(h.pipeline.process_candidate(&second, None, None), Outcome::Applied);

    let file_c = h.content.insert(b"third file");
    let third =
        h.stored_candidate(MessageType::Store, &h.store_content(file_c.as_str(), 1));
    let outcome = h.pipeline.process_candidate(&third, None, None);
    assert_eq!(outcome, Outcome::Rejected(ErrorCode::InsufficientBalance));
}

#[test]
fn delegated_sender_needs_a_grant() {
    let h = harness();
    let owner = Address::from("0xsomeoneelse");
    let content = format!(
        r#"{{"type":"blog","address":"{owner}","time":1700000000.0,"content":{{}}}}"#
    );
    let candidate = h.stored_candidate(MessageType::Post, &content);

    // Without a grant: unauthorized, permanently.
    let outcome = h.pipeline.process_candidate(&candidate, None, None);
    assert_eq!(outcome, Outcome::Rejected(ErrorCode::Unauthorized));

    // With a currently-valid grant covering the channel and post type.
    let now = Timestamp::now();
    h.store
        .put_permission(&Permission {
            owner: owner.clone(),
            grantee: h.sender.clone(),
            kind: PermissionKind::Post,
            valid_from: Timestamp::EPOCH,
            valid_until: now.plus_secs(3_600),
            channels: None,
            scopes: None,
            create: true,
            update: true,
            delete: false,
        })
        .unwrap();

    let outcome = h.pipeline.process_candidate(&candidate, None, None);
    assert_eq!(outcome, Outcome::Applied);
    let message = h.store.get_message(&candidate.item_hash).unwrap().unwrap();
    assert_eq!(message.owner, owner);
    assert_eq!(message.sender, h.sender);
}

fn sync_tx(tx_hash: &str, height: u64, candidate: &CandidateMessage) -> PendingTx {
    let value = serde_json::to_value(candidate).unwrap();
    // The wire envelope spells `type` and epoch-second `time`.
    let mut map = value.as_object().unwrap().clone();
    let message_type = map.remove("message_type").unwrap();
    map.insert("type".into(), message_type);
    let time_ms = candidate.time.as_millis() as f64;
    map.insert("time".into(), serde_json::json!(time_ms / 1000.0));
    PendingTx {
        tx_hash: tx_hash.into(),
        chain: Chain::Hex,
        height,
        time: Timestamp::from_millis(5_000),
        publisher: "0xpublisher".into(),
        protocol: "sync".into(),
        protocol_version: 1,
        content: serde_json::json!({"messages": [serde_json::Value::Object(map)]}),
    }
}

#[test]
fn chain_expansion_queues_and_confirms() {
    let h = harness();
    let candidate = h.stored_candidate(MessageType::Post, &h.post_content());
    let tx = sync_tx("0xtx1", 10, &candidate);
    h.store.insert_pending_tx(&tx).unwrap();

    match h.pipeline.process_pending_tx(&tx) {
        TxOutcome::Expanded(queued) => assert_eq!(queued, 1),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.store.pending_tx_count().unwrap(), 0);

    // The queued row carries the confirmation into admission.
    let due = h.store.due_pending(Timestamp::now(), 10).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].origin, Origin::Chain);
    assert!(due[0].confirmation.is_some());

    assert_eq!(h.pipeline.process_pending(&due[0]), Outcome::Applied);
    let message = h.store.get_message(&candidate.item_hash).unwrap().unwrap();
    assert!(message.is_confirmed());
    assert_eq!(message.confirmations[0].tx_hash.as_str(), "0xtx1");
}

#[test]
fn replaying_the_same_transaction_keeps_one_confirmation() {
    let h = harness();
    let candidate = h.stored_candidate(MessageType::Post, &h.post_content());
    let tx = sync_tx("0xtx1", 10, &candidate);

    h.store.insert_pending_tx(&tx).unwrap();
    h.pipeline.process_pending_tx(&tx);
    let due = h.store.due_pending(Timestamp::now(), 10).unwrap();
    h.pipeline.process_pending(&due[0]);

    // Watermark replay delivers the same transaction again.
    h.store.insert_pending_tx(&tx).unwrap();
    h.pipeline.process_pending_tx(&tx);

    let message = h.store.get_message(&candidate.item_hash).unwrap().unwrap();
    assert_eq!(message.confirmations.len(), 1);
    assert_eq!(h.store.message_count().unwrap(), 1);
}

#[test]
fn gossip_then_chain_converges_with_confirmation() {
    let h = harness();
    let candidate = h.stored_candidate(MessageType::Post, &h.post_content());

    // Admitted via gossip first.
    assert_eq!(h.pipeline.process_candidate(&candidate, None, None), Outcome::Applied);

    // The same message then shows up inside a chain transaction.
    let tx = sync_tx("0xtx9", 42, &candidate);
    h.store.insert_pending_tx(&tx).unwrap();
    match h.pipeline.process_pending_tx(&tx) {
        TxOutcome::Expanded(queued) => assert_eq!(queued, 0),
        other => panic!("unexpected outcome {other:?}"),
    }

    let message = h.store.get_message(&candidate.item_hash).unwrap().unwrap();
    assert_eq!(message.confirmations.len(), 1);
    assert_eq!(message.confirmations[0].height, 42);
    // No stray pending row was created for the already-admitted message.
    assert_eq!(h.store.pending_count().unwrap(), 0);
}

#[test]
fn undecodable_transaction_is_dropped() {
    let h = harness();
    let tx = PendingTx {
        tx_hash: "0xbad".into(),
        chain: Chain::Hex,
        height: 10,
        time: Timestamp::from_millis(5_000),
        publisher: "0xpublisher".into(),
        protocol: "unknown-protocol".into(),
        protocol_version: 9,
        content: serde_json::json!({}),
    };
    h.store.insert_pending_tx(&tx).unwrap();

    assert_eq!(h.pipeline.process_pending_tx(&tx), TxOutcome::Dropped);
    assert_eq!(h.store.pending_tx_count().unwrap(), 0);
}
