//! Pending message and pending transaction queues.

use ccn_schemas::{PendingMessage, PendingTx};
use ccn_types::{Address, Chain, ItemHash, Timestamp, TxHash};

use crate::StoreError;

/// Uniqueness key of a pending message row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub sender: Address,
    pub item_hash: ItemHash,
    pub signature: String,
}

impl PendingKey {
    pub fn of(pending: &PendingMessage) -> Self {
        Self {
            sender: pending.candidate.sender.clone(),
            item_hash: pending.candidate.item_hash.clone(),
            signature: pending.candidate.signature.clone(),
        }
    }
}

/// Queue of candidate messages awaiting admission, indexed by due time.
pub trait PendingMessageStore {
    /// Insert a pending row. Returns `false` when a row with the same
    /// `(sender, item_hash, signature)` already exists — duplicate sightings
    /// are collapsed here, at insertion.
    fn insert_pending(&self, pending: &PendingMessage) -> Result<bool, StoreError>;

    fn get_pending(&self, key: &PendingKey) -> Result<Option<PendingMessage>, StoreError>;

    fn delete_pending(&self, key: &PendingKey) -> Result<(), StoreError>;

    /// Reschedule a row after a transient failure. `retries` and
    /// `next_attempt` only ever grow.
    fn reschedule_pending(
        &self,
        key: &PendingKey,
        retries: u32,
        next_attempt: Timestamp,
    ) -> Result<(), StoreError>;

    /// Rows due at `now`, ascending by `next_attempt`, bounded by `limit` so
    /// one poisoned item cannot starve the queue.
    fn due_pending(&self, now: Timestamp, limit: usize) -> Result<Vec<PendingMessage>, StoreError>;

    fn pending_count(&self) -> Result<u64, StoreError>;
}

/// Queue of on-chain transactions awaiting expansion.
pub trait PendingTxStore {
    /// Insert a pending transaction. Returns `false` if the
    /// `(chain, tx_hash)` pair is already queued.
    fn insert_pending_tx(&self, tx: &PendingTx) -> Result<bool, StoreError>;

    fn delete_pending_tx(&self, chain: Chain, tx_hash: &TxHash) -> Result<(), StoreError>;

    /// Pending transactions in `(height asc, time asc)` order, bounded.
    fn next_pending_txs(&self, limit: usize) -> Result<Vec<PendingTx>, StoreError>;

    fn pending_tx_count(&self) -> Result<u64, StoreError>;
}
