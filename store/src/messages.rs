//! Final message storage and the atomic admission batch.

use ccn_schemas::{Message, RejectedMessage};
use ccn_types::{Address, ItemHash};

use crate::aggregates::AggregateElement;
use crate::costs::AccountCost;
use crate::files::{FilePin, ScheduledDeletion};
use crate::pending::PendingKey;
use crate::StoreError;

/// Everything one admission writes, committed atomically: either the whole
/// set lands or none of it does.
#[derive(Debug, Default)]
pub struct AdmissionBatch {
    /// The admitted (or re-admitted) message row, upserted by item hash.
    pub message: Option<Message>,
    /// Additional message rows mutated by this admission (amend targets).
    pub updated_messages: Vec<Message>,
    /// Pending row consumed by this admission.
    pub delete_pending: Option<PendingKey>,
    /// Cost snapshot rows, upserted by `(owner, item_hash, type, name)`.
    pub costs: Vec<AccountCost>,
    /// Aggregate element inserted by an AGGREGATE message.
    pub aggregate_element: Option<AggregateElement>,
    /// File pins created by a STORE message.
    pub pins: Vec<FilePin>,
    /// Grace-period markers cancelled because content is now referenced.
    pub cancel_deletions: Vec<ItemHash>,
    /// Messages marked removed by a FORGET.
    pub mark_removed: Vec<ItemHash>,
    /// Content scheduled for deletion after the grace period.
    pub schedule_deletions: Vec<ScheduledDeletion>,
    /// Pins released by a FORGET, keyed by the pinning message's hash.
    pub remove_pins: Vec<ItemHash>,
    /// Cost rows released by a FORGET, keyed by `(owner, item_hash)`.
    pub delete_costs: Vec<(Address, ItemHash)>,
    /// Token balance rows ingested from the balance-sync aggregate.
    pub balances: Vec<(Address, u128)>,
}

impl AdmissionBatch {
    pub fn for_message(message: Message) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }
}

/// Storage for admitted messages and rejection audit records.
pub trait MessageStore {
    fn get_message(&self, item_hash: &ItemHash) -> Result<Option<Message>, StoreError>;
    fn message_exists(&self, item_hash: &ItemHash) -> Result<bool, StoreError>;
    fn message_count(&self) -> Result<u64, StoreError>;

    /// Upsert a single message row (confirmation merge path).
    fn put_message(&self, message: &Message) -> Result<(), StoreError>;

    /// Commit a whole admission atomically.
    fn commit_admission(&self, batch: AdmissionBatch) -> Result<(), StoreError>;

    /// Record a permanent rejection and drop its pending row in one step.
    fn commit_rejection(
        &self,
        rejection: &RejectedMessage,
        delete_pending: Option<&PendingKey>,
    ) -> Result<(), StoreError>;

    fn get_rejection(&self, item_hash: &ItemHash) -> Result<Option<RejectedMessage>, StoreError>;

    /// Claim exclusive admission rights for an item hash. Returns `false`
    /// if another worker holds a live claim. Claims expire so a crashed
    /// worker cannot wedge an item forever.
    fn try_claim(&self, item_hash: &ItemHash, now_millis: u64, ttl_millis: u64)
        -> Result<bool, StoreError>;

    fn release_claim(&self, item_hash: &ItemHash) -> Result<(), StoreError>;
}
