//! File objects, pins, and grace-period deletion markers.

use ccn_types::{Address, ItemHash, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A pin holding a content-addressed file alive for an owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePin {
    pub content_ref: ItemHash,
    pub owner: Address,
    /// The STORE message that created the pin.
    pub item_hash: ItemHash,
    pub size: u64,
    pub created_at: Timestamp,
}

/// Grace-period marker: content uploaded but not yet referenced by any
/// admitted message, deletable after `delete_by`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDeletion {
    pub content_ref: ItemHash,
    pub delete_by: Timestamp,
}

/// Storage for pins and deletion markers.
pub trait FileStore {
    fn add_pin(&self, pin: &FilePin) -> Result<(), StoreError>;

    /// Pins on a piece of content across all owners.
    fn pins_for_content(&self, content_ref: &ItemHash) -> Result<Vec<FilePin>, StoreError>;

    fn remove_pins_for_message(&self, item_hash: &ItemHash) -> Result<(), StoreError>;

    /// Schedule content for deletion. Upserts: a later call moves the
    /// deadline.
    fn schedule_deletion(&self, deletion: &ScheduledDeletion) -> Result<(), StoreError>;

    /// Cancel a marker because the content is now referenced. Returns
    /// `true` if a marker existed.
    fn cancel_deletion(&self, content_ref: &ItemHash) -> Result<bool, StoreError>;

    /// Markers whose deadline has passed, bounded.
    fn due_deletions(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<ScheduledDeletion>, StoreError>;

    fn delete_deletion_marker(&self, content_ref: &ItemHash) -> Result<(), StoreError>;
}
