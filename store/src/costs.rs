//! Per-resource cost snapshots.

use ccn_types::{Address, ItemHash, MessageType, PaymentType};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Cost snapshot for one admitted resource, upserted (never duplicated)
/// keyed by `(owner, item_hash, message_type, name)`.
///
/// Amounts are integers in the smallest token unit, already adjusted by the
/// precision scale in force at the message's time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCost {
    pub owner: Address,
    pub item_hash: ItemHash,
    pub message_type: MessageType,
    /// Resource name within the message ("" when the message carries one
    /// unnamed resource).
    pub name: String,
    pub cost_hold: u128,
    pub cost_stream: u128,
    pub cost_credit: u128,
    pub payment_type: PaymentType,
}

/// Storage for cost snapshots, indexed by owner and payment type.
pub trait AccountCostStore {
    fn upsert_cost(&self, cost: &AccountCost) -> Result<(), StoreError>;

    /// All cost rows for an owner with the given payment type.
    fn costs_for_owner(
        &self,
        owner: &Address,
        payment_type: PaymentType,
    ) -> Result<Vec<AccountCost>, StoreError>;

    /// Drop every cost row belonging to one message (forget path).
    fn delete_costs_for_message(
        &self,
        owner: &Address,
        item_hash: &ItemHash,
    ) -> Result<(), StoreError>;

    fn cost_count(&self) -> Result<u64, StoreError>;
}
