//! Abstract storage traits for the CCN node.
//!
//! The relational store is the single source of truth for pipeline state.
//! Every backend (LMDB, in-memory for testing) implements these traits; the
//! rest of the workspace depends only on them. One trait per logical table,
//! mirrored by one database per table in the LMDB backend.

pub mod aggregates;
pub mod balances;
pub mod costs;
pub mod credit;
pub mod cron;
pub mod error;
pub mod files;
pub mod memory;
pub mod messages;
pub mod pending;
pub mod permissions;
pub mod sync;

pub use aggregates::{AggregateElement, AggregateStore};
pub use balances::BalanceStore;
pub use costs::{AccountCost, AccountCostStore};
pub use credit::{CreditEntry, CreditStore};
pub use cron::{CronJob, CronStore};
pub use error::StoreError;
pub use files::{FilePin, FileStore, ScheduledDeletion};
pub use memory::MemoryStore;
pub use messages::MessageStore;
pub use pending::{PendingMessageStore, PendingTxStore};
pub use permissions::{Permission, PermissionKind, PermissionStore};
pub use sync::ChainSyncStore;

/// The full store surface the pipeline runs against.
///
/// An admission commits its whole effect set through [`MessageStore::commit_admission`];
/// the per-table traits cover everything else.
pub trait Store:
    MessageStore
    + PendingMessageStore
    + PendingTxStore
    + AccountCostStore
    + BalanceStore
    + CreditStore
    + PermissionStore
    + FileStore
    + AggregateStore
    + ChainSyncStore
    + CronStore
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: MessageStore
        + PendingMessageStore
        + PendingTxStore
        + AccountCostStore
        + BalanceStore
        + CreditStore
        + PermissionStore
        + FileStore
        + AggregateStore
        + ChainSyncStore
        + CronStore
        + Send
        + Sync
{
}
