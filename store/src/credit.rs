//! Credit ledger: append-only grants/expenses and a derived balance cache.

use ccn_types::{Address, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// One credit ledger entry. Positive `amount` grants credit, negative
/// spends it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreditEntry {
    pub address: Address,
    pub amount: i128,
    /// Token price at grant time, smallest units per credit.
    pub price: u128,
    pub token: String,
    pub payment_method: String,
    /// Where the grant came from (on-chain purchase, voucher, …).
    pub origin: String,
    pub created_at: Timestamp,
    /// Grants expire; expenses carry `None`.
    pub expiration_date: Option<Timestamp>,
}

/// Cached credit balance, valid only while no ledger entry is newer than
/// `as_of`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedCreditBalance {
    pub balance: i128,
    pub as_of: Timestamp,
}

/// Storage for the credit ledger.
pub trait CreditStore {
    fn append_credit(&self, entry: &CreditEntry) -> Result<(), StoreError>;

    /// Full history for an address, ascending by `created_at`.
    fn credit_history(&self, address: &Address) -> Result<Vec<CreditEntry>, StoreError>;

    /// Creation time of the newest ledger entry for an address.
    fn credit_last_change(&self, address: &Address) -> Result<Option<Timestamp>, StoreError>;

    fn get_cached_credit_balance(
        &self,
        address: &Address,
    ) -> Result<Option<CachedCreditBalance>, StoreError>;

    fn put_cached_credit_balance(
        &self,
        address: &Address,
        cached: CachedCreditBalance,
    ) -> Result<(), StoreError>;
}
