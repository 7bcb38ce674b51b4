//! Token balances, ingested from the designated balance-sync aggregate.

use ccn_types::Address;

use crate::StoreError;

/// Latest known token balance per address, in smallest units.
pub trait BalanceStore {
    fn get_balance(&self, address: &Address) -> Result<u128, StoreError>;
    fn put_balance(&self, address: &Address, amount: u128) -> Result<(), StoreError>;
}
