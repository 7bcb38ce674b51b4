//! LMDB implementation of account cost snapshots.

use heed::RwTxn;

use ccn_store::costs::{AccountCost, AccountCostStore};
use ccn_store::StoreError;
use ccn_types::{Address, ItemHash, PaymentType};

use crate::environment::{decode, encode, LmdbStore};
use crate::keys::{composite, increment_prefix, scan_prefix};
use crate::LmdbError;

fn cost_key(cost: &AccountCost) -> Vec<u8> {
    composite(&[
        cost.owner.as_str().as_bytes(),
        cost.item_hash.as_str().as_bytes(),
        cost.message_type.as_str().as_bytes(),
        cost.name.as_bytes(),
    ])
}

impl LmdbStore {
    pub(crate) fn upsert_cost_in(
        &self,
        txn: &mut RwTxn<'_>,
        cost: &AccountCost,
    ) -> Result<(), LmdbError> {
        let raw = encode(cost)?;
        self.costs_db.put(txn, &cost_key(cost), &raw)?;
        Ok(())
    }

    pub(crate) fn delete_costs_for_message_in(
        &self,
        txn: &mut RwTxn<'_>,
        owner: &Address,
        item_hash: &ItemHash,
    ) -> Result<(), LmdbError> {
        let prefix = scan_prefix(&[owner.as_str().as_bytes(), item_hash.as_str().as_bytes()]);
        let mut upper = prefix.clone();
        increment_prefix(&mut upper);
        let keys: Vec<Vec<u8>> = {
            let bounds = (
                std::ops::Bound::Included(prefix.as_slice()),
                std::ops::Bound::Excluded(upper.as_slice()),
            );
            let iter = self.costs_db.range(txn, &bounds)?;
            iter.map(|r| r.map(|(k, _)| k.to_vec()))
                .collect::<Result<_, _>>()?
        };
        for key in keys {
            self.costs_db.delete(txn, &key)?;
        }
        Ok(())
    }
}

impl AccountCostStore for LmdbStore {
    fn upsert_cost(&self, cost: &AccountCost) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.upsert_cost_in(&mut wtxn, cost)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn costs_for_owner(
        &self,
        owner: &Address,
        payment_type: PaymentType,
    ) -> Result<Vec<AccountCost>, StoreError> {
        let prefix = scan_prefix(&[owner.as_str().as_bytes()]);
        let mut upper = prefix.clone();
        increment_prefix(&mut upper);

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (
            std::ops::Bound::Included(prefix.as_slice()),
            std::ops::Bound::Excluded(upper.as_slice()),
        );
        let iter = self.costs_db.range(&rtxn, &bounds).map_err(LmdbError::from)?;
        let mut costs = Vec::new();
        for result in iter {
            let (_key, raw) = result.map_err(LmdbError::from)?;
            let cost: AccountCost = decode(raw)?;
            if cost.payment_type == payment_type {
                costs.push(cost);
            }
        }
        Ok(costs)
    }

    fn delete_costs_for_message(
        &self,
        owner: &Address,
        item_hash: &ItemHash,
    ) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.delete_costs_for_message_in(&mut wtxn, owner, item_hash)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn cost_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.costs_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
