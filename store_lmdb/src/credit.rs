//! LMDB implementation of the credit ledger.
//!
//! History entries are append-only under `address ++ created_at ++ seq`,
//! where `seq` is a store-wide counter disambiguating entries created in the
//! same millisecond.

use std::ops::Bound;

use ccn_store::credit::{CachedCreditBalance, CreditEntry, CreditStore};
use ccn_store::StoreError;
use ccn_types::{Address, Timestamp};

use crate::environment::{decode, decode_u64, encode, LmdbStore, META_CREDIT_SEQ};
use crate::keys::{increment_prefix, scan_prefix};
use crate::LmdbError;

fn credit_key(address: &Address, created_at: Timestamp, seq: u64) -> Vec<u8> {
    let addr = address.as_str().as_bytes();
    let mut key = Vec::with_capacity(addr.len() + 1 + 16);
    key.extend_from_slice(addr);
    key.push(0);
    key.extend_from_slice(&created_at.as_millis().to_be_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

impl CreditStore for LmdbStore {
    fn append_credit(&self, entry: &CreditEntry) -> Result<(), StoreError> {
        let raw = encode(entry)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let seq = match self
            .meta_db
            .get(&wtxn, META_CREDIT_SEQ)
            .map_err(LmdbError::from)?
        {
            Some(raw) => decode_u64(raw)?,
            None => 0,
        };
        self.meta_db
            .put(&mut wtxn, META_CREDIT_SEQ, &(seq + 1).to_be_bytes())
            .map_err(LmdbError::from)?;
        self.credit_db
            .put(
                &mut wtxn,
                &credit_key(&entry.address, entry.created_at, seq),
                &raw,
            )
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn credit_history(&self, address: &Address) -> Result<Vec<CreditEntry>, StoreError> {
        let prefix = scan_prefix(&[address.as_str().as_bytes()]);
        let mut upper = prefix.clone();
        increment_prefix(&mut upper);

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (
            Bound::Included(prefix.as_slice()),
            Bound::Excluded(upper.as_slice()),
        );
        let iter = self.credit_db.range(&rtxn, &bounds).map_err(LmdbError::from)?;
        let mut history = Vec::new();
        for result in iter {
            let (_key, raw) = result.map_err(LmdbError::from)?;
            history.push(decode(raw)?);
        }
        // Keys sort by created_at already; the collect preserves it.
        Ok(history)
    }

    fn credit_last_change(&self, address: &Address) -> Result<Option<Timestamp>, StoreError> {
        Ok(self
            .credit_history(address)?
            .last()
            .map(|entry| entry.created_at))
    }

    fn get_cached_credit_balance(
        &self,
        address: &Address,
    ) -> Result<Option<CachedCreditBalance>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let raw = self
            .credit_cache_db
            .get(&rtxn, address.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        Ok(raw.map(decode).transpose()?)
    }

    fn put_cached_credit_balance(
        &self,
        address: &Address,
        cached: CachedCreditBalance,
    ) -> Result<(), StoreError> {
        let raw = encode(&cached)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.credit_cache_db
            .put(&mut wtxn, address.as_str().as_bytes(), &raw)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, LmdbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
        (dir, store)
    }

    fn entry(address: &str, amount: i128, at_ms: u64) -> CreditEntry {
        CreditEntry {
            address: address.into(),
            amount,
            price: 100,
            token: "CCN".into(),
            payment_method: "onchain".into(),
            origin: "purchase".into(),
            created_at: Timestamp::from_millis(at_ms),
            expiration_date: None,
        }
    }

    #[test]
    fn history_is_time_ordered_per_address() {
        let (_dir, store) = open_store();
        store.append_credit(&entry("0xa", 100, 5_000)).unwrap();
        store.append_credit(&entry("0xa", -30, 9_000)).unwrap();
        store.append_credit(&entry("0xa", 50, 7_000)).unwrap();
        store.append_credit(&entry("0xb", 999, 1_000)).unwrap();

        let history = store.credit_history(&"0xa".into()).unwrap();
        let amounts: Vec<i128> = history.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![100, 50, -30]);
        assert_eq!(
            store.credit_last_change(&"0xa".into()).unwrap(),
            Some(Timestamp::from_millis(9_000))
        );
    }

    #[test]
    fn same_millisecond_entries_are_both_kept() {
        let (_dir, store) = open_store();
        store.append_credit(&entry("0xa", 10, 5_000)).unwrap();
        store.append_credit(&entry("0xa", 20, 5_000)).unwrap();
        assert_eq!(store.credit_history(&"0xa".into()).unwrap().len(), 2);
    }

    #[test]
    fn cache_round_trips() {
        let (_dir, store) = open_store();
        let cached = CachedCreditBalance {
            balance: 70,
            as_of: Timestamp::from_millis(9_000),
        };
        store.put_cached_credit_balance(&"0xa".into(), cached).unwrap();
        assert_eq!(
            store.get_cached_credit_balance(&"0xa".into()).unwrap(),
            Some(cached)
        );
        assert_eq!(store.get_cached_credit_balance(&"0xb".into()).unwrap(), None);
    }
}
