//! LMDB implementation of aggregate element storage.

use std::ops::Bound;

use heed::RwTxn;

use ccn_store::aggregates::{AggregateElement, AggregateStore};
use ccn_store::StoreError;
use ccn_types::Address;

use crate::environment::{decode, encode, LmdbStore};
use crate::keys::{composite, increment_prefix, scan_prefix};
use crate::LmdbError;

fn element_key(element: &AggregateElement) -> Vec<u8> {
    composite(&[
        element.owner.as_str().as_bytes(),
        element.key.as_bytes(),
        element.item_hash.as_str().as_bytes(),
    ])
}

impl LmdbStore {
    pub(crate) fn insert_aggregate_element_in(
        &self,
        txn: &mut RwTxn<'_>,
        element: &AggregateElement,
    ) -> Result<bool, LmdbError> {
        let key = element_key(element);
        if self.aggregates_db.get(txn, &key)?.is_some() {
            return Ok(false);
        }
        let raw = encode(element)?;
        self.aggregates_db.put(txn, &key, &raw)?;
        Ok(true)
    }
}

impl AggregateStore for LmdbStore {
    fn insert_aggregate_element(&self, element: &AggregateElement) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let inserted = self.insert_aggregate_element_in(&mut wtxn, element)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(inserted)
    }

    fn aggregate_elements(
        &self,
        owner: &Address,
        key: &str,
    ) -> Result<Vec<AggregateElement>, StoreError> {
        let prefix = scan_prefix(&[owner.as_str().as_bytes(), key.as_bytes()]);
        let mut upper = prefix.clone();
        increment_prefix(&mut upper);

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (
            Bound::Included(prefix.as_slice()),
            Bound::Excluded(upper.as_slice()),
        );
        let iter = self
            .aggregates_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        let mut elements: Vec<AggregateElement> = Vec::new();
        for result in iter {
            let (_key, raw) = result.map_err(LmdbError::from)?;
            elements.push(decode(raw)?);
        }
        elements.sort_by(|a, b| (a.time, &a.item_hash).cmp(&(b.time, &b.item_hash)));
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccn_store::aggregates::merged_view;
    use ccn_types::Timestamp;
    use serde_json::json;

    fn open_store() -> (tempfile::TempDir, LmdbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
        (dir, store)
    }

    fn element(hash: &str, time_ms: u64, content: serde_json::Value) -> AggregateElement {
        AggregateElement {
            owner: "0xowner".into(),
            key: "profile".into(),
            item_hash: hash.into(),
            time: Timestamp::from_millis(time_ms),
            content,
        }
    }

    const H1: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const H2: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    #[test]
    fn reinsert_is_idempotent() {
        let (_dir, store) = open_store();
        let el = element(H1, 1_000, json!({"a": 1}));
        assert!(store.insert_aggregate_element(&el).unwrap());
        assert!(!store.insert_aggregate_element(&el).unwrap());
        assert_eq!(store.aggregate_elements(&"0xowner".into(), "profile").unwrap().len(), 1);
    }

    #[test]
    fn merged_view_over_stored_elements() {
        let (_dir, store) = open_store();
        store
            .insert_aggregate_element(&element(H2, 2_000, json!({"name": "new"})))
            .unwrap();
        store
            .insert_aggregate_element(&element(H1, 1_000, json!({"name": "old", "bio": "kept"})))
            .unwrap();

        let elements = store.aggregate_elements(&"0xowner".into(), "profile").unwrap();
        assert_eq!(merged_view(&elements), json!({"name": "new", "bio": "kept"}));
    }

    #[test]
    fn keys_do_not_leak_across_aggregate_names() {
        let (_dir, store) = open_store();
        let mut other = element(H1, 1_000, json!({"a": 1}));
        other.key = "settings".into();
        store.insert_aggregate_element(&other).unwrap();
        assert!(store.aggregate_elements(&"0xowner".into(), "profile").unwrap().is_empty());
    }
}
