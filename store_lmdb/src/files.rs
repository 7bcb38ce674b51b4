//! LMDB implementation of file pins and scheduled deletions.

use std::ops::Bound;

use heed::RwTxn;

use ccn_store::files::{FilePin, FileStore, ScheduledDeletion};
use ccn_store::StoreError;
use ccn_types::{ItemHash, Timestamp};

use crate::environment::{decode, encode, LmdbStore};
use crate::keys::{composite, increment_prefix, scan_prefix};
use crate::LmdbError;

fn pin_key(pin: &FilePin) -> Vec<u8> {
    composite(&[
        pin.content_ref.as_str().as_bytes(),
        pin.item_hash.as_str().as_bytes(),
    ])
}

fn pin_by_msg_key(pin: &FilePin) -> Vec<u8> {
    composite(&[
        pin.item_hash.as_str().as_bytes(),
        pin.content_ref.as_str().as_bytes(),
    ])
}

fn deletion_due_key(deletion: &ScheduledDeletion) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + deletion.content_ref.as_str().len());
    key.extend_from_slice(&deletion.delete_by.as_millis().to_be_bytes());
    key.extend_from_slice(deletion.content_ref.as_str().as_bytes());
    key
}

impl LmdbStore {
    pub(crate) fn add_pin_in(&self, txn: &mut RwTxn<'_>, pin: &FilePin) -> Result<(), LmdbError> {
        let raw = encode(pin)?;
        self.pins_db.put(txn, &pin_key(pin), &raw)?;
        self.pins_by_msg_db.put(txn, &pin_by_msg_key(pin), &[])?;
        Ok(())
    }

    pub(crate) fn schedule_deletion_in(
        &self,
        txn: &mut RwTxn<'_>,
        deletion: &ScheduledDeletion,
    ) -> Result<(), LmdbError> {
        let key = deletion.content_ref.as_str().as_bytes();
        // Upsert: drop a previous marker's due-index entry first.
        if let Some(raw) = self.deletions_db.get(txn, key)? {
            let existing: ScheduledDeletion = decode(raw)?;
            self.deletions_due_db.delete(txn, &deletion_due_key(&existing))?;
        }
        let raw = encode(deletion)?;
        self.deletions_db.put(txn, key, &raw)?;
        self.deletions_due_db.put(txn, &deletion_due_key(deletion), &[])?;
        Ok(())
    }

    pub(crate) fn remove_pins_for_message_in(
        &self,
        txn: &mut RwTxn<'_>,
        item_hash: &ItemHash,
    ) -> Result<(), LmdbError> {
        let prefix = scan_prefix(&[item_hash.as_str().as_bytes()]);
        let mut upper = prefix.clone();
        increment_prefix(&mut upper);
        let index_keys: Vec<Vec<u8>> = {
            let bounds = (
                Bound::Included(prefix.as_slice()),
                Bound::Excluded(upper.as_slice()),
            );
            let iter = self.pins_by_msg_db.range(txn, &bounds)?;
            iter.map(|r| r.map(|(k, _)| k.to_vec()))
                .collect::<Result<_, _>>()?
        };
        for index_key in index_keys {
            // item_hash ++ 0x00 ++ content_ref  →  content_ref ++ 0x00 ++ item_hash
            let hash_len = item_hash.as_str().len();
            let content_ref = &index_key[hash_len + 1..];
            let main_key = composite(&[content_ref, item_hash.as_str().as_bytes()]);
            self.pins_db.delete(txn, &main_key)?;
            self.pins_by_msg_db.delete(txn, &index_key)?;
        }
        Ok(())
    }

    pub(crate) fn cancel_deletion_in(
        &self,
        txn: &mut RwTxn<'_>,
        content_ref: &ItemHash,
    ) -> Result<bool, LmdbError> {
        let key = content_ref.as_str().as_bytes();
        let Some(raw) = self.deletions_db.get(txn, key)? else {
            return Ok(false);
        };
        let existing: ScheduledDeletion = decode(raw)?;
        self.deletions_due_db.delete(txn, &deletion_due_key(&existing))?;
        self.deletions_db.delete(txn, key)?;
        Ok(true)
    }
}

impl FileStore for LmdbStore {
    fn add_pin(&self, pin: &FilePin) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.add_pin_in(&mut wtxn, pin)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn pins_for_content(&self, content_ref: &ItemHash) -> Result<Vec<FilePin>, StoreError> {
        let prefix = scan_prefix(&[content_ref.as_str().as_bytes()]);
        let mut upper = prefix.clone();
        increment_prefix(&mut upper);

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (
            Bound::Included(prefix.as_slice()),
            Bound::Excluded(upper.as_slice()),
        );
        let iter = self.pins_db.range(&rtxn, &bounds).map_err(LmdbError::from)?;
        let mut pins = Vec::new();
        for result in iter {
            let (_key, raw) = result.map_err(LmdbError::from)?;
            pins.push(decode(raw)?);
        }
        Ok(pins)
    }

    fn remove_pins_for_message(&self, item_hash: &ItemHash) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.remove_pins_for_message_in(&mut wtxn, item_hash)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn schedule_deletion(&self, deletion: &ScheduledDeletion) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.schedule_deletion_in(&mut wtxn, deletion)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn cancel_deletion(&self, content_ref: &ItemHash) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let cancelled = self.cancel_deletion_in(&mut wtxn, content_ref)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(cancelled)
    }

    fn due_deletions(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<ScheduledDeletion>, StoreError> {
        let upper = (now.as_millis().saturating_add(1)).to_be_bytes();
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bounds = (Bound::Unbounded, Bound::Excluded(upper.as_slice()));
        let iter = self
            .deletions_due_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        let mut due = Vec::new();
        for result in iter {
            if due.len() >= limit {
                break;
            }
            let (key, _) = result.map_err(LmdbError::from)?;
            let content_ref = std::str::from_utf8(&key[8..])
                .map_err(|_| LmdbError::Corruption("deletion index key is not UTF-8".into()))?;
            let raw = self
                .deletions_db
                .get(&rtxn, content_ref.as_bytes())
                .map_err(LmdbError::from)?
                .ok_or_else(|| {
                    LmdbError::Corruption("deletion index points at missing marker".into())
                })?;
            due.push(decode(raw)?);
        }
        Ok(due)
    }

    fn delete_deletion_marker(&self, content_ref: &ItemHash) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.cancel_deletion_in(&mut wtxn, content_ref)?;
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

    const CONTENT: &str = "9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44";
    const MSG: &str = "1111111111111111111111111111111111111111111111111111111111111111";

    fn pin() -> FilePin {
        FilePin {
            content_ref: CONTENT.into(),
            owner: "0xa".into(),
            item_hash: MSG.into(),
            size: 2048,
            created_at: Timestamp::from_millis(1_000),
        }
    }

    #[test]
    fn pins_found_by_content_and_removed_by_message() {
        let (_dir, store) = open_store();
        store.add_pin(&pin()).unwrap();
        assert_eq!(store.pins_for_content(&CONTENT.into()).unwrap().len(), 1);

        store.remove_pins_for_message(&MSG.into()).unwrap();
        assert!(store.pins_for_content(&CONTENT.into()).unwrap().is_empty());
    }

    #[test]
    fn deletion_markers_due_in_deadline_order() {
        let (_dir, store) = open_store();
        store
            .schedule_deletion(&ScheduledDeletion {
                content_ref: CONTENT.into(),
                delete_by: Timestamp::from_millis(5_000),
            })
            .unwrap();
        store
            .schedule_deletion(&ScheduledDeletion {
                content_ref: MSG.into(),
                delete_by: Timestamp::from_millis(3_000),
            })
            .unwrap();

        let due = store.due_deletions(Timestamp::from_millis(10_000), 10).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].content_ref.as_str(), MSG);

        assert!(store.due_deletions(Timestamp::from_millis(2_999), 10).unwrap().is_empty());
    }

    #[test]
    fn cancel_reports_whether_marker_existed() {
        let (_dir, store) = open_store();
        store
            .schedule_deletion(&ScheduledDeletion {
                content_ref: CONTENT.into(),
                delete_by: Timestamp::from_millis(5_000),
            })
            .unwrap();
        assert!(store.cancel_deletion(&CONTENT.into()).unwrap());
        assert!(!store.cancel_deletion(&CONTENT.into()).unwrap());
        assert!(store.due_deletions(Timestamp::from_millis(99_000), 10).unwrap().is_empty());
    }

    #[test]
    fn rescheduling_moves_the_deadline() {
        let (_dir, store) = open_store();
        let early = ScheduledDeletion {
            content_ref: CONTENT.into(),
            delete_by: Timestamp::from_millis(5_000),
        };
        let late = ScheduledDeletion {
            content_ref: CONTENT.into(),
            delete_by: Timestamp::from_millis(50_000),
        };
        store.schedule_deletion(&early).unwrap();
        store.schedule_deletion(&late).unwrap();

        // The early index entry is gone; only the new deadline fires.
        assert!(store.due_deletions(Timestamp::from_millis(10_000), 10).unwrap().is_empty());
        assert_eq!(store.due_deletions(Timestamp::from_millis(60_000), 10).unwrap().len(), 1);
    }
}
