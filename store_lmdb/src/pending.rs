//! LMDB implementation of the pending message and pending tx queues.

use std::ops::Bound;

use heed::RwTxn;

use ccn_schemas::{PendingMessage, PendingTx};
use ccn_store::pending::{PendingKey, PendingMessageStore, PendingTxStore};
use ccn_store::StoreError;
use ccn_types::{Chain, Timestamp, TxHash};

use crate::environment::{decode, encode, LmdbStore};
use crate::keys::composite;
use crate::LmdbError;

pub(crate) fn pending_main_key(key: &PendingKey) -> Vec<u8> {
    composite(&[
        key.sender.as_str().as_bytes(),
        key.item_hash.as_str().as_bytes(),
        key.signature.as_bytes(),
    ])
}

fn pending_due_key(next_attempt: Timestamp, main_key: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 1 + main_key.len());
    key.extend_from_slice(&next_attempt.as_millis().to_be_bytes());
    key.push(0);
    key.extend_from_slice(main_key);
    key
}

fn tx_main_key(chain: Chain, tx_hash: &TxHash) -> Vec<u8> {
    composite(&[chain.as_str().as_bytes(), tx_hash.as_str().as_bytes()])
}

fn tx_order_key(tx: &PendingTx) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + 1 + 64);
    key.extend_from_slice(&tx.height.to_be_bytes());
    key.extend_from_slice(&tx.time.as_millis().to_be_bytes());
    key.push(0);
    key.extend_from_slice(&tx_main_key(tx.chain, &tx.tx_hash));
    key
}

impl LmdbStore {
    /// Delete a pending row and its due-index entry inside `txn`.
    /// Shared by the standalone delete and the admission batch commit.
    pub(crate) fn delete_pending_in(
        &self,
        txn: &mut RwTxn<'_>,
        key: &PendingKey,
    ) -> Result<(), LmdbError> {
        let main_key = pending_main_key(key);
        if let Some(raw) = self.pending_db.get(txn, &main_key)? {
            let pending: PendingMessage = decode(raw)?;
            self.pending_due_db
                .delete(txn, &pending_due_key(pending.next_attempt, &main_key))?;
            self.pending_db.delete(txn, &main_key)?;
        }
        Ok(())
    }
}

impl PendingMessageStore for LmdbStore {
    fn insert_pending(&self, pending: &PendingMessage) -> Result<bool, StoreError> {
        let key = PendingKey::of(pending);
        let main_key = pending_main_key(&key);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .pending_db
            .get(&wtxn, &main_key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(false);
        }
        let raw = encode(pending)?;
        self.pending_db
            .put(&mut wtxn, &main_key, &raw)
            .map_err(LmdbError::from)?;
        self.pending_due_db
            .put(
                &mut wtxn,
                &pending_due_key(pending.next_attempt, &main_key),
                &main_key,
            )
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn get_pending(&self, key: &PendingKey) -> Result<Option<PendingMessage>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let raw = self
            .pending_db
            .get(&rtxn, &pending_main_key(key))
            .map_err(LmdbError::from)?;
        Ok(raw.map(decode).transpose()?)
    }

    fn delete_pending(&self, key: &PendingKey) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.delete_pending_in(&mut wtxn, key)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn reschedule_pending(
        &self,
        key: &PendingKey,
        retries: u32,
        next_attempt: Timestamp,
    ) -> Result<(), StoreError> {
        let main_key = pending_main_key(key);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let raw = self
            .pending_db
            .get(&wtxn, &main_key)
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("pending {}", key.item_hash)))?;
        let mut pending: PendingMessage = decode(raw)?;

        let old_due = pending_due_key(pending.next_attempt, &main_key);
        // retries and next_attempt only ever grow
        pending.retries = pending.retries.max(retries);
        pending.next_attempt = pending.next_attempt.max(next_attempt);

        let raw = encode(&pending)?;
        self.pending_db
            .put(&mut wtxn, &main_key, &raw)
            .map_err(LmdbError::from)?;
        self.pending_due_db
            .delete(&mut wtxn, &old_due)
            .map_err(LmdbError::from)?;
        self.pending_due_db
            .put(
                &mut wtxn,
                &pending_due_key(pending.next_attempt, &main_key),
                &main_key,
            )
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn due_pending(&self, now: Timestamp, limit: usize) -> Result<Vec<PendingMessage>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        // Everything with next_attempt <= now sorts below this bound.
        let upper = pending_due_key(Timestamp::from_millis(now.as_millis().saturating_add(1)), &[]);
        let bounds = (Bound::Unbounded, Bound::Excluded(upper.as_slice()));
        let iter = self
            .pending_due_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;

        let mut due = Vec::new();
        for result in iter {
            if due.len() >= limit {
                break;
            }
            let (_due_key, main_key) = result.map_err(LmdbError::from)?;
            let raw = self
                .pending_db
                .get(&rtxn, main_key)
                .map_err(LmdbError::from)?
                .ok_or_else(|| LmdbError::Corruption("due index points at missing row".into()))?;
            due.push(decode(raw)?);
        }
        Ok(due)
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.pending_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}

impl PendingTxStore for LmdbStore {
    fn insert_pending_tx(&self, tx: &PendingTx) -> Result<bool, StoreError> {
        let main_key = tx_main_key(tx.chain, &tx.tx_hash);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .pending_txs_db
            .get(&wtxn, &main_key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(false);
        }
        let raw = encode(tx)?;
        self.pending_txs_db
            .put(&mut wtxn, &main_key, &raw)
            .map_err(LmdbError::from)?;
        self.pending_tx_order_db
            .put(&mut wtxn, &tx_order_key(tx), &main_key)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn delete_pending_tx(&self, chain: Chain, tx_hash: &TxHash) -> Result<(), StoreError> {
        let main_key = tx_main_key(chain, tx_hash);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if let Some(raw) = self
            .pending_txs_db
            .get(&wtxn, &main_key)
            .map_err(LmdbError::from)?
        {
            let tx: PendingTx = decode(raw)?;
            self.pending_tx_order_db
                .delete(&mut wtxn, &tx_order_key(&tx))
                .map_err(LmdbError::from)?;
            self.pending_txs_db
                .delete(&mut wtxn, &main_key)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn next_pending_txs(&self, limit: usize) -> Result<Vec<PendingTx>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self
            .pending_tx_order_db
            .iter(&rtxn)
            .map_err(LmdbError::from)?;
        let mut txs = Vec::new();
        for result in iter {
            if txs.len() >= limit {
                break;
            }
            let (_order_key, main_key) = result.map_err(LmdbError::from)?;
            let raw = self
                .pending_txs_db
                .get(&rtxn, main_key)
                .map_err(LmdbError::from)?
                .ok_or_else(|| LmdbError::Corruption("tx order index points at missing row".into()))?;
            txs.push(decode(raw)?);
        }
        Ok(txs)
    }

    fn pending_tx_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.pending_txs_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
