//! In-memory store backend.
//!
//! Implements every storage trait behind a single mutex. Used by unit and
//! integration tests; the whole-batch commit is atomic because the lock is
//! held for the duration of the commit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ccn_schemas::{Message, PendingMessage, PendingTx, RejectedMessage};
use ccn_types::{Address, Chain, ItemHash, MessageType, PaymentType, Timestamp, TxHash};

use crate::aggregates::{AggregateElement, AggregateStore};
use crate::balances::BalanceStore;
use crate::costs::{AccountCost, AccountCostStore};
use crate::credit::{CachedCreditBalance, CreditEntry, CreditStore};
use crate::cron::{CronJob, CronStore};
use crate::files::{FilePin, FileStore, ScheduledDeletion};
use crate::messages::{AdmissionBatch, MessageStore};
use crate::pending::{PendingKey, PendingMessageStore, PendingTxStore};
use crate::permissions::{Permission, PermissionStore};
use crate::sync::ChainSyncStore;
use crate::StoreError;

#[derive(Default)]
struct Inner {
    messages: HashMap<ItemHash, Message>,
    rejections: HashMap<ItemHash, RejectedMessage>,
    claims: HashMap<ItemHash, u64>,
    pending: HashMap<PendingKey, PendingMessage>,
    pending_txs: HashMap<(Chain, TxHash), PendingTx>,
    costs: HashMap<(Address, ItemHash, MessageType, String), AccountCost>,
    balances: HashMap<Address, u128>,
    credit: HashMap<Address, Vec<CreditEntry>>,
    credit_cache: HashMap<Address, CachedCreditBalance>,
    permissions: HashMap<(Address, Address), Vec<Permission>>,
    pins: Vec<FilePin>,
    deletions: HashMap<ItemHash, ScheduledDeletion>,
    aggregates: HashMap<(Address, String), Vec<AggregateElement>>,
    heights: HashMap<Chain, u64>,
    cron: HashMap<String, CronJob>,
}

/// In-memory backend for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_batch(inner: &mut Inner, batch: AdmissionBatch) {
        if let Some(message) = batch.message {
            inner.messages.insert(message.item_hash.clone(), message);
        }
        for message in batch.updated_messages {
            inner.messages.insert(message.item_hash.clone(), message);
        }
        if let Some(key) = batch.delete_pending {
            inner.pending.remove(&key);
        }
        for cost in batch.costs {
            let key = (
                cost.owner.clone(),
                cost.item_hash.clone(),
                cost.message_type,
                cost.name.clone(),
            );
            inner.costs.insert(key, cost);
        }
        if let Some(element) = batch.aggregate_element {
            let key = (element.owner.clone(), element.key.clone());
            let elements = inner.aggregates.entry(key).or_default();
            if !elements.iter().any(|e| e.item_hash == element.item_hash) {
                elements.push(element);
            }
        }
        for pin in batch.pins {
            let duplicate = inner
                .pins
                .iter()
                .any(|p| p.item_hash == pin.item_hash && p.content_ref == pin.content_ref);
            if !duplicate {
                inner.pins.push(pin);
            }
        }
        for content_ref in batch.cancel_deletions {
            inner.deletions.remove(&content_ref);
        }
        for item_hash in batch.mark_removed {
            if let Some(message) = inner.messages.get_mut(&item_hash) {
                message.status = ccn_schemas::MessageStatus::Removed;
            }
        }
        for deletion in batch.schedule_deletions {
            inner.deletions.insert(deletion.content_ref.clone(), deletion);
        }
        for item_hash in batch.remove_pins {
            inner.pins.retain(|p| p.item_hash != item_hash);
        }
        for (owner, item_hash) in batch.delete_costs {
            inner
                .costs
                .retain(|(o, h, _, _), _| !(*o == owner && *h == item_hash));
        }
        for (address, amount) in batch.balances {
            inner.balances.insert(address, amount);
        }
    }
}

impl MessageStore for MemoryStore {
    fn get_message(&self, item_hash: &ItemHash) -> Result<Option<Message>, StoreError> {
        Ok(self.lock().messages.get(item_hash).cloned())
    }

    fn message_exists(&self, item_hash: &ItemHash) -> Result<bool, StoreError> {
        Ok(self.lock().messages.contains_key(item_hash))
    }

    fn message_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock().messages.len() as u64)
    }

    fn put_message(&self, message: &Message) -> Result<(), StoreError> {
        self.lock()
            .messages
            .insert(message.item_hash.clone(), message.clone());
        Ok(())
    }

    fn commit_admission(&self, batch: AdmissionBatch) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::apply_batch(&mut inner, batch);
        Ok(())
    }

    fn commit_rejection(
        &self,
        rejection: &RejectedMessage,
        delete_pending: Option<&PendingKey>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .rejections
            .insert(rejection.item_hash.clone(), rejection.clone());
        if let Some(key) = delete_pending {
            inner.pending.remove(key);
        }
        Ok(())
    }

    fn get_rejection(&self, item_hash: &ItemHash) -> Result<Option<RejectedMessage>, StoreError> {
        Ok(self.lock().rejections.get(item_hash).cloned())
    }

    fn try_claim(
        &self,
        item_hash: &ItemHash,
        now_millis: u64,
        ttl_millis: u64,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.claims.get(item_hash) {
            Some(&expires) if expires > now_millis => Ok(false),
            _ => {
                inner
                    .claims
                    .insert(item_hash.clone(), now_millis.saturating_add(ttl_millis));
                Ok(true)
            }
        }
    }

    fn release_claim(&self, item_hash: &ItemHash) -> Result<(), StoreError> {
        self.lock().claims.remove(item_hash);
        Ok(())
    }
}

impl PendingMessageStore for MemoryStore {
    fn insert_pending(&self, pending: &PendingMessage) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let key = PendingKey::of(pending);
        if inner.pending.contains_key(&key) {
            return Ok(false);
        }
        inner.pending.insert(key, pending.clone());
        Ok(true)
    }

    fn get_pending(&self, key: &PendingKey) -> Result<Option<PendingMessage>, StoreError> {
        Ok(self.lock().pending.get(key).cloned())
    }

    fn delete_pending(&self, key: &PendingKey) -> Result<(), StoreError> {
        self.lock().pending.remove(key);
        Ok(())
    }

    fn reschedule_pending(
        &self,
        key: &PendingKey,
        retries: u32,
        next_attempt: Timestamp,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let pending = inner
            .pending
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("pending {}", key.item_hash)))?;
        pending.retries = pending.retries.max(retries);
        pending.next_attempt = pending.next_attempt.max(next_attempt);
        Ok(())
    }

    fn due_pending(&self, now: Timestamp, limit: usize) -> Result<Vec<PendingMessage>, StoreError> {
        let inner = self.lock();
        let mut due: Vec<PendingMessage> = inner
            .pending
            .values()
            .filter(|p| p.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.next_attempt);
        due.truncate(limit);
        Ok(due)
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock().pending.len() as u64)
    }
}

impl PendingTxStore for MemoryStore {
    fn insert_pending_tx(&self, tx: &PendingTx) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let key = (tx.chain, tx.tx_hash.clone());
        if inner.pending_txs.contains_key(&key) {
            return Ok(false);
        }
        inner.pending_txs.insert(key, tx.clone());
        Ok(true)
    }

    fn delete_pending_tx(&self, chain: Chain, tx_hash: &TxHash) -> Result<(), StoreError> {
        self.lock().pending_txs.remove(&(chain, tx_hash.clone()));
        Ok(())
    }

    fn next_pending_txs(&self, limit: usize) -> Result<Vec<PendingTx>, StoreError> {
        let inner = self.lock();
        let mut txs: Vec<PendingTx> = inner.pending_txs.values().cloned().collect();
        txs.sort_by_key(|tx| (tx.height, tx.time));
        txs.truncate(limit);
        Ok(txs)
    }

    fn pending_tx_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock().pending_txs.len() as u64)
    }
}

impl AccountCostStore for MemoryStore {
    fn upsert_cost(&self, cost: &AccountCost) -> Result<(), StoreError> {
        let key = (
            cost.owner.clone(),
            cost.item_hash.clone(),
            cost.message_type,
            cost.name.clone(),
        );
        self.lock().costs.insert(key, cost.clone());
        Ok(())
    }

    fn costs_for_owner(
        &self,
        owner: &Address,
        payment_type: PaymentType,
    ) -> Result<Vec<AccountCost>, StoreError> {
        Ok(self
            .lock()
            .costs
            .values()
            .filter(|c| &c.owner == owner && c.payment_type == payment_type)
            .cloned()
            .collect())
    }

    fn delete_costs_for_message(
        &self,
        owner: &Address,
        item_hash: &ItemHash,
    ) -> Result<(), StoreError> {
        self.lock()
            .costs
            .retain(|(o, h, _, _), _| !(o == owner && h == item_hash));
        Ok(())
    }

    fn cost_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock().costs.len() as u64)
    }
}

impl BalanceStore for MemoryStore {
    fn get_balance(&self, address: &Address) -> Result<u128, StoreError> {
        Ok(self.lock().balances.get(address).copied().unwrap_or(0))
    }

    fn put_balance(&self, address: &Address, amount: u128) -> Result<(), StoreError> {
        self.lock().balances.insert(address.clone(), amount);
        Ok(())
    }
}

impl CreditStore for MemoryStore {
    fn append_credit(&self, entry: &CreditEntry) -> Result<(), StoreError> {
        self.lock()
            .credit
            .entry(entry.address.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn credit_history(&self, address: &Address) -> Result<Vec<CreditEntry>, StoreError> {
        let mut history = self
            .lock()
            .credit
            .get(address)
            .cloned()
            .unwrap_or_default();
        history.sort_by_key(|e| e.created_at);
        Ok(history)
    }

    fn credit_last_change(&self, address: &Address) -> Result<Option<Timestamp>, StoreError> {
        Ok(self
            .lock()
            .credit
            .get(address)
            .and_then(|entries| entries.iter().map(|e| e.created_at).max()))
    }

    fn get_cached_credit_balance(
        &self,
        address: &Address,
    ) -> Result<Option<CachedCreditBalance>, StoreError> {
        Ok(self.lock().credit_cache.get(address).copied())
    }

    fn put_cached_credit_balance(
        &self,
        address: &Address,
        cached: CachedCreditBalance,
    ) -> Result<(), StoreError> {
        self.lock().credit_cache.insert(address.clone(), cached);
        Ok(())
    }
}

impl PermissionStore for MemoryStore {
    fn put_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        self.lock()
            .permissions
            .entry((permission.owner.clone(), permission.grantee.clone()))
            .or_default()
            .push(permission.clone());
        Ok(())
    }

    fn grants_for(
        &self,
        owner: &Address,
        grantee: &Address,
    ) -> Result<Vec<Permission>, StoreError> {
        Ok(self
            .lock()
            .permissions
            .get(&(owner.clone(), grantee.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

impl FileStore for MemoryStore {
    fn add_pin(&self, pin: &FilePin) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let duplicate = inner
            .pins
            .iter()
            .any(|p| p.item_hash == pin.item_hash && p.content_ref == pin.content_ref);
        if !duplicate {
            inner.pins.push(pin.clone());
        }
        Ok(())
    }

    fn pins_for_content(&self, content_ref: &ItemHash) -> Result<Vec<FilePin>, StoreError> {
        Ok(self
            .lock()
            .pins
            .iter()
            .filter(|p| &p.content_ref == content_ref)
            .cloned()
            .collect())
    }

    fn remove_pins_for_message(&self, item_hash: &ItemHash) -> Result<(), StoreError> {
        self.lock().pins.retain(|p| &p.item_hash != item_hash);
        Ok(())
    }

    fn schedule_deletion(&self, deletion: &ScheduledDeletion) -> Result<(), StoreError> {
        self.lock()
            .deletions
            .insert(deletion.content_ref.clone(), deletion.clone());
        Ok(())
    }

    fn cancel_deletion(&self, content_ref: &ItemHash) -> Result<bool, StoreError> {
        Ok(self.lock().deletions.remove(content_ref).is_some())
    }

    fn due_deletions(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<ScheduledDeletion>, StoreError> {
        let inner = self.lock();
        let mut due: Vec<ScheduledDeletion> = inner
            .deletions
            .values()
            .filter(|d| d.delete_by <= now)
            .cloned()
            .collect();
        due.sort_by_key(|d| d.delete_by);
        due.truncate(limit);
        Ok(due)
    }

    fn delete_deletion_marker(&self, content_ref: &ItemHash) -> Result<(), StoreError> {
        self.lock().deletions.remove(content_ref);
        Ok(())
    }
}

impl AggregateStore for MemoryStore {
    fn insert_aggregate_element(&self, element: &AggregateElement) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let key = (element.owner.clone(), element.key.clone());
        let elements = inner.aggregates.entry(key).or_default();
        if elements.iter().any(|e| e.item_hash == element.item_hash) {
            return Ok(false);
        }
        elements.push(element.clone());
        Ok(true)
    }

    fn aggregate_elements(
        &self,
        owner: &Address,
        key: &str,
    ) -> Result<Vec<AggregateElement>, StoreError> {
        let mut elements = self
            .lock()
            .aggregates
            .get(&(owner.clone(), key.to_string()))
            .cloned()
            .unwrap_or_default();
        elements.sort_by(|a, b| (a.time, &a.item_hash).cmp(&(b.time, &b.item_hash)));
        Ok(elements)
    }
}

impl ChainSyncStore for MemoryStore {
    fn get_height(&self, chain: Chain) -> Result<Option<u64>, StoreError> {
        Ok(self.lock().heights.get(&chain).copied())
    }

    fn advance_height(&self, chain: Chain, height: u64) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let entry = inner.heights.entry(chain).or_insert(0);
        *entry = (*entry).max(height);
        Ok(*entry)
    }
}

impl CronStore for MemoryStore {
    fn get_cron_job(&self, id: &str) -> Result<Option<CronJob>, StoreError> {
        Ok(self.lock().cron.get(id).cloned())
    }

    fn upsert_cron_job(&self, job: &CronJob) -> Result<(), StoreError> {
        self.lock().cron.insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn list_cron_jobs(&self) -> Result<Vec<CronJob>, StoreError> {
        let mut jobs: Vec<CronJob> = self.lock().cron.values().cloned().collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }
}
