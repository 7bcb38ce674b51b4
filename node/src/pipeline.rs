//! The admission pipeline.
//!
//! Two entry points: [`Pipeline::process_candidate`] admits one candidate
//! message through the gate sequence (signature → content → permission →
//! cost → apply), and [`Pipeline::process_pending_tx`] expands an on-chain
//! transaction into candidates and confirmation evidence.
//!
//! Outcome classification is deliberate: validation, permission, and
//! economic failures are permanent; dependency-availability failures are
//! transient; and anything unrecognized defaults to transient so a bug can
//! never silently destroy a message.

use std::sync::Arc;

use ccn_chainsync::{confirm, confirmation_of, expand};
use ccn_content::{ContentError, ContentStorage};
use ccn_cost::{compute_cost, validate_balance, CostError, CostPolicy, PricingTable};
use ccn_permissions::{is_authorized, AuthRequest, CrudOp};
use ccn_schemas::{
    CandidateMessage, Confirmation, MessageContent, Origin, PendingMessage, PendingTx,
    RejectedMessage,
};
use ccn_store::aggregates::merged_view;
use ccn_store::costs::AccountCost;
use ccn_store::pending::PendingKey;
use ccn_store::{AggregateStore, MessageStore, PendingMessageStore, PendingTxStore, Store};
use ccn_types::{Address, ErrorCode, ItemType, MessageType, Timestamp};
use ccn_verifiers::{Registry, VerifierError};

use crate::applier::{build_batch, ApplyContext, ApplyError};
use crate::config::NodeConfig;
use crate::retry::{schedule_retry, RetryPolicy};

/// Aggregate key the pricing table is published under.
const PRICING_KEY: &str = "pricing";

/// Result of one admission attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Admitted and durably applied; the pending row is gone.
    Applied,
    /// Permanently rejected and recorded; the pending row is gone.
    Rejected(ErrorCode),
    /// Transient failure; the pending row stays and backs off.
    Retry(ErrorCode),
}

/// Result of processing one pending chain transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    /// Expanded; this many new candidates were queued.
    Expanded(usize),
    /// A dependency was unavailable; the transaction stays queued.
    Deferred,
    /// Undecodable payload; the transaction was dropped for good.
    Dropped,
}

/// The orchestrator: validates candidates and commits their effects.
pub struct Pipeline {
    store: Arc<dyn Store>,
    registry: Registry,
    content: Arc<dyn ContentStorage>,
    policy: CostPolicy,
    retry_policy: RetryPolicy,
    pricing_owner: Address,
    balance_sync_address: Address,
    grace_period_secs: u64,
    claim_ttl_millis: u64,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Registry,
        content: Arc<dyn ContentStorage>,
        config: &NodeConfig,
    ) -> Self {
        Self {
            store,
            registry,
            content,
            policy: config.cost_policy(),
            retry_policy: RetryPolicy {
                base_secs: config.retry_base_secs,
                max_secs: config.retry_max_secs,
                alert_threshold: config.retry_alert_threshold,
            },
            pricing_owner: config.pricing_owner.clone(),
            balance_sync_address: config.balance_sync_address.clone(),
            grace_period_secs: config.grace_period_secs,
            claim_ttl_millis: config.claim_ttl_secs.saturating_mul(1_000),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Admit one candidate message.
    ///
    /// `pending_key` is the queue row consumed on success or permanent
    /// rejection; `confirmation` is recorded when the candidate came out of
    /// a chain transaction. At most one admission runs per item hash at a
    /// time, enforced through the store-level claim.
    pub fn process_candidate(
        &self,
        candidate: &CandidateMessage,
        pending_key: Option<&PendingKey>,
        confirmation: Option<Confirmation>,
    ) -> Outcome {
        let now = Timestamp::now();
        match self
            .store
            .try_claim(&candidate.item_hash, now.as_millis(), self.claim_ttl_millis)
        {
            Ok(true) => {}
            // Another worker is on it; come back after its claim resolves.
            Ok(false) => return Outcome::Retry(ErrorCode::InternalError),
            Err(err) => {
                tracing::warn!(%err, item_hash = %candidate.item_hash, "claim failed");
                return Outcome::Retry(ErrorCode::StorageBackendError);
            }
        }

        let outcome = self.admit(candidate, pending_key, confirmation, now);

        if let Err(err) = self.store.release_claim(&candidate.item_hash) {
            tracing::warn!(%err, item_hash = %candidate.item_hash, "claim release failed");
        }
        outcome
    }

    /// Process a queued pending message, scheduling the retry on transient
    /// failure.
    pub fn process_pending(&self, pending: &PendingMessage) -> Outcome {
        let key = PendingKey::of(pending);
        let outcome =
            self.process_candidate(&pending.candidate, Some(&key), pending.confirmation.clone());
        if let Outcome::Retry(code) = outcome {
            if let Err(err) = schedule_retry(
                self.store.as_ref(),
                pending,
                code,
                &self.retry_policy,
                Timestamp::now(),
            ) {
                tracing::warn!(%err, item_hash = %pending.candidate.item_hash, "reschedule failed");
            }
        }
        outcome
    }

    fn admit(
        &self,
        candidate: &CandidateMessage,
        pending_key: Option<&PendingKey>,
        confirmation: Option<Confirmation>,
        now: Timestamp,
    ) -> Outcome {
        // Gate 1: signature.
        match self.registry.verify(candidate) {
            Ok(true) => {}
            Ok(false) => {
                return self.reject(candidate, pending_key, ErrorCode::InvalidSignature, now, None)
            }
            Err(VerifierError::UnknownChain(chain)) => {
                return self.reject(
                    candidate,
                    pending_key,
                    ErrorCode::UnknownChain,
                    now,
                    Some(chain.to_string()),
                )
            }
        }

        // Gate 2: content. Inline content was hash-checked at envelope
        // parse; stored content is a dependency fetch and failing it is
        // transient.
        let content_bytes: Vec<u8> = match candidate.item_type {
            ItemType::Inline => candidate
                .item_content
                .as_deref()
                .unwrap_or_default()
                .as_bytes()
                .to_vec(),
            ItemType::Storage | ItemType::Ipfs => {
                match self.content.fetch(&candidate.item_hash) {
                    Ok(bytes) => bytes,
                    Err(err) => return Outcome::Retry(content_error_code(&err)),
                }
            }
        };
        let content = match MessageContent::parse(candidate.message_type, &content_bytes) {
            Ok(content) => content,
            Err(err) => {
                let code = err.error_code();
                return self.reject(candidate, pending_key, code, now, Some(err.to_string()));
            }
        };

        // Gate 3: permission, when the content acts for another address.
        if content.address() != &candidate.sender {
            let request = AuthRequest {
                sender: &candidate.sender,
                on_behalf_of: content.address(),
                message_type: candidate.message_type,
                op: crud_op_of(candidate.message_type, &content),
                channel: candidate.channel.as_deref(),
                scope: scope_of(&content),
                at: now,
            };
            match is_authorized(self.store.as_ref(), &request) {
                Ok(true) => {}
                Ok(false) => {
                    return self.reject(candidate, pending_key, ErrorCode::Unauthorized, now, None)
                }
                Err(err) => {
                    tracing::warn!(%err, "permission lookup failed");
                    return Outcome::Retry(ErrorCode::StorageBackendError);
                }
            }
        }

        // Gate 4: cost. Stored files without a declared size are measured,
        // which is another dependency fetch.
        let content_size = match &content {
            MessageContent::Store(store_content) if store_content.size.is_none() => {
                match self.content.fetch(&store_content.item_hash) {
                    Ok(bytes) => Some(bytes.len() as u64),
                    Err(err) => return Outcome::Retry(content_error_code(&err)),
                }
            }
            _ => None,
        };
        let pricing = self.load_pricing();
        let cost = compute_cost(&content, content_size, &pricing, &self.policy, candidate.time);
        let payment_type = content.payment_type();
        if !cost.is_free() {
            match validate_balance(
                self.store.as_ref(),
                content.address(),
                &cost,
                payment_type,
                &self.policy,
                now,
                Some(&candidate.item_hash),
            ) {
                Ok(()) => {}
                Err(CostError::InsufficientBalance { available, required }) => {
                    return self.reject(
                        candidate,
                        pending_key,
                        ErrorCode::InsufficientBalance,
                        now,
                        Some(format!("have {available}, need {required}")),
                    )
                }
                Err(CostError::InsufficientCredit { available, required }) => {
                    return self.reject(
                        candidate,
                        pending_key,
                        ErrorCode::InsufficientCredit,
                        now,
                        Some(format!("have {available}, need {required}")),
                    )
                }
                Err(CostError::PaymentTypeNotAllowed(payment_type)) => {
                    return self.reject(
                        candidate,
                        pending_key,
                        ErrorCode::PaymentTypeNotAllowed,
                        now,
                        Some(payment_type.to_string()),
                    )
                }
                Err(CostError::Store(err)) => {
                    tracing::warn!(%err, "balance lookup failed");
                    return Outcome::Retry(ErrorCode::StorageBackendError);
                }
            }
        }

        // Gate 5: apply, then commit everything in one batch.
        let existing = match self.store.get_message(&candidate.item_hash) {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!(%err, "message lookup failed");
                return Outcome::Retry(ErrorCode::StorageBackendError);
            }
        };
        let ctx = ApplyContext {
            store: self.store.as_ref(),
            now,
            grace_period_secs: self.grace_period_secs,
            balance_sync_address: &self.balance_sync_address,
        };
        let mut batch =
            match build_batch(&ctx, candidate, &content, content_size, confirmation, existing) {
                Ok(batch) => batch,
                Err(ApplyError::MissingDependency(hash)) => {
                    tracing::debug!(%hash, "apply blocked on missing dependency");
                    return Outcome::Retry(ErrorCode::ContentUnavailable);
                }
                Err(ApplyError::InvalidTarget(detail)) => {
                    return self.reject(
                        candidate,
                        pending_key,
                        ErrorCode::InvalidMessageFormat,
                        now,
                        Some(detail),
                    )
                }
                Err(ApplyError::Unauthorized) => {
                    return self.reject(candidate, pending_key, ErrorCode::Unauthorized, now, None)
                }
                Err(ApplyError::Store(err)) => {
                    tracing::warn!(%err, "apply read failed");
                    return Outcome::Retry(ErrorCode::StorageBackendError);
                }
            };

        if !cost.is_free() {
            batch.costs.push(AccountCost {
                owner: content.address().clone(),
                item_hash: candidate.item_hash.clone(),
                message_type: candidate.message_type,
                name: resource_name(&content),
                cost_hold: cost.hold,
                cost_stream: cost.stream,
                cost_credit: cost.credit,
                payment_type,
            });
        }
        batch.delete_pending = pending_key.cloned();

        match self.store.commit_admission(batch) {
            Ok(()) => {
                tracing::info!(
                    item_hash = %candidate.item_hash,
                    message_type = %candidate.message_type,
                    sender = %candidate.sender,
                    "message admitted"
                );
                Outcome::Applied
            }
            Err(err) => {
                tracing::warn!(%err, item_hash = %candidate.item_hash, "admission commit failed");
                Outcome::Retry(ErrorCode::StorageBackendError)
            }
        }
    }

    /// Expand one pending chain transaction.
    ///
    /// Verified candidates are queued for admission with their confirmation
    /// attached; candidates whose message is already known only contribute
    /// confirmation evidence through the reconciler. The transaction row is
    /// deleted once fully expanded, or kept for retry when a dependency was
    /// unavailable.
    pub fn process_pending_tx(&self, tx: &PendingTx) -> TxOutcome {
        let candidates = match expand(tx, self.content.as_ref()) {
            Ok(candidates) => candidates,
            Err(err) if err.is_transient() => {
                tracing::debug!(tx_hash = %tx.tx_hash, %err, "expansion deferred");
                return TxOutcome::Deferred;
            }
            Err(err) => {
                tracing::warn!(tx_hash = %tx.tx_hash, chain = %tx.chain, %err, "dropping transaction");
                if let Err(err) = self.store.delete_pending_tx(tx.chain, &tx.tx_hash) {
                    tracing::warn!(%err, "pending tx delete failed");
                    return TxOutcome::Deferred;
                }
                return TxOutcome::Dropped;
            }
        };

        let confirmation = confirmation_of(tx);
        let now = Timestamp::now();
        let mut queued = 0;

        for candidate in &candidates {
            match self.registry.verify(candidate) {
                Ok(true) => {}
                Ok(false) => {
                    self.reject(candidate, None, ErrorCode::InvalidSignature, now, None);
                    continue;
                }
                Err(VerifierError::UnknownChain(chain)) => {
                    self.reject(
                        candidate,
                        None,
                        ErrorCode::UnknownChain,
                        now,
                        Some(chain.to_string()),
                    );
                    continue;
                }
            }

            match self.record_expanded(candidate, &confirmation, now) {
                Ok(was_queued) => queued += usize::from(was_queued),
                Err(err) => {
                    tracing::warn!(%err, tx_hash = %tx.tx_hash, "expansion write failed, deferring");
                    return TxOutcome::Deferred;
                }
            }
        }

        if let Err(err) = self.store.delete_pending_tx(tx.chain, &tx.tx_hash) {
            tracing::warn!(%err, "pending tx delete failed");
            return TxOutcome::Deferred;
        }
        TxOutcome::Expanded(queued)
    }

    /// Queue one expanded candidate, or merge its confirmation if the
    /// message (or a twin pending row) already exists. Runs under the item
    /// hash claim so a concurrent admission cannot lose the confirmation.
    fn record_expanded(
        &self,
        candidate: &CandidateMessage,
        confirmation: &Confirmation,
        now: Timestamp,
    ) -> Result<bool, ccn_store::StoreError> {
        if !self
            .store
            .try_claim(&candidate.item_hash, now.as_millis(), self.claim_ttl_millis)?
        {
            // An admission is in flight; surface as a store-level conflict
            // so the whole transaction is deferred and replayed.
            return Err(ccn_store::StoreError::Backend(format!(
                "item {} is being admitted",
                candidate.item_hash
            )));
        }
        let result = (|| {
            if self.store.get_message(&candidate.item_hash)?.is_some() {
                confirm(
                    self.store.as_ref(),
                    candidate,
                    &candidate.sender,
                    confirmation.clone(),
                )?;
                return Ok(false);
            }
            let pending = PendingMessage::new(candidate.clone(), Origin::Chain, now)
                .with_confirmation(confirmation.clone());
            if self.store.insert_pending(&pending)? {
                Ok(true)
            } else {
                // A gossip twin holds the queue slot. Park the confirmation
                // on a confirmed message row so it survives either path.
                confirm(
                    self.store.as_ref(),
                    candidate,
                    &candidate.sender,
                    confirmation.clone(),
                )?;
                Ok(false)
            }
        })();
        if let Err(err) = self.store.release_claim(&candidate.item_hash) {
            tracing::warn!(%err, "claim release failed");
        }
        result
    }

    fn reject(
        &self,
        candidate: &CandidateMessage,
        pending_key: Option<&PendingKey>,
        code: ErrorCode,
        now: Timestamp,
        detail: Option<String>,
    ) -> Outcome {
        tracing::info!(
            item_hash = %candidate.item_hash,
            sender = %candidate.sender,
            code = %code,
            detail = detail.as_deref().unwrap_or(""),
            "message rejected"
        );
        let rejection = RejectedMessage {
            item_hash: candidate.item_hash.clone(),
            sender: candidate.sender.clone(),
            error_code: code,
            time: now,
            detail,
        };
        match self.store.commit_rejection(&rejection, pending_key) {
            Ok(()) => Outcome::Rejected(code),
            Err(err) => {
                // If we cannot record the rejection, the row must survive
                // for another attempt rather than vanish untracked.
                tracing::warn!(%err, "rejection commit failed");
                Outcome::Retry(ErrorCode::StorageBackendError)
            }
        }
    }

    fn load_pricing(&self) -> PricingTable {
        match self
            .store
            .aggregate_elements(&self.pricing_owner, PRICING_KEY)
        {
            Ok(elements) if !elements.is_empty() => {
                PricingTable::from_aggregate(&merged_view(&elements))
            }
            Ok(_) => PricingTable::default(),
            Err(err) => {
                tracing::warn!(%err, "pricing aggregate unavailable, using defaults");
                PricingTable::default()
            }
        }
    }
}

fn content_error_code(err: &ContentError) -> ErrorCode {
    match err {
        ContentError::NotFound(_) => ErrorCode::ContentUnavailable,
        ContentError::Backend(_) => ErrorCode::StorageBackendError,
    }
}

fn crud_op_of(message_type: MessageType, content: &MessageContent) -> CrudOp {
    match (message_type, content) {
        (MessageType::Forget, _) => CrudOp::Delete,
        (_, MessageContent::Post(post)) if post.is_amend() => CrudOp::Update,
        _ => CrudOp::Create,
    }
}

fn scope_of(content: &MessageContent) -> Option<&str> {
    match content {
        MessageContent::Post(post) => Some(post.post_type.as_str()),
        MessageContent::Aggregate(aggregate) => Some(aggregate.key.as_str()),
        _ => None,
    }
}

fn resource_name(content: &MessageContent) -> String {
    match content {
        MessageContent::Resource(resource) => resource.name.clone().unwrap_or_default(),
        _ => String::new(),
    }
}
