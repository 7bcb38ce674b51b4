//! Type-specific convergence: turns a validated candidate into the write
//! batch that commits its effect.
//!
//! Every transition here is safe to run twice for the same item hash. The
//! batch either recreates the identical end state or degenerates into
//! upserts the store already holds.

use ccn_permissions::{AuthRequest, CrudOp};
use ccn_schemas::{
    CandidateMessage, Confirmation, ForgetContent, Message, MessageContent, MessageStatus,
    PostContent, StoreContent,
};
use ccn_store::aggregates::AggregateElement;
use ccn_store::files::{FilePin, ScheduledDeletion};
use ccn_store::messages::AdmissionBatch;
use ccn_store::{MessageStore, Store, StoreError};
use ccn_types::{Address, ItemHash, ItemType, MessageType, Timestamp};

/// Aggregate key whose contents are ingested as the token balance table
/// when published by the configured balance-sync address.
const BALANCES_KEY: &str = "balances";

/// Why a transition could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// A referenced message (amend target, forget target) is not admitted
    /// yet. Transient: it may arrive from another source.
    #[error("referenced message {0} is not known yet")]
    MissingDependency(ItemHash),

    /// The reference is structurally wrong (amending a non-post, forgetting
    /// a forget). Permanent.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The acting address has no authority over the target.
    #[error("not authorized to act on the target message")]
    Unauthorized,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Inputs shared by every transition.
pub struct ApplyContext<'a> {
    pub store: &'a dyn Store,
    pub now: Timestamp,
    pub grace_period_secs: u64,
    pub balance_sync_address: &'a Address,
}

/// Build the admission batch for a validated candidate.
///
/// `existing` is the current message row for this item hash, if any; its
/// confirmations and reception time are preserved across re-admission.
pub fn build_batch(
    ctx: &ApplyContext<'_>,
    candidate: &CandidateMessage,
    content: &MessageContent,
    content_size: Option<u64>,
    confirmation: Option<Confirmation>,
    existing: Option<Message>,
) -> Result<AdmissionBatch, ApplyError> {
    // A forgotten message stays forgotten: re-admission from a second
    // source only merges confirmation evidence into the tombstone.
    if let Some(existing) = &existing {
        if existing.status == MessageStatus::Removed {
            let mut tombstone = existing.clone();
            if let Some(confirmation) = confirmation {
                tombstone.add_confirmation(confirmation);
            }
            return Ok(AdmissionBatch::for_message(tombstone));
        }
    }

    let mut message = match existing {
        Some(existing) => existing,
        None => Message::from_candidate(
            candidate,
            content.address().clone(),
            content.payment_type(),
            ctx.now,
        ),
    };
    message.owner = content.address().clone();
    message.payment_type = content.payment_type();
    if let Some(confirmation) = confirmation {
        message.add_confirmation(confirmation);
    }

    let mut batch = AdmissionBatch::default();
    match content {
        MessageContent::Post(post) => {
            apply_post(ctx, candidate, post, &mut message, &mut batch)?;
        }
        MessageContent::Aggregate(aggregate) => {
            if !aggregate.content.is_object() {
                return Err(ApplyError::InvalidTarget(
                    "aggregate content must be an object".into(),
                ));
            }
            message.content_key = Some(aggregate.key.clone());
            batch.aggregate_element = Some(AggregateElement {
                owner: message.owner.clone(),
                key: aggregate.key.clone(),
                item_hash: candidate.item_hash.clone(),
                time: candidate.time,
                content: aggregate.content.clone(),
            });
            if &message.owner == ctx.balance_sync_address && aggregate.key == BALANCES_KEY {
                ingest_balances(&aggregate.content, &mut batch);
            }
        }
        MessageContent::Store(store_content) => {
            apply_store(ctx, candidate, store_content, content_size, &mut message, &mut batch);
        }
        MessageContent::Forget(forget) => {
            apply_forget(ctx, forget, &message, &mut batch)?;
        }
        MessageContent::Resource(_) => {
            // Cost rows carry the deployment's economics; the pipeline adds
            // them to the batch after this call.
        }
    }

    batch.message = Some(message);
    Ok(batch)
}

fn apply_post(
    ctx: &ApplyContext<'_>,
    candidate: &CandidateMessage,
    post: &PostContent,
    message: &mut Message,
    batch: &mut AdmissionBatch,
) -> Result<(), ApplyError> {
    let Some(ref_hash) = post.ref_hash.as_ref().filter(|_| post.is_amend()) else {
        return Ok(());
    };

    let Some(mut target) = ctx.store.get_message(ref_hash)? else {
        return Err(ApplyError::MissingDependency(ref_hash.clone()));
    };
    if target.message_type != MessageType::Post {
        return Err(ApplyError::InvalidTarget(format!(
            "amend target {ref_hash} is a {}",
            target.message_type
        )));
    }
    if target.owner != message.owner {
        return Err(ApplyError::Unauthorized);
    }

    message.content_ref = Some(ref_hash.clone());

    // Last amend wins by (time, hash); the original's creation time and
    // post type are never touched.
    let newer = match &target.content_ref {
        None => true,
        Some(current) if current == &candidate.item_hash => false,
        Some(current) => match ctx.store.get_message(current)? {
            Some(current_amend) => {
                (candidate.time, &candidate.item_hash)
                    > (current_amend.time, &current_amend.item_hash)
            }
            None => true,
        },
    };
    if newer {
        target.content_ref = Some(candidate.item_hash.clone());
        batch.updated_messages.push(target);
    }
    Ok(())
}

fn apply_store(
    ctx: &ApplyContext<'_>,
    candidate: &CandidateMessage,
    store_content: &StoreContent,
    content_size: Option<u64>,
    message: &mut Message,
    batch: &mut AdmissionBatch,
) {
    let file_hash = store_content.item_hash.clone();
    let size = store_content.size.or(content_size).unwrap_or(0);

    message.content_ref = Some(file_hash.clone());
    batch.pins.push(FilePin {
        content_ref: file_hash.clone(),
        owner: message.owner.clone(),
        item_hash: candidate.item_hash.clone(),
        size,
        created_at: ctx.now,
    });
    // The content is referenced now: any grace-period marker is void.
    batch.cancel_deletions.push(file_hash);
}

fn apply_forget(
    ctx: &ApplyContext<'_>,
    forget: &ForgetContent,
    message: &Message,
    batch: &mut AdmissionBatch,
) -> Result<(), ApplyError> {
    if forget.hashes.is_empty() {
        return Err(ApplyError::InvalidTarget("forget lists no targets".into()));
    }
    let delete_by = ctx.now.plus_secs(ctx.grace_period_secs);

    for target_hash in &forget.hashes {
        let Some(target) = ctx.store.get_message(target_hash)? else {
            return Err(ApplyError::MissingDependency(target_hash.clone()));
        };
        if target.message_type == MessageType::Forget {
            return Err(ApplyError::InvalidTarget(format!(
                "cannot forget the forget message {target_hash}"
            )));
        }
        if target.sender != message.owner {
            // The forgetting address may hold a delegated grant from the
            // target's sender.
            let authorized = ccn_permissions::is_authorized(
                ctx.store,
                &AuthRequest {
                    sender: &message.owner,
                    on_behalf_of: &target.sender,
                    message_type: target.message_type,
                    op: CrudOp::Delete,
                    channel: target.channel.as_deref(),
                    scope: None,
                    at: ctx.now,
                },
            )?;
            if !authorized {
                return Err(ApplyError::Unauthorized);
            }
        }

        if target.status != MessageStatus::Removed {
            batch.mark_removed.push(target_hash.clone());
        }
        // The backing content goes onto the grace-period schedule rather
        // than being deleted inline, tolerating in-flight confirmations.
        if target.item_type != ItemType::Inline {
            batch.schedule_deletions.push(ScheduledDeletion {
                content_ref: target_hash.clone(),
                delete_by,
            });
        }
        if let Some(content_ref) = &target.content_ref {
            batch.schedule_deletions.push(ScheduledDeletion {
                content_ref: content_ref.clone(),
                delete_by,
            });
        }
        batch.remove_pins.push(target_hash.clone());
        batch.delete_costs.push((target.owner.clone(), target_hash.clone()));
    }
    Ok(())
}

fn ingest_balances(content: &serde_json::Value, batch: &mut AdmissionBatch) {
    let Some(map) = content.as_object() else {
        return;
    };
    for (address, value) in map {
        match value.as_u64() {
            Some(amount) => batch
                .balances
                .push((Address::new(address.clone()), u128::from(amount))),
            None => {
                tracing::debug!(%address, "skipping non-integer balance entry");
            }
        }
    }
}
