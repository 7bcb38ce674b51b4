//! Exponential backoff for transiently failed admissions.

use ccn_schemas::PendingMessage;
use ccn_store::pending::PendingKey;
use ccn_store::{PendingMessageStore, Store};
use ccn_types::{ErrorCode, Timestamp};

/// Backoff parameters, all configuration.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// First retry delay in seconds.
    pub base_secs: u64,
    /// Delay cap in seconds.
    pub max_secs: u64,
    /// Retry count past which each further failure logs a warning.
    pub alert_threshold: u32,
}

impl RetryPolicy {
    /// Delay before attempt `retries + 1`: `base × 2^retries`, clamped to
    /// the cap. Saturates instead of overflowing for absurd retry counts.
    pub fn backoff_secs(&self, retries: u32) -> u64 {
        let factor = 1u64.checked_shl(retries).unwrap_or(u64::MAX);
        self.base_secs.saturating_mul(factor).min(self.max_secs)
    }
}

/// Reschedule a pending message after a transient failure.
///
/// Increments the retry count and pushes `next_attempt` out by the backoff
/// delay. There is no retry limit: an item backs off up to the cap and stays
/// in the queue until the dependency recovers or an operator intervenes.
pub fn schedule_retry(
    store: &dyn Store,
    pending: &PendingMessage,
    code: ErrorCode,
    policy: &RetryPolicy,
    now: Timestamp,
) -> Result<(), ccn_store::StoreError> {
    let retries = pending.retries.saturating_add(1);
    let next_attempt = now.plus_secs(policy.backoff_secs(pending.retries));
    store.reschedule_pending(&PendingKey::of(pending), retries, next_attempt)?;

    if retries >= policy.alert_threshold {
        tracing::warn!(
            item_hash = %pending.candidate.item_hash,
            retries,
            code = %code,
            "message has exceeded the retry high-water mark"
        );
    } else {
        tracing::debug!(
            item_hash = %pending.candidate.item_hash,
            retries,
            code = %code,
            next_attempt = %next_attempt,
            "transient failure, rescheduled"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccn_schemas::{CandidateMessage, Origin};
    use ccn_store::{MemoryStore, PendingMessageStore};
    use ccn_types::{Chain, ItemType, MessageType};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base_secs: 30,
            max_secs: 3_600,
            alert_threshold: 20,
        }
    }

    #[test]
    fn backoff_doubles_until_the_cap() {
        let p = policy();
        assert_eq!(p.backoff_secs(0), 30);
        assert_eq!(p.backoff_secs(1), 60);
        assert_eq!(p.backoff_secs(2), 120);
        assert_eq!(p.backoff_secs(6), 1_920);
        assert_eq!(p.backoff_secs(7), 3_600);
        assert_eq!(p.backoff_secs(40), 3_600);
        assert_eq!(p.backoff_secs(u32::MAX), 3_600);
    }

    #[test]
    fn intervals_are_non_decreasing() {
        let p = policy();
        let mut last = 0;
        for retries in 0..80 {
            let delay = p.backoff_secs(retries);
            assert!(delay >= last);
            last = delay;
        }
    }

    #[test]
    fn schedule_retry_moves_the_row_forward() {
        let store = MemoryStore::new();
        let now = Timestamp::from_secs(1_000);
        let candidate = CandidateMessage {
            item_hash: "9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44".into(),
            sender: "0xa".into(),
            chain: Chain::Hex,
            message_type: MessageType::Post,
            signature: "sigA".into(),
            item_type: ItemType::Storage,
            item_content: None,
            time: Timestamp::from_millis(1),
            channel: None,
        };
        let pending = PendingMessage::new(candidate, Origin::Gossip, now);
        store.insert_pending(&pending).unwrap();

        schedule_retry(&store, &pending, ErrorCode::ContentUnavailable, &policy(), now).unwrap();

        let row = store.get_pending(&PendingKey::of(&pending)).unwrap().unwrap();
        assert_eq!(row.retries, 1);
        assert_eq!(row.next_attempt, now.plus_secs(30));
        // The row still exists: transient failures never delete.
        assert_eq!(store.pending_count().unwrap(), 1);
    }
}
