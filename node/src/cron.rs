//! Periodic jobs driven by the `cron_jobs` table.
//!
//! Job schedules persist across restarts: each pass runs every job whose
//! interval has elapsed since its stored `last_run`, then writes the new
//! stamp back.

use std::sync::Arc;
use std::time::Duration;

use ccn_store::cron::CronJob;
use ccn_store::{CronStore, FileStore, Store};
use ccn_types::Timestamp;

use crate::shutdown::ShutdownListener;

const DELETION_SWEEP_JOB: &str = "scheduled_deletions_sweep";
const DELETION_SWEEP_INTERVAL_SECS: u64 = 300;
const SWEEP_BATCH: usize = 256;

/// Seed the default job rows if absent.
pub fn register_default_jobs(store: &dyn Store) -> Result<(), ccn_store::StoreError> {
    if store.get_cron_job(DELETION_SWEEP_JOB)?.is_none() {
        store.upsert_cron_job(&CronJob {
            id: DELETION_SWEEP_JOB.to_string(),
            interval_secs: DELETION_SWEEP_INTERVAL_SECS,
            last_run: Timestamp::EPOCH,
        })?;
    }
    Ok(())
}

/// Execute due grace-period deletions.
///
/// A marker whose content is still pinned was re-referenced after the
/// forget; its marker is dropped without releasing anything. Otherwise the
/// content is released: the marker is removed and the storage collaborator
/// is expected to garbage-collect unreferenced content.
pub fn sweep_scheduled_deletions(
    store: &dyn Store,
    now: Timestamp,
) -> Result<usize, ccn_store::StoreError> {
    let due = store.due_deletions(now, SWEEP_BATCH)?;
    let mut released = 0;
    for deletion in due {
        let pins = store.pins_for_content(&deletion.content_ref)?;
        if pins.is_empty() {
            tracing::info!(content_ref = %deletion.content_ref, "releasing unreferenced content");
            released += 1;
        } else {
            tracing::debug!(
                content_ref = %deletion.content_ref,
                pins = pins.len(),
                "deletion marker cancelled, content is pinned again"
            );
        }
        store.delete_deletion_marker(&deletion.content_ref)?;
    }
    Ok(released)
}

fn run_due_jobs(store: &dyn Store, now: Timestamp) {
    let jobs = match store.list_cron_jobs() {
        Ok(jobs) => jobs,
        Err(err) => {
            tracing::warn!(%err, "cron job listing failed");
            return;
        }
    };
    for mut job in jobs {
        if !job.is_due(now) {
            continue;
        }
        let result = match job.id.as_str() {
            DELETION_SWEEP_JOB => sweep_scheduled_deletions(store, now).map(|released| {
                if released > 0 {
                    tracing::info!(released, "deletion sweep finished");
                }
            }),
            other => {
                tracing::debug!(job = other, "no handler for cron job");
                Ok(())
            }
        };
        match result {
            Ok(()) => {
                job.last_run = now;
                if let Err(err) = store.upsert_cron_job(&job) {
                    tracing::warn!(%err, job = %job.id, "cron stamp update failed");
                }
            }
            Err(err) => tracing::warn!(%err, job = %job.id, "cron job failed"),
        }
    }
}

/// The cron loop: wake up periodically and run whatever is due.
pub async fn run_cron(store: Arc<dyn Store>, tick: Duration, mut shutdown: ShutdownListener) {
    if let Err(err) = register_default_jobs(store.as_ref()) {
        tracing::warn!(%err, "cron job registration failed");
    }
    loop {
        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = shutdown.wait() => break,
        }
        let store = Arc::clone(&store);
        if tokio::task::spawn_blocking(move || run_due_jobs(store.as_ref(), Timestamp::now()))
            .await
            .is_err()
        {
            tracing::warn!("cron pass panicked");
        }
    }
    tracing::info!("cron loop stopped");
}
