//! Worker loops driving the pipeline.
//!
//! The pipeline itself is synchronous; these tokio loops pull bounded
//! batches and run admissions through `spawn_blocking`. Shutdown is
//! honored between items — an in-flight admission always finishes its
//! commit before the worker exits.

use std::sync::Arc;
use std::time::Duration;

use ccn_chainsync::ChainTxSource;
use ccn_store::{ChainSyncStore, PendingMessageStore, PendingTxStore, Store};
use ccn_types::{Chain, Timestamp};

use crate::metrics::NodeMetrics;
use crate::pipeline::{Outcome, Pipeline, TxOutcome};
use crate::shutdown::ShutdownListener;

/// Drain due pending messages until shutdown.
pub async fn run_pending_drain(
    pipeline: Arc<Pipeline>,
    metrics: Arc<NodeMetrics>,
    batch_size: usize,
    idle_interval: Duration,
    mut shutdown: ShutdownListener,
) {
    loop {
        if shutdown.is_shutdown() {
            break;
        }
        let store = Arc::clone(pipeline.store());
        let due = tokio::task::spawn_blocking(move || store.due_pending(Timestamp::now(), batch_size))
            .await
            .unwrap_or_else(|_| Ok(Vec::new()));
        let due = match due {
            Ok(due) => due,
            Err(err) => {
                tracing::warn!(%err, "pending scan failed");
                Vec::new()
            }
        };

        if due.is_empty() {
            tokio::select! {
                _ = tokio::time::sleep(idle_interval) => continue,
                _ = shutdown.wait() => break,
            }
        }

        for pending in due {
            if shutdown.is_shutdown() {
                break;
            }
            let task_pipeline = Arc::clone(&pipeline);
            let task_metrics = Arc::clone(&metrics);
            let outcome = tokio::task::spawn_blocking(move || {
                let timer = task_metrics.admission_seconds.start_timer();
                let outcome = task_pipeline.process_pending(&pending);
                timer.observe_duration();
                outcome
            })
            .await;
            match outcome {
                Ok(outcome) => record_outcome(&metrics, outcome),
                Err(err) => tracing::warn!(%err, "admission task panicked"),
            }
        }

        let store = Arc::clone(pipeline.store());
        if let Ok(Ok(count)) =
            tokio::task::spawn_blocking(move || store.pending_count()).await.map_err(|_| ())
        {
            metrics.pending_backlog.set(count as i64);
        }
    }
    tracing::info!("pending drain worker stopped");
}

fn record_outcome(metrics: &NodeMetrics, outcome: Outcome) {
    metrics.candidates_processed.inc();
    match outcome {
        Outcome::Applied => metrics.messages_applied.inc(),
        Outcome::Rejected(_) => metrics.messages_rejected.inc(),
        Outcome::Retry(_) => metrics.messages_retried.inc(),
    }
}

/// Drain pending chain transactions until shutdown.
pub async fn run_tx_drain(
    pipeline: Arc<Pipeline>,
    metrics: Arc<NodeMetrics>,
    batch_size: usize,
    idle_interval: Duration,
    mut shutdown: ShutdownListener,
) {
    loop {
        if shutdown.is_shutdown() {
            break;
        }
        let store = Arc::clone(pipeline.store());
        let txs = tokio::task::spawn_blocking(move || store.next_pending_txs(batch_size))
            .await
            .unwrap_or_else(|_| Ok(Vec::new()));
        let txs = match txs {
            Ok(txs) => txs,
            Err(err) => {
                tracing::warn!(%err, "pending tx scan failed");
                Vec::new()
            }
        };

        let mut all_deferred = true;
        for tx in txs {
            if shutdown.is_shutdown() {
                break;
            }
            let task_pipeline = Arc::clone(&pipeline);
            match tokio::task::spawn_blocking(move || task_pipeline.process_pending_tx(&tx)).await {
                Ok(TxOutcome::Expanded(queued)) => {
                    all_deferred = false;
                    metrics.txs_expanded.inc();
                    if queued > 0 {
                        metrics.confirmations_recorded.inc_by(queued as u64);
                    }
                }
                Ok(TxOutcome::Dropped) => {
                    all_deferred = false;
                    metrics.txs_dropped.inc();
                }
                Ok(TxOutcome::Deferred) => {}
                Err(err) => tracing::warn!(%err, "tx expansion task panicked"),
            }
        }

        let store = Arc::clone(pipeline.store());
        if let Ok(Ok(count)) =
            tokio::task::spawn_blocking(move || store.pending_tx_count()).await.map_err(|_| ())
        {
            metrics.pending_tx_backlog.set(count as i64);
        }

        // A pass that only deferred work (or found none) waits before the
        // next scan instead of spinning on an unavailable dependency.
        if all_deferred {
            tokio::select! {
                _ = tokio::time::sleep(idle_interval) => {}
                _ = shutdown.wait() => break,
            }
        }
    }
    tracing::info!("tx drain worker stopped");
}

/// Fetch new transactions for one chain from its source collaborator,
/// advancing the height watermark as batches land in the queue.
pub async fn run_chain_fetcher(
    store: Arc<dyn Store>,
    source: Arc<dyn ChainTxSource>,
    chain: Chain,
    poll_interval: Duration,
    mut shutdown: ShutdownListener,
) {
    loop {
        if shutdown.is_shutdown() {
            break;
        }

        let fetch_store = Arc::clone(&store);
        let fetch_source = Arc::clone(&source);
        let result = tokio::task::spawn_blocking(move || -> Result<Option<u64>, String> {
            let tip = fetch_source
                .tip_height(chain)
                .map_err(|e| e.to_string())?;
            let from = fetch_store
                .get_height(chain)
                .map_err(|e| e.to_string())?
                .unwrap_or(0);
            if tip <= from {
                return Ok(None);
            }
            let txs = fetch_source
                .fetch_txs(chain, from, tip)
                .map_err(|e| e.to_string())?;
            for tx in &txs {
                fetch_store
                    .insert_pending_tx(tx)
                    .map_err(|e| e.to_string())?;
            }
            // The watermark only moves once the whole batch is queued.
            // Replays from an earlier watermark are safe: inserts are
            // deduplicated and confirmations are a set.
            fetch_store
                .advance_height(chain, tip)
                .map_err(|e| e.to_string())?;
            Ok(Some(tip))
        })
        .await;

        match result {
            Ok(Ok(Some(tip))) => {
                tracing::debug!(%chain, tip, "chain sync advanced");
            }
            Ok(Ok(None)) => {}
            Ok(Err(err)) => {
                tracing::warn!(%chain, %err, "chain fetch failed, will retry");
            }
            Err(err) => tracing::warn!(%chain, %err, "chain fetch task panicked"),
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.wait() => break,
        }
    }
    tracing::info!(%chain, "chain fetcher stopped");
}
