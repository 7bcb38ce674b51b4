//! Gossip intake.
//!
//! The transport hands opaque byte payloads to a bounded queue; nothing is
//! processed inline on the listener. A dedicated task drains the queue,
//! decodes envelopes, and inserts pending rows for the pipeline workers.

use std::sync::Arc;

use tokio::sync::mpsc;

use ccn_schemas::{parse_envelope, Origin, PendingMessage};
use ccn_store::{PendingMessageStore, Store};
use ccn_types::Timestamp;

use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownListener;

/// Queue a gossip payload for decoding, dropping it when the node is
/// overloaded. The transport side holds the sender.
pub fn try_enqueue(sender: &mpsc::Sender<Vec<u8>>, payload: Vec<u8>) -> bool {
    match sender.try_send(payload) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%err, "gossip intake queue full, dropping payload");
            false
        }
    }
}

/// Drain the gossip queue until shutdown.
pub async fn run_gossip_listener(
    mut receiver: mpsc::Receiver<Vec<u8>>,
    store: Arc<dyn Store>,
    metrics: Arc<NodeMetrics>,
    mut shutdown: ShutdownListener,
) {
    loop {
        let payload = tokio::select! {
            payload = receiver.recv() => match payload {
                Some(payload) => payload,
                None => break,
            },
            _ = shutdown.wait() => break,
        };
        metrics.gossip_received.inc();

        let candidate = match parse_envelope(&payload) {
            Ok(candidate) => candidate,
            Err(err) => {
                // No valid identity to record a rejection under; count and
                // drop.
                metrics.gossip_invalid.inc();
                tracing::debug!(%err, "discarding invalid gossip envelope");
                continue;
            }
        };

        let store = Arc::clone(&store);
        let metrics = Arc::clone(&metrics);
        let insert = tokio::task::spawn_blocking(move || {
            let pending =
                PendingMessage::new(candidate, Origin::Gossip, Timestamp::now());
            let item_hash = pending.candidate.item_hash.clone();
            match store.insert_pending(&pending) {
                Ok(true) => {
                    tracing::debug!(%item_hash, "gossip candidate queued");
                }
                Ok(false) => {
                    tracing::trace!(%item_hash, "duplicate gossip sighting collapsed");
                }
                Err(err) => {
                    tracing::warn!(%err, %item_hash, "failed to queue gossip candidate");
                }
            }
            if let Ok(count) = store.pending_count() {
                metrics.pending_backlog.set(count as i64);
            }
        });
        if insert.await.is_err() {
            tracing::warn!("gossip insert task panicked");
        }
    }
    tracing::info!("gossip listener stopped");
}
