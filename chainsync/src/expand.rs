//! Pending transaction expansion.

use ccn_content::{ContentError, ContentStorage};
use ccn_schemas::{CandidateMessage, PendingTx};
use ccn_types::ItemHash;
use serde::Deserialize;

/// The sync protocol this node understands in on-chain payloads.
const SYNC_PROTOCOL: &str = "sync";

/// Why a transaction failed to expand.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Unknown protocol name or version. Chain content is immutable, so
    /// this never resolves: the transaction is dropped.
    #[error("unsupported sync protocol {protocol} v{version}")]
    UnsupportedProtocol { protocol: String, version: u16 },

    /// Payload decodes but has the wrong shape. Also permanent.
    #[error("malformed sync payload: {0}")]
    MalformedPayload(String),

    /// Off-chain message list could not be fetched; the transaction stays
    /// pending and is retried.
    #[error("sync content {0} unavailable")]
    ContentUnavailable(ItemHash),

    #[error("storage backend error: {0}")]
    StorageBackend(String),
}

impl SyncError {
    /// Transient errors keep the transaction queued; permanent ones drop it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::ContentUnavailable(_) | SyncError::StorageBackend(_)
        )
    }
}

/// Shape of the v1 (inline) payload and of the fetched v2 message list.
#[derive(Deserialize)]
struct MessageList {
    messages: Vec<serde_json::Value>,
}

/// Shape of the v2 payload: a pointer to an off-chain message list.
#[derive(Deserialize)]
struct ContentPointer {
    content: String,
}

/// Expand a pending transaction into the candidate messages it carries.
///
/// Individually invalid embedded messages are logged and skipped — one bad
/// envelope does not poison the rest of the batch.
pub fn expand(
    tx: &PendingTx,
    storage: &dyn ContentStorage,
) -> Result<Vec<CandidateMessage>, SyncError> {
    if tx.protocol != SYNC_PROTOCOL {
        return Err(SyncError::UnsupportedProtocol {
            protocol: tx.protocol.clone(),
            version: tx.protocol_version,
        });
    }

    let list: MessageList = match tx.protocol_version {
        1 => serde_json::from_value(tx.content.clone())
            .map_err(|e| SyncError::MalformedPayload(e.to_string()))?,
        2 => {
            let pointer: ContentPointer = serde_json::from_value(tx.content.clone())
                .map_err(|e| SyncError::MalformedPayload(e.to_string()))?;
            let content_ref = ItemHash::new(pointer.content);
            if !content_ref.is_valid() {
                return Err(SyncError::MalformedPayload(format!(
                    "content pointer {content_ref} is not a valid hash"
                )));
            }
            let bytes = storage.fetch(&content_ref).map_err(|e| match e {
                ContentError::NotFound(hash) => SyncError::ContentUnavailable(hash),
                ContentError::Backend(detail) => SyncError::StorageBackend(detail),
            })?;
            serde_json::from_slice(&bytes)
                .map_err(|e| SyncError::MalformedPayload(e.to_string()))?
        }
        version => {
            return Err(SyncError::UnsupportedProtocol {
                protocol: tx.protocol.clone(),
                version,
            })
        }
    };

    let mut candidates = Vec::with_capacity(list.messages.len());
    for value in &list.messages {
        match CandidateMessage::from_value(value) {
            Ok(candidate) => candidates.push(candidate),
            Err(err) => {
                tracing::warn!(
                    tx_hash = %tx.tx_hash,
                    chain = %tx.chain,
                    %err,
                    "skipping invalid message embedded in chain transaction"
                );
            }
        }
    }
    Ok(candidates)
}
