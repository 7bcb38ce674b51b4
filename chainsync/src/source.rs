//! The chain RPC collaborator interface.

use ccn_schemas::PendingTx;
use ccn_types::Chain;

/// A chain RPC failure. Always transient: the fetch loop backs off and
/// retries from the stored watermark.
#[derive(Debug, thiserror::Error)]
#[error("chain source error: {0}")]
pub struct SourceError(pub String);

/// Supplies on-chain transactions in height order plus the chain tip.
///
/// Implemented outside the node by per-chain indexer clients; the
/// reconciler never talks to a chain directly.
pub trait ChainTxSource: Send + Sync {
    /// The current tip height of `chain`.
    fn tip_height(&self, chain: Chain) -> Result<u64, SourceError>;

    /// Transactions carrying sync payloads with height in
    /// `(from_height, to_height]`, ascending.
    fn fetch_txs(
        &self,
        chain: Chain,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<PendingTx>, SourceError>;
}
