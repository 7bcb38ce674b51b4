//! Per-chain sync height watermarks.

use ccn_types::Chain;

use crate::StoreError;

/// Monotonic per-chain watermark of the highest fully processed height.
///
/// `advance_height` takes the max of the stored and offered values, so
/// replaying from an earlier watermark never rewinds it.
pub trait ChainSyncStore {
    fn get_height(&self, chain: Chain) -> Result<Option<u64>, StoreError>;
    fn advance_height(&self, chain: Chain, height: u64) -> Result<u64, StoreError>;
}
