//! Pricing table and economic policy.
//!
//! Prices come from a key/value aggregate owned by a designated address; the
//! node parses the aggregate's merged document into a [`PricingTable`] and
//! falls back to defaults for absent fields, so a missing or partial pricing
//! aggregate never blocks admission.

use ccn_types::{PaymentType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::CostError;

/// The economic precision scale went from 1× to 10 000× at a network-wide
/// cutover. The factor is selected by *message* time so replayed history
/// prices identically, and the cutover timestamp itself is configuration.
pub fn price_scale(message_time: Timestamp, cutover: Timestamp) -> u128 {
    if message_time < cutover {
        1
    } else {
        10_000
    }
}

/// Per-resource prices in smallest token units at 1× scale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTable {
    /// Holding price per MiB of pinned storage.
    pub storage_mib_hold: u128,
    /// Streaming price per MiB of pinned storage, per hour.
    pub storage_mib_stream_hour: u128,
    /// Holding price per compute unit.
    pub compute_unit_hold: u128,
    /// Streaming price per compute unit, per hour.
    pub compute_unit_stream_hour: u128,
    /// Credit price per compute unit, per hour.
    pub compute_unit_credit_hour: u128,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            storage_mib_hold: 20,
            storage_mib_stream_hour: 1,
            compute_unit_hold: 200,
            compute_unit_stream_hour: 8,
            compute_unit_credit_hour: 10,
        }
    }
}

impl PricingTable {
    /// Parse the merged pricing aggregate document, defaulting absent
    /// fields. A document of the wrong shape entirely falls back to the
    /// defaults with a warning rather than stalling admission.
    pub fn from_aggregate(doc: &serde_json::Value) -> Self {
        match serde_json::from_value(doc.clone()) {
            Ok(table) => table,
            Err(err) => {
                tracing::warn!(%err, "pricing aggregate is malformed, using default prices");
                Self::default()
            }
        }
    }
}

/// Policy knobs for the economic gates, all configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CostPolicy {
    /// When the 10 000× precision scale came into force.
    pub price_scale_cutover: Timestamp,
    /// Whether stream-paid messages are accepted at all.
    pub allow_stream: bool,
    /// Whether credit-paid messages are accepted at all.
    pub allow_credit: bool,
    /// Minimum runtime, in hours, a credit-paid message must be able to fund.
    pub credit_min_runtime_hours: u32,
}

impl Default for CostPolicy {
    fn default() -> Self {
        Self {
            price_scale_cutover: Timestamp::EPOCH,
            allow_stream: true,
            allow_credit: true,
            credit_min_runtime_hours: 24,
        }
    }
}

impl CostPolicy {
    /// Reject payment types the current policy does not accept.
    pub fn check_payment_type(&self, payment_type: PaymentType) -> Result<(), CostError> {
        let allowed = match payment_type {
            PaymentType::Hold => true,
            PaymentType::Stream => self.allow_stream,
            PaymentType::Credit => self.allow_credit,
        };
        if allowed {
            Ok(())
        } else {
            Err(CostError::PaymentTypeNotAllowed(payment_type))
        }
    }
}
