//! Payment types for resource-bearing messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The economic model paying for a message's resources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Upfront balance hold: the full cost must be covered by the sender's
    /// token balance for as long as the resource exists.
    #[default]
    Hold,
    /// Continuous token streaming, paid per hour of runtime.
    Stream,
    /// Drawn from the sender's credit ledger balance.
    Credit,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Hold => "hold",
            PaymentType::Stream => "stream",
            PaymentType::Credit => "credit",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
