//! Economic admission control.
//!
//! Computes the resource cost of a message from the current pricing table
//! and validates it against the sender's token balance or credit ledger.
//! Rejections here are permanent: insufficient funds cannot be cured by
//! retrying.

pub mod balance;
pub mod engine;
pub mod error;
pub mod pricing;

pub use balance::{credit_balance, validate_balance};
pub use engine::{compute_cost, Cost};
pub use error::CostError;
pub use pricing::{price_scale, CostPolicy, PricingTable};
