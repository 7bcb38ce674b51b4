//! Fundamental types for the CCN node.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: addresses, item hashes, chain identifiers, timestamps, payment
//! types, and the numeric error-code taxonomy persisted with rejected messages.

pub mod address;
pub mod chain;
pub mod error;
pub mod hash;
pub mod kind;
pub mod payment;
pub mod time;

pub use address::Address;
pub use chain::Chain;
pub use error::ErrorCode;
pub use hash::{ItemHash, ItemHashKind, TxHash};
pub use kind::{ItemType, MessageType};
pub use payment::PaymentType;
pub use time::Timestamp;
