//! Message schemas for the CCN node.
//!
//! The wire envelope received from gossip or expanded from chain
//! transactions, the typed content payloads behind it, and the durable
//! records the pipeline writes: pending messages, pending transactions, and
//! the final converged `Message`.

pub mod content;
pub mod envelope;
pub mod message;
pub mod pending;

pub use content::{
    AggregateContent, ComputeUnits, ForgetContent, MessageContent, PostContent, ResourceContent,
    StoreContent,
};
pub use envelope::{parse_envelope, CandidateMessage, FormatError};
pub use message::{Confirmation, Message, MessageStatus, RejectedMessage};
pub use pending::{Origin, PendingMessage, PendingTx};
