//! The CCN node: admission pipeline, retry scheduling, and worker loops.
//!
//! Candidate messages arrive from gossip and from chain-transaction
//! expansion; the pipeline validates each one (signature, permission, cost,
//! content), applies its effect idempotently, and commits the whole result
//! atomically. Transient failures go back to the pending queue with
//! exponential backoff; invalid messages are rejected permanently with a
//! persisted error code.

pub mod applier;
pub mod config;
pub mod cron;
pub mod error;
pub mod gossip;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod pipeline;
pub mod retry;
pub mod shutdown;
pub mod workers;

pub use config::NodeConfig;
pub use error::NodeError;
pub use metrics::NodeMetrics;
pub use node::Node;
pub use pipeline::{Outcome, Pipeline, TxOutcome};
pub use shutdown::ShutdownController;
