//! LMDB storage backend for the CCN node.
//!
//! Implements every storage trait from `ccn-store` using the `heed` LMDB
//! bindings. Each logical table maps to one LMDB database within a single
//! environment; ordered scans (due pending rows, transaction height order,
//! deletion deadlines) run over secondary index databases whose keys sort
//! bytewise. An admission batch commits in one LMDB write transaction, so the
//! whole effect set lands atomically or not at all.

pub mod aggregates;
pub mod costs;
pub mod credit;
pub mod environment;
pub mod error;
pub mod files;
pub mod keys;
pub mod messages;
pub mod misc;
pub mod pending;

pub use environment::LmdbStore;
pub use error::LmdbError;
