use thiserror::Error;

/// Errors surfaced by a storage backend.
///
/// Duplicate-key situations are not errors here: inserts that deduplicate
/// report it through their `bool` return instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}
