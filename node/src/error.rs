use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] ccn_store::StoreError),

    #[error("storage backend error: {0}")]
    Lmdb(#[from] ccn_store_lmdb::LmdbError),

    #[error("cost error: {0}")]
    Cost(#[from] ccn_cost::CostError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
