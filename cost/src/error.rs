use ccn_store::StoreError;
use ccn_types::PaymentType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CostError {
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u128, required: u128 },

    #[error("insufficient credit: have {available}, need {required}")]
    InsufficientCredit { available: i128, required: i128 },

    #[error("payment type {0} is not accepted")]
    PaymentTypeNotAllowed(PaymentType),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
