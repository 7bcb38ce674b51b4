//! Stable numeric error codes persisted with rejected messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a message was rejected or deferred.
///
/// Codes are stable across releases: they are written to the store next to
/// rejections and consumed by operators auditing dropped traffic. Permanent
/// codes are in the 1xx range, transient codes in the 2xx range, and 500 is
/// the default class for unrecognized internal failures, which are treated
/// as transient so a bug can never silently destroy data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum ErrorCode {
    InvalidMessageFormat,
    InvalidSignature,
    UnknownChain,
    Unauthorized,
    InsufficientBalance,
    InsufficientCredit,
    PaymentTypeNotAllowed,
    UnknownHash,
    ContentUnavailable,
    StorageBackendError,
    InternalError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 11] = [
        ErrorCode::InvalidMessageFormat,
        ErrorCode::InvalidSignature,
        ErrorCode::UnknownChain,
        ErrorCode::Unauthorized,
        ErrorCode::InsufficientBalance,
        ErrorCode::InsufficientCredit,
        ErrorCode::PaymentTypeNotAllowed,
        ErrorCode::UnknownHash,
        ErrorCode::ContentUnavailable,
        ErrorCode::StorageBackendError,
        ErrorCode::InternalError,
    ];

    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::InvalidMessageFormat => 101,
            ErrorCode::InvalidSignature => 102,
            ErrorCode::UnknownChain => 103,
            ErrorCode::Unauthorized => 104,
            ErrorCode::InsufficientBalance => 105,
            ErrorCode::InsufficientCredit => 106,
            ErrorCode::PaymentTypeNotAllowed => 107,
            ErrorCode::UnknownHash => 108,
            ErrorCode::ContentUnavailable => 201,
            ErrorCode::StorageBackendError => 202,
            ErrorCode::InternalError => 500,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidMessageFormat => "message is not a valid JSON envelope",
            ErrorCode::InvalidSignature => "signature does not authenticate the sender",
            ErrorCode::UnknownChain => "chain identifier is not supported",
            ErrorCode::Unauthorized => "sender has no grant to act for the content address",
            ErrorCode::InsufficientBalance => "token balance does not cover the message cost",
            ErrorCode::InsufficientCredit => "credit balance does not cover the message cost",
            ErrorCode::PaymentTypeNotAllowed => "payment type is not accepted for this message",
            ErrorCode::UnknownHash => "item hash has an unrecognized format",
            ErrorCode::ContentUnavailable => "referenced content could not be fetched",
            ErrorCode::StorageBackendError => "storage backend request failed",
            ErrorCode::InternalError => "unrecognized internal failure",
        }
    }

    /// Whether a failure with this code is retried with backoff (`true`) or
    /// recorded as a permanent rejection (`false`).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::ContentUnavailable
                | ErrorCode::StorageBackendError
                | ErrorCode::InternalError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.code(), self)
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code.code()
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        ErrorCode::from_code(code).ok_or_else(|| format!("unknown error code {code}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(code.code()), Some(code));
        }
    }

    #[test]
    fn codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn validation_failures_are_permanent() {
        assert!(!ErrorCode::InvalidSignature.is_transient());
        assert!(!ErrorCode::Unauthorized.is_transient());
        assert!(!ErrorCode::InsufficientBalance.is_transient());
    }

    #[test]
    fn dependency_failures_are_transient() {
        assert!(ErrorCode::ContentUnavailable.is_transient());
        assert!(ErrorCode::StorageBackendError.is_transient());
    }

    #[test]
    fn unrecognized_failures_default_to_transient() {
        assert!(ErrorCode::InternalError.is_transient());
    }

    #[test]
    fn serde_round_trips_as_number() {
        let json = serde_json::to_string(&ErrorCode::InvalidSignature).unwrap();
        assert_eq!(json, "102");
        let back: ErrorCode = serde_json::from_str("201").unwrap();
        assert_eq!(back, ErrorCode::ContentUnavailable);
    }
}
