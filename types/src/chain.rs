//! Chain identifiers for message origins and confirmations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A blockchain a message can be signed on and confirmed against.
///
/// Closed set: adding a chain is a compile-time extension that also requires
/// a verifier implementation in the verifier registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Native hex chain: `0x…` addresses, hex-encoded ed25519 signatures.
    Hex,
    /// Solana: base58 addresses and signatures.
    Solana,
    /// Tezos: base58check `tz1…` addresses, `edsig…` signatures.
    Tezos,
}

impl Chain {
    pub const ALL: [Chain; 3] = [Chain::Hex, Chain::Solana, Chain::Tezos];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Hex => "hex",
            Chain::Solana => "solana",
            Chain::Tezos => "tezos",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Chain {
    type Err = UnknownChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hex" => Ok(Chain::Hex),
            "solana" => Ok(Chain::Solana),
            "tezos" => Ok(Chain::Tezos),
            other => Err(UnknownChain(other.to_string())),
        }
    }
}

/// Error for a chain identifier outside the compiled-in set.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown chain: {0}")]
pub struct UnknownChain(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_chains() {
        for chain in Chain::ALL {
            assert_eq!(chain.as_str().parse::<Chain>().unwrap(), chain);
        }
    }

    #[test]
    fn unknown_chain_rejected() {
        let err = "dogecoin".parse::<Chain>().unwrap_err();
        assert_eq!(err.0, "dogecoin");
    }

    #[test]
    fn serde_uses_lowercase() {
        let json = serde_json::to_string(&Chain::Solana).unwrap();
        assert_eq!(json, "\"solana\"");
        let back: Chain = serde_json::from_str("\"tezos\"").unwrap();
        assert_eq!(back, Chain::Tezos);
    }
}
