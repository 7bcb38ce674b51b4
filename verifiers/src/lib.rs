//! Per-chain signature verification.
//!
//! One verifier per supported chain, dispatched through a registry built once
//! at startup and injected into the pipeline. Every verifier authenticates
//! the same canonical buffer (`chain\nsender\ntype\nitem_hash`) but decodes a
//! chain-specific signature payload. A malformed payload verifies as `false`;
//! it never propagates a parse error.

pub mod hexchain;
pub mod solana;
pub mod tezos;

use std::collections::HashMap;

use ccn_schemas::CandidateMessage;
use ccn_types::Chain;

/// A single chain's signature scheme.
///
/// `sender` is the chain-native address claimed by the envelope; `payload`
/// is the envelope's signature field (chain-specific JSON).
pub trait ChainVerifier: Send + Sync {
    fn verify(&self, buffer: &[u8], sender: &str, payload: &str) -> bool;
}

/// Error from registry dispatch.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// The chain is not enabled in this registry.
    #[error("chain {0} is not enabled")]
    UnknownChain(Chain),
}

/// Enum-keyed verifier table, built from compiled-in implementations.
///
/// Adding a chain is a compile-time extension: a new `Chain` variant, a new
/// verifier module, and an arm in [`Registry::verifier_for`].
pub struct Registry {
    verifiers: HashMap<Chain, Box<dyn ChainVerifier>>,
}

impl Registry {
    /// Build a registry for the given set of enabled chains.
    pub fn new(chains: &[Chain]) -> Self {
        let mut verifiers: HashMap<Chain, Box<dyn ChainVerifier>> = HashMap::new();
        for &chain in chains {
            verifiers.insert(chain, Self::verifier_for(chain));
        }
        Self { verifiers }
    }

    /// Registry with every compiled-in chain enabled.
    pub fn with_all_chains() -> Self {
        Self::new(&Chain::ALL)
    }

    fn verifier_for(chain: Chain) -> Box<dyn ChainVerifier> {
        match chain {
            Chain::Hex => Box::new(hexchain::HexVerifier),
            Chain::Solana => Box::new(solana::SolanaVerifier),
            Chain::Tezos => Box::new(tezos::TezosVerifier),
        }
    }

    pub fn is_enabled(&self, chain: Chain) -> bool {
        self.verifiers.contains_key(&chain)
    }

    /// Verify a candidate's signature against its claimed sender.
    pub fn verify(&self, candidate: &CandidateMessage) -> Result<bool, VerifierError> {
        let verifier = self
            .verifiers
            .get(&candidate.chain)
            .ok_or(VerifierError::UnknownChain(candidate.chain))?;
        let buffer = candidate.verification_buffer();
        Ok(verifier.verify(&buffer, candidate.sender.as_str(), &candidate.signature))
    }
}

/// Shared payload shape: every chain carries `{signature, publicKey}` with
/// chain-specific encodings inside the strings.
#[derive(serde::Deserialize)]
pub(crate) struct SignaturePayload {
    pub signature: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

impl SignaturePayload {
    pub(crate) fn parse(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::debug!(%err, "signature payload is not valid JSON");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccn_types::{Address, ItemType, MessageType, Timestamp};

    fn candidate(chain: Chain, sender: &str, signature: &str) -> CandidateMessage {
        CandidateMessage {
            item_hash: "9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44".into(),
            sender: Address::from(sender),
            chain,
            message_type: MessageType::Post,
            signature: signature.to_string(),
            item_type: ItemType::Storage,
            item_content: None,
            time: Timestamp::from_millis(1_000),
            channel: None,
        }
    }

    #[test]
    fn disabled_chain_is_unknown() {
        let registry = Registry::new(&[Chain::Hex]);
        let result = registry.verify(&candidate(Chain::Solana, "abc", "{}"));
        assert!(matches!(result, Err(VerifierError::UnknownChain(Chain::Solana))));
    }

    #[test]
    fn all_chains_registry_dispatches_everywhere() {
        let registry = Registry::with_all_chains();
        for chain in Chain::ALL {
            assert!(registry.is_enabled(chain));
            // Garbage payloads must come back as a clean `false`.
            let verified = registry.verify(&candidate(chain, "someone", "not json")).unwrap();
            assert!(!verified);
        }
    }

    #[test]
    fn valid_hex_signature_verifies_end_to_end() {
        let registry = Registry::with_all_chains();
        let kp = ccn_crypto::generate_keypair();
        let sender = format!("0x{}", hex::encode(kp.public));

        let mut msg = candidate(Chain::Hex, &sender, "");
        let sig = ccn_crypto::sign_message(&msg.verification_buffer(), &kp.private);
        msg.signature = format!(
            r#"{{"signature":"{}","publicKey":"{}"}}"#,
            hex::encode(sig),
            hex::encode(kp.public)
        );
        assert!(registry.verify(&msg).unwrap());
    }

    #[test]
    fn tampered_hash_fails_verification() {
        let registry = Registry::with_all_chains();
        let kp = ccn_crypto::generate_keypair();
        let sender = format!("0x{}", hex::encode(kp.public));

        let mut msg = candidate(Chain::Hex, &sender, "");
        let sig = ccn_crypto::sign_message(&msg.verification_buffer(), &kp.private);
        msg.signature = format!(
            r#"{{"signature":"{}","publicKey":"{}"}}"#,
            hex::encode(sig),
            hex::encode(kp.public)
        );
        // Flip the item hash after signing.
        msg.item_hash =
            "0000000000000000000000000000000000000000000000000000000000000000".into();
        assert!(!registry.verify(&msg).unwrap());
    }
}
