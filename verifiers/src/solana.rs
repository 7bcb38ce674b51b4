//! Solana: base58-encoded ed25519 keys and signatures.

use crate::{ChainVerifier, SignaturePayload};

pub struct SolanaVerifier;

fn decode_base58_array<const N: usize>(s: &str) -> Option<[u8; N]> {
    ccn_crypto::decode_base58(s)?.try_into().ok()
}

impl ChainVerifier for SolanaVerifier {
    fn verify(&self, buffer: &[u8], sender: &str, payload: &str) -> bool {
        let Some(parsed) = SignaturePayload::parse(payload) else {
            return false;
        };
        let Some(signature) = decode_base58_array::<64>(&parsed.signature) else {
            tracing::debug!("solana signature is not 64 bytes of base58");
            return false;
        };
        let Some(public_key) = decode_base58_array::<32>(&parsed.public_key) else {
            tracing::debug!("solana public key is not 32 bytes of base58");
            return false;
        };

        // Solana addresses are the base58 public key verbatim.
        if parsed.public_key != sender {
            return false;
        }

        ccn_crypto::verify_signature(buffer, &signature, &public_key)
    }
}
