//! Native hex chain: `0x…` addresses, hex-encoded ed25519 signatures.

use crate::{ChainVerifier, SignaturePayload};

pub struct HexVerifier;

fn decode_hex_array<const N: usize>(s: &str) -> Option<[u8; N]> {
    let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s)).ok()?;
    bytes.try_into().ok()
}

impl ChainVerifier for HexVerifier {
    fn verify(&self, buffer: &[u8], sender: &str, payload: &str) -> bool {
        let Some(parsed) = SignaturePayload::parse(payload) else {
            return false;
        };
        let Some(signature) = decode_hex_array::<64>(&parsed.signature) else {
            tracing::debug!("hex signature has wrong length or encoding");
            return false;
        };
        let Some(public_key) = decode_hex_array::<32>(&parsed.public_key) else {
            tracing::debug!("hex public key has wrong length or encoding");
            return false;
        };

        // The address *is* the public key: `0x` + lowercase hex.
        let derived = format!("0x{}", hex::encode(public_key));
        if !derived.eq_ignore_ascii_case(sender) {
            return false;
        }

        ccn_crypto::verify_signature(buffer, &signature, &public_key)
    }
}
