//! Tezos: base58check-framed ed25519 (`tz1` addresses, `edpk` keys,
//! `edsig` signatures), signing the blake2b-256 digest of the buffer.

use ccn_crypto::{blake2b_160, blake2b_256, decode_base58check, encode_base58check};

use crate::{ChainVerifier, SignaturePayload};

/// Base58check prefixes from the Tezos address format.
const TZ1_PREFIX: &[u8] = &[6, 161, 159];
const EDPK_PREFIX: &[u8] = &[13, 15, 37, 217];
const EDSIG_PREFIX: &[u8] = &[9, 245, 205, 134, 18];

pub struct TezosVerifier;

/// Derive the `tz1…` address for an ed25519 public key.
pub fn tz1_address(public_key: &[u8; 32]) -> String {
    encode_base58check(TZ1_PREFIX, &blake2b_160(public_key))
}

impl ChainVerifier for TezosVerifier {
    fn verify(&self, buffer: &[u8], sender: &str, payload: &str) -> bool {
        let Some(parsed) = SignaturePayload::parse(payload) else {
            return false;
        };
        let Some(key_bytes) = decode_base58check(&parsed.public_key, EDPK_PREFIX) else {
            tracing::debug!("tezos public key is not a valid edpk string");
            return false;
        };
        let Some(sig_bytes) = decode_base58check(&parsed.signature, EDSIG_PREFIX) else {
            tracing::debug!("tezos signature is not a valid edsig string");
            return false;
        };
        let Ok(public_key) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
            return false;
        };
        let Ok(signature) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
            return false;
        };

        if tz1_address(&public_key) != sender {
            return false;
        }

        // Tezos signs the blake2b-256 digest, not the raw buffer.
        let digest = blake2b_256(buffer);
        ccn_crypto::verify_signature(&digest, &signature, &public_key)
    }
}
