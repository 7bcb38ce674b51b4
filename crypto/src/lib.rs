//! Cryptographic primitives for the CCN node.
//!
//! Ed25519 signing and verification, content digests (sha256, blake2b), and
//! the base58 / base58check codecs used by chain-specific address formats.

pub mod base58;
pub mod hash;
pub mod keys;
pub mod sign;

pub use base58::{decode_base58, decode_base58check, encode_base58, encode_base58check};
pub use hash::{blake2b_160, blake2b_256, sha256, sha256_hex};
pub use keys::{generate_keypair, keypair_from_seed, KeyPair};
pub use sign::{sign_message, verify_signature};
