//! Ed25519 key generation.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

/// An Ed25519 key pair as raw byte arrays.
#[derive(Clone)]
pub struct KeyPair {
    pub public: [u8; 32],
    pub private: [u8; 32],
}

/// Generate a new Ed25519 key pair from a secure random source.
pub fn generate_keypair() -> KeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    KeyPair {
        public: signing_key.verifying_key().to_bytes(),
        private: signing_key.to_bytes(),
    }
}

/// Derive a key pair deterministically from a 32-byte seed.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing_key = SigningKey::from_bytes(seed);
    KeyPair {
        public: signing_key.verifying_key().to_bytes(),
        private: signing_key.to_bytes(),
    }
}
