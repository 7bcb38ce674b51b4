//! Base58 and base58check codecs.
//!
//! Base58check frames a payload as `prefix ++ payload ++ checksum` where the
//! checksum is the first four bytes of sha256(sha256(prefix ++ payload)).
//! Chain formats built on it (tz1 addresses, edpk keys, edsig signatures)
//! differ only in their prefix bytes.

use sha2::{Digest, Sha256};

/// Decode a raw base58 string. Returns `None` on any invalid character.
pub fn decode_base58(s: &str) -> Option<Vec<u8>> {
    bs58::decode(s).into_vec().ok()
}

/// Encode bytes as a raw base58 string.
pub fn encode_base58(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

fn checksum(data: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

/// Decode a base58check string, verifying the checksum and stripping the
/// expected prefix. Returns the payload, or `None` if the string does not
/// decode, the checksum mismatches, or the prefix differs.
pub fn decode_base58check(s: &str, prefix: &[u8]) -> Option<Vec<u8>> {
    let raw = decode_base58(s)?;
    if raw.len() < prefix.len() + 4 {
        return None;
    }
    let (body, check) = raw.split_at(raw.len() - 4);
    if checksum(body) != check {
        return None;
    }
    if !body.starts_with(prefix) {
        return None;
    }
    Some(body[prefix.len()..].to_vec())
}

/// Encode a payload as base58check under the given prefix.
pub fn encode_base58check(prefix: &[u8], payload: &[u8]) -> String {
    let mut body = Vec::with_capacity(prefix.len() + payload.len() + 4);
    body.extend_from_slice(prefix);
    body.extend_from_slice(payload);
    let check = checksum(&body);
    body.extend_from_slice(&check);
    encode_base58(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &[u8] = &[6, 161, 159];

    #[test]
    fn base58_round_trip() {
        let data = b"some payload bytes";
        let encoded = encode_base58(data);
        assert_eq!(decode_base58(&encoded).unwrap(), data);
    }

    #[test]
    fn base58_rejects_invalid_chars() {
        assert!(decode_base58("0OIl").is_none());
    }

    #[test]
    fn base58check_round_trip() {
        let payload = [0xabu8; 20];
        let encoded = encode_base58check(PREFIX, &payload);
        assert_eq!(decode_base58check(&encoded, PREFIX).unwrap(), payload);
    }

    #[test]
    fn base58check_rejects_wrong_prefix() {
        let encoded = encode_base58check(PREFIX, &[1u8; 20]);
        assert!(decode_base58check(&encoded, &[9, 9, 9]).is_none());
    }

    #[test]
    fn base58check_rejects_corrupted_checksum() {
        let mut encoded = encode_base58check(PREFIX, &[1u8; 20]).into_bytes();
        let last = encoded.len() - 1;
        encoded[last] = if encoded[last] == b'2' { b'3' } else { b'2' };
        let corrupted = String::from_utf8(encoded).unwrap();
        assert!(decode_base58check(&corrupted, PREFIX).is_none());
    }

    #[test]
    fn too_short_input_rejected() {
        assert!(decode_base58check("2g", PREFIX).is_none());
    }
}
