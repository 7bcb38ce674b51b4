//! Composite binary keys.
//!
//! Addresses, hashes, and signatures are printable ASCII (>= 0x21), so a
//! 0x00 separator never collides with key material and prefix scans over a
//! leading component work with plain bytewise ordering. Numeric components
//! are big-endian so they sort numerically.

/// Join printable-ASCII components with a 0x00 separator.
pub fn composite(parts: &[&[u8]]) -> Vec<u8> {
    let total: usize = parts.iter().map(|p| p.len()).sum::<usize>() + parts.len();
    let mut key = Vec::with_capacity(total);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(0);
        }
        key.extend_from_slice(part);
    }
    key
}

/// A prefix ready for range scans: the components plus a trailing separator,
/// so `abc` never matches keys starting with `abcd`.
pub fn scan_prefix(parts: &[&[u8]]) -> Vec<u8> {
    let mut prefix = composite(parts);
    prefix.push(0);
    prefix
}

/// Increment a byte prefix to form the exclusive upper bound of a range scan.
pub fn increment_prefix(prefix: &mut Vec<u8>) {
    for byte in prefix.iter_mut().rev() {
        if *byte < 0xff {
            *byte += 1;
            return;
        }
        *byte = 0;
    }
    // All bytes were 0xff: fall back to an unbounded-looking sentinel.
    prefix.push(0xff);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_separates_components() {
        assert_eq!(composite(&[b"ab", b"cd"]), b"ab\0cd".to_vec());
    }

    #[test]
    fn scan_prefix_excludes_longer_components() {
        let prefix = scan_prefix(&[b"abc"]);
        let exact = composite(&[b"abc", b"x"]);
        let longer = composite(&[b"abcd", b"x"]);
        assert!(exact.starts_with(&prefix));
        assert!(!longer.starts_with(&prefix));
    }

    #[test]
    fn increment_produces_next_prefix() {
        let mut p = vec![0x61, 0x62];
        increment_prefix(&mut p);
        assert_eq!(p, vec![0x61, 0x63]);
    }

    #[test]
    fn increment_carries_through_ff() {
        let mut p = vec![0x61, 0xff];
        increment_prefix(&mut p);
        assert_eq!(p, vec![0x62, 0x00]);
    }
}
