//! Property tests for item-hash classification and timestamps.

use ccn_types::{ItemHash, ItemHashKind, Timestamp};
use proptest::prelude::*;

proptest! {
    #[test]
    fn any_64_char_lowercase_hex_is_storage(s in "[0-9a-f]{64}") {
        prop_assert_eq!(ItemHash::new(s).kind(), Some(ItemHashKind::Storage));
    }

    #[test]
    fn hex_of_wrong_length_is_rejected(s in "[0-9a-f]{1,63}") {
        prop_assert_eq!(ItemHash::new(s).kind(), None);
    }

    #[test]
    fn qm_prefixed_base58_is_ipfs(s in "[1-9A-HJ-NP-Za-km-z]{44}") {
        let hash = ItemHash::new(format!("Qm{s}"));
        prop_assert_eq!(hash.kind(), Some(ItemHashKind::Ipfs));
    }

    #[test]
    fn arbitrary_strings_never_panic(s in ".{0,100}") {
        let _ = ItemHash::new(s).kind();
    }

    #[test]
    fn plus_secs_is_monotonic(base in 0u64..u64::MAX / 2000, secs in 0u64..86_400) {
        let ts = Timestamp::from_millis(base);
        prop_assert!(ts.plus_secs(secs) >= ts);
    }
}
