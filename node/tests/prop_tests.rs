//! Property tests for retry backoff.

use ccn_node::retry::RetryPolicy;
use proptest::prelude::*;

proptest! {
    #[test]
    fn backoff_is_monotonic_and_capped(
        base in 1u64..600,
        max in 600u64..86_400,
        retries in 0u32..200,
    ) {
        let policy = RetryPolicy { base_secs: base, max_secs: max, alert_threshold: 20 };
        let current = policy.backoff_secs(retries);
        let next = policy.backoff_secs(retries + 1);
        // Intervals never shrink and never exceed the cap.
        prop_assert!(next >= current);
        prop_assert!(current <= max);
        prop_assert!(next <= max);
    }

    #[test]
    fn backoff_starts_at_base(base in 1u64..600, max in 600u64..86_400) {
        let policy = RetryPolicy { base_secs: base, max_secs: max, alert_threshold: 20 };
        prop_assert_eq!(policy.backoff_secs(0), base.min(max));
    }

    #[test]
    fn huge_retry_counts_never_panic(retries in 0u32..=u32::MAX) {
        let policy = RetryPolicy { base_secs: 30, max_secs: 3_600, alert_threshold: 20 };
        prop_assert_eq!(policy.backoff_secs(retries).max(3_600), 3_600);
    }
}
