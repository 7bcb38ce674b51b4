//! Cost computation: a pure function of content and pricing.

use ccn_schemas::MessageContent;
use ccn_types::Timestamp;

use crate::pricing::{price_scale, CostPolicy, PricingTable};

/// Projected cost of a message under each payment model. Stream and credit
/// amounts are per hour of runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cost {
    pub hold: u128,
    pub stream: u128,
    pub credit: u128,
}

impl Cost {
    pub const FREE: Cost = Cost {
        hold: 0,
        stream: 0,
        credit: 0,
    };

    pub fn is_free(&self) -> bool {
        *self == Self::FREE
    }
}

const MIB: u64 = 1024 * 1024;

fn size_mib_ceil(size: u64) -> u128 {
    u128::from((size + MIB - 1) / MIB)
}

/// Compute the cost of a message's content.
///
/// `content_size` is the byte size of stored content for STORE messages
/// (declared or measured after fetch). Posts, aggregates, and forgets are
/// free: their cost is borne by the network as plain replication.
pub fn compute_cost(
    content: &MessageContent,
    content_size: Option<u64>,
    pricing: &PricingTable,
    policy: &CostPolicy,
    message_time: Timestamp,
) -> Cost {
    let scale = price_scale(message_time, policy.price_scale_cutover);
    match content {
        MessageContent::Post(_) | MessageContent::Aggregate(_) | MessageContent::Forget(_) => {
            Cost::FREE
        }
        MessageContent::Store(store) => {
            let size = store.size.or(content_size).unwrap_or(0);
            let mib = size_mib_ceil(size);
            Cost {
                hold: mib * pricing.storage_mib_hold * scale,
                stream: mib * pricing.storage_mib_stream_hour * scale,
                credit: 0,
            }
        }
        MessageContent::Resource(resource) => {
            let units = u128::from(resource.resources.units());
            let mut cost = Cost {
                hold: units * pricing.compute_unit_hold * scale,
                stream: units * pricing.compute_unit_stream_hour * scale,
                credit: units * pricing.compute_unit_credit_hour * scale,
            };
            // A deployment's rootfs is pinned like a store item.
            if resource.rootfs.is_some() {
                let mib = size_mib_ceil(content_size.unwrap_or(0));
                cost.hold += mib * pricing.storage_mib_hold * scale;
                cost.stream += mib * pricing.storage_mib_stream_hour * scale;
            }
            cost
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccn_schemas::{ComputeUnits, PostContent, ResourceContent, StoreContent};
    use ccn_types::{ItemType, PaymentType};

    fn pricing() -> PricingTable {
        PricingTable {
            storage_mib_hold: 20,
            storage_mib_stream_hour: 1,
            compute_unit_hold: 200,
            compute_unit_stream_hour: 8,
            compute_unit_credit_hour: 10,
        }
    }

    fn policy() -> CostPolicy {
        CostPolicy {
            price_scale_cutover: Timestamp::from_secs(1_000_000),
            ..CostPolicy::default()
        }
    }

    #[test]
    fn posts_are_free() {
        let content = MessageContent::Post(PostContent {
            address: "0xa".into(),
            time: 1.0,
            post_type: "blog".into(),
            content: serde_json::json!({}),
            ref_hash: None,
        });
        let cost = compute_cost(&content, None, &pricing(), &policy(), Timestamp::from_secs(1));
        assert!(cost.is_free());
    }

    #[test]
    fn store_cost_rounds_size_up_to_mib() {
        let content = MessageContent::Store(StoreContent {
            address: "0xa".into(),
            time: 1.0,
            item_type: ItemType::Storage,
            item_hash: "9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44".into(),
            size: Some(MIB + 1),
        });
        let cost = compute_cost(&content, None, &pricing(), &policy(), Timestamp::from_secs(1));
        assert_eq!(cost.hold, 2 * 20);
        assert_eq!(cost.stream, 2);
    }

    #[test]
    fn measured_size_backs_up_missing_declaration() {
        let content = MessageContent::Store(StoreContent {
            address: "0xa".into(),
            time: 1.0,
            item_type: ItemType::Storage,
            item_hash: "9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44".into(),
            size: None,
        });
        let cost = compute_cost(&content, Some(100), &pricing(), &policy(), Timestamp::from_secs(1));
        assert_eq!(cost.hold, 20);
    }

    #[test]
    fn resource_cost_scales_with_units() {
        let content = MessageContent::Resource(ResourceContent {
            address: "0xa".into(),
            time: 1.0,
            name: None,
            resources: ComputeUnits { vcpus: 2, memory_mib: 4096 },
            payment: PaymentType::Hold,
            rootfs: None,
        });
        // 2 vcpus + 2 memory units = 4 units
        let cost = compute_cost(&content, None, &pricing(), &policy(), Timestamp::from_secs(1));
        assert_eq!(cost.hold, 4 * 200);
        assert_eq!(cost.stream, 4 * 8);
        assert_eq!(cost.credit, 4 * 10);
    }

    #[test]
    fn post_cutover_messages_use_scaled_prices() {
        let content = MessageContent::Store(StoreContent {
            address: "0xa".into(),
            time: 1.0,
            item_type: ItemType::Storage,
            item_hash: "9e1087cd2b8b7bbd8b5a4fbdc7f30b7f51bcb00b771bbdbaae5191e4d73b7f44".into(),
            size: Some(1),
        });
        let before = compute_cost(&content, None, &pricing(), &policy(), Timestamp::from_secs(999_999));
        let after = compute_cost(&content, None, &pricing(), &policy(), Timestamp::from_secs(1_000_000));
        assert_eq!(before.hold * 10_000, after.hold);
    }
}
