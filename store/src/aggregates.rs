//! Aggregate elements and the deep-merge view over them.
//!
//! The store keeps every admitted AGGREGATE message as an element keyed by
//! `(owner, key, item_hash)`. The merged document is computed from elements
//! in time order, so replaying an element or applying elements out of order
//! converges to the same result.

use ccn_types::{Address, ItemHash, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// One AGGREGATE message's contribution to an owner's keyed document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateElement {
    pub owner: Address,
    pub key: String,
    pub item_hash: ItemHash,
    pub time: Timestamp,
    pub content: serde_json::Value,
}

/// Storage for aggregate elements.
pub trait AggregateStore {
    /// Insert an element. Returns `false` when the `(owner, key, item_hash)`
    /// triple already exists (idempotent re-apply).
    fn insert_aggregate_element(&self, element: &AggregateElement) -> Result<bool, StoreError>;

    /// Elements for `(owner, key)` ascending by `(time, item_hash)`.
    fn aggregate_elements(
        &self,
        owner: &Address,
        key: &str,
    ) -> Result<Vec<AggregateElement>, StoreError>;
}

/// Deep-merge `incoming` over `base`, last write winning per leaf key.
///
/// Objects merge recursively; any other value type replaces wholesale.
pub fn deep_merge(base: &mut serde_json::Value, incoming: &serde_json::Value) {
    match (base, incoming) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, _) => *base_slot = incoming.clone(),
    }
}

/// The merged document for a list of elements, applied in `(time,
/// item_hash)` order so the result does not depend on arrival order.
pub fn merged_view(elements: &[AggregateElement]) -> serde_json::Value {
    let mut sorted: Vec<&AggregateElement> = elements.iter().collect();
    sorted.sort_by(|a, b| (a.time, &a.item_hash).cmp(&(b.time, &b.item_hash)));
    let mut doc = serde_json::Value::Object(serde_json::Map::new());
    for element in sorted {
        deep_merge(&mut doc, &element.content);
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn element(hash: &str, time_ms: u64, content: serde_json::Value) -> AggregateElement {
        AggregateElement {
            owner: Address::from("0xowner"),
            key: "profile".into(),
            item_hash: ItemHash::from(hash),
            time: Timestamp::from_millis(time_ms),
            content,
        }
    }

    #[test]
    fn later_leaf_wins() {
        let elements = vec![
            element("h1", 1_000, json!({"name": "old", "bio": "kept"})),
            element("h2", 2_000, json!({"name": "new"})),
        ];
        let view = merged_view(&elements);
        assert_eq!(view, json!({"name": "new", "bio": "kept"}));
    }

    #[test]
    fn merge_is_arrival_order_independent() {
        let a = element("h1", 1_000, json!({"x": 1}));
        let b = element("h2", 2_000, json!({"x": 2, "y": 3}));
        let forward = merged_view(&[a.clone(), b.clone()]);
        let reversed = merged_view(&[b, a]);
        assert_eq!(forward, reversed);
        assert_eq!(forward, json!({"x": 2, "y": 3}));
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let elements = vec![
            element("h1", 1_000, json!({"settings": {"theme": "dark", "lang": "en"}})),
            element("h2", 2_000, json!({"settings": {"theme": "light"}})),
        ];
        let view = merged_view(&elements);
        assert_eq!(view, json!({"settings": {"theme": "light", "lang": "en"}}));
    }

    #[test]
    fn non_object_replaces_wholesale() {
        let elements = vec![
            element("h1", 1_000, json!({"tags": ["a", "b"]})),
            element("h2", 2_000, json!({"tags": ["c"]})),
        ];
        assert_eq!(merged_view(&elements), json!({"tags": ["c"]}));
    }

    #[test]
    fn equal_times_break_ties_by_hash() {
        let elements = vec![
            element("h2", 1_000, json!({"v": "from-h2"})),
            element("h1", 1_000, json!({"v": "from-h1"})),
        ];
        // h2 sorts after h1, so it wins regardless of list order.
        assert_eq!(merged_view(&elements), json!({"v": "from-h2"}));
    }
}
