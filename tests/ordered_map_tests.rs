//! Scenario and property tests for OrderedMap and OrderedSet.

use persistent_collections::persistent::{OrderedMap, OrderedSet, PersistentMap};
use persistent_collections::value::Value;
use proptest::prelude::*;
use rstest::rstest;

// =============================================================================
// OrderedMap scenarios
// =============================================================================

#[rstest]
fn test_reinsertion_goes_to_the_end() {
    let map = OrderedMap::new()
        .set("a", 1)
        .set("b", 2)
        .set("c", 3)
        .remove(&"b")
        .set("b", 4);
    let keys: Vec<&str> = map.keys().copied().collect();
    assert_eq!(keys, vec!["a", "c", "b"]);
}

#[rstest]
fn test_overwrite_keeps_original_position() {
    let map = OrderedMap::of([("x", 1), ("y", 2), ("z", 3)]).set("x", 10);
    let entries: Vec<(&str, i32)> = map.iter().map(|(key, value)| (*key, *value)).collect();
    assert_eq!(entries, vec![("x", 10), ("y", 2), ("z", 3)]);
}

#[rstest]
fn test_same_lookups_as_unordered_map() {
    let ordered: OrderedMap<i32, i32> = (0..500).map(|key| (key * 7 % 500, key)).collect();
    let unordered: PersistentMap<i32, i32> = (0..500).map(|key| (key * 7 % 500, key)).collect();
    assert_eq!(ordered.len(), unordered.len());
    for (key, value) in &unordered {
        assert_eq!(ordered.get(key), Some(value));
    }
}

#[rstest]
fn test_heavy_churn_keeps_order() {
    let mut map = OrderedMap::new();
    for round in 0..10 {
        for key in 0..100 {
            map = map.set(key, round);
        }
        for key in (0..100).filter(|key| key % 3 != round % 3) {
            map = map.remove(&key);
        }
    }
    let keys: Vec<i32> = map.keys().copied().collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);
    assert!(keys.iter().all(|key| key % 3 == 0));
}

#[rstest]
fn test_values_and_get_or() {
    let map = OrderedMap::of([("a", 1), ("b", 2)]);
    assert_eq!(map.values().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(map.get_or(&"c", &0), &0);
    assert!(OrderedMap::<i32, i32>::new().first().is_none());
}

#[rstest]
fn test_ordered_map_debug() {
    assert_eq!(format!("{:?}", OrderedMap::of([(2, 'b'), (1, 'a')])), "{2: 'b', 1: 'a'}");
}

// =============================================================================
// OrderedSet scenarios
// =============================================================================

#[rstest]
fn test_ordered_set_follows_insertion_order() {
    let set = OrderedSet::new().add("c").add("a").add("b").add("a");
    assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec!["c", "a", "b"]);
    assert_eq!(set.len(), 3);
}

#[rstest]
fn test_ordered_set_union_appends_unseen() {
    let union = OrderedSet::of([1, 2]).union(&OrderedSet::of([4, 2, 3]));
    assert_eq!(union.iter().copied().collect::<Vec<_>>(), vec![1, 2, 4, 3]);
}

#[rstest]
fn test_ordered_set_batch() {
    let set = OrderedSet::of([1, 2, 3]).with_mutations(|set| {
        set.remove(&2);
        set.add(2);
        set.add(4);
    });
    assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![1, 3, 2, 4]);
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Debug, Clone)]
enum Operation {
    Set(u8, i32),
    Remove(u8),
}

fn arbitrary_operations() -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(
        prop_oneof![
            2 => (any::<u8>(), any::<i32>()).prop_map(|(key, value)| Operation::Set(key, value)),
            1 => any::<u8>().prop_map(Operation::Remove),
        ],
        0..400,
    )
}

/// Insertion-ordered model: a vector of pairs.
fn model_apply(model: &mut Vec<(u8, i32)>, operation: &Operation) {
    match *operation {
        Operation::Set(key, value) => match model.iter_mut().find(|(stored, _)| *stored == key) {
            Some(entry) => entry.1 = value,
            None => model.push((key, value)),
        },
        Operation::Remove(key) => model.retain(|(stored, _)| *stored != key),
    }
}

fn map_apply(map: &OrderedMap<u8, i32>, operation: &Operation) -> OrderedMap<u8, i32> {
    match *operation {
        Operation::Set(key, value) => map.set(key, value),
        Operation::Remove(key) => map.remove(&key),
    }
}

proptest! {
    #[test]
    fn prop_matches_insertion_order_model(operations in arbitrary_operations()) {
        let mut model = Vec::new();
        let mut map = OrderedMap::new();
        for operation in &operations {
            model_apply(&mut model, operation);
            map = map_apply(&map, operation);
        }
        let entries: Vec<(u8, i32)> = map.iter().map(|(key, value)| (*key, *value)).collect();
        prop_assert_eq!(entries, model.clone());
        let reversed: Vec<(u8, i32)> = map.iter().rev().map(|(key, value)| (*key, *value)).collect();
        prop_assert_eq!(reversed, model.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn prop_batch_equivalence(operations in arbitrary_operations()) {
        let individual = operations.iter().fold(OrderedMap::new(), |map, operation| map_apply(&map, operation));
        let batched = OrderedMap::new().with_mutations(|map| {
            for operation in &operations {
                match *operation {
                    Operation::Set(key, value) => {
                        map.set(key, value);
                    }
                    Operation::Remove(key) => {
                        map.remove(&key);
                    }
                }
            }
        });
        prop_assert_eq!(&individual, &batched);
        prop_assert_eq!(individual.hash_code(), batched.hash_code());
    }

    #[test]
    fn prop_round_trip(operations in arbitrary_operations()) {
        let map = operations.iter().fold(OrderedMap::new(), |map, operation| map_apply(&map, operation));
        let rebuilt: OrderedMap<u8, i32> = map.iter().map(|(key, value)| (*key, *value)).collect();
        prop_assert_eq!(&rebuilt, &map);

        let set: OrderedSet<u8> = map.keys().copied().collect();
        let rebuilt_set: OrderedSet<u8> = set.iter().copied().collect();
        prop_assert_eq!(rebuilt_set, set);
    }

    #[test]
    fn prop_persistence(operations in arbitrary_operations()) {
        let base: OrderedMap<u8, i32> = (0..50).map(|key| (key, i32::from(key))).collect();
        let _ = operations.iter().fold(base.clone(), |map, operation| map_apply(&map, operation));
        prop_assert!(base.iter().map(|(key, _)| *key).eq(0..50));
    }
}
