//! Scenario tests for PersistentMap.

use persistent_collections::error::CollectionError;
use persistent_collections::persistent::PersistentMap;
use persistent_collections::value::{Hash, Identity, Structural, Value};
use rstest::rstest;

/// Key whose hash is chosen independently of its identity.
#[derive(Debug, Clone, PartialEq)]
struct Colliding {
    name: &'static str,
    id: i32,
    hash: Hash,
}

impl Value for Colliding {
    fn hash_code(&self) -> Hash {
        self.hash
    }

    fn equals(&self, other: &Self) -> bool {
        self.name == other.name && self.id == other.id
    }
}

const fn colliding(name: &'static str) -> Colliding {
    Colliding { name, id: 0, hash: 77 }
}

// =============================================================================
// Basic reads and writes
// =============================================================================

#[rstest]
fn test_new_map_is_empty() {
    let map: PersistentMap<String, i32> = PersistentMap::new();
    assert!(map.is_empty());
    assert_eq!(map.len(), 0);
    assert_eq!(map.get("key"), None);
    assert_eq!(map.iter().next(), None);
}

#[rstest]
fn test_set_set_remove() {
    let map = PersistentMap::new().set("a", 1).set("b", 2).remove(&"a");
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&"b"), Some(&2));
    assert!(!map.has(&"a"));
}

#[rstest]
fn test_set_does_not_modify_original() {
    let first = PersistentMap::new().set("key".to_string(), 1);
    let second = first.set("other".to_string(), 2);
    assert_eq!(first.len(), 1);
    assert_eq!(first.get("other"), None);
    assert_eq!(second.len(), 2);
}

#[rstest]
fn test_overwrite_keeps_size() {
    let map = PersistentMap::new().set("key", 1).set("key", 2);
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&"key"), Some(&2));
}

#[rstest]
fn test_get_or_returns_default_for_missing_key() {
    let map = PersistentMap::of([("a", 1)]);
    assert_eq!(map.get_or(&"a", &0), &1);
    assert_eq!(map.get_or(&"z", &0), &0);
}

#[rstest]
fn test_get_key_value_returns_stored_key() {
    let map = PersistentMap::new().set("stored".to_string(), 1);
    let (key, value) = map.get_key_value("stored").unwrap();
    assert_eq!(key, "stored");
    assert_eq!(value, &1);
}

#[rstest]
fn test_remove_missing_key_shares_root() {
    let map = PersistentMap::of([(1, 1), (2, 2)]);
    assert!(map.remove(&3).ptr_eq(&map));
    let empty: PersistentMap<i32, i32> = PersistentMap::new();
    assert!(empty.remove(&3).is_empty());
}

// =============================================================================
// Collisions
// =============================================================================

#[rstest]
fn test_colliding_keys_are_retrievable_independently() {
    let map = PersistentMap::new()
        .set(colliding("first"), 1)
        .set(colliding("second"), 2);
    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&colliding("first")), Some(&1));
    assert_eq!(map.get(&colliding("second")), Some(&2));
    assert_eq!(map.get(&colliding("third")), None);
}

#[rstest]
fn test_removing_from_collision_keeps_survivor() {
    let map = PersistentMap::new()
        .set(colliding("first"), 1)
        .set(colliding("second"), 2)
        .set(colliding("third"), 3)
        .remove(&colliding("second"));
    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&colliding("first")), Some(&1));
    assert_eq!(map.get(&colliding("third")), Some(&3));

    let single = map.remove(&colliding("first"));
    assert_eq!(single.len(), 1);
    assert_eq!(single.get(&colliding("third")), Some(&3));
}

#[rstest]
fn test_collisions_mixed_with_ordinary_keys() {
    let map: PersistentMap<Colliding, i32> = (0..40)
        .map(|index| {
            let key = Colliding {
                name: "paired",
                id: index,
                hash: index / 2,
            };
            (key, index)
        })
        .collect();
    assert_eq!(map.len(), 40);
    for index in 0..40 {
        let key = Colliding { name: "paired", id: index, hash: index / 2 };
        assert_eq!(map.get(&key), Some(&index));
    }
    assert_eq!(map.get(&Colliding { name: "paired", id: 15, hash: 8 }), None);

    let halved = (0..40)
        .step_by(2)
        .fold(map, |map, index| map.remove(&Colliding { name: "paired", id: index, hash: index / 2 }));
    assert_eq!(halved.len(), 20);
    assert_eq!(halved.get(&Colliding { name: "paired", id: 15, hash: 7 }), Some(&15));
    assert!(!halved.has(&Colliding { name: "paired", id: 14, hash: 7 }));
}

// =============================================================================
// Promotion and demotion
// =============================================================================

#[rstest]
#[case(1)]
#[case(8)]
#[case(9)]
#[case(16)]
#[case(17)]
#[case(40)]
#[case(2000)]
fn test_insert_then_remove_all(#[case] count: i32) {
    let base = PersistentMap::of([(-1, -1)]);
    let grown = (0..count).fold(base.clone(), |map, key| map.set(key, key * 10));
    assert_eq!(grown.len(), count as usize + 1);
    for key in 0..count {
        assert_eq!(grown.get(&key), Some(&(key * 10)));
    }
    let shrunk = (0..count).fold(grown, |map, key| map.remove(&key));
    assert_eq!(shrunk, base);
}

// =============================================================================
// update / merge / clear
// =============================================================================

#[rstest]
fn test_update_counts() {
    let map = PersistentMap::new().set("count", 10);
    let incremented = map.update("count", |value| value.map(|value| value + 1));
    assert_eq!(incremented.get(&"count"), Some(&11));
    let untouched = map.update("missing", |_| None);
    assert!(untouched.ptr_eq(&map));
}

#[rstest]
fn test_merge_prefers_right() {
    let left = PersistentMap::of([("a", 1), ("b", 2)]);
    let right = PersistentMap::of([("b", 20), ("c", 30)]);
    let merged = left.merge(&right);
    assert_eq!(merged, PersistentMap::of([("a", 1), ("b", 20), ("c", 30)]));
    assert_eq!(PersistentMap::new().merge(&right), right);
}

#[rstest]
fn test_clear() {
    assert!(PersistentMap::of([(1, 2)]).clear().is_empty());
}

// =============================================================================
// Rows
// =============================================================================

#[rstest]
fn test_try_from_rows_accepts_pairs() {
    let map = PersistentMap::try_from_rows([[1, 10], [2, 20]]).unwrap();
    assert_eq!(map, PersistentMap::of([(1, 10), (2, 20)]));
}

#[rstest]
#[case(vec![vec![1, 10], vec![2, 20, 30]], 1, 3)]
#[case(vec![vec![1]], 0, 1)]
#[case(vec![vec![1, 2], vec![]], 1, 0)]
fn test_try_from_rows_rejects_malformed(
    #[case] rows: Vec<Vec<i32>>,
    #[case] index: usize,
    #[case] length: usize,
) {
    assert_eq!(
        PersistentMap::try_from_rows(rows).unwrap_err(),
        CollectionError::MalformedEntry { index, length }
    );
}

// =============================================================================
// Batching
// =============================================================================

#[rstest]
fn test_with_mutations_matches_individual_sets() {
    let individual = (0..1000).fold(PersistentMap::new(), |map, key| map.set(key, key));
    let batched = PersistentMap::new().with_mutations(|map| {
        for key in 0..1000 {
            map.set(key, key);
        }
    });
    assert_eq!(individual, batched);
    assert!(individual.iter().eq(batched.iter()));
}

#[rstest]
fn test_batch_leaves_source_untouched() {
    let source: PersistentMap<i32, i32> = (0..100).map(|key| (key, key)).collect();
    let edited = source.with_mutations(|map| {
        for key in 0..50 {
            map.remove(&key);
        }
        map.set(500, 500);
    });
    assert_eq!(source.len(), 100);
    assert_eq!(edited.len(), 51);
    assert!(source.has(&0));
}

#[rstest]
fn test_manual_batch_lifetime() {
    let source = PersistentMap::of([("a", 1)]);
    let mut transient = source.as_mutable();
    transient.set("b", 2);
    transient.update("a", |value| value.map(|value| value * 100));
    assert_eq!(transient.get(&"a"), Some(&100));
    let frozen = transient.as_immutable();
    assert_eq!(frozen, PersistentMap::of([("a", 100), ("b", 2)]));
    assert_eq!(source.get(&"a"), Some(&1));
}

// =============================================================================
// Keys with custom value protocols
// =============================================================================

#[rstest]
fn test_identity_keys_compare_by_reference() {
    let first = Identity::new("shape");
    let twin = Identity::new("shape");
    let map = PersistentMap::new().set(first.clone(), 1).set(twin.clone(), 2);
    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&first), Some(&1));
    assert_eq!(map.get(&twin), Some(&2));
}

#[rstest]
fn test_structural_keys_compare_by_contents() {
    #[derive(Clone, Hash, PartialEq, Eq)]
    struct Point {
        x: i32,
        y: i32,
    }
    let map = PersistentMap::new().set(Structural(Point { x: 1, y: 2 }), "a");
    assert_eq!(map.get(&Structural(Point { x: 1, y: 2 })), Some(&"a"));
    assert_eq!(map.get(&Structural(Point { x: 2, y: 1 })), None);
}

#[rstest]
fn test_maps_as_keys() {
    let inner = PersistentMap::of([(1, 1)]);
    let outer = PersistentMap::new().set(inner, "found");
    assert_eq!(outer.get(&PersistentMap::of([(1, 1)])), Some(&"found"));
}

#[rstest]
fn test_debug_lists_entries() {
    assert_eq!(format!("{:?}", PersistentMap::of([(1, 2)])), "{1: 2}");
}

#[rstest]
fn test_display_lists_entries() {
    assert_eq!(PersistentMap::of([("x", 7)]).to_string(), "{x: 7}");
}
