//! Integration tests for sharing frozen containers across threads.
//!
//! With the `arc` feature every node pointer is an `Arc` and every hash cache
//! is a `OnceLock`, so frozen containers are `Send + Sync`.

#![cfg(feature = "arc")]

use persistent_collections::persistent::{
    OrderedMap, OrderedSet, PersistentList, PersistentMap, PersistentSet, TransientList,
    TransientMap,
};
use persistent_collections::value::Value;
use rstest::rstest;
use static_assertions::{assert_impl_all, assert_not_impl_any};
use std::sync::Arc;
use std::thread;

assert_impl_all!(PersistentMap<String, i32>: Send, Sync);
assert_impl_all!(PersistentSet<String>: Send, Sync);
assert_impl_all!(PersistentList<i32>: Send, Sync);
assert_impl_all!(OrderedMap<String, i32>: Send, Sync);
assert_impl_all!(OrderedSet<i32>: Send, Sync);
assert_not_impl_any!(TransientMap<String, i32>: Send, Sync);
assert_not_impl_any!(TransientList<i32>: Send, Sync);

#[rstest]
fn test_map_cross_thread_structural_sharing() {
    let original = Arc::new(PersistentMap::of([
        ("a".to_string(), 1),
        ("b".to_string(), 2),
        ("c".to_string(), 3),
    ]));

    let handles: Vec<_> = (0..4)
        .map(|index| {
            let map = Arc::clone(&original);
            thread::spawn(move || {
                let extended = map.set(format!("key_{index}"), index * 100);
                assert_eq!(extended.len(), 4);
                assert_eq!(extended.get("a"), Some(&1));
                assert_eq!(map.len(), 3);
                extended
            })
        })
        .collect();

    for (index, handle) in handles.into_iter().enumerate() {
        let extended = handle.join().expect("thread panicked");
        let expected = i32::try_from(index).expect("small index") * 100;
        assert_eq!(extended.get(format!("key_{index}").as_str()), Some(&expected));
    }
    assert_eq!(original.len(), 3);
}

#[rstest]
fn test_list_cross_thread_reads() {
    let original: Arc<PersistentList<usize>> = Arc::new((0..5000).collect());

    let handles: Vec<_> = (0..4)
        .map(|index| {
            let list = Arc::clone(&original);
            thread::spawn(move || {
                let updated = list.set(index * 1000, 0).push(index);
                assert_eq!(list.get(index * 1000), Some(&(index * 1000)));
                list.iter().sum::<usize>() + updated.len()
            })
        })
        .collect();

    let expected = (0..5000).sum::<usize>() + 5001;
    for handle in handles {
        assert_eq!(handle.join().expect("thread panicked"), expected);
    }
}

#[rstest]
fn test_hash_cache_shared_between_threads() {
    let original = Arc::new(OrderedMap::of([(1, "one"), (2, "two")]));
    let local = original.hash_code();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let map = Arc::clone(&original);
            thread::spawn(move || map.hash_code())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("thread panicked"), local);
    }
}

#[rstest]
fn test_sets_built_on_different_threads_are_equal() {
    let handles: Vec<_> = (0..2)
        .map(|offset| {
            thread::spawn(move || {
                (0..1000)
                    .map(|value| (value + offset * 500) % 1000)
                    .collect::<PersistentSet<i32>>()
            })
        })
        .collect();

    let sets: Vec<PersistentSet<i32>> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread panicked"))
        .collect();
    assert_eq!(sets[0], sets[1]);
}
