//! Persistent (immutable) collections.
//!
//! This module provides immutable collections that share structure between
//! versions, so an update copies only the root-to-leaf path it touches:
//!
//! - [`PersistentMap`]: hash map (hash array mapped trie)
//! - [`PersistentSet`]: hash set (backed by `PersistentMap`)
//! - [`PersistentList`]: indexed list (32-way vector trie with a tail buffer)
//! - [`OrderedMap`]: hash map iterating in insertion order
//! - [`OrderedSet`]: hash set iterating in insertion order
//!
//! # Batching
//!
//! Every container offers `with_mutations` and `as_mutable`. Both open a batch
//! owned by a fresh [`OwnerToken`](crate::owner::OwnerToken); nodes created by
//! the batch are edited in place on later writes of the same batch, so a
//! thousand `set` calls cost roughly one structural rewrite. Closing the batch
//! freezes the result.
//!
//! # Examples
//!
//! ## `PersistentMap`
//!
//! ```rust
//! use persistent_collections::persistent::PersistentMap;
//!
//! let map = PersistentMap::new().set("one".to_string(), 1).set("two".to_string(), 2);
//! assert_eq!(map.get("one"), Some(&1));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.set("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));
//! assert_eq!(updated.get("one"), Some(&100));
//! ```
//!
//! ## `PersistentList`
//!
//! ```rust
//! use persistent_collections::persistent::PersistentList;
//!
//! let list: PersistentList<i32> = (0..100).collect();
//! let updated = list.set(50, 999);
//! assert_eq!(list.get(50), Some(&50));
//! assert_eq!(updated.get(50), Some(&999));
//! ```
//!
//! ## `OrderedMap`
//!
//! ```rust
//! use persistent_collections::persistent::OrderedMap;
//!
//! let map = OrderedMap::new().set("a", 1).set("b", 2).set("c", 3).remove(&"b").set("b", 4);
//! let keys: Vec<&str> = map.keys().copied().collect();
//! assert_eq!(keys, vec!["a", "c", "b"]);
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

/// Write-once slot holding a memoized hash.
#[cfg(feature = "arc")]
pub(crate) type HashCache = std::sync::OnceLock<crate::value::Hash>;

#[cfg(not(feature = "arc"))]
pub(crate) type HashCache = std::cell::OnceCell<crate::value::Hash>;

mod hashmap;
mod hashset;
mod list;
mod nested;
mod ordered_map;
mod ordered_set;
mod trie;
mod vnode;

pub use hashmap::PersistentMap;
pub use hashmap::PersistentMapIntoIterator;
pub use hashmap::PersistentMapIterator;
pub use hashmap::TransientMap;
pub use hashset::PersistentSet;
pub use hashset::PersistentSetIterator;
pub use hashset::TransientSet;
pub use list::PersistentList;
pub use list::PersistentListIterator;
pub use list::TransientList;
pub use nested::Nested;
pub use ordered_map::OrderedMap;
pub use ordered_map::OrderedMapIterator;
pub use ordered_map::TransientOrderedMap;
pub use ordered_set::OrderedSet;
pub use ordered_set::OrderedSetIterator;
pub use ordered_set::TransientOrderedSet;

// =============================================================================
// Tests
// =============================================================================
