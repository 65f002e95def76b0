//! Persistent hash map that iterates in insertion order.
//!
//! [`OrderedMap`] pairs a [`PersistentMap`] from key to slot index with a
//! [`PersistentList`] of slots. A removal leaves an empty slot behind; once
//! empty slots make up half of a list of at least 32 slots, the next removal
//! rebuilds both structures without them.
//!
//! Re-binding an existing key keeps its position. Removing a key and adding it
//! again moves it to the end.
//!
//! # Examples
//!
//! ```rust
//! use persistent_collections::persistent::OrderedMap;
//!
//! let map = OrderedMap::new().set("z", 1).set("a", 2).set("z", 3);
//! let entries: Vec<(&str, i32)> = map.iter().map(|(key, value)| (*key, *value)).collect();
//! assert_eq!(entries, vec![("z", 3), ("a", 2)]);
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::iter::FromIterator;

use super::hashmap::TransientMap;
use super::list::{PersistentListIterator, TransientList};
use super::{HashCache, PersistentList, PersistentMap};
use crate::collection::{Batchable, Collection, Transient};
use crate::owner::OwnerToken;
use crate::value::{Hash, Value, hash_merge, hash_ordered};

/// Slot count below which removals never compact.
const COMPACTION_FLOOR: usize = 32;

type Slot<K, V> = Option<(K, V)>;

const fn should_compact(slots: usize, live: usize) -> bool {
    slots >= COMPACTION_FLOOR && slots >= live * 2
}

/// Rebuilds the index and the slot list from the occupied slots, leaving out
/// the slot at `skip`.
fn compact<K, V>(
    slots: PersistentListIterator<'_, Slot<K, V>>,
    skip: usize,
) -> (PersistentMap<K, usize>, PersistentList<Slot<K, V>>)
where
    K: Value + Clone,
    V: Clone,
{
    let before = slots.len();
    let mut key_to_index = PersistentMap::new().as_mutable();
    let mut entries = PersistentList::new().as_mutable();
    for (slot, entry) in slots.enumerate() {
        if slot == skip {
            continue;
        }
        if let Some((key, value)) = entry {
            key_to_index.set(key.clone(), entries.len());
            entries.push(Some((key.clone(), value.clone())));
        }
    }
    tracing::debug!(
        slots_before = before,
        slots_after = entries.len(),
        "ordered map compacted"
    );
    (key_to_index.as_immutable(), entries.as_immutable())
}

// =============================================================================
// OrderedMap Definition
// =============================================================================

/// A persistent hash map that remembers insertion order.
///
/// Lookups cost the same as [`PersistentMap`]. Iteration, equality and the
/// content hash all follow insertion order, so two maps holding the same
/// entries in a different order are not equal.
///
/// # Examples
///
/// ```rust
/// use persistent_collections::persistent::OrderedMap;
///
/// let first = OrderedMap::of([(1, "a"), (2, "b")]);
/// let second = OrderedMap::of([(2, "b"), (1, "a")]);
/// assert_ne!(first, second);
/// assert_eq!(first.first(), Some((&1, &"a")));
/// ```
pub struct OrderedMap<K, V> {
    key_to_index: PersistentMap<K, usize>,
    entries: PersistentList<Slot<K, V>>,
    hash: HashCache,
}

impl<K, V> OrderedMap<K, V> {
    /// Creates a new empty map.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::from_parts(PersistentMap::new(), PersistentList::new())
    }

    const fn from_parts(
        key_to_index: PersistentMap<K, usize>,
        entries: PersistentList<Slot<K, V>>,
    ) -> Self {
        Self {
            key_to_index,
            entries,
            hash: HashCache::new(),
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.key_to_index.len()
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.key_to_index.is_empty()
    }

    /// Returns an iterator over the entries in insertion order.
    #[must_use]
    pub fn iter(&self) -> OrderedMapIterator<'_, K, V> {
        OrderedMapIterator {
            slots: self.entries.iter(),
            remaining: self.len(),
        }
    }

    /// Returns an iterator over the keys in insertion order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values in insertion order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Returns the earliest inserted entry.
    #[must_use]
    pub fn first(&self) -> Option<(&K, &V)> {
        self.iter().next()
    }

    /// Returns the latest inserted entry.
    #[must_use]
    pub fn last(&self) -> Option<(&K, &V)> {
        self.iter().next_back()
    }
}

impl<K: Value + Clone, V: Clone> OrderedMap<K, V> {
    /// Creates a map holding one entry.
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().set(key, value)
    }

    /// Creates a map from an array of pairs, in array order.
    #[must_use]
    pub fn of<const N: usize>(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }

    /// Returns the value bound to `key`.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the stored key and value matching `key`.
    #[must_use]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let index = *self.key_to_index.get(key)?;
        self.entries
            .get(index)?
            .as_ref()
            .map(|(key, value)| (key, value))
    }

    /// Returns the value for `key`, or `default` when it is missing.
    #[must_use]
    pub fn get_or<'a, Q>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.get(key).unwrap_or(default)
    }

    /// Returns `true` if the map contains the key.
    #[must_use]
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.key_to_index.has(key)
    }

    /// Returns a new map with `key` bound to `value`.
    ///
    /// A new key goes to the end; an existing key keeps its position.
    #[must_use]
    pub fn set(&self, key: K, value: V) -> Self {
        if let Some(&index) = self.key_to_index.get(&key) {
            return Self::from_parts(
                self.key_to_index.clone(),
                self.entries.set(index, Some((key, value))),
            );
        }
        let index = self.entries.len();
        Self::from_parts(
            self.key_to_index.set(key.clone(), index),
            self.entries.push(Some((key, value))),
        )
    }

    /// Returns a new map without `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::OrderedMap;
    ///
    /// let map = OrderedMap::of([("a", 1), ("b", 2), ("c", 3)]);
    /// let removed = map.remove(&"b");
    /// assert_eq!(removed.keys().copied().collect::<Vec<_>>(), vec!["a", "c"]);
    /// assert_eq!(map.len(), 3);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let Some(&index) = self.key_to_index.get(key) else {
            return self.clone();
        };
        if should_compact(self.entries.len(), self.len()) {
            let (key_to_index, entries) = compact(self.entries.iter(), index);
            return Self::from_parts(key_to_index, entries);
        }
        let entries = if index + 1 == self.entries.len() {
            self.entries.pop()
        } else {
            self.entries.set(index, None)
        };
        Self::from_parts(self.key_to_index.remove(key), entries)
    }

    /// Rebinds `key` to whatever `updater` makes of its current value.
    ///
    /// Returning `None` removes the key.
    #[must_use]
    pub fn update<F>(&self, key: K, updater: F) -> Self
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let current = self.get(&key);
        let present = current.is_some();
        match updater(current) {
            Some(value) => self.set(key, value),
            None if present => self.remove(&key),
            None => self.clone(),
        }
    }

    /// Merges two maps. Entries of `other` win on conflicting keys; its new
    /// keys are appended in its order.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        self.with_mutations(|map| {
            for (key, value) in other {
                map.set(key.clone(), value.clone());
            }
        })
    }

    /// Returns an empty map.
    #[must_use]
    pub const fn clear(&self) -> Self {
        Self::new()
    }

    /// Opens a batch over this map.
    #[must_use]
    pub fn as_mutable(&self) -> TransientOrderedMap<K, V> {
        TransientOrderedMap {
            key_to_index: self.key_to_index.as_mutable(),
            entries: self.entries.as_mutable(),
        }
    }

    /// Runs `mutations` against a batch over this map and returns the result.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::OrderedMap;
    ///
    /// let map = OrderedMap::new().with_mutations(|map| {
    ///     for key in (0..100).rev() {
    ///         map.set(key, key * 2);
    ///     }
    /// });
    /// assert_eq!(map.first(), Some((&99, &198)));
    /// ```
    #[must_use]
    pub fn with_mutations<F>(&self, mutations: F) -> Self
    where
        F: FnOnce(&mut TransientOrderedMap<K, V>),
    {
        let mut transient = self.as_mutable();
        mutations(&mut transient);
        transient.as_immutable()
    }
}

// =============================================================================
// TransientOrderedMap Definition
// =============================================================================

/// The writable form of an [`OrderedMap`] inside a batch.
pub struct TransientOrderedMap<K, V> {
    key_to_index: TransientMap<K, usize>,
    entries: TransientList<Slot<K, V>>,
}

impl<K, V> TransientOrderedMap<K, V> {
    /// Returns the number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.key_to_index.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.key_to_index.is_empty()
    }

    /// Token stamping the index nodes this batch allocates.
    #[must_use]
    pub const fn owner(&self) -> OwnerToken {
        self.key_to_index.owner()
    }

    /// Returns an iterator over the current entries in insertion order.
    #[must_use]
    pub fn iter(&self) -> OrderedMapIterator<'_, K, V> {
        OrderedMapIterator {
            slots: self.entries.iter(),
            remaining: self.len(),
        }
    }

    /// Closes the batch and publishes its contents.
    #[must_use]
    pub fn as_immutable(self) -> OrderedMap<K, V> {
        OrderedMap::from_parts(
            self.key_to_index.as_immutable(),
            self.entries.as_immutable(),
        )
    }
}

impl<K: Value + Clone, V: Clone> TransientOrderedMap<K, V> {
    /// Returns the value bound to `key`.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let index = *self.key_to_index.get(key)?;
        self.entries.get(index)?.as_ref().map(|(_, value)| value)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.key_to_index.has(key)
    }

    /// Binds `key` to `value`. Returns `true` if the key was not present.
    pub fn set(&mut self, key: K, value: V) -> bool {
        if let Some(&index) = self.key_to_index.get(&key) {
            self.entries.set(index, Some((key, value)));
            return false;
        }
        let index = self.entries.len();
        self.key_to_index.set(key.clone(), index);
        self.entries.push(Some((key, value)));
        true
    }

    /// Removes `key`. Returns `true` if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let Some(&index) = self.key_to_index.get(key) else {
            return false;
        };
        if should_compact(self.entries.len(), self.len()) {
            let (key_to_index, entries) = compact(self.entries.iter(), index);
            self.key_to_index = key_to_index.as_mutable();
            self.entries = entries.as_mutable();
        } else {
            self.key_to_index.remove(key);
            if index + 1 == self.entries.len() {
                self.entries.pop();
            } else {
                self.entries.set(index, None);
            }
        }
        true
    }

    /// Rebinds `key` to whatever `updater` makes of its current value;
    /// `None` removes it.
    pub fn update<F>(&mut self, key: K, updater: F)
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match updater(self.get(&key)) {
            Some(value) => {
                self.set(key, value);
            }
            None => {
                self.remove(&key);
            }
        }
    }

    /// Sets every pair yielded by `entries`, in order.
    pub fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, entries: I) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.key_to_index.clear();
        self.entries.clear();
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the entries of an [`OrderedMap`] in insertion order.
pub struct OrderedMapIterator<'a, K, V> {
    slots: PersistentListIterator<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for OrderedMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.slots.by_ref().find_map(Option::as_ref)?;
        self.remaining -= 1;
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for OrderedMapIterator<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let (key, value) = self.slots.by_ref().rev().find_map(Option::as_ref)?;
        self.remaining -= 1;
        Some((key, value))
    }
}

impl<K, V> ExactSizeIterator for OrderedMapIterator<'_, K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Clone for OrderedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            key_to_index: self.key_to_index.clone(),
            entries: self.entries.clone(),
            hash: self.hash.clone(),
        }
    }
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Value + Clone, V: Clone> FromIterator<(K, V)> for OrderedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new().with_mutations(|map| map.extend(iter))
    }
}

impl<'a, K, V> IntoIterator for &'a OrderedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = OrderedMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Value + Clone, V: Value + Clone> Value for OrderedMap<K, V> {
    fn hash_code(&self) -> Hash {
        *self.hash.get_or_init(|| {
            hash_ordered(
                self.iter()
                    .map(|(key, value)| hash_merge(value.hash_code(), key.hash_code())),
            )
        })
    }

    fn equals(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        if let (Some(first), Some(second)) = (self.hash.get(), other.hash.get())
            && first != second
        {
            return false;
        }
        self.iter()
            .zip(other.iter())
            .all(|((key, value), (other_key, other_value))| {
                key.equals(other_key) && value.equals(other_value)
            })
    }
}

impl<K: Value + Clone, V: Value + Clone> PartialEq for OrderedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<K: Value + Clone, V: Value + Clone> Eq for OrderedMap<K, V> {}

impl<K: Value + Clone, V: Value + Clone> std::hash::Hash for OrderedMap<K, V> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for OrderedMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Value + Clone, V: Clone> Collection for OrderedMap<K, V> {
    type Key = K;
    type Item = V;

    fn size(&self) -> usize {
        self.len()
    }

    fn get(&self, key: &K) -> Option<&V> {
        Self::get(self, key)
    }
}

impl<K: Value + Clone, V: Clone> Batchable for OrderedMap<K, V> {
    type Transient = TransientOrderedMap<K, V>;

    fn as_mutable(&self) -> TransientOrderedMap<K, V> {
        Self::as_mutable(self)
    }
}

impl<K, V> Transient for TransientOrderedMap<K, V> {
    type Frozen = OrderedMap<K, V>;

    fn owner(&self) -> OwnerToken {
        Self::owner(self)
    }

    fn as_immutable(self) -> OrderedMap<K, V> {
        Self::as_immutable(self)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn keys(map: &OrderedMap<i32, i32>) -> Vec<i32> {
        map.keys().copied().collect()
    }

    #[rstest]
    fn test_reinserted_key_moves_to_end() {
        let map = OrderedMap::new()
            .set("a", 1)
            .set("b", 2)
            .set("c", 3)
            .remove(&"b")
            .set("b", 4);
        let order: Vec<&str> = map.keys().copied().collect();
        assert_eq!(order, vec!["a", "c", "b"]);
        assert_eq!(map.get(&"b"), Some(&4));
    }

    #[rstest]
    fn test_overwrite_keeps_position_and_index() {
        let map = OrderedMap::of([(1, 10), (2, 20), (3, 30)]);
        let updated = map.set(1, 11);
        assert_eq!(keys(&updated), vec![1, 2, 3]);
        assert!(updated.key_to_index.ptr_eq(&map.key_to_index));
        assert_eq!(updated.get(&1), Some(&11));
    }

    #[rstest]
    fn test_remove_missing_key_is_noop() {
        let map = OrderedMap::of([(1, 10)]);
        let removed = map.remove(&9);
        assert!(removed.key_to_index.ptr_eq(&map.key_to_index));
        assert_eq!(removed, map);
    }

    #[rstest]
    fn test_removing_last_slot_pops() {
        let map = OrderedMap::of([(1, 10), (2, 20)]);
        let removed = map.remove(&2);
        assert_eq!(removed.entries.len(), 1);
        assert_eq!(removed.last(), Some((&1, &10)));
    }

    #[rstest]
    fn test_removing_middle_slot_leaves_tombstone() {
        let map = OrderedMap::of([(1, 10), (2, 20), (3, 30)]);
        let removed = map.remove(&2);
        assert_eq!(removed.entries.len(), 3);
        assert_eq!(removed.len(), 2);
        assert_eq!(keys(&removed), vec![1, 3]);
        assert_eq!(removed.iter().len(), 2);
    }

    #[rstest]
    fn test_compaction_drops_tombstones() {
        let map: OrderedMap<i32, i32> = (0..40).map(|key| (key, key)).collect();
        let thinned = (0..25).fold(map, |map, key| map.remove(&key));
        assert_eq!(thinned.entries.len(), 19);
        assert_eq!(thinned.len(), 15);
        assert_eq!(keys(&thinned), (25..40).collect::<Vec<_>>());
        for (key, &index) in &thinned.key_to_index {
            assert_eq!(
                thinned.entries.get(index).and_then(Option::as_ref).map(|(stored, _)| stored),
                Some(key)
            );
        }
    }

    #[rstest]
    fn test_transient_compaction_matches_persistent() {
        let map: OrderedMap<i32, i32> = (0..64).map(|key| (key, key)).collect();
        let persistent = (0..48).fold(map.clone(), |map, key| map.remove(&key));
        let batched = map.with_mutations(|map| {
            for key in 0..48 {
                assert!(map.remove(&key));
            }
        });
        assert_eq!(persistent, batched);
        assert_eq!(keys(&batched), (48..64).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_iterates_from_both_ends() {
        let map = OrderedMap::of([(3, 0), (1, 0), (2, 0)]).remove(&1);
        let reversed: Vec<i32> = map.keys().rev().copied().collect();
        assert_eq!(reversed, vec![2, 3]);
        assert_eq!(map.first(), Some((&3, &0)));
        assert_eq!(map.last(), Some((&2, &0)));
    }

    #[rstest]
    fn test_equality_is_order_sensitive() {
        let first = OrderedMap::of([(1, 1), (2, 2)]);
        let second = OrderedMap::of([(2, 2), (1, 1)]);
        let third = OrderedMap::new().set(1, 1).set(2, 2);
        assert_ne!(first, second);
        assert_eq!(first, third);
        assert_eq!(first.hash_code(), third.hash_code());
    }

    #[rstest]
    fn test_merge_appends_new_keys() {
        let merged = OrderedMap::of([(1, 1), (2, 2)]).merge(&OrderedMap::of([(3, 3), (1, 10)]));
        assert_eq!(keys(&merged), vec![1, 2, 3]);
        assert_eq!(merged.get(&1), Some(&10));
    }

    #[rstest]
    fn test_update() {
        let map = OrderedMap::of([("count", 1)]);
        assert_eq!(map.update("count", |value| value.map(|value| value + 1)).get(&"count"), Some(&2));
        assert!(map.update("count", |_| None).is_empty());
        assert_eq!(map.update("missing", |_| None), map);
    }
}
