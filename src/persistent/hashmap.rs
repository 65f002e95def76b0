//! Persistent (immutable) hash map based on HAMT.
//!
//! This module provides [`PersistentMap`], an immutable hash map that uses
//! structural sharing, and [`TransientMap`], its batched writable form.
//!
//! # Overview
//!
//! `PersistentMap` is a Hash Array Mapped Trie: a 32-way branching trie where
//! successive 5-bit fragments of a key's hash select the path to its entry.
//! Keys are hashed and compared through the [`Value`] protocol.
//!
//! - O(log32 N) get (at most 7 levels for a 31-bit hash)
//! - O(log32 N) set
//! - O(log32 N) remove
//! - O(1) len and `is_empty`
//!
//! Iteration follows the trie (depth first, slot ascending), not insertion
//! order; use [`OrderedMap`](super::OrderedMap) when order matters.
//!
//! # Examples
//!
//! ```rust
//! use persistent_collections::persistent::PersistentMap;
//!
//! let map = PersistentMap::new()
//!     .set("one".to_string(), 1)
//!     .set("two".to_string(), 2)
//!     .set("three".to_string(), 3);
//!
//! assert_eq!(map.get("one"), Some(&1));
//! assert_eq!(map.get("two"), Some(&2));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.set("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));
//! assert_eq!(updated.get("one"), Some(&100));
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::rc::Rc;

use super::trie::{Change, Node, NodeIterator, UpdateFlags};
use super::{HashCache, ReferenceCounter};
use crate::collection::{Batchable, Collection, Transient};
use crate::error::CollectionError;
use crate::owner::OwnerToken;
use crate::value::{Hash, Value, hash_merge, hash_unordered};

type Root<K, V> = Option<ReferenceCounter<Node<K, V>>>;

// =============================================================================
// PersistentMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on HAMT.
///
/// # Time Complexity
///
/// | Operation  | Complexity |
/// |------------|------------|
/// | `new`      | O(1)       |
/// | `get`      | O(log32 N) |
/// | `set`      | O(log32 N) |
/// | `remove`   | O(log32 N) |
/// | `has`      | O(log32 N) |
/// | `len`      | O(1)       |
/// | `is_empty` | O(1)       |
///
/// # Examples
///
/// ```rust
/// use persistent_collections::persistent::PersistentMap;
///
/// let map = PersistentMap::singleton("key".to_string(), 42);
/// assert_eq!(map.get("key"), Some(&42));
/// ```
pub struct PersistentMap<K, V> {
    /// Root node of the trie; `None` for the empty map
    root: Root<K, V>,
    /// Number of entries
    length: usize,
    /// Memoized content hash
    hash: HashCache,
}

impl<K, V> PersistentMap<K, V> {
    /// Creates a new empty map.
    ///
    /// The empty map owns no nodes, so every empty map is interchangeable with
    /// every other.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map: PersistentMap<String, i32> = PersistentMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            length: 0,
            hash: HashCache::new(),
        }
    }

    const fn from_parts(root: Root<K, V>, length: usize) -> Self {
        Self {
            root,
            length,
            hash: HashCache::new(),
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().set("a", 1).set("b", 2);
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns an iterator over key-value pairs, in trie order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::of([(1, "one"), (2, "two")]);
    /// let mut entries: Vec<_> = map.iter().collect();
    /// entries.sort();
    /// assert_eq!(entries, vec![(&1, &"one"), (&2, &"two")]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentMapIterator<'_, K, V> {
        PersistentMapIterator {
            nodes: self.root.as_deref().map(Node::iter),
            remaining: self.length,
        }
    }

    /// Returns an iterator over keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Returns `true` if both maps share the same root node.
    ///
    /// Identical maps are always equal; the converse needs [`Value::equals`].
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(first), Some(second)) => ReferenceCounter::ptr_eq(first, second),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<K: Value + Clone, V: Clone> PersistentMap<K, V> {
    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::singleton("key".to_string(), 42);
    /// assert_eq!(map.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().set(key, value)
    }

    /// Creates a map from an array of pairs. Later pairs win on duplicate keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::of([("a", 1), ("b", 2), ("a", 3)]);
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(map.get(&"a"), Some(&3));
    /// ```
    #[must_use]
    pub fn of<const N: usize>(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the
    /// [`Value`] protocol on the borrowed form must match the key type's.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().set("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
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
        self.root.as_ref()?.get(0, key.hash_code(), key)
    }

    /// Returns the value for `key`, or `default` when it is missing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::singleton("a", 1);
    /// assert_eq!(map.get_or(&"a", &0), &1);
    /// assert_eq!(map.get_or(&"z", &0), &0);
    /// ```
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
        self.get_key_value(key).is_some()
    }

    /// Returns a new map with `key` bound to `value`.
    ///
    /// # Complexity
    ///
    /// O(log32 N): only the root-to-leaf path is copied.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map1 = PersistentMap::new().set("key".to_string(), 1);
    /// let map2 = map1.set("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// ```
    #[must_use]
    pub fn set(&self, key: K, value: V) -> Self {
        let hash = key.hash_code();
        self.apply(hash, Change::<K, V, K>::Set(key, value))
    }

    /// Returns a new map without `key`.
    ///
    /// Removing a missing key returns a map sharing this map's root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().set("a", 1).set("b", 2);
    /// let removed = map.remove(&"a");
    /// assert_eq!(removed.len(), 1);
    /// assert!(removed.remove(&"a").ptr_eq(&removed));
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        if !self.has(key) {
            return self.clone();
        }
        self.apply(key.hash_code(), Change::Remove(key))
    }

    fn apply<Q>(&self, hash: Hash, change: Change<'_, K, V, Q>) -> Self
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let removal = change.is_removal();
        let mut root = self.root.clone();
        let mut flags = UpdateFlags::default();
        Node::update_root(&mut root, None, hash, change, &mut flags);
        if !flags.altered {
            return self.clone();
        }
        let length = match (flags.size_changed, removal) {
            (false, _) => self.length,
            (true, false) => self.length + 1,
            (true, true) => self.length - 1,
        };
        Self::from_parts(root, length)
    }

    /// Rebinds `key` to whatever `updater` makes of its current value.
    ///
    /// Returning `None` removes the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().set("count", 10);
    ///
    /// let incremented = map.update("count", |value| value.map(|value| value + 1));
    /// assert_eq!(incremented.get(&"count"), Some(&11));
    ///
    /// let inserted = map.update("new", |value| Some(value.copied().unwrap_or(100)));
    /// assert_eq!(inserted.get(&"new"), Some(&100));
    ///
    /// let removed = map.update("count", |_| None);
    /// assert!(!removed.has(&"count"));
    /// ```
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

    /// Merges two maps. Entries of `other` win on conflicting keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let first = PersistentMap::of([("a", 1), ("b", 2)]);
    /// let second = PersistentMap::of([("b", 20), ("c", 30)]);
    /// let merged = first.merge(&second);
    ///
    /// assert_eq!(merged.get(&"a"), Some(&1));
    /// assert_eq!(merged.get(&"b"), Some(&20));
    /// assert_eq!(merged.get(&"c"), Some(&30));
    /// ```
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
    ///
    /// The transient starts out sharing every node with `self`; its first
    /// write to a node copies it under the batch's [`OwnerToken`], and later
    /// writes edit that copy in place.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::of([(1, 1), (2, 2)]);
    /// let mut transient = map.as_mutable();
    /// transient.set(3, 3);
    /// transient.remove(&1);
    /// let updated = transient.as_immutable();
    ///
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(updated.len(), 2);
    /// assert!(updated.has(&3));
    /// ```
    #[must_use]
    pub fn as_mutable(&self) -> TransientMap<K, V> {
        let owner = OwnerToken::mint();
        tracing::trace!(owner = owner.id(), size = self.length, "map batch opened");
        TransientMap {
            root: self.root.clone(),
            length: self.length,
            owner,
            _marker: PhantomData,
        }
    }

    /// Runs `mutations` against a batch over this map and returns the result.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().with_mutations(|map| {
    ///     for index in 0..1000 {
    ///         map.set(index, index * 2);
    ///     }
    /// });
    /// assert_eq!(map.len(), 1000);
    /// assert_eq!(map.get(&500), Some(&1000));
    /// ```
    #[must_use]
    pub fn with_mutations<F>(&self, mutations: F) -> Self
    where
        F: FnOnce(&mut TransientMap<K, V>),
    {
        let mut transient = self.as_mutable();
        mutations(&mut transient);
        transient.as_immutable()
    }
}

impl<T: Value + Clone> PersistentMap<T, T> {
    /// Builds a map from untyped rows, each of which must hold exactly a key
    /// followed by a value.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::MalformedEntry`] for the first row that does
    /// not have exactly two elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::error::CollectionError;
    /// use persistent_collections::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::try_from_rows(vec![vec![1, 10], vec![2, 20]]).unwrap();
    /// assert_eq!(map.get(&2), Some(&20));
    ///
    /// let error = PersistentMap::try_from_rows(vec![vec![1, 10], vec![2]]).unwrap_err();
    /// assert_eq!(error, CollectionError::MalformedEntry { index: 1, length: 1 });
    /// ```
    pub fn try_from_rows<I, R>(rows: I) -> Result<Self, CollectionError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = T>,
    {
        let mut transient = Self::new().as_mutable();
        for (index, row) in rows.into_iter().enumerate() {
            let mut items = row.into_iter();
            match (items.next(), items.next(), items.next()) {
                (Some(key), Some(value), None) => {
                    transient.set(key, value);
                }
                (first, second, third) => {
                    let length = usize::from(first.is_some())
                        + usize::from(second.is_some())
                        + usize::from(third.is_some())
                        + items.count();
                    return Err(CollectionError::MalformedEntry { index, length });
                }
            }
        }
        Ok(transient.as_immutable())
    }
}

// =============================================================================
// TransientMap Definition
// =============================================================================

/// The writable form of a [`PersistentMap`] inside a batch.
///
/// Obtained from [`PersistentMap::as_mutable`] or handed to the closure of
/// [`PersistentMap::with_mutations`]. Writes mutate the transient itself;
/// [`as_immutable`](Self::as_immutable) consumes it and publishes the result.
///
/// # Examples
///
/// ```rust
/// use persistent_collections::persistent::PersistentMap;
///
/// let mut transient = PersistentMap::new().as_mutable();
/// assert!(transient.set("a", 1));
/// assert!(!transient.set("a", 2));
/// assert!(transient.remove(&"a"));
/// assert!(!transient.remove(&"a"));
/// assert!(transient.as_immutable().is_empty());
/// ```
pub struct TransientMap<K, V> {
    root: Root<K, V>,
    length: usize,
    owner: OwnerToken,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientMap<i32, i32>: Send, Sync);
static_assertions::assert_not_impl_any!(TransientMap<String, String>: Send, Sync);

impl<K, V> TransientMap<K, V> {
    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if there are no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Token stamping the nodes this batch allocates.
    #[must_use]
    pub const fn owner(&self) -> OwnerToken {
        self.owner
    }

    /// Returns an iterator over the current entries.
    #[must_use]
    pub fn iter(&self) -> PersistentMapIterator<'_, K, V> {
        PersistentMapIterator {
            nodes: self.root.as_deref().map(Node::iter),
            remaining: self.length,
        }
    }

    /// Closes the batch and publishes its contents.
    #[must_use]
    pub fn as_immutable(self) -> PersistentMap<K, V> {
        tracing::trace!(owner = self.owner.id(), size = self.length, "map batch closed");
        PersistentMap::from_parts(self.root, self.length)
    }
}

impl<K: Value + Clone, V: Clone> TransientMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.root
            .as_ref()?
            .get(0, key.hash_code(), key)
            .map(|(_, value)| value)
    }

    /// Returns `true` if the key is present.
    #[must_use]
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Binds `key` to `value`. Returns `true` if the key was not present.
    pub fn set(&mut self, key: K, value: V) -> bool {
        let hash = key.hash_code();
        let mut flags = UpdateFlags::default();
        Node::update_root(
            &mut self.root,
            Some(self.owner),
            hash,
            Change::<K, V, K>::Set(key, value),
            &mut flags,
        );
        if flags.size_changed {
            self.length += 1;
        }
        flags.size_changed
    }

    /// Removes `key`. Returns `true` if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let mut flags = UpdateFlags::default();
        Node::update_root(
            &mut self.root,
            Some(self.owner),
            key.hash_code(),
            Change::Remove(key),
            &mut flags,
        );
        if flags.size_changed {
            self.length -= 1;
        }
        flags.size_changed
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

    /// Sets every pair yielded by `entries`.
    pub fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, entries: I) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.root = None;
        self.length = 0;
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentMap`].
pub struct PersistentMapIterator<'a, K, V> {
    nodes: Option<NodeIterator<'a, K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for PersistentMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.nodes.as_mut()?.next()?;
        self.remaining -= 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

/// An owning iterator over key-value pairs of a [`PersistentMap`].
pub struct PersistentMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for PersistentMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Clone for PersistentMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
            hash: self.hash.clone(),
        }
    }
}

impl<K, V> Default for PersistentMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Value + Clone, V: Clone> FromIterator<(K, V)> for PersistentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new().with_mutations(|map| map.extend(iter))
    }
}

impl<K: Clone, V: Clone> IntoIterator for PersistentMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Value + Clone, V: Value + Clone> Value for PersistentMap<K, V> {
    fn hash_code(&self) -> Hash {
        *self.hash.get_or_init(|| {
            hash_unordered(
                self.iter()
                    .map(|(key, value)| hash_merge(value.hash_code(), key.hash_code())),
            )
        })
    }

    fn equals(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return self.length == other.length;
        }
        if self.length != other.length {
            return false;
        }
        if let (Some(first), Some(second)) = (self.hash.get(), other.hash.get())
            && first != second
        {
            return false;
        }
        self.iter().all(|(key, value)| {
            other
                .get(key)
                .is_some_and(|other_value| other_value.equals(value))
        })
    }
}

impl<K: Value + Clone, V: Value + Clone> PartialEq for PersistentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<K: Value + Clone, V: Value + Clone> Eq for PersistentMap<K, V> {}

impl<K: Value + Clone, V: Value + Clone> std::hash::Hash for PersistentMap<K, V> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for PersistentMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TransientMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TransientMap")
            .field("owner", &self.owner)
            .field("entries", &DebugEntries(self))
            .finish()
    }
}

struct DebugEntries<'a, K, V>(&'a TransientMap<K, V>);

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for DebugEntries<'_, K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.0.iter()).finish()
    }
}

// =============================================================================
// Collection Trait Implementations
// =============================================================================

impl<K: Value + Clone, V: Clone> Collection for PersistentMap<K, V> {
    type Key = K;
    type Item = V;

    fn size(&self) -> usize {
        self.length
    }

    fn get(&self, key: &K) -> Option<&V> {
        Self::get(self, key)
    }
}

impl<K: Value + Clone, V: Clone> Batchable for PersistentMap<K, V> {
    type Transient = TransientMap<K, V>;

    fn as_mutable(&self) -> TransientMap<K, V> {
        Self::as_mutable(self)
    }
}

impl<K, V> Transient for TransientMap<K, V> {
    type Frozen = PersistentMap<K, V>;

    fn owner(&self) -> OwnerToken {
        self.owner
    }

    fn as_immutable(self) -> PersistentMap<K, V> {
        Self::as_immutable(self)
    }
}

// =============================================================================
// Tests
// =============================================================================
