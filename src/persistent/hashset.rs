//! Persistent (immutable) hash set.
//!
//! This module provides [`PersistentSet`], an immutable hash set that uses
//! [`PersistentMap`] internally.
//!
//! # Overview
//!
//! `PersistentSet` is a wrapper around `PersistentMap<T, ()>`: each element is
//! a key with a unit value. Set algebra (`union`, `intersect`, `subtract`)
//! always starts from the receiver's structure and batches its edits, so
//! elements the result shares with the receiver keep their nodes.
//!
//! # Examples
//!
//! ```rust
//! use persistent_collections::persistent::PersistentSet;
//!
//! let set = PersistentSet::new().add(1).add(2).add(3);
//! assert!(set.has(&1));
//! assert!(!set.has(&4));
//!
//! let updated = set.add(4);
//! assert_eq!(set.len(), 3);
//! assert_eq!(updated.len(), 4);
//! ```
//!
//! # Set Operations
//!
//! ```rust
//! use persistent_collections::persistent::PersistentSet;
//!
//! let set_a = PersistentSet::of([1, 2, 3]);
//! let set_b = PersistentSet::of([2, 3, 4]);
//!
//! assert_eq!(set_a.union(&set_b).len(), 4);
//! assert_eq!(set_a.intersect(&set_b).len(), 2);
//! assert_eq!(set_a.subtract(&set_b).len(), 1);
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::rc::Rc;

use super::hashmap::{PersistentMapIterator, TransientMap};
use super::{HashCache, PersistentMap};
use crate::collection::{Batchable, Collection, Transient};
use crate::owner::OwnerToken;
use crate::value::{Hash, Value, hash_merge, hash_unordered};

// =============================================================================
// PersistentSet Definition
// =============================================================================

/// A persistent (immutable) hash set.
///
/// # Time Complexity
///
/// | Operation  | Complexity |
/// |------------|------------|
/// | `new`      | O(1)       |
/// | `has`      | O(log32 N) |
/// | `add`      | O(log32 N) |
/// | `remove`   | O(log32 N) |
/// | `union`    | O(m log32 (n+m)) |
/// | `len`      | O(1)       |
pub struct PersistentSet<T> {
    inner: PersistentMap<T, ()>,
    hash: HashCache,
}

impl<T> PersistentSet<T> {
    /// Creates a new empty set.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::wrap(PersistentMap::new())
    }

    const fn wrap(inner: PersistentMap<T, ()>) -> Self {
        Self {
            inner,
            hash: HashCache::new(),
        }
    }

    /// Returns the number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the set contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over the elements, in trie order.
    #[must_use]
    pub fn iter(&self) -> PersistentSetIterator<'_, T> {
        PersistentSetIterator {
            inner: self.inner.iter(),
        }
    }

    /// Returns `true` if both sets share the same root node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl<T: Value + Clone> PersistentSet<T> {
    /// Creates a set containing a single element.
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::new().add(element)
    }

    /// Creates a set from an array of elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentSet;
    ///
    /// let set = PersistentSet::of(["a", "b", "a"]);
    /// assert_eq!(set.len(), 2);
    /// ```
    #[must_use]
    pub fn of<const N: usize>(elements: [T; N]) -> Self {
        elements.into_iter().collect()
    }

    /// Returns `true` if the set contains `element`.
    #[must_use]
    pub fn has<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.inner.has(element)
    }

    /// Returns the stored element equal to `element`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentSet;
    ///
    /// let set = PersistentSet::of(["stored".to_string()]);
    /// assert_eq!(set.get("stored").map(String::as_str), Some("stored"));
    /// assert_eq!(set.get("missing"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, element: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.inner.get_key_value(element).map(|(stored, ())| stored)
    }

    /// Returns a new set that also contains `element`.
    ///
    /// Adding an element that is already present returns a set sharing this
    /// set's root.
    #[must_use]
    pub fn add(&self, element: T) -> Self {
        if self.has(&element) {
            return self.clone();
        }
        Self::wrap(self.inner.set(element, ()))
    }

    /// Returns a new set without `element`.
    #[must_use]
    pub fn remove<Q>(&self, element: &Q) -> Self
    where
        T: Borrow<Q>,
        Q: Value + ?Sized,
    {
        if !self.has(element) {
            return self.clone();
        }
        Self::wrap(self.inner.remove(element))
    }

    /// Returns the elements of either set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentSet;
    ///
    /// let union = PersistentSet::of([1, 2]).union(&PersistentSet::of([2, 3]));
    /// assert_eq!(union, PersistentSet::of([1, 2, 3]));
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        self.with_mutations(|set| {
            for element in other {
                set.add(element.clone());
            }
        })
    }

    /// Returns the elements of `self` that are also in `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentSet;
    ///
    /// let common = PersistentSet::of([1, 2, 3]).intersect(&PersistentSet::of([2, 3, 4]));
    /// assert_eq!(common, PersistentSet::of([2, 3]));
    /// ```
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        self.retain(|element| other.has(element))
    }

    /// Returns the elements of `self` that are not in `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentSet;
    ///
    /// let rest = PersistentSet::of([1, 2, 3]).subtract(&PersistentSet::of([2, 3, 4]));
    /// assert_eq!(rest, PersistentSet::of([1]));
    /// ```
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        self.retain(|element| !other.has(element))
    }

    /// Returns the elements of `self` satisfying `predicate`.
    #[must_use]
    pub fn retain<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&T) -> bool,
    {
        let rejected: Vec<&T> = self.iter().filter(|element| !predicate(*element)).collect();
        if rejected.is_empty() {
            return self.clone();
        }
        self.with_mutations(|set| {
            for element in rejected {
                set.remove(element);
            }
        })
    }

    /// Returns `true` if every element of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|element| other.has(element))
    }

    /// Returns `true` if every element of `other` is in `self`.
    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns an empty set.
    #[must_use]
    pub const fn clear(&self) -> Self {
        Self::new()
    }

    /// Opens a batch over this set.
    #[must_use]
    pub fn as_mutable(&self) -> TransientSet<T> {
        TransientSet {
            inner: self.inner.as_mutable(),
            _marker: PhantomData,
        }
    }

    /// Runs `mutations` against a batch over this set and returns the result.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentSet;
    ///
    /// let set = PersistentSet::of([1, 2, 3]).with_mutations(|set| {
    ///     set.add(4);
    ///     set.remove(&1);
    /// });
    /// assert_eq!(set, PersistentSet::of([2, 3, 4]));
    /// ```
    #[must_use]
    pub fn with_mutations<F>(&self, mutations: F) -> Self
    where
        F: FnOnce(&mut TransientSet<T>),
    {
        let mut transient = self.as_mutable();
        mutations(&mut transient);
        transient.as_immutable()
    }
}

// =============================================================================
// TransientSet Definition
// =============================================================================

/// The writable form of a [`PersistentSet`] inside a batch.
pub struct TransientSet<T> {
    inner: TransientMap<T, ()>,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientSet<i32>: Send, Sync);

impl<T> TransientSet<T> {
    /// Returns the number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Token stamping the nodes this batch allocates.
    #[must_use]
    pub const fn owner(&self) -> OwnerToken {
        self.inner.owner()
    }

    /// Closes the batch and publishes its contents.
    #[must_use]
    pub fn as_immutable(self) -> PersistentSet<T> {
        PersistentSet::wrap(self.inner.as_immutable())
    }
}

impl<T: Value + Clone> TransientSet<T> {
    /// Returns `true` if `element` is present.
    #[must_use]
    pub fn has<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.inner.has(element)
    }

    /// Adds `element`. Returns `true` if it was not already present.
    pub fn add(&mut self, element: T) -> bool {
        if self.inner.has(&element) {
            return false;
        }
        self.inner.set(element, ())
    }

    /// Removes `element`. Returns `true` if it was present.
    pub fn remove<Q>(&mut self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.inner.remove(element)
    }

    /// Adds every element yielded by `elements`.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, elements: I) {
        for element in elements {
            self.add(element);
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the elements of a [`PersistentSet`].
pub struct PersistentSetIterator<'a, T> {
    inner: PersistentMapIterator<'a, T, ()>,
}

impl<'a, T> Iterator for PersistentSetIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, ())| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for PersistentSetIterator<'_, T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Clone for PersistentSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            hash: self.hash.clone(),
        }
    }
}

impl<T> Default for PersistentSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value + Clone> FromIterator<T> for PersistentSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new().with_mutations(|set| set.extend(iter))
    }
}

impl<'a, T> IntoIterator for &'a PersistentSet<T> {
    type Item = &'a T;
    type IntoIter = PersistentSetIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Value + Clone> Value for PersistentSet<T> {
    fn hash_code(&self) -> Hash {
        *self.hash.get_or_init(|| {
            hash_unordered(self.iter().map(|element| {
                let hashed = element.hash_code();
                hash_merge(hashed, hashed)
            }))
        })
    }

    fn equals(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if let (Some(first), Some(second)) = (self.hash.get(), other.hash.get())
            && first != second
        {
            return false;
        }
        self.len() == other.len() && self.is_subset(other)
    }
}

impl<T: Value + Clone> PartialEq for PersistentSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<T: Value + Clone> Eq for PersistentSet<T> {}

impl<T: Value + Clone> std::hash::Hash for PersistentSet<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for PersistentSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        for (index, element) in self.iter().enumerate() {
            if index > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "}}")
    }
}

impl<T: Value + Clone> Collection for PersistentSet<T> {
    type Key = T;
    type Item = T;

    fn size(&self) -> usize {
        self.len()
    }

    fn get(&self, key: &T) -> Option<&T> {
        Self::get(self, key)
    }
}

impl<T: Value + Clone> Batchable for PersistentSet<T> {
    type Transient = TransientSet<T>;

    fn as_mutable(&self) -> TransientSet<T> {
        Self::as_mutable(self)
    }
}

impl<T> Transient for TransientSet<T> {
    type Frozen = PersistentSet<T>;

    fn owner(&self) -> OwnerToken {
        Self::owner(self)
    }

    fn as_immutable(self) -> PersistentSet<T> {
        Self::as_immutable(self)
    }
}

// =============================================================================
// Tests
// =============================================================================
