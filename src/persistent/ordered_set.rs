//! Persistent hash set that iterates in insertion order.
//!
//! [`OrderedSet`] wraps an [`OrderedMap`] with unit values, the same way
//! [`PersistentSet`](super::PersistentSet) wraps a
//! [`PersistentMap`](super::PersistentMap).
//!
//! # Examples
//!
//! ```rust
//! use persistent_collections::persistent::OrderedSet;
//!
//! let set = OrderedSet::of([3, 1, 2]).add(1).add(0);
//! assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![3, 1, 2, 0]);
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::iter::FromIterator;

use super::HashCache;
use super::ordered_map::{OrderedMap, OrderedMapIterator, TransientOrderedMap};
use crate::collection::{Batchable, Collection, Transient};
use crate::owner::OwnerToken;
use crate::value::{Hash, Value, hash_ordered};

/// A persistent hash set that remembers insertion order.
///
/// Equality and the content hash are order-sensitive.
pub struct OrderedSet<T> {
    inner: OrderedMap<T, ()>,
    hash: HashCache,
}

impl<T> OrderedSet<T> {
    /// Creates a new empty set.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::wrap(OrderedMap::new())
    }

    const fn wrap(inner: OrderedMap<T, ()>) -> Self {
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

    /// Returns an iterator over the elements in insertion order.
    #[must_use]
    pub fn iter(&self) -> OrderedSetIterator<'_, T> {
        OrderedSetIterator {
            inner: self.inner.iter(),
        }
    }

    /// Returns the earliest inserted element.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.iter().next()
    }

    /// Returns the latest inserted element.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.iter().next_back()
    }
}

impl<T: Value + Clone> OrderedSet<T> {
    /// Creates a set holding one element.
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::wrap(OrderedMap::singleton(element, ()))
    }

    /// Creates a set from an array, keeping the first occurrence of duplicates.
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
    #[must_use]
    pub fn get<Q>(&self, element: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.inner.get_key_value(element).map(|(stored, ())| stored)
    }

    /// Returns a new set that also contains `element`, appended at the end.
    ///
    /// Adding a present element keeps its position and returns a clone.
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

    /// Returns the elements of either set; unseen elements of `other` are
    /// appended in its order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::OrderedSet;
    ///
    /// let union = OrderedSet::of([3, 1]).union(&OrderedSet::of([2, 1, 0]));
    /// assert_eq!(union.iter().copied().collect::<Vec<_>>(), vec![3, 1, 2, 0]);
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        self.with_mutations(|set| {
            for element in other {
                set.add(element.clone());
            }
        })
    }

    /// Returns the elements of `self` that are also in `other`, in the order
    /// of `self`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        self.retain(|element| other.has(element))
    }

    /// Returns the elements of `self` that are not in `other`.
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
    pub fn as_mutable(&self) -> TransientOrderedSet<T> {
        TransientOrderedSet {
            inner: self.inner.as_mutable(),
        }
    }

    /// Runs `mutations` against a batch over this set and returns the result.
    #[must_use]
    pub fn with_mutations<F>(&self, mutations: F) -> Self
    where
        F: FnOnce(&mut TransientOrderedSet<T>),
    {
        let mut transient = self.as_mutable();
        mutations(&mut transient);
        transient.as_immutable()
    }
}

/// The writable form of an [`OrderedSet`] inside a batch.
pub struct TransientOrderedSet<T> {
    inner: TransientOrderedMap<T, ()>,
}

impl<T> TransientOrderedSet<T> {
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
    pub fn as_immutable(self) -> OrderedSet<T> {
        OrderedSet::wrap(self.inner.as_immutable())
    }
}

impl<T: Value + Clone> TransientOrderedSet<T> {
    /// Returns `true` if `element` is present.
    #[must_use]
    pub fn has<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Value + ?Sized,
    {
        self.inner.has(element)
    }

    /// Appends `element` unless present. Returns `true` if it was added.
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

    /// Adds every element yielded by `elements`, in order.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, elements: I) {
        for element in elements {
            self.add(element);
        }
    }
}

/// An iterator over the elements of an [`OrderedSet`] in insertion order.
pub struct OrderedSetIterator<'a, T> {
    inner: OrderedMapIterator<'a, T, ()>,
}

impl<'a, T> Iterator for OrderedSetIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, ())| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for OrderedSetIterator<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(element, ())| element)
    }
}

impl<T> ExactSizeIterator for OrderedSetIterator<'_, T> {}

impl<T> Clone for OrderedSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            hash: self.hash.clone(),
        }
    }
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value + Clone> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new().with_mutations(|set| set.extend(iter))
    }
}

impl<'a, T> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = OrderedSetIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Value + Clone> Value for OrderedSet<T> {
    fn hash_code(&self) -> Hash {
        *self
            .hash
            .get_or_init(|| hash_ordered(self.iter().map(Value::hash_code)))
    }

    fn equals(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(first, second)| first.equals(second))
    }
}

impl<T: Value + Clone> PartialEq for OrderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<T: Value + Clone> Eq for OrderedSet<T> {}

impl<T: Value + Clone> std::hash::Hash for OrderedSet<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

impl<T: fmt::Debug> fmt::Debug for OrderedSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for OrderedSet<T> {
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

impl<T: Value + Clone> Collection for OrderedSet<T> {
    type Key = T;
    type Item = T;

    fn size(&self) -> usize {
        self.len()
    }

    fn get(&self, key: &T) -> Option<&T> {
        Self::get(self, key)
    }
}

impl<T: Value + Clone> Batchable for OrderedSet<T> {
    type Transient = TransientOrderedSet<T>;

    fn as_mutable(&self) -> TransientOrderedSet<T> {
        Self::as_mutable(self)
    }
}

impl<T> Transient for TransientOrderedSet<T> {
    type Frozen = OrderedSet<T>;

    fn owner(&self) -> OwnerToken {
        Self::owner(self)
    }

    fn as_immutable(self) -> OrderedSet<T> {
        Self::as_immutable(self)
    }
}
