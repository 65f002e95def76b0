//! Persistent (immutable) indexed list based on a vector trie.
//!
//! This module provides [`PersistentList`], an immutable list backed by a
//! 32-way branching trie with a tail buffer, and [`TransientList`], its
//! batched writable form.
//!
//! # Overview
//!
//! - O(log32 N) index access and update
//! - O(1) amortized `push` (writes go to the tail until it fills)
//! - O(1) amortized `pop`, `shift` and narrowing `slice` (the list is a
//!   window over the trie; moving an end only prunes subtrees that fall
//!   outside the window)
//! - O(log32 N) `unshift` (the trie grows upwards to make room in front)
//!
//! # Examples
//!
//! ```rust
//! use persistent_collections::persistent::PersistentList;
//!
//! let list = PersistentList::new().push(1).push(2).push(3);
//! assert_eq!(list.get(0), Some(&1));
//! assert_eq!(list.len(), 3);
//!
//! // Structural sharing: the original list is preserved
//! let extended = list.unshift(0);
//! assert_eq!(list.len(), 3);
//! assert_eq!(extended.to_vec(), vec![0, 1, 2, 3]);
//! ```

use std::fmt;
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};
use std::rc::Rc;

use super::HashCache;
use super::vnode::{ListCore, MASK, SHIFT};
use crate::collection::{Batchable, Collection, Transient};
use crate::error::CollectionError;
use crate::owner::OwnerToken;
use crate::value::{Hash, Value, hash_ordered};

// =============================================================================
// PersistentList Definition
// =============================================================================

/// A persistent (immutable) indexed list.
///
/// # Time Complexity
///
/// | Operation | Complexity          |
/// |-----------|---------------------|
/// | `new`     | O(1)                |
/// | `get`     | O(log32 N)          |
/// | `set`     | O(log32 N)          |
/// | `push`    | O(1) amortized      |
/// | `pop`     | O(1) amortized      |
/// | `shift`   | O(1) amortized      |
/// | `unshift` | O(log32 N)          |
/// | `insert`  | O(N)                |
/// | `remove`  | O(N) in the middle  |
/// | `len`     | O(1)                |
///
/// # Examples
///
/// ```rust
/// use persistent_collections::persistent::PersistentList;
///
/// let list: PersistentList<i32> = (0..10_000).collect();
/// assert_eq!(list.len(), 10_000);
/// assert_eq!(list.get(9_999), Some(&9_999));
/// ```
pub struct PersistentList<T> {
    core: ListCore<T>,
    hash: HashCache,
}

impl<T> PersistentList<T> {
    /// Creates a new empty list.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::from_core(ListCore::empty())
    }

    const fn from_core(core: ListCore<T>) -> Self {
        Self {
            core,
            hash: HashCache::new(),
        }
    }

    /// Returns the number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns `true` if the list contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Returns the element at `index`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentList;
    ///
    /// let list = PersistentList::of([10, 20, 30]);
    /// assert_eq!(list.get(1), Some(&20));
    /// assert_eq!(list.get(3), None);
    /// ```
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.core.get(index)
    }

    /// Returns the element at `index`, or `default` when out of bounds.
    #[must_use]
    pub fn get_or<'a>(&'a self, index: usize, default: &'a T) -> &'a T {
        self.get(index).unwrap_or(default)
    }

    /// Returns `true` if `index` is within bounds.
    #[must_use]
    pub const fn has(&self, index: usize) -> bool {
        index < self.len()
    }

    /// Returns the first element.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// Returns the last element.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }

    /// Returns a double-ended iterator over the elements.
    #[must_use]
    pub fn iter(&self) -> PersistentListIterator<'_, T> {
        PersistentListIterator::new(&self.core)
    }
}

impl<T: Clone> PersistentList<T> {
    /// Creates a list from an array.
    #[must_use]
    pub fn of<const N: usize>(elements: [T; N]) -> Self {
        elements.into_iter().collect()
    }

    /// Returns a list with `value` at `index`.
    ///
    /// `index == len()` appends.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`. Use [`try_set`](Self::try_set) to handle
    /// that case instead.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentList;
    ///
    /// let list = PersistentList::of([1, 2, 3]);
    /// assert_eq!(list.set(1, 20).to_vec(), vec![1, 20, 3]);
    /// assert_eq!(list.set(3, 4).to_vec(), vec![1, 2, 3, 4]);
    /// ```
    #[must_use]
    pub fn set(&self, index: usize, value: T) -> Self {
        match self.try_set(index, value) {
            Ok(list) => list,
            Err(error) => panic!("{error}"),
        }
    }

    /// Returns a list with `value` at `index`, where `index == len()` appends.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`] if `index > len()`.
    pub fn try_set(&self, index: usize, value: T) -> Result<Self, CollectionError> {
        let length = self.len();
        if index > length {
            return Err(CollectionError::IndexOutOfBounds { index, length });
        }
        if index == length {
            return Ok(self.push(value));
        }
        let mut core = self.core.clone();
        core.set(None, index, value);
        Ok(Self::from_core(core))
    }

    /// Returns a list with `value` appended.
    #[must_use]
    pub fn push(&self, value: T) -> Self {
        self.with_mutations(|list| list.push(value))
    }

    /// Returns a list with every element of `values` appended.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentList;
    ///
    /// let list = PersistentList::of([1]).push_all([2, 3]);
    /// assert_eq!(list.to_vec(), vec![1, 2, 3]);
    /// ```
    #[must_use]
    pub fn push_all<I: IntoIterator<Item = T>>(&self, values: I) -> Self {
        self.with_mutations(|list| list.extend(values))
    }

    /// Returns a list without its last element.
    #[must_use]
    pub fn pop(&self) -> Self {
        self.with_bounds(0, Some(-1))
    }

    /// Returns a list with `value` prepended.
    #[must_use]
    pub fn unshift(&self, value: T) -> Self {
        self.with_mutations(|list| list.unshift(value))
    }

    /// Returns a list without its first element.
    #[must_use]
    pub fn shift(&self) -> Self {
        self.with_bounds(1, None)
    }

    fn with_bounds(&self, begin: isize, end: Option<isize>) -> Self {
        if self.is_empty() {
            return self.clone();
        }
        let mut core = self.core.clone();
        core.set_bounds(OwnerToken::mint(), begin, end);
        Self::from_core(core)
    }

    /// Returns the elements in `range`, clamped to the list.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentList;
    ///
    /// let list: PersistentList<i32> = (0..100).collect();
    /// assert_eq!(list.slice(10..13).to_vec(), vec![10, 11, 12]);
    /// assert_eq!(list.slice(98..).to_vec(), vec![98, 99]);
    /// assert!(list.slice(50..10).is_empty());
    /// ```
    #[must_use]
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Self {
        let length = self.len();
        let begin = match range.start_bound() {
            Bound::Included(&begin) => begin,
            Bound::Excluded(&begin) => begin.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(length);
        let end = match range.end_bound() {
            Bound::Included(&end) => end.saturating_add(1),
            Bound::Excluded(&end) => end,
            Bound::Unbounded => length,
        }
        .min(length);

        if begin >= end {
            return Self::new();
        }
        if begin == 0 && end == length {
            return self.clone();
        }
        let mut core = self.core.clone();
        core.set_bounds(
            OwnerToken::mint(),
            begin.cast_signed(),
            Some(end.cast_signed()),
        );
        Self::from_core(core)
    }

    /// Returns a list with `value` inserted before `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    #[must_use]
    pub fn insert(&self, index: usize, value: T) -> Self {
        match self.try_insert(index, value) {
            Ok(list) => list,
            Err(error) => panic!("{error}"),
        }
    }

    /// Returns a list with `value` inserted before `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`] if `index > len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentList;
    ///
    /// let list = PersistentList::of([1, 3]);
    /// assert_eq!(list.try_insert(1, 2).unwrap().to_vec(), vec![1, 2, 3]);
    /// assert!(list.try_insert(5, 0).is_err());
    /// ```
    pub fn try_insert(&self, index: usize, value: T) -> Result<Self, CollectionError> {
        let length = self.len();
        if index > length {
            return Err(CollectionError::IndexOutOfBounds { index, length });
        }
        if index == 0 {
            return Ok(self.unshift(value));
        }
        if index == length {
            return Ok(self.push(value));
        }
        Ok(self.slice(..index).with_mutations(|list| {
            list.push(value);
            list.extend(self.iter().skip(index).cloned());
        }))
    }

    /// Returns a list without the element at `index`.
    ///
    /// An out-of-bounds `index` returns the list unchanged.
    #[must_use]
    pub fn remove(&self, index: usize) -> Self {
        let length = self.len();
        if index >= length {
            return self.clone();
        }
        if index == 0 {
            return self.shift();
        }
        if index + 1 == length {
            return self.pop();
        }
        self.slice(..index)
            .with_mutations(|list| list.extend(self.iter().skip(index + 1).cloned()))
    }

    /// Returns an empty list.
    #[must_use]
    pub const fn clear(&self) -> Self {
        Self::new()
    }

    /// Copies the elements into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Opens a batch over this list.
    #[must_use]
    pub fn as_mutable(&self) -> TransientList<T> {
        let owner = OwnerToken::mint();
        tracing::trace!(owner = owner.id(), size = self.len(), "list batch opened");
        TransientList {
            core: self.core.clone(),
            owner,
            _marker: PhantomData,
        }
    }

    /// Runs `mutations` against a batch over this list and returns the result.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::persistent::PersistentList;
    ///
    /// let list = PersistentList::new().with_mutations(|list| {
    ///     for value in 0..100 {
    ///         list.push(value);
    ///     }
    ///     list.set(0, -1);
    /// });
    /// assert_eq!(list.len(), 100);
    /// assert_eq!(list.first(), Some(&-1));
    /// ```
    #[must_use]
    pub fn with_mutations<F>(&self, mutations: F) -> Self
    where
        F: FnOnce(&mut TransientList<T>),
    {
        let mut transient = self.as_mutable();
        mutations(&mut transient);
        transient.as_immutable()
    }
}

// =============================================================================
// TransientList Definition
// =============================================================================

/// The writable form of a [`PersistentList`] inside a batch.
///
/// # Examples
///
/// ```rust
/// use persistent_collections::persistent::PersistentList;
///
/// let mut transient = PersistentList::of([1, 2, 3]).as_mutable();
/// transient.push(4);
/// assert_eq!(transient.shift(), Some(1));
/// assert_eq!(transient.pop(), Some(4));
/// assert_eq!(transient.as_immutable().to_vec(), vec![2, 3]);
/// ```
pub struct TransientList<T> {
    core: ListCore<T>,
    owner: OwnerToken,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientList<i32>: Send, Sync);

impl<T> TransientList<T> {
    /// Returns the number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns `true` if there are no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Token stamping the nodes this batch allocates.
    #[must_use]
    pub const fn owner(&self) -> OwnerToken {
        self.owner
    }

    /// Returns the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.core.get(index)
    }

    /// Returns an iterator over the current elements.
    #[must_use]
    pub fn iter(&self) -> PersistentListIterator<'_, T> {
        PersistentListIterator::new(&self.core)
    }

    /// Closes the batch and publishes its contents.
    #[must_use]
    pub fn as_immutable(self) -> PersistentList<T> {
        tracing::trace!(owner = self.owner.id(), size = self.len(), "list batch closed");
        PersistentList::from_core(self.core)
    }
}

impl<T: Clone> TransientList<T> {
    /// Writes `value` at `index`; `index == len()` appends.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn set(&mut self, index: usize, value: T) {
        if let Err(error) = self.try_set(index, value) {
            panic!("{error}");
        }
    }

    /// Writes `value` at `index`; `index == len()` appends.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`] if `index > len()`.
    pub fn try_set(&mut self, index: usize, value: T) -> Result<(), CollectionError> {
        let length = self.len();
        if index > length {
            return Err(CollectionError::IndexOutOfBounds { index, length });
        }
        if index == length {
            self.push(value);
        } else {
            self.core.set(Some(self.owner), index, value);
        }
        Ok(())
    }

    /// Appends `value`.
    pub fn push(&mut self, value: T) {
        let length = self.len();
        self.core
            .set_bounds(self.owner, 0, Some((length + 1).cast_signed()));
        self.core.set(Some(self.owner), length, value);
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Option<T> {
        let last = self.core.get(self.len().checked_sub(1)?).cloned();
        self.core.set_bounds(self.owner, 0, Some(-1));
        last
    }

    /// Prepends `value`.
    pub fn unshift(&mut self, value: T) {
        self.core.set_bounds(self.owner, -1, None);
        self.core.set(Some(self.owner), 0, value);
    }

    /// Removes and returns the first element.
    pub fn shift(&mut self) -> Option<T> {
        let first = self.core.get(0).cloned()?;
        self.core.set_bounds(self.owner, 1, None);
        Some(first)
    }

    /// Appends every element yielded by `values`.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, values: I) {
        for value in values {
            self.push(value);
        }
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        self.core = ListCore::empty();
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// A cached leaf: its block number (`raw >> 5`) and its slots.
type CachedLeaf<'a, T> = (usize, &'a [Option<T>]);

/// A double-ended iterator over the elements of a [`PersistentList`].
///
/// Each end caches the leaf it is reading, so a full pass descends the trie
/// once per 32 elements.
pub struct PersistentListIterator<'a, T> {
    core: &'a ListCore<T>,
    front: usize,
    back: usize,
    front_leaf: CachedLeaf<'a, T>,
    back_leaf: CachedLeaf<'a, T>,
}

impl<'a, T> PersistentListIterator<'a, T> {
    fn new(core: &'a ListCore<T>) -> Self {
        Self {
            core,
            front: 0,
            back: core.len(),
            front_leaf: (usize::MAX, &[]),
            back_leaf: (usize::MAX, &[]),
        }
    }

    fn element_at(core: &'a ListCore<T>, cache: &mut CachedLeaf<'a, T>, index: usize) -> Option<&'a T> {
        let raw = core.origin + index;
        let block = raw >> SHIFT;
        if cache.0 != block {
            *cache = (
                block,
                core.node_for(raw).map(|leaf| leaf.items()).unwrap_or_default(),
            );
        }
        cache.1.get(raw & MASK)?.as_ref()
    }
}

impl<'a, T> Iterator for PersistentListIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let element = Self::element_at(self.core, &mut self.front_leaf, self.front);
        self.front += 1;
        element
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back.saturating_sub(self.front);
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for PersistentListIterator<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Self::element_at(self.core, &mut self.back_leaf, self.back)
    }
}

impl<T> ExactSizeIterator for PersistentListIterator<'_, T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Clone for PersistentList<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            hash: self.hash.clone(),
        }
    }
}

impl<T> Default for PersistentList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FromIterator<T> for PersistentList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new().with_mutations(|list| list.extend(iter))
    }
}

impl<'a, T> IntoIterator for &'a PersistentList<T> {
    type Item = &'a T;
    type IntoIter = PersistentListIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Value> Value for PersistentList<T> {
    fn hash_code(&self) -> Hash {
        *self
            .hash
            .get_or_init(|| hash_ordered(self.iter().map(Value::hash_code)))
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
            .all(|(first, second)| first.equals(second))
    }
}

impl<T: Value> PartialEq for PersistentList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<T: Value> Eq for PersistentList<T> {}

impl<T: Value> std::hash::Hash for PersistentList<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentList<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for PersistentList<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[")?;
        for (index, element) in self.iter().enumerate() {
            if index > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "]")
    }
}

impl<T: Clone> Collection for PersistentList<T> {
    type Key = usize;
    type Item = T;

    fn size(&self) -> usize {
        self.len()
    }

    fn get(&self, key: &usize) -> Option<&T> {
        Self::get(self, *key)
    }
}

impl<T: Clone> Batchable for PersistentList<T> {
    type Transient = TransientList<T>;

    fn as_mutable(&self) -> TransientList<T> {
        Self::as_mutable(self)
    }
}

impl<T> Transient for TransientList<T> {
    type Frozen = PersistentList<T>;

    fn owner(&self) -> OwnerToken {
        self.owner
    }

    fn as_immutable(self) -> PersistentList<T> {
        Self::as_immutable(self)
    }
}

// =============================================================================
// Tests
// =============================================================================
