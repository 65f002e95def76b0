//! Traits shared by every container in this crate.
//!
//! The containers are separate concrete types; these traits give generic code
//! the small surface they all agree on: sized keyed reads and batching.

use crate::owner::OwnerToken;

/// Keyed, sized read access.
///
/// For lists the key is the index; for sets the key and the item are the
/// element itself.
///
/// # Examples
///
/// ```rust
/// use persistent_collections::prelude::*;
///
/// fn describe<C: Collection<Key = usize, Item = i32>>(collection: &C) -> i32 {
///     *collection.get_or(&0, &-1)
/// }
///
/// let list = PersistentList::of([7, 8, 9]);
/// assert_eq!(describe(&list), 7);
/// assert_eq!(describe(&PersistentList::new()), -1);
/// ```
pub trait Collection {
    /// Lookup key type.
    type Key;
    /// Stored item type.
    type Item;

    /// Number of items.
    fn size(&self) -> usize;

    /// Returns the item stored under `key`.
    fn get(&self, key: &Self::Key) -> Option<&Self::Item>;

    /// Returns `true` if `key` is present.
    fn has(&self, key: &Self::Key) -> bool {
        self.get(key).is_some()
    }

    /// Returns the item stored under `key`, or `default` when it is missing.
    fn get_or<'a>(&'a self, key: &Self::Key, default: &'a Self::Item) -> &'a Self::Item {
        self.get(key).unwrap_or(default)
    }

    /// Returns `true` if there are no items.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// The writable side of a batch.
pub trait Transient {
    /// Container produced when the batch closes.
    type Frozen;

    /// Token stamping every node this batch allocates.
    fn owner(&self) -> OwnerToken;

    /// Closes the batch.
    ///
    /// Consuming `self` makes a second close impossible.
    fn as_immutable(self) -> Self::Frozen;
}

/// Containers that can be edited through a batch.
///
/// # Examples
///
/// ```rust
/// use persistent_collections::prelude::*;
///
/// fn fill<C>(container: &C, build: impl FnOnce(&mut C::Transient)) -> C
/// where
///     C: Batchable,
/// {
///     container.with_mutations(build)
/// }
///
/// let set = fill(&PersistentSet::new(), |set| {
///     set.add(1);
///     set.add(2);
/// });
/// assert_eq!(set.len(), 2);
/// ```
pub trait Batchable: Sized {
    /// Writable handle used while the batch is open.
    type Transient: Transient<Frozen = Self>;

    /// Opens a batch over a snapshot of `self`.
    fn as_mutable(&self) -> Self::Transient;

    /// Runs `mutations` inside a fresh batch and returns the frozen result.
    fn with_mutations<F>(&self, mutations: F) -> Self
    where
        F: FnOnce(&mut Self::Transient),
    {
        let mut transient = self.as_mutable();
        mutations(&mut transient);
        transient.as_immutable()
    }
}
