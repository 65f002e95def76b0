//! Key-path access to maps of maps.
//!
//! A [`PersistentMap`] whose values are [`Nested`] forms a tree: every value
//! is either a leaf or another map. The `*_in` methods address a value by the
//! sequence of keys leading to it and copy only the maps along that path.
//!
//! # Examples
//!
//! ```rust
//! use persistent_collections::persistent::{Nested, PersistentMap};
//!
//! let config: PersistentMap<&str, Nested<&str, i32>> = PersistentMap::new()
//!     .set_in(&["server", "port"], Nested::Leaf(8080))
//!     .unwrap();
//! assert_eq!(config.get_in(&["server", "port"]), Some(&Nested::Leaf(8080)));
//! ```

use std::fmt;

use super::PersistentMap;
use crate::error::CollectionError;
use crate::value::{Hash, Value};

/// A value inside a tree of maps.
#[derive(Clone)]
pub enum Nested<K, V> {
    /// A plain value.
    Leaf(V),
    /// A map one level further down.
    Map(PersistentMap<K, Nested<K, V>>),
}

impl<K, V> Nested<K, V> {
    /// Returns the leaf value, if this is a leaf.
    #[must_use]
    pub const fn as_leaf(&self) -> Option<&V> {
        match self {
            Self::Leaf(value) => Some(value),
            Self::Map(_) => None,
        }
    }

    /// Returns the nested map, if this is one.
    #[must_use]
    pub const fn as_map(&self) -> Option<&PersistentMap<K, Self>> {
        match self {
            Self::Leaf(_) => None,
            Self::Map(map) => Some(map),
        }
    }
}

impl<K: Value + Clone, V: Value + Clone> Value for Nested<K, V> {
    fn hash_code(&self) -> Hash {
        match self {
            Self::Leaf(value) => value.hash_code(),
            Self::Map(map) => map.hash_code(),
        }
    }

    fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Leaf(first), Self::Leaf(second)) => first.equals(second),
            (Self::Map(first), Self::Map(second)) => first.equals(second),
            _ => false,
        }
    }
}

impl<K: Value + Clone, V: Value + Clone> PartialEq for Nested<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<K: Value + Clone, V: Value + Clone> Eq for Nested<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Nested<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(value) => formatter.debug_tuple("Leaf").field(value).finish(),
            Self::Map(map) => fmt::Debug::fmt(map, formatter),
        }
    }
}

impl<K: Value + Clone, V: Clone> PersistentMap<K, Nested<K, V>> {
    /// Returns the value at the end of `path`.
    ///
    /// An empty path, a missing key, or a leaf met before the last segment
    /// all yield `None`.
    #[must_use]
    pub fn get_in(&self, path: &[K]) -> Option<&Nested<K, V>> {
        let (last, parents) = path.split_last()?;
        let mut map = self;
        for key in parents {
            map = map.get(key)?.as_map()?;
        }
        map.get(last)
    }

    /// Returns `true` if `path` addresses a value.
    #[must_use]
    pub fn has_in(&self, path: &[K]) -> bool {
        self.get_in(path).is_some()
    }

    /// Returns a new tree with `value` at the end of `path`, creating missing
    /// intermediate maps.
    ///
    /// # Errors
    ///
    /// - [`CollectionError::EmptyKeyPath`] if `path` is empty.
    /// - [`CollectionError::NotAContainer`] if an intermediate segment holds a
    ///   leaf.
    pub fn set_in(&self, path: &[K], value: Nested<K, V>) -> Result<Self, CollectionError> {
        self.update_in(path, |_| Some(value))
    }

    /// Rebinds the value at the end of `path` to whatever `updater` makes of
    /// it. Returning `None` removes it.
    ///
    /// Missing intermediate maps are created only when `updater` produces a
    /// value.
    ///
    /// # Errors
    ///
    /// - [`CollectionError::EmptyKeyPath`] if `path` is empty.
    /// - [`CollectionError::NotAContainer`] if an intermediate segment holds a
    ///   leaf.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use persistent_collections::error::CollectionError;
    /// use persistent_collections::persistent::{Nested, PersistentMap};
    ///
    /// let tree: PersistentMap<&str, Nested<&str, i32>> =
    ///     PersistentMap::new().set("hits", Nested::Leaf(1));
    /// let bumped = tree
    ///     .update_in(&["hits"], |hits| match hits {
    ///         Some(Nested::Leaf(count)) => Some(Nested::Leaf(count + 1)),
    ///         _ => Some(Nested::Leaf(1)),
    ///     })
    ///     .unwrap();
    /// assert_eq!(bumped.get(&"hits"), Some(&Nested::Leaf(2)));
    ///
    /// let error = tree.update_in(&["hits", "today"], |_| None).unwrap_err();
    /// assert_eq!(error, CollectionError::NotAContainer { depth: 0 });
    /// ```
    pub fn update_in<F>(&self, path: &[K], updater: F) -> Result<Self, CollectionError>
    where
        F: FnOnce(Option<&Nested<K, V>>) -> Option<Nested<K, V>>,
    {
        if path.is_empty() {
            return Err(CollectionError::EmptyKeyPath);
        }
        self.update_path(path, 0, updater)
    }

    /// Returns a new tree without the value at the end of `path`.
    ///
    /// A path that runs into a missing key leaves the tree unchanged.
    ///
    /// # Errors
    ///
    /// - [`CollectionError::EmptyKeyPath`] if `path` is empty.
    /// - [`CollectionError::NotAContainer`] if an intermediate segment holds a
    ///   leaf.
    pub fn remove_in(&self, path: &[K]) -> Result<Self, CollectionError> {
        self.update_in(path, |_| None)
    }

    fn update_path<F>(&self, path: &[K], depth: usize, updater: F) -> Result<Self, CollectionError>
    where
        F: FnOnce(Option<&Nested<K, V>>) -> Option<Nested<K, V>>,
    {
        let Some((key, rest)) = path.split_first() else {
            return Err(CollectionError::EmptyKeyPath);
        };
        if rest.is_empty() {
            return Ok(self.update(key.clone(), updater));
        }
        match self.get(key) {
            Some(Nested::Map(child)) => {
                let updated = child.update_path(rest, depth + 1, updater)?;
                if updated.ptr_eq(child) {
                    return Ok(self.clone());
                }
                Ok(self.set(key.clone(), Nested::Map(updated)))
            }
            Some(Nested::Leaf(_)) => Err(CollectionError::NotAContainer { depth }),
            None => {
                let created = Self::new().update_path(rest, depth + 1, updater)?;
                if created.is_empty() {
                    return Ok(self.clone());
                }
                Ok(self.set(key.clone(), Nested::Map(created)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    type Tree = PersistentMap<&'static str, Nested<&'static str, i32>>;

    fn sample() -> Tree {
        Tree::new()
            .set_in(&["a", "b", "c"], Nested::Leaf(1))
            .and_then(|tree| tree.set_in(&["a", "x"], Nested::Leaf(2)))
            .unwrap()
    }

    #[rstest]
    fn test_set_in_creates_intermediate_maps() {
        let tree = sample();
        assert_eq!(tree.get_in(&["a", "b", "c"]), Some(&Nested::Leaf(1)));
        assert_eq!(tree.get_in(&["a", "x"]), Some(&Nested::Leaf(2)));
        assert!(tree.get_in(&["a", "b"]).and_then(Nested::as_map).is_some());
    }

    #[rstest]
    #[case(&[])]
    #[case(&["missing"])]
    #[case(&["a", "x", "deeper"])]
    fn test_get_in_misses(#[case] path: &[&'static str]) {
        assert_eq!(sample().get_in(path), None);
    }

    #[rstest]
    fn test_empty_path_is_rejected() {
        let tree = sample();
        assert_eq!(
            tree.set_in(&[], Nested::Leaf(0)).unwrap_err(),
            CollectionError::EmptyKeyPath
        );
        assert_eq!(tree.remove_in(&[]).unwrap_err(), CollectionError::EmptyKeyPath);
    }

    #[rstest]
    fn test_leaf_in_the_middle_is_rejected() {
        let error = sample()
            .set_in(&["a", "x", "y", "z"], Nested::Leaf(0))
            .unwrap_err();
        assert_eq!(error, CollectionError::NotAContainer { depth: 1 });
    }

    #[rstest]
    fn test_untouched_subtrees_are_shared() {
        let tree = sample();
        let updated = tree.set_in(&["a", "x"], Nested::Leaf(3)).unwrap();
        let before = tree.get_in(&["a", "b"]).and_then(Nested::as_map).unwrap();
        let after = updated.get_in(&["a", "b"]).and_then(Nested::as_map).unwrap();
        assert!(before.ptr_eq(after));
    }

    #[rstest]
    fn test_remove_in() {
        let tree = sample();
        let removed = tree.remove_in(&["a", "b", "c"]).unwrap();
        assert!(!removed.has_in(&["a", "b", "c"]));
        assert!(removed.has_in(&["a", "x"]));
        assert!(tree.has_in(&["a", "b", "c"]));
    }

    #[rstest]
    fn test_remove_in_missing_path_is_noop() {
        let tree = sample();
        let removed = tree.remove_in(&["nope", "deeper"]).unwrap();
        assert!(removed.ptr_eq(&tree));
        let removed = tree.remove_in(&["a", "nope", "deeper"]).unwrap();
        assert!(removed.ptr_eq(&tree));
    }

    #[rstest]
    fn test_update_in_counts() {
        let bump = |value: Option<&Nested<&'static str, i32>>| {
            Some(Nested::Leaf(value.and_then(Nested::as_leaf).copied().unwrap_or(0) + 1))
        };
        let tree = Tree::new()
            .update_in(&["stats", "hits"], bump)
            .and_then(|tree| tree.update_in(&["stats", "hits"], bump))
            .unwrap();
        assert_eq!(tree.get_in(&["stats", "hits"]), Some(&Nested::Leaf(2)));
    }

    #[rstest]
    fn test_nested_trees_compare_structurally() {
        assert_eq!(sample(), sample());
        assert_eq!(sample().hash_code(), sample().hash_code());
        assert_ne!(sample(), sample().set_in(&["a", "x"], Nested::Leaf(9)).unwrap());
    }
}
