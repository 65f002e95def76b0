//! Error types for fallible collection operations.
//!
//! Almost every operation in this crate is total. The few that are not
//! (key-path writes through nested maps, building keyed containers from
//! untyped rows, and bounds-checked list writes) report a [`CollectionError`].

use thiserror::Error;

/// Errors raised by fallible collection operations.
///
/// # Examples
///
/// ```rust
/// use persistent_collections::error::CollectionError;
///
/// let error = CollectionError::IndexOutOfBounds { index: 5, length: 3 };
/// assert_eq!(format!("{error}"), "index 5 is out of bounds for a list of length 3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// A key path reached an existing value that is not a nested map.
    #[error("key path segment {depth} does not address a nested map")]
    NotAContainer {
        /// Zero-based index of the offending segment in the key path.
        depth: usize,
    },

    /// A key-path operation was given no segments.
    #[error("key path must contain at least one segment")]
    EmptyKeyPath,

    /// An input row was not a 2-element key/value pair.
    #[error("entry {index} has {length} elements, expected a [key, value] pair")]
    MalformedEntry {
        /// Position of the row in the input.
        index: usize,
        /// Number of elements the row actually had.
        length: usize,
    },

    /// A list write addressed an index beyond the end of the list.
    #[error("index {index} is out of bounds for a list of length {length}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// Length of the list at the time of the call.
        length: usize,
    },
}
