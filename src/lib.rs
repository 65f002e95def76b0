//! # persistent-collections
//!
//! Persistent (immutable, structurally shared) collections with a batched
//! mutation mode.
//!
//! ## Overview
//!
//! - **Value protocol**: pluggable hashing and equality ([`value::Value`])
//! - **Hash map / set**: hash array mapped trie with five node shapes
//!   ([`persistent::PersistentMap`], [`persistent::PersistentSet`])
//! - **List**: 32-way vector trie with a tail buffer and an O(1) sliding window
//!   ([`persistent::PersistentList`])
//! - **Ordered map / set**: insertion-order-preserving wrappers
//!   ([`persistent::OrderedMap`], [`persistent::OrderedSet`])
//! - **Batching**: `with_mutations` / `as_mutable` open an [`owner::OwnerToken`]
//!   under which trie nodes created by the batch are edited in place
//!
//! ## Feature Flags
//!
//! - `arc`: share nodes through `Arc` instead of `Rc`, making frozen
//!   containers `Send + Sync`
//!
//! ## Example
//!
//! ```rust
//! use persistent_collections::prelude::*;
//!
//! let map = PersistentMap::new().set("a", 1).set("b", 2).remove(&"a");
//! assert_eq!(map.len(), 1);
//! assert_eq!(map.get(&"b"), Some(&2));
//! assert!(!map.has(&"a"));
//!
//! let list: PersistentList<i32> = (0..100).collect();
//! let batched = list.with_mutations(|list| {
//!     list.push(100);
//!     list.push(101);
//! });
//! assert_eq!(list.len(), 100);
//! assert_eq!(batched.get(101), Some(&101));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// ```rust
/// use persistent_collections::prelude::*;
/// ```
pub mod prelude {
    pub use crate::collection::*;
    pub use crate::error::CollectionError;
    pub use crate::persistent::*;
    pub use crate::value::{Identity, Structural, Value};
}

pub mod collection;
pub mod error;
pub mod owner;
pub mod persistent;
pub mod value;
