//! Owner tokens for batched mutation.
//!
//! A batch (`with_mutations`, `as_mutable`) mints a fresh [`OwnerToken`].
//! Every trie node allocated while the batch is open is stamped with the
//! token, and only nodes carrying the *current* token may be edited in place.
//! Nodes reachable from a published container are stamped with an older token
//! (or none), so a batch always path-copies them before writing.
//!
//! Tokens cannot be built outside this crate. Closing a batch simply drops the
//! token; no later batch can mint an equal one, so every node the batch
//! created becomes effectively frozen.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Capability authorizing in-place edits of the nodes it stamped.
///
/// # Examples
///
/// ```rust
/// use persistent_collections::persistent::PersistentMap;
///
/// let map: PersistentMap<i32, i32> = PersistentMap::new();
/// let first = map.as_mutable();
/// let second = map.as_mutable();
/// assert_ne!(first.owner(), second.owner());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerToken(NonZeroU64);

impl OwnerToken {
    /// Mints a token distinct from every token minted before it.
    pub(crate) fn mint() -> Self {
        let raw = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and a u64 does not wrap in practice.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Numeric id of this token, for diagnostics.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for OwnerToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "OwnerToken({})", self.0)
    }
}

/// Returns `true` when `stamp` was issued by the batch holding `owner`.
#[inline]
pub(crate) fn owns(owner: Option<OwnerToken>, stamp: Option<OwnerToken>) -> bool {
    owner.is_some() && owner == stamp
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_mint_is_unique() {
        let tokens: Vec<OwnerToken> = (0..100).map(|_| OwnerToken::mint()).collect();
        for (index, token) in tokens.iter().enumerate() {
            for other in &tokens[index + 1..] {
                assert_ne!(token, other);
            }
        }
    }

    #[rstest]
    fn test_owns_requires_a_live_token() {
        let token = OwnerToken::mint();
        assert!(owns(Some(token), Some(token)));
        assert!(!owns(None, None));
        assert!(!owns(Some(token), None));
        assert!(!owns(Some(token), Some(OwnerToken::mint())));
    }
}
