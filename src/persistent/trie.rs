//! Node family of the hash array mapped trie behind [`PersistentMap`].
//!
//! A trie is built from five node shapes:
//!
//! - `Sparse`: up to 8 entries scanned linearly; only ever the root of a
//!   young map, promoted to a bitmap trie once it would hold a ninth entry
//! - `Bitmap`: a 32-bit occupancy bitmap plus a dense child array, indexed by
//!   the population count below each set bit; grows into `Full` when it would
//!   exceed 16 children
//! - `Full`: all 32 child slots materialized; packs back into `Bitmap` once
//!   fewer than 8 children remain
//! - `Collision`: entries whose full 31-bit hashes are identical
//! - `Single`: exactly one entry, with its hash
//!
//! At shift `s` (depth `s / 5`) a node only inspects hash bits `[s, s + 5)`.
//!
//! Every write goes through [`Node::update_node`]. A node is edited in place
//! only if it carries the caller's [`OwnerToken`] and nothing else references
//! it; otherwise it is copied (stamped with the caller's token) and the copy is
//! edited. That one rule gives both path copying for persistent updates and
//! in-place edits inside a batch.
//!
//! [`PersistentMap`]: super::PersistentMap

use std::borrow::Borrow;

use smallvec::SmallVec;

use super::ReferenceCounter;
use crate::owner::{OwnerToken, owns};
use crate::value::{Hash, Value};

// =============================================================================
// Constants
// =============================================================================

/// Branching factor (2^5 = 32)
const BRANCHING_FACTOR: usize = 32;

/// Bits per level in the trie
const BITS_PER_LEVEL: u32 = 5;

/// Bit mask for extracting index within a node
const MASK: u32 = (BRANCHING_FACTOR - 1) as u32;

/// A sparse node holding this many entries is promoted on the next insert.
const MAX_SPARSE_SIZE: usize = BRANCHING_FACTOR / 4;

/// A bitmap node holding this many children expands on the next insert.
const MAX_BITMAP_SIZE: usize = BRANCHING_FACTOR / 2;

/// A full node with fewer children than this packs into a bitmap node.
const MIN_FULL_SIZE: usize = BRANCHING_FACTOR / 4;

/// Extracts the 5-bit fragment of `hash` consumed at `shift`.
#[inline]
const fn fragment(hash: Hash, shift: u32) -> u32 {
    match (hash as u32).checked_shr(shift) {
        Some(shifted) => shifted & MASK,
        None => 0,
    }
}

/// Compares a stored key against a borrowed lookup key.
#[inline]
pub(crate) fn key_equals<K, Q>(candidate: &K, key: &Q) -> bool
where
    K: Borrow<Q>,
    Q: Value + ?Sized,
{
    Q::equals(candidate.borrow(), key)
}

/// Inline storage for linearly scanned entries.
pub(crate) type Entries<K, V> = SmallVec<[(K, V); MAX_SPARSE_SIZE]>;

type Child<K, V> = ReferenceCounter<Node<K, V>>;

// =============================================================================
// Node Definition
// =============================================================================

/// Discriminant of a [`Node`], used to dispatch without holding a borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Sparse,
    Bitmap,
    Full,
    Collision,
    Single,
}

/// Internal node structure for the HAMT.
#[derive(Clone)]
pub(crate) enum Node<K, V> {
    /// Small unhashed entry list (root of young maps only)
    Sparse {
        owner: Option<OwnerToken>,
        entries: Entries<K, V>,
    },
    /// Bitmap-indexed branch node
    Bitmap {
        owner: Option<OwnerToken>,
        bitmap: u32,
        children: Vec<Child<K, V>>,
    },
    /// Branch node with all 32 slots materialized
    Full {
        owner: Option<OwnerToken>,
        count: usize,
        children: Box<[Option<Child<K, V>>; BRANCHING_FACTOR]>,
    },
    /// Entries sharing one full hash
    Collision {
        owner: Option<OwnerToken>,
        hash: Hash,
        entries: Entries<K, V>,
    },
    /// Exactly one entry
    Single {
        owner: Option<OwnerToken>,
        hash: Hash,
        key: K,
        value: V,
    },
}

/// A pending write: an insertion/replacement or a removal.
pub(crate) enum Change<'a, K, V, Q: ?Sized = K> {
    Set(K, V),
    Remove(&'a Q),
}

impl<K, V, Q> Change<'_, K, V, Q>
where
    K: Value + Borrow<Q>,
    Q: Value + ?Sized,
{
    /// Returns `true` if `candidate` is the key this change addresses.
    fn matches(&self, candidate: &K) -> bool {
        match self {
            Self::Set(key, _) => candidate.equals(key),
            Self::Remove(key) => key_equals(candidate, *key),
        }
    }

    pub(crate) const fn is_removal(&self) -> bool {
        matches!(self, Self::Remove(_))
    }
}

/// Out-flags reported by an update.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct UpdateFlags {
    /// An entry was added or removed.
    pub(crate) size_changed: bool,
    /// Anything was written at all.
    pub(crate) altered: bool,
}

impl UpdateFlags {
    const fn added_or_removed(&mut self) {
        self.altered = true;
        self.size_changed = true;
    }
}

impl<K, V> Node<K, V> {
    pub(crate) const fn kind(&self) -> NodeKind {
        match self {
            Self::Sparse { .. } => NodeKind::Sparse,
            Self::Bitmap { .. } => NodeKind::Bitmap,
            Self::Full { .. } => NodeKind::Full,
            Self::Collision { .. } => NodeKind::Collision,
            Self::Single { .. } => NodeKind::Single,
        }
    }

    const fn owner(&self) -> Option<OwnerToken> {
        match self {
            Self::Sparse { owner, .. }
            | Self::Bitmap { owner, .. }
            | Self::Full { owner, .. }
            | Self::Collision { owner, .. }
            | Self::Single { owner, .. } => *owner,
        }
    }

    const fn set_owner(&mut self, new_owner: Option<OwnerToken>) {
        match self {
            Self::Sparse { owner, .. }
            | Self::Bitmap { owner, .. }
            | Self::Full { owner, .. }
            | Self::Collision { owner, .. }
            | Self::Single { owner, .. } => *owner = new_owner,
        }
    }

    /// Leaves store full hashes, so they stay valid when hoisted to any depth.
    const fn is_leaf(&self) -> bool {
        matches!(self, Self::Collision { .. } | Self::Single { .. })
    }

    /// Creates a sparse root holding one entry.
    fn sparse(owner: Option<OwnerToken>, key: K, value: V) -> Self {
        let mut entries = Entries::new();
        entries.push((key, value));
        Self::Sparse { owner, entries }
    }

    /// Looks up `key` in the subtree rooted at this node.
    pub(crate) fn get<Q>(&self, shift: u32, hash: Hash, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        match self {
            Self::Sparse { entries, .. } => entries
                .iter()
                .find(|(entry_key, _)| key_equals(entry_key, key))
                .map(|(entry_key, value)| (entry_key, value)),
            Self::Bitmap {
                bitmap, children, ..
            } => {
                let bit = 1u32 << fragment(hash, shift);
                if bitmap & bit == 0 {
                    return None;
                }
                let position = (bitmap & (bit - 1)).count_ones() as usize;
                children[position].get(shift + BITS_PER_LEVEL, hash, key)
            }
            Self::Full { children, .. } => children[fragment(hash, shift) as usize]
                .as_ref()
                .and_then(|child| child.get(shift + BITS_PER_LEVEL, hash, key)),
            Self::Collision {
                hash: shared_hash,
                entries,
                ..
            } => {
                if *shared_hash != hash {
                    return None;
                }
                entries
                    .iter()
                    .find(|(entry_key, _)| key_equals(entry_key, key))
                    .map(|(entry_key, value)| (entry_key, value))
            }
            Self::Single {
                hash: entry_hash,
                key: entry_key,
                value,
                ..
            } => (*entry_hash == hash && key_equals(entry_key, key)).then_some((entry_key, value)),
        }
    }

    /// Depth-first, slot-ascending iterator over the entries of this subtree.
    pub(crate) fn iter(&self) -> NodeIterator<'_, K, V> {
        NodeIterator {
            stack: vec![(self, 0)],
        }
    }
}

impl<K: Value + Clone, V: Clone> Node<K, V> {
    /// Returns `true` if `node` may be written in place under `owner`.
    fn is_editable(node: &mut Child<K, V>, owner: Option<OwnerToken>) -> bool {
        owns(owner, node.owner()) && ReferenceCounter::get_mut(node).is_some()
    }

    /// Returns a writable view of `node`, copying it first unless the batch
    /// holding `owner` created it and nothing else shares it.
    fn editable(node: &mut Child<K, V>, owner: Option<OwnerToken>) -> &mut Self {
        if !Self::is_editable(node, owner) {
            let mut copy = Self::clone(node);
            copy.set_owner(owner);
            *node = ReferenceCounter::new(copy);
        }
        ReferenceCounter::make_mut(node)
    }

    /// Applies `change` at the root of a trie; an empty trie grows a sparse
    /// root.
    pub(crate) fn update_root<Q>(
        root: &mut Option<Child<K, V>>,
        owner: Option<OwnerToken>,
        hash: Hash,
        change: Change<'_, K, V, Q>,
        flags: &mut UpdateFlags,
    ) where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        match root {
            None => {
                if let Change::Set(key, value) = change {
                    flags.added_or_removed();
                    *root = Some(ReferenceCounter::new(Self::sparse(owner, key, value)));
                }
            }
            Some(_) => Self::update_slot(root, owner, 0, hash, change, flags),
        }
    }

    /// Applies `change` to an optional child slot, creating a `Single` in an
    /// empty slot and clearing the slot when its subtree empties.
    pub(crate) fn update_slot<Q>(
        slot: &mut Option<Child<K, V>>,
        owner: Option<OwnerToken>,
        shift: u32,
        hash: Hash,
        change: Change<'_, K, V, Q>,
        flags: &mut UpdateFlags,
    ) where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        match slot {
            None => {
                if let Change::Set(key, value) = change {
                    flags.added_or_removed();
                    *slot = Some(ReferenceCounter::new(Self::Single {
                        owner,
                        hash,
                        key,
                        value,
                    }));
                }
            }
            Some(node) => {
                if !Self::update_node(node, owner, shift, hash, change, flags) {
                    *slot = None;
                }
            }
        }
    }

    /// Applies `change` to the subtree rooted at `node`.
    ///
    /// On return `node` holds the updated subtree: the same allocation when it
    /// was edited in place or left alone, otherwise a replacement (possibly of
    /// a different shape). Returns `false` if the subtree lost its last entry.
    pub(crate) fn update_node<Q>(
        node: &mut Child<K, V>,
        owner: Option<OwnerToken>,
        shift: u32,
        hash: Hash,
        change: Change<'_, K, V, Q>,
        flags: &mut UpdateFlags,
    ) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        match node.kind() {
            NodeKind::Sparse => Self::update_sparse(node, owner, change, flags),
            NodeKind::Bitmap => Self::update_bitmap(node, owner, shift, hash, change, flags),
            NodeKind::Full => Self::update_full(node, owner, shift, hash, change, flags),
            NodeKind::Collision => Self::update_collision(node, owner, shift, hash, change, flags),
            NodeKind::Single => Self::update_single(node, owner, shift, hash, change, flags),
        }
    }

    fn update_sparse<Q>(
        node: &mut Child<K, V>,
        owner: Option<OwnerToken>,
        change: Change<'_, K, V, Q>,
        flags: &mut UpdateFlags,
    ) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let Self::Sparse { entries, .. } = &**node else {
            return true;
        };
        let position = entries.iter().position(|(key, _)| change.matches(key));
        let length = entries.len();

        match (position, change) {
            (None, Change::Remove(_)) => true,
            (Some(_), Change::Remove(_)) if length == 1 => {
                flags.added_or_removed();
                false
            }
            (Some(position), Change::Remove(_)) => {
                flags.added_or_removed();
                if let Self::Sparse { entries, .. } = Self::editable(node, owner) {
                    entries.swap_remove(position);
                }
                true
            }
            (Some(position), Change::Set(key, value)) => {
                flags.altered = true;
                if let Self::Sparse { entries, .. } = Self::editable(node, owner) {
                    entries[position] = (key, value);
                }
                true
            }
            (None, Change::Set(key, value)) if length >= MAX_SPARSE_SIZE => {
                flags.added_or_removed();
                let promoted = Self::create_nodes(owner, entries, key, value);
                *node = promoted;
                true
            }
            (None, Change::Set(key, value)) => {
                flags.added_or_removed();
                if let Self::Sparse { entries, .. } = Self::editable(node, owner) {
                    entries.push((key, value));
                }
                true
            }
        }
    }

    /// Builds a hashed trie out of a full sparse node plus one new entry.
    fn create_nodes(
        owner: Option<OwnerToken>,
        entries: &Entries<K, V>,
        key: K,
        value: V,
    ) -> Child<K, V> {
        // A private token lets the build edit its own fresh nodes in place.
        let owner = owner.or_else(|| Some(OwnerToken::mint()));
        let mut node = ReferenceCounter::new(Self::Single {
            owner,
            hash: key.hash_code(),
            key,
            value,
        });
        let mut flags = UpdateFlags::default();
        for (entry_key, entry_value) in entries.iter().cloned() {
            let entry_hash = entry_key.hash_code();
            Self::update_node(
                &mut node,
                owner,
                0,
                entry_hash,
                Change::<K, V, K>::Set(entry_key, entry_value),
                &mut flags,
            );
        }
        node
    }

    fn update_bitmap<Q>(
        node: &mut Child<K, V>,
        owner: Option<OwnerToken>,
        shift: u32,
        hash: Hash,
        change: Change<'_, K, V, Q>,
        flags: &mut UpdateFlags,
    ) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let Self::Bitmap {
            bitmap, children, ..
        } = &**node
        else {
            return true;
        };
        let slot = fragment(hash, shift);
        let bit = 1u32 << slot;
        let exists = bitmap & bit != 0;
        let position = (bitmap & (bit - 1)).count_ones() as usize;

        if !exists {
            let Change::Set(key, value) = change else {
                return true;
            };
            flags.added_or_removed();
            let leaf = ReferenceCounter::new(Self::Single {
                owner,
                hash,
                key,
                value,
            });
            if children.len() >= MAX_BITMAP_SIZE {
                let expanded = Self::expand_nodes(owner, *bitmap, children, slot, leaf);
                *node = expanded;
            } else if let Self::Bitmap {
                bitmap, children, ..
            } = Self::editable(node, owner)
            {
                *bitmap |= bit;
                children.insert(position, leaf);
            }
            return true;
        }

        let mut replacement = None;
        let mut emptied = false;
        if let Self::Bitmap {
            bitmap, children, ..
        } = Self::editable(node, owner)
        {
            let alive = Self::update_node(
                &mut children[position],
                owner,
                shift + BITS_PER_LEVEL,
                hash,
                change,
                flags,
            );
            if !alive {
                *bitmap ^= bit;
                children.remove(position);
            }
            match children.as_slice() {
                [] => emptied = true,
                [only] if only.is_leaf() => replacement = Some(ReferenceCounter::clone(only)),
                _ => {}
            }
        }
        if let Some(only) = replacement {
            *node = only;
        }
        !emptied
    }

    /// Expands a bitmap node into a full node, adding `including` at `slot`.
    fn expand_nodes(
        owner: Option<OwnerToken>,
        bitmap: u32,
        children: &[Child<K, V>],
        slot: u32,
        including: Child<K, V>,
    ) -> Child<K, V> {
        let mut expanded: [Option<Child<K, V>>; BRANCHING_FACTOR] = std::array::from_fn(|_| None);
        let mut remaining = children.iter();
        for (index, expanded_slot) in expanded.iter_mut().enumerate() {
            if bitmap & (1u32 << index) != 0 {
                *expanded_slot = remaining.next().cloned();
            }
        }
        expanded[slot as usize] = Some(including);
        ReferenceCounter::new(Self::Full {
            owner,
            count: children.len() + 1,
            children: Box::new(expanded),
        })
    }

    /// Packs the occupied slots of a full node into a bitmap node.
    fn pack_nodes(
        owner: Option<OwnerToken>,
        slots: &[Option<Child<K, V>>; BRANCHING_FACTOR],
    ) -> Child<K, V> {
        let mut bitmap = 0u32;
        let mut children = Vec::with_capacity(MIN_FULL_SIZE);
        for (index, slot) in slots.iter().enumerate() {
            if let Some(child) = slot {
                bitmap |= 1u32 << index;
                children.push(ReferenceCounter::clone(child));
            }
        }
        ReferenceCounter::new(Self::Bitmap {
            owner,
            bitmap,
            children,
        })
    }

    fn update_full<Q>(
        node: &mut Child<K, V>,
        owner: Option<OwnerToken>,
        shift: u32,
        hash: Hash,
        change: Change<'_, K, V, Q>,
        flags: &mut UpdateFlags,
    ) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let Self::Full { children, .. } = &**node else {
            return true;
        };
        let slot = fragment(hash, shift) as usize;
        if children[slot].is_none() && change.is_removal() {
            return true;
        }

        let mut replacement = None;
        if let Self::Full {
            count, children, ..
        } = Self::editable(node, owner)
        {
            let was_occupied = children[slot].is_some();
            Self::update_slot(
                &mut children[slot],
                owner,
                shift + BITS_PER_LEVEL,
                hash,
                change,
                flags,
            );
            match (was_occupied, children[slot].is_some()) {
                (false, true) => *count += 1,
                (true, false) => {
                    *count -= 1;
                    if *count < MIN_FULL_SIZE {
                        replacement = Some(Self::pack_nodes(owner, children));
                    }
                }
                _ => {}
            }
        }
        if let Some(packed) = replacement {
            *node = packed;
        }
        true
    }

    fn update_collision<Q>(
        node: &mut Child<K, V>,
        owner: Option<OwnerToken>,
        shift: u32,
        hash: Hash,
        change: Change<'_, K, V, Q>,
        flags: &mut UpdateFlags,
    ) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let Self::Collision {
            hash: shared_hash,
            entries,
            ..
        } = &**node
        else {
            return true;
        };
        let shared_hash = *shared_hash;

        if hash != shared_hash {
            if let Change::Set(key, value) = change {
                flags.added_or_removed();
                let merged = Self::merge_into_node(
                    ReferenceCounter::clone(node),
                    shared_hash,
                    owner,
                    shift,
                    hash,
                    key,
                    value,
                );
                *node = merged;
            }
            return true;
        }

        let position = entries.iter().position(|(key, _)| change.matches(key));
        let length = entries.len();
        match (position, change) {
            (None, Change::Remove(_)) => true,
            (Some(position), Change::Remove(_)) if length == 2 => {
                flags.added_or_removed();
                let (key, value) = entries[position ^ 1].clone();
                *node = ReferenceCounter::new(Self::Single {
                    owner,
                    hash: shared_hash,
                    key,
                    value,
                });
                true
            }
            (Some(position), Change::Remove(_)) => {
                flags.added_or_removed();
                if let Self::Collision { entries, .. } = Self::editable(node, owner) {
                    entries.swap_remove(position);
                }
                true
            }
            (Some(position), Change::Set(key, value)) => {
                flags.altered = true;
                if let Self::Collision { entries, .. } = Self::editable(node, owner) {
                    entries[position] = (key, value);
                }
                true
            }
            (None, Change::Set(key, value)) => {
                flags.added_or_removed();
                if let Self::Collision { entries, .. } = Self::editable(node, owner) {
                    entries.push((key, value));
                }
                true
            }
        }
    }

    fn update_single<Q>(
        node: &mut Child<K, V>,
        owner: Option<OwnerToken>,
        shift: u32,
        hash: Hash,
        change: Change<'_, K, V, Q>,
        flags: &mut UpdateFlags,
    ) -> bool
    where
        K: Borrow<Q>,
        Q: Value + ?Sized,
    {
        let Self::Single {
            hash: entry_hash,
            key: entry_key,
            ..
        } = &**node
        else {
            return true;
        };
        let entry_hash = *entry_hash;
        let key_match = change.matches(entry_key);

        match change {
            Change::Remove(_) if key_match => {
                flags.added_or_removed();
                false
            }
            Change::Remove(_) => true,
            Change::Set(key, value) if key_match => {
                flags.altered = true;
                if Self::is_editable(node, owner) {
                    if let Self::Single {
                        key: entry_key,
                        value: entry_value,
                        ..
                    } = ReferenceCounter::make_mut(node)
                    {
                        *entry_key = key;
                        *entry_value = value;
                    }
                } else {
                    *node = ReferenceCounter::new(Self::Single {
                        owner,
                        hash: entry_hash,
                        key,
                        value,
                    });
                }
                true
            }
            Change::Set(key, value) => {
                flags.added_or_removed();
                let merged = Self::merge_into_node(
                    ReferenceCounter::clone(node),
                    entry_hash,
                    owner,
                    shift,
                    hash,
                    key,
                    value,
                );
                *node = merged;
                true
            }
        }
    }

    /// Joins an existing leaf and a new entry with a different key.
    ///
    /// Equal hashes become a `Collision`; otherwise the two are placed under a
    /// new bitmap node, descending while their fragments keep coinciding.
    fn merge_into_node(
        existing: Child<K, V>,
        existing_hash: Hash,
        owner: Option<OwnerToken>,
        shift: u32,
        hash: Hash,
        key: K,
        value: V,
    ) -> Child<K, V> {
        if existing_hash == hash {
            let mut entries = existing.leaf_entries();
            entries.push((key, value));
            return ReferenceCounter::new(Self::Collision {
                owner,
                hash,
                entries,
            });
        }

        let existing_slot = fragment(existing_hash, shift);
        let new_slot = fragment(hash, shift);
        let children = if existing_slot == new_slot {
            vec![Self::merge_into_node(
                existing,
                existing_hash,
                owner,
                shift + BITS_PER_LEVEL,
                hash,
                key,
                value,
            )]
        } else {
            let leaf = ReferenceCounter::new(Self::Single {
                owner,
                hash,
                key,
                value,
            });
            if existing_slot < new_slot {
                vec![existing, leaf]
            } else {
                vec![leaf, existing]
            }
        };
        ReferenceCounter::new(Self::Bitmap {
            owner,
            bitmap: (1u32 << existing_slot) | (1u32 << new_slot),
            children,
        })
    }

    /// Clones the entries held directly by a leaf.
    fn leaf_entries(&self) -> Entries<K, V> {
        match self {
            Self::Single { key, value, .. } => {
                let mut entries = Entries::new();
                entries.push((key.clone(), value.clone()));
                entries
            }
            Self::Collision { entries, .. } | Self::Sparse { entries, .. } => entries.clone(),
            Self::Bitmap { .. } | Self::Full { .. } => Entries::new(),
        }
    }
}

#[cfg(test)]
impl<K, V> Node<K, V> {
    /// Child pointers of a branch node, in slot order.
    pub(crate) fn children(&self) -> Vec<&Child<K, V>> {
        match self {
            Self::Bitmap { children, .. } => children.iter().collect(),
            Self::Full { children, .. } => children.iter().flatten().collect(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// Depth-first iterator over the entries of a trie.
pub(crate) struct NodeIterator<'a, K, V> {
    stack: Vec<(&'a Node<K, V>, usize)>,
}

impl<'a, K, V> Iterator for NodeIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node, position) = self.stack.last_mut()?;
            let node: &'a Node<K, V> = node;
            let descend = match node {
                Node::Sparse { entries, .. } | Node::Collision { entries, .. } => {
                    if let Some((key, value)) = entries.get(*position) {
                        *position += 1;
                        return Some((key, value));
                    }
                    None
                }
                Node::Single { key, value, .. } => {
                    if *position == 0 {
                        *position = 1;
                        return Some((key, value));
                    }
                    None
                }
                Node::Bitmap { children, .. } => {
                    let child = children.get(*position);
                    *position += 1;
                    child.map(|child| &**child)
                }
                Node::Full { children, .. } => {
                    let next = children[(*position).min(BRANCHING_FACTOR)..]
                        .iter()
                        .position(Option::is_some)
                        .map(|offset| *position + offset);
                    next.and_then(|index| {
                        *position = index + 1;
                        children[index].as_deref()
                    })
                }
            };
            match descend {
                Some(child) => self.stack.push((child, 0)),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Key whose hash is chosen by the test.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Fixed {
        id: u32,
        hash: Hash,
    }

    impl Value for Fixed {
        fn hash_code(&self) -> Hash {
            self.hash
        }

        fn equals(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    fn set(root: &mut Option<Child<Fixed, u32>>, owner: Option<OwnerToken>, key: Fixed) -> UpdateFlags {
        let mut flags = UpdateFlags::default();
        let hash = key.hash;
        let id = key.id;
        Node::update_root(root, owner, hash, Change::<Fixed, u32, Fixed>::Set(key, id), &mut flags);
        flags
    }

    fn remove(root: &mut Option<Child<Fixed, u32>>, key: &Fixed) -> UpdateFlags {
        let mut flags = UpdateFlags::default();
        Node::update_root(root, None, key.hash, Change::<Fixed, u32, Fixed>::Remove(key), &mut flags);
        flags
    }

    fn kind_of(root: &Option<Child<Fixed, u32>>) -> Option<NodeKind> {
        root.as_ref().map(|node| node.kind())
    }

    #[rstest]
    #[case(0b00001, 0, 1)]
    #[case(0b11111 << 5, 5, 31)]
    #[case(-1, 30, 3)]
    #[case(1, 35, 0)]
    fn test_fragment(#[case] hash: Hash, #[case] shift: u32, #[case] expected: u32) {
        assert_eq!(fragment(hash, shift), expected);
    }

    #[rstest]
    fn test_sparse_root_promotes_after_eight_entries() {
        let mut root = None;
        for id in 0..8 {
            set(&mut root, None, Fixed { id, hash: id as Hash });
        }
        assert_eq!(kind_of(&root), Some(NodeKind::Sparse));

        set(&mut root, None, Fixed { id: 8, hash: 8 });
        assert_eq!(kind_of(&root), Some(NodeKind::Bitmap));

        let node = root.as_ref().map(|node| &**node);
        for id in 0..9 {
            let key = Fixed { id, hash: id as Hash };
            assert_eq!(node.and_then(|node| node.get(0, key.hash, &key)).map(|(_, value)| *value), Some(id));
        }
    }

    #[rstest]
    fn test_bitmap_expands_to_full_and_packs_back() {
        let mut root = None;
        for id in 0..17 {
            set(&mut root, None, Fixed { id, hash: id as Hash });
        }
        assert_eq!(kind_of(&root), Some(NodeKind::Full));

        for id in 0..10 {
            remove(&mut root, &Fixed { id, hash: id as Hash });
        }
        assert_eq!(kind_of(&root), Some(NodeKind::Bitmap));
        assert_eq!(root.as_ref().map_or(0, |node| node.iter().count()), 7);
    }

    #[rstest]
    fn test_equal_hashes_make_a_collision_node() {
        let first = Fixed { id: 1, hash: 77 };
        let second = Fixed { id: 2, hash: 77 };
        let mut node = ReferenceCounter::new(Node::Single {
            owner: None,
            hash: first.hash,
            key: first.clone(),
            value: 1,
        });
        let mut flags = UpdateFlags::default();
        Node::update_node(&mut node, None, 0, 77, Change::<Fixed, u32, Fixed>::Set(second.clone(), 2), &mut flags);
        assert_eq!(node.kind(), NodeKind::Collision);
        assert!(flags.size_changed);
        assert_eq!(node.get(0, 77, &first).map(|(_, value)| *value), Some(1));
        assert_eq!(node.get(0, 77, &second).map(|(_, value)| *value), Some(2));

        let mut root = Some(node);
        remove(&mut root, &first);
        assert_eq!(kind_of(&root), Some(NodeKind::Single));
        remove(&mut root, &second);
        assert_eq!(kind_of(&root), None);
    }

    #[rstest]
    fn test_shared_prefix_descends_until_fragments_differ() {
        let first = Fixed { id: 1, hash: 0b00001 };
        let second = Fixed { id: 2, hash: 0b00001 | (1 << 10) };
        let node = Node::merge_into_node(
            ReferenceCounter::new(Node::Single {
                owner: None,
                hash: first.hash,
                key: first.clone(),
                value: 1,
            }),
            first.hash,
            None,
            0,
            second.hash,
            second.clone(),
            2,
        );
        // Fragments coincide at shifts 0 and 5, differ at 10.
        assert_eq!(node.kind(), NodeKind::Bitmap);
        let level_one = node.children()[0].clone();
        assert_eq!(level_one.kind(), NodeKind::Bitmap);
        let level_two = level_one.children()[0].clone();
        assert_eq!(level_two.children().len(), 2);
        assert_eq!(node.get(0, second.hash, &second).map(|(_, value)| *value), Some(2));
    }

    #[rstest]
    fn test_removal_collapses_single_leaf_child() {
        let mut root = None;
        for id in 0..9 {
            set(&mut root, None, Fixed { id, hash: id as Hash });
        }
        for id in 1..9 {
            remove(&mut root, &Fixed { id, hash: id as Hash });
        }
        assert_eq!(kind_of(&root), Some(NodeKind::Single));
    }

    #[rstest]
    fn test_owned_nodes_are_edited_in_place() {
        let owner = Some(OwnerToken::mint());
        let mut root = None;
        for id in 0..20 {
            set(&mut root, owner, Fixed { id, hash: id as Hash });
        }
        let before = root.as_ref().map(ReferenceCounter::as_ptr);
        set(&mut root, owner, Fixed { id: 20, hash: 20 });
        assert_eq!(root.as_ref().map(ReferenceCounter::as_ptr), before);

        // A different batch must copy.
        set(&mut root, Some(OwnerToken::mint()), Fixed { id: 21, hash: 21 });
        assert_ne!(root.as_ref().map(ReferenceCounter::as_ptr), before);
    }

    #[rstest]
    fn test_shared_nodes_are_never_edited_in_place() {
        let owner = Some(OwnerToken::mint());
        let mut root = None;
        for id in 0..20 {
            set(&mut root, owner, Fixed { id, hash: id as Hash });
        }
        let published = root.clone();
        set(&mut root, owner, Fixed { id: 1, hash: 1 });
        assert!(!ReferenceCounter::ptr_eq(
            root.as_ref().unwrap(),
            published.as_ref().unwrap()
        ));
        assert_eq!(published.as_ref().map_or(0, |node| node.iter().count()), 20);
    }
}
