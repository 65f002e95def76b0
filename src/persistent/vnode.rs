//! 32-way vector trie behind [`PersistentList`].
//!
//! A list is a window `[origin, capacity)` over a trie of [`VNode`]s plus a
//! tail leaf holding the last (up to) 32 raw indices. Raw index `i` lives in
//! the tail when `i >= tail_offset(capacity)`; otherwise it is found by
//! descending from the root, consuming 5 bits of `i` per level.
//!
//! Moving either end of the window is done by [`ListCore::set_bounds`], which
//! grows the root upwards when the window extends past what the trie can
//! address, grafts a full tail into the trie, and prunes subtrees that fall
//! outside a shrunken window.
//!
//! [`PersistentList`]: super::PersistentList

use arrayvec::ArrayVec;

use super::ReferenceCounter;
use crate::owner::{OwnerToken, owns};

// =============================================================================
// Constants
// =============================================================================

/// Bits per level in the trie
pub(crate) const SHIFT: u32 = 5;

/// Branching factor (2^5 = 32)
pub(crate) const SIZE: usize = 1 << SHIFT;

/// Bit mask for extracting index within a node
pub(crate) const MASK: usize = SIZE - 1;

type Child<T> = ReferenceCounter<VNode<T>>;

/// First raw index held by the tail of a list with the given capacity.
#[inline]
pub(crate) const fn tail_offset(capacity: usize) -> usize {
    if capacity < SIZE {
        0
    } else {
        ((capacity - 1) >> SHIFT) << SHIFT
    }
}

/// Number of raw indices addressed by a node at `level`, or `None` when it
/// exceeds `usize`.
#[inline]
const fn span(level: u32) -> Option<usize> {
    1usize.checked_shl(level + SHIFT)
}

/// Stores `value` at `index`, padding with empty slots as needed.
fn put<S>(slots: &mut ArrayVec<Option<S>, SIZE>, index: usize, value: Option<S>) {
    while slots.len() <= index {
        slots.push(None);
    }
    slots[index] = value;
}

// =============================================================================
// Node Definition
// =============================================================================

/// A node of the vector trie. Leaves hold elements, branches hold children.
///
/// Slot arrays may be shorter than 32 and may contain empty slots before the
/// list's origin.
#[derive(Clone)]
pub(crate) enum VNode<T> {
    Leaf {
        owner: Option<OwnerToken>,
        items: ArrayVec<Option<T>, SIZE>,
    },
    Branch {
        owner: Option<OwnerToken>,
        children: ArrayVec<Option<Child<T>>, SIZE>,
    },
}

impl<T> VNode<T> {
    /// Creates an empty node of the kind used at `level`.
    pub(crate) const fn empty(level: u32, owner: Option<OwnerToken>) -> Self {
        if level == 0 {
            Self::Leaf {
                owner,
                items: ArrayVec::new_const(),
            }
        } else {
            Self::Branch {
                owner,
                children: ArrayVec::new_const(),
            }
        }
    }

    const fn owner(&self) -> Option<OwnerToken> {
        match self {
            Self::Leaf { owner, .. } | Self::Branch { owner, .. } => *owner,
        }
    }

    const fn set_owner(&mut self, new_owner: Option<OwnerToken>) {
        match self {
            Self::Leaf { owner, .. } | Self::Branch { owner, .. } => *owner = new_owner,
        }
    }

    /// Number of slots in use, including empty ones.
    pub(crate) fn slot_count(&self) -> usize {
        match self {
            Self::Leaf { items, .. } => items.len(),
            Self::Branch { children, .. } => children.len(),
        }
    }

    /// Elements of a leaf; empty for a branch.
    pub(crate) fn items(&self) -> &[Option<T>] {
        match self {
            Self::Leaf { items, .. } => items,
            Self::Branch { .. } => &[],
        }
    }

    /// Child at `index` of a branch.
    pub(crate) fn child(&self, index: usize) -> Option<&Child<T>> {
        match self {
            Self::Branch { children, .. } => children.get(index)?.as_ref(),
            Self::Leaf { .. } => None,
        }
    }

    /// Empties the slots before `index`.
    fn clear_before(&mut self, index: usize) {
        match self {
            Self::Leaf { items, .. } => items.iter_mut().take(index).for_each(|slot| *slot = None),
            Self::Branch { children, .. } => {
                children.iter_mut().take(index).for_each(|slot| *slot = None);
            }
        }
    }

    /// Drops the slots from `length` on.
    fn truncate(&mut self, length: usize) {
        match self {
            Self::Leaf { items, .. } => items.truncate(length),
            Self::Branch { children, .. } => children.truncate(length),
        }
    }

    fn put_child(&mut self, index: usize, child: Child<T>) {
        if let Self::Branch { children, .. } = self {
            put(children, index, Some(child));
        }
    }
}

impl<T: Clone> VNode<T> {
    /// Returns a writable node for `slot`: the node itself when `owner`
    /// stamped it and nothing else shares it, otherwise a stamped copy (or a
    /// fresh empty node for an empty slot).
    pub(crate) fn editable(
        slot: &mut Option<Child<T>>,
        owner: Option<OwnerToken>,
        level: u32,
    ) -> &mut Self {
        let node = match slot.take() {
            Some(mut node) => {
                if !(owns(owner, node.owner()) && ReferenceCounter::get_mut(&mut node).is_some()) {
                    let mut copy = Self::clone(&node);
                    copy.set_owner(owner);
                    node = ReferenceCounter::new(copy);
                }
                node
            }
            None => ReferenceCounter::new(Self::empty(level, owner)),
        };
        ReferenceCounter::make_mut(slot.insert(node))
    }

    /// Writes `value` at raw `index` below the node in `slot`.
    pub(crate) fn update(
        slot: &mut Option<Child<T>>,
        owner: Option<OwnerToken>,
        level: u32,
        index: usize,
        value: T,
    ) {
        let position = (index >> level) & MASK;
        match Self::editable(slot, owner, level) {
            Self::Branch { children, .. } => {
                while children.len() <= position {
                    children.push(None);
                }
                Self::update(&mut children[position], owner, level - SHIFT, index, value);
            }
            Self::Leaf { items, .. } => put(items, position, Some(value)),
        }
    }

    /// Places `leaf` as the leaf covering raw `index` below the node in
    /// `slot`, creating intermediate branches as needed.
    fn graft(
        slot: &mut Option<Child<T>>,
        owner: Option<OwnerToken>,
        level: u32,
        index: usize,
        leaf: Child<T>,
    ) {
        let position = (index >> level) & MASK;
        if let Self::Branch { children, .. } = Self::editable(slot, owner, level) {
            if level == SHIFT {
                put(children, position, Some(leaf));
            } else {
                while children.len() <= position {
                    children.push(None);
                }
                Self::graft(&mut children[position], owner, level - SHIFT, index, leaf);
            }
        }
    }

    /// Empties every slot addressing raw indices below `index`.
    fn remove_before(
        node: Child<T>,
        owner: Option<OwnerToken>,
        level: u32,
        index: usize,
    ) -> Child<T> {
        let aligned = span(level).is_some_and(|span| index & (span - 1) == 0);
        if aligned || node.slot_count() == 0 {
            return node;
        }
        let origin_index = (index >> level) & MASK;
        if origin_index >= node.slot_count() {
            return ReferenceCounter::new(Self::empty(level, owner));
        }
        let removing_first = origin_index == 0;

        let mut new_child = None;
        if level > 0 {
            if let Some(old_child) = node.child(origin_index) {
                let trimmed = Self::remove_before(
                    ReferenceCounter::clone(old_child),
                    owner,
                    level - SHIFT,
                    index,
                );
                if removing_first && ReferenceCounter::ptr_eq(&trimmed, old_child) {
                    return node;
                }
                new_child = Some(trimmed);
            }
        }
        if removing_first && new_child.is_none() {
            return node;
        }

        let mut slot = Some(node);
        let editable = Self::editable(&mut slot, owner, level);
        if !removing_first {
            editable.clear_before(origin_index);
        }
        if let Some(child) = new_child {
            editable.put_child(origin_index, child);
        }
        slot.unwrap_or_else(|| ReferenceCounter::new(Self::empty(level, owner)))
    }

    /// Drops every slot addressing raw indices at or above `index`.
    fn remove_after(
        node: Child<T>,
        owner: Option<OwnerToken>,
        level: u32,
        index: usize,
    ) -> Child<T> {
        let boundary = if level > 0 { 1usize << level } else { 0 };
        if index == boundary || node.slot_count() == 0 {
            return node;
        }
        let size_index = (index.saturating_sub(1) >> level) & MASK;
        if size_index >= node.slot_count() {
            return node;
        }

        let mut new_child = None;
        if level > 0 {
            if let Some(old_child) = node.child(size_index) {
                let trimmed = Self::remove_after(
                    ReferenceCounter::clone(old_child),
                    owner,
                    level - SHIFT,
                    index,
                );
                if ReferenceCounter::ptr_eq(&trimmed, old_child)
                    && size_index == node.slot_count() - 1
                {
                    return node;
                }
                new_child = Some(trimmed);
            }
        }

        let mut slot = Some(node);
        let editable = Self::editable(&mut slot, owner, level);
        editable.truncate(size_index + 1);
        if let Some(child) = new_child {
            editable.put_child(size_index, child);
        }
        slot.unwrap_or_else(|| ReferenceCounter::new(Self::empty(level, owner)))
    }
}

// =============================================================================
// List Core
// =============================================================================

/// The trie, tail and window shared by the persistent and transient lists.
pub(crate) struct ListCore<T> {
    pub(crate) origin: usize,
    pub(crate) capacity: usize,
    pub(crate) level: u32,
    pub(crate) root: Option<Child<T>>,
    pub(crate) tail: Option<Child<T>>,
}

impl<T> Clone for ListCore<T> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin,
            capacity: self.capacity,
            level: self.level,
            root: self.root.clone(),
            tail: self.tail.clone(),
        }
    }
}

impl<T> ListCore<T> {
    pub(crate) const fn empty() -> Self {
        Self {
            origin: 0,
            capacity: 0,
            level: SHIFT,
            root: None,
            tail: None,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.capacity - self.origin
    }

    /// Returns the leaf holding raw index `raw`.
    pub(crate) fn node_for(&self, raw: usize) -> Option<&Child<T>> {
        if raw >= tail_offset(self.capacity) {
            return self.tail.as_ref();
        }
        if span(self.level).is_some_and(|span| raw >= span) {
            return None;
        }
        let mut node = self.root.as_ref();
        let mut level = self.level;
        while level > 0 {
            node = node?.child((raw >> level) & MASK);
            level -= SHIFT;
        }
        node
    }

    /// Returns the element at logical `index`.
    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        let raw = index + self.origin;
        self.node_for(raw)?.items().get(raw & MASK)?.as_ref()
    }
}

impl<T: Clone> ListCore<T> {
    /// Writes `value` at logical `index`, which must lie inside the window.
    pub(crate) fn set(&mut self, owner: Option<OwnerToken>, index: usize, value: T) {
        let raw = index + self.origin;
        if raw >= tail_offset(self.capacity) {
            VNode::update(&mut self.tail, owner, 0, raw, value);
        } else {
            VNode::update(&mut self.root, owner, self.level, raw, value);
        }
    }

    /// Moves the window to `[origin + begin, end)`.
    ///
    /// `end` is relative to the current origin; a negative `end` counts back
    /// from the current capacity and `None` keeps it. Newly exposed slots are
    /// empty until written.
    pub(crate) fn set_bounds(&mut self, owner: OwnerToken, begin: isize, end: Option<isize>) {
        let owner = Some(owner);
        let mut old_origin = self.origin.cast_signed();
        let mut old_capacity = self.capacity.cast_signed();
        let mut new_origin = old_origin + begin;
        let mut new_capacity = match end {
            None => old_capacity,
            Some(end) if end < 0 => old_capacity + end,
            Some(end) => old_origin + end,
        };
        if new_origin == old_origin && new_capacity == old_capacity {
            return;
        }
        if new_origin >= new_capacity {
            *self = Self::empty();
            return;
        }

        let mut new_level = self.level;
        let mut new_root = self.root.clone();

        // A negative origin needs higher roots, each placing the old one in
        // its second slot.
        let mut offset_shift: isize = 0;
        while new_origin + offset_shift < 0 {
            let mut root = VNode::empty(new_level + SHIFT, owner);
            if let Some(old_root) = new_root.take().filter(|root| root.slot_count() > 0) {
                root.put_child(1, old_root);
            }
            new_root = Some(ReferenceCounter::new(root));
            new_level += SHIFT;
            offset_shift += 1 << new_level;
        }
        new_origin += offset_shift;
        old_origin += offset_shift;
        new_capacity += offset_shift;
        old_capacity += offset_shift;

        let mut new_origin = new_origin.cast_unsigned();
        let old_origin = old_origin.cast_unsigned();
        let mut new_capacity = new_capacity.cast_unsigned();
        let old_capacity = old_capacity.cast_unsigned();

        let old_tail_offset = tail_offset(old_capacity);
        let new_tail_offset = tail_offset(new_capacity);

        // A larger capacity may need higher roots too.
        while span(new_level).is_some_and(|span| new_tail_offset >= span) {
            let mut root = VNode::empty(new_level + SHIFT, owner);
            if let Some(old_root) = new_root.take().filter(|root| root.slot_count() > 0) {
                root.put_child(0, old_root);
            }
            new_root = Some(ReferenceCounter::new(root));
            new_level += SHIFT;
        }

        let old_tail = self.tail.clone();
        let mut new_tail = match new_tail_offset.cmp(&old_tail_offset) {
            std::cmp::Ordering::Less => self.node_for(new_capacity - 1).cloned(),
            std::cmp::Ordering::Greater => Some(ReferenceCounter::new(VNode::empty(0, owner))),
            std::cmp::Ordering::Equal => old_tail.clone(),
        };

        // The old tail becomes an ordinary leaf once the window moves past it.
        if let Some(old_tail) = old_tail
            && new_tail_offset > old_tail_offset
            && new_origin < old_capacity
            && old_tail.slot_count() > 0
        {
            VNode::graft(&mut new_root, owner, new_level, old_tail_offset, old_tail);
        }

        if new_capacity < old_capacity {
            new_tail = new_tail.map(|tail| VNode::remove_after(tail, owner, 0, new_capacity));
        }

        if new_origin >= new_tail_offset {
            // The whole window fits in the tail.
            new_origin -= new_tail_offset;
            new_capacity -= new_tail_offset;
            new_level = SHIFT;
            new_root = None;
            new_tail = new_tail.map(|tail| VNode::remove_before(tail, owner, 0, new_origin));
        } else if new_origin > old_origin || new_tail_offset < old_tail_offset {
            // Descend to the smallest subtree still covering the window.
            let mut offset_shift = 0;
            while let Some(root) = &new_root {
                let begin_index = (new_origin >> new_level) & MASK;
                if begin_index != ((new_tail_offset >> new_level) & MASK) {
                    break;
                }
                offset_shift += (1 << new_level) * begin_index;
                let child = root.child(begin_index).cloned();
                new_level -= SHIFT;
                new_root = child;
            }

            if let Some(mut root) = new_root.take() {
                if new_origin > old_origin {
                    root = VNode::remove_before(root, owner, new_level, new_origin - offset_shift);
                }
                if new_tail_offset < old_tail_offset {
                    root = VNode::remove_after(
                        root,
                        owner,
                        new_level,
                        new_tail_offset - offset_shift,
                    );
                }
                new_root = Some(root);
            }
            new_origin -= offset_shift;
            new_capacity -= offset_shift;
        }

        *self = Self {
            origin: new_origin,
            capacity: new_capacity,
            level: new_level,
            root: new_root,
            tail: new_tail,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pushed(count: usize) -> ListCore<usize> {
        let owner = OwnerToken::mint();
        let mut core = ListCore::empty();
        for value in 0..count {
            let size = core.len();
            core.set_bounds(owner, 0, Some((size + 1).cast_signed()));
            core.set(Some(owner), size, value);
        }
        core
    }

    fn contents(core: &ListCore<usize>) -> Vec<usize> {
        (0..core.len()).filter_map(|index| core.get(index).copied()).collect()
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(32, 0)]
    #[case(33, 32)]
    #[case(64, 32)]
    #[case(65, 64)]
    fn test_tail_offset(#[case] capacity: usize, #[case] expected: usize) {
        assert_eq!(tail_offset(capacity), expected);
    }

    #[rstest]
    fn test_push_fills_tail_before_root() {
        let core = pushed(32);
        assert!(core.root.is_none());
        assert_eq!(core.tail.as_ref().map(|tail| tail.slot_count()), Some(32));

        let core = pushed(33);
        assert!(core.root.is_some());
        assert_eq!(core.tail.as_ref().map(|tail| tail.slot_count()), Some(1));
        assert_eq!(contents(&core), (0..33).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_push_grows_root_level() {
        let core = pushed(1100);
        assert_eq!(core.level, 2 * SHIFT);
        assert_eq!(core.get(1099), Some(&1099));
        assert_eq!(core.get(1024), Some(&1024));
    }

    #[rstest]
    fn test_negative_origin_grows_root_upwards() {
        let owner = OwnerToken::mint();
        let mut core = pushed(40);
        core.set_bounds(owner, -1, None);
        core.set(Some(owner), 0, 999);
        assert_eq!(core.len(), 41);
        assert_eq!(core.get(0), Some(&999));
        assert_eq!(core.get(40), Some(&39));
        assert!(core.origin > 0);
    }

    #[rstest]
    fn test_shrinking_to_the_tail_drops_root() {
        let owner = OwnerToken::mint();
        let mut core = pushed(100);
        core.set_bounds(owner, 90, None);
        assert!(core.root.is_some());
        assert_eq!(contents(&core), (90..100).collect::<Vec<_>>());

        core.set_bounds(owner, 7, None);
        assert!(core.root.is_none());
        assert_eq!(core.origin, 1);
        assert_eq!(contents(&core), (97..100).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_trimming_keeps_window_contents() {
        let owner = OwnerToken::mint();
        let mut core = pushed(2000);
        core.set_bounds(owner, 700, Some(1500));
        assert_eq!(contents(&core), (700..1500).collect::<Vec<_>>());

        core.set_bounds(owner, 0, Some(-300));
        assert_eq!(contents(&core), (700..1200).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_empty_window_resets() {
        let owner = OwnerToken::mint();
        let mut core = pushed(10);
        core.set_bounds(owner, 5, Some(5));
        assert_eq!(core.len(), 0);
        assert!(core.root.is_none());
        assert!(core.tail.is_none());
    }
}
