// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tree proper: node arena, item table, insertion, removal, and queries.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::types::{Aabb2D, Scalar, area, enlarged_area, intersection_area, margin, union_aabb};

/// Default branching factor. Minimum node fill is 40% of the maximum, which
/// gives the best performance in practice.
const DEFAULT_MAX_ENTRIES: usize = 9;

/// Generational handle for an item stored in a tree.
///
/// This is a small, copyable handle that stays stable across tree mutations
/// and becomes invalid when the item is removed.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On insert, a fresh slot is allocated with generation `1`.
/// - On remove, the slot is freed; any existing `ItemId` that pointed to that
///   slot is now stale, and passing it to [`RTree::remove`] is a no-op.
/// - On reuse of a freed slot, its generation is incremented, producing a new,
///   distinct `ItemId`. Stale handles never alias a live item.
///
/// [`RTree::clear`] resets the generation counters; handles obtained before a
/// clear must not be used afterwards.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ItemId(u32, u32);

impl ItemId {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Item slots are intentionally 32-bit; higher bits are truncated by design."
    )]
    pub(crate) const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeIdx(usize);

impl NodeIdx {
    pub(crate) const fn new(i: usize) -> Self {
        Self(i)
    }

    pub(crate) const fn get(self) -> usize {
        self.0
    }
}

/// A child of a tree node: a subtree for internal nodes, an item for leaves.
/// Item bounding boxes are cached here so the split and query paths never
/// touch the item table.
#[derive(Clone)]
pub(crate) enum RChild<T> {
    Node(NodeIdx),
    Item { slot: usize, bbox: Aabb2D<T> },
}

#[derive(Clone)]
pub(crate) struct RNode<T> {
    pub(crate) bbox: Aabb2D<T>,
    pub(crate) height: u32,
    pub(crate) leaf: bool,
    pub(crate) children: Vec<RChild<T>>,
}

impl<T: Scalar> RNode<T> {
    fn empty_leaf() -> Self {
        Self {
            bbox: Aabb2D::empty(),
            height: 1,
            leaf: true,
            children: Vec::new(),
        }
    }
}

/// A height-balanced R-tree over 2D AABBs with opaque payloads.
///
/// Nodes live in an index-addressed arena; items live in a generational slot
/// table and are addressed by [`ItemId`] handles. The root may hold fewer
/// than the minimum number of entries (including none at all); every other
/// node respects the configured fan-out bounds after insertions and loads.
pub struct RTree<T: Scalar, P: Copy + Debug> {
    pub(crate) max_entries: usize,
    pub(crate) min_entries: usize,
    pub(crate) root: NodeIdx,
    pub(crate) arena: Vec<RNode<T>>,
    free_nodes: Vec<NodeIdx>,
    pub(crate) items: Vec<Option<(Aabb2D<T>, P)>>,
    generations: Vec<u32>,
    free_items: Vec<usize>,
    count: usize,
    // Scratch buffer for the insertion path, reused across inserts.
    path_buf: Vec<NodeIdx>,
}

impl<T: Scalar, P: Copy + Debug> Default for RTree<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar, P: Copy + Debug> RTree<T, P> {
    /// Create an empty tree with the default branching factor (9).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create an empty tree with the given branching factor.
    ///
    /// `0` selects the default (9); other values are clamped to at least 4.
    /// The minimum fill is derived as `max(2, ceil(0.4 * max_entries))`.
    pub fn with_max_entries(max_entries: usize) -> Self {
        let max_entries = if max_entries == 0 {
            DEFAULT_MAX_ENTRIES
        } else {
            max_entries.max(4)
        };
        let min_entries = (max_entries * 2).div_ceil(5).max(2);
        let mut arena = Vec::new();
        arena.push(RNode::empty_leaf());
        Self {
            max_entries,
            min_entries,
            root: NodeIdx::new(0),
            arena,
            free_nodes: Vec::new(),
            items: Vec::new(),
            generations: Vec::new(),
            free_items: Vec::new(),
            count: 0,
            path_buf: Vec::new(),
        }
    }

    /// Number of items in the tree.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Height of the tree; an empty tree has height 1.
    pub fn height(&self) -> u32 {
        self.arena[self.root.get()].height
    }

    /// Bounding box of everything in the tree, or `None` when empty.
    pub fn bounds(&self) -> Option<Aabb2D<T>> {
        if self.is_empty() {
            None
        } else {
            Some(self.arena[self.root.get()].bbox)
        }
    }

    /// Remove every item and reset the tree to an empty leaf root.
    ///
    /// Generation counters restart, so handles obtained before the clear must
    /// not be used afterwards.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.arena.push(RNode::empty_leaf());
        self.root = NodeIdx::new(0);
        self.free_nodes.clear();
        self.items.clear();
        self.generations.clear();
        self.free_items.clear();
        self.count = 0;
    }

    /// Insert a single item. Returns its handle.
    pub fn insert(&mut self, aabb: Aabb2D<T>, payload: P) -> ItemId {
        let (slot, generation) = self.alloc_item(aabb, payload);
        let level = (self.height() - 1) as usize;
        self.insert_child(RChild::Item { slot, bbox: aabb }, level);
        ItemId::new(slot, generation)
    }

    /// Remove an item by handle. Stale or unknown handles are a no-op.
    pub fn remove(&mut self, id: ItemId) {
        let Some(Some((bbox, _))) = self.items.get(id.idx()) else {
            return;
        };
        if self.generations[id.idx()] != id.1 {
            return;
        }
        let bbox = *bbox;

        // Depth-first walk with an explicit stack so the root-to-leaf path is
        // at hand for condensing. Subtrees whose bbox does not contain the
        // item's bbox cannot hold it and are pruned.
        let mut stack: Vec<(NodeIdx, usize)> = Vec::new();
        stack.push((self.root, 0));
        while let Some(&(ni, cursor)) = stack.last() {
            let node = &self.arena[ni.get()];
            if node.leaf {
                let slot = id.idx();
                let found = node
                    .children
                    .iter()
                    .position(|c| matches!(c, RChild::Item { slot: s, .. } if *s == slot));
                if let Some(pos) = found {
                    // Vec::remove keeps the order of the remaining children.
                    self.arena[ni.get()].children.remove(pos);
                    self.items[slot] = None;
                    self.free_items.push(slot);
                    self.count -= 1;
                    let path: Vec<NodeIdx> = stack.iter().map(|&(n, _)| n).collect();
                    self.condense(&path);
                    return;
                }
                stack.pop();
                continue;
            }
            if cursor == 0 && !node.bbox.contains(&bbox) {
                stack.pop();
                continue;
            }
            if cursor < node.children.len() {
                let child = match node.children[cursor] {
                    RChild::Node(c) => c,
                    RChild::Item { .. } => unreachable!("internal node holding an item child"),
                };
                stack.last_mut().expect("stack is non-empty").1 += 1;
                stack.push((child, 0));
            } else {
                stack.pop();
            }
        }
    }

    /// Collect all items whose AABB intersects `bbox`. Order is unspecified.
    pub fn search(&self, bbox: Aabb2D<T>) -> impl Iterator<Item = (ItemId, P)> + '_ {
        let mut out = Vec::new();
        self.search_with(bbox, |id, payload| out.push((id, payload)));
        out.into_iter()
    }

    /// Visit every item whose AABB intersects `bbox` without collecting.
    pub fn search_with<F: FnMut(ItemId, P)>(&self, bbox: Aabb2D<T>, mut f: F) {
        if !bbox.intersects(&self.arena[self.root.get()].bbox) {
            return;
        }
        let mut stack = Vec::new();
        stack.push(self.root);
        while let Some(ni) = stack.pop() {
            let node = &self.arena[ni.get()];
            for child in &node.children {
                let cb = Self::child_bbox(&self.arena, child);
                if !bbox.intersects(&cb) {
                    continue;
                }
                match child {
                    RChild::Item { slot, .. } => self.emit(*slot, &mut f),
                    RChild::Node(ci) => {
                        if bbox.contains(&cb) {
                            // Fully covered subtree: every descendant matches.
                            self.collect_all(*ci, &mut f);
                        } else {
                            stack.push(*ci);
                        }
                    }
                }
            }
        }
    }

    /// True when any item's AABB intersects `bbox`. Stops at the first hit.
    pub fn collides(&self, bbox: Aabb2D<T>) -> bool {
        if !bbox.intersects(&self.arena[self.root.get()].bbox) {
            return false;
        }
        let mut stack = Vec::new();
        stack.push(self.root);
        while let Some(ni) = stack.pop() {
            let node = &self.arena[ni.get()];
            for child in &node.children {
                let cb = Self::child_bbox(&self.arena, child);
                if !bbox.intersects(&cb) {
                    continue;
                }
                match child {
                    RChild::Item { .. } => return true,
                    RChild::Node(ci) => {
                        if bbox.contains(&cb) {
                            return true;
                        }
                        stack.push(*ci);
                    }
                }
            }
        }
        false
    }

    /// Every item in the tree. Order is unspecified.
    pub fn all(&self) -> impl Iterator<Item = (ItemId, P)> + '_ {
        let mut out = Vec::new();
        self.collect_all(self.root, &mut |id, payload| out.push((id, payload)));
        out.into_iter()
    }

    // --- internals ---

    pub(crate) fn alloc_item(&mut self, aabb: Aabb2D<T>, payload: P) -> (usize, u32) {
        self.count += 1;
        if let Some(idx) = self.free_items.pop() {
            self.generations[idx] += 1;
            self.items[idx] = Some((aabb, payload));
            (idx, self.generations[idx])
        } else {
            self.items.push(Some((aabb, payload)));
            self.generations.push(1);
            (self.items.len() - 1, 1)
        }
    }

    pub(crate) fn alloc_node(&mut self, node: RNode<T>) -> NodeIdx {
        if let Some(idx) = self.free_nodes.pop() {
            self.arena[idx.get()] = node;
            idx
        } else {
            let idx = NodeIdx::new(self.arena.len());
            self.arena.push(node);
            idx
        }
    }

    pub(crate) fn free_node(&mut self, idx: NodeIdx) {
        self.arena[idx.get()].children = Vec::new();
        self.free_nodes.push(idx);
    }

    pub(crate) fn child_bbox(arena: &[RNode<T>], child: &RChild<T>) -> Aabb2D<T> {
        match child {
            RChild::Node(i) => arena[i.get()].bbox,
            RChild::Item { bbox, .. } => *bbox,
        }
    }

    /// Bounding box of a run of children.
    pub(crate) fn dist_bbox(arena: &[RNode<T>], children: &[RChild<T>]) -> Aabb2D<T> {
        let mut bbox = Aabb2D::empty();
        for child in children {
            bbox.extend(&Self::child_bbox(arena, child));
        }
        bbox
    }

    fn emit<F: FnMut(ItemId, P)>(&self, slot: usize, f: &mut F) {
        if let Some(Some((_, payload))) = self.items.get(slot) {
            f(ItemId::new(slot, self.generations[slot]), *payload);
        }
    }

    fn collect_all<F: FnMut(ItemId, P)>(&self, start: NodeIdx, f: &mut F) {
        let mut stack = Vec::new();
        stack.push(start);
        while let Some(ni) = stack.pop() {
            for child in &self.arena[ni.get()].children {
                match child {
                    RChild::Item { slot, .. } => self.emit(*slot, f),
                    RChild::Node(ci) => stack.push(*ci),
                }
            }
        }
    }

    /// Insert a child entry (item or subtree root) at the given level of the
    /// path, splitting overflowing ancestors bottom-up.
    pub(crate) fn insert_child(&mut self, entry: RChild<T>, level: usize) {
        let bbox = Self::child_bbox(&self.arena, &entry);
        let mut path = core::mem::take(&mut self.path_buf);
        path.clear();
        let target = self.choose_subtree(&bbox, level, &mut path);
        {
            let node = &mut self.arena[target.get()];
            node.children.push(entry);
            node.bbox.extend(&bbox);
        }

        // Split overflowing nodes from the target level upwards.
        let mut level = level as isize;
        while level >= 0 {
            let ni = path[level as usize];
            if self.arena[ni.get()].children.len() > self.max_entries {
                self.split(&path, level as usize);
                level -= 1;
            } else {
                break;
            }
        }

        // Widen the ancestors the split loop did not rebuild.
        for i in 0..=level {
            let ni = path[i as usize];
            self.arena[ni.get()].bbox.extend(&bbox);
        }
        self.path_buf = path;
    }

    /// Descend from the root towards `level`, recording the path. At each
    /// internal node pick the child needing the least enlargement, breaking
    /// ties by the smaller area.
    fn choose_subtree(&self, bbox: &Aabb2D<T>, level: usize, path: &mut Vec<NodeIdx>) -> NodeIdx {
        let mut node = self.root;
        loop {
            path.push(node);
            let n = &self.arena[node.get()];
            if n.leaf || path.len() - 1 == level {
                return node;
            }
            let mut best: Option<(T::Acc, T::Acc, NodeIdx)> = None;
            for child in &n.children {
                let RChild::Node(ci) = child else {
                    unreachable!("internal node holding an item child")
                };
                let cb = self.arena[ci.get()].bbox;
                let child_area = area(&cb);
                let enlargement = enlarged_area(bbox, &cb) - child_area;
                let better = match &best {
                    None => true,
                    Some((be, ba, _)) => {
                        enlargement < *be || (enlargement == *be && child_area < *ba)
                    }
                };
                if better {
                    best = Some((enlargement, child_area, *ci));
                }
            }
            let (_, _, next) = best.expect("internal node with no children");
            node = next;
        }
    }

    /// Split the overflowing node at `level` of the path into two siblings.
    fn split(&mut self, path: &[NodeIdx], level: usize) {
        let ni = path[level];
        let mut children = core::mem::take(&mut self.arena[ni.get()].children);
        let m = self.min_entries;

        Self::choose_split_axis(&self.arena, &mut children, m);
        let (index, left_bbox, right_bbox) = Self::choose_split_index(&self.arena, &children, m);

        let right_children = children.split_off(index);
        let (height, leaf) = {
            let node = &self.arena[ni.get()];
            (node.height, node.leaf)
        };
        let new_idx = self.alloc_node(RNode {
            bbox: right_bbox,
            height,
            leaf,
            children: right_children,
        });
        {
            let node = &mut self.arena[ni.get()];
            node.children = children;
            node.bbox = left_bbox;
        }

        if level > 0 {
            // May overflow the parent; the caller's loop catches that.
            let parent = path[level - 1];
            self.arena[parent.get()].children.push(RChild::Node(new_idx));
        } else {
            self.split_root(ni, new_idx);
        }
    }

    /// Grow the tree by one level: a fresh root adopting both halves.
    pub(crate) fn split_root(&mut self, a: NodeIdx, b: NodeIdx) {
        let height = self.arena[a.get()].height + 1;
        let bbox = union_aabb(self.arena[a.get()].bbox, self.arena[b.get()].bbox);
        let mut children = Vec::with_capacity(2);
        children.push(RChild::Node(a));
        children.push(RChild::Node(b));
        self.root = self.alloc_node(RNode {
            bbox,
            height,
            leaf: false,
            children,
        });
    }

    /// Sort `children` along the axis whose distributions have the smallest
    /// total margin. Both axes are evaluated.
    fn choose_split_axis(arena: &[RNode<T>], children: &mut [RChild<T>], m: usize) {
        let margin_x = Self::all_dist_margin(arena, children, m, 0);
        let margin_y = Self::all_dist_margin(arena, children, m, 1);
        // The y evaluation left the children sorted by y; re-sort only when x won.
        if margin_x < margin_y {
            Self::sort_children(arena, children, 0);
        }
    }

    fn sort_children(arena: &[RNode<T>], children: &mut [RChild<T>], axis: usize) {
        children.sort_by(|a, b| {
            let (a, b) = (Self::child_bbox(arena, a), Self::child_bbox(arena, b));
            let (ka, kb) = if axis == 0 {
                (a.min_x, b.min_x)
            } else {
                (a.min_y, b.min_y)
            };
            ka.partial_cmp(&kb).unwrap_or(core::cmp::Ordering::Equal)
        });
    }

    /// Total margin over every legal split position after sorting by `axis`:
    /// the sum of `margin(left) + margin(right)` for splits leaving at least
    /// `m` children on each side, evaluated incrementally.
    fn all_dist_margin(
        arena: &[RNode<T>],
        children: &mut [RChild<T>],
        m: usize,
        axis: usize,
    ) -> T::Acc {
        Self::sort_children(arena, children, axis);
        let total = children.len();
        let mut left = Self::dist_bbox(arena, &children[..m]);
        let mut right = Self::dist_bbox(arena, &children[total - m..]);
        let mut sum = margin(&left) + margin(&right);
        for child in &children[m..total - m] {
            left.extend(&Self::child_bbox(arena, child));
            sum = sum + margin(&left);
        }
        for child in children[m..total - m].iter().rev() {
            right.extend(&Self::child_bbox(arena, child));
            sum = sum + margin(&right);
        }
        sum
    }

    /// Pick the split position with the least overlap between the two halves,
    /// breaking ties by the smaller combined area. Children must already be
    /// sorted along the split axis. Returns the index and both halves' boxes.
    fn choose_split_index(
        arena: &[RNode<T>],
        children: &[RChild<T>],
        m: usize,
    ) -> (usize, Aabb2D<T>, Aabb2D<T>) {
        let total = children.len();
        // Prefix/suffix unions make every candidate split O(1) to evaluate.
        let mut prefix: Vec<Aabb2D<T>> = Vec::with_capacity(total);
        for child in children {
            let cb = Self::child_bbox(arena, child);
            let acc = match prefix.last() {
                Some(prev) => union_aabb(*prev, cb),
                None => cb,
            };
            prefix.push(acc);
        }
        let mut suffix: Vec<Aabb2D<T>> = Vec::with_capacity(total);
        for child in children.iter().rev() {
            let cb = Self::child_bbox(arena, child);
            let acc = match suffix.last() {
                Some(prev) => union_aabb(cb, *prev),
                None => cb,
            };
            suffix.push(acc);
        }
        suffix.reverse();

        let mut best: Option<(T::Acc, T::Acc, usize)> = None;
        for k in m..=total - m {
            let lb = prefix[k - 1];
            let rb = suffix[k];
            let overlap = intersection_area(&lb, &rb);
            let area_sum = area(&lb) + area(&rb);
            let better = match &best {
                None => true,
                Some((bo, ba, _)) => overlap < *bo || (overlap == *bo && area_sum < *ba),
            };
            if better {
                best = Some((overlap, area_sum, k));
            }
        }
        let (_, _, index) = best.expect("split requires an overflowing node");
        (index, prefix[index - 1], suffix[index])
    }

    /// Walk the root-to-leaf path after a removal: drop nodes left empty and
    /// recompute the bounding boxes of the rest.
    fn condense(&mut self, path: &[NodeIdx]) {
        for i in (0..path.len()).rev() {
            let ni = path[i];
            if self.arena[ni.get()].children.is_empty() {
                if i > 0 {
                    let parent = path[i - 1];
                    let pos = self.arena[parent.get()]
                        .children
                        .iter()
                        .position(|c| matches!(c, RChild::Node(c) if *c == ni))
                        .expect("condensed node missing from its parent");
                    self.arena[parent.get()].children.remove(pos);
                    self.free_node(ni);
                } else {
                    // The root emptied out: back to a fresh tree.
                    self.clear();
                }
            } else {
                let bbox = Self::dist_bbox(&self.arena, &self.arena[ni.get()].children);
                self.arena[ni.get()].bbox = bbox;
            }
        }
    }
}

impl<T: Scalar, P: Copy + Debug> Debug for RTree<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("max_entries", &self.max_entries)
            .field("min_entries", &self.min_entries)
            .field("items", &self.count)
            .field("arena_nodes", &self.arena.len())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl<T: Scalar, P: Copy + Debug> RTree<T, P> {
    /// Assert the structural invariants. `expect_min_fill` is off for trees
    /// that have seen removals: condensing only drops empty nodes, so
    /// underfilled survivors are legal then.
    pub(crate) fn check_invariants(&self, expect_min_fill: bool) {
        let root = self.root;
        let mut seen_slots = alloc::vec::Vec::new();
        let mut stack = alloc::vec![root];
        while let Some(ni) = stack.pop() {
            let node = &self.arena[ni.get()];
            assert_eq!(node.leaf, node.height == 1, "leaves sit at height 1");
            if ni != root {
                assert!(
                    node.children.len() <= self.max_entries,
                    "fan-out above max_entries"
                );
                if expect_min_fill {
                    assert!(
                        node.children.len() >= self.min_entries,
                        "fan-out below min_entries"
                    );
                }
            }
            let tight = Self::dist_bbox(&self.arena, &node.children);
            if !node.children.is_empty() {
                assert_eq!(node.bbox, tight, "bbox must be the tight child union");
            }
            for child in &node.children {
                match child {
                    RChild::Item { slot, bbox } => {
                        assert!(node.leaf, "items only live in leaves");
                        let (stored, _) = self.items[*slot].expect("leaf refers to a dead slot");
                        assert_eq!(*bbox, stored, "cached item bbox out of date");
                        seen_slots.push(*slot);
                    }
                    RChild::Node(ci) => {
                        assert!(!node.leaf, "leaves hold items only");
                        assert_eq!(
                            self.arena[ci.get()].height + 1,
                            node.height,
                            "child height must be one less"
                        );
                        stack.push(*ci);
                    }
                }
            }
        }
        seen_slots.sort_unstable();
        let live: alloc::vec::Vec<usize> = (0..self.items.len())
            .filter(|&i| self.items[i].is_some())
            .collect();
        assert_eq!(seen_slots, live, "every live item in exactly one leaf");
        assert_eq!(self.count, live.len(), "len() tracks the live item count");
    }
}
