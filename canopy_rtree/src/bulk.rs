// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bulk loading: packed tree construction and merging into an existing tree.
//!
//! The builder packs items into roughly square tiles, top-down: it computes
//! the target height and the root fan-out that maximizes bottom-level fill,
//! partitions the items into vertical strips by x, each strip into tiles by
//! y, and recurses per tile. Partitioning uses grouped selection instead of
//! full sorts, so a build is expected linear in the number of items.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

use canopy_select::multi_select_in;

use crate::tree::{ItemId, NodeIdx, RChild, RNode, RTree};
use crate::types::{Aabb2D, Scalar};

fn cmp_min_x<T: Scalar>(a: &(usize, Aabb2D<T>), b: &(usize, Aabb2D<T>)) -> Ordering {
    a.1.min_x.partial_cmp(&b.1.min_x).unwrap_or(Ordering::Equal)
}

fn cmp_min_y<T: Scalar>(a: &(usize, Aabb2D<T>), b: &(usize, Aabb2D<T>)) -> Ordering {
    a.1.min_y.partial_cmp(&b.1.min_y).unwrap_or(Ordering::Equal)
}

impl<T: Scalar, P: Copy + Debug> RTree<T, P> {
    /// Bulk-insert a batch of items. Returns their handles in input order.
    ///
    /// An empty batch is a no-op. A batch smaller than the minimum fill goes
    /// through the one-by-one insertion path. Anything larger is packed into
    /// a fresh subtree and merged: a subtree as tall as the current tree
    /// becomes a sibling under a new root, a shorter one (either way around)
    /// is inserted as a node entry at its matching level.
    pub fn load(&mut self, items: &[(Aabb2D<T>, P)]) -> Vec<ItemId> {
        if items.is_empty() {
            return Vec::new();
        }

        // Allocate item slots up front; the builder only sees (slot, bbox).
        let mut ids = Vec::with_capacity(items.len());
        let mut pairs: Vec<(usize, Aabb2D<T>)> = Vec::with_capacity(items.len());
        for &(aabb, payload) in items {
            let (slot, generation) = self.alloc_item(aabb, payload);
            ids.push(ItemId::new(slot, generation));
            pairs.push((slot, aabb));
        }

        if pairs.len() < self.min_entries {
            for &(slot, bbox) in &pairs {
                let level = (self.height() - 1) as usize;
                self.insert_child(RChild::Item { slot, bbox }, level);
            }
            return ids;
        }

        let right = pairs.len() - 1;
        let built = self.build(&mut pairs, 0, right, 0);

        let old_root = self.root;
        if self.arena[old_root.get()].children.is_empty() {
            // Empty tree: adopt the built subtree as the root.
            self.free_node(old_root);
            self.root = built;
        } else {
            let old_height = self.arena[old_root.get()].height;
            let built_height = self.arena[built.get()].height;
            if old_height == built_height {
                self.split_root(old_root, built);
            } else {
                let small = if old_height < built_height {
                    // The built tree is taller; it becomes the host.
                    self.root = built;
                    old_root
                } else {
                    built
                };
                let small_height = self.arena[small.get()].height;
                let level = (self.height() - small_height - 1) as usize;
                self.insert_child(RChild::Node(small), level);
            }
        }
        ids
    }

    /// Recursively pack `items[left..=right]` into a subtree.
    ///
    /// `height` is 0 on the outermost call; the target height and adjusted
    /// root fan-out are derived from the item count there.
    fn build(
        &mut self,
        items: &mut [(usize, Aabb2D<T>)],
        left: usize,
        right: usize,
        height: u32,
    ) -> NodeIdx {
        let n = right - left + 1;
        let mut m = self.max_entries;

        if n <= m {
            let children: Vec<RChild<T>> = items[left..=right]
                .iter()
                .map(|&(slot, bbox)| RChild::Item { slot, bbox })
                .collect();
            let bbox = Self::dist_bbox(&self.arena, &children);
            return self.alloc_node(RNode {
                bbox,
                height: 1,
                leaf: true,
                children,
            });
        }

        let mut height = height;
        if height == 0 {
            // Target height of the packed tree, then the fan-out of its root
            // that maximizes bottom-level fill.
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "log-of-count arithmetic stays far below u32::MAX"
            )]
            {
                height = libm::ceil(libm::log(n as f64) / libm::log(m as f64)) as u32;
            }
            m = n.div_ceil(m.pow(height - 1));
        }

        let n2 = n.div_ceil(m);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "ceil(sqrt(fan-out)) is a small positive integer"
        )]
        let n1 = n2 * libm::ceil(libm::sqrt(m as f64)) as usize;

        // Vertical strips by x, then square-ish tiles by y within each strip.
        multi_select_in(items, left, right, n1, cmp_min_x);
        let mut children = Vec::new();
        let mut i = left;
        while i <= right {
            let right2 = usize::min(i + n1 - 1, right);
            multi_select_in(items, i, right2, n2, cmp_min_y);
            let mut j = i;
            while j <= right2 {
                let right3 = usize::min(j + n2 - 1, right2);
                let child = self.build(items, j, right3, height - 1);
                children.push(RChild::Node(child));
                j += n2;
            }
            i += n1;
        }
        let bbox = Self::dist_bbox(&self.arena, &children);
        self.alloc_node(RNode {
            bbox,
            height,
            leaf: false,
            children,
        })
    }
}
