// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canonical structural dump, used by the test suite to compare trees.
//!
//! The dump enumerates nodes depth-first in stored child order, one line per
//! node or item, indented by depth. It is deterministic and injective on tree
//! shape: two trees are structurally equal exactly when their dumps are
//! byte-equal. Item lines carry only the bounding box, so independently built
//! trees with the same shape compare equal regardless of slot numbering.
//!
//! The format is a debugging aid, not an interchange format; it may change
//! between releases.

use alloc::string::String;
use core::fmt::{Debug, Write};

use crate::tree::{NodeIdx, RChild, RTree};
use crate::types::Scalar;

impl<T: Scalar, P: Copy + Debug> RTree<T, P> {
    /// Render the tree structure as deterministic, indented text.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root, 0, &mut out);
        out
    }

    fn dump_node(&self, ni: NodeIdx, depth: usize, out: &mut String) {
        let node = &self.arena[ni.get()];
        for _ in 0..depth {
            out.push_str("  ");
        }
        let b = &node.bbox;
        let _ = writeln!(
            out,
            "node height={} leaf={} bbox=({:?} {:?} {:?} {:?})",
            node.height, node.leaf, b.min_x, b.min_y, b.max_x, b.max_y
        );
        for child in &node.children {
            match child {
                RChild::Node(ci) => self.dump_node(*ci, depth + 1, out),
                RChild::Item { bbox, .. } => {
                    for _ in 0..=depth {
                        out.push_str("  ");
                    }
                    let _ = writeln!(
                        out,
                        "item bbox=({:?} {:?} {:?} {:?})",
                        bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
                    );
                }
            }
        }
    }
}
