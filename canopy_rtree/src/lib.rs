// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy R-tree: a bulk-loadable in-memory R-tree over 2D AABBs.
//!
//! Canopy R-tree is a reusable spatial index for point and rectangle data.
//!
//! - Insert, bulk-load, and remove axis-aligned bounding boxes (AABBs) with
//!   user payloads, addressed by stable generational handles.
//! - Query by intersecting rectangle ([`RTree::search`]), test for any overlap
//!   ([`RTree::collides`]), or walk everything ([`RTree::all`]).
//! - Bulk loading packs items into roughly square tiles top-down, producing a
//!   near-optimally filled tree in expected linear time; single insertions use
//!   the classic minimum-enlargement descent with margin-minimizing splits.
//!
//! The tree is height-balanced: all leaves sit at the same depth, every node's
//! bounding box is the tight union of its children, and every node except the
//! root keeps its fan-out between the configured minimum and maximum.
//!
//! It is generic over the scalar type `T` (`f32`, `f64`, or `i64`; see
//! [`Scalar`]) and does not depend on any geometry crate. Metrics use widened
//! accumulators (f32→f64, i64→i128) for robust comparisons.
//!
//! # Example
//!
//! ```rust
//! use canopy_rtree::{Aabb2D, RTree};
//!
//! // Build a tree and add two boxes.
//! let mut tree: RTree<f64, u32> = RTree::new();
//! let id = tree.insert(Aabb2D::new(0.0, 0.0, 10.0, 10.0), 1);
//! tree.insert(Aabb2D::new(5.0, 5.0, 15.0, 15.0), 2);
//!
//! // Query a rectangle overlapping both.
//! let hits: Vec<u32> = tree
//!     .search(Aabb2D::new(6.0, 6.0, 7.0, 7.0))
//!     .map(|(_, payload)| payload)
//!     .collect();
//! assert_eq!(hits.len(), 2);
//!
//! // Remove by handle; stale handles are a no-op.
//! tree.remove(id);
//! tree.remove(id);
//! assert_eq!(tree.len(), 1);
//! ```
//!
//! Bulk loading is the fast path for building from scratch:
//!
//! ```rust
//! use canopy_rtree::{Aabb2D, RTree};
//!
//! let points: Vec<(Aabb2D<f64>, usize)> = (0..100)
//!     .map(|i| {
//!         let (x, y) = ((i % 10) as f64, (i / 10) as f64);
//!         (Aabb2D::new(x, y, x, y), i)
//!     })
//!     .collect();
//!
//! let mut tree: RTree<f64, usize> = RTree::with_max_entries(16);
//! let ids = tree.load(&points);
//! assert_eq!(ids.len(), 100);
//! assert!(tree.collides(Aabb2D::new(3.0, 3.0, 4.0, 4.0)));
//! ```
//!
//! ## Choosing a fan-out
//!
//! [`RTree::new`] uses a maximum of 9 entries per node, a good default for
//! query-heavy use. Higher values (say 16) make bulk loading and memory
//! slightly cheaper at some query cost; 4 is the legal minimum. The minimum
//! fill is always 40% of the maximum.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates. Infinite boxes
//! are fine and behave as "matches everything" regions.
//!
//! This crate is `no_std` and uses `alloc`. It is single-threaded: share a
//! tree across threads only behind external synchronization (`&RTree` queries
//! are safe to run concurrently, as the borrow checker enforces).

#![no_std]

extern crate alloc;

mod bulk;
mod dump;
pub mod tree;
pub mod types;

pub use tree::{ItemId, RTree};
pub use types::{Aabb2D, Scalar};
