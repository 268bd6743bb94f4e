// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of the Canopy R-tree: bulk load, search, remove, and dump.

use canopy_rtree::{Aabb2D, RTree};

fn main() {
    // A 10x10 grid of unit boxes.
    let items: Vec<(Aabb2D<f64>, u32)> = (0..100)
        .map(|i| {
            let (x, y) = ((i % 10) as f64 * 10.0, (i / 10) as f64 * 10.0);
            (Aabb2D::new(x, y, x + 8.0, y + 8.0), i)
        })
        .collect();

    let mut tree: RTree<f64, u32> = RTree::new();
    let ids = tree.load(&items);
    println!("loaded {} items, height {}", tree.len(), tree.height());

    // Query a window in the middle.
    let window = Aabb2D::new(25.0, 25.0, 55.0, 55.0);
    let hits: Vec<u32> = tree.search(window).map(|(_, payload)| payload).collect();
    println!("{} items intersect {:?}", hits.len(), window);

    // Remove the first row and query again.
    for id in &ids[0..10] {
        tree.remove(*id);
    }
    println!(
        "after removing a row: {} items, collides with row 0: {}",
        tree.len(),
        tree.collides(Aabb2D::new(0.0, 0.0, 100.0, 8.0))
    );

    println!("---\n{}", tree.dump());
}
