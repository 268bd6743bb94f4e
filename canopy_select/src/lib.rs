// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Select: expected-linear selection primitives.
//!
//! This crate provides the two slice-rearranging building blocks used by the
//! Canopy R-tree bulk loader:
//!
//! - [`quickselect`]: place the k-th smallest element (under a caller-supplied
//!   comparator) at index `k`, with everything left of `k` comparing `<=` it
//!   and everything right comparing `>=` it. No total order is established
//!   inside either side.
//! - [`multi_select`]: rearrange a slice into contiguous groups of at most `n`
//!   elements, unordered within a group but ordered between groups.
//!
//! The selection algorithm is Floyd–Rivest: long ranges first recurse on a
//! narrowed pivot window derived from the range length, then partition with a
//! Hoare-style scan around the element at `k`. Expected running time is linear
//! in the range length.
//!
//! Comparators are `FnMut(&A, &A) -> Ordering` closures, so any keyed ordering
//! works without requiring `Ord` on the element type:
//!
//! ```rust
//! use canopy_select::quickselect;
//!
//! let mut v = [5.0_f64, 1.0, 4.0, 2.0, 3.0];
//! quickselect(&mut v, 2, |a, b| a.partial_cmp(b).unwrap());
//! assert_eq!(v[2], 3.0);
//! assert!(v[..2].iter().all(|x| *x <= 3.0));
//! assert!(v[3..].iter().all(|x| *x >= 3.0));
//! ```
//!
//! This crate is `no_std` and uses `alloc` (for the [`multi_select`] range
//! stack only).

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use core::cmp::Ordering;

/// Ranges longer than this get the Floyd–Rivest pivot-window treatment.
const NARROW_THRESHOLD: usize = 600;

/// Rearrange `slice` so the element at `k` is the one a full sort would put
/// there, with all elements before `k` comparing `<=` it and all elements
/// after comparing `>=` it.
///
/// Does nothing on an empty slice.
pub fn quickselect<A, F>(slice: &mut [A], k: usize, mut cmp: F)
where
    A: Clone,
    F: FnMut(&A, &A) -> Ordering,
{
    if slice.is_empty() {
        return;
    }
    let right = slice.len() - 1;
    quickselect_in(slice, k, 0, right, &mut cmp);
}

/// [`quickselect`] restricted to the inclusive range `[left, right]`.
///
/// Elements outside the range are not inspected or moved. `k` must lie within
/// the range and `right` within the slice.
pub fn quickselect_in<A, F>(slice: &mut [A], k: usize, left: usize, right: usize, mut cmp: F)
where
    A: Clone,
    F: FnMut(&A, &A) -> Ordering,
{
    debug_assert!(left <= k && k <= right && right < slice.len());
    floyd_rivest(slice, k, left, right, &mut cmp);
}

/// Rearrange the whole slice into groups of at most `n` elements, ordered
/// between groups under `cmp` but unordered within each group.
pub fn multi_select<A, F>(slice: &mut [A], n: usize, mut cmp: F)
where
    A: Clone,
    F: FnMut(&A, &A) -> Ordering,
{
    if slice.is_empty() {
        return;
    }
    let right = slice.len() - 1;
    multi_select_in(slice, 0, right, n, &mut cmp);
}

/// [`multi_select`] restricted to the inclusive range `[left, right]`.
///
/// Combines [`quickselect_in`] with binary divide and conquer: the range is
/// split at the nearest group boundary to its midpoint, the boundary element
/// is selected into place, and both halves are processed from an explicit
/// stack.
pub fn multi_select_in<A, F>(slice: &mut [A], left: usize, right: usize, n: usize, mut cmp: F)
where
    A: Clone,
    F: FnMut(&A, &A) -> Ordering,
{
    debug_assert!(n > 0 && left <= right && right < slice.len());
    let mut stack: Vec<(usize, usize)> = Vec::new();
    stack.push((left, right));
    while let Some((left, right)) = stack.pop() {
        if right - left <= n {
            continue;
        }
        // group boundary closest to the middle of the range
        let mid = left + (right - left).div_ceil(2 * n) * n;
        floyd_rivest(slice, mid, left, right, &mut cmp);
        stack.push((left, mid));
        stack.push((mid, right));
    }
}

fn floyd_rivest<A, F>(slice: &mut [A], k: usize, mut left: usize, mut right: usize, cmp: &mut F)
where
    A: Clone,
    F: FnMut(&A, &A) -> Ordering,
{
    while right > left {
        if right - left > NARROW_THRESHOLD {
            // Narrow to a window around the expected pivot position so the
            // partition below works on a nearly sorted-size sample.
            let n = (right - left + 1) as f64;
            let m = (k - left + 1) as f64;
            let z = libm::log(n);
            let s = 0.5 * libm::exp(2.0 * z / 3.0);
            let sign = if m - n / 2.0 < 0.0 { -1.0 } else { 1.0 };
            let sd = 0.5 * libm::sqrt(z * s * (n - s) / n) * sign;
            let kf = k as f64;
            let new_left = libm::fmax(left as f64, libm::floor(kf - m * s / n + sd)) as usize;
            let new_right =
                libm::fmin(right as f64, libm::floor(kf + (n - m) * s / n + sd)) as usize;
            floyd_rivest(slice, k, new_left, new_right, cmp);
        }

        // Hoare partition around the value at k, with sentinel swaps at the
        // range ends so the inner scans cannot run past them.
        let t = slice[k].clone();
        let mut i = left;
        let mut j = right;

        slice.swap(left, k);
        if cmp(&slice[right], &t) == Ordering::Greater {
            slice.swap(left, right);
        }

        while i < j {
            slice.swap(i, j);
            i += 1;
            j -= 1;
            while cmp(&slice[i], &t) == Ordering::Less {
                i += 1;
            }
            while cmp(&slice[j], &t) == Ordering::Greater {
                j -= 1;
            }
        }

        if cmp(&slice[left], &t) == Ordering::Equal {
            slice.swap(left, j);
        } else {
            j += 1;
            slice.swap(j, right);
        }

        if j <= k {
            left = j + 1;
        }
        if k <= j {
            right = j.saturating_sub(1);
            if j == 0 {
                break;
            }
        }
    }
}
