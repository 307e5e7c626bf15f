//! Slab-decomposition schedules along the longest grid axis.

use std::sync::Mutex;

use rayon::prelude::*;

use crate::cell::ParticleCell;
use crate::dispatch::{CellGridView, PairDispatcher};
use crate::functor::Functor;

use super::colored::{c08_base_step, index_1d};

/// Axis with the most cell layers.
pub(crate) fn longest_axis(dims: [usize; 3]) -> usize {
    let mut axis = 0;
    for d in 1..3 {
        if dims[d] > dims[axis] {
            axis = d;
        }
    }
    axis
}

/// Cut `layers` into `slabs` contiguous ranges, remainder spread from the
/// front. Every slab gets at least one layer; callers must not ask for more
/// slabs than layers.
pub(crate) fn slab_ranges(layers: usize, slabs: usize) -> Vec<std::ops::Range<usize>> {
    debug_assert!(slabs >= 1 && slabs <= layers);
    let base = layers / slabs;
    let extra = layers % slabs;
    let mut ranges = Vec::with_capacity(slabs);
    let mut start = 0;
    for s in 0..slabs {
        let len = base + usize::from(s < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

fn base_coord(axis: usize, layer: usize, u: usize, v: usize) -> (usize, usize, usize) {
    // (u, v) walk the two non-slicing axes.
    match axis {
        0 => (layer, u, v),
        1 => (u, layer, v),
        _ => (u, v, layer),
    }
}

/// The cells a c08 base step at `base` touches, as sorted linear indices.
/// Used for ordered lock acquisition on slab boundaries.
fn touched_cells(base: (usize, usize, usize), dims: [usize; 3]) -> Vec<usize> {
    let mut touched = Vec::with_capacity(8);
    for dz in 0..2 {
        for dy in 0..2 {
            for dx in 0..2 {
                let (x, y, z) = (base.0 + dx, base.1 + dy, base.2 + dz);
                if x < dims[0] && y < dims[1] && z < dims[2] {
                    touched.push(index_1d(x, y, z, dims));
                }
            }
        }
    }
    touched.sort_unstable();
    touched
}

/// Run one slab: c08 base steps layer by layer. On the slab's first and last
/// layer, where the touched blocks of neighboring slabs interleave, the
/// cell-indexed locks are taken in ascending order before the base step.
///
/// # Safety
/// Exclusive access to interior layers follows from the slab partition;
/// boundary layers are exclusive because every thread that can touch them
/// holds the same cell locks.
unsafe fn run_slab<F: Functor>(
    view: &CellGridView<'_>,
    locks: &[Mutex<()>],
    disp: &PairDispatcher<'_, F>,
    dims: [usize; 3],
    axis: usize,
    range: std::ops::Range<usize>,
    with_locks: bool,
) {
    let (nu, nv) = match axis {
        0 => (dims[1], dims[2]),
        1 => (dims[0], dims[2]),
        _ => (dims[0], dims[1]),
    };
    for layer in range.clone() {
        let boundary = with_locks && (layer == range.start || layer == range.end - 1);
        for v in 0..nv {
            for u in 0..nu {
                let base = base_coord(axis, layer, u, v);
                if boundary {
                    let touched = touched_cells(base, dims);
                    // Ascending index order keeps acquisition deadlock-free
                    // across slabs.
                    let _guards: Vec<_> = touched
                        .iter()
                        .map(|&i| locks[i].lock().expect("cell lock poisoned"))
                        .collect();
                    c08_base_step(view, disp, base, dims);
                } else {
                    c08_base_step(view, disp, base, dims);
                }
            }
        }
    }
}

/// Lock-based sliced traversal: one rayon task per slab, per-cell locks on
/// the boundary layers.
pub(crate) fn sliced<F: Functor>(
    cells: &mut [ParticleCell],
    dims: [usize; 3],
    disp: &PairDispatcher<'_, F>,
    slabs: usize,
) {
    let axis = longest_axis(dims);
    let slabs = slabs.min(dims[axis]).max(1);
    let ranges = slab_ranges(dims[axis], slabs);
    let locks: Vec<Mutex<()>> = (0..cells.len()).map(|_| Mutex::new(())).collect();
    let view = CellGridView::new(cells);
    let need_locks = slabs > 1;
    ranges.par_iter().for_each(|range| {
        // Safety: slabs partition the slicing axis; cross-slab overlap is
        // confined to boundary layers, which run under the lock table.
        unsafe { run_slab(&view, &locks, disp, dims, axis, range.clone(), need_locks) };
    });
}

/// 2-colored sliced traversal: even slabs, then odd slabs, no locks.
///
/// A slab's writes reach at most one layer into its upper neighbor, so slabs
/// two apart never share a cell.
pub(crate) fn sliced_c02<F: Functor>(
    cells: &mut [ParticleCell],
    dims: [usize; 3],
    disp: &PairDispatcher<'_, F>,
    slabs: usize,
) {
    let axis = longest_axis(dims);
    let slabs = slabs.min(dims[axis]).max(1);
    let ranges = slab_ranges(dims[axis], slabs);
    let view = CellGridView::new(cells);
    for parity in 0..2 {
        let same_color: Vec<_> = ranges
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 2 == parity)
            .map(|(_, r)| r.clone())
            .collect();
        same_color.par_iter().for_each(|range| {
            // Safety: same-parity slabs are separated by a full slab, and
            // writes extend at most one layer upward.
            unsafe { run_slab(&view, &[], disp, dims, axis, range.clone(), false) };
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slab_ranges_partition() {
        let ranges = slab_ranges(10, 3);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0], 0..4);
        assert_eq!(ranges[1], 4..7);
        assert_eq!(ranges[2], 7..10);
    }

    #[test]
    fn slab_ranges_one_layer_each() {
        let ranges = slab_ranges(4, 4);
        assert!(ranges.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn longest_axis_picks_max() {
        assert_eq!(longest_axis([3, 9, 4]), 1);
        assert_eq!(longest_axis([5, 5, 6]), 2);
        assert_eq!(longest_axis([5, 5, 5]), 0, "ties break to the first axis");
    }

    #[test]
    fn touched_cells_are_sorted_and_clipped() {
        let dims = [3, 3, 3];
        let t = touched_cells((2, 2, 2), dims);
        assert_eq!(t, vec![index_1d(2, 2, 2, dims)], "corner block clips to one cell");
        let t = touched_cells((0, 0, 0), dims);
        assert_eq!(t.len(), 8);
        assert!(t.windows(2).all(|w| w[0] < w[1]));
    }
}
