//! Colored base-step schedules over the uniform cell grid.
//!
//! Each schedule partitions base cells into colors such that two base steps
//! of the same color never touch a common cell; colors run in sequence, base
//! steps within a color fan out onto the rayon pool.

use rayon::prelude::*;

use crate::cell::ParticleCell;
use crate::dispatch::{CellGridView, PairDispatcher};
use crate::functor::Functor;
use crate::particle::Particle;

/// Linear index of cell (x, y, z) in a grid of `dims` cells.
#[inline]
pub(crate) fn index_1d(x: usize, y: usize, z: usize, dims: [usize; 3]) -> usize {
    x + dims[0] * (y + dims[1] * z)
}

/// The 13 cross-cell offset pairs of the c08 base step.
///
/// Together with the base cell's self-interaction these cover every
/// neighbor-cell pair of a 2x2x2 block exactly once across all base cells.
const C08_PAIR_OFFSETS: [((usize, usize, usize), (usize, usize, usize)); 13] = [
    ((0, 0, 0), (1, 0, 0)),
    ((0, 0, 0), (0, 1, 0)),
    ((0, 0, 0), (1, 1, 0)),
    ((1, 0, 0), (0, 1, 0)),
    ((0, 0, 0), (0, 0, 1)),
    ((0, 0, 0), (1, 0, 1)),
    ((1, 0, 0), (0, 0, 1)),
    ((0, 0, 0), (0, 1, 1)),
    ((0, 1, 0), (0, 0, 1)),
    ((0, 0, 0), (1, 1, 1)),
    ((1, 0, 0), (0, 1, 1)),
    ((0, 1, 0), (1, 0, 1)),
    ((1, 1, 0), (0, 0, 1)),
];

/// The 13 forward neighbor offsets of the c18 base step (z-major half space).
const C18_FORWARD_OFFSETS: [(i64, i64, i64); 13] = [
    (1, 0, 0),
    (-1, 1, 0),
    (0, 1, 0),
    (1, 1, 0),
    (-1, -1, 1),
    (0, -1, 1),
    (1, -1, 1),
    (-1, 0, 1),
    (0, 0, 1),
    (1, 0, 1),
    (-1, 1, 1),
    (0, 1, 1),
    (1, 1, 1),
];

/// All 26 neighbor offsets, for the one-directional c01 schedule.
fn all_neighbor_offsets() -> impl Iterator<Item = (i64, i64, i64)> {
    (-1..=1).flat_map(move |dz| {
        (-1..=1).flat_map(move |dy| {
            (-1..=1).filter_map(move |dx| {
                if dx == 0 && dy == 0 && dz == 0 {
                    None
                } else {
                    Some((dx, dy, dz))
                }
            })
        })
    })
}

/// Execute one c08 base step at base cell (x, y, z).
///
/// # Safety
/// The caller must guarantee exclusive access to the 2x2x2 block rooted at
/// the base cell (color disjointness or held locks).
pub(crate) unsafe fn c08_base_step<F: Functor>(
    view: &CellGridView<'_>,
    disp: &PairDispatcher<'_, F>,
    (x, y, z): (usize, usize, usize),
    dims: [usize; 3],
) {
    disp.process_cell(view.get_mut(index_1d(x, y, z, dims)));
    for &((ax, ay, az), (bx, by, bz)) in &C08_PAIR_OFFSETS {
        let a = (x + ax, y + ay, z + az);
        let b = (x + bx, y + by, z + bz);
        if a.0 >= dims[0] || a.1 >= dims[1] || a.2 >= dims[2] {
            continue;
        }
        if b.0 >= dims[0] || b.1 >= dims[1] || b.2 >= dims[2] {
            continue;
        }
        let ia = index_1d(a.0, a.1, a.2, dims);
        let ib = index_1d(b.0, b.1, b.2, dims);
        if PairDispatcher::<F>::skippable(view.get(ia), view.get(ib)) {
            continue;
        }
        let (ca, cb) = view.pair_mut(ia, ib);
        disp.process_cell_pair(ca, cb);
    }
}

/// Enumerate all base cells of one color for a given stride.
fn base_cells_of_color(
    dims: [usize; 3],
    stride: [usize; 3],
    color: [usize; 3],
) -> Vec<(usize, usize, usize)> {
    let mut bases = Vec::new();
    let mut z = color[2];
    while z < dims[2] {
        let mut y = color[1];
        while y < dims[1] {
            let mut x = color[0];
            while x < dims[0] {
                bases.push((x, y, z));
                x += stride[0];
            }
            y += stride[1];
        }
        z += stride[2];
    }
    bases
}

/// The classical 8-color c08 traversal. Newton-3 only.
pub(crate) fn c08<F: Functor>(
    cells: &mut [ParticleCell],
    dims: [usize; 3],
    disp: &PairDispatcher<'_, F>,
) {
    let view = CellGridView::new(cells);
    for cz in 0..2 {
        for cy in 0..2 {
            for cx in 0..2 {
                let bases = base_cells_of_color(dims, [2, 2, 2], [cx, cy, cz]);
                bases.par_iter().for_each(|&base| {
                    // Safety: same-color base steps have disjoint 2x2x2
                    // blocks (stride 2 in every dimension).
                    unsafe { c08_base_step(&view, disp, base, dims) };
                });
            }
        }
    }
}

/// The 18-color forward-neighbor traversal. Supports both Newton-3 modes.
pub(crate) fn c18<F: Functor>(
    cells: &mut [ParticleCell],
    dims: [usize; 3],
    disp: &PairDispatcher<'_, F>,
) {
    let view = CellGridView::new(cells);
    for cz in 0..2 {
        for cy in 0..3 {
            for cx in 0..3 {
                let bases = base_cells_of_color(dims, [3, 3, 2], [cx, cy, cz]);
                bases.par_iter().for_each(|&(x, y, z)| {
                    // Safety: the touched set spans [-1,1] in x/y and [0,1]
                    // in z around the base; strides (3,3,2) keep same-color
                    // sets disjoint.
                    unsafe {
                        disp.process_cell(view.get_mut(index_1d(x, y, z, dims)));
                        for &(dx, dy, dz) in &C18_FORWARD_OFFSETS {
                            let nx = x as i64 + dx;
                            let ny = y as i64 + dy;
                            let nz = z as i64 + dz;
                            if nx < 0
                                || ny < 0
                                || nz < 0
                                || nx >= dims[0] as i64
                                || ny >= dims[1] as i64
                                || nz >= dims[2] as i64
                            {
                                continue;
                            }
                            let ib = index_1d(nx as usize, ny as usize, nz as usize, dims);
                            let ia = index_1d(x, y, z, dims);
                            if PairDispatcher::<F>::skippable(view.get(ia), view.get(ib)) {
                                continue;
                            }
                            let (ca, cb) = view.pair_mut(ia, ib);
                            disp.process_cell_pair(ca, cb);
                        }
                    }
                });
            }
        }
    }
}

/// The single-color one-directional traversal. Non-Newton-3 only.
///
/// Every cell is a base step in one parallel pass; writes stay inside the
/// base cell while neighbor data is read from an immutable snapshot taken
/// up front, so no coloring or locking is needed.
pub(crate) fn c01<F: Functor>(
    cells: &mut [ParticleCell],
    dims: [usize; 3],
    disp: &PairDispatcher<'_, F>,
    soa: bool,
) {
    // Snapshot of the read side. Forces in the snapshot are scratch.
    let aos_images: Vec<Vec<Particle>> = if soa {
        Vec::new()
    } else {
        cells.iter().map(|c| c.particles().to_vec()).collect()
    };
    let soa_images: Vec<crate::soa::SoaBuffer> = if soa {
        cells
            .iter()
            .map(|c| crate::soa::SoaBuffer::clone_positions_of(&c.soa))
            .collect()
    } else {
        Vec::new()
    };

    let view = CellGridView::new(cells);
    let all: Vec<(usize, usize, usize)> = base_cells_of_color(dims, [1, 1, 1], [0, 0, 0]);
    all.par_iter().for_each(|&(x, y, z)| {
        let base_idx = index_1d(x, y, z, dims);
        // Safety: each base index occurs exactly once in `all`, and only the
        // base cell is borrowed mutably; neighbors come from the snapshot.
        let base = unsafe { view.get_mut(base_idx) };
        // Halo cells accumulate nothing observable; owned cells pick up
        // their halo pairs from their own base step.
        if base.mask() == crate::cell::OwnershipMask::HALO {
            return;
        }
        disp.process_cell(base);
        for (dx, dy, dz) in all_neighbor_offsets() {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            let nz = z as i64 + dz;
            if nx < 0
                || ny < 0
                || nz < 0
                || nx >= dims[0] as i64
                || ny >= dims[1] as i64
                || nz >= dims[2] as i64
            {
                continue;
            }
            let nbr = index_1d(nx as usize, ny as usize, nz as usize, dims);
            if soa {
                disp.process_pair_one_way_soa(base, &soa_images[nbr]);
            } else {
                disp.process_pair_one_way_aos(base, &aos_images[nbr]);
            }
        }
    });
}
