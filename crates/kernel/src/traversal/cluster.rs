//! Tower-colored traversal over the cluster-lists container.
//!
//! AoS mode colors the tower grid with stride `2L+1` per xy dimension
//! (`L` = interaction length in towers): a tower's task writes at most `L`
//! towers away, so same-color towers, separated by more than `2L`, never
//! touch a common particle in either Newton-3 mode. SoA mode expands the
//! cluster-pair lists into per-particle index lists over one gathered buffer
//! and makes a single neighbor-list kernel call; parallelism there lives in
//! the kernel's vector lanes, not in threads.

use std::ops::Range;

use rayon::prelude::*;

use crate::container::cluster::{ClusterLists, Tower};
use crate::dispatch::{DisjointView, PairDispatcher};
use crate::functor::Functor;
use crate::options::{DataLayout, Newton3};
use crate::particle::Particle;
use crate::soa::SoaBuffer;

/// Run the cluster traversal. Lists must already be valid for `newton3`.
pub(crate) fn cluster_coloring<F: Functor>(
    cl: &mut ClusterLists,
    functor: &F,
    layout: DataLayout,
    newton3: Newton3,
) {
    match layout {
        DataLayout::Aos => aos_colored(cl, functor, newton3),
        DataLayout::Soa => soa_lists(cl, functor, newton3),
    }
}

fn aos_colored<F: Functor>(cl: &mut ClusterLists, functor: &F, newton3: Newton3) {
    let disp = PairDispatcher::new(functor, DataLayout::Aos, newton3);
    let stride = 2 * cl.interaction_in_towers + 1;
    let [nx, ny] = cl.towers_per_dim;
    let cluster_size = cl.cluster_size();
    let n3 = newton3.as_bool();

    let view = DisjointView::new(&mut cl.towers);
    for cy in 0..stride {
        for cx in 0..stride {
            let towers_of_color: Vec<usize> = (0..nx * ny)
                .filter(|t| (t % nx) % stride == cx && (t / nx) % stride == cy)
                .collect();
            towers_of_color.par_iter().for_each(|&t| {
                // Safety: same-color towers are at least stride = 2L+1 apart
                // in x and y while a task touches towers within L, so all
                // concurrently borrowed towers are distinct.
                unsafe { process_tower(&view, &disp, t, cluster_size, n3) };
            });
        }
    }
}

/// Interactions of every cluster in tower `t`: intra-cluster pairs plus the
/// cluster's recorded neighbors.
///
/// # Safety
/// Caller guarantees exclusive access to tower `t` and every tower its
/// neighbor lists point to.
unsafe fn process_tower<F: Functor>(
    view: &DisjointView<'_, Tower>,
    disp: &PairDispatcher<'_, F>,
    t: usize,
    cluster_size: usize,
    newton3: bool,
) {
    let tower = view.get_mut(t);
    let num_clusters = tower.clusters.len();
    for ci in 0..num_clusters {
        let a_range = cluster_range(tower, ci, cluster_size);

        // Intra-cluster pairs: once, symmetric, like same-cell pairs.
        disp.aos_slice_symmetric(&mut tower.particles[a_range.clone()]);

        let neighbors = tower.clusters[ci].neighbors.clone();
        for (nt, nc) in neighbors {
            let (nt, nc) = (nt as usize, nc as usize);
            if nt == t {
                let b_range = cluster_range(tower, nc, cluster_size);
                let (a, b) = two_ranges_mut(&mut tower.particles, a_range.clone(), b_range);
                process_cluster_pair(disp, a, b, newton3);
            } else {
                let nbr = view.get_mut(nt);
                let b_range = cluster_range(nbr, nc, cluster_size);
                process_cluster_pair(
                    disp,
                    &mut tower.particles[a_range.clone()],
                    &mut nbr.particles[b_range],
                    newton3,
                );
            }
        }
    }
}

fn process_cluster_pair<F: Functor>(
    disp: &PairDispatcher<'_, F>,
    a: &mut [Particle],
    b: &mut [Particle],
    newton3: bool,
) {
    if newton3 {
        disp.aos_slice_pair_newton3(a, b);
    } else {
        // The reverse direction is issued when the schedule reaches the
        // neighbor's own list entry for this pair.
        disp.aos_slice_pair_one_way(a, b);
    }
}

/// Real-particle range of cluster `c` (padding excluded).
fn cluster_range(tower: &Tower, c: usize, cluster_size: usize) -> Range<usize> {
    let start = c * cluster_size;
    start..start + tower.clusters[c].real
}

/// Two non-overlapping mutable subslices, returned in argument order.
fn two_ranges_mut(
    v: &mut [Particle],
    r1: Range<usize>,
    r2: Range<usize>,
) -> (&mut [Particle], &mut [Particle]) {
    debug_assert!(r1.end <= r2.start || r2.end <= r1.start, "ranges overlap");
    if r1.start <= r2.start {
        let (left, right) = v.split_at_mut(r2.start);
        (&mut left[r1], &mut right[..r2.len()])
    } else {
        let (left, right) = v.split_at_mut(r1.start);
        let r2_slice = &mut left[r2];
        (&mut right[..r1.len()], r2_slice)
    }
}

fn soa_lists<F: Functor>(cl: &mut ClusterLists, functor: &F, newton3: Newton3) {
    let cluster_size = cl.cluster_size();
    let n3 = newton3.as_bool();

    // Gather every tower (padding included, so cluster slots stay aligned)
    // into one buffer.
    let mut buf = SoaBuffer::new();
    let mut offsets = Vec::with_capacity(cl.towers.len());
    for tower in &cl.towers {
        let offset = buf.len();
        offsets.push(offset);
        functor.soa_load(&tower.particles, &mut buf, offset);
    }
    let total = buf.len();

    // Expand cluster-pair lists to per-particle index lists over real slots.
    let mut lists: Vec<Vec<usize>> = vec![Vec::new(); total];
    for (t, tower) in cl.towers.iter().enumerate() {
        for (ci, meta) in tower.clusters.iter().enumerate() {
            let a0 = offsets[t] + ci * cluster_size;
            for x in 0..meta.real {
                if n3 {
                    for y in (x + 1)..meta.real {
                        lists[a0 + x].push(a0 + y);
                    }
                } else {
                    for y in 0..meta.real {
                        if y != x {
                            lists[a0 + x].push(a0 + y);
                        }
                    }
                }
            }
            for &(nt, nc) in &meta.neighbors {
                let real_n = cl.towers[nt as usize].clusters[nc as usize].real;
                let b0 = offsets[nt as usize] + nc as usize * cluster_size;
                for x in 0..meta.real {
                    for y in 0..real_n {
                        lists[a0 + x].push(b0 + y);
                    }
                }
            }
        }
    }

    functor.soa_verlet(&mut buf, &lists, 0, total, n3);

    for (tower, &offset) in cl.towers.iter_mut().zip(&offsets) {
        let n = tower.particles.len();
        functor.soa_extract(&mut tower.particles[..n], &buf, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_ranges_in_either_order() {
        let mut v: Vec<Particle> = (0..10).map(|i| Particle::new([i as f64; 3], i)).collect();
        let (a, b) = two_ranges_mut(&mut v, 0..2, 4..7);
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 3);
        assert_eq!(b[0].id, 4);

        let (a, b) = two_ranges_mut(&mut v, 8..10, 0..3);
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].id, 8);
        assert_eq!(b.len(), 3);
        assert_eq!(b[0].id, 0);
    }
}
