//! Cluster-lists container: a 2D tower grid with fixed-size z clusters and
//! explicit cluster-pair neighbor lists.
//!
//! Towers tile the xy plane (halo margin included). Each tower keeps its
//! particles sorted by z and grouped into clusters of `cluster_size`; the
//! last cluster is padded with far-away dummies. A rebuild walks every tower
//! pair within the interaction length in xy and records cluster pairs whose
//! z bounding boxes come within the interaction length: once per pair at the
//! "forward" cluster under Newton-3, once in each direction otherwise.

use rayon::prelude::*;

use crate::error::KernelError;
use crate::functor::Functor;
use crate::math;
use crate::options::{ContainerKind, DataLayout, Newton3, TraversalKind};
use crate::particle::{Ownership, Particle};
use crate::traversal;

use super::IterateBehavior;

/// Metadata of one cluster inside a tower.
///
/// The particle range is implicit: cluster `c` covers tower slots
/// `c * cluster_size ..= c * cluster_size + cluster_size`, of which the
/// first `real` are actual particles and the rest padding.
#[derive(Debug, Clone)]
pub(crate) struct ClusterMeta {
    /// Number of non-dummy particles.
    pub real: usize,
    /// Lowest z among real particles.
    pub z_min: f64,
    /// Highest z among real particles.
    pub z_max: f64,
    /// Interacting clusters as (tower index, cluster index) pairs. Indices
    /// are invalidated wholesale by the next rebuild.
    pub neighbors: Vec<(u32, u32)>,
}

/// One xy column of clusters.
#[derive(Debug, Default)]
pub(crate) struct Tower {
    pub particles: Vec<Particle>,
    pub clusters: Vec<ClusterMeta>,
}

impl Tower {
    fn clear(&mut self) {
        self.particles.clear();
        self.clusters.clear();
    }
}

/// The cluster-lists container.
pub struct ClusterLists {
    box_min: [f64; 3],
    box_max: [f64; 3],
    cutoff: f64,
    skin: f64,
    cluster_size: usize,
    pub(crate) towers: Vec<Tower>,
    pub(crate) towers_per_dim: [usize; 2],
    /// Tower grid origin: box_min minus the halo margin.
    grid_min: [f64; 2],
    tower_side: f64,
    tower_side_recip: f64,
    /// Interaction length measured in towers; write sets of a tower's task
    /// stay within this Chebyshev radius.
    pub(crate) interaction_in_towers: usize,
    lists_newton3: bool,
    lists_valid: bool,
    /// Particles added since the last rebuild; visible to iteration but not
    /// yet clustered.
    pending: Vec<Particle>,
}

impl ClusterLists {
    /// Build an empty container over `[box_min, box_max)`.
    pub fn new(
        box_min: [f64; 3],
        box_max: [f64; 3],
        cutoff: f64,
        skin: f64,
        cluster_size: usize,
    ) -> Self {
        debug_assert!(cluster_size.is_power_of_two());
        let il = cutoff + skin;
        let mut cl = Self {
            box_min,
            box_max,
            cutoff,
            skin,
            cluster_size,
            towers: Vec::new(),
            towers_per_dim: [1, 1],
            grid_min: [box_min[0] - il, box_min[1] - il],
            tower_side: (box_max[0] - box_min[0]).max(box_max[1] - box_min[1]),
            tower_side_recip: 0.0,
            interaction_in_towers: 1,
            lists_newton3: true,
            lists_valid: false,
            pending: Vec::new(),
        };
        cl.tower_side_recip = 1.0 / cl.tower_side;
        cl.towers.push(Tower::default());
        cl
    }

    /// Interaction length: cutoff plus skin.
    pub fn interaction_length(&self) -> f64 {
        self.cutoff + self.skin
    }

    /// Fixed number of particles per cluster.
    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    fn halo_lo(&self) -> [f64; 3] {
        math::sub(self.box_min, [self.interaction_length(); 3])
    }

    fn halo_hi(&self) -> [f64; 3] {
        math::add(self.box_max, [self.interaction_length(); 3])
    }

    /// Tower holding a position, clamped into the grid.
    pub(crate) fn tower_index_for(&self, pos: [f64; 3]) -> usize {
        let mut coord = [0usize; 2];
        for d in 0..2 {
            let idx = ((pos[d] - self.grid_min[d]) * self.tower_side_recip).floor() as i64;
            coord[d] = idx.clamp(0, self.towers_per_dim[d] as i64 - 1) as usize;
        }
        coord[0] + coord[1] * self.towers_per_dim[0]
    }

    /// Insert an owned particle.
    pub fn add_owned(&mut self, p: Particle) -> Result<(), KernelError> {
        if !math::in_box(p.pos, self.box_min, self.box_max) {
            return Err(KernelError::OutOfBounds {
                id: p.id,
                pos: p.pos,
                region: "owned box",
            });
        }
        self.pending.push(p);
        self.lists_valid = false;
        Ok(())
    }

    /// Insert a halo particle.
    pub fn add_halo(&mut self, mut p: Particle) -> Result<(), KernelError> {
        let inside_outer = math::in_box(p.pos, self.halo_lo(), self.halo_hi());
        let inside_owned = math::in_box(p.pos, self.box_min, self.box_max);
        if !inside_outer || inside_owned {
            return Err(KernelError::OutOfBounds {
                id: p.id,
                pos: p.pos,
                region: "halo shell",
            });
        }
        p.ownership = Ownership::Halo;
        self.pending.push(p);
        self.lists_valid = false;
        Ok(())
    }

    /// Find a halo particle with the same id within `skin` and overwrite it
    /// in place, keeping cluster structure intact.
    pub fn update_halo(&mut self, mut p: Particle) -> bool {
        p.ownership = Ownership::Halo;
        let skin_sq = self.skin * self.skin;
        for q in self
            .towers
            .iter_mut()
            .flat_map(|t| t.particles.iter_mut())
            .chain(self.pending.iter_mut())
        {
            if q.is_halo() && q.id == p.id && math::dist_sq(q.pos, p.pos) <= skin_sq {
                *q = p;
                return true;
            }
        }
        false
    }

    /// Remove every halo particle. Invalidates the lists: cluster ranges
    /// shift when storage is compacted.
    pub fn delete_halo_all(&mut self) {
        for tower in &mut self.towers {
            tower.particles.retain(|p| !p.is_halo());
        }
        self.pending.retain(|p| !p.is_halo());
        self.lists_valid = false;
    }

    /// Return owned particles that left the box; clear halos.
    ///
    /// With `keep_lists`, leavers and halos are dummied out in place so the
    /// cluster structure and every neighbor list stay valid.
    pub fn update(&mut self, keep_lists: bool) -> Vec<Particle> {
        let mut leavers = Vec::new();
        if keep_lists {
            for p in self.towers.iter_mut().flat_map(|t| t.particles.iter_mut()) {
                match p.ownership {
                    Ownership::Owned if !math::in_box(p.pos, self.box_min, self.box_max) => {
                        leavers.push(p.clone());
                        p.ownership = Ownership::Dummy;
                    }
                    Ownership::Halo => p.ownership = Ownership::Dummy,
                    _ => {}
                }
            }
            let (stay, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
                .into_iter()
                .filter(|p| !p.is_halo())
                .partition(|p| math::in_box(p.pos, self.box_min, self.box_max));
            leavers.extend(gone);
            self.pending = stay;
            return leavers;
        }

        let mut stay = Vec::new();
        for tower in &mut self.towers {
            for p in std::mem::take(&mut tower.particles) {
                match p.ownership {
                    Ownership::Owned if math::in_box(p.pos, self.box_min, self.box_max) => {
                        stay.push(p)
                    }
                    Ownership::Owned => leavers.push(p),
                    Ownership::Halo | Ownership::Dummy => {}
                }
            }
            tower.clusters.clear();
        }
        for p in std::mem::take(&mut self.pending) {
            match p.ownership {
                Ownership::Owned if math::in_box(p.pos, self.box_min, self.box_max) => stay.push(p),
                Ownership::Owned => leavers.push(p),
                _ => {}
            }
        }
        self.pending = stay;
        self.lists_valid = false;
        leavers
    }

    /// Whether the neighbor lists are valid for the given Newton-3 mode.
    pub fn lists_valid_for(&self, newton3: Newton3) -> bool {
        self.lists_valid && self.pending.is_empty() && self.lists_newton3 == newton3.as_bool()
    }

    /// Rebuild towers, clusters, and neighbor lists for the given mode.
    pub fn rebuild_neighbor_lists(&mut self, newton3: Newton3) {
        let newton3 = newton3.as_bool();
        // 1. Collect everything real.
        let mut all: Vec<Particle> = std::mem::take(&mut self.pending);
        for tower in &mut self.towers {
            all.extend(tower.particles.drain(..).filter(|p| !p.is_dummy()));
            tower.clear();
        }

        // 2. Re-estimate the tower grid from the current density.
        let box_size = math::sub(self.box_max, self.box_min);
        let il = self.interaction_length();
        self.tower_side = Self::estimate_tower_side(all.len(), box_size, self.cluster_size);
        self.tower_side_recip = 1.0 / self.tower_side;
        self.interaction_in_towers = (il * self.tower_side_recip).ceil().max(1.0) as usize;
        for d in 0..2 {
            let extent = box_size[d] + 2.0 * il;
            self.towers_per_dim[d] = ((extent * self.tower_side_recip).ceil() as usize).max(1);
        }
        let num_towers = self.towers_per_dim[0] * self.towers_per_dim[1];
        self.towers.resize_with(num_towers, Tower::default);

        // 3. Sort particles into towers, then by z within each tower.
        let mut binned: Vec<Vec<Particle>> = vec![Vec::new(); num_towers];
        for p in all {
            binned[self.tower_index_for(p.pos)].push(p);
        }
        for (tower, mut bin) in self.towers.iter_mut().zip(binned) {
            bin.sort_unstable_by(|a, b| a.pos[2].total_cmp(&b.pos[2]));
            tower.particles = bin;
        }

        // 4. Build clusters and pad the last one of each tower with dummies.
        // Dummies sit far outside the box, pairwise at least two interaction
        // lengths apart, so no distance check ever reaches them.
        let dummy_spacing = 2.0 * il;
        let dummy_x0 = 1000.0 * self.box_max[0].abs().max(1.0);
        let mut dummy_counter: u64 = 0;
        for tower in &mut self.towers {
            let n = tower.particles.len();
            if n == 0 {
                continue;
            }
            let num_clusters = n.div_ceil(self.cluster_size);
            for c in 0..num_clusters {
                let start = c * self.cluster_size;
                let real = (n - start).min(self.cluster_size);
                tower.clusters.push(ClusterMeta {
                    real,
                    z_min: tower.particles[start].pos[2],
                    z_max: tower.particles[start + real - 1].pos[2],
                    neighbors: Vec::new(),
                });
            }
            let padded = num_clusters * self.cluster_size;
            for _ in n..padded {
                let pos = [
                    dummy_x0 + dummy_counter as f64 * dummy_spacing,
                    self.box_max[1],
                    self.box_max[2],
                ];
                tower
                    .particles
                    .push(Particle::dummy(pos, u64::MAX - dummy_counter));
                dummy_counter += 1;
            }
        }

        // 5. Neighbor lists. Tower geometry is immutable now, so list
        // construction parallelizes over towers against a metadata snapshot.
        let meta: Vec<Vec<(f64, f64)>> = self
            .towers
            .iter()
            .map(|t| t.clusters.iter().map(|c| (c.z_min, c.z_max)).collect())
            .collect();
        let towers_per_dim = self.towers_per_dim;
        let l = self.interaction_in_towers;
        let side = self.tower_side;
        let il_sq = il * il;

        let lists: Vec<Vec<Vec<(u32, u32)>>> = (0..num_towers)
            .into_par_iter()
            .map(|t| {
                build_tower_lists(
                    t,
                    &meta,
                    towers_per_dim,
                    l,
                    side,
                    il_sq,
                    newton3,
                )
            })
            .collect();
        for (tower, tower_lists) in self.towers.iter_mut().zip(lists) {
            for (cluster, list) in tower.clusters.iter_mut().zip(tower_lists) {
                cluster.neighbors = list;
            }
        }

        self.lists_newton3 = newton3;
        self.lists_valid = true;
        tracing::debug!(
            "cluster rebuild: {}x{} towers, side {:.3}, newton3 {}",
            self.towers_per_dim[0],
            self.towers_per_dim[1],
            self.tower_side,
            newton3
        );
    }

    /// Density-based tower side estimate: aim for one cluster of particles
    /// per tower footprint.
    fn estimate_tower_side(num_particles: usize, box_size: [f64; 3], cluster_size: usize) -> f64 {
        let volume = box_size[0] * box_size[1] * box_size[2];
        if num_particles > 0 && volume > 0.0 {
            let density = num_particles as f64 / volume;
            (cluster_size as f64 / density).cbrt()
        } else {
            box_size[0].max(box_size[1])
        }
    }

    /// Visit every particle matching `behavior`.
    pub fn for_each(&self, f: &mut dyn FnMut(&Particle), behavior: IterateBehavior) {
        for p in self
            .towers
            .iter()
            .flat_map(|t| t.particles.iter())
            .chain(self.pending.iter())
        {
            if behavior.matches(p.ownership) {
                f(p);
            }
        }
    }

    /// Visit every particle matching `behavior`, mutably.
    pub fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut Particle), behavior: IterateBehavior) {
        for p in self
            .towers
            .iter_mut()
            .flat_map(|t| t.particles.iter_mut())
            .chain(self.pending.iter_mut())
        {
            if behavior.matches(p.ownership) {
                f(p);
            }
        }
    }

    /// Visit particles inside the half-open region `[lo, hi)`.
    pub fn region_for_each(
        &self,
        lo: [f64; 3],
        hi: [f64; 3],
        f: &mut dyn FnMut(&Particle),
        behavior: IterateBehavior,
    ) {
        self.for_each(
            &mut |p| {
                if math::in_box(p.pos, lo, hi) {
                    f(p);
                }
            },
            behavior,
        );
    }

    /// Run the cluster traversal, rebuilding lists first if they are stale
    /// or were built for the other Newton-3 mode.
    pub fn compute_interactions<F: Functor>(
        &mut self,
        functor: &F,
        traversal_kind: TraversalKind,
        layout: DataLayout,
        newton3: Newton3,
    ) -> Result<(), KernelError> {
        if traversal_kind != TraversalKind::ClusterColoring {
            return Err(KernelError::TraversalIncompatible {
                traversal: traversal_kind,
                container: ContainerKind::ClusterLists,
            });
        }
        if !self.lists_valid_for(newton3) {
            self.rebuild_neighbor_lists(newton3);
        }
        traversal::cluster::cluster_coloring(self, functor, layout, newton3);
        Ok(())
    }
}

/// Neighbor lists for every cluster of tower `t`.
fn build_tower_lists(
    t: usize,
    meta: &[Vec<(f64, f64)>],
    towers_per_dim: [usize; 2],
    l: usize,
    side: f64,
    il_sq: f64,
    newton3: bool,
) -> Vec<Vec<(u32, u32)>> {
    let (nx, ny) = (towers_per_dim[0], towers_per_dim[1]);
    let (tx, ty) = (t % nx, t / nx);
    let mut lists: Vec<Vec<(u32, u32)>> = vec![Vec::new(); meta[t].len()];

    let y_lo = ty.saturating_sub(l);
    let y_hi = (ty + l).min(ny - 1);
    let x_lo = tx.saturating_sub(l);
    let x_hi = (tx + l).min(nx - 1);

    for ny_ in y_lo..=y_hi {
        let dy_towers = (ty as i64 - ny_ as i64).unsigned_abs().saturating_sub(1);
        let dist_y = dy_towers as f64 * side;
        for nx_ in x_lo..=x_hi {
            let n = nx_ + ny_ * nx;
            if newton3 && !forward_under_newton3((tx, ty), (nx_, ny_), towers_per_dim, l) {
                continue;
            }
            let dx_towers = (tx as i64 - nx_ as i64).unsigned_abs().saturating_sub(1);
            let dist_x = dx_towers as f64 * side;
            let dist_xy_sq = dist_x * dist_x + dist_y * dist_y;
            if dist_xy_sq > il_sq {
                continue;
            }
            let same_tower = n == t;
            for (ci, &(a_lo, a_hi)) in meta[t].iter().enumerate() {
                let start = if newton3 && same_tower { ci + 1 } else { 0 };
                for (cj, &(b_lo, b_hi)) in meta[n].iter().enumerate().skip(start) {
                    if !newton3 && same_tower && ci == cj {
                        continue;
                    }
                    let dz = bbox_distance(a_lo, a_hi, b_lo, b_hi);
                    if dist_xy_sq + dz * dz <= il_sq {
                        lists[ci].push((n as u32, cj as u32));
                    }
                }
            }
        }
    }
    lists
}

/// Newton-3 forward rule: a tower records a neighbor tower's clusters iff the
/// neighbor's interaction cell comes after its own, with the 1D tower index
/// breaking ties. This deterministic ordering is what lets the coloring
/// traversal run without data races.
fn forward_under_newton3(
    (tx, ty): (usize, usize),
    (nx_, ny_): (usize, usize),
    towers_per_dim: [usize; 2],
    l: usize,
) -> bool {
    let cells_x = towers_per_dim[0].div_ceil(l);
    let own_cell = (tx / l) + cells_x * (ty / l);
    let nbr_cell = (nx_ / l) + cells_x * (ny_ / l);
    let own_1d = tx + towers_per_dim[0] * ty;
    let nbr_1d = nx_ + towers_per_dim[0] * ny_;
    nbr_cell > own_cell || (nbr_cell == own_cell && nbr_1d >= own_1d)
}

/// Distance between two disjoint 1D bounding boxes; zero if they overlap.
fn bbox_distance(min1: f64, max1: f64, min2: f64, max2: f64) -> f64 {
    if max1 < min2 {
        min2 - max1
    } else if min1 > max2 {
        min1 - max2
    } else {
        0.0
    }
}
