//! Dense uniform cell grid with a one-cell halo layer.

use crate::cell::{OwnershipMask, ParticleCell};
use crate::dispatch::PairDispatcher;
use crate::error::KernelError;
use crate::functor::Functor;
use crate::math;
use crate::options::{ContainerKind, DataLayout, Newton3, TraversalKind};
use crate::particle::{Ownership, Particle};
use crate::traversal;
use crate::traversal::colored::index_1d;

use super::IterateBehavior;

/// Linked-cells container: cells of side length at least the interaction
/// length, so every cutoff pair lives in the same or an adjacent cell.
///
/// The grid spans the owned box plus exactly one layer of halo cells on every
/// face. Particle-to-cell assignment floors the position offset; the
/// half-open `[lo, hi)` convention puts boundary-plane particles into the
/// upper cell, and the outermost halo plane absorbs the halo region's upper
/// bound.
pub struct LinkedCells {
    box_min: [f64; 3],
    box_max: [f64; 3],
    cutoff: f64,
    skin: f64,
    pub(crate) cells: Vec<ParticleCell>,
    /// Cells per dimension including the halo layer.
    pub(crate) cells_per_dim: [usize; 3],
    cell_length: [f64; 3],
}

impl LinkedCells {
    /// Build an empty grid over `[box_min, box_max)`.
    pub fn new(box_min: [f64; 3], box_max: [f64; 3], cutoff: f64, skin: f64) -> Self {
        let interaction_length = cutoff + skin;
        let cells_per_dim = Self::cells_per_dim_for(box_min, box_max, interaction_length);
        let mut cell_length = [0.0; 3];
        for d in 0..3 {
            let inner = cells_per_dim[d] - 2;
            cell_length[d] = (box_max[d] - box_min[d]) / inner as f64;
        }

        let total = cells_per_dim.iter().product();
        let mut cells = Vec::with_capacity(total);
        for z in 0..cells_per_dim[2] {
            for y in 0..cells_per_dim[1] {
                for x in 0..cells_per_dim[0] {
                    let halo = x == 0
                        || y == 0
                        || z == 0
                        || x == cells_per_dim[0] - 1
                        || y == cells_per_dim[1] - 1
                        || z == cells_per_dim[2] - 1;
                    let mask = if halo {
                        OwnershipMask::HALO
                    } else {
                        OwnershipMask::OWNED
                    };
                    cells.push(ParticleCell::new(mask, cell_length));
                }
            }
        }
        // Cells were pushed x-fastest, matching index_1d.
        tracing::debug!(
            "linked cells grid: {:?} cells (halo included), cell length {:?}",
            cells_per_dim,
            cell_length
        );

        Self {
            box_min,
            box_max,
            cutoff,
            skin,
            cells,
            cells_per_dim,
            cell_length,
        }
    }

    /// Grid dimensions (halo included) the constructor would pick for a box.
    ///
    /// Exposed so configuration enumeration can check slab-based traversal
    /// applicability without building a container.
    pub fn cells_per_dim_for(
        box_min: [f64; 3],
        box_max: [f64; 3],
        interaction_length: f64,
    ) -> [usize; 3] {
        let mut dims = [0; 3];
        for d in 0..3 {
            let inner = ((box_max[d] - box_min[d]) / interaction_length).floor() as usize;
            dims[d] = inner.max(1) + 2;
        }
        dims
    }

    /// Interaction length: cutoff plus skin.
    pub fn interaction_length(&self) -> f64 {
        self.cutoff + self.skin
    }

    /// Cell coordinate of a position, clamped into the grid.
    fn cell_coord(&self, pos: [f64; 3]) -> [usize; 3] {
        let mut coord = [0; 3];
        for d in 0..3 {
            let rel = (pos[d] - self.box_min[d]) / self.cell_length[d];
            let idx = rel.floor() as i64 + 1;
            coord[d] = idx.clamp(0, self.cells_per_dim[d] as i64 - 1) as usize;
        }
        coord
    }

    fn cell_index(&self, pos: [f64; 3]) -> usize {
        let c = self.cell_coord(pos);
        index_1d(c[0], c[1], c[2], self.cells_per_dim)
    }

    fn halo_lo(&self) -> [f64; 3] {
        let il = self.interaction_length();
        math::sub(self.box_min, [il; 3])
    }

    fn halo_hi(&self) -> [f64; 3] {
        let il = self.interaction_length();
        math::add(self.box_max, [il; 3])
    }

    /// Insert an owned particle. The position must lie inside the owned box.
    pub fn add_owned(&mut self, p: Particle) -> Result<(), KernelError> {
        if !math::in_box(p.pos, self.box_min, self.box_max) {
            return Err(KernelError::OutOfBounds {
                id: p.id,
                pos: p.pos,
                region: "owned box",
            });
        }
        let idx = self.cell_index(p.pos);
        self.cells[idx].push(p);
        Ok(())
    }

    /// Insert a halo particle. The position must lie inside the halo shell.
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
        let idx = self.cell_index(p.pos);
        self.cells[idx].push(p);
        Ok(())
    }

    /// Find a halo particle with the same id within `skin` of `p.pos` and
    /// overwrite it. Returns whether a match was found.
    pub fn update_halo(&mut self, mut p: Particle) -> bool {
        p.ownership = Ownership::Halo;
        let skin_sq = self.skin * self.skin;
        let lo = self.cell_coord(math::sub(p.pos, [self.skin; 3]));
        let hi = self.cell_coord(math::add(p.pos, [self.skin; 3]));
        for z in lo[2]..=hi[2] {
            for y in lo[1]..=hi[1] {
                for x in lo[0]..=hi[0] {
                    let idx = index_1d(x, y, z, self.cells_per_dim);
                    for q in self.cells[idx].particles_mut() {
                        if q.is_halo() && q.id == p.id && math::dist_sq(q.pos, p.pos) <= skin_sq {
                            *q = p;
                            return true;
                        }
                    }
                }
            }
        }
        tracing::debug!("update_halo found no match for particle {}", p.id);
        false
    }

    /// Remove every halo particle.
    pub fn delete_halo_all(&mut self) {
        for cell in &mut self.cells {
            if cell.mask() == OwnershipMask::HALO {
                cell.clear();
            }
        }
    }

    /// Re-bin all particles, returning the owned ones that left the box.
    ///
    /// With `keep_lists` the cell assignment is left untouched so downstream
    /// Verlet-style structures stay valid: leavers are marked dummy in place
    /// and halo particles are cleared.
    pub fn update(&mut self, keep_lists: bool) -> Vec<Particle> {
        let mut leavers = Vec::new();
        if keep_lists {
            for cell in &mut self.cells {
                if cell.mask() == OwnershipMask::HALO {
                    cell.clear();
                    continue;
                }
                for p in cell.particles_mut() {
                    if p.is_owned() && !math::in_box(p.pos, self.box_min, self.box_max) {
                        leavers.push(p.clone());
                        p.ownership = Ownership::Dummy;
                    }
                }
            }
            return leavers;
        }

        let mut stay = Vec::new();
        for cell in &mut self.cells {
            for p in cell.take_particles() {
                match p.ownership {
                    Ownership::Owned if math::in_box(p.pos, self.box_min, self.box_max) => {
                        stay.push(p)
                    }
                    Ownership::Owned => leavers.push(p),
                    // Halos are rebuilt from scratch, dummies evaporate.
                    Ownership::Halo | Ownership::Dummy => {}
                }
            }
        }
        for p in stay {
            let idx = self.cell_index(p.pos);
            self.cells[idx].push(p);
        }
        leavers
    }

    /// Visit every particle matching `behavior`.
    pub fn for_each(&self, f: &mut dyn FnMut(&Particle), behavior: IterateBehavior) {
        for cell in &self.cells {
            for p in cell.particles() {
                if behavior.matches(p.ownership) {
                    f(p);
                }
            }
        }
    }

    /// Visit every particle matching `behavior`, mutably.
    pub fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut Particle), behavior: IterateBehavior) {
        for cell in &mut self.cells {
            for p in cell.particles_mut() {
                if behavior.matches(p.ownership) {
                    f(p);
                }
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
        let clo = self.cell_coord(lo);
        let chi = self.cell_coord(hi);
        for z in clo[2]..=chi[2] {
            for y in clo[1]..=chi[1] {
                for x in clo[0]..=chi[0] {
                    let idx = index_1d(x, y, z, self.cells_per_dim);
                    for p in self.cells[idx].particles() {
                        if behavior.matches(p.ownership) && math::in_box(p.pos, lo, hi) {
                            f(p);
                        }
                    }
                }
            }
        }
    }

    /// Run a traversal with the given functor.
    pub fn compute_interactions<F: Functor>(
        &mut self,
        functor: &F,
        traversal: TraversalKind,
        layout: DataLayout,
        newton3: Newton3,
    ) -> Result<(), KernelError> {
        if traversal.compatible_container() != ContainerKind::LinkedCells {
            return Err(KernelError::TraversalIncompatible {
                traversal,
                container: ContainerKind::LinkedCells,
            });
        }

        if layout == DataLayout::Soa {
            self.load_soa(functor);
        }

        let disp = PairDispatcher::new(functor, layout, newton3);
        let dims = self.cells_per_dim;
        let threads = rayon::current_num_threads();
        match traversal {
            TraversalKind::C01 => {
                traversal::colored::c01(&mut self.cells, dims, &disp, layout == DataLayout::Soa)
            }
            TraversalKind::C08 => traversal::colored::c08(&mut self.cells, dims, &disp),
            TraversalKind::C18 => traversal::colored::c18(&mut self.cells, dims, &disp),
            TraversalKind::Sliced => {
                traversal::sliced::sliced(&mut self.cells, dims, &disp, threads)
            }
            TraversalKind::SlicedC02 => {
                traversal::sliced::sliced_c02(&mut self.cells, dims, &disp, threads)
            }
            _ => unreachable!("compatibility checked above"),
        }

        if layout == DataLayout::Soa {
            self.extract_soa(functor);
        }
        Ok(())
    }

    fn load_soa<F: Functor>(&mut self, functor: &F) {
        use rayon::prelude::*;
        self.cells.par_iter_mut().for_each(|cell| {
            cell.soa.clear();
            let (particles, soa) = cell.split_mut();
            functor.soa_load(particles, soa, 0);
        });
    }

    fn extract_soa<F: Functor>(&mut self, functor: &F) {
        use rayon::prelude::*;
        self.cells.par_iter_mut().for_each(|cell| {
            let (particles, soa) = cell.split_mut();
            functor.soa_extract(particles, soa, 0);
        });
    }
}
