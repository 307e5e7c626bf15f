//! Direct-sum container: one owned cell, six halo shells, all pairs.
//!
//! The ground-truth reference for every other container. No neighbor
//! structure exists; the single traversal enumerates all owned pairs and all
//! owned-halo pairs directly.

use crate::cell::{OwnershipMask, ParticleCell};
use crate::dispatch::PairDispatcher;
use crate::error::KernelError;
use crate::functor::Functor;
use crate::math;
use crate::options::{ContainerKind, DataLayout, Newton3, TraversalKind};
use crate::particle::{Ownership, Particle};

use super::IterateBehavior;

/// Cell 0 holds owned particles; cells `2d+1` / `2d+2` hold the halo shells
/// below / above the box along dimension `d`, assigned by the first
/// out-of-box dimension.
pub struct DirectSum {
    box_min: [f64; 3],
    box_max: [f64; 3],
    #[allow(dead_code)]
    cutoff: f64,
    skin: f64,
    cells: Vec<ParticleCell>,
}

impl DirectSum {
    /// Build an empty direct-sum container over `[box_min, box_max)`.
    pub fn new(box_min: [f64; 3], box_max: [f64; 3], cutoff: f64, skin: f64) -> Self {
        let box_length = math::sub(box_max, box_min);
        let mut cells = Vec::with_capacity(7);
        cells.push(ParticleCell::new(OwnershipMask::OWNED, box_length));
        for _ in 0..6 {
            cells.push(ParticleCell::new(OwnershipMask::HALO, box_length));
        }
        Self {
            box_min,
            box_max,
            cutoff,
            skin,
            cells,
        }
    }

    fn halo_cell_index(&self, pos: [f64; 3]) -> Option<usize> {
        for d in 0..3 {
            if pos[d] < self.box_min[d] {
                return Some(2 * d + 1);
            }
            if pos[d] >= self.box_max[d] {
                return Some(2 * d + 2);
            }
        }
        None
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
        self.cells[0].push(p);
        Ok(())
    }

    /// Insert a halo particle into the shell of its first out-of-box
    /// dimension.
    pub fn add_halo(&mut self, mut p: Particle) -> Result<(), KernelError> {
        match self.halo_cell_index(p.pos) {
            Some(idx) => {
                p.ownership = Ownership::Halo;
                self.cells[idx].push(p);
                Ok(())
            }
            None => Err(KernelError::OutOfBounds {
                id: p.id,
                pos: p.pos,
                region: "halo shell",
            }),
        }
    }

    /// Find a halo particle with the same id within `skin` and overwrite it.
    pub fn update_halo(&mut self, mut p: Particle) -> bool {
        p.ownership = Ownership::Halo;
        let skin_sq = self.skin * self.skin;
        for cell in &mut self.cells[1..] {
            for q in cell.particles_mut() {
                if q.id == p.id && math::dist_sq(q.pos, p.pos) <= skin_sq {
                    *q = p;
                    return true;
                }
            }
        }
        false
    }

    /// Remove every halo particle.
    pub fn delete_halo_all(&mut self) {
        for cell in &mut self.cells[1..] {
            cell.clear();
        }
    }

    /// Return owned particles that left the box and clear all halos.
    pub fn update(&mut self, keep_lists: bool) -> Vec<Particle> {
        let mut leavers = Vec::new();
        if keep_lists {
            for p in self.cells[0].particles_mut() {
                if p.is_owned() && !math::in_box(p.pos, self.box_min, self.box_max) {
                    leavers.push(p.clone());
                    p.ownership = Ownership::Dummy;
                }
            }
        } else {
            let mut stay = Vec::new();
            for p in self.cells[0].take_particles() {
                match p.ownership {
                    Ownership::Owned if math::in_box(p.pos, self.box_min, self.box_max) => {
                        stay.push(p)
                    }
                    Ownership::Owned => leavers.push(p),
                    Ownership::Halo | Ownership::Dummy => {}
                }
            }
            for p in stay {
                self.cells[0].push(p);
            }
        }
        for cell in &mut self.cells[1..] {
            cell.clear();
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
        for cell in &self.cells {
            for p in cell.particles() {
                if behavior.matches(p.ownership) && math::in_box(p.pos, lo, hi) {
                    f(p);
                }
            }
        }
    }

    /// Run the sequential all-pairs traversal.
    pub fn compute_interactions<F: Functor>(
        &mut self,
        functor: &F,
        traversal: TraversalKind,
        layout: DataLayout,
        newton3: Newton3,
    ) -> Result<(), KernelError> {
        if traversal != TraversalKind::DsSequential {
            return Err(KernelError::TraversalIncompatible {
                traversal,
                container: ContainerKind::DirectSum,
            });
        }

        if layout == DataLayout::Soa {
            for cell in &mut self.cells {
                cell.soa.clear();
                let (particles, soa) = cell.split_mut();
                functor.soa_load(particles, soa, 0);
            }
        }

        let disp = PairDispatcher::new(functor, layout, newton3);
        let (owned, halos) = self.cells.split_at_mut(1);
        let owned = &mut owned[0];
        disp.process_cell(owned);
        for halo in halos {
            if halo.is_empty() || owned.is_empty() {
                continue;
            }
            disp.process_cell_pair(owned, halo);
        }

        if layout == DataLayout::Soa {
            for cell in &mut self.cells {
                let (particles, soa) = cell.split_mut();
                functor.soa_extract(particles, soa, 0);
            }
        }
        Ok(())
    }
}
