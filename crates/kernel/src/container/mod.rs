//! Spatial containers and the tagged variant dispatching over the family.

pub mod cluster;
pub mod direct_sum;
pub mod linked_cells;

pub use cluster::ClusterLists;
pub use direct_sum::DirectSum;
pub use linked_cells::LinkedCells;

use crate::error::KernelError;
use crate::functor::Functor;
use crate::options::{ContainerKind, DataLayout, Newton3, TraversalKind};
use crate::particle::{Ownership, Particle};

/// Which ownership states an iteration visits. Dummies are never visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterateBehavior {
    /// Owned particles only.
    Owned,
    /// Halo images only.
    Halo,
    /// Owned particles and halo images.
    OwnedOrHalo,
}

impl IterateBehavior {
    /// Whether a particle in state `o` is visited.
    #[inline]
    pub fn matches(self, o: Ownership) -> bool {
        match self {
            IterateBehavior::Owned => o == Ownership::Owned,
            IterateBehavior::Halo => o == Ownership::Halo,
            IterateBehavior::OwnedOrHalo => o != Ownership::Dummy,
        }
    }
}

/// The container family as a tagged variant.
///
/// Every arm implements the same contract; the variant is what lets the
/// engine swap spatial structures between iterations when the tuner commits
/// to a different configuration.
pub enum ContainerVariant {
    /// All-pairs reference container.
    DirectSum(DirectSum),
    /// Uniform cell grid.
    LinkedCells(LinkedCells),
    /// Tower grid with cluster neighbor lists.
    ClusterLists(ClusterLists),
}

impl ContainerVariant {
    /// Build an empty container of the given kind.
    pub fn build(
        kind: ContainerKind,
        box_min: [f64; 3],
        box_max: [f64; 3],
        cutoff: f64,
        skin: f64,
        cluster_size: usize,
    ) -> Self {
        match kind {
            ContainerKind::DirectSum => {
                ContainerVariant::DirectSum(DirectSum::new(box_min, box_max, cutoff, skin))
            }
            ContainerKind::LinkedCells => {
                ContainerVariant::LinkedCells(LinkedCells::new(box_min, box_max, cutoff, skin))
            }
            ContainerKind::ClusterLists => ContainerVariant::ClusterLists(ClusterLists::new(
                box_min,
                box_max,
                cutoff,
                skin,
                cluster_size,
            )),
        }
    }

    /// The variant's kind tag.
    pub fn kind(&self) -> ContainerKind {
        match self {
            ContainerVariant::DirectSum(_) => ContainerKind::DirectSum,
            ContainerVariant::LinkedCells(_) => ContainerKind::LinkedCells,
            ContainerVariant::ClusterLists(_) => ContainerKind::ClusterLists,
        }
    }

    /// Insert an owned particle; the position must lie in the owned box.
    pub fn add_owned(&mut self, p: Particle) -> Result<(), KernelError> {
        match self {
            ContainerVariant::DirectSum(c) => c.add_owned(p),
            ContainerVariant::LinkedCells(c) => c.add_owned(p),
            ContainerVariant::ClusterLists(c) => c.add_owned(p),
        }
    }

    /// Insert a halo particle; the position must lie in the halo shell.
    pub fn add_halo(&mut self, p: Particle) -> Result<(), KernelError> {
        match self {
            ContainerVariant::DirectSum(c) => c.add_halo(p),
            ContainerVariant::LinkedCells(c) => c.add_halo(p),
            ContainerVariant::ClusterLists(c) => c.add_halo(p),
        }
    }

    /// Refresh a halo particle by id and position; returns whether a match
    /// within `skin` was found.
    pub fn update_halo(&mut self, p: Particle) -> bool {
        match self {
            ContainerVariant::DirectSum(c) => c.update_halo(p),
            ContainerVariant::LinkedCells(c) => c.update_halo(p),
            ContainerVariant::ClusterLists(c) => c.update_halo(p),
        }
    }

    /// Remove every halo particle.
    pub fn delete_halo_all(&mut self) {
        match self {
            ContainerVariant::DirectSum(c) => c.delete_halo_all(),
            ContainerVariant::LinkedCells(c) => c.delete_halo_all(),
            ContainerVariant::ClusterLists(c) => c.delete_halo_all(),
        }
    }

    /// Re-establish container invariants after the integrator moved
    /// particles: clears halos and returns owned leavers (raw positions).
    /// With `keep_lists`, leavers are dummied in place instead of removed so
    /// neighbor structures stay valid.
    pub fn update(&mut self, keep_lists: bool) -> Vec<Particle> {
        match self {
            ContainerVariant::DirectSum(c) => c.update(keep_lists),
            ContainerVariant::LinkedCells(c) => c.update(keep_lists),
            ContainerVariant::ClusterLists(c) => c.update(keep_lists),
        }
    }

    /// Visit every particle matching `behavior`.
    pub fn for_each(&self, f: &mut dyn FnMut(&Particle), behavior: IterateBehavior) {
        match self {
            ContainerVariant::DirectSum(c) => c.for_each(f, behavior),
            ContainerVariant::LinkedCells(c) => c.for_each(f, behavior),
            ContainerVariant::ClusterLists(c) => c.for_each(f, behavior),
        }
    }

    /// Visit every particle matching `behavior`, mutably. Callbacks must not
    /// change container membership (positions may drift within the skin).
    pub fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut Particle), behavior: IterateBehavior) {
        match self {
            ContainerVariant::DirectSum(c) => c.for_each_mut(f, behavior),
            ContainerVariant::LinkedCells(c) => c.for_each_mut(f, behavior),
            ContainerVariant::ClusterLists(c) => c.for_each_mut(f, behavior),
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
        match self {
            ContainerVariant::DirectSum(c) => c.region_for_each(lo, hi, f, behavior),
            ContainerVariant::LinkedCells(c) => c.region_for_each(lo, hi, f, behavior),
            ContainerVariant::ClusterLists(c) => c.region_for_each(lo, hi, f, behavior),
        }
    }

    /// Execute a traversal; it must be applicable to this container.
    pub fn compute_interactions<F: Functor>(
        &mut self,
        functor: &F,
        traversal: TraversalKind,
        layout: DataLayout,
        newton3: Newton3,
    ) -> Result<(), KernelError> {
        match self {
            ContainerVariant::DirectSum(c) => {
                c.compute_interactions(functor, traversal, layout, newton3)
            }
            ContainerVariant::LinkedCells(c) => {
                c.compute_interactions(functor, traversal, layout, newton3)
            }
            ContainerVariant::ClusterLists(c) => {
                c.compute_interactions(functor, traversal, layout, newton3)
            }
        }
    }

    /// Regenerate neighbor structures. Only meaningful for list-based
    /// containers; a no-op for the others.
    pub fn rebuild_neighbor_lists(&mut self, newton3: Newton3) {
        match self {
            ContainerVariant::DirectSum(_) | ContainerVariant::LinkedCells(_) => {}
            ContainerVariant::ClusterLists(c) => c.rebuild_neighbor_lists(newton3),
        }
    }

    /// Snapshot every particle (owned and halo). Used when
    /// the engine swaps container kinds between configurations.
    pub fn collect_particles(&mut self) -> (Vec<Particle>, Vec<Particle>) {
        let mut owned = Vec::new();
        let mut halo = Vec::new();
        self.for_each(
            &mut |p| match p.ownership {
                Ownership::Owned => owned.push(p.clone()),
                Ownership::Halo => halo.push(p.clone()),
                Ownership::Dummy => {}
            },
            IterateBehavior::OwnedOrHalo,
        );
        (owned, halo)
    }
}
