//! Self-tuning short-range pairwise interaction engine.
//!
//! The engine evaluates pairwise particle interactions over a spatial
//! container whose variant, traversal schedule, data layout, and Newton-3
//! mode are picked empirically at run time: the tuner samples every
//! applicable combination for a fixed number of iterations, commits to the
//! fastest, and re-tunes at a fixed interval.
//!
//! Within one traversal the order in which distinct pairs are visited is
//! unspecified and the force reduction order depends on the worker count:
//! results are correct to floating-point reassociation, but bit-identical
//! reproducibility across thread counts is not guaranteed.
//!
//! # Modules
//! - [`particle`] -- particle record and ownership states.
//! - [`soa`] -- structure-of-arrays staging buffer.
//! - [`cell`] -- particle cell with SoA buffer and ownership mask.
//! - [`functor`] -- the force-law capability surface.
//! - [`options`] -- option enums and the `Configuration` tuple.
//! - [`container`] -- DirectSum, LinkedCells, ClusterLists, and the variant.
//! - [`traversal`] -- colored, sliced, and cluster schedules.
//! - [`tuner`] -- the sampling/committing auto-tuner.
//! - [`rebuild`] -- skin-based neighbor-list invalidation.
//! - [`halo`] -- periodic wrap and halo-image generation.
//! - [`error`] -- error kinds.

#![warn(missing_docs)]

pub mod cell;
pub mod container;
mod dispatch;
pub mod error;
pub mod functor;
pub mod halo;
pub mod math;
pub mod options;
pub mod particle;
pub mod rebuild;
pub mod soa;
pub mod traversal;
pub mod tuner;

pub use container::{ContainerVariant, IterateBehavior};
pub use error::KernelError;
pub use functor::Functor;
pub use options::{
    Configuration, ContainerKind, DataLayout, Newton3, SelectorStrategy, TraversalKind,
};
pub use particle::{Ownership, Particle};
pub use soa::SoaBuffer;
pub use tuner::{AutoTuner, TunerOptions};

use std::time::Instant;

use rebuild::RebuildTracker;

// ---------------------------------------------------------------------------
// Simulator options
// ---------------------------------------------------------------------------

/// Geometric and rebuild options of a simulation domain.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SimulatorOptions {
    /// Lower corner of the owned box.
    pub box_min: [f64; 3],
    /// Upper corner of the owned box (exclusive).
    pub box_max: [f64; 3],
    /// Force cutoff radius.
    pub cutoff: f64,
    /// Skin contribution per time step; the total skin is this times the
    /// rebuild frequency.
    pub skin_per_timestep: f64,
    /// Upper bound on neighbor-list age, in iterations.
    pub rebuild_frequency: u64,
    /// Particles per cluster in the cluster-lists container.
    #[serde(default = "default_cluster_size")]
    pub cluster_size: usize,
}

fn default_cluster_size() -> usize {
    4
}

impl SimulatorOptions {
    /// Total skin distance tracked by neighbor structures.
    pub fn skin(&self) -> f64 {
        self.skin_per_timestep * self.rebuild_frequency as f64
    }

    /// Cutoff plus skin.
    pub fn interaction_length(&self) -> f64 {
        self.cutoff + self.skin()
    }

    /// Check the dimensional invariants.
    pub fn validate(&self) -> Result<(), KernelError> {
        for d in 0..3 {
            if self.box_max[d] <= self.box_min[d] {
                return Err(KernelError::InvalidOptions(format!(
                    "box_max must exceed box_min componentwise, got {:?} / {:?}",
                    self.box_min, self.box_max
                )));
            }
        }
        if self.cutoff <= 0.0 {
            return Err(KernelError::InvalidOptions(format!(
                "cutoff must be positive, got {}",
                self.cutoff
            )));
        }
        if self.skin_per_timestep < 0.0 {
            return Err(KernelError::InvalidOptions(format!(
                "skin_per_timestep must be non-negative, got {}",
                self.skin_per_timestep
            )));
        }
        if self.rebuild_frequency == 0 {
            return Err(KernelError::InvalidOptions(
                "rebuild_frequency must be at least 1".to_string(),
            ));
        }
        if !self.cluster_size.is_power_of_two() {
            return Err(KernelError::InvalidOptions(format!(
                "cluster_size must be a power of two, got {}",
                self.cluster_size
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Simulator -- the tuned engine facade
// ---------------------------------------------------------------------------

/// The auto-tuned interaction engine.
///
/// Owns the container variant, the tuner, and the rebuild tracker. Each
/// [`Simulator::compute_interactions`] call asks the tuner for the next
/// configuration, swaps the container if the configuration demands a
/// different spatial structure, rebuilds neighbor structures when the policy
/// fires, runs the timed traversal (SoA load and extract included in the
/// measurement), and feeds the sample back.
pub struct Simulator {
    options: SimulatorOptions,
    container: ContainerVariant,
    tuner: AutoTuner,
    rebuild: RebuildTracker,
    /// Leavers from the most recent `update`, kept for idempotent collection.
    leavers: Vec<Particle>,
    iteration: u64,
    rebuild_count: u64,
}

impl Simulator {
    /// Build an engine whose tuner enumerates the allowed option sets.
    pub fn new(options: SimulatorOptions, tuner_options: TunerOptions) -> Result<Self, KernelError> {
        options.validate()?;
        let lc_dims = container::LinkedCells::cells_per_dim_for(
            options.box_min,
            options.box_max,
            options.interaction_length(),
        );
        let tuner = AutoTuner::from_options(&tuner_options, lc_dims, rayon::current_num_threads())?;
        Ok(Self::with_tuner(options, tuner))
    }

    /// Build an engine over an explicit configuration list. The entry point
    /// for externally ordered candidate sets.
    pub fn with_configurations(
        options: SimulatorOptions,
        configurations: Vec<Configuration>,
        selector: SelectorStrategy,
        max_samples: usize,
        tuning_interval: u64,
    ) -> Result<Self, KernelError> {
        options.validate()?;
        let tuner = AutoTuner::new(configurations, selector, max_samples, tuning_interval)?;
        Ok(Self::with_tuner(options, tuner))
    }

    fn with_tuner(options: SimulatorOptions, tuner: AutoTuner) -> Self {
        let first = tuner.current_config();
        let container = ContainerVariant::build(
            first.container,
            options.box_min,
            options.box_max,
            options.cutoff,
            options.skin(),
            options.cluster_size,
        );
        let rebuild = RebuildTracker::new(options.skin(), options.rebuild_frequency);
        tracing::info!(
            "engine ready: {} candidate configurations, starting with {}",
            tuner.num_configurations(),
            first
        );
        Self {
            options,
            container,
            tuner,
            rebuild,
            leavers: Vec::new(),
            iteration: 0,
            rebuild_count: 0,
        }
    }

    /// The domain options the engine was built with.
    pub fn options(&self) -> &SimulatorOptions {
        &self.options
    }

    /// The configuration the next iteration will run with (pending
    /// capability checks).
    pub fn current_config(&self) -> Configuration {
        self.tuner.current_config()
    }

    /// Completed `compute_interactions` calls.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Whether the tuner is still sampling.
    pub fn is_tuning(&self) -> bool {
        self.tuner.is_tuning()
    }

    /// Insert an owned particle.
    pub fn add_owned(&mut self, p: Particle) -> Result<(), KernelError> {
        self.container.add_owned(p)
    }

    /// Insert a halo particle.
    pub fn add_halo(&mut self, p: Particle) -> Result<(), KernelError> {
        self.container.add_halo(p)
    }

    /// Refresh a halo particle by id and position.
    pub fn update_halo(&mut self, p: Particle) -> bool {
        self.container.update_halo(p)
    }

    /// Remove every halo particle.
    pub fn delete_halo_all(&mut self) {
        self.container.delete_halo_all()
    }

    /// Re-establish container invariants, returning owned leavers with their
    /// raw (outside-the-box) positions. Halo particles are cleared.
    pub fn update(&mut self) -> Vec<Particle> {
        let leavers = self.container.update(false);
        self.leavers = leavers.clone();
        leavers
    }

    /// Like [`Simulator::update`], but keeps neighbor structures valid by
    /// dummying leavers in place.
    pub fn update_keeping_lists(&mut self) -> Vec<Particle> {
        let leavers = self.container.update(true);
        self.leavers = leavers.clone();
        leavers
    }

    /// Leavers of the most recent `update`; idempotent between updates and
    /// empty before the first.
    pub fn collect_leavers(&self) -> Vec<Particle> {
        self.leavers.clone()
    }

    /// Owned particles inside `[lo, hi)`, copied and marked halo, for a
    /// neighbor domain's shell.
    pub fn collect_halo_for(&self, lo: [f64; 3], hi: [f64; 3]) -> Vec<Particle> {
        let mut out = Vec::new();
        self.container.region_for_each(
            lo,
            hi,
            &mut |p| {
                let mut copy = p.clone();
                copy.ownership = Ownership::Halo;
                out.push(copy);
            },
            IterateBehavior::Owned,
        );
        out
    }

    /// Bulk halo insertion for the exchange layer. Out-of-shell particles
    /// are skipped, their errors returned; the rest are inserted.
    pub fn add_halo_bulk(&mut self, particles: Vec<Particle>) -> Vec<KernelError> {
        let mut rejected = Vec::new();
        for p in particles {
            if let Err(e) = self.container.add_halo(p) {
                rejected.push(e);
            }
        }
        if !rejected.is_empty() {
            tracing::debug!("add_halo_bulk rejected {} particles", rejected.len());
        }
        rejected
    }

    /// Mirror owned particles near periodic faces into the opposite halo
    /// shells. Returns the number of images created.
    pub fn exchange_periodic_halo(&mut self) -> usize {
        let width = self.options.interaction_length();
        let (box_min, box_max) = (self.options.box_min, self.options.box_max);
        let mut images = Vec::new();
        self.container.for_each(
            &mut |p| images.extend(halo::periodic_images(p, box_min, box_max, width)),
            IterateBehavior::Owned,
        );
        let count = images.len();
        for image in images {
            // Images of in-box particles land in the shell by construction.
            if self.container.update_halo(image.clone()) {
                continue;
            }
            self.container
                .add_halo(image)
                .expect("periodic image outside halo shell");
        }
        count
    }

    /// Visit every particle matching `behavior`.
    pub fn for_each(&self, f: &mut dyn FnMut(&Particle), behavior: IterateBehavior) {
        self.container.for_each(f, behavior)
    }

    /// Visit every particle matching `behavior`, mutably. The callback must
    /// not change container membership.
    pub fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut Particle), behavior: IterateBehavior) {
        self.container.for_each_mut(f, behavior)
    }

    /// Visit particles inside the half-open region `[lo, hi)`.
    pub fn region_for_each(
        &self,
        lo: [f64; 3],
        hi: [f64; 3],
        f: &mut dyn FnMut(&Particle),
        behavior: IterateBehavior,
    ) {
        self.container.region_for_each(lo, hi, f, behavior)
    }

    /// Whether the next iteration will rebuild: the tuner is about to switch
    /// containers, or the rebuild policy is due. Always true before the
    /// first iteration.
    pub fn will_rebuild(&self) -> bool {
        self.tuner.will_rebuild() || self.rebuild.needs_rebuild(&self.container)
    }

    /// Force a neighbor-structure rebuild with the current configuration's
    /// Newton-3 mode.
    pub fn rebuild_neighbor_lists(&mut self) {
        let config = self.tuner.current_config();
        self.container.rebuild_neighbor_lists(config.newton3);
        self.rebuild.mark_rebuilt(&self.container);
        self.rebuild_count += 1;
    }

    /// One engine iteration: tuner query, container swap, rebuild check,
    /// timed traversal, sample feedback. Returns whether the tuner is still
    /// sampling afterwards.
    pub fn compute_interactions<F: Functor>(&mut self, functor: &F) -> Result<bool, KernelError> {
        self.iteration += 1;

        let relevant = functor.is_relevant_for_tuning();
        let config = if relevant {
            self.tuner
                .next_config(functor.allows_newton3(), functor.allows_non_newton3())?
        } else {
            self.tuner.current_config()
        };

        self.ensure_container(config.container);
        if self.rebuild.needs_rebuild(&self.container) {
            self.container.rebuild_neighbor_lists(config.newton3);
            self.rebuild.mark_rebuilt(&self.container);
            self.rebuild_count += 1;
        }

        // The measurement spans SoA load, traversal, and extract: that is
        // the cost the tuner compares across layouts.
        let start = Instant::now();
        self.container
            .compute_interactions(functor, config.traversal, config.layout, config.newton3)?;
        let elapsed = start.elapsed();

        if relevant {
            self.tuner.add_sample(elapsed);
        }
        self.rebuild.tick();
        Ok(self.tuner.is_tuning())
    }

    /// Swap the spatial structure when the configuration asks for a kind the
    /// engine does not currently hold. Owned particles that drifted out of
    /// the box since the last update become leavers here, exactly as an
    /// `update` would have classified them.
    fn ensure_container(&mut self, kind: ContainerKind) {
        if self.container.kind() == kind {
            return;
        }
        tracing::debug!("container swap: {:?} -> {:?}", self.container.kind(), kind);
        let (owned, halo) = self.container.collect_particles();
        let mut next = ContainerVariant::build(
            kind,
            self.options.box_min,
            self.options.box_max,
            self.options.cutoff,
            self.options.skin(),
            self.options.cluster_size,
        );
        for p in owned {
            if math::in_box(p.pos, self.options.box_min, self.options.box_max) {
                next.add_owned(p).expect("in-box insertion cannot fail");
            } else {
                // Drifted out since the last update: classify as a leaver,
                // the same way an update would have.
                self.leavers.push(p);
            }
        }
        for p in halo {
            if next.add_halo(p).is_err() {
                tracing::debug!("dropping halo particle outside the new container's shell");
            }
        }
        self.container = next;
        // The new structure has no valid neighbor data yet.
        self.rebuild = RebuildTracker::new(self.options.skin(), self.options.rebuild_frequency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SimulatorOptions {
        SimulatorOptions {
            box_min: [0.0; 3],
            box_max: [10.0; 3],
            cutoff: 1.0,
            skin_per_timestep: 0.02,
            rebuild_frequency: 10,
            cluster_size: 4,
        }
    }

    #[test]
    fn options_validation() {
        assert!(options().validate().is_ok());

        let mut bad = options();
        bad.box_max = [0.0; 3];
        assert!(bad.validate().is_err());

        let mut bad = options();
        bad.cutoff = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = options();
        bad.cluster_size = 3;
        assert!(bad.validate().is_err());

        let mut bad = options();
        bad.rebuild_frequency = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn skin_is_per_timestep_times_frequency() {
        let o = options();
        assert!((o.skin() - 0.2).abs() < 1e-15);
        assert!((o.interaction_length() - 1.2).abs() < 1e-15);
    }

    #[test]
    fn first_container_matches_first_configuration() {
        let sim = Simulator::new(options(), TunerOptions::default()).unwrap();
        assert_eq!(
            sim.current_config().container,
            ContainerKind::DirectSum,
            "enumeration order starts at DirectSum"
        );
        assert!(sim.will_rebuild(), "first iteration always rebuilds");
        assert_eq!(sim.iteration(), 0);
    }

    #[test]
    fn collect_halo_for_marks_copies() {
        let mut sim = Simulator::new(options(), TunerOptions::default()).unwrap();
        sim.add_owned(Particle::new([0.5, 5.0, 5.0], 1)).unwrap();
        let out = sim.collect_halo_for([0.0, 0.0, 0.0], [1.0, 10.0, 10.0]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ownership, Ownership::Halo);
        // The original stays owned.
        let mut owned = 0;
        sim.for_each(&mut |_| owned += 1, IterateBehavior::Owned);
        assert_eq!(owned, 1);
    }

    #[test]
    fn leaver_collection_is_idempotent() {
        let mut sim = Simulator::new(options(), TunerOptions::default()).unwrap();
        sim.add_owned(Particle::new([9.9, 5.0, 5.0], 1)).unwrap();
        assert!(sim.collect_leavers().is_empty(), "empty before any update");

        sim.for_each_mut(&mut |p| p.pos[0] = 10.2, IterateBehavior::Owned);
        let leavers = sim.update();
        assert_eq!(leavers.len(), 1);
        assert_eq!(sim.collect_leavers().len(), 1);
        assert_eq!(sim.collect_leavers().len(), 1, "idempotent");
    }
}
