//! Rebuild policy: when neighbor structures can no longer be trusted.
//!
//! Lists stay valid as long as no particle has moved more than half the skin
//! since they were built; past that, a pair could have entered the cutoff
//! without being listed. The tracker snapshots owned positions at each
//! rebuild and compares against them, with the rebuild frequency as an upper
//! bound on list age.

use std::collections::HashMap;

use crate::container::{ContainerVariant, IterateBehavior};
use crate::math;

/// Displacement- and age-based rebuild trigger.
pub struct RebuildTracker {
    half_skin_sq: f64,
    rebuild_frequency: u64,
    reference: HashMap<u64, [f64; 3]>,
    iterations_since_rebuild: u64,
    initialized: bool,
}

impl RebuildTracker {
    /// Track with the given skin and maximum list age in iterations.
    pub fn new(skin: f64, rebuild_frequency: u64) -> Self {
        let half_skin = skin / 2.0;
        Self {
            half_skin_sq: half_skin * half_skin,
            rebuild_frequency: rebuild_frequency.max(1),
            reference: HashMap::new(),
            iterations_since_rebuild: 0,
            initialized: false,
        }
    }

    /// Whether the coming iteration must rebuild.
    ///
    /// True on the very first check, when `rebuild_frequency` iterations
    /// have passed, or when any owned particle has moved at least half the
    /// skin from its snapshot position. The comparison is inclusive: a
    /// particle sitting exactly at the half-skin displacement already
    /// invalidates the lists' guarantee.
    pub fn needs_rebuild(&self, container: &ContainerVariant) -> bool {
        if !self.initialized {
            return true;
        }
        if self.iterations_since_rebuild >= self.rebuild_frequency {
            return true;
        }
        let mut moved = false;
        container.for_each(
            &mut |p| {
                if moved {
                    return;
                }
                match self.reference.get(&p.id) {
                    Some(&snap) => {
                        if math::dist_sq(p.pos, snap) >= self.half_skin_sq {
                            moved = true;
                        }
                    }
                    // A particle the snapshot has never seen: lists cannot
                    // cover it.
                    None => moved = true,
                }
            },
            IterateBehavior::Owned,
        );
        moved
    }

    /// Snapshot the container's owned positions and reset the age counter.
    pub fn mark_rebuilt(&mut self, container: &ContainerVariant) {
        self.reference.clear();
        container.for_each(
            &mut |p| {
                self.reference.insert(p.id, p.pos);
            },
            IterateBehavior::Owned,
        );
        self.iterations_since_rebuild = 0;
        self.initialized = true;
    }

    /// Count one completed iteration toward the age bound.
    pub fn tick(&mut self) {
        self.iterations_since_rebuild += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ContainerKind;
    use crate::particle::Particle;

    fn container_with_particle(pos: [f64; 3]) -> ContainerVariant {
        let mut c = ContainerVariant::build(
            ContainerKind::LinkedCells,
            [0.0; 3],
            [10.0; 3],
            1.0,
            0.2,
            4,
        );
        c.add_owned(Particle::new(pos, 0)).unwrap();
        c
    }

    #[test]
    fn first_check_always_fires() {
        let c = container_with_particle([5.0; 3]);
        let tracker = RebuildTracker::new(0.2, 10);
        assert!(tracker.needs_rebuild(&c));
    }

    #[test]
    fn fires_at_half_skin_displacement() {
        let mut c = container_with_particle([5.0; 3]);
        let mut tracker = RebuildTracker::new(0.2, 1000);
        tracker.mark_rebuilt(&c);
        assert!(!tracker.needs_rebuild(&c));

        // Two steps of 0.05: cumulative displacement reaches skin/2 exactly.
        for _ in 0..2 {
            c.for_each_mut(&mut |p| p.pos[0] += 0.05, IterateBehavior::Owned);
        }
        assert!(tracker.needs_rebuild(&c), "half-skin displacement is inclusive");
    }

    #[test]
    fn small_drift_does_not_fire() {
        let mut c = container_with_particle([5.0; 3]);
        let mut tracker = RebuildTracker::new(0.2, 1000);
        tracker.mark_rebuilt(&c);
        c.for_each_mut(&mut |p| p.pos[0] += 0.05, IterateBehavior::Owned);
        assert!(!tracker.needs_rebuild(&c));
    }

    #[test]
    fn frequency_bound_fires() {
        let c = container_with_particle([5.0; 3]);
        let mut tracker = RebuildTracker::new(0.2, 3);
        tracker.mark_rebuilt(&c);
        for _ in 0..2 {
            tracker.tick();
            assert!(!tracker.needs_rebuild(&c));
        }
        tracker.tick();
        assert!(tracker.needs_rebuild(&c), "age bound reached");
    }

    #[test]
    fn unseen_particle_fires() {
        let mut c = container_with_particle([5.0; 3]);
        let mut tracker = RebuildTracker::new(0.2, 1000);
        tracker.mark_rebuilt(&c);
        c.add_owned(Particle::new([2.0; 3], 99)).unwrap();
        assert!(tracker.needs_rebuild(&c));
    }
}
