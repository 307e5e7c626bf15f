//! The update contract, checked across all container kinds: remaining owned
//! particles lie inside the box, leavers outside, and nothing is lost.

mod common;

use std::collections::HashSet;

use kernel::{
    math, ContainerKind, ContainerVariant, IterateBehavior, Particle,
};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

const BOX_MIN: [f64; 3] = [0.0; 3];
const BOX_MAX: [f64; 3] = [8.0; 3];

fn all_kinds() -> [ContainerKind; 3] {
    [
        ContainerKind::DirectSum,
        ContainerKind::LinkedCells,
        ContainerKind::ClusterLists,
    ]
}

fn filled_container(kind: ContainerKind, n: usize, seed: u64) -> ContainerVariant {
    let mut c = ContainerVariant::build(kind, BOX_MIN, BOX_MAX, 1.0, 0.2, 4);
    for p in common::random_particles(n, seed, BOX_MIN, BOX_MAX) {
        c.add_owned(p).unwrap();
    }
    c
}

#[test]
fn update_partitions_the_owned_set() {
    for kind in all_kinds() {
        let mut c = filled_container(kind, 200, 21);
        c.add_halo(Particle::new([-0.5, 4.0, 4.0], 10_000)).unwrap();

        // Kick a random subset out of the box.
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(99);
        let mut kicked = HashSet::new();
        c.for_each_mut(
            &mut |p| {
                if rng.gen_bool(0.2) {
                    p.pos[0] += 8.5;
                    kicked.insert(p.id);
                }
            },
            IterateBehavior::Owned,
        );

        let leavers = c.update(false);

        let leaver_ids: HashSet<u64> = leavers.iter().map(|p| p.id).collect();
        assert_eq!(leaver_ids, kicked, "{kind:?}: exactly the kicked particles leave");
        for p in &leavers {
            assert!(
                !math::in_box(p.pos, BOX_MIN, BOX_MAX),
                "{kind:?}: leaver inside the box"
            );
        }

        let mut remaining = HashSet::new();
        c.for_each(
            &mut |p| {
                assert!(
                    math::in_box(p.pos, BOX_MIN, BOX_MAX),
                    "{kind:?}: remaining particle outside the box"
                );
                remaining.insert(p.id);
            },
            IterateBehavior::Owned,
        );
        assert_eq!(remaining.len() + leaver_ids.len(), 200, "{kind:?}: union is the pre-update set");
        assert!(remaining.is_disjoint(&leaver_ids), "{kind:?}");

        // Halo particles are always cleared.
        let mut halos = 0;
        c.for_each(&mut |_| halos += 1, IterateBehavior::Halo);
        assert_eq!(halos, 0, "{kind:?}: halos survive update");
    }
}

#[test]
fn update_is_empty_when_nothing_moved() {
    for kind in all_kinds() {
        let mut c = filled_container(kind, 100, 5);
        assert!(c.update(false).is_empty(), "{kind:?}");
        let mut count = 0;
        c.for_each(&mut |_| count += 1, IterateBehavior::Owned);
        assert_eq!(count, 100, "{kind:?}");
    }
}

#[test]
fn keep_lists_update_dummies_leavers_in_place() {
    for kind in all_kinds() {
        let mut c = filled_container(kind, 50, 17);
        if kind == ContainerKind::ClusterLists {
            // Build clusters so there is a structure to preserve.
            c.rebuild_neighbor_lists(kernel::Newton3::Enabled);
        }
        c.for_each_mut(
            &mut |p| {
                if p.id == 0 {
                    p.pos[2] = -0.4;
                }
            },
            IterateBehavior::Owned,
        );

        let leavers = c.update(true);
        assert_eq!(leavers.len(), 1, "{kind:?}");
        assert_eq!(leavers[0].id, 0, "{kind:?}");

        let mut owned_ids: Vec<u64> = Vec::new();
        c.for_each(&mut |p| owned_ids.push(p.id), IterateBehavior::Owned);
        assert_eq!(owned_ids.len(), 49, "{kind:?}: leaver no longer owned");
        assert!(!owned_ids.contains(&0), "{kind:?}");
    }
}

#[test]
fn out_of_bounds_insertions_are_rejected_everywhere() {
    for kind in all_kinds() {
        let mut c = ContainerVariant::build(kind, BOX_MIN, BOX_MAX, 1.0, 0.2, 4);
        assert!(
            c.add_owned(Particle::new([9.0, 4.0, 4.0], 0)).is_err(),
            "{kind:?}: outside owned box"
        );
        assert!(
            c.add_halo(Particle::new([4.0, 4.0, 4.0], 1)).is_err(),
            "{kind:?}: halo inside owned box"
        );
        assert!(
            c.add_halo(Particle::new([10.0, 4.0, 4.0], 2)).is_err(),
            "{kind:?}: beyond the halo shell"
        );
        // Boundary rule: box_max itself is outside the owned box but inside
        // the halo shell.
        assert!(c.add_owned(Particle::new(BOX_MAX, 3)).is_err(), "{kind:?}");
        assert!(c.add_halo(Particle::new(BOX_MAX, 4)).is_ok(), "{kind:?}");
    }
}
