//! Tuner phase behavior driven through the full engine.

mod common;

use common::CountingFunctor;
use kernel::{
    Configuration, ContainerKind, DataLayout, Newton3, SelectorStrategy, Simulator,
    SimulatorOptions, TraversalKind,
};

fn options() -> SimulatorOptions {
    SimulatorOptions {
        box_min: [0.0; 3],
        box_max: [10.0; 3],
        cutoff: 1.0,
        skin_per_timestep: 0.0,
        rebuild_frequency: 100_000,
        cluster_size: 4,
    }
}

fn candidate_set() -> Vec<Configuration> {
    vec![
        Configuration::new(
            ContainerKind::DirectSum,
            TraversalKind::DsSequential,
            DataLayout::Aos,
            Newton3::Disabled,
        ),
        Configuration::new(
            ContainerKind::LinkedCells,
            TraversalKind::C08,
            DataLayout::Aos,
            Newton3::Enabled,
        ),
        Configuration::new(
            ContainerKind::LinkedCells,
            TraversalKind::C08,
            DataLayout::Soa,
            Newton3::Enabled,
        ),
    ]
}

#[test]
fn full_tuning_phase_commits_and_holds() {
    let max_samples = 2;
    let tuning_interval = 5;
    let mut sim = Simulator::with_configurations(
        options(),
        candidate_set(),
        SelectorStrategy::FastestAbs,
        max_samples,
        tuning_interval,
    )
    .unwrap();
    for p in common::random_particles(500, 13, [0.0; 3], [10.0; 3]) {
        sim.add_owned(p).unwrap();
    }
    let f = CountingFunctor::new();

    // Sampling: every configuration runs max_samples consecutive times.
    let mut visited = Vec::new();
    let mut still_tuning = true;
    let mut iterations = 0;
    while still_tuning {
        visited.push(sim.current_config());
        still_tuning = sim.compute_interactions(&f).unwrap();
        iterations += 1;
        assert!(iterations <= 3 * max_samples, "tuning phase must terminate");
    }
    assert_eq!(iterations, 3 * max_samples);
    for pair in visited.chunks(max_samples) {
        assert!(pair.iter().all(|c| *c == pair[0]), "samples run back to back");
    }
    let mut distinct = visited.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 3, "each configuration visited exactly once per phase");

    // Committed: the configuration must not change for tuning_interval
    // iterations.
    let committed = sim.current_config();
    assert!(candidate_set().contains(&committed));
    for _ in 0..tuning_interval {
        let tuning = sim.compute_interactions(&f).unwrap();
        assert!(!tuning);
        assert_eq!(sim.current_config(), committed);
    }

    // Interval over: the next iteration samples again.
    let tuning = sim.compute_interactions(&f).unwrap();
    assert!(tuning, "re-entered the tuning phase");
}

#[test]
fn functor_without_newton3_skips_those_configs() {
    let mut sim = Simulator::with_configurations(
        options(),
        candidate_set(),
        SelectorStrategy::FastestAbs,
        1,
        1000,
    )
    .unwrap();
    for p in common::random_particles(50, 5, [0.0; 3], [10.0; 3]) {
        sim.add_owned(p).unwrap();
    }

    let mut f = CountingFunctor::new();
    f.newton3 = false;

    // Both LinkedCells candidates demand newton3; only DirectSum survives.
    let mut configs_used = Vec::new();
    while sim.compute_interactions(&f).unwrap() {
        configs_used.push(sim.current_config());
    }
    assert_eq!(sim.current_config().container, ContainerKind::DirectSum);
    assert_eq!(sim.current_config().newton3, Newton3::Disabled);
}

#[test]
fn impossible_functor_is_fatal() {
    let mut sim = Simulator::with_configurations(
        options(),
        vec![Configuration::new(
            ContainerKind::LinkedCells,
            TraversalKind::C08,
            DataLayout::Aos,
            Newton3::Enabled,
        )],
        SelectorStrategy::FastestAbs,
        1,
        1000,
    )
    .unwrap();

    let mut f = CountingFunctor::new();
    f.newton3 = false;
    let err = sim.compute_interactions(&f);
    assert!(matches!(err, Err(kernel::KernelError::NoApplicableConfiguration)));
}

#[test]
fn irrelevant_functor_does_not_advance_tuning() {
    let mut sim = Simulator::with_configurations(
        options(),
        candidate_set(),
        SelectorStrategy::FastestAbs,
        2,
        1000,
    )
    .unwrap();
    for p in common::random_particles(20, 3, [0.0; 3], [10.0; 3]) {
        sim.add_owned(p).unwrap();
    }

    struct Irrelevant(CountingFunctor);
    impl kernel::Functor for Irrelevant {
        fn aos(&self, pi: &mut kernel::Particle, pj: &mut kernel::Particle, newton3: bool) {
            self.0.aos(pi, pj, newton3)
        }
        fn soa_single(&self, buf: &mut kernel::SoaBuffer, newton3: bool) {
            self.0.soa_single(buf, newton3)
        }
        fn soa_pair(&self, a: &mut kernel::SoaBuffer, b: &mut kernel::SoaBuffer, newton3: bool) {
            self.0.soa_pair(a, b, newton3)
        }
        fn soa_verlet(
            &self,
            buf: &mut kernel::SoaBuffer,
            lists: &[Vec<usize>],
            from: usize,
            to: usize,
            newton3: bool,
        ) {
            self.0.soa_verlet(buf, lists, from, to, newton3)
        }
        fn allows_newton3(&self) -> bool {
            true
        }
        fn allows_non_newton3(&self) -> bool {
            true
        }
        fn is_relevant_for_tuning(&self) -> bool {
            false
        }
    }

    let f = Irrelevant(CountingFunctor::new());
    let before = sim.current_config();
    for _ in 0..5 {
        sim.compute_interactions(&f).unwrap();
    }
    assert_eq!(sim.current_config(), before, "no samples, no advancement");
    assert!(sim.is_tuning());
}
