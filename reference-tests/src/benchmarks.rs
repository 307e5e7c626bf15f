//! Wall-clock sweep over the configuration space.
//!
//! Not a statistics-grade harness: a plain `Instant` table that makes the
//! relative cost of configurations visible, the same numbers the tuner sees.

use std::time::Instant;

use kernel::{Configuration, IterateBehavior, SelectorStrategy, Simulator, SimulatorOptions};
use orchestrator::{scenario, LjFunctor};

/// One row of the sweep table.
#[derive(Debug)]
pub struct SweepRow {
    /// Configuration measured.
    pub configuration: Configuration,
    /// Mean wall time per iteration, nanoseconds.
    pub nanos_per_iteration: u128,
}

/// Time every applicable configuration for `iterations` iterations over
/// `particle_count` uniformly random particles.
pub fn sweep_configurations(
    domain: &SimulatorOptions,
    particle_count: usize,
    iterations: u32,
) -> Vec<SweepRow> {
    let scenario_particles =
        scenario::uniform_random(particle_count, 99, domain.box_min, domain.box_max);
    let functor = LjFunctor::new(domain.cutoff, 1.0, 1.0, 0.0);

    let probe = crate::ParityScenario {
        name: "sweep".to_string(),
        particle_count,
        seed: 99,
        domain: domain.clone(),
        epsilon: 1.0,
        sigma: 1.0,
        tolerance: 1.0,
    };

    let mut rows = Vec::new();
    for config in probe.configuration_space() {
        let mut sim = Simulator::with_configurations(
            domain.clone(),
            vec![config],
            SelectorStrategy::FastestAbs,
            1,
            1_000_000,
        )
        .expect("single configuration engine");
        for p in &scenario_particles {
            sim.add_owned(p.clone()).expect("scenario particle in box");
        }

        // Warmup builds whatever neighbor structure the container needs.
        sim.compute_interactions(&functor).expect("warmup");

        let start = Instant::now();
        for _ in 0..iterations {
            sim.for_each_mut(
                &mut |p| p.force = [0.0; 3],
                IterateBehavior::OwnedOrHalo,
            );
            sim.compute_interactions(&functor).expect("sweep iteration");
        }
        let elapsed = start.elapsed();

        rows.push(SweepRow {
            configuration: config,
            nanos_per_iteration: elapsed.as_nanos() / iterations as u128,
        });
    }
    rows.sort_by_key(|r| r.nanos_per_iteration);
    rows
}

/// Print a sweep table to stdout.
pub fn print_sweep(rows: &[SweepRow]) {
    println!("{:>14} {}", "ns/iter", "configuration");
    for row in rows {
        println!("{:>14} {}", row.nanos_per_iteration, row.configuration);
    }
}
