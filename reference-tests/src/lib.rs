//! Reference test framework for the tuned interaction engine.
//!
//! The central check: for one particle set and one force law, every
//! applicable {container, traversal, layout, newton3} configuration must
//! produce the same forces up to floating-point reassociation. Each scenario
//! runs the full configuration space against a DirectSum ground truth and
//! reports per-configuration deviations.

#[cfg(test)]
mod tests;

pub mod analytical;
pub mod benchmarks;

use std::collections::HashMap;

use kernel::{
    AutoTuner, Configuration, ContainerKind, DataLayout, IterateBehavior, Newton3,
    SelectorStrategy, Simulator, SimulatorOptions, TraversalKind, TunerOptions,
};
use orchestrator::scenario;
use orchestrator::LjFunctor;

/// A cross-configuration force parity scenario.
#[derive(Debug, Clone)]
pub struct ParityScenario {
    /// Scenario name for reporting.
    pub name: String,
    /// Number of uniformly sampled particles.
    pub particle_count: usize,
    /// RNG seed.
    pub seed: u64,
    /// Domain options shared by every configuration.
    pub domain: SimulatorOptions,
    /// Lennard-Jones parameters (epsilon, sigma).
    pub epsilon: f64,
    /// Zero-crossing distance.
    pub sigma: f64,
    /// Maximum allowed force deviation, relative to the largest force
    /// magnitude the reference configuration produces.
    pub tolerance: f64,
}

/// Result of one configuration against the reference.
#[derive(Debug)]
pub struct ConfigCheck {
    /// The configuration that ran.
    pub configuration: Configuration,
    /// Largest relative force deviation observed.
    pub max_deviation: f64,
    /// Whether the deviation stayed inside the scenario tolerance.
    pub passed: bool,
}

/// Result of a full scenario.
#[derive(Debug)]
pub struct ScenarioResult {
    /// Scenario name.
    pub name: String,
    /// Whether every configuration agreed.
    pub passed: bool,
    /// Per-configuration outcomes (reference excluded).
    pub checks: Vec<ConfigCheck>,
}

/// The reference configuration: sequential all-pairs, AoS, no Newton-3.
pub fn reference_configuration() -> Configuration {
    Configuration::new(
        ContainerKind::DirectSum,
        TraversalKind::DsSequential,
        DataLayout::Aos,
        Newton3::Disabled,
    )
}

/// Run one configuration over the scenario's particle set and return the
/// resulting forces keyed by particle id.
pub fn forces_under(
    scenario_def: &ParityScenario,
    config: Configuration,
) -> Result<HashMap<u64, [f64; 3]>, String> {
    let mut sim = Simulator::with_configurations(
        scenario_def.domain.clone(),
        vec![config],
        SelectorStrategy::FastestAbs,
        1,
        1_000_000,
    )
    .map_err(|e| format!("engine construction failed for {config}: {e}"))?;

    for p in scenario::uniform_random(
        scenario_def.particle_count,
        scenario_def.seed,
        scenario_def.domain.box_min,
        scenario_def.domain.box_max,
    ) {
        sim.add_owned(p).map_err(|e| e.to_string())?;
    }

    let functor = LjFunctor::new(
        scenario_def.domain.cutoff,
        scenario_def.epsilon,
        scenario_def.sigma,
        0.0,
    );
    sim.compute_interactions(&functor)
        .map_err(|e| format!("traversal failed for {config}: {e}"))?;

    let mut forces = HashMap::new();
    sim.for_each(
        &mut |p| {
            forces.insert(p.id, p.force);
        },
        IterateBehavior::Owned,
    );
    Ok(forces)
}

/// Largest componentwise deviation between two force maps, relative to the
/// largest force magnitude in the reference.
pub fn max_relative_deviation(
    reference: &HashMap<u64, [f64; 3]>,
    candidate: &HashMap<u64, [f64; 3]>,
) -> f64 {
    let scale = reference
        .values()
        .flat_map(|f| f.iter().map(|c| c.abs()))
        .fold(0.0_f64, f64::max)
        .max(1e-300);

    let mut worst = 0.0_f64;
    for (id, fr) in reference {
        let fc = candidate.get(id).copied().unwrap_or([f64::NAN; 3]);
        for d in 0..3 {
            let dev = (fr[d] - fc[d]).abs() / scale;
            if dev > worst || dev.is_nan() {
                worst = dev;
            }
        }
    }
    worst
}

impl ParityScenario {
    /// Every configuration the engine could pick for this domain.
    pub fn configuration_space(&self) -> Vec<Configuration> {
        let lc_dims = kernel::container::LinkedCells::cells_per_dim_for(
            self.domain.box_min,
            self.domain.box_max,
            self.domain.interaction_length(),
        );
        AutoTuner::enumerate_configurations(
            &TunerOptions::default(),
            lc_dims,
            rayon::current_num_threads(),
        )
    }

    /// Run the scenario: reference first, then every other configuration.
    pub fn run(&self) -> Result<ScenarioResult, String> {
        tracing::info!("Running parity scenario: {}", self.name);
        let reference = forces_under(self, reference_configuration())?;
        assert_eq!(
            reference.len(),
            self.particle_count,
            "reference lost particles"
        );

        let mut checks = Vec::new();
        for config in self.configuration_space() {
            if config == reference_configuration() {
                continue;
            }
            let forces = forces_under(self, config)?;
            if forces.len() != reference.len() {
                return Err(format!(
                    "{config} produced {} particles, expected {}",
                    forces.len(),
                    reference.len()
                ));
            }
            let max_deviation = max_relative_deviation(&reference, &forces);
            let passed = max_deviation <= self.tolerance;
            if !passed {
                tracing::warn!(
                    "{}: {} deviates by {:.3e} (tolerance {:.1e})",
                    self.name,
                    config,
                    max_deviation,
                    self.tolerance
                );
            }
            checks.push(ConfigCheck {
                configuration: config,
                max_deviation,
                passed,
            });
        }

        let passed = checks.iter().all(|c| c.passed);
        Ok(ScenarioResult {
            name: self.name.clone(),
            passed,
            checks,
        })
    }
}

/// The standard scenario suite.
pub fn standard_scenarios() -> Vec<ParityScenario> {
    let domain = SimulatorOptions {
        box_min: [0.0; 3],
        box_max: [10.0; 3],
        cutoff: 1.0,
        skin_per_timestep: 0.02,
        rebuild_frequency: 10,
        cluster_size: 4,
    };
    vec![
        ParityScenario {
            name: "uniform-100".to_string(),
            particle_count: 100,
            seed: 42,
            domain: domain.clone(),
            epsilon: 1.0,
            sigma: 1.0,
            tolerance: 1e-12,
        },
        ParityScenario {
            name: "uniform-1000".to_string(),
            particle_count: 1000,
            seed: 1337,
            domain: domain.clone(),
            epsilon: 1.0,
            sigma: 1.0,
            tolerance: 1e-11,
        },
        ParityScenario {
            name: "dense-512".to_string(),
            particle_count: 512,
            seed: 7,
            domain: SimulatorOptions {
                box_max: [4.0; 3],
                ..domain
            },
            epsilon: 1.0,
            sigma: 0.8,
            tolerance: 1e-11,
        },
    ]
}
