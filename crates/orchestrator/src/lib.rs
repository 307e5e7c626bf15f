//! Orchestration layer
//!
//! The collaborators around the tuned engine: JSON configuration, the
//! Lennard-Jones force law, initial particle placement, and the
//! velocity-Verlet time loop.

#![warn(missing_docs)]

pub mod config;
pub mod lj;
pub mod runner;
pub mod scenario;

pub use config::SimulationConfig;
pub use lj::LjFunctor;
pub use runner::SimulationRunner;

use kernel::Simulator;

/// Create a ready-to-run simulation from a configuration file.
///
/// The full setup pipeline:
/// 1. Load and validate the configuration.
/// 2. Build the tuned engine over the configured option sets.
/// 3. Generate and insert the initial particle set.
/// 4. Wrap engine and functor into a [`SimulationRunner`].
pub fn create_simulation(config_path: &str) -> Result<SimulationRunner, Box<dyn std::error::Error>> {
    tracing::info!("Creating simulation from config: {}", config_path);

    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    build_simulation(&config).map_err(Into::into)
}

/// Build a runner from an in-memory configuration.
pub fn build_simulation(config: &SimulationConfig) -> Result<SimulationRunner, String> {
    config.validate()?;

    let mut sim = Simulator::new(config.domain.clone(), config.tuning.clone())
        .map_err(|e| format!("Failed to build engine: {e}"))?;

    let particles = scenario::generate(&config.scenario, config.domain.box_min, config.domain.box_max);
    tracing::info!("Scenario generated: {} particles", particles.len());
    for p in particles {
        sim.add_owned(p)
            .map_err(|e| format!("Scenario particle rejected: {e}"))?;
    }

    let functor = LjFunctor::new(
        config.domain.cutoff,
        config.potential.epsilon,
        config.potential.sigma,
        config.potential.shift,
    );

    tracing::info!("Simulation ready to run");
    Ok(SimulationRunner::new(sim, functor, config.dt))
}
