//! Configuration parsing and validation for tuned MD runs.

use serde::{Deserialize, Serialize};
use std::fs;

use kernel::{SimulatorOptions, TunerOptions};

/// Main simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable run name.
    pub name: String,
    /// Domain geometry and rebuild cadence.
    pub domain: SimulatorOptions,
    /// Tuning option sets.
    #[serde(default)]
    pub tuning: TunerOptions,
    /// Lennard-Jones parameters.
    #[serde(default)]
    pub potential: PotentialConfig,
    /// How the initial particle set is generated.
    pub scenario: ScenarioConfig,
    /// Integration time step.
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Number of time steps to run.
    pub iterations: u64,
}

/// Lennard-Jones parameters. The cutoff comes from the domain options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialConfig {
    /// Well depth.
    #[serde(default = "default_one")]
    pub epsilon: f64,
    /// Zero-crossing distance.
    #[serde(default = "default_one")]
    pub sigma: f64,
    /// Energy shift at the cutoff.
    #[serde(default)]
    pub shift: f64,
}

impl Default for PotentialConfig {
    fn default() -> Self {
        Self {
            epsilon: 1.0,
            sigma: 1.0,
            shift: 0.0,
        }
    }
}

/// Initial particle placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioConfig {
    /// `count` particles sampled uniformly in the box.
    UniformRandom {
        /// Number of particles.
        count: usize,
        /// RNG seed for reproducibility.
        seed: u64,
    },
    /// A regular grid of `per_dim`^3 particles centered in their lattice
    /// cells.
    Grid {
        /// Particles along each axis.
        per_dim: usize,
    },
}

fn default_dt() -> f64 {
    1e-4
}

fn default_one() -> f64 {
    1.0
}

impl SimulationConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: &str) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        let config: SimulationConfig = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.domain
            .validate()
            .map_err(|e| format!("Invalid domain options: {e}"))?;

        if self.potential.epsilon <= 0.0 {
            return Err("epsilon must be positive".to_string());
        }
        if self.potential.sigma <= 0.0 {
            return Err("sigma must be positive".to_string());
        }
        if self.dt <= 0.0 {
            return Err("dt must be positive".to_string());
        }
        if self.iterations == 0 {
            return Err("iterations must be at least 1".to_string());
        }
        if self.tuning.max_samples == 0 {
            return Err("max_samples must be at least 1".to_string());
        }

        match self.scenario {
            ScenarioConfig::UniformRandom { count, .. } if count == 0 => {
                Err("particle count must be at least 1".to_string())
            }
            ScenarioConfig::Grid { per_dim } if per_dim == 0 => {
                Err("grid must have at least one particle per dimension".to_string())
            }
            _ => Ok(()),
        }
    }
}
