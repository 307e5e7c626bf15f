//! The auto-tuner: samples the configuration space, commits to the fastest.
//!
//! State machine: `Sampling(config_0) → … → Sampling(config_n) →
//! Committed(optimum)`, re-entering `Sampling(config_0)` after
//! `tuning_interval` committed iterations. Each configuration collects
//! `max_samples` timed iterations before the tuner moves on; a configuration
//! the functor rejects at run time is dropped from the phase permanently.

use std::time::Duration;

use crate::error::KernelError;
use crate::options::{
    Configuration, ContainerKind, DataLayout, Newton3, SelectorStrategy, TraversalKind,
};
use crate::traversal;

/// Construction options for the tuner: the allowed option sets whose
/// filtered Cartesian product forms the configuration space.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TunerOptions {
    /// Container kinds to consider.
    pub allowed_containers: Vec<ContainerKind>,
    /// Traversal kinds to consider.
    pub allowed_traversals: Vec<TraversalKind>,
    /// Data layouts to consider.
    pub allowed_layouts: Vec<DataLayout>,
    /// Newton-3 modes to consider.
    pub allowed_newton3: Vec<Newton3>,
    /// How sample buffers condense into a comparison metric.
    pub selector: SelectorStrategy,
    /// Timed iterations per configuration while sampling.
    pub max_samples: usize,
    /// Committed iterations between tuning phases.
    pub tuning_interval: u64,
}

impl Default for TunerOptions {
    fn default() -> Self {
        Self {
            allowed_containers: vec![
                ContainerKind::DirectSum,
                ContainerKind::LinkedCells,
                ContainerKind::ClusterLists,
            ],
            allowed_traversals: TraversalKind::ALL.to_vec(),
            allowed_layouts: vec![DataLayout::Aos, DataLayout::Soa],
            allowed_newton3: vec![Newton3::Enabled, Newton3::Disabled],
            selector: SelectorStrategy::FastestAbs,
            max_samples: 3,
            tuning_interval: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Sampling { index: usize },
    Committed { index: usize, iterations: u64 },
}

/// Tuning state for one simulation.
pub struct AutoTuner {
    configurations: Vec<Configuration>,
    samples: Vec<Vec<Duration>>,
    selector: SelectorStrategy,
    max_samples: usize,
    tuning_interval: u64,
    phase: Phase,
    started: bool,
    last_container: Option<ContainerKind>,
}

impl AutoTuner {
    /// Build a tuner over an explicit, already-filtered configuration list.
    pub fn new(
        mut configurations: Vec<Configuration>,
        selector: SelectorStrategy,
        max_samples: usize,
        tuning_interval: u64,
    ) -> Result<Self, KernelError> {
        // The tuner must never hand out an unsafe combination, no matter
        // what list the caller assembled.
        configurations.retain(Configuration::is_applicable);
        configurations.sort();
        configurations.dedup();
        if configurations.is_empty() {
            return Err(KernelError::NoApplicableConfiguration);
        }
        let samples = vec![Vec::new(); configurations.len()];
        tracing::debug!("tuner starts with {} configurations", configurations.len());
        Ok(Self {
            configurations,
            samples,
            selector,
            max_samples: max_samples.max(1),
            tuning_interval: tuning_interval.max(1),
            phase: Phase::Sampling { index: 0 },
            started: false,
            last_container: None,
        })
    }

    /// Enumerate the filtered Cartesian product of the allowed option sets.
    ///
    /// `lc_dims` and `threads` feed the grid-dependent applicability check
    /// for the slab-based traversals.
    pub fn enumerate_configurations(
        options: &TunerOptions,
        lc_dims: [usize; 3],
        threads: usize,
    ) -> Vec<Configuration> {
        let mut result = Vec::new();
        for &container in &options.allowed_containers {
            for &traversal in &options.allowed_traversals {
                for &layout in &options.allowed_layouts {
                    for &newton3 in &options.allowed_newton3 {
                        let config = Configuration::new(container, traversal, layout, newton3);
                        if traversal::is_applicable(&config, lc_dims, threads) {
                            result.push(config);
                        }
                    }
                }
            }
        }
        result.sort();
        result.dedup();
        result
    }

    /// Build a tuner from option sets.
    pub fn from_options(
        options: &TunerOptions,
        lc_dims: [usize; 3],
        threads: usize,
    ) -> Result<Self, KernelError> {
        let configs = Self::enumerate_configurations(options, lc_dims, threads);
        Self::new(
            configs,
            options.selector,
            options.max_samples,
            options.tuning_interval,
        )
    }

    /// The configuration the current or next iteration runs with.
    pub fn current_config(&self) -> Configuration {
        let index = match self.phase {
            Phase::Sampling { index } => index,
            Phase::Committed { index, .. } => index,
        };
        self.configurations[index]
    }

    /// Whether the tuner is still collecting samples.
    pub fn is_tuning(&self) -> bool {
        matches!(self.phase, Phase::Sampling { .. })
    }

    /// Number of live candidate configurations.
    pub fn num_configurations(&self) -> usize {
        self.configurations.len()
    }

    /// Resolve the configuration for the coming iteration, dropping
    /// candidates the functor's capabilities reject.
    ///
    /// A drop is the recoverable `InvalidCapability` case; only an empty
    /// candidate set is fatal.
    pub fn next_config(
        &mut self,
        allows_newton3: bool,
        allows_non_newton3: bool,
    ) -> Result<Configuration, KernelError> {
        self.started = true;

        // Tuning-phase boundary: enough committed iterations have passed.
        if let Phase::Committed { iterations, .. } = self.phase {
            if iterations >= self.tuning_interval {
                tracing::debug!("re-entering tuning after {} committed iterations", iterations);
                for s in &mut self.samples {
                    s.clear();
                }
                self.phase = Phase::Sampling { index: 0 };
            }
        }

        loop {
            let config = self.current_config();
            let rejected = match config.newton3 {
                Newton3::Enabled => !allows_newton3,
                Newton3::Disabled => !allows_non_newton3,
            };
            if !rejected {
                self.last_container = Some(config.container);
                return Ok(config);
            }

            tracing::warn!(
                "{}",
                KernelError::InvalidCapability { config }.to_string()
            );
            self.remove_current()?;
        }
    }

    fn remove_current(&mut self) -> Result<(), KernelError> {
        let index = match self.phase {
            Phase::Sampling { index } => index,
            Phase::Committed { index, .. } => index,
        };
        self.configurations.remove(index);
        self.samples.remove(index);
        if self.configurations.is_empty() {
            return Err(KernelError::NoApplicableConfiguration);
        }
        match self.phase {
            Phase::Sampling { .. } if index >= self.configurations.len() => {
                // Dropped the last candidate of the phase: select now.
                self.commit_optimum();
            }
            Phase::Sampling { .. } => {
                self.phase = Phase::Sampling { index };
            }
            Phase::Committed { .. } => {
                // The committed optimum became invalid; start over.
                for s in &mut self.samples {
                    s.clear();
                }
                self.phase = Phase::Sampling { index: 0 };
            }
        }
        Ok(())
    }

    /// Record the measured duration of the iteration that just ran.
    ///
    /// While sampling this fills the current configuration's buffer and
    /// advances to the next candidate (or commits the optimum) once
    /// `max_samples` are in. While committed it counts iterations toward the
    /// next tuning phase.
    pub fn add_sample(&mut self, elapsed: Duration) {
        match self.phase {
            Phase::Sampling { index } => {
                self.samples[index].push(elapsed);
                tracing::trace!(
                    "sample {}/{} for {}: {} ns",
                    self.samples[index].len(),
                    self.max_samples,
                    self.configurations[index],
                    elapsed.as_nanos()
                );
                if self.samples[index].len() >= self.max_samples {
                    if index + 1 < self.configurations.len() {
                        self.phase = Phase::Sampling { index: index + 1 };
                    } else {
                        self.commit_optimum();
                    }
                }
            }
            Phase::Committed { index, iterations } => {
                self.phase = Phase::Committed {
                    index,
                    iterations: iterations + 1,
                };
            }
        }
    }

    fn commit_optimum(&mut self) {
        let best = self
            .configurations
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.samples[*i].is_empty())
            .min_by_key(|(i, _)| self.selector_metric(&self.samples[*i]))
            .map(|(i, _)| i)
            .unwrap_or(0);
        tracing::info!(
            "tuning phase done: committing to {} ({} candidates)",
            self.configurations[best],
            self.configurations.len()
        );
        self.phase = Phase::Committed {
            index: best,
            iterations: 0,
        };
    }

    fn selector_metric(&self, samples: &[Duration]) -> Duration {
        match self.selector {
            SelectorStrategy::FastestAbs => samples.iter().min().copied().unwrap_or(Duration::MAX),
            SelectorStrategy::FastestMean => {
                let sum: Duration = samples.iter().sum();
                sum / samples.len() as u32
            }
            SelectorStrategy::FastestMedian => {
                let mut sorted = samples.to_vec();
                sorted.sort();
                sorted[sorted.len() / 2]
            }
        }
    }

    /// Whether the next `next_config` call will hand out a configuration on
    /// a different container than the one last used, or nothing ran yet.
    /// These are exactly the iterations on which the engine swaps its
    /// spatial structure.
    pub fn will_rebuild(&self) -> bool {
        if !self.started {
            return true;
        }
        let next_index = match self.phase {
            Phase::Sampling { index } => index,
            Phase::Committed { iterations, .. } if iterations >= self.tuning_interval => 0,
            Phase::Committed { index, .. } => index,
        };
        self.last_container != Some(self.configurations[next_index].container)
    }
}
