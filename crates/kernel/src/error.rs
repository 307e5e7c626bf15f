//! Error kinds surfaced by the engine.

use thiserror::Error;

use crate::options::{Configuration, ContainerKind, TraversalKind};

/// Everything that can go wrong constructing or driving the engine.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A particle position lies outside the region the operation declares.
    #[error("particle {id} at {pos:?} is outside the {region} region")]
    OutOfBounds {
        /// Offending particle id.
        id: u64,
        /// Offending position.
        pos: [f64; 3],
        /// Which region was violated ("owned box", "halo shell", ...).
        region: &'static str,
    },

    /// The tuner's candidate set is empty; there is nothing left to run.
    #[error("no applicable configuration remains in the tuning set")]
    NoApplicableConfiguration,

    /// A traversal was requested on a container that cannot host it.
    #[error("traversal {traversal:?} is not applicable to container {container:?}")]
    TraversalIncompatible {
        /// Requested traversal.
        traversal: TraversalKind,
        /// Actual container.
        container: ContainerKind,
    },

    /// The functor's advertised capabilities reject the configured Newton-3
    /// mode. The tuner recovers by dropping the configuration.
    #[error("functor capabilities reject configuration {config}")]
    InvalidCapability {
        /// The rejected configuration.
        config: Configuration,
    },

    /// A partitioning traversal cannot produce enough independent work units
    /// for the requested parallelism.
    #[error("cannot cut {cells} cell layers into {slabs} slabs")]
    DimensionTooSmall {
        /// Cell layers available along the slicing axis.
        cells: usize,
        /// Slabs requested.
        slabs: usize,
    },

    /// Construction options violate a dimensional invariant.
    #[error("invalid option: {0}")]
    InvalidOptions(String),
}
