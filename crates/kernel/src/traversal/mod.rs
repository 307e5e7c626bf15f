//! Traversal schedules and their applicability rules.
//!
//! A traversal is applicable to a configuration when (a) it runs on the
//! configured container, (b) it supports the configured Newton-3 mode, and
//! (c) the grid admits its partitioning. The slab-based schedules are the
//! only ones with a grid constraint: fewer cell layers than worker threads
//! means fewer independent slabs than workers, so the schedule reports
//! itself inapplicable during enumeration instead of failing at run time.

pub(crate) mod cluster;
pub(crate) mod colored;
pub(crate) mod sliced;

use crate::error::KernelError;
use crate::options::{Configuration, TraversalKind};

/// Why a statically valid configuration cannot run on a given grid.
///
/// `lc_dims` is the linked-cells grid (halo included) the engine's box would
/// produce; `threads` the worker count the slab schedules would fan out to.
pub fn check_applicable(
    config: &Configuration,
    lc_dims: [usize; 3],
    threads: usize,
) -> Result<(), KernelError> {
    if !config.is_applicable() {
        return Err(KernelError::TraversalIncompatible {
            traversal: config.traversal,
            container: config.container,
        });
    }
    match config.traversal {
        TraversalKind::Sliced | TraversalKind::SlicedC02 => {
            let layers = lc_dims[sliced::longest_axis(lc_dims)];
            if layers < threads {
                return Err(KernelError::DimensionTooSmall {
                    cells: layers,
                    slabs: threads,
                });
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Grid-dependent applicability of a configuration, as a predicate.
pub fn is_applicable(config: &Configuration, lc_dims: [usize; 3], threads: usize) -> bool {
    check_applicable(config, lc_dims, threads).is_ok()
}
