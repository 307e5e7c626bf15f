//! Option enums spanning the tuning space, and the `Configuration` tuple.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The spatial container family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerKind {
    /// One owned cell plus six halo shells; the all-pairs reference.
    DirectSum,
    /// Dense uniform 3D cell grid with a one-cell halo layer.
    LinkedCells,
    /// 2D tower grid with fixed-size z clusters and explicit neighbor lists.
    ClusterLists,
}

/// The traversal schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraversalKind {
    /// Sequential all-pairs over the DirectSum cells.
    DsSequential,
    /// Single-color one-directional base step (writes confined to the base
    /// cell).
    C01,
    /// Classical 8-color base step over 2x2x2 blocks.
    C08,
    /// 18-color base step pairing each cell with its 13 forward neighbors.
    C18,
    /// Slab decomposition along the longest axis with per-cell locking on
    /// slab boundary layers.
    Sliced,
    /// Slab decomposition with a 2-coloring over slabs instead of locks.
    SlicedC02,
    /// Tower coloring over the cluster container.
    ClusterColoring,
}

impl TraversalKind {
    /// All traversal kinds, in enumeration order.
    pub const ALL: [TraversalKind; 7] = [
        TraversalKind::DsSequential,
        TraversalKind::C01,
        TraversalKind::C08,
        TraversalKind::C18,
        TraversalKind::Sliced,
        TraversalKind::SlicedC02,
        TraversalKind::ClusterColoring,
    ];

    /// The single container family this schedule can run on.
    pub fn compatible_container(self) -> ContainerKind {
        match self {
            TraversalKind::DsSequential => ContainerKind::DirectSum,
            TraversalKind::C01
            | TraversalKind::C08
            | TraversalKind::C18
            | TraversalKind::Sliced
            | TraversalKind::SlicedC02 => ContainerKind::LinkedCells,
            TraversalKind::ClusterColoring => ContainerKind::ClusterLists,
        }
    }

    /// Whether the schedule's write-disjointness argument covers the
    /// symmetric Newton-3 update.
    pub fn supports_newton3(self) -> bool {
        match self {
            // c01 writes only the base cell; the neighbor half of a symmetric
            // update would race.
            TraversalKind::C01 => false,
            _ => true,
        }
    }

    /// Whether the schedule can issue one-directional updates.
    pub fn supports_non_newton3(self) -> bool {
        match self {
            // The c08 block step owns each pair exactly once; without the
            // symmetric update half the interactions would be lost.
            TraversalKind::C08 => false,
            _ => true,
        }
    }
}

/// Data layout the kernels run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataLayout {
    /// Array-of-structures: kernels mutate `Particle` records in place.
    Aos,
    /// Structure-of-arrays: staged load, vectorizable kernels, extract.
    Soa,
}

/// Newton-3 mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Newton3 {
    /// Symmetric update, one kernel call per pair.
    Enabled,
    /// One-directional update, a call per direction.
    Disabled,
}

impl Newton3 {
    /// The mode as the flag kernels receive.
    #[inline]
    pub fn as_bool(self) -> bool {
        matches!(self, Newton3::Enabled)
    }
}

/// How the tuner condenses a configuration's sample buffer into one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorStrategy {
    /// Fastest single sample.
    FastestAbs,
    /// Smallest arithmetic mean.
    FastestMean,
    /// Smallest median.
    FastestMedian,
}

/// One point in the tuning space: container, traversal, layout, Newton-3.
///
/// Value type, immutable. Ordering follows field order so enumerated sets
/// sample container-by-container, which minimizes container swaps while
/// tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Configuration {
    /// Container family.
    pub container: ContainerKind,
    /// Traversal schedule.
    pub traversal: TraversalKind,
    /// Data layout.
    pub layout: DataLayout,
    /// Newton-3 mode.
    pub newton3: Newton3,
}

impl Configuration {
    /// Create a configuration tuple.
    pub fn new(
        container: ContainerKind,
        traversal: TraversalKind,
        layout: DataLayout,
        newton3: Newton3,
    ) -> Self {
        Self {
            container,
            traversal,
            layout,
            newton3,
        }
    }

    /// Static applicability: the traversal runs on this container and
    /// supports this Newton-3 mode.
    ///
    /// Grid-dependent constraints (slab counts versus threads) are checked
    /// separately during enumeration.
    pub fn is_applicable(&self) -> bool {
        self.traversal.compatible_container() == self.container
            && match self.newton3 {
                Newton3::Enabled => self.traversal.supports_newton3(),
                Newton3::Disabled => self.traversal.supports_non_newton3(),
            }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{:?}, {:?}, {:?}, {:?}}}",
            self.container, self.traversal, self.layout, self.newton3
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c08_is_newton3_only() {
        assert!(TraversalKind::C08.supports_newton3());
        assert!(!TraversalKind::C08.supports_non_newton3());
    }

    #[test]
    fn c01_is_non_newton3_only() {
        assert!(!TraversalKind::C01.supports_newton3());
        assert!(TraversalKind::C01.supports_non_newton3());
    }

    #[test]
    fn applicability_rejects_mismatched_container() {
        let bad = Configuration::new(
            ContainerKind::DirectSum,
            TraversalKind::C08,
            DataLayout::Aos,
            Newton3::Enabled,
        );
        assert!(!bad.is_applicable());

        let good = Configuration::new(
            ContainerKind::LinkedCells,
            TraversalKind::C08,
            DataLayout::Aos,
            Newton3::Enabled,
        );
        assert!(good.is_applicable());
    }

    #[test]
    fn configurations_order_by_container_first() {
        let a = Configuration::new(
            ContainerKind::DirectSum,
            TraversalKind::DsSequential,
            DataLayout::Soa,
            Newton3::Disabled,
        );
        let b = Configuration::new(
            ContainerKind::LinkedCells,
            TraversalKind::C01,
            DataLayout::Aos,
            Newton3::Disabled,
        );
        assert!(a < b);
    }
}
