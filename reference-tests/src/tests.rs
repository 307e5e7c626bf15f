//! Integration tests for the reference framework: agreement scenarios
//! between containers, layouts, and Newton-3 modes.

use kernel::{
    Configuration, ContainerKind, DataLayout, Newton3, SimulatorOptions, TraversalKind,
};

use crate::{
    analytical, forces_under, max_relative_deviation, reference_configuration, ParityScenario,
};

fn scenario_100() -> ParityScenario {
    ParityScenario {
        name: "s1".to_string(),
        particle_count: 100,
        seed: 42,
        domain: SimulatorOptions {
            box_min: [0.0; 3],
            box_max: [10.0; 3],
            cutoff: 1.0,
            skin_per_timestep: 0.02,
            rebuild_frequency: 10,
            cluster_size: 4,
        },
        epsilon: 1.0,
        sigma: 1.0,
        tolerance: 1e-12,
    }
}

fn lc(traversal: TraversalKind, layout: DataLayout, newton3: Newton3) -> Configuration {
    Configuration::new(ContainerKind::LinkedCells, traversal, layout, newton3)
}

#[test]
fn direct_sum_agrees_with_linked_cells_c08() {
    let s = scenario_100();
    let reference = forces_under(&s, reference_configuration()).unwrap();
    let candidate = forces_under(&s, lc(TraversalKind::C08, DataLayout::Aos, Newton3::Enabled))
        .unwrap();
    let dev = max_relative_deviation(&reference, &candidate);
    assert!(dev < 1e-13, "DirectSum vs LinkedCells c08 deviate by {dev:.3e}");
}

#[test]
fn soa_path_agrees_with_aos_path() {
    let s = scenario_100();
    let aos = forces_under(&s, lc(TraversalKind::C08, DataLayout::Aos, Newton3::Enabled)).unwrap();
    let soa = forces_under(&s, lc(TraversalKind::C08, DataLayout::Soa, Newton3::Enabled)).unwrap();
    let dev = max_relative_deviation(&aos, &soa);
    assert!(dev < 1e-12, "SoA vs AoS deviate by {dev:.3e}");
}

#[test]
fn newton3_off_agrees_with_newton3_on() {
    let s = scenario_100();
    let on = forces_under(&s, lc(TraversalKind::C18, DataLayout::Aos, Newton3::Enabled)).unwrap();
    let off = forces_under(&s, lc(TraversalKind::C18, DataLayout::Aos, Newton3::Disabled)).unwrap();
    let dev = max_relative_deviation(&on, &off);
    assert!(dev < 1e-12, "newton3 on vs off deviate by {dev:.3e}");
}

#[test]
fn cluster_lists_agree_with_reference() {
    let s = scenario_100();
    let reference = forces_under(&s, reference_configuration()).unwrap();
    for (layout, newton3) in [
        (DataLayout::Aos, Newton3::Enabled),
        (DataLayout::Aos, Newton3::Disabled),
        (DataLayout::Soa, Newton3::Enabled),
        (DataLayout::Soa, Newton3::Disabled),
    ] {
        let config = Configuration::new(
            ContainerKind::ClusterLists,
            TraversalKind::ClusterColoring,
            layout,
            newton3,
        );
        let candidate = forces_under(&s, config).unwrap();
        let dev = max_relative_deviation(&reference, &candidate);
        assert!(dev < 1e-12, "{config} deviates by {dev:.3e}");
    }
}

#[test]
fn full_standard_suite_passes() {
    for scenario in crate::standard_scenarios() {
        let result = scenario.run().unwrap();
        assert!(result.passed, "scenario {} failed: {:#?}", result.name, result.checks);
        assert!(!result.checks.is_empty(), "configuration space must be nonempty");
    }
}

#[test]
fn analytical_suite_passes() {
    for check in analytical::all_checks() {
        assert!(check.passed, "{} error {:.3e}", check.name, check.error);
    }
}
