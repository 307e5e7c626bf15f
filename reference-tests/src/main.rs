//! Reference suite binary: parity scenarios, analytical checks, and an
//! optional configuration sweep.

use kernel::SimulatorOptions;
use reference_tests::{analytical, benchmarks, standard_scenarios};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut failures = 0;

    println!("=== Analytical checks ===");
    for check in analytical::all_checks() {
        let status = if check.passed { "PASS" } else { "FAIL" };
        println!("  [{status}] {:<16} error {:.3e}", check.name, check.error);
        if !check.passed {
            failures += 1;
        }
    }

    println!("\n=== Cross-configuration parity ===");
    for scenario in standard_scenarios() {
        match scenario.run() {
            Ok(result) => {
                let status = if result.passed { "PASS" } else { "FAIL" };
                println!("  [{status}] {}", result.name);
                for check in &result.checks {
                    let mark = if check.passed { "ok  " } else { "FAIL" };
                    println!(
                        "      {mark} {:<60} max dev {:.3e}",
                        check.configuration.to_string(),
                        check.max_deviation
                    );
                }
                if !result.passed {
                    failures += 1;
                }
            }
            Err(e) => {
                println!("  [FAIL] {}: {e}", scenario.name);
                failures += 1;
            }
        }
    }

    if std::env::args().any(|a| a == "--sweep") {
        println!("\n=== Configuration sweep (2000 particles) ===");
        let domain = SimulatorOptions {
            box_min: [0.0; 3],
            box_max: [12.0; 3],
            cutoff: 1.0,
            skin_per_timestep: 0.02,
            rebuild_frequency: 10,
            cluster_size: 4,
        };
        let rows = benchmarks::sweep_configurations(&domain, 2000, 10);
        benchmarks::print_sweep(&rows);
    }

    if failures > 0 {
        println!("\n{failures} check(s) failed");
        std::process::exit(1);
    }
    println!("\nAll checks passed");
}
