//! Closed-form Lennard-Jones reference solutions.
//!
//! Small hand-checkable systems whose forces follow directly from the 12-6
//! force law F(r) = 24 eps (2 (sigma/r)^12 - (sigma/r)^6) / r, used to pin
//! the functor itself before any traversal machinery is trusted.

use kernel::{Functor, Particle};
use orchestrator::LjFunctor;

/// Radial 12-6 force magnitude at distance `r` (positive = repulsive).
pub fn lj_radial_force(r: f64, epsilon: f64, sigma: f64) -> f64 {
    let s6 = (sigma / r).powi(6);
    let s12 = s6 * s6;
    24.0 * epsilon * (2.0 * s12 - s6) / r
}

/// Outcome of one analytical check.
#[derive(Debug)]
pub struct AnalyticalCheck {
    /// Check name.
    pub name: &'static str,
    /// Whether the check held.
    pub passed: bool,
    /// Observed worst absolute error.
    pub error: f64,
}

/// Two particles on the x axis: the AoS kernel must reproduce the radial
/// force law and Newton's third law exactly.
pub fn two_particle_check(r: f64) -> AnalyticalCheck {
    let lj = LjFunctor::new(3.0, 1.0, 1.0, 0.0);
    let mut pi = Particle::new([0.0; 3], 0);
    let mut pj = Particle::new([r, 0.0, 0.0], 1);
    lj.aos(&mut pi, &mut pj, true);

    let expected = -lj_radial_force(r, 1.0, 1.0);
    let mut error = (pi.force[0] - expected).abs();
    for d in 0..3 {
        error = error.max((pi.force[d] + pj.force[d]).abs());
    }
    AnalyticalCheck {
        name: "two-particle",
        passed: error < 1e-12,
        error,
    }
}

/// Three collinear equidistant particles: the middle one feels zero net
/// force, the outer two mirror each other.
pub fn three_particle_check(spacing: f64) -> AnalyticalCheck {
    let lj = LjFunctor::new(5.0, 1.0, 1.0, 0.0);
    let mut particles = vec![
        Particle::new([0.0; 3], 0),
        Particle::new([spacing, 0.0, 0.0], 1),
        Particle::new([2.0 * spacing, 0.0, 0.0], 2),
    ];
    for i in 0..3 {
        let (head, tail) = particles.split_at_mut(i + 1);
        for pj in tail.iter_mut() {
            lj.aos(&mut head[i], pj, true);
        }
    }

    let mut error = particles[1].force[0].abs();
    error = error.max((particles[0].force[0] + particles[2].force[0]).abs());
    AnalyticalCheck {
        name: "three-particle",
        passed: error < 1e-12,
        error,
    }
}

/// Equilibrium distance: zero force at r = 2^(1/6) sigma.
pub fn equilibrium_check() -> AnalyticalCheck {
    let r = 2.0_f64.powf(1.0 / 6.0);
    let lj = LjFunctor::new(3.0, 1.0, 1.0, 0.0);
    let mut pi = Particle::new([0.0; 3], 0);
    let mut pj = Particle::new([r, 0.0, 0.0], 1);
    lj.aos(&mut pi, &mut pj, true);

    let error = pi.force.iter().map(|c| c.abs()).fold(0.0, f64::max);
    AnalyticalCheck {
        name: "equilibrium",
        passed: error < 1e-12,
        error,
    }
}

/// The full analytical suite.
pub fn all_checks() -> Vec<AnalyticalCheck> {
    vec![
        two_particle_check(1.05),
        two_particle_check(1.5),
        three_particle_check(1.2),
        equilibrium_check(),
    ]
}
