//! Initial particle placement: seeded random filling and regular grids.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use kernel::Particle;

use crate::config::ScenarioConfig;

/// Generate the initial particle set for a scenario.
pub fn generate(
    scenario: &ScenarioConfig,
    box_min: [f64; 3],
    box_max: [f64; 3],
) -> Vec<Particle> {
    match *scenario {
        ScenarioConfig::UniformRandom { count, seed } => {
            uniform_random(count, seed, box_min, box_max)
        }
        ScenarioConfig::Grid { per_dim } => regular_grid(per_dim, box_min, box_max),
    }
}

/// `count` particles sampled uniformly in `[box_min, box_max)`.
pub fn uniform_random(
    count: usize,
    seed: u64,
    box_min: [f64; 3],
    box_max: [f64; 3],
) -> Vec<Particle> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..count)
        .map(|id| {
            let pos = [
                rng.gen_range(box_min[0]..box_max[0]),
                rng.gen_range(box_min[1]..box_max[1]),
                rng.gen_range(box_min[2]..box_max[2]),
            ];
            Particle::new(pos, id as u64)
        })
        .collect()
}

/// `per_dim`^3 particles, one per lattice cell center.
pub fn regular_grid(per_dim: usize, box_min: [f64; 3], box_max: [f64; 3]) -> Vec<Particle> {
    let mut particles = Vec::with_capacity(per_dim * per_dim * per_dim);
    let spacing = [
        (box_max[0] - box_min[0]) / per_dim as f64,
        (box_max[1] - box_min[1]) / per_dim as f64,
        (box_max[2] - box_min[2]) / per_dim as f64,
    ];
    let mut id = 0;
    for i in 0..per_dim {
        for j in 0..per_dim {
            for k in 0..per_dim {
                let pos = [
                    box_min[0] + (i as f64 + 0.5) * spacing[0],
                    box_min[1] + (j as f64 + 0.5) * spacing[1],
                    box_min[2] + (k as f64 + 0.5) * spacing[2],
                ];
                particles.push(Particle::new(pos, id));
                id += 1;
            }
        }
    }
    particles
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::math;

    #[test]
    fn uniform_random_is_reproducible() {
        let a = uniform_random(50, 7, [0.0; 3], [10.0; 3]);
        let b = uniform_random(50, 7, [0.0; 3], [10.0; 3]);
        assert_eq!(a, b, "same seed, same particles");

        let c = uniform_random(50, 8, [0.0; 3], [10.0; 3]);
        assert_ne!(a, c, "different seed, different particles");
    }

    #[test]
    fn all_random_particles_inside_box() {
        let particles = uniform_random(200, 3, [1.0; 3], [4.0; 3]);
        assert_eq!(particles.len(), 200);
        for p in &particles {
            assert!(math::in_box(p.pos, [1.0; 3], [4.0; 3]));
        }
    }

    #[test]
    fn ids_are_unique() {
        let particles = uniform_random(100, 1, [0.0; 3], [10.0; 3]);
        let mut ids: Vec<u64> = particles.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn grid_count_and_spacing() {
        let particles = regular_grid(3, [0.0; 3], [3.0; 3]);
        assert_eq!(particles.len(), 27);
        assert_eq!(particles[0].pos, [0.5; 3]);
        for p in &particles {
            assert!(math::in_box(p.pos, [0.0; 3], [3.0; 3]));
        }
    }
}
