//! Shared helpers for the engine integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use kernel::{Functor, Ownership, Particle, SoaBuffer};

/// Counts AoS kernel invocations and applies a unit repulsion along x so
/// force propagation is observable without a physical potential.
pub struct CountingFunctor {
    aos_calls: AtomicUsize,
    pub newton3: bool,
    pub non_newton3: bool,
}

impl CountingFunctor {
    pub fn new() -> Self {
        Self {
            aos_calls: AtomicUsize::new(0),
            newton3: true,
            non_newton3: true,
        }
    }

    pub fn aos_count(&self) -> usize {
        self.aos_calls.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.aos_calls.store(0, Ordering::Relaxed);
    }
}

impl Functor for CountingFunctor {
    fn aos(&self, pi: &mut Particle, pj: &mut Particle, newton3: bool) {
        if pi.ownership == Ownership::Dummy || pj.ownership == Ownership::Dummy {
            return;
        }
        self.aos_calls.fetch_add(1, Ordering::Relaxed);
        pi.add_force([1.0, 0.0, 0.0]);
        if newton3 {
            pj.sub_force([1.0, 0.0, 0.0]);
        }
    }

    fn soa_single(&self, buf: &mut SoaBuffer, _newton3: bool) {
        let n = buf.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if buf.ownership[i] != Ownership::Dummy && buf.ownership[j] != Ownership::Dummy {
                    buf.fx[i] += 1.0;
                    buf.fx[j] -= 1.0;
                }
            }
        }
    }

    fn soa_pair(&self, a: &mut SoaBuffer, b: &mut SoaBuffer, newton3: bool) {
        for i in 0..a.len() {
            for j in 0..b.len() {
                if a.ownership[i] != Ownership::Dummy && b.ownership[j] != Ownership::Dummy {
                    a.fx[i] += 1.0;
                    if newton3 {
                        b.fx[j] -= 1.0;
                    }
                }
            }
        }
    }

    fn soa_verlet(
        &self,
        buf: &mut SoaBuffer,
        neighbor_lists: &[Vec<usize>],
        from: usize,
        to: usize,
        newton3: bool,
    ) {
        for i in from..to {
            for &j in &neighbor_lists[i] {
                if buf.ownership[i] != Ownership::Dummy && buf.ownership[j] != Ownership::Dummy {
                    buf.fx[i] += 1.0;
                    if newton3 {
                        buf.fx[j] -= 1.0;
                    }
                }
            }
        }
    }

    fn allows_newton3(&self) -> bool {
        self.newton3
    }

    fn allows_non_newton3(&self) -> bool {
        self.non_newton3
    }
}

/// `count` particles uniformly sampled in `[box_min, box_max)`.
pub fn random_particles(
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
