//! The functor capability surface: what a force-law provider must implement.

use crate::particle::Particle;
use crate::soa::SoaBuffer;

/// A pairwise interaction kernel with AoS and SoA entry points.
///
/// The engine never filters pairs by cutoff itself; the kernel is
/// authoritative on what "within cutoff" means for its potential and gets
/// every candidate pair the schedule produces. Implementations must be pure
/// with respect to the engine's data: a call may only touch the force fields
/// of the particles it is handed.
///
/// # Contract
///
/// * `newton3 == true`: the kernel applies the symmetric update, writing the
///   forces of both particles (or both buffers).
/// * `newton3 == false`: the kernel writes only the first particle/buffer and
///   must neither read nor write the second one's force. One-directional
///   schedules exploit this to run without neighbor locks.
/// * Particles or lanes in the `Dummy` ownership state must produce no
///   observable effect regardless of their coordinates.
pub trait Functor: Send + Sync {
    /// Pair kernel on two particle records.
    fn aos(&self, pi: &mut Particle, pj: &mut Particle, newton3: bool);

    /// All pairs within one buffer.
    ///
    /// Same-storage pairs are visited once; the kernel applies the symmetric
    /// update internally, independent of the configured Newton-3 mode.
    fn soa_single(&self, buf: &mut SoaBuffer, newton3: bool);

    /// Cross pairs between two buffers.
    fn soa_pair(&self, a: &mut SoaBuffer, b: &mut SoaBuffer, newton3: bool);

    /// Neighbor-list kernel for list-based containers: for every particle
    /// `i` in `from..to`, interact with each index in `neighbor_lists[i]`.
    fn soa_verlet(
        &self,
        buf: &mut SoaBuffer,
        neighbor_lists: &[Vec<usize>],
        from: usize,
        to: usize,
        newton3: bool,
    );

    /// Gather `particles` into `buf` starting at `offset`.
    ///
    /// The default copies position, force, id, type, and ownership; override
    /// only if the kernel needs additional per-particle attributes staged.
    fn soa_load(&self, particles: &[Particle], buf: &mut SoaBuffer, offset: usize) {
        buf.resize(offset + particles.len());
        for (i, p) in particles.iter().enumerate() {
            buf.set(offset + i, p.pos, p.force, p.id, p.type_id, p.ownership);
        }
    }

    /// Scatter forces from `buf` back into `particles` starting at `offset`.
    fn soa_extract(&self, particles: &mut [Particle], buf: &SoaBuffer, offset: usize) {
        for (i, p) in particles.iter_mut().enumerate() {
            debug_assert_eq!(p.id, buf.id[offset + i], "extract order diverged from load");
            p.force = [buf.fx[offset + i], buf.fy[offset + i], buf.fz[offset + i]];
        }
    }

    /// Whether the kernel supports the symmetric (Newton-3) update.
    fn allows_newton3(&self) -> bool;

    /// Whether the kernel supports the one-directional update.
    fn allows_non_newton3(&self) -> bool;

    /// Whether iterations with this functor should feed tuner samples.
    ///
    /// Auxiliary passes (observables, diagnostics) return `false` so their
    /// unrepresentative timings never influence configuration selection.
    fn is_relevant_for_tuning(&self) -> bool {
        true
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::CountingFunctor;
    use super::*;
    use crate::particle::{Ownership, Particle};

    #[test]
    fn default_load_extract_roundtrip() {
        let f = CountingFunctor::new();
        let mut particles = vec![Particle::new([1.0, 2.0, 3.0], 10), Particle::new([4.0; 3], 11)];
        particles[0].force = [0.5, 0.0, 0.0];

        let mut buf = SoaBuffer::new();
        f.soa_load(&particles, &mut buf, 0);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.x[1], 4.0);
        assert_eq!(buf.fx[0], 0.5);

        buf.fy[1] = 7.0;
        f.soa_extract(&mut particles, &buf, 0);
        assert_eq!(particles[1].force[1], 7.0);
        assert_eq!(particles[0].force[0], 0.5);
    }

    #[test]
    fn load_with_offset_appends() {
        let f = CountingFunctor::new();
        let first = vec![Particle::new([0.0; 3], 0)];
        let second = vec![Particle::new([1.0; 3], 1), Particle::new([2.0; 3], 2)];

        let mut buf = SoaBuffer::new();
        f.soa_load(&first, &mut buf, 0);
        f.soa_load(&second, &mut buf, 1);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.id[2], 2);
    }

    #[test]
    fn counting_functor_skips_dummies() {
        let f = CountingFunctor::new();
        let mut pi = Particle::new([0.0; 3], 0);
        let mut pj = Particle::dummy([0.0; 3], u64::MAX);
        f.aos(&mut pi, &mut pj, true);
        assert_eq!(f.aos_count(), 0);
        assert_eq!(pi.force, [0.0; 3]);

        pj.ownership = Ownership::Owned;
        f.aos(&mut pi, &mut pj, true);
        assert_eq!(f.aos_count(), 1);
    }
}
