//! Particle record and ownership states.

use serde::{Deserialize, Serialize};

/// Ownership state of a particle with respect to the container it lives in.
///
/// Exactly one state applies at any time. Dummy particles exist only as
/// padding (cluster fill, soft deletion) and must never contribute to forces
/// or kinetic aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Ownership {
    /// The particle belongs to the owned region of this domain.
    Owned = 0,
    /// An image of a particle owned elsewhere (neighbor domain or periodic
    /// wrap), kept so cutoff pairs near the boundary need no special casing.
    Halo = 1,
    /// Placeholder without physical meaning.
    Dummy = 2,
}

/// A single particle in array-of-structures layout.
///
/// Plain data, no behavior beyond accessors. Force kernels mutate `force`;
/// the integrator mutates `pos` and `vel`; containers own the storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Position (simulation units).
    pub pos: [f64; 3],
    /// Velocity.
    pub vel: [f64; 3],
    /// Accumulated force for the current iteration.
    pub force: [f64; 3],
    /// Globally unique identifier.
    pub id: u64,
    /// Interaction type tag (index into whatever property table the force
    /// law provider keeps).
    pub type_id: u32,
    /// Current ownership state.
    pub ownership: Ownership,
}

impl Particle {
    /// Create an owned particle at `pos` with the given id.
    ///
    /// Velocity and force start at zero, the type tag at 0.
    pub fn new(pos: [f64; 3], id: u64) -> Self {
        Self {
            pos,
            vel: [0.0; 3],
            force: [0.0; 3],
            id,
            type_id: 0,
            ownership: Ownership::Owned,
        }
    }

    /// A padding particle at `pos`. Dummy ids come from the top of the id
    /// space so they never collide with real particles.
    pub fn dummy(pos: [f64; 3], id: u64) -> Self {
        Self {
            pos,
            vel: [0.0; 3],
            force: [0.0; 3],
            id,
            type_id: 0,
            ownership: Ownership::Dummy,
        }
    }

    /// Whether this particle is owned by the local domain.
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }

    /// Whether this particle is a halo image.
    #[inline]
    pub fn is_halo(&self) -> bool {
        self.ownership == Ownership::Halo
    }

    /// Whether this particle is padding.
    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.ownership == Ownership::Dummy
    }

    /// Accumulate `f` onto the force.
    #[inline]
    pub fn add_force(&mut self, f: [f64; 3]) {
        self.force[0] += f[0];
        self.force[1] += f[1];
        self.force[2] += f[2];
    }

    /// Subtract `f` from the force (the Newton-3 counter-update).
    #[inline]
    pub fn sub_force(&mut self, f: [f64; 3]) {
        self.force[0] -= f[0];
        self.force[1] -= f[1];
        self.force[2] -= f[2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_is_owned_and_at_rest() {
        let p = Particle::new([1.0, 2.0, 3.0], 42);
        assert_eq!(p.pos, [1.0, 2.0, 3.0]);
        assert_eq!(p.vel, [0.0; 3]);
        assert_eq!(p.force, [0.0; 3]);
        assert_eq!(p.id, 42);
        assert!(p.is_owned());
        assert!(!p.is_halo());
    }

    #[test]
    fn force_accumulation() {
        let mut p = Particle::new([0.0; 3], 0);
        p.add_force([1.0, 2.0, 3.0]);
        p.add_force([1.0, 0.0, -1.0]);
        assert_eq!(p.force, [2.0, 2.0, 2.0]);
        p.sub_force([2.0, 2.0, 2.0]);
        assert_eq!(p.force, [0.0; 3]);
    }

    #[test]
    fn ownership_repr() {
        assert_eq!(Ownership::Owned as u8, 0);
        assert_eq!(Ownership::Halo as u8, 1);
        assert_eq!(Ownership::Dummy as u8, 2);
    }
}
