//! Periodic wrap and halo-image generation.
//!
//! The single-domain face of the halo/migration discipline: leavers get
//! wrapped back across the box, and owned particles near a periodic face get
//! mirrored into the opposite halo shell. In a multi-domain setting the
//! distributed layer performs the equivalent exchange through the engine's
//! collect/add capability surface.

use crate::particle::{Ownership, Particle};

/// Wrap a position into `[box_min, box_max)` by whole box extents.
pub fn wrap_into_box(mut pos: [f64; 3], box_min: [f64; 3], box_max: [f64; 3]) -> [f64; 3] {
    for d in 0..3 {
        let extent = box_max[d] - box_min[d];
        while pos[d] < box_min[d] {
            pos[d] += extent;
        }
        while pos[d] >= box_max[d] {
            pos[d] -= extent;
        }
    }
    pos
}

/// Periodic halo images of one owned particle.
///
/// For every combination of faces the particle sits within `width` of, an
/// image shifted by the box extent into the opposite halo shell is produced:
/// up to three for a corner particle, one for a face particle, none in the
/// interior.
pub fn periodic_images(
    p: &Particle,
    box_min: [f64; 3],
    box_max: [f64; 3],
    width: f64,
) -> Vec<Particle> {
    // Candidate shifts per dimension; 0 is always an option.
    let mut shifts: [Vec<f64>; 3] = [vec![0.0], vec![0.0], vec![0.0]];
    for d in 0..3 {
        let extent = box_max[d] - box_min[d];
        if p.pos[d] < box_min[d] + width {
            shifts[d].push(extent);
        }
        if p.pos[d] >= box_max[d] - width {
            shifts[d].push(-extent);
        }
    }

    let mut images = Vec::new();
    for &sx in &shifts[0] {
        for &sy in &shifts[1] {
            for &sz in &shifts[2] {
                if sx == 0.0 && sy == 0.0 && sz == 0.0 {
                    continue;
                }
                let mut image = p.clone();
                image.pos = [p.pos[0] + sx, p.pos[1] + sy, p.pos[2] + sz];
                image.ownership = Ownership::Halo;
                images.push(image);
            }
        }
    }
    images
}
