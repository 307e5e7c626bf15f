//! Periodic halo images and the leaver/wrap discipline.

use kernel::{
    halo, IterateBehavior, Ownership, Particle, Simulator, SimulatorOptions, TunerOptions,
};

fn options() -> SimulatorOptions {
    SimulatorOptions {
        box_min: [0.0; 3],
        box_max: [10.0; 3],
        cutoff: 1.0,
        skin_per_timestep: 0.02,
        rebuild_frequency: 10,
        cluster_size: 4,
    }
}

#[test]
fn face_particle_yields_one_halo_image() {
    let mut sim = Simulator::new(options(), TunerOptions::default()).unwrap();
    sim.add_owned(Particle::new([0.5, 5.0, 5.0], 0)).unwrap();

    let created = sim.exchange_periodic_halo();
    assert_eq!(created, 1);

    // The +x halo shell: x in [10, 11.2).
    let mut images = Vec::new();
    sim.region_for_each(
        [10.0, 0.0, 0.0],
        [11.2, 10.0, 10.0],
        &mut |p| images.push(p.clone()),
        IterateBehavior::Halo,
    );
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].pos, [10.5, 5.0, 5.0]);
    assert_eq!(images[0].id, 0);
    assert_eq!(images[0].ownership, Ownership::Halo);

    // The owned behavior filter must not see the image.
    let mut owned_in_shell = 0;
    sim.region_for_each(
        [10.0, 0.0, 0.0],
        [11.2, 10.0, 10.0],
        &mut |_| owned_in_shell += 1,
        IterateBehavior::Owned,
    );
    assert_eq!(owned_in_shell, 0);
}

#[test]
fn repeated_exchange_updates_rather_than_duplicates() {
    let mut sim = Simulator::new(options(), TunerOptions::default()).unwrap();
    sim.add_owned(Particle::new([0.5, 5.0, 5.0], 0)).unwrap();

    sim.exchange_periodic_halo();
    // Drift the source within the skin and exchange again.
    sim.for_each_mut(&mut |p| p.pos[1] += 0.05, IterateBehavior::Owned);
    sim.exchange_periodic_halo();

    let mut halos = Vec::new();
    sim.for_each(&mut |p| halos.push(p.clone()), IterateBehavior::Halo);
    assert_eq!(halos.len(), 1, "image refreshed in place");
    assert_eq!(halos[0].pos, [10.5, 5.05, 5.0]);
}

#[test]
fn wrap_and_reinsert_leaver() {
    let mut sim = Simulator::new(options(), TunerOptions::default()).unwrap();
    sim.add_owned(Particle::new([9.9, 5.0, 5.0], 0)).unwrap();

    // Integrator pushes the particle across the +x face.
    sim.for_each_mut(&mut |p| p.pos[0] = 10.3, IterateBehavior::Owned);
    let leavers = sim.update();
    assert_eq!(leavers.len(), 1);
    assert_eq!(leavers[0].pos[0], 10.3, "leaver position is raw");

    // The single-domain discipline: wrap and re-insert.
    for mut p in leavers {
        p.pos = halo::wrap_into_box(p.pos, [0.0; 3], [10.0; 3]);
        sim.add_owned(p).unwrap();
    }
    let mut positions = Vec::new();
    sim.for_each(&mut |p| positions.push(p.pos), IterateBehavior::Owned);
    assert_eq!(positions.len(), 1);
    assert!((positions[0][0] - 0.3).abs() < 1e-12, "re-entered at the -x side");
}

#[test]
fn bulk_halo_addition_reports_rejects() {
    let mut sim = Simulator::new(options(), TunerOptions::default()).unwrap();
    let good = Particle::new([-0.5, 5.0, 5.0], 1);
    let inside = Particle::new([5.0; 3], 2);
    let far = Particle::new([20.0, 5.0, 5.0], 3);

    let rejected = sim.add_halo_bulk(vec![good, inside, far]);
    assert_eq!(rejected.len(), 2, "in-box and out-of-shell particles bounce");

    let mut halos = 0;
    sim.for_each(&mut |_| halos += 1, IterateBehavior::Halo);
    assert_eq!(halos, 1);
}

#[test]
fn corner_particle_yields_seven_images() {
    let mut sim = Simulator::new(options(), TunerOptions::default()).unwrap();
    sim.add_owned(Particle::new([0.2, 0.2, 0.2], 0)).unwrap();
    let created = sim.exchange_periodic_halo();
    assert_eq!(created, 7);

    let mut halos = 0;
    sim.for_each(&mut |_| halos += 1, IterateBehavior::Halo);
    assert_eq!(halos, 7);
}
