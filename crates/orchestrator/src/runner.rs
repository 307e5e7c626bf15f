//! Velocity-Verlet time loop driving the tuned engine.
//!
//! Unit particle mass throughout (reduced MD units). Each step:
//!
//! 1. Half-kick and drift from the previous step's forces.
//! 2. If a rebuild is coming, `update` the container, wrap leavers across
//!    periodic faces, and re-insert them; refresh the periodic halo either
//!    way.
//! 3. Zero forces, run `compute_interactions`.
//! 4. Second half-kick.

use kernel::{halo, IterateBehavior, KernelError, Particle, Simulator};

use crate::lj::LjFunctor;

/// Owns the engine and functor and advances the simulation in time.
pub struct SimulationRunner {
    sim: Simulator,
    functor: LjFunctor,
    dt: f64,
    step_count: u64,
    /// Forces are garbage until the first force evaluation has run.
    needs_init: bool,
}

impl SimulationRunner {
    /// Wrap an engine and functor into a runner with time step `dt`.
    pub fn new(sim: Simulator, functor: LjFunctor, dt: f64) -> Self {
        Self {
            sim,
            functor,
            dt,
            step_count: 0,
            needs_init: true,
        }
    }

    /// Immutable access to the engine.
    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    /// Mutable access to the engine (scenario setup, halo exchange).
    pub fn simulator_mut(&mut self) -> &mut Simulator {
        &mut self.sim
    }

    /// Completed time steps.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Advance one time step.
    pub fn step(&mut self) -> Result<(), KernelError> {
        let dt = self.dt;
        let half_dt = 0.5 * dt;

        // Bootstrap: the very first half-kick needs forces.
        if self.needs_init {
            self.sim.exchange_periodic_halo();
            self.compute_forces()?;
            self.needs_init = false;
        }

        // Half-kick and drift.
        self.sim.for_each_mut(
            &mut |p: &mut Particle| {
                for d in 0..3 {
                    p.vel[d] += p.force[d] * half_dt;
                    p.pos[d] += p.vel[d] * dt;
                }
            },
            IterateBehavior::Owned,
        );

        // Container maintenance. The update/wrap/re-insert path runs only on
        // iterations that rebuild; in between, halo images just get their
        // positions refreshed.
        if self.sim.will_rebuild() {
            let leavers = self.sim.update();
            let (box_min, box_max) = (self.sim.options().box_min, self.sim.options().box_max);
            for mut p in leavers {
                p.pos = halo::wrap_into_box(p.pos, box_min, box_max);
                self.sim.add_owned(p)?;
            }
        }
        self.sim.exchange_periodic_halo();

        self.compute_forces()?;

        // Second half-kick.
        self.sim.for_each_mut(
            &mut |p: &mut Particle| {
                for d in 0..3 {
                    p.vel[d] += p.force[d] * half_dt;
                }
            },
            IterateBehavior::Owned,
        );

        self.step_count += 1;
        Ok(())
    }

    /// Run `n` steps.
    pub fn run(&mut self, n: u64) -> Result<(), KernelError> {
        for i in 0..n {
            self.step()?;
            if (i + 1) % 100 == 0 {
                tracing::debug!(
                    "step {}/{}: config {}, {} rebuilds so far",
                    i + 1,
                    n,
                    self.sim.current_config(),
                    self.sim.rebuild_count()
                );
            }
        }
        tracing::info!(
            "run finished after {} steps with {}",
            self.step_count,
            self.sim.current_config()
        );
        Ok(())
    }

    fn compute_forces(&mut self) -> Result<(), KernelError> {
        self.sim.for_each_mut(
            &mut |p: &mut Particle| p.force = [0.0; 3],
            IterateBehavior::OwnedOrHalo,
        );
        self.sim.compute_interactions(&self.functor)?;
        Ok(())
    }
}
