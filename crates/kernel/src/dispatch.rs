//! Binding a functor to a schedule: pair issuance rules and disjoint access.
//!
//! The dispatcher is the single place that knows how often a kernel gets
//! called for a pair of cells:
//!
//! * Newton-3 on: once per unordered cross-cell pair, symmetric update.
//! * Newton-3 off: twice per cross-cell pair, once per direction, each call
//!   writing only its first argument.
//! * Same-cell pairs: once in either mode; the kernel applies the symmetric
//!   update internally (within one cell there is no disjointness concern).

use std::marker::PhantomData;

use crate::cell::{OwnershipMask, ParticleCell};
use crate::functor::Functor;
use crate::options::{DataLayout, Newton3};
use crate::particle::Particle;
use crate::soa::SoaBuffer;

/// Dispatches cell and cell-pair work onto a functor for one traversal run.
pub(crate) struct PairDispatcher<'f, F: Functor> {
    functor: &'f F,
    layout: DataLayout,
    newton3: bool,
}

impl<'f, F: Functor> PairDispatcher<'f, F> {
    pub fn new(functor: &'f F, layout: DataLayout, newton3: Newton3) -> Self {
        Self {
            functor,
            layout,
            newton3: newton3.as_bool(),
        }
    }

    /// Whether a cell pair can be skipped entirely because neither side can
    /// contain an owned particle. Halo forces are never observed.
    #[inline]
    pub fn skippable(a: &ParticleCell, b: &ParticleCell) -> bool {
        a.mask() == OwnershipMask::HALO && b.mask() == OwnershipMask::HALO
    }

    /// All pairs within one cell, issued once with the symmetric kernel path.
    pub fn process_cell(&self, cell: &mut ParticleCell) {
        if cell.mask() == OwnershipMask::HALO {
            return;
        }
        match self.layout {
            DataLayout::Aos => self.aos_slice_symmetric(cell.particles_mut()),
            DataLayout::Soa => self.functor.soa_single(&mut cell.soa, self.newton3),
        }
    }

    /// All cross pairs between two distinct cells.
    pub fn process_cell_pair(&self, a: &mut ParticleCell, b: &mut ParticleCell) {
        match self.layout {
            DataLayout::Aos => {
                if self.newton3 {
                    self.aos_slice_pair_newton3(a.particles_mut(), b.particles_mut());
                } else {
                    let (pa, pb) = (a.particles_mut(), b.particles_mut());
                    for pi in pa.iter_mut() {
                        for pj in pb.iter_mut() {
                            self.functor.aos(pi, pj, false);
                            self.functor.aos(pj, pi, false);
                        }
                    }
                }
            }
            DataLayout::Soa => {
                if self.newton3 {
                    self.functor.soa_pair(&mut a.soa, &mut b.soa, true);
                } else {
                    self.functor.soa_pair(&mut a.soa, &mut b.soa, false);
                    self.functor.soa_pair(&mut b.soa, &mut a.soa, false);
                }
            }
        }
    }

    /// One-directional pair processing against an immutable neighbor image.
    ///
    /// Used by the single-color schedule: only the base cell is written, so
    /// the neighbor side is a snapshot taken before the parallel region.
    /// Kernel calls still receive a mutable particle, but its force is
    /// scratch and discarded.
    pub fn process_pair_one_way_aos(&self, base: &mut ParticleCell, image: &[Particle]) {
        for pi in base.particles_mut() {
            for pj in image {
                let mut scratch = pj.clone();
                self.functor.aos(pi, &mut scratch, false);
            }
        }
    }

    /// SoA variant of [`Self::process_pair_one_way_aos`].
    pub fn process_pair_one_way_soa(&self, base: &mut ParticleCell, image: &SoaBuffer) {
        let mut scratch = image.clone();
        self.functor.soa_pair(&mut base.soa, &mut scratch, false);
    }

    /// All pairs within one particle slice, symmetric update. The intra-
    /// cluster analog of [`Self::process_cell`].
    pub fn aos_slice_symmetric(&self, particles: &mut [Particle]) {
        let n = particles.len();
        for i in 0..n {
            let (head, tail) = particles.split_at_mut(i + 1);
            let pi = &mut head[i];
            for pj in tail.iter_mut() {
                self.functor.aos(pi, pj, true);
            }
        }
    }

    /// Cross pairs between two slices with the symmetric update.
    pub fn aos_slice_pair_newton3(&self, a: &mut [Particle], b: &mut [Particle]) {
        for pi in a.iter_mut() {
            for pj in b.iter_mut() {
                self.functor.aos(pi, pj, true);
            }
        }
    }

    /// Cross pairs between two slices, writing only `a`. The reverse
    /// direction is issued when the schedule visits `b`'s own list entry.
    pub fn aos_slice_pair_one_way(&self, a: &mut [Particle], b: &mut [Particle]) {
        for pi in a.iter_mut() {
            for pj in b.iter_mut() {
                self.functor.aos(pi, pj, false);
            }
        }
    }
}

/// Raw view over a slice handed to parallel schedule bodies.
///
/// Colored traversals prove that concurrently processed base steps touch
/// disjoint index sets; this view turns that proof into mutable access
/// without locks. Lock-based traversals uphold the same exclusivity with the
/// traversal's cell-indexed lock table instead.
pub(crate) struct DisjointView<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// Safety: the view never hands out overlapping references by itself; every
// access goes through the unsafe accessors whose callers assert disjointness.
unsafe impl<T: Send> Send for DisjointView<'_, T> {}
unsafe impl<T: Send> Sync for DisjointView<'_, T> {}

impl<'a, T> DisjointView<'a, T> {
    pub fn new(items: &'a mut [T]) -> Self {
        Self {
            ptr: items.as_mut_ptr(),
            len: items.len(),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Exclusive access to element `i`.
    ///
    /// # Safety
    /// No other reference to element `i` may exist for the lifetime of the
    /// returned borrow. Colored schedules guarantee this through color
    /// disjointness, lock-based schedules through held locks.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, i: usize) -> &mut T {
        debug_assert!(i < self.len);
        &mut *self.ptr.add(i)
    }

    /// Exclusive access to two distinct elements at once.
    ///
    /// # Safety
    /// Same as [`Self::get_mut`], for both indices.
    pub unsafe fn pair_mut(&self, i: usize, j: usize) -> (&mut T, &mut T) {
        debug_assert!(i != j, "pair indices must differ");
        debug_assert!(i < self.len && j < self.len);
        (&mut *self.ptr.add(i), &mut *self.ptr.add(j))
    }

    /// Shared access to element `i`.
    ///
    /// # Safety
    /// No mutable reference to element `i` may exist concurrently.
    pub unsafe fn get(&self, i: usize) -> &T {
        debug_assert!(i < self.len);
        &*self.ptr.add(i)
    }
}

/// View over the uniform cell grid.
pub(crate) type CellGridView<'a> = DisjointView<'a, ParticleCell>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::OwnershipMask;
    use crate::functor::test_support::CountingFunctor;
    use crate::particle::Particle;

    fn cell_with(n: usize, id0: u64) -> ParticleCell {
        let mut c = ParticleCell::new(OwnershipMask::ANY, [1.0; 3]);
        for k in 0..n {
            c.push(Particle::new([k as f64 * 0.1; 3], id0 + k as u64));
        }
        c
    }

    #[test]
    fn same_cell_pairs_issued_once() {
        let f = CountingFunctor::new();
        let d = PairDispatcher::new(&f, DataLayout::Aos, Newton3::Disabled);
        let mut cell = cell_with(4, 0);
        d.process_cell(&mut cell);
        // 4 choose 2
        assert_eq!(f.aos_count(), 6);
    }

    #[test]
    fn cross_cell_doubles_without_newton3() {
        let f = CountingFunctor::new();
        let d = PairDispatcher::new(&f, DataLayout::Aos, Newton3::Enabled);
        let mut a = cell_with(3, 0);
        let mut b = cell_with(2, 10);
        d.process_cell_pair(&mut a, &mut b);
        assert_eq!(f.aos_count(), 6, "3x2 pairs once under newton3");

        let f2 = CountingFunctor::new();
        let d2 = PairDispatcher::new(&f2, DataLayout::Aos, Newton3::Disabled);
        d2.process_cell_pair(&mut a, &mut b);
        assert_eq!(f2.aos_count(), 12, "3x2 pairs twice without newton3");
    }

    #[test]
    fn one_way_image_leaves_neighbor_untouched() {
        let f = CountingFunctor::new();
        let d = PairDispatcher::new(&f, DataLayout::Aos, Newton3::Disabled);
        let mut base = cell_with(2, 0);
        let image: Vec<Particle> = cell_with(3, 10).take_particles();
        d.process_pair_one_way_aos(&mut base, &image);
        assert_eq!(f.aos_count(), 6);
        // Base accumulated one unit per pair, image stayed force-free.
        assert_eq!(base.particles()[0].force[0], 3.0);
        assert!(image.iter().all(|p| p.force == [0.0; 3]));
    }

    #[test]
    fn halo_halo_pairs_are_skippable() {
        let a = ParticleCell::new(OwnershipMask::HALO, [1.0; 3]);
        let b = ParticleCell::new(OwnershipMask::HALO, [1.0; 3]);
        let c = ParticleCell::new(OwnershipMask::OWNED, [1.0; 3]);
        assert!(PairDispatcher::<CountingFunctor>::skippable(&a, &b));
        assert!(!PairDispatcher::<CountingFunctor>::skippable(&a, &c));
    }

    #[test]
    fn disjoint_view_pair() {
        let mut cells = vec![cell_with(1, 0), cell_with(1, 1), cell_with(1, 2)];
        let view = DisjointView::new(&mut cells);
        let (a, b) = unsafe { view.pair_mut(0, 2) };
        a.particles_mut()[0].force[0] = 1.0;
        b.particles_mut()[0].force[0] = 2.0;
        drop((a, b));
        assert_eq!(cells[0].particles()[0].force[0], 1.0);
        assert_eq!(cells[2].particles()[0].force[0], 2.0);
    }

    #[test]
    fn slice_pair_one_way_writes_first_only() {
        let f = CountingFunctor::new();
        let d = PairDispatcher::new(&f, DataLayout::Aos, Newton3::Disabled);
        let mut a = vec![Particle::new([0.0; 3], 0)];
        let mut b = vec![Particle::new([0.1; 3], 1), Particle::new([0.2; 3], 2)];
        d.aos_slice_pair_one_way(&mut a, &mut b);
        assert_eq!(a[0].force[0], 2.0);
        assert!(b.iter().all(|p| p.force == [0.0; 3]));
    }
}
