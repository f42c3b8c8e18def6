//! `BoxField`: the distributed box-partitioned array container.
//!
//! A `BoxField` owns one contiguous buffer per box that its layout maps to
//! the local rank, each sized (box grown by the ghost width) × component
//! count. Buffers for non-local boxes are never allocated. The container is
//! deliberately not `Clone`: a deep copy is an expensive collective-scale
//! operation and must be spelled `duplicate()`.
//!
//! Elementwise operations here are purely local; anything that moves data
//! between partitions lives in [`crate::comm`] and [`crate::transfer`].

use std::ops::Range;
use std::sync::Arc;

use num_traits::Float;
use rayon::prelude::*;

use crate::data::arena::{MemoryArena, default_arena};
use crate::data::view::{ArrayView, ArrayViewMut, BoundsPolicy};
use crate::error::BoxFieldError;
use crate::geom::{IVec, IndexBox, IndexType, Layout};

pub(crate) struct LocalBox<V> {
    /// Global BoxArray index.
    pub(crate) index: usize,
    /// Ungrown valid region.
    pub(crate) valid: IndexBox,
    /// Valid region grown by the container ghost width; bounds of `data`.
    pub(crate) grown: IndexBox,
    pub(crate) data: Vec<V>,
}

/// Distributed container of per-box field data.
pub struct BoxField<V> {
    layout: Layout,
    ncomp: usize,
    ngrow: IVec,
    rank: usize,
    policy: BoundsPolicy,
    arena: Arc<dyn MemoryArena>,
    bytes: usize,
    pub(crate) local: Vec<LocalBox<V>>,
}

impl<V> Drop for BoxField<V> {
    fn drop(&mut self) {
        self.arena.release(self.bytes);
    }
}

impl<V: Clone + Default> BoxField<V> {
    /// Build a container over `layout` for the calling `rank`, with the
    /// default process arena.
    pub fn new(
        layout: &Layout,
        ncomp: usize,
        ngrow: IVec,
        rank: usize,
    ) -> Result<Self, BoxFieldError> {
        Self::with_arena(layout, ncomp, ngrow, rank, default_arena())
    }

    /// Build with an explicit arena handle.
    pub fn with_arena(
        layout: &Layout,
        ncomp: usize,
        ngrow: IVec,
        rank: usize,
        arena: Arc<dyn MemoryArena>,
    ) -> Result<Self, BoxFieldError> {
        if ncomp == 0 {
            return Err(BoxFieldError::ZeroComponents);
        }
        let mut local = Vec::new();
        let mut bytes = 0usize;
        for index in layout.local_indices(rank) {
            let valid = layout.bx(index);
            let grown = valid.grow(ngrow);
            let len = grown.num_points() * ncomp;
            bytes += len * std::mem::size_of::<V>();
            local.push(LocalBox {
                index,
                valid,
                grown,
                data: vec![V::default(); len],
            });
        }
        arena.reserve(bytes);
        Ok(BoxField {
            layout: layout.clone(),
            ncomp,
            ngrow,
            rank,
            policy: BoundsPolicy::default(),
            arena,
            bytes,
            local,
        })
    }

    /// Explicit deep copy (layout, ghost width, data, arena handle).
    pub fn duplicate(&self) -> Self {
        self.arena.reserve(self.bytes);
        BoxField {
            layout: self.layout.clone(),
            ncomp: self.ncomp,
            ngrow: self.ngrow,
            rank: self.rank,
            policy: self.policy,
            arena: Arc::clone(&self.arena),
            bytes: self.bytes,
            local: self
                .local
                .iter()
                .map(|lb| LocalBox {
                    index: lb.index,
                    valid: lb.valid,
                    grown: lb.grown,
                    data: lb.data.clone(),
                })
                .collect(),
        }
    }
}

impl<V> BoxField<V> {
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    #[inline]
    pub fn ngrow(&self) -> IVec {
        self.ngrow
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn index_type(&self) -> IndexType {
        self.layout.index_type()
    }

    #[inline]
    pub fn bounds_policy(&self) -> BoundsPolicy {
        self.policy
    }

    /// Validation mode applied to every view subsequently created.
    pub fn set_bounds_policy(&mut self, policy: BoundsPolicy) {
        self.policy = policy;
    }

    /// Number of locally owned boxes.
    #[inline]
    pub fn n_local(&self) -> usize {
        self.local.len()
    }

    /// Global indices of locally owned boxes, in BoxArray order.
    pub fn local_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.local.iter().map(|lb| lb.index)
    }

    pub(crate) fn slot_of(&self, index: usize) -> Result<usize, BoxFieldError> {
        self.local
            .binary_search_by_key(&index, |lb| lb.index)
            .map_err(|_| BoxFieldError::NotLocal(index))
    }

    /// Valid (ungrown) box of a local global index.
    pub fn valid_box(&self, index: usize) -> Result<IndexBox, BoxFieldError> {
        Ok(self.local[self.slot_of(index)?].valid)
    }

    /// Read-only view over the grown region of a locally owned box.
    pub fn view(&self, index: usize) -> Result<ArrayView<'_, V>, BoxFieldError> {
        let lb = &self.local[self.slot_of(index)?];
        Ok(ArrayView::new(&lb.data, &lb.grown, self.ncomp, self.policy))
    }

    /// Mutable view over the grown region of a locally owned box.
    pub fn view_mut(&mut self, index: usize) -> Result<ArrayViewMut<'_, V>, BoxFieldError> {
        let slot = self.slot_of(index)?;
        let policy = self.policy;
        let ncomp = self.ncomp;
        let lb = &mut self.local[slot];
        Ok(ArrayViewMut::new(&mut lb.data, &lb.grown, ncomp, policy))
    }

    /// Raw buffer of a locally owned box, in the view's affine layout.
    pub fn local_data(&self, index: usize) -> Result<&[V], BoxFieldError> {
        Ok(&self.local[self.slot_of(index)?].data)
    }

    /// Mutable raw buffer of a locally owned box.
    pub fn local_data_mut(&mut self, index: usize) -> Result<&mut [V], BoxFieldError> {
        let slot = self.slot_of(index)?;
        Ok(&mut self.local[slot].data)
    }

    /// Visit every local box read-only: `(global index, valid box, view)`.
    pub fn for_each_box<F>(&self, mut f: F)
    where
        F: FnMut(usize, &IndexBox, ArrayView<'_, V>),
    {
        for lb in &self.local {
            f(
                lb.index,
                &lb.valid,
                ArrayView::new(&lb.data, &lb.grown, self.ncomp, self.policy),
            );
        }
    }

    /// Visit every local box mutably, in parallel over boxes.
    ///
    /// The kernel must be a pure function of the view and its captured
    /// parameters: boxes are dispatched concurrently.
    pub fn par_for_each_box_mut<F>(&mut self, f: F)
    where
        V: Send + Sync,
        F: Fn(usize, &IndexBox, ArrayViewMut<'_, V>) + Send + Sync,
    {
        let (ncomp, policy) = (self.ncomp, self.policy);
        self.local.par_iter_mut().for_each(|lb| {
            f(
                lb.index,
                &lb.valid,
                ArrayViewMut::new(&mut lb.data, &lb.grown, ncomp, policy),
            )
        });
    }

    pub(crate) fn check_comps(&self, comps: &Range<usize>) {
        assert!(
            comps.end <= self.ncomp && comps.start <= comps.end,
            "component range {comps:?} exceeds {} components",
            self.ncomp
        );
    }

    pub(crate) fn check_ngrow(&self, ngrow: IVec) {
        assert!(
            IVec::ZERO.all_le(ngrow) && ngrow.all_le(self.ngrow),
            "ghost width {ngrow:?} exceeds allocated {:?}",
            self.ngrow
        );
    }

    /// Abort unless `self` and `other` share a partition; the precondition
    /// for every pairwise elementwise operation.
    pub(crate) fn check_pair<U>(&self, other: &BoxField<U>, ngrow: IVec) {
        assert!(
            self.layout == *other.layout(),
            "operands use different partitions"
        );
        assert_eq!(
            self.rank, other.rank,
            "operands constructed for different ranks"
        );
        self.check_ngrow(ngrow);
        other.check_ngrow(ngrow);
    }
}

/// Apply `f(dst, src)` cellwise over `region` for paired component ranges.
fn zip_region<V: Copy, F: Fn(V, V) -> V>(
    dst: &mut ArrayViewMut<'_, V>,
    dcomp: usize,
    src: &ArrayView<'_, V>,
    scomp: usize,
    ncomp: usize,
    region: &IndexBox,
    f: F,
) {
    for n in 0..ncomp {
        for p in region.points() {
            let v = f(
                dst.get(p[0], p[1], p[2], dcomp + n),
                src.get(p[0], p[1], p[2], scomp + n),
            );
            dst.set(p[0], p[1], p[2], dcomp + n, v);
        }
    }
}

impl<V: Float + Send + Sync> BoxField<V> {
    /// Set `comps` to `value` over the valid region grown by `ngrow`.
    pub fn set_val(&mut self, value: V, comps: Range<usize>, ngrow: IVec) {
        self.check_comps(&comps);
        self.check_ngrow(ngrow);
        self.map_in_place(comps, ngrow, move |_| value);
    }

    /// `a <- a + value`.
    pub fn plus(&mut self, value: V, comps: Range<usize>, ngrow: IVec) {
        self.check_comps(&comps);
        self.check_ngrow(ngrow);
        self.map_in_place(comps, ngrow, move |a| a + value);
    }

    /// `a <- a - value`.
    pub fn minus(&mut self, value: V, comps: Range<usize>, ngrow: IVec) {
        self.check_comps(&comps);
        self.check_ngrow(ngrow);
        self.map_in_place(comps, ngrow, move |a| a - value);
    }

    /// `a <- a * value`.
    pub fn mult(&mut self, value: V, comps: Range<usize>, ngrow: IVec) {
        self.check_comps(&comps);
        self.check_ngrow(ngrow);
        self.map_in_place(comps, ngrow, move |a| a * value);
    }

    /// `a <- -a`.
    pub fn negate(&mut self, comps: Range<usize>, ngrow: IVec) {
        self.check_comps(&comps);
        self.check_ngrow(ngrow);
        self.map_in_place(comps, ngrow, |a| -a);
    }

    /// `a <- a / value`. Division by zero is intentionally unguarded.
    pub fn divide(&mut self, value: V, comps: Range<usize>, ngrow: IVec) {
        self.check_comps(&comps);
        self.check_ngrow(ngrow);
        self.map_in_place(comps, ngrow, move |a| a / value);
    }

    /// `a <- numerator / a`. Division by zero is intentionally unguarded,
    /// exactly like the plain `div_from`.
    pub fn invert(&mut self, numerator: V, comps: Range<usize>, ngrow: IVec) {
        self.check_comps(&comps);
        self.check_ngrow(ngrow);
        self.map_in_place(comps, ngrow, move |a| numerator / a);
    }

    fn map_in_place<F>(&mut self, comps: Range<usize>, ngrow: IVec, f: F)
    where
        F: Fn(V) -> V + Send + Sync,
    {
        let comps_ref = &comps;
        let f = &f;
        self.par_for_each_box_mut(|_, valid, mut view| {
            let region = valid.grow(ngrow);
            for n in comps_ref.clone() {
                for p in region.points() {
                    let v = f(view.get(p[0], p[1], p[2], n));
                    view.set(p[0], p[1], p[2], n, v);
                }
            }
        });
    }

    fn zip_from<F>(
        &mut self,
        src: &BoxField<V>,
        scomp: usize,
        dcomp: usize,
        ncomp: usize,
        ngrow: IVec,
        f: F,
    ) where
        F: Fn(V, V) -> V + Send + Sync,
    {
        self.check_pair(src, ngrow);
        self.check_comps(&(dcomp..dcomp + ncomp));
        src.check_comps(&(scomp..scomp + ncomp));
        let (policy, dnc, snc) = (self.policy, self.ncomp, src.ncomp);
        let f = &f;
        self.local
            .par_iter_mut()
            .zip(src.local.par_iter())
            .for_each(|(dlb, slb)| {
                debug_assert_eq!(dlb.index, slb.index);
                let mut dview = ArrayViewMut::new(&mut dlb.data, &dlb.grown, dnc, policy);
                let sview = ArrayView::new(&slb.data, &slb.grown, snc, policy);
                let region = dlb.valid.grow(ngrow);
                zip_region(&mut dview, dcomp, &sview, scomp, ncomp, &region, f);
            });
    }

    /// `dst <- dst + src`.
    pub fn add_from(&mut self, src: &BoxField<V>, scomp: usize, dcomp: usize, ncomp: usize, ngrow: IVec) {
        self.zip_from(src, scomp, dcomp, ncomp, ngrow, |a, b| a + b);
    }

    /// `dst <- dst - src`.
    pub fn sub_from(&mut self, src: &BoxField<V>, scomp: usize, dcomp: usize, ncomp: usize, ngrow: IVec) {
        self.zip_from(src, scomp, dcomp, ncomp, ngrow, |a, b| a - b);
    }

    /// `dst <- dst * src`.
    pub fn mul_from(&mut self, src: &BoxField<V>, scomp: usize, dcomp: usize, ncomp: usize, ngrow: IVec) {
        self.zip_from(src, scomp, dcomp, ncomp, ngrow, |a, b| a * b);
    }

    /// `dst <- dst / src`. Division by zero is the caller's problem.
    pub fn div_from(&mut self, src: &BoxField<V>, scomp: usize, dcomp: usize, ncomp: usize, ngrow: IVec) {
        self.zip_from(src, scomp, dcomp, ncomp, ngrow, |a, b| a / b);
    }

    /// `dst <- src`.
    pub fn copy_from(&mut self, src: &BoxField<V>, scomp: usize, dcomp: usize, ncomp: usize, ngrow: IVec) {
        self.zip_from(src, scomp, dcomp, ncomp, ngrow, |_, b| b);
    }

    /// `dst <- dst + a * src`.
    pub fn saxpy(&mut self, a: V, src: &BoxField<V>, scomp: usize, dcomp: usize, ncomp: usize, ngrow: IVec) {
        self.zip_from(src, scomp, dcomp, ncomp, ngrow, move |d, s| d + a * s);
    }

    /// `dst <- src + a * dst`.
    pub fn xpay(&mut self, a: V, src: &BoxField<V>, scomp: usize, dcomp: usize, ncomp: usize, ngrow: IVec) {
        self.zip_from(src, scomp, dcomp, ncomp, ngrow, move |d, s| s + a * d);
    }

    /// `dst <- dst + src1 * src2`.
    pub fn add_product(
        &mut self,
        src1: &BoxField<V>,
        comp1: usize,
        src2: &BoxField<V>,
        comp2: usize,
        dcomp: usize,
        ncomp: usize,
        ngrow: IVec,
    ) {
        self.check_pair(src1, ngrow);
        self.check_pair(src2, ngrow);
        self.check_comps(&(dcomp..dcomp + ncomp));
        src1.check_comps(&(comp1..comp1 + ncomp));
        src2.check_comps(&(comp2..comp2 + ncomp));
        let (policy, dnc) = (self.policy, self.ncomp);
        let (n1, n2) = (src1.ncomp, src2.ncomp);
        self.local
            .par_iter_mut()
            .zip(src1.local.par_iter().zip(src2.local.par_iter()))
            .for_each(|(dlb, (lb1, lb2))| {
                let mut dview = ArrayViewMut::new(&mut dlb.data, &dlb.grown, dnc, policy);
                let v1 = ArrayView::new(&lb1.data, &lb1.grown, n1, policy);
                let v2 = ArrayView::new(&lb2.data, &lb2.grown, n2, policy);
                let region = dlb.valid.grow(ngrow);
                for n in 0..ncomp {
                    for p in region.points() {
                        let add = v1.get(p[0], p[1], p[2], comp1 + n)
                            * v2.get(p[0], p[1], p[2], comp2 + n);
                        let d = dview.get(p[0], p[1], p[2], dcomp + n);
                        dview.set(p[0], p[1], p[2], dcomp + n, d + add);
                    }
                }
            });
    }

    /// `dst <- a*x + b*y` (dst may alias neither operand).
    pub fn lin_comb(
        &mut self,
        a: V,
        x: &BoxField<V>,
        xcomp: usize,
        b: V,
        y: &BoxField<V>,
        ycomp: usize,
        dcomp: usize,
        ncomp: usize,
        ngrow: IVec,
    ) {
        self.copy_from(x, xcomp, dcomp, ncomp, ngrow);
        self.mult_range(a, dcomp..dcomp + ncomp, ngrow);
        self.saxpy(b, y, ycomp, dcomp, ncomp, ngrow);
    }

    fn mult_range(&mut self, value: V, comps: Range<usize>, ngrow: IVec) {
        self.mult(value, comps, ngrow);
    }
}
