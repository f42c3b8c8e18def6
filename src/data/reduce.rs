//! Reductions over containers: extrema, located extrema, sums, norms, dot
//! products, and non-finite scans.
//!
//! Every reduction comes in a local flavor (this rank's boxes only) and a
//! global flavor that folds the per-rank results across the communicator.
//! Determinism rule: per-box partials may be computed in parallel, but the
//! fold over boxes runs in local box order and the fold over ranks runs in
//! rank order, so a reduction over the same data and partition gives the
//! same bits every time.
//!
//! The global flavors are collectives: every rank must call them in the
//! same order with the same tag.

use bytemuck::Pod;
use num_traits::Float;
use rayon::prelude::*;

use crate::comm::communicator::{Communicator, Wait};
use crate::data::field::BoxField;
use crate::data::view::ArrayView;
use crate::geom::{IVec, IndexBox};

/// A reduction value paired with the index where it was attained.
///
/// Ties resolve to the first occurrence in deterministic order: affine
/// point order within a box, box order within a rank, rank order globally.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ValLoc<V> {
    pub value: V,
    pub index: IVec,
}

/// Gather one `Pod` value from every rank, returned in rank order.
///
/// Symmetric all-to-all: each rank posts receives from every peer, sends
/// to every peer, then assembles the slots.
pub fn all_gather<C: Communicator, T: Pod>(comm: &C, tag: u16, mine: T) -> Vec<T> {
    let (rank, size) = (comm.rank(), comm.size());
    if size == 1 {
        return vec![mine];
    }
    let bytes = bytemuck::bytes_of(&mine);
    let recvs: Vec<_> = (0..size)
        .filter(|&p| p != rank)
        .map(|p| (p, comm.irecv(p, tag, bytes.len())))
        .collect();
    let sends: Vec<_> = (0..size)
        .filter(|&p| p != rank)
        .map(|p| comm.isend(p, tag, bytes))
        .collect();
    let mut out = vec![mine; size];
    for (p, h) in recvs {
        let Some(data) = h.wait() else {
            panic!("gather from rank {p} completed without data");
        };
        out[p] = bytemuck::pod_read_unaligned(&data);
    }
    for h in sends {
        h.wait();
    }
    out
}

/// Sequential fold of local box partials, in box order.
fn fold_boxes<V, T, M, F>(field: &BoxField<V>, map: M, init: T, fold: F) -> T
where
    V: Send + Sync,
    T: Send,
    M: Fn(usize, &IndexBox, ArrayView<'_, V>) -> T + Send + Sync,
    F: Fn(T, T) -> T,
{
    // parallel map into per-box slots, then ordered fold
    let indices: Vec<usize> = field.local_indices().collect();
    let slots: Vec<T> = indices
        .into_par_iter()
        .map(|gidx| {
            let valid = field.valid_box(gidx).unwrap();
            let view = field.view(gidx).unwrap();
            map(gidx, &valid, view)
        })
        .collect();
    slots.into_iter().fold(init, fold)
}

impl<V: Float + Send + Sync> BoxField<V> {
    /// Minimum over the valid region grown by `ngrow`; `+inf` with no
    /// local cells.
    pub fn local_min(&self, comp: usize, ngrow: IVec) -> V {
        self.check_comps(&(comp..comp + 1));
        self.check_ngrow(ngrow);
        fold_boxes(
            self,
            |_, valid, v| {
                valid
                    .grow(ngrow)
                    .points()
                    .fold(V::infinity(), |m, p| m.min(v.get(p[0], p[1], p[2], comp)))
            },
            V::infinity(),
            V::min,
        )
    }

    /// Maximum over the valid region grown by `ngrow`; `-inf` with no
    /// local cells.
    pub fn local_max(&self, comp: usize, ngrow: IVec) -> V {
        self.check_comps(&(comp..comp + 1));
        self.check_ngrow(ngrow);
        fold_boxes(
            self,
            |_, valid, v| {
                valid
                    .grow(ngrow)
                    .points()
                    .fold(V::neg_infinity(), |m, p| m.max(v.get(p[0], p[1], p[2], comp)))
            },
            V::neg_infinity(),
            V::max,
        )
    }

    /// Minimum over valid cells together with the index attaining it.
    pub fn local_min_loc(&self, comp: usize) -> ValLoc<V> {
        self.extremum_loc(comp, |a, b| a < b, V::infinity())
    }

    /// Maximum over valid cells together with the index attaining it.
    pub fn local_max_loc(&self, comp: usize) -> ValLoc<V> {
        self.extremum_loc(comp, |a, b| a > b, V::neg_infinity())
    }

    fn extremum_loc<F>(&self, comp: usize, better: F, identity: V) -> ValLoc<V>
    where
        F: Fn(V, V) -> bool + Send + Sync,
    {
        self.check_comps(&(comp..comp + 1));
        let better = &better;
        fold_boxes(
            self,
            |_, valid, v| {
                let mut best = ValLoc {
                    value: identity,
                    index: IVec::ZERO,
                };
                for p in valid.points() {
                    let x = v.get(p[0], p[1], p[2], comp);
                    if better(x, best.value) {
                        best = ValLoc { value: x, index: p };
                    }
                }
                best
            },
            ValLoc {
                value: identity,
                index: IVec::ZERO,
            },
            |a, b| if better(b.value, a.value) { b } else { a },
        )
    }

    /// Sum over the valid region grown by `ngrow`.
    pub fn local_sum(&self, comp: usize, ngrow: IVec) -> V {
        self.check_comps(&(comp..comp + 1));
        self.check_ngrow(ngrow);
        fold_boxes(
            self,
            |_, valid, v| {
                valid
                    .grow(ngrow)
                    .points()
                    .fold(V::zero(), |s, p| s + v.get(p[0], p[1], p[2], comp))
            },
            V::zero(),
            |a, b| a + b,
        )
    }

    /// Sum over valid cells where `mask` is nonzero; with an owner mask,
    /// cells covered by multiple boxes count exactly once.
    pub fn local_sum_masked(&self, comp: usize, mask: &BoxField<i32>) -> V {
        self.check_comps(&(comp..comp + 1));
        self.check_pair(mask, IVec::ZERO);
        let mut total = V::zero();
        self.for_each_box(|gidx, valid, v| {
            let m = mask.view(gidx).unwrap();
            for p in valid.points() {
                if m.get(p[0], p[1], p[2], 0) != 0 {
                    total = total + v.get(p[0], p[1], p[2], comp);
                }
            }
        });
        total
    }

    /// Max-abs norm over valid cells.
    pub fn local_norm0(&self, comp: usize) -> V {
        self.check_comps(&(comp..comp + 1));
        fold_boxes(
            self,
            |_, valid, v| {
                valid
                    .points()
                    .fold(V::zero(), |m, p| m.max(v.get(p[0], p[1], p[2], comp).abs()))
            },
            V::zero(),
            V::max,
        )
    }

    /// One-norm over valid cells. With `Some(mask)` only owned cells
    /// contribute, making the result partition-independent.
    pub fn local_norm1(&self, comp: usize, mask: Option<&BoxField<i32>>) -> V {
        self.check_comps(&(comp..comp + 1));
        match mask {
            None => fold_boxes(
                self,
                |_, valid, v| {
                    valid
                        .points()
                        .fold(V::zero(), |s, p| s + v.get(p[0], p[1], p[2], comp).abs())
                },
                V::zero(),
                |a, b| a + b,
            ),
            Some(m) => {
                self.check_pair(m, IVec::ZERO);
                let mut total = V::zero();
                self.for_each_box(|gidx, valid, v| {
                    let mv = m.view(gidx).unwrap();
                    for p in valid.points() {
                        if mv.get(p[0], p[1], p[2], 0) != 0 {
                            total = total + v.get(p[0], p[1], p[2], comp).abs();
                        }
                    }
                });
                total
            }
        }
    }

    /// Squared two-norm over valid cells (summed locally; take the square
    /// root after the global fold).
    pub fn local_norm2_sq(&self, comp: usize) -> V {
        self.local_dot(self, comp, comp)
    }

    /// Pointwise dot product over valid cells.
    pub fn local_dot(&self, other: &BoxField<V>, comp: usize, ocomp: usize) -> V {
        self.check_comps(&(comp..comp + 1));
        other.check_comps(&(ocomp..ocomp + 1));
        self.check_pair(other, IVec::ZERO);
        let mut total = V::zero();
        self.for_each_box(|gidx, valid, v| {
            let o = other.view(gidx).unwrap();
            for p in valid.points() {
                total = total + v.get(p[0], p[1], p[2], comp) * o.get(p[0], p[1], p[2], ocomp);
            }
        });
        total
    }

    /// True when any cell of `comps` in the valid region grown by `ngrow`
    /// is NaN.
    pub fn contains_nan(&self, comps: std::ops::Range<usize>, ngrow: IVec) -> bool {
        self.check_comps(&comps);
        self.check_ngrow(ngrow);
        let comps = &comps;
        fold_boxes(
            self,
            |_, valid, v| {
                comps.clone().any(|n| {
                    valid
                        .grow(ngrow)
                        .points()
                        .any(|p| v.get(p[0], p[1], p[2], n).is_nan())
                })
            },
            false,
            |a, b| a || b,
        )
    }

    /// True when any cell of `comps` in the valid region grown by `ngrow`
    /// is infinite.
    pub fn contains_inf(&self, comps: std::ops::Range<usize>, ngrow: IVec) -> bool {
        self.check_comps(&comps);
        self.check_ngrow(ngrow);
        let comps = &comps;
        fold_boxes(
            self,
            |_, valid, v| {
                comps.clone().any(|n| {
                    valid
                        .grow(ngrow)
                        .points()
                        .any(|p| v.get(p[0], p[1], p[2], n).is_infinite())
                })
            },
            false,
            |a, b| a || b,
        )
    }
}

impl<V: Float + Pod + Send + Sync> BoxField<V> {
    /// Global minimum across all ranks.
    pub fn min_all<C: Communicator>(&self, comp: usize, ngrow: IVec, comm: &C, tag: u16) -> V {
        all_gather(comm, tag, self.local_min(comp, ngrow))
            .into_iter()
            .fold(V::infinity(), V::min)
    }

    /// Global maximum across all ranks.
    pub fn max_all<C: Communicator>(&self, comp: usize, ngrow: IVec, comm: &C, tag: u16) -> V {
        all_gather(comm, tag, self.local_max(comp, ngrow))
            .into_iter()
            .fold(V::neg_infinity(), V::max)
    }

    /// Global sum across all ranks, folded in rank order.
    pub fn sum_all<C: Communicator>(&self, comp: usize, comm: &C, tag: u16) -> V {
        all_gather(comm, tag, self.local_sum(comp, IVec::ZERO))
            .into_iter()
            .fold(V::zero(), |a, b| a + b)
    }

    /// Global owner-masked sum: each covered cell counted once.
    pub fn sum_unique_all<C: Communicator>(
        &self,
        comp: usize,
        mask: &BoxField<i32>,
        comm: &C,
        tag: u16,
    ) -> V {
        all_gather(comm, tag, self.local_sum_masked(comp, mask))
            .into_iter()
            .fold(V::zero(), |a, b| a + b)
    }

    /// Global max-abs norm.
    pub fn norm0_all<C: Communicator>(&self, comp: usize, comm: &C, tag: u16) -> V {
        all_gather(comm, tag, self.local_norm0(comp))
            .into_iter()
            .fold(V::zero(), V::max)
    }

    /// Global one-norm, optionally owner-masked.
    pub fn norm1_all<C: Communicator>(
        &self,
        comp: usize,
        mask: Option<&BoxField<i32>>,
        comm: &C,
        tag: u16,
    ) -> V {
        all_gather(comm, tag, self.local_norm1(comp, mask))
            .into_iter()
            .fold(V::zero(), |a, b| a + b)
    }

    /// Global two-norm.
    pub fn norm2_all<C: Communicator>(&self, comp: usize, comm: &C, tag: u16) -> V {
        all_gather(comm, tag, self.local_norm2_sq(comp))
            .into_iter()
            .fold(V::zero(), |a, b| a + b)
            .sqrt()
    }

    /// Global dot product.
    pub fn dot_all<C: Communicator>(
        &self,
        other: &BoxField<V>,
        comp: usize,
        ocomp: usize,
        comm: &C,
        tag: u16,
    ) -> V {
        all_gather(comm, tag, self.local_dot(other, comp, ocomp))
            .into_iter()
            .fold(V::zero(), |a, b| a + b)
    }

    /// Global located minimum; ties resolve to the lowest rank.
    pub fn min_loc_all<C: Communicator>(&self, comp: usize, comm: &C, tag: u16) -> ValLoc<V> {
        fold_loc_all(comm, tag, self.local_min_loc(comp), |a, b| a < b)
    }

    /// Global located maximum; ties resolve to the lowest rank.
    pub fn max_loc_all<C: Communicator>(&self, comp: usize, comm: &C, tag: u16) -> ValLoc<V> {
        fold_loc_all(comm, tag, self.local_max_loc(comp), |a, b| a > b)
    }
}

fn fold_loc_all<C: Communicator, V: Float + Pod, F: Fn(V, V) -> bool>(
    comm: &C,
    tag: u16,
    mine: ValLoc<V>,
    better: F,
) -> ValLoc<V> {
    // wire format: value then index, fixed width
    let values = all_gather(comm, tag, mine.value);
    let indices = all_gather(comm, tag.wrapping_add(1), mine.index);
    let mut best = ValLoc {
        value: values[0],
        index: indices[0],
    };
    for (v, i) in values.into_iter().zip(indices).skip(1) {
        if better(v, best.value) {
            best = ValLoc { value: v, index: i };
        }
    }
    best
}
