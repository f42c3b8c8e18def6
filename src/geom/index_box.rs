//! `IndexBox`: an axis-aligned rectangle in discrete index space.
//!
//! Boxes are immutable value types: every operation returns a new box.
//! `lo` is inclusive and `hi` is exclusive on every axis, regardless of the
//! centering tag; a node-centered axis simply enumerates node points in the
//! same half-open convention.

use crate::geom::coords::{IVec, IndexType};

/// Axis-aligned integer rectangle with a per-axis centering tag.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct IndexBox {
    lo: IVec,
    hi: IVec,
    ty: IndexType,
}

impl IndexBox {
    /// Cell-centered box over `lo..hi` (exclusive upper bound).
    #[inline]
    pub fn new(lo: IVec, hi: IVec) -> Self {
        IndexBox {
            lo,
            hi,
            ty: IndexType::cell(),
        }
    }

    #[inline]
    pub fn with_type(lo: IVec, hi: IVec, ty: IndexType) -> Self {
        IndexBox { lo, hi, ty }
    }

    #[inline]
    pub fn lo(&self) -> IVec {
        self.lo
    }

    /// Exclusive upper bound.
    #[inline]
    pub fn hi(&self) -> IVec {
        self.hi
    }

    #[inline]
    pub fn index_type(&self) -> IndexType {
        self.ty
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.lo.all_lt(self.hi)
    }

    /// Extent along each axis.
    #[inline]
    pub fn size(&self) -> IVec {
        self.hi - self.lo
    }

    /// Number of index points in the box, zero when empty.
    #[inline]
    pub fn num_points(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            let s = self.size();
            (s[0] * s[1] * s[2]) as usize
        }
    }

    #[inline]
    pub fn contains(&self, p: IVec) -> bool {
        self.lo.all_le(p) && p.all_lt(self.hi)
    }

    /// True when `other` lies entirely inside this box.
    #[inline]
    pub fn contains_box(&self, other: &IndexBox) -> bool {
        self.lo.all_le(other.lo) && other.hi.all_le(self.hi)
    }

    /// Geometric intersection; `None` when the boxes do not overlap.
    ///
    /// Both boxes must carry the same centering tag; intersecting boxes of
    /// different centerings is a programmer error.
    pub fn intersection(&self, other: &IndexBox) -> Option<IndexBox> {
        assert_eq!(
            self.ty, other.ty,
            "intersection of differently centered boxes"
        );
        let b = IndexBox {
            lo: self.lo.max(other.lo),
            hi: self.hi.min(other.hi),
            ty: self.ty,
        };
        if b.is_empty() { None } else { Some(b) }
    }

    /// Grow by `n` on both sides of every axis.
    #[inline]
    pub fn grow(&self, n: IVec) -> IndexBox {
        IndexBox {
            lo: self.lo - n,
            hi: self.hi + n,
            ty: self.ty,
        }
    }

    /// Translate by `v`.
    #[inline]
    pub fn shift(&self, v: IVec) -> IndexBox {
        IndexBox {
            lo: self.lo + v,
            hi: self.hi + v,
            ty: self.ty,
        }
    }

    /// Coarsen by the given refinement ratio.
    ///
    /// The coarse box covers exactly the coarse points whose refinement
    /// touches this box: `lo' = floor(lo/r)`, `hi' = floor((hi-1)/r) + 1`.
    /// The formula holds for cell and node axes alike under the half-open
    /// convention.
    pub fn coarsen(&self, ratio: IVec) -> IndexBox {
        let lo = self.lo.coarsen(ratio);
        let hi = (self.hi - IVec::splat(1)).coarsen(ratio) + IVec::splat(1);
        IndexBox { lo, hi, ty: self.ty }
    }

    /// Refine by the given ratio; the exact inverse of `coarsen` for boxes
    /// aligned to the ratio. Node axes keep their endpoints coincident
    /// across levels: the refined upper node of index `h-1` is `(h-1)*r`.
    pub fn refine(&self, ratio: IVec) -> IndexBox {
        let mut lo = self.lo;
        let mut hi = self.hi;
        for axis in 0..3 {
            lo[axis] *= ratio[axis];
            hi[axis] = if self.ty.nodal(axis) {
                (hi[axis] - 1) * ratio[axis] + 1
            } else {
                hi[axis] * ratio[axis]
            };
        }
        IndexBox { lo, hi, ty: self.ty }
    }

    /// Re-tag the box with a new centering, adjusting the upper bound: an
    /// axis turning nodal gains the closing node layer, an axis turning
    /// cell-centered loses it.
    pub fn convert(&self, ty: IndexType) -> IndexBox {
        let mut hi = self.hi;
        for axis in 0..3 {
            match (self.ty.nodal(axis), ty.nodal(axis)) {
                (false, true) => hi[axis] += 1,
                (true, false) => hi[axis] -= 1,
                _ => {}
            }
        }
        IndexBox { lo: self.lo, hi, ty }
    }

    /// Slab decomposition of `self \ other`: up to six disjoint boxes
    /// covering every point of `self` outside `other`.
    pub fn difference(&self, other: &IndexBox) -> Vec<IndexBox> {
        if self.intersection(other).is_none() {
            return vec![*self];
        }
        let mut out = Vec::new();
        let mut rest = *self;
        for axis in 0..3 {
            if other.lo[axis] > rest.lo[axis] {
                let mut hi = rest.hi;
                hi[axis] = other.lo[axis];
                out.push(IndexBox {
                    lo: rest.lo,
                    hi,
                    ty: self.ty,
                });
                rest.lo[axis] = other.lo[axis];
            }
            if other.hi[axis] < rest.hi[axis] {
                let mut lo = rest.lo;
                lo[axis] = other.hi[axis];
                out.push(IndexBox {
                    lo,
                    hi: rest.hi,
                    ty: self.ty,
                });
                rest.hi[axis] = other.hi[axis];
            }
        }
        out.retain(|b| !b.is_empty());
        out
    }

    /// Row-major-by-component iteration in the view's affine order: x
    /// fastest, then y, then z.
    pub fn points(&self) -> impl Iterator<Item = IVec> + '_ {
        let (lo, hi) = (self.lo, self.hi);
        (lo[2]..hi[2]).flat_map(move |k| {
            (lo[1]..hi[1]).flat_map(move |j| (lo[0]..hi[0]).map(move |i| IVec::new(i, j, k)))
        })
    }
}
