//! Bounds-checked strided views over one box's buffer.
//!
//! A view is non-owning: it borrows the container's buffer and carries its
//! own begin/end index bounds and component count so offset arithmetic is
//! self-contained. The element order is x fastest, then y, then z, with the
//! component index slowest; every buffer in this crate, including the raw
//! buffers exposed for checkpointing, uses exactly this affine layout.

use bytemuck::Pod;
use std::ops::Range;

use crate::geom::{IVec, IndexBox};

/// Per-view validation mode, chosen at construction.
///
/// `Strict` aborts with a full diagnostic on any out-of-range index.
/// `Fast` skips the per-axis validation; the backing slice access remains
/// safe Rust, so a bad index still cannot corrupt memory, it just fails
/// without a useful message (or silently reads a neighboring cell when the
/// flattened offset happens to stay in range).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum BoundsPolicy {
    Strict,
    #[default]
    Fast,
}

macro_rules! impl_view_core {
    ($name:ident) => {
        impl<'a, V> $name<'a, V> {
            #[inline]
            pub fn begin(&self) -> IVec {
                self.begin
            }

            /// Exclusive upper bounds.
            #[inline]
            pub fn end(&self) -> IVec {
                self.end
            }

            #[inline]
            pub fn ncomp(&self) -> usize {
                self.ncomp
            }

            #[inline]
            pub fn contains(&self, i: i64, j: i64, k: i64) -> bool {
                i >= self.begin[0]
                    && i < self.end[0]
                    && j >= self.begin[1]
                    && j < self.end[1]
                    && k >= self.begin[2]
                    && k < self.end[2]
            }

            #[inline]
            fn stride_y(&self) -> usize {
                (self.end[0] - self.begin[0]) as usize
            }

            #[inline]
            fn stride_z(&self) -> usize {
                self.stride_y() * (self.end[1] - self.begin[1]) as usize
            }

            #[inline]
            fn stride_n(&self) -> usize {
                self.stride_z() * (self.end[2] - self.begin[2]) as usize
            }

            #[cold]
            fn index_abort(&self, i: i64, j: i64, k: i64, n: usize) -> ! {
                panic!(
                    "index ({i},{j},{k},{n}) out of bounds (({},{},{},0)..({},{},{},{}))",
                    self.begin[0],
                    self.begin[1],
                    self.begin[2],
                    self.end[0],
                    self.end[1],
                    self.end[2],
                    self.ncomp,
                )
            }

            #[inline]
            fn offset(&self, i: i64, j: i64, k: i64, n: usize) -> usize {
                if self.policy == BoundsPolicy::Strict
                    && (!self.contains(i, j, k) || n >= self.ncomp)
                {
                    self.index_abort(i, j, k, n);
                }
                (i - self.begin[0]) as usize
                    + (j - self.begin[1]) as usize * self.stride_y()
                    + (k - self.begin[2]) as usize * self.stride_z()
                    + n * self.stride_n()
            }
        }
    };
}

/// Read-only view.
#[derive(Copy, Clone)]
pub struct ArrayView<'a, V> {
    data: &'a [V],
    begin: IVec,
    end: IVec,
    ncomp: usize,
    policy: BoundsPolicy,
}

/// Mutable view.
pub struct ArrayViewMut<'a, V> {
    data: &'a mut [V],
    begin: IVec,
    end: IVec,
    ncomp: usize,
    policy: BoundsPolicy,
}

impl_view_core!(ArrayView);
impl_view_core!(ArrayViewMut);

impl<'a, V> ArrayView<'a, V> {
    /// View over `data` spanning `bounds` with `ncomp` components.
    ///
    /// # Panics
    /// Panics when the slice length does not match the bounds, which would
    /// make the affine layout lie about what memory it addresses.
    pub fn new(data: &'a [V], bounds: &IndexBox, ncomp: usize, policy: BoundsPolicy) -> Self {
        let v = ArrayView {
            data,
            begin: bounds.lo(),
            end: bounds.hi(),
            ncomp,
            policy,
        };
        assert_eq!(
            data.len(),
            v.stride_n() * ncomp,
            "buffer length does not match view bounds {bounds:?} x {ncomp}"
        );
        v
    }

    #[inline]
    pub fn get(&self, i: i64, j: i64, k: i64, n: usize) -> V
    where
        V: Copy,
    {
        self.data[self.offset(i, j, k, n)]
    }

    #[inline]
    pub fn at(&self, i: i64, j: i64, k: i64, n: usize) -> &V {
        &self.data[self.offset(i, j, k, n)]
    }

    /// Zero-copy aliasing of a component sub-range.
    pub fn components(&self, comps: Range<usize>) -> ArrayView<'a, V> {
        assert!(
            comps.end <= self.ncomp,
            "component range {comps:?} exceeds {} components",
            self.ncomp
        );
        let sn = self.stride_n();
        ArrayView {
            data: &self.data[comps.start * sn..comps.end * sn],
            begin: self.begin,
            end: self.end,
            ncomp: comps.len(),
            policy: self.policy,
        }
    }

    /// Zero-copy reinterpretation as another element type of compatible
    /// size. The caller vouches that the bit patterns are meaningful.
    pub fn cast<U: Pod>(&self) -> ArrayView<'a, U>
    where
        V: Pod,
    {
        ArrayView {
            data: bytemuck::cast_slice(self.data),
            begin: self.begin,
            end: self.end,
            ncomp: self.ncomp,
            policy: self.policy,
        }
    }

    /// The whole backing slice in affine order.
    #[inline]
    pub fn as_slice(&self) -> &'a [V] {
        self.data
    }
}

impl<'a, V> ArrayViewMut<'a, V> {
    pub fn new(data: &'a mut [V], bounds: &IndexBox, ncomp: usize, policy: BoundsPolicy) -> Self {
        let len = data.len();
        let v = ArrayViewMut {
            data,
            begin: bounds.lo(),
            end: bounds.hi(),
            ncomp,
            policy,
        };
        assert_eq!(
            len,
            v.stride_n() * ncomp,
            "buffer length does not match view bounds {bounds:?} x {ncomp}"
        );
        v
    }

    #[inline]
    pub fn get(&self, i: i64, j: i64, k: i64, n: usize) -> V
    where
        V: Copy,
    {
        self.data[self.offset(i, j, k, n)]
    }

    #[inline]
    pub fn at_mut(&mut self, i: i64, j: i64, k: i64, n: usize) -> &mut V {
        let off = self.offset(i, j, k, n);
        &mut self.data[off]
    }

    #[inline]
    pub fn set(&mut self, i: i64, j: i64, k: i64, n: usize, value: V) {
        let off = self.offset(i, j, k, n);
        self.data[off] = value;
    }

    /// Read-only alias of this view.
    #[inline]
    pub fn as_view(&self) -> ArrayView<'_, V> {
        ArrayView {
            data: self.data,
            begin: self.begin,
            end: self.end,
            ncomp: self.ncomp,
            policy: self.policy,
        }
    }

    /// Zero-copy mutable aliasing of a component sub-range.
    pub fn components_mut(&mut self, comps: Range<usize>) -> ArrayViewMut<'_, V> {
        assert!(
            comps.end <= self.ncomp,
            "component range {comps:?} exceeds {} components",
            self.ncomp
        );
        let sn = self.stride_n();
        ArrayViewMut {
            data: &mut self.data[comps.start * sn..comps.end * sn],
            begin: self.begin,
            end: self.end,
            ncomp: comps.len(),
            policy: self.policy,
        }
    }
}
