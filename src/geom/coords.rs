//! `IVec` and `IndexType`: the index-space coordinate primitives.
//!
//! Every box, ghost width, refinement ratio, and periodic shift in this
//! crate is an `IVec`: a three-component signed index vector. Problems in
//! one or two dimensions use degenerate extent-1 axes and per-axis ratio 1,
//! so there is a single three-axis code path everywhere.

use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg, Sub};

/// Three-component index vector.
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    serde::Serialize,
    serde::Deserialize,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[repr(transparent)]
pub struct IVec(pub [i64; 3]);

impl IVec {
    pub const ZERO: IVec = IVec([0, 0, 0]);

    #[inline]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        IVec([x, y, z])
    }

    /// Same value on all three axes.
    #[inline]
    pub const fn splat(v: i64) -> Self {
        IVec([v, v, v])
    }

    /// Unit vector along `axis`.
    #[inline]
    pub fn unit(axis: usize) -> Self {
        let mut v = [0i64; 3];
        v[axis] = 1;
        IVec(v)
    }

    /// Elementwise minimum.
    #[inline]
    pub fn min(self, other: IVec) -> IVec {
        IVec([
            self.0[0].min(other.0[0]),
            self.0[1].min(other.0[1]),
            self.0[2].min(other.0[2]),
        ])
    }

    /// Elementwise maximum.
    #[inline]
    pub fn max(self, other: IVec) -> IVec {
        IVec([
            self.0[0].max(other.0[0]),
            self.0[1].max(other.0[1]),
            self.0[2].max(other.0[2]),
        ])
    }

    /// Floor-divide each component by the matching ratio component.
    ///
    /// Uses Euclidean division so negative indices coarsen toward negative
    /// infinity, which keeps `coarsen` consistent on both sides of the
    /// origin.
    #[inline]
    pub fn coarsen(self, ratio: IVec) -> IVec {
        IVec([
            self.0[0].div_euclid(ratio.0[0]),
            self.0[1].div_euclid(ratio.0[1]),
            self.0[2].div_euclid(ratio.0[2]),
        ])
    }

    /// Elementwise product with the ratio.
    #[inline]
    pub fn refine(self, ratio: IVec) -> IVec {
        IVec([
            self.0[0] * ratio.0[0],
            self.0[1] * ratio.0[1],
            self.0[2] * ratio.0[2],
        ])
    }

    /// True when every component satisfies `self <= other` elementwise.
    #[inline]
    pub fn all_le(self, other: IVec) -> bool {
        self.0[0] <= other.0[0] && self.0[1] <= other.0[1] && self.0[2] <= other.0[2]
    }

    /// True when every component satisfies `self < other` elementwise.
    #[inline]
    pub fn all_lt(self, other: IVec) -> bool {
        self.0[0] < other.0[0] && self.0[1] < other.0[1] && self.0[2] < other.0[2]
    }
}

impl Index<usize> for IVec {
    type Output = i64;
    #[inline]
    fn index(&self, axis: usize) -> &i64 {
        &self.0[axis]
    }
}

impl IndexMut<usize> for IVec {
    #[inline]
    fn index_mut(&mut self, axis: usize) -> &mut i64 {
        &mut self.0[axis]
    }
}

impl Add for IVec {
    type Output = IVec;
    #[inline]
    fn add(self, rhs: IVec) -> IVec {
        IVec([
            self.0[0] + rhs.0[0],
            self.0[1] + rhs.0[1],
            self.0[2] + rhs.0[2],
        ])
    }
}

impl AddAssign for IVec {
    #[inline]
    fn add_assign(&mut self, rhs: IVec) {
        *self = *self + rhs;
    }
}

impl Sub for IVec {
    type Output = IVec;
    #[inline]
    fn sub(self, rhs: IVec) -> IVec {
        IVec([
            self.0[0] - rhs.0[0],
            self.0[1] - rhs.0[1],
            self.0[2] - rhs.0[2],
        ])
    }
}

impl Neg for IVec {
    type Output = IVec;
    #[inline]
    fn neg(self) -> IVec {
        IVec([-self.0[0], -self.0[1], -self.0[2]])
    }
}

impl Mul<i64> for IVec {
    type Output = IVec;
    #[inline]
    fn mul(self, rhs: i64) -> IVec {
        IVec([self.0[0] * rhs, self.0[1] * rhs, self.0[2] * rhs])
    }
}

impl fmt::Debug for IVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.0[0], self.0[1], self.0[2])
    }
}

impl fmt::Display for IVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.0[0], self.0[1], self.0[2])
    }
}

impl From<[i64; 3]> for IVec {
    fn from(v: [i64; 3]) -> Self {
        IVec(v)
    }
}

/// Per-axis centering tag: cell-centered or node-centered on each axis.
///
/// Face and edge data are expressed through mixed tags: a face normal to
/// axis `d` is node-centered on `d` only; an edge tangent to axis `d` is
/// node-centered on every axis except `d`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, Default, Debug, serde::Serialize, serde::Deserialize,
)]
pub struct IndexType {
    nodal: [bool; 3],
}

impl IndexType {
    /// Cell-centered on all axes.
    #[inline]
    pub const fn cell() -> Self {
        IndexType { nodal: [false; 3] }
    }

    /// Node-centered on all axes.
    #[inline]
    pub const fn node() -> Self {
        IndexType { nodal: [true; 3] }
    }

    /// Face-centered: node-centered only along the normal axis.
    #[inline]
    pub fn face(normal: usize) -> Self {
        let mut nodal = [false; 3];
        nodal[normal] = true;
        IndexType { nodal }
    }

    /// Edge-centered: cell-centered only along the tangent axis.
    #[inline]
    pub fn edge(tangent: usize) -> Self {
        let mut nodal = [true; 3];
        nodal[tangent] = false;
        IndexType { nodal }
    }

    #[inline]
    pub fn nodal(&self, axis: usize) -> bool {
        self.nodal[axis]
    }

    /// True when node-centered on at least one axis, i.e. index points can
    /// be shared by more than one box.
    #[inline]
    pub fn any_nodal(&self) -> bool {
        self.nodal.iter().any(|&n| n)
    }

    #[inline]
    pub fn is_cell(&self) -> bool {
        !self.any_nodal()
    }

    #[inline]
    pub fn is_node(&self) -> bool {
        self.nodal.iter().all(|&n| n)
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_eq_size;

    // IVec must pack like a plain [i64;3] so it can ride in Pod wire buffers.
    assert_eq_size!(IVec, [i64; 3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarsen_rounds_toward_negative_infinity() {
        let r = IVec::splat(2);
        assert_eq!(IVec::new(5, -5, 4).coarsen(r), IVec::new(2, -3, 2));
        assert_eq!(IVec::new(-1, -2, 0).coarsen(r), IVec::new(-1, -1, 0));
    }

    #[test]
    fn refine_then_coarsen_is_identity() {
        let r = IVec::new(2, 4, 1);
        let v = IVec::new(-3, 7, 11);
        assert_eq!(v.refine(r).coarsen(r), v);
    }

    #[test]
    fn index_type_constructors() {
        assert!(IndexType::cell().is_cell());
        assert!(IndexType::node().is_node());
        let fx = IndexType::face(0);
        assert!(fx.nodal(0) && !fx.nodal(1) && !fx.nodal(2));
        let ez = IndexType::edge(2);
        assert!(ez.nodal(0) && ez.nodal(1) && !ez.nodal(2));
        assert!(fx.any_nodal() && ez.any_nodal());
    }

    #[test]
    fn elementwise_min_max() {
        let a = IVec::new(1, 5, -2);
        let b = IVec::new(3, 2, -2);
        assert_eq!(a.min(b), IVec::new(1, 2, -2));
        assert_eq!(a.max(b), IVec::new(3, 5, -2));
    }
}
