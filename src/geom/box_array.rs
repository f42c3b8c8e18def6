//! `BoxArray`: the ordered, globally replicated collection of boxes.
//!
//! The array order defines the stable global box index used everywhere for
//! tie-breaking (ownership of shared points, deterministic plan order).
//! A `BoxArray` is immutable once built; derived arrays (`coarsen`,
//! `refine`, `convert`) are new values with fresh identity tokens.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::BoxFieldError;
use crate::geom::coords::{IVec, IndexType};
use crate::geom::index_box::IndexBox;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn fresh_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Ordered collection of same-centering boxes.
///
/// # Invariants
/// - Every box is nonempty.
/// - All boxes carry the array's centering tag.
///
/// Identity: `token()` is unique per constructed array within a process and
/// keys the communication-plan cache. Content equality (`==`) compares
/// geometry only, which is what the aligned-fast-path test needs.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct BoxArray {
    boxes: Vec<IndexBox>,
    ty: IndexType,
    #[serde(skip, default = "fresh_token")]
    token: u64,
}

impl PartialEq for BoxArray {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.boxes == other.boxes
    }
}
impl Eq for BoxArray {}

impl BoxArray {
    /// Build from a list of boxes, which must be nonempty and uniformly
    /// centered.
    pub fn new(boxes: Vec<IndexBox>) -> Result<Self, BoxFieldError> {
        let ty = boxes.first().map(|b| b.index_type()).unwrap_or_default();
        for b in &boxes {
            if b.is_empty() {
                return Err(BoxFieldError::EmptyBox(*b));
            }
            debug_assert_eq!(b.index_type(), ty, "mixed centering in BoxArray");
        }
        Ok(BoxArray {
            boxes,
            ty,
            token: fresh_token(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    #[inline]
    pub fn index_type(&self) -> IndexType {
        self.ty
    }

    /// Process-local identity token; changes for every constructed array.
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn get(&self, i: usize) -> Result<IndexBox, BoxFieldError> {
        self.boxes
            .get(i)
            .copied()
            .ok_or(BoxFieldError::BoxIndexOutOfRange {
                index: i,
                len: self.boxes.len(),
            })
    }

    /// Box `i`; panics when out of range (indexing into replicated global
    /// metadata with a bad index is a programmer error).
    #[inline]
    pub fn bx(&self, i: usize) -> IndexBox {
        self.boxes[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = IndexBox> + '_ {
        self.boxes.iter().copied()
    }

    /// All `(index, intersection)` pairs of member boxes meeting `region`.
    ///
    /// Plain linear scan over the array; callers that need sub-linear
    /// queries can layer a spatial index on top, the plan cache makes the
    /// scan a one-time cost per layout pair.
    pub fn intersections(&self, region: &IndexBox) -> Vec<(usize, IndexBox)> {
        self.boxes
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.intersection(region).map(|isect| (i, isect)))
            .collect()
    }

    /// Coarsened copy of the array (fresh identity).
    pub fn coarsen(&self, ratio: IVec) -> BoxArray {
        BoxArray {
            boxes: self.boxes.iter().map(|b| b.coarsen(ratio)).collect(),
            ty: self.ty,
            token: fresh_token(),
        }
    }

    /// Refined copy of the array (fresh identity).
    pub fn refine(&self, ratio: IVec) -> BoxArray {
        BoxArray {
            boxes: self.boxes.iter().map(|b| b.refine(ratio)).collect(),
            ty: self.ty,
            token: fresh_token(),
        }
    }

    /// Copy with every box re-tagged to a new centering (fresh identity).
    pub fn convert(&self, ty: IndexType) -> BoxArray {
        BoxArray {
            boxes: self.boxes.iter().map(|b| b.convert(ty)).collect(),
            ty,
            token: fresh_token(),
        }
    }

    /// Smallest cell-convention bounding box of all members.
    pub fn minimal_bounding(&self) -> Option<IndexBox> {
        let mut it = self.boxes.iter();
        let first = *it.next()?;
        let (lo, hi) = it.fold((first.lo(), first.hi()), |(lo, hi), b| {
            (lo.min(b.lo()), hi.max(b.hi()))
        });
        Some(IndexBox::with_type(lo, hi, self.ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ba(boxes: &[([i64; 3], [i64; 3])]) -> BoxArray {
        BoxArray::new(
            boxes
                .iter()
                .map(|&(lo, hi)| IndexBox::new(IVec(lo), IVec(hi)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn tokens_are_unique_and_content_eq_ignores_them() {
        let a = ba(&[([0, 0, 0], [4, 4, 1])]);
        let b = ba(&[([0, 0, 0], [4, 4, 1])]);
        assert_ne!(a.token(), b.token());
        assert_eq!(a, b);
    }

    #[test]
    fn empty_box_rejected() {
        let r = BoxArray::new(vec![IndexBox::new(IVec::splat(2), IVec::splat(2))]);
        assert!(matches!(r, Err(BoxFieldError::EmptyBox(_))));
    }

    #[test]
    fn intersections_find_all_overlaps() {
        let a = ba(&[
            ([0, 0, 0], [4, 4, 1]),
            ([4, 0, 0], [8, 4, 1]),
            ([0, 4, 0], [8, 8, 1]),
        ]);
        let region = IndexBox::new(IVec::new(3, 3, 0), IVec::new(5, 5, 1));
        let hits = a.intersections(&region);
        assert_eq!(hits.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![
            0, 1, 2
        ]);
    }

    #[test]
    fn coarsen_refine_roundtrip_identity_content() {
        let a = ba(&[([0, 0, 0], [8, 8, 2]), ([8, 0, 0], [16, 8, 2])]);
        let r = IVec::new(2, 2, 2);
        assert_eq!(a.coarsen(r).refine(r), a);
    }
}
