//! `Layout`: a BoxArray paired with its RankMap.
//!
//! Layouts are cheap to clone (`Arc` shared) and carry the identity pair
//! that keys the communication-plan cache. Content equality compares
//! geometry and ownership, which is the aligned-fast-path test for the
//! transfer engine.

use std::sync::Arc;

use crate::error::BoxFieldError;
use crate::geom::box_array::BoxArray;
use crate::geom::coords::{IVec, IndexType};
use crate::geom::distribution::RankMap;
use crate::geom::index_box::IndexBox;

/// A partition of the index space: boxes plus their owning ranks.
#[derive(Clone, Debug)]
pub struct Layout {
    boxes: Arc<BoxArray>,
    ranks: Arc<RankMap>,
}

impl PartialEq for Layout {
    fn eq(&self, other: &Self) -> bool {
        *self.boxes == *other.boxes && *self.ranks == *other.ranks
    }
}
impl Eq for Layout {}

impl Layout {
    pub fn new(boxes: BoxArray, ranks: RankMap) -> Result<Self, BoxFieldError> {
        if boxes.len() != ranks.len() {
            return Err(BoxFieldError::LayoutLengthMismatch {
                nboxes: boxes.len(),
                nranks: ranks.len(),
            });
        }
        Ok(Layout {
            boxes: Arc::new(boxes),
            ranks: Arc::new(ranks),
        })
    }

    #[inline]
    pub fn boxes(&self) -> &BoxArray {
        &self.boxes
    }

    #[inline]
    pub fn ranks(&self) -> &RankMap {
        &self.ranks
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
        self.boxes.index_type()
    }

    /// Identity pair for plan-cache keying.
    #[inline]
    pub fn key(&self) -> (u64, u64) {
        (self.boxes.token(), self.ranks.token())
    }

    #[inline]
    pub fn bx(&self, i: usize) -> IndexBox {
        self.boxes.bx(i)
    }

    #[inline]
    pub fn rank_of(&self, i: usize) -> usize {
        self.ranks.rank_of(i)
    }

    pub fn local_indices(&self, rank: usize) -> impl Iterator<Item = usize> + '_ {
        self.ranks.local_indices(rank)
    }

    /// Coarsened layout: same ownership, every box coarsened by `ratio`.
    pub fn coarsen(&self, ratio: IVec) -> Layout {
        Layout {
            boxes: Arc::new(self.boxes.coarsen(ratio)),
            ranks: Arc::clone(&self.ranks),
        }
    }

    /// Refined layout: same ownership, every box refined by `ratio`.
    pub fn refine(&self, ratio: IVec) -> Layout {
        Layout {
            boxes: Arc::new(self.boxes.refine(ratio)),
            ranks: Arc::clone(&self.ranks),
        }
    }

    /// Same partition with a different centering tag.
    pub fn convert(&self, ty: IndexType) -> Layout {
        Layout {
            boxes: Arc::new(self.boxes.convert(ty)),
            ranks: Arc::clone(&self.ranks),
        }
    }
}
