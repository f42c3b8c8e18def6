//! Ownership and overlap masks.
//!
//! Both masks are pure functions of replicated geometry, so every rank
//! computes its local boxes' masks without communication and all ranks
//! agree on every shared point.
//!
//! Ownership rule: the covering box with the lowest array index owns the
//! point, counting periodic images as covering. When a box covers a point
//! twice through a periodic wrap, the canonical (smaller-index) position
//! owns it.

use crate::data::field::BoxField;
use crate::error::BoxFieldError;
use crate::geom::{IVec, Layout, Periodicity};

/// One-component mask holding 1 where the box owns the point, 0 elsewhere.
///
/// Exactly one box holds 1 at every point of the index space covered by
/// the layout, including points shared by several nodal boxes.
pub fn owner_mask(
    layout: &Layout,
    rank: usize,
    period: &Periodicity,
) -> Result<BoxField<i32>, BoxFieldError> {
    let shifts = period.shifts();
    let mut mask = BoxField::<i32>::new(layout, 1, IVec::ZERO, rank)?;
    mask.par_for_each_box_mut(|j, valid, mut view| {
        for p in valid.points() {
            view.set(p[0], p[1], p[2], 0, 1);
        }
        for i in 0..layout.len() {
            for &s in &shifts {
                if i == j && s == IVec::ZERO {
                    continue;
                }
                let Some(region) = layout.bx(i).shift(s).intersection(valid) else {
                    continue;
                };
                for p in region.points() {
                    let loses = if i < j {
                        true
                    } else if i == j {
                        // same box through a wrap: the smaller canonical
                        // position keeps the point
                        p - s < p
                    } else {
                        false
                    };
                    if loses {
                        view.set(p[0], p[1], p[2], 0, 0);
                    }
                }
            }
        }
    });
    Ok(mask)
}

/// One-component count of covering boxes at every valid point, periodic
/// images included. Always at least 1.
pub fn overlap_mask(
    layout: &Layout,
    rank: usize,
    period: &Periodicity,
) -> Result<BoxField<i32>, BoxFieldError> {
    let shifts = period.shifts();
    let mut mask = BoxField::<i32>::new(layout, 1, IVec::ZERO, rank)?;
    mask.par_for_each_box_mut(|j, valid, mut view| {
        for p in valid.points() {
            view.set(p[0], p[1], p[2], 0, 1);
        }
        for i in 0..layout.len() {
            for &s in &shifts {
                if i == j && s == IVec::ZERO {
                    continue;
                }
                let Some(region) = layout.bx(i).shift(s).intersection(valid) else {
                    continue;
                };
                for p in region.points() {
                    let c = view.get(p[0], p[1], p[2], 0);
                    view.set(p[0], p[1], p[2], 0, c + 1);
                }
            }
        }
    });
    Ok(mask)
}
