//! Consistency restoration at points shared by multiple boxes.
//!
//! Nodal (and face, edge) layouts hold some points in more than one box;
//! independent updates can leave those copies disagreeing. All three sync
//! flavors run one weighted engine: accumulate `value * weight` and the
//! weight itself over every copy of each shared point, then divide. Points
//! with zero accumulated weight keep their local value. Points no other
//! box touched are left bit-identical, so a sync never perturbs interior
//! data.
//!
//! These are collectives: every rank must call them in the same order with
//! the same tag.

use std::ops::Range;

use bytemuck::Pod;
use num_traits::Float;

use crate::comm::communicator::Communicator;
use crate::comm::exchange::{CombineMode, Exchanger};
use crate::data::field::BoxField;
use crate::error::BoxFieldError;
use crate::geom::IVec;

/// Make every copy of a shared point hold the plain average of all copies.
pub fn average_sync<V, C>(
    field: &mut BoxField<V>,
    comps: Range<usize>,
    ex: &Exchanger<'_, C>,
    tag: u16,
) -> Result<(), BoxFieldError>
where
    V: Float + Pod + Send + Sync + Default,
    C: Communicator,
{
    let mut ones = BoxField::<V>::new(field.layout(), 1, IVec::ZERO, field.rank())?;
    ones.set_val(V::one(), 0..1, IVec::ZERO);
    weighted_sync(field, &ones, comps, ex, tag)
}

/// Make every copy of a shared point hold the weighted average of all
/// copies, using component 0 of `weights` as each box's weight.
pub fn weighted_sync<V, C>(
    field: &mut BoxField<V>,
    weights: &BoxField<V>,
    comps: Range<usize>,
    ex: &Exchanger<'_, C>,
    tag: u16,
) -> Result<(), BoxFieldError>
where
    V: Float + Pod + Send + Sync + Default,
    C: Communicator,
{
    field.check_comps(&comps);
    field.check_pair(weights, IVec::ZERO);
    let nc = comps.len();

    // numerators for each component plus the denominator in the last slot
    let mut work = BoxField::<V>::new(field.layout(), nc + 1, IVec::ZERO, field.rank())?;
    {
        let field = &*field;
        let comps = comps.clone();
        work.par_for_each_box_mut(|gidx, valid, mut w| {
            let fv = field.view(gidx).unwrap();
            let wv = weights.view(gidx).unwrap();
            for p in valid.points() {
                let wgt = wv.get(p[0], p[1], p[2], 0);
                for (m, n) in comps.clone().enumerate() {
                    w.set(p[0], p[1], p[2], m, fv.get(p[0], p[1], p[2], n) * wgt);
                }
                w.set(p[0], p[1], p[2], nc, wgt);
            }
        });
    }
    let before = work.duplicate();
    ex.shared_points(&mut work, 0..nc + 1, tag, CombineMode::Add)?;

    let work = &work;
    let before = &before;
    field.par_for_each_box_mut(|gidx, valid, mut fv| {
        let wv = work.view(gidx).unwrap();
        let bv = before.view(gidx).unwrap();
        let same = |a: V, b: V| a == b || (a.is_nan() && b.is_nan());
        for p in valid.points() {
            let untouched = (0..=nc)
                .all(|m| same(wv.get(p[0], p[1], p[2], m), bv.get(p[0], p[1], p[2], m)));
            if untouched {
                continue;
            }
            let den = wv.get(p[0], p[1], p[2], nc);
            if den == V::zero() {
                continue;
            }
            for (m, n) in comps.clone().enumerate() {
                fv.set(p[0], p[1], p[2], n, wv.get(p[0], p[1], p[2], m) / den);
            }
        }
    });
    Ok(())
}

/// Make every copy of a shared point hold the owning box's value exactly.
///
/// The owner mask gives each point exactly one copy with weight one, so
/// the engine's division is by one and the owner value propagates without
/// rounding.
pub fn override_sync<V, C>(
    field: &mut BoxField<V>,
    owner: &BoxField<i32>,
    comps: Range<usize>,
    ex: &Exchanger<'_, C>,
    tag: u16,
) -> Result<(), BoxFieldError>
where
    V: Float + Pod + Send + Sync + Default,
    C: Communicator,
{
    field.check_pair(owner, IVec::ZERO);
    let mut weights = BoxField::<V>::new(field.layout(), 1, IVec::ZERO, field.rank())?;
    {
        let owner = &*owner;
        weights.par_for_each_box_mut(|gidx, valid, mut w| {
            let ov = owner.view(gidx).unwrap();
            for p in valid.points() {
                let one = ov.get(p[0], p[1], p[2], 0) != 0;
                w.set(p[0], p[1], p[2], 0, if one { V::one() } else { V::zero() });
            }
        });
    }
    weighted_sync(field, &weights, comps, ex, tag)
}
