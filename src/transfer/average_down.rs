//! Restriction: fine-level data reduced onto a coarse level.
//!
//! One kernel covers every centering: along a cell-centered axis the
//! coarse value averages the `ratio` fine children, along a node-centered
//! axis it injects the coincident fine point. That reduces to the plain
//! `ratio^d` mean for cell data, pure injection for nodes, and
//! normal-injection with tangential averaging for faces and edges.
//!
//! When the coarsened fine layout equals the destination layout the
//! reduction writes the destination directly. Otherwise it fills a
//! temporary container on the coarsened fine layout (same ownership as
//! fine, so the reduction itself never communicates) and finishes with a
//! plan-driven copy.

use bytemuck::Pod;
use num_traits::Float;

use crate::comm::communicator::Communicator;
use crate::comm::exchange::{CombineMode, Exchanger};
use crate::data::field::BoxField;
use crate::error::BoxFieldError;
use crate::geom::IVec;
use crate::transfer::cst;

fn axis_offsets(nodal: bool, ratio: i64) -> Vec<i64> {
    if nodal { vec![0] } else { (0..ratio).collect() }
}

fn restrict_into<V: Float + Send + Sync>(
    dst: &mut BoxField<V>,
    dcomp: usize,
    fine: &BoxField<V>,
    fcomp: usize,
    ncomp: usize,
    ratio: IVec,
) {
    let ty = fine.index_type();
    let offs = [
        axis_offsets(ty.nodal(0), ratio[0]),
        axis_offsets(ty.nodal(1), ratio[1]),
        axis_offsets(ty.nodal(2), ratio[2]),
    ];
    let inv = V::one() / cst::<V>((offs[0].len() * offs[1].len() * offs[2].len()) as f64);
    let offs = &offs;
    dst.par_for_each_box_mut(|gidx, valid, mut cv| {
        let fv = fine.view(gidx).unwrap();
        for p in valid.points() {
            let base = p.refine(ratio);
            for n in 0..ncomp {
                let mut sum = V::zero();
                for &ko in &offs[2] {
                    for &jo in &offs[1] {
                        for &io in &offs[0] {
                            sum = sum + fv.get(base[0] + io, base[1] + jo, base[2] + ko, fcomp + n);
                        }
                    }
                }
                cv.set(p[0], p[1], p[2], dcomp + n, sum * inv);
            }
        }
    });
}

fn restrict_with_vol_into<V: Float + Send + Sync>(
    dst: &mut BoxField<V>,
    dcomp: usize,
    fine: &BoxField<V>,
    fcomp: usize,
    ncomp: usize,
    fvol: &BoxField<V>,
    ratio: IVec,
) {
    dst.par_for_each_box_mut(|gidx, valid, mut cv| {
        let fv = fine.view(gidx).unwrap();
        let vv = fvol.view(gidx).unwrap();
        for p in valid.points() {
            let base = p.refine(ratio);
            for n in 0..ncomp {
                let mut num = V::zero();
                let mut den = V::zero();
                for ko in 0..ratio[2] {
                    for jo in 0..ratio[1] {
                        for io in 0..ratio[0] {
                            let vol = vv.get(base[0] + io, base[1] + jo, base[2] + ko, 0);
                            num = num
                                + fv.get(base[0] + io, base[1] + jo, base[2] + ko, fcomp + n) * vol;
                            den = den + vol;
                        }
                    }
                }
                // fully covered cells carry no volume; defined as zero
                let c = if den > V::zero() { num / den } else { V::zero() };
                cv.set(p[0], p[1], p[2], dcomp + n, c);
            }
        }
    });
}

fn finish<V, C>(
    crse: &mut BoxField<V>,
    ccomp: usize,
    fine: &BoxField<V>,
    ncomp: usize,
    ratio: IVec,
    ex: &Exchanger<'_, C>,
    tag: u16,
    reduce: impl Fn(&mut BoxField<V>, usize),
) -> Result<(), BoxFieldError>
where
    V: Float + Pod + Send + Sync + Default,
    C: Communicator,
{
    let fl = fine.layout();
    assert!(
        (0..fl.len()).all(|i| fl.bx(i).coarsen(ratio).refine(ratio) == fl.bx(i)),
        "ratio {ratio:?} does not evenly divide the fine layout"
    );
    let coarsened = fl.coarsen(ratio);
    if coarsened == *crse.layout() {
        reduce(crse, ccomp);
        Ok(())
    } else {
        let mut tmp = BoxField::<V>::new(&coarsened, ncomp, IVec::ZERO, fine.rank())?;
        reduce(&mut tmp, 0);
        ex.parallel_copy(
            crse,
            ccomp,
            &tmp,
            0,
            ncomp,
            IVec::ZERO,
            tag,
            CombineMode::Overwrite,
        )
    }
}

/// Reduce `fine` onto `crse` by the centering-aware mean/injection rule.
pub fn average_down<V, C>(
    crse: &mut BoxField<V>,
    ccomp: usize,
    fine: &BoxField<V>,
    fcomp: usize,
    ncomp: usize,
    ratio: IVec,
    ex: &Exchanger<'_, C>,
    tag: u16,
) -> Result<(), BoxFieldError>
where
    V: Float + Pod + Send + Sync + Default,
    C: Communicator,
{
    assert_eq!(
        crse.index_type(),
        fine.index_type(),
        "restriction between differently centered containers"
    );
    assert_eq!(crse.rank(), fine.rank());
    crse.check_comps(&(ccomp..ccomp + ncomp));
    fine.check_comps(&(fcomp..fcomp + ncomp));
    finish(crse, ccomp, fine, ncomp, ratio, ex, tag, |dst, dcomp| {
        restrict_into(dst, dcomp, fine, fcomp, ncomp, ratio)
    })
}

/// Volume-weighted restriction for cell data: `Σ(fine·vol) / Σ(vol)`,
/// zero where the children carry no volume.
pub fn average_down_with_vol<V, C>(
    crse: &mut BoxField<V>,
    ccomp: usize,
    fine: &BoxField<V>,
    fcomp: usize,
    ncomp: usize,
    fvol: &BoxField<V>,
    ratio: IVec,
    ex: &Exchanger<'_, C>,
    tag: u16,
) -> Result<(), BoxFieldError>
where
    V: Float + Pod + Send + Sync + Default,
    C: Communicator,
{
    assert!(
        fine.index_type().is_cell(),
        "volume weighting applies to cell-centered data"
    );
    assert_eq!(crse.index_type(), fine.index_type());
    assert_eq!(crse.rank(), fine.rank());
    crse.check_comps(&(ccomp..ccomp + ncomp));
    fine.check_comps(&(fcomp..fcomp + ncomp));
    fine.check_pair(fvol, IVec::ZERO);
    finish(crse, ccomp, fine, ncomp, ratio, ex, tag, |dst, dcomp| {
        restrict_with_vol_into(dst, dcomp, fine, fcomp, ncomp, fvol, ratio)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::communicator::NoComm;
    use crate::geom::{BoxArray, IndexBox, IndexType, Layout, Periodicity, RankMap};

    fn layout(boxes: Vec<IndexBox>) -> Layout {
        let n = boxes.len();
        Layout::new(BoxArray::new(boxes).unwrap(), RankMap::new(vec![0; n])).unwrap()
    }

    fn exchanger(comm: &NoComm) -> Exchanger<'_, NoComm> {
        Exchanger::new(comm, Periodicity::non_periodic())
    }

    #[test]
    fn uniform_field_restricts_to_itself() {
        let fine_l = layout(vec![IndexBox::new(IVec::ZERO, IVec::new(8, 8, 2))]);
        let crse_l = fine_l.coarsen(IVec::splat(2));
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        fine.set_val(5.0, 0..1, IVec::ZERO);
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        average_down(&mut crse, 0, &fine, 0, 1, IVec::splat(2), &exchanger(&comm), 80).unwrap();
        assert_eq!(crse.local_min(0, IVec::ZERO), 5.0);
        assert_eq!(crse.local_max(0, IVec::ZERO), 5.0);
    }

    #[test]
    fn restriction_conserves_the_sum() {
        let r = IVec::new(2, 2, 1);
        let fine_l = layout(vec![IndexBox::new(IVec::ZERO, IVec::new(8, 4, 1))]);
        let crse_l = fine_l.coarsen(r);
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        fine.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, (p[0] * 7 + p[1] * 3) as f64);
            }
        });
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        average_down(&mut crse, 0, &fine, 0, 1, r, &exchanger(&comm), 81).unwrap();
        let fine_sum = fine.local_sum(0, IVec::ZERO);
        let crse_sum = crse.local_sum(0, IVec::ZERO);
        assert!((crse_sum * 4.0 - fine_sum).abs() < 1e-10);
    }

    #[test]
    fn nodal_restriction_injects_coincident_nodes() {
        let r = IVec::new(2, 2, 1);
        let ty = IndexType::node();
        let fine_l = layout(vec![IndexBox::new(IVec::ZERO, IVec::new(8, 8, 1)).convert(ty)]);
        let crse_l = fine_l.coarsen(r);
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        fine.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, (p[0] + 100 * p[1]) as f64);
            }
        });
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        average_down(&mut crse, 0, &fine, 0, 1, r, &exchanger(&comm), 82).unwrap();
        let cv = crse.view(0).unwrap();
        assert_eq!(cv.get(1, 2, 0, 0), (2 + 100 * 4) as f64);
        assert_eq!(cv.get(4, 4, 0, 0), (8 + 100 * 8) as f64);
    }

    #[test]
    fn face_restriction_averages_tangentially_only() {
        let r = IVec::new(2, 2, 1);
        let ty = IndexType::face(0);
        let fine_l = layout(vec![IndexBox::new(IVec::ZERO, IVec::new(8, 4, 1)).convert(ty)]);
        let crse_l = fine_l.coarsen(r);
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        // value depends on y only, so tangential averaging is visible
        fine.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, p[1] as f64);
            }
        });
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        average_down(&mut crse, 0, &fine, 0, 1, r, &exchanger(&comm), 83).unwrap();
        // coarse face (i, j) averages fine faces at y = 2j and 2j+1
        assert_eq!(crse.view(0).unwrap().get(1, 1, 0, 0), 2.5);
    }

    #[test]
    fn zero_volume_children_restrict_to_zero() {
        let r = IVec::new(2, 2, 1);
        let fine_l = layout(vec![IndexBox::new(IVec::ZERO, IVec::new(4, 2, 1))]);
        let crse_l = fine_l.coarsen(r);
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        fine.set_val(7.0, 0..1, IVec::ZERO);
        let mut vol = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        // volume only under coarse cell (0,0)
        vol.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                let w = if p[0] < 2 { 1.0 } else { 0.0 };
                v.set(p[0], p[1], p[2], 0, w);
            }
        });
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        average_down_with_vol(&mut crse, 0, &fine, 0, 1, &vol, r, &exchanger(&comm), 84).unwrap();
        let cv = crse.view(0).unwrap();
        assert_eq!(cv.get(0, 0, 0, 0), 7.0);
        assert_eq!(cv.get(1, 0, 0, 0), 0.0);
    }

    #[test]
    #[should_panic(expected = "does not evenly divide")]
    fn uncoarsenable_fine_layout_is_rejected() {
        let fine_l = layout(vec![IndexBox::new(IVec::ZERO, IVec::new(3, 2, 1))]);
        let crse_l = fine_l.coarsen(IVec::new(2, 2, 1));
        let fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        let _ = average_down(&mut crse, 0, &fine, 0, 1, IVec::new(2, 2, 1), &exchanger(&comm), 87);
    }

    #[test]
    fn general_path_matches_aligned_path() {
        let r = IVec::new(2, 2, 1);
        let fine_l = layout(vec![IndexBox::new(IVec::ZERO, IVec::new(8, 4, 1))]);
        let aligned_l = fine_l.coarsen(r);
        // same region, different box decomposition
        let split_l = layout(vec![
            IndexBox::new(IVec::ZERO, IVec::new(2, 2, 1)),
            IndexBox::new(IVec::new(2, 0, 0), IVec::new(4, 2, 1)),
        ]);
        assert_ne!(split_l, aligned_l);
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        fine.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, (p[0] * p[0] + p[1]) as f64);
            }
        });
        let comm = NoComm;
        let mut a = BoxField::<f64>::new(&aligned_l, 1, IVec::ZERO, 0).unwrap();
        let mut b = BoxField::<f64>::new(&split_l, 1, IVec::ZERO, 0).unwrap();
        average_down(&mut a, 0, &fine, 0, 1, r, &exchanger(&comm), 85).unwrap();
        average_down(&mut b, 0, &fine, 0, 1, r, &exchanger(&comm), 86).unwrap();
        let av = a.view(0).unwrap();
        for gidx in 0..2 {
            let bv = b.view(gidx).unwrap();
            for p in split_l.bx(gidx).points() {
                assert_eq!(bv.get(p[0], p[1], p[2], 0), av.get(p[0], p[1], p[2], 0));
            }
        }
    }
}
