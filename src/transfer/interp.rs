//! Prolongation: coarse-level data interpolated onto a fine level.
//!
//! The driver stages coarse data onto the coarsened fine layout with a
//! plan-driven copy, so every fine box reads its enclosing coarse cells
//! (plus stencil ghosts) from local memory. Staged ghosts past a wall
//! face are filled by linear extrapolation before any kernel runs; a
//! monotone linear field therefore interpolates exactly up to the domain
//! boundary. Slope coefficients are computed once per coarse cell into a
//! per-box buffer before the fine loop, since `ratio^d` fine cells share
//! each coarse cell's coefficients.
//!
//! Boundary-condition records apply on non-periodic domain faces; on a
//! periodic axis the wrap supplies real data and the record must say
//! `Interior`.

use bytemuck::Pod;
use num_traits::Float;

use crate::comm::communicator::Communicator;
use crate::comm::exchange::{CombineMode, Exchanger};
use crate::data::field::BoxField;
use crate::data::view::{ArrayView, ArrayViewMut};
use crate::error::BoxFieldError;
use crate::geom::{IVec, IndexBox};
use crate::transfer::bc::{BcKind, BcRec};
use crate::transfer::cst;
use crate::transfer::slopes::{Limiter, compute_linear_slopes, compute_quadratic_slopes};

/// Interpolation kernel selection.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InterpMethod {
    /// Trilinear blend of the up-to-`2^d` nearest coarse cells.
    CellBilinear,
    /// Bilinear on node data; coincident nodes reproduce the coarse value
    /// bit for bit.
    NodeBilinear,
    /// Piecewise linear with minmod-limited, maximum-principle-damped
    /// slopes. Conservative under restriction.
    CellConservativeLinear(Limiter),
    /// Full quadratic reconstruction from second differences. Unlimited.
    CellQuadratic,
}

/// Interpolate `crse` onto every valid cell of `fine`.
///
/// `domain` is the coarse-level problem domain; `bcs` holds one record
/// per interpolated component.
#[allow(clippy::too_many_arguments)]
pub fn interp_from_coarse<V, C>(
    fine: &mut BoxField<V>,
    fcomp: usize,
    crse: &BoxField<V>,
    ccomp: usize,
    ncomp: usize,
    ratio: IVec,
    method: InterpMethod,
    bcs: &[BcRec],
    domain: &IndexBox,
    ex: &Exchanger<'_, C>,
    tag: u16,
) -> Result<(), BoxFieldError>
where
    V: Float + Pod + Send + Sync + Default,
    C: Communicator,
{
    fine.check_comps(&(fcomp..fcomp + ncomp));
    crse.check_comps(&(ccomp..ccomp + ncomp));
    assert_eq!(crse.index_type(), fine.index_type());
    assert_eq!(crse.rank(), fine.rank());
    match method {
        InterpMethod::NodeBilinear => assert!(fine.index_type().is_node()),
        _ => assert!(fine.index_type().is_cell()),
    }
    if matches!(
        method,
        InterpMethod::CellConservativeLinear(_) | InterpMethod::CellQuadratic
    ) {
        assert!(bcs.len() >= ncomp, "one boundary record per component");
    }

    let g = match method {
        InterpMethod::CellBilinear | InterpMethod::NodeBilinear => IVec::splat(1),
        _ => IVec::splat(2),
    };
    let staged_layout = fine.layout().coarsen(ratio);
    let mut staged = BoxField::<V>::new(&staged_layout, ncomp, g, fine.rank())?;
    ex.parallel_copy(&mut staged, 0, crse, ccomp, ncomp, g, tag, CombineMode::Overwrite)?;

    // wall faces per component: every non-periodic face for the bilinear
    // kernel, the `External` faces of the component's record otherwise
    let walls: Vec<([bool; 3], [bool; 3])> = (0..ncomp)
        .map(|n| {
            let mut lo = [false; 3];
            let mut hi = [false; 3];
            for a in 0..3 {
                if ex.periodicity().is_periodic(a) {
                    continue;
                }
                match method {
                    InterpMethod::CellBilinear => {
                        lo[a] = true;
                        hi[a] = true;
                    }
                    InterpMethod::NodeBilinear => {}
                    _ => {
                        lo[a] = bcs[n].lo[a] == BcKind::External;
                        hi[a] = bcs[n].hi[a] == BcKind::External;
                    }
                }
            }
            (lo, hi)
        })
        .collect();
    if walls.iter().any(|(lo, hi)| lo.iter().chain(hi).any(|&w| w)) {
        fill_wall_ghosts(&mut staged, g, domain, &walls);
    }

    let staged = &staged;
    let policy = staged.bounds_policy();
    fine.par_for_each_box_mut(|gidx, valid, mut fv| {
        let cv = staged.view(gidx).unwrap();
        match method {
            InterpMethod::CellBilinear => {
                for p in valid.points() {
                    for n in 0..ncomp {
                        let v = cell_bilinear(&cv, p, n, ratio);
                        fv.set(p[0], p[1], p[2], fcomp + n, v);
                    }
                }
            }
            InterpMethod::NodeBilinear => {
                for p in valid.points() {
                    for n in 0..ncomp {
                        let v = node_bilinear(&cv, p, n, ratio);
                        fv.set(p[0], p[1], p[2], fcomp + n, v);
                    }
                }
            }
            InterpMethod::CellConservativeLinear(limiter) => {
                let cbox = valid.coarsen(ratio);
                let mut buf = vec![V::zero(); cbox.num_points() * 3 * ncomp];
                let mut sl = ArrayViewMut::new(&mut buf, &cbox, 3 * ncomp, policy);
                compute_linear_slopes(limiter, &mut sl, &cv, &cbox, ncomp, ratio, domain, bcs);
                let sl = sl.as_view();
                for p in valid.points() {
                    for n in 0..ncomp {
                        let v = cell_linear(&cv, &sl, p, n, ncomp, ratio);
                        fv.set(p[0], p[1], p[2], fcomp + n, v);
                    }
                }
            }
            InterpMethod::CellQuadratic => {
                let cbox = valid.coarsen(ratio);
                let mut buf = vec![V::zero(); cbox.num_points() * 9 * ncomp];
                let mut sl = ArrayViewMut::new(&mut buf, &cbox, 9 * ncomp, policy);
                compute_quadratic_slopes(&mut sl, &cv, &cbox, ncomp, domain, bcs);
                let sl = sl.as_view();
                for p in valid.points() {
                    for n in 0..ncomp {
                        let v = cell_quadratic(&cv, &sl, p, n, ratio);
                        fv.set(p[0], p[1], p[2], fcomp + n, v);
                    }
                }
            }
        }
    });
    Ok(())
}

/// Fill staged ghost cells past a wall face by linear extrapolation from
/// the two adjacent data cells (a plain copy when only one plane of data
/// is available along the axis). Axes are processed in order so edge and
/// corner ghosts build on the faces filled before them.
fn fill_wall_ghosts<V>(
    staged: &mut BoxField<V>,
    g: IVec,
    domain: &IndexBox,
    walls: &[([bool; 3], [bool; 3])],
) where
    V: Float + Pod + Send + Sync + Default,
{
    let domain = *domain;
    staged.par_for_each_box_mut(|_, valid, mut v| {
        let gb = valid.grow(g);
        for (n, (wlo, whi)) in walls.iter().enumerate() {
            // planes holding data so far, widened axis by axis
            let mut flo = gb.lo();
            let mut fhi = gb.hi();
            for a in 0..3 {
                if wlo[a] {
                    flo[a] = flo[a].max(domain.lo()[a]);
                }
                if whi[a] {
                    fhi[a] = fhi[a].min(domain.hi()[a]);
                }
            }
            for a in 0..3 {
                let e = IVec::unit(a);
                while flo[a] > gb.lo()[a] {
                    let x = flo[a] - 1;
                    let flat = fhi[a] - flo[a] == 1;
                    let mut plo = flo;
                    let mut phi = fhi;
                    plo[a] = x;
                    phi[a] = x + 1;
                    for q in IndexBox::new(plo, phi).points() {
                        let u1 = v.get(q[0] + e[0], q[1] + e[1], q[2] + e[2], n);
                        let val = if flat {
                            u1
                        } else {
                            u1 + u1 - v.get(q[0] + 2 * e[0], q[1] + 2 * e[1], q[2] + 2 * e[2], n)
                        };
                        v.set(q[0], q[1], q[2], n, val);
                    }
                    flo[a] = x;
                }
                while fhi[a] < gb.hi()[a] {
                    let x = fhi[a];
                    let flat = fhi[a] - flo[a] == 1;
                    let mut plo = flo;
                    let mut phi = fhi;
                    plo[a] = x;
                    phi[a] = x + 1;
                    for q in IndexBox::new(plo, phi).points() {
                        let u1 = v.get(q[0] - e[0], q[1] - e[1], q[2] - e[2], n);
                        let val = if flat {
                            u1
                        } else {
                            u1 + u1 - v.get(q[0] - 2 * e[0], q[1] - 2 * e[1], q[2] - 2 * e[2], n)
                        };
                        v.set(q[0], q[1], q[2], n, val);
                    }
                    fhi[a] = x + 1;
                }
            }
        }
    });
}

/// Fractional offset of a fine cell center within its coarse cell,
/// in coarse cell widths, centered on zero.
#[inline]
fn center_offset<V: Float>(off: i64, ratio: i64) -> V {
    (cst::<V>(off as f64) + cst::<V>(0.5)) / cst::<V>(ratio as f64) - cst::<V>(0.5)
}

fn cell_bilinear<V: Float>(cv: &ArrayView<'_, V>, p: IVec, n: usize, ratio: IVec) -> V {
    let pc = p.coarsen(ratio);
    let mut s = [0i64; 3];
    let mut w = [V::one(); 3];
    for a in 0..3 {
        let off = p[a] - pc[a] * ratio[a];
        if 2 * off < ratio[a] {
            s[a] = -1;
            w[a] = cst::<V>((ratio[a] + 1 + 2 * off) as f64) / cst::<V>((2 * ratio[a]) as f64);
        } else {
            s[a] = 1;
            w[a] = cst::<V>((3 * ratio[a] - 1 - 2 * off) as f64) / cst::<V>((2 * ratio[a]) as f64);
        }
    }
    let mut out = V::zero();
    for bz in 0..2 {
        for by in 0..2 {
            for bx in 0..2 {
                let q = IVec::new(
                    pc[0] + if bx == 1 { s[0] } else { 0 },
                    pc[1] + if by == 1 { s[1] } else { 0 },
                    pc[2] + if bz == 1 { s[2] } else { 0 },
                );
                let weight = pick(w[0], bx) * pick(w[1], by) * pick(w[2], bz);
                out = out + cv.get(q[0], q[1], q[2], n) * weight;
            }
        }
    }
    out
}

#[inline]
fn pick<V: Float>(w: V, bit: usize) -> V {
    if bit == 0 { w } else { V::one() - w }
}

fn node_bilinear<V: Float>(cv: &ArrayView<'_, V>, p: IVec, n: usize, ratio: IVec) -> V {
    let pc = p.coarsen(ratio);
    let mut off = [0i64; 3];
    for a in 0..3 {
        off[a] = p[a] - pc[a] * ratio[a];
    }
    let mut out = V::zero();
    for bz in 0..2 {
        if bz == 1 && off[2] == 0 {
            continue;
        }
        for by in 0..2 {
            if by == 1 && off[1] == 0 {
                continue;
            }
            for bx in 0..2 {
                if bx == 1 && off[0] == 0 {
                    continue;
                }
                let bits = [bx, by, bz];
                let mut weight = V::one();
                for a in 0..3 {
                    if off[a] != 0 {
                        let wa = if bits[a] == 0 {
                            cst::<V>((ratio[a] - off[a]) as f64)
                        } else {
                            cst::<V>(off[a] as f64)
                        } / cst::<V>(ratio[a] as f64);
                        weight = weight * wa;
                    }
                }
                let q = IVec::new(
                    pc[0] + bx as i64,
                    pc[1] + by as i64,
                    pc[2] + bz as i64,
                );
                out = out + cv.get(q[0], q[1], q[2], n) * weight;
            }
        }
    }
    out
}

fn cell_linear<V: Float>(
    cv: &ArrayView<'_, V>,
    sl: &ArrayView<'_, V>,
    p: IVec,
    n: usize,
    ncomp: usize,
    ratio: IVec,
) -> V {
    let pc = p.coarsen(ratio);
    let xoff = center_offset::<V>(p[0] - pc[0] * ratio[0], ratio[0]);
    let yoff = center_offset::<V>(p[1] - pc[1] * ratio[1], ratio[1]);
    let zoff = center_offset::<V>(p[2] - pc[2] * ratio[2], ratio[2]);
    cv.get(pc[0], pc[1], pc[2], n)
        + xoff * sl.get(pc[0], pc[1], pc[2], n)
        + yoff * sl.get(pc[0], pc[1], pc[2], n + ncomp)
        + zoff * sl.get(pc[0], pc[1], pc[2], n + 2 * ncomp)
}

fn cell_quadratic<V: Float>(
    cv: &ArrayView<'_, V>,
    sl: &ArrayView<'_, V>,
    p: IVec,
    n: usize,
    ratio: IVec,
) -> V {
    let pc = p.coarsen(ratio);
    let xoff = center_offset::<V>(p[0] - pc[0] * ratio[0], ratio[0]);
    let yoff = center_offset::<V>(p[1] - pc[1] * ratio[1], ratio[1]);
    let zoff = center_offset::<V>(p[2] - pc[2] * ratio[2], ratio[2]);
    let half = cst::<V>(0.5);
    let s = |idx: usize| sl.get(pc[0], pc[1], pc[2], 9 * n + idx);
    cv.get(pc[0], pc[1], pc[2], n)
        + xoff * s(0)
        + yoff * s(1)
        + zoff * s(2)
        + half * xoff * xoff * s(3)
        + half * yoff * yoff * s(4)
        + half * zoff * zoff * s(5)
        + xoff * yoff * s(6)
        + xoff * zoff * s(7)
        + yoff * zoff * s(8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::communicator::NoComm;
    use crate::geom::{BoxArray, IndexType, Layout, Periodicity, RankMap};

    fn single_box_layout(b: IndexBox) -> Layout {
        Layout::new(BoxArray::new(vec![b]).unwrap(), RankMap::new(vec![0])).unwrap()
    }

    fn exchanger(comm: &NoComm) -> Exchanger<'_, NoComm> {
        Exchanger::new(comm, Periodicity::non_periodic())
    }

    #[test]
    fn conservative_linear_reproduces_linear_data() {
        // 1D: 8 coarse cells, ratio 2, u linear in x
        let domain = IndexBox::new(IVec::ZERO, IVec::new(8, 1, 1));
        let crse_l = single_box_layout(domain);
        let fine_l = crse_l.refine(IVec::new(2, 1, 1));
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        crse.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, p[0] as f64);
            }
        });
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        interp_from_coarse(
            &mut fine,
            0,
            &crse,
            0,
            1,
            IVec::new(2, 1, 1),
            InterpMethod::CellConservativeLinear(Limiter::Joint),
            &[BcRec::external()],
            &domain,
            &exchanger(&comm),
            90,
        )
        .unwrap();
        let fv = fine.view(0).unwrap();
        for i in 0..16i64 {
            let expect = (i as f64 + 0.5) / 2.0 - 0.5;
            assert!((fv.get(i, 0, 0, 0) - expect).abs() < 1e-14, "cell {i}");
        }
    }

    #[test]
    fn limiter_clamps_to_neighborhood_extremes() {
        // steep 2D profile around a cell of value 10: unclamped corners
        // would reach 13, neighborhood max is 12
        let domain = IndexBox::new(IVec::ZERO, IVec::new(4, 4, 1));
        let crse_l = single_box_layout(domain);
        let ratio = IVec::new(4, 4, 1);
        let fine_b = IndexBox::new(IVec::new(4, 4, 0), IVec::new(12, 12, 1));
        let fine_l = single_box_layout(fine_b);
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        crse.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, 10.0);
            }
        });
        {
            let mut v = crse.view_mut(0).unwrap();
            v.set(0, 1, 0, 0, 2.0);
            v.set(2, 1, 0, 0, 12.0);
            v.set(1, 0, 0, 0, 2.0);
            v.set(1, 2, 0, 0, 12.0);
        }
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        interp_from_coarse(
            &mut fine,
            0,
            &crse,
            0,
            1,
            ratio,
            InterpMethod::CellConservativeLinear(Limiter::Joint),
            &[BcRec::external()],
            &domain,
            &exchanger(&comm),
            91,
        )
        .unwrap();
        let fv = fine.view(0).unwrap();
        // children of coarse cell (1,1): fine cells [4,8) x [4,8)
        let mut fmax = f64::NEG_INFINITY;
        let mut fmin = f64::INFINITY;
        for j in 4..8i64 {
            for i in 4..8i64 {
                fmax = fmax.max(fv.get(i, j, 0, 0));
                fmin = fmin.min(fv.get(i, j, 0, 0));
            }
        }
        assert!((fmax - 12.0).abs() < 1e-12);
        assert!(fmin >= 2.0 - 1e-12);
    }

    #[test]
    fn per_axis_limiter_also_respects_the_maximum_principle() {
        let domain = IndexBox::new(IVec::ZERO, IVec::new(6, 6, 1));
        let crse_l = single_box_layout(domain);
        let ratio = IVec::new(2, 2, 1);
        let fine_l = crse_l.refine(ratio);
        let mut crse = BoxField::<f64>::new(&crse_l, 2, IVec::ZERO, 0).unwrap();
        crse.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, ((p[0] * 13 + p[1] * 7) % 11) as f64);
                v.set(p[0], p[1], p[2], 1, ((p[0] * 5 + p[1] * 17) % 9) as f64);
            }
        });
        let mut fine = BoxField::<f64>::new(&fine_l, 2, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        interp_from_coarse(
            &mut fine,
            0,
            &crse,
            0,
            2,
            ratio,
            InterpMethod::CellConservativeLinear(Limiter::PerAxis),
            &[BcRec::external(); 2],
            &domain,
            &exchanger(&comm),
            92,
        )
        .unwrap();
        let cv = crse.view(0).unwrap();
        let fv = fine.view(0).unwrap();
        // wall cells limit against extrapolated ghosts, so check the cells
        // whose 3x3 neighborhood lies inside the domain
        let interior = domain.grow(IVec::new(-1, -1, 0));
        for n in 0..2 {
            for pc in interior.points() {
                let mut lo = f64::INFINITY;
                let mut hi = f64::NEG_INFINITY;
                for jo in -1..=1i64 {
                    for io in -1..=1i64 {
                        let q = pc + IVec::new(io, jo, 0);
                        if domain.contains(q) {
                            lo = lo.min(cv.get(q[0], q[1], q[2], n));
                            hi = hi.max(cv.get(q[0], q[1], q[2], n));
                        }
                    }
                }
                for jo in 0..2i64 {
                    for io in 0..2i64 {
                        let f = fv.get(pc[0] * 2 + io, pc[1] * 2 + jo, 0, n);
                        assert!(f >= lo - 1e-12 && f <= hi + 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn node_interpolation_is_exact_at_coincident_nodes() {
        let ty = IndexType::node();
        let cdomain = IndexBox::new(IVec::ZERO, IVec::new(4, 4, 1));
        let crse_l = single_box_layout(cdomain.convert(ty));
        let ratio = IVec::new(2, 2, 1);
        let fine_l = crse_l.refine(ratio);
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        crse.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, 0.1 + (p[0] * 3 + p[1]) as f64 / 7.0);
            }
        });
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        interp_from_coarse(
            &mut fine,
            0,
            &crse,
            0,
            1,
            ratio,
            InterpMethod::NodeBilinear,
            &[],
            &cdomain,
            &exchanger(&comm),
            93,
        )
        .unwrap();
        let cv = crse.view(0).unwrap();
        let fv = fine.view(0).unwrap();
        // coincident nodes are bit-exact copies
        for p in crse_l.bx(0).points() {
            assert_eq!(
                fv.get(p[0] * 2, p[1] * 2, 0, 0),
                cv.get(p[0], p[1], p[2], 0)
            );
        }
        // midpoints average their endpoints
        let mid = fv.get(1, 0, 0, 0);
        let avg = 0.5 * (cv.get(0, 0, 0, 0) + cv.get(1, 0, 0, 0));
        assert!((mid - avg).abs() < 1e-15);
    }

    #[test]
    fn quadratic_reproduces_quadratic_data() {
        let domain = IndexBox::new(IVec::ZERO, IVec::new(6, 6, 1));
        let crse_l = single_box_layout(domain);
        let ratio = IVec::new(2, 2, 1);
        // interpolate only an interior patch so centered stencils apply
        let fine_b = IndexBox::new(IVec::new(2, 2, 0), IVec::new(10, 10, 1));
        let fine_l = single_box_layout(fine_b);
        let poly = |x: f64, y: f64| 1.0 + 2.0 * x - y + 0.5 * x * x + x * y - 0.25 * y * y;
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        crse.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, poly(p[0] as f64, p[1] as f64));
            }
        });
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        interp_from_coarse(
            &mut fine,
            0,
            &crse,
            0,
            1,
            ratio,
            InterpMethod::CellQuadratic,
            &[BcRec::interior()],
            &domain,
            &exchanger(&comm),
            94,
        )
        .unwrap();
        let fv = fine.view(0).unwrap();
        for p in fine_b.points() {
            let x = (p[0] as f64 + 0.5) / 2.0 - 0.5;
            let y = (p[1] as f64 + 0.5) / 2.0 - 0.5;
            assert!((fv.get(p[0], p[1], p[2], 0) - poly(x, y)).abs() < 1e-12);
        }
    }

    #[test]
    fn linear_data_passes_through_exactly_at_the_domain_faces() {
        // full-domain refinement: wall cells interpolate against
        // extrapolated ghosts and stay exact on linear data
        let domain = IndexBox::new(IVec::ZERO, IVec::new(6, 6, 1));
        let crse_l = single_box_layout(domain);
        let ratio = IVec::new(2, 2, 1);
        let fine_l = crse_l.refine(ratio);
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        crse.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, (3 * p[0] - 2 * p[1]) as f64);
            }
        });
        let comm = NoComm;
        for method in [
            InterpMethod::CellBilinear,
            InterpMethod::CellConservativeLinear(Limiter::Joint),
        ] {
            let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
            interp_from_coarse(
                &mut fine,
                0,
                &crse,
                0,
                1,
                ratio,
                method,
                &[BcRec::external()],
                &domain,
                &exchanger(&comm),
                96,
            )
            .unwrap();
            let fv = fine.view(0).unwrap();
            for p in fine_l.bx(0).points() {
                let x = (p[0] as f64 + 0.5) / 2.0 - 0.5;
                let y = (p[1] as f64 + 0.5) / 2.0 - 0.5;
                let expect = 3.0 * x - 2.0 * y;
                assert!(
                    (fv.get(p[0], p[1], p[2], 0) - expect).abs() < 1e-13,
                    "{method:?} at {p:?}"
                );
            }
        }
    }

    #[test]
    fn bilinear_is_exact_on_linear_interior_data() {
        let domain = IndexBox::new(IVec::ZERO, IVec::new(6, 6, 1));
        let crse_l = single_box_layout(domain);
        let ratio = IVec::new(2, 2, 1);
        let fine_b = IndexBox::new(IVec::new(2, 2, 0), IVec::new(10, 10, 1));
        let fine_l = single_box_layout(fine_b);
        let mut crse = BoxField::<f64>::new(&crse_l, 1, IVec::ZERO, 0).unwrap();
        crse.par_for_each_box_mut(|_, valid, mut v| {
            for p in valid.points() {
                v.set(p[0], p[1], p[2], 0, (3 * p[0] - 2 * p[1]) as f64);
            }
        });
        let mut fine = BoxField::<f64>::new(&fine_l, 1, IVec::ZERO, 0).unwrap();
        let comm = NoComm;
        interp_from_coarse(
            &mut fine,
            0,
            &crse,
            0,
            1,
            ratio,
            InterpMethod::CellBilinear,
            &[],
            &domain,
            &exchanger(&comm),
            95,
        )
        .unwrap();
        let fv = fine.view(0).unwrap();
        for p in fine_b.points() {
            let x = (p[0] as f64 + 0.5) / 2.0 - 0.5;
            let y = (p[1] as f64 + 0.5) / 2.0 - 0.5;
            let expect = 3.0 * x - 2.0 * y;
            assert!((fv.get(p[0], p[1], p[2], 0) - expect).abs() < 1e-13);
        }
    }
}
