//! Derivative estimation for prolongation: centered and one-sided first
//! differences, minmod-limited slopes with a maximum-principle damping
//! factor, and the second-difference coefficients of the quadratic
//! reconstruction.
//!
//! All kernels read a coarse view whose ghost region is already filled
//! (wall ghosts by extrapolation) and write into a per-box slope buffer.
//! One-sided derivative stencils never read outside the domain across an
//! `External` face; the damping scan reads whatever the view holds.

use num_traits::Float;

use crate::data::view::{ArrayView, ArrayViewMut};
use crate::geom::{IVec, IndexBox};
use crate::transfer::bc::{BcKind, BcRec};
use crate::transfer::cst;

/// How the maximum-principle damping factor is applied.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Limiter {
    /// One damping factor per component, applied jointly to all axes.
    Joint,
    /// A per-axis factor: the minimum over components of the ratio of the
    /// damped limited slope to the unlimited slope, applied to the
    /// unlimited slope of every component. Keeps component profiles
    /// parallel at the cost of extra diffusion.
    PerAxis,
}

#[inline]
fn at_lo_wall(p: IVec, axis: usize, domain: &IndexBox, bc: &BcRec) -> bool {
    bc.lo[axis] == BcKind::External && p[axis] <= domain.lo()[axis]
}

#[inline]
fn at_hi_wall(p: IVec, axis: usize, domain: &IndexBox, bc: &BcRec) -> bool {
    bc.hi[axis] == BcKind::External && p[axis] >= domain.hi()[axis] - 1
}

/// Unlimited first derivative along `axis`: centered in the interior,
/// second-order one-sided at an `External` wall.
pub(crate) fn first_deriv<V: Float>(
    u: &ArrayView<'_, V>,
    p: IVec,
    axis: usize,
    n: usize,
    domain: &IndexBox,
    bc: &BcRec,
) -> V {
    let e = IVec::unit(axis);
    let half = cst::<V>(0.5);
    if at_lo_wall(p, axis, domain, bc) {
        let u0 = u.get(p[0], p[1], p[2], n);
        let u1 = view_at(u, p + e, n);
        let u2 = view_at(u, p + e + e, n);
        (cst::<V>(4.0) * u1 - cst::<V>(3.0) * u0 - u2) * half
    } else if at_hi_wall(p, axis, domain, bc) {
        let u0 = u.get(p[0], p[1], p[2], n);
        let u1 = view_at(u, p - e, n);
        let u2 = view_at(u, p - e - e, n);
        (cst::<V>(3.0) * u0 - cst::<V>(4.0) * u1 + u2) * half
    } else {
        (view_at(u, p + e, n) - view_at(u, p - e, n)) * half
    }
}

/// Second derivative along `axis`; zero at an `External` wall where the
/// centered stencil would leave the domain.
pub(crate) fn second_deriv<V: Float>(
    u: &ArrayView<'_, V>,
    p: IVec,
    axis: usize,
    n: usize,
    domain: &IndexBox,
    bc: &BcRec,
) -> V {
    if at_lo_wall(p, axis, domain, bc) || at_hi_wall(p, axis, domain, bc) {
        return V::zero();
    }
    let e = IVec::unit(axis);
    view_at(u, p - e, n) - cst::<V>(2.0) * u.get(p[0], p[1], p[2], n) + view_at(u, p + e, n)
}

/// Mixed derivative along two axes; zero at an `External` wall on either.
pub(crate) fn cross_deriv<V: Float>(
    u: &ArrayView<'_, V>,
    p: IVec,
    a: usize,
    b: usize,
    n: usize,
    domain: &IndexBox,
    bc: &BcRec,
) -> V {
    if at_lo_wall(p, a, domain, bc)
        || at_hi_wall(p, a, domain, bc)
        || at_lo_wall(p, b, domain, bc)
        || at_hi_wall(p, b, domain, bc)
    {
        return V::zero();
    }
    let ea = IVec::unit(a);
    let eb = IVec::unit(b);
    cst::<V>(0.25)
        * (view_at(u, p + ea + eb, n) - view_at(u, p - ea + eb, n) - view_at(u, p + ea - eb, n)
            + view_at(u, p - ea - eb, n))
}

#[inline]
fn view_at<V: Copy>(u: &ArrayView<'_, V>, p: IVec, n: usize) -> V {
    u.get(p[0], p[1], p[2], n)
}

/// Minmod-limited slope along `axis` together with the unlimited slope.
///
/// Zero when forward and backward differences disagree in sign, otherwise
/// the sign-matched minimum of their doubled magnitudes, capped by the
/// unlimited slope's magnitude. At an `External` wall only the in-domain
/// difference participates.
fn limited_slope<V: Float>(
    u: &ArrayView<'_, V>,
    p: IVec,
    axis: usize,
    n: usize,
    domain: &IndexBox,
    bc: &BcRec,
) -> (V, V) {
    let e = IVec::unit(axis);
    let two = cst::<V>(2.0);
    let dc = first_deriv(u, p, axis, n, domain, bc);
    let u0 = u.get(p[0], p[1], p[2], n);
    let s = if at_lo_wall(p, axis, domain, bc) {
        let df = two * (view_at(u, p + e, n) - u0);
        df.abs()
    } else if at_hi_wall(p, axis, domain, bc) {
        let db = two * (u0 - view_at(u, p - e, n));
        db.abs()
    } else {
        let df = two * (view_at(u, p + e, n) - u0);
        let db = two * (u0 - view_at(u, p - e, n));
        if df * db >= V::zero() {
            df.abs().min(db.abs())
        } else {
            V::zero()
        }
    };
    (V::one().copysign(dc) * s.min(dc.abs()), dc)
}

/// Damping factor keeping the worst-case reconstructed deviation within
/// the 3^d neighborhood's min and max. The scan covers every neighbor the
/// view holds; wall ghosts are extrapolated before slopes are computed, so
/// in the interpolation driver that is the full neighborhood.
fn damping<V: Float>(u: &ArrayView<'_, V>, p: IVec, n: usize, s: [V; 3], ratio: IVec) -> V {
    let mut alpha = V::one();
    if s[0] == V::zero() && s[1] == V::zero() && s[2] == V::zero() {
        return alpha;
    }
    let mut dumax = V::zero();
    for a in 0..3 {
        dumax = dumax + s[a].abs() * cst::<V>((ratio[a] - 1) as f64) / cst::<V>((2 * ratio[a]) as f64);
    }
    let (blo, bhi) = (u.begin(), u.end());
    let u0 = u.get(p[0], p[1], p[2], n);
    let mut umin = u0;
    let mut umax = u0;
    for ko in -1i64..=1 {
        for jo in -1i64..=1 {
            for io in -1i64..=1 {
                let q = p + IVec::new(io, jo, ko);
                if (0..3).any(|a| q[a] < blo[a] || q[a] >= bhi[a]) {
                    continue;
                }
                let v = view_at(u, q, n);
                umin = umin.min(v);
                umax = umax.max(v);
            }
        }
    }
    if dumax * alpha > umax - u0 {
        alpha = (umax - u0) / dumax;
    }
    if dumax * alpha > u0 - umin {
        alpha = (u0 - umin) / dumax;
    }
    alpha
}

/// Fill a linear slope buffer over `cbox`: component `ns` of axis `a`
/// lands in slot `ns + a*ncomp`.
pub(crate) fn compute_linear_slopes<V: Float>(
    limiter: Limiter,
    sl: &mut ArrayViewMut<'_, V>,
    u: &ArrayView<'_, V>,
    cbox: &IndexBox,
    ncomp: usize,
    ratio: IVec,
    domain: &IndexBox,
    bcs: &[BcRec],
) {
    match limiter {
        Limiter::Joint => {
            for p in cbox.points() {
                for ns in 0..ncomp {
                    let bc = &bcs[ns];
                    let mut s = [V::zero(); 3];
                    for a in 0..3 {
                        s[a] = limited_slope(u, p, a, ns, domain, bc).0;
                    }
                    let alpha = damping(u, p, ns, s, ratio);
                    for a in 0..3 {
                        sl.set(p[0], p[1], p[2], ns + a * ncomp, s[a] * alpha);
                    }
                }
            }
        }
        Limiter::PerAxis => {
            for p in cbox.points() {
                let mut sf = [V::one(); 3];
                for ns in 0..ncomp {
                    let bc = &bcs[ns];
                    let mut s = [V::zero(); 3];
                    let mut dc = [V::zero(); 3];
                    for a in 0..3 {
                        let (sa, dca) = limited_slope(u, p, a, ns, domain, bc);
                        s[a] = sa;
                        dc[a] = dca;
                    }
                    let alpha = damping(u, p, ns, s, ratio);
                    for a in 0..3 {
                        if dc[a] != V::zero() {
                            sf[a] = sf[a].min(s[a] * alpha / dc[a]);
                        }
                        sl.set(p[0], p[1], p[2], ns + a * ncomp, dc[a]);
                    }
                }
                for ns in 0..ncomp {
                    for a in 0..3 {
                        let v = sl.get(p[0], p[1], p[2], ns + a * ncomp);
                        sl.set(p[0], p[1], p[2], ns + a * ncomp, v * sf[a]);
                    }
                }
            }
        }
    }
}

/// Fill a quadratic slope buffer over `cbox`: nine coefficients per
/// component in slots `9*n .. 9*n+9`, ordered x, y, z, xx, yy, zz, xy,
/// xz, yz.
pub(crate) fn compute_quadratic_slopes<V: Float>(
    sl: &mut ArrayViewMut<'_, V>,
    u: &ArrayView<'_, V>,
    cbox: &IndexBox,
    ncomp: usize,
    domain: &IndexBox,
    bcs: &[BcRec],
) {
    for p in cbox.points() {
        for n in 0..ncomp {
            let bc = &bcs[n];
            let c = [
                first_deriv(u, p, 0, n, domain, bc),
                first_deriv(u, p, 1, n, domain, bc),
                first_deriv(u, p, 2, n, domain, bc),
                second_deriv(u, p, 0, n, domain, bc),
                second_deriv(u, p, 1, n, domain, bc),
                second_deriv(u, p, 2, n, domain, bc),
                cross_deriv(u, p, 0, 1, n, domain, bc),
                cross_deriv(u, p, 0, 2, n, domain, bc),
                cross_deriv(u, p, 1, 2, n, domain, bc),
            ];
            for (idx, v) in c.into_iter().enumerate() {
                sl.set(p[0], p[1], p[2], 9 * n + idx, v);
            }
        }
    }
}
