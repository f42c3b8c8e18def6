//! `Periodicity`: per-axis periodic domain lengths and shift enumeration.

use crate::geom::coords::IVec;
use crate::geom::index_box::IndexBox;

/// Periodic wrap description for the problem domain.
///
/// An axis is either non-periodic (`None`) or periodic with the given
/// domain length in index units. The hashable key form (`key()`) encodes
/// non-periodic axes as 0 so plans for distinct periodicities never share a
/// cache entry.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Periodicity {
    period: [Option<i64>; 3],
}

impl Periodicity {
    #[inline]
    pub fn non_periodic() -> Self {
        Periodicity::default()
    }

    /// Fully periodic over a cell-convention domain box.
    pub fn periodic(domain: &IndexBox) -> Self {
        let s = domain.size();
        Periodicity {
            period: [Some(s[0]), Some(s[1]), Some(s[2])],
        }
    }

    /// Periodic on selected axes of the domain box.
    pub fn periodic_axes(domain: &IndexBox, axes: [bool; 3]) -> Self {
        let s = domain.size();
        let mut period = [None; 3];
        for axis in 0..3 {
            if axes[axis] {
                period[axis] = Some(s[axis]);
            }
        }
        Periodicity { period }
    }

    #[inline]
    pub fn is_periodic(&self, axis: usize) -> bool {
        self.period[axis].is_some()
    }

    #[inline]
    pub fn any_periodic(&self) -> bool {
        self.period.iter().any(|p| p.is_some())
    }

    /// Stable cache-key form: domain length per periodic axis, 0 otherwise.
    #[inline]
    pub fn key(&self) -> [i64; 3] {
        [
            self.period[0].unwrap_or(0),
            self.period[1].unwrap_or(0),
            self.period[2].unwrap_or(0),
        ]
    }

    /// Every shift vector under which a source box may be imaged: the
    /// zero shift plus `±L` on each periodic axis, combined across axes.
    /// The zero shift is always first so the unshifted intersections lead
    /// the deterministic plan order.
    pub fn shifts(&self) -> Vec<IVec> {
        let mut out = vec![IVec::ZERO];
        for axis in 0..3 {
            if let Some(len) = self.period[axis] {
                let prev: Vec<IVec> = out.clone();
                for v in prev {
                    out.push(v + IVec::unit(axis) * len);
                    out.push(v - IVec::unit(axis) * len);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_periodic_has_only_zero_shift() {
        assert_eq!(Periodicity::non_periodic().shifts(), vec![IVec::ZERO]);
    }

    #[test]
    fn one_axis_gives_three_shifts() {
        let dom = IndexBox::new(IVec::ZERO, IVec::new(8, 4, 1));
        let p = Periodicity::periodic_axes(&dom, [true, false, false]);
        let shifts = p.shifts();
        assert_eq!(shifts.len(), 3);
        assert_eq!(shifts[0], IVec::ZERO);
        assert!(shifts.contains(&IVec::new(8, 0, 0)));
        assert!(shifts.contains(&IVec::new(-8, 0, 0)));
    }

    #[test]
    fn fully_periodic_3d_gives_27_shifts() {
        let dom = IndexBox::new(IVec::ZERO, IVec::splat(4));
        assert_eq!(Periodicity::periodic(&dom).shifts().len(), 27);
    }

    #[test]
    fn key_distinguishes_axes() {
        let dom = IndexBox::new(IVec::ZERO, IVec::new(8, 8, 1));
        let px = Periodicity::periodic_axes(&dom, [true, false, false]);
        let py = Periodicity::periodic_axes(&dom, [false, true, false]);
        assert_ne!(px.key(), py.key());
    }
}
