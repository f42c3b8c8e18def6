//! Communication plans: who copies what where.
//!
//! A plan is built from replicated metadata only (two layouts, a ghost
//! width, periodicity), so every rank derives the same global list of copy
//! regions with no communication. The enumeration order is fixed: for each
//! destination box in array order, each source box in array order, each
//! periodic shift with the zero shift first. Because sender and receiver
//! walk the same list, the sender's pack order for a peer is exactly the
//! receiver's unpack order, and no region indices travel on the wire.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geom::{IVec, IndexBox, Layout, Periodicity};

/// What a plan moves.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PlanKind {
    /// Source valid cells into destination valid plus ghost cells.
    ParallelCopy,
    /// Source valid cells into destination ghost cells only.
    FillGhosts,
    /// Valid cells both sides; used for points shared by multiple boxes of
    /// a nodal layout. Identity pairs (same box, zero shift) are skipped.
    SharedPoints,
}

/// One rectangular copy, expressed in the destination index frame.
///
/// The matching source points are `region.shift(-shift)`: a destination
/// point `p` receives source point `p - shift`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CopyRegion {
    pub src_idx: usize,
    pub dst_idx: usize,
    pub region: IndexBox,
    pub shift: IVec,
}

impl CopyRegion {
    #[inline]
    pub fn num_points(&self) -> usize {
        self.region.num_points()
    }
}

/// A rank's slice of the global copy list.
#[derive(Debug)]
pub struct ExchangePlan {
    pub kind: PlanKind,
    /// Both endpoints on this rank.
    pub local: Vec<CopyRegion>,
    /// Regions this rank sends, per destination rank, in global order.
    pub send: BTreeMap<usize, Vec<CopyRegion>>,
    /// Regions this rank receives, per source rank, in global order.
    pub recv: BTreeMap<usize, Vec<CopyRegion>>,
}

impl ExchangePlan {
    /// Enumerate the global copy list and keep this rank's part.
    ///
    /// `ngrow` is the destination ghost width the plan covers; it must not
    /// exceed what the destination container allocates. For `SharedPoints`
    /// it is ignored (valid regions only).
    pub fn build(
        src: &Layout,
        dst: &Layout,
        ngrow: IVec,
        period: &Periodicity,
        kind: PlanKind,
        my_rank: usize,
    ) -> Self {
        let shifts = period.shifts();
        let same_array = src.boxes() == dst.boxes();

        let mut plan = ExchangePlan {
            kind,
            local: Vec::new(),
            send: BTreeMap::new(),
            recv: BTreeMap::new(),
        };

        let mut targets: Vec<IndexBox> = Vec::with_capacity(6);
        for j in 0..dst.len() {
            let valid = dst.bx(j);
            targets.clear();
            match kind {
                PlanKind::ParallelCopy => targets.push(valid.grow(ngrow)),
                PlanKind::FillGhosts => targets.extend(valid.grow(ngrow).difference(&valid)),
                PlanKind::SharedPoints => targets.push(valid),
            }
            let dst_rank = dst.rank_of(j);
            for i in 0..src.len() {
                let src_rank = src.rank_of(i);
                if src_rank != my_rank && dst_rank != my_rank {
                    continue;
                }
                let src_bx = src.bx(i);
                for &s in &shifts {
                    if kind == PlanKind::SharedPoints && same_array && i == j && s == IVec::ZERO {
                        continue;
                    }
                    let shifted = src_bx.shift(s);
                    for target in &targets {
                        let Some(region) = shifted.intersection(target) else {
                            continue;
                        };
                        let cr = CopyRegion {
                            src_idx: i,
                            dst_idx: j,
                            region,
                            shift: s,
                        };
                        if src_rank == my_rank && dst_rank == my_rank {
                            plan.local.push(cr);
                        } else if src_rank == my_rank {
                            plan.send.entry(dst_rank).or_default().push(cr);
                        } else {
                            plan.recv.entry(src_rank).or_default().push(cr);
                        }
                    }
                }
            }
        }
        #[cfg(feature = "check-invariants")]
        plan.check_regions(src, dst, ngrow);
        debug!(
            "built {kind:?} plan on rank {my_rank}: {} local regions, {} send peers, {} recv peers",
            plan.local.len(),
            plan.send.len(),
            plan.recv.len()
        );
        plan
    }

    /// Every region must read inside its source box and write inside its
    /// destination box grown by `ngrow`.
    #[cfg(feature = "check-invariants")]
    fn check_regions(&self, src: &Layout, dst: &Layout, ngrow: IVec) {
        let all = self
            .local
            .iter()
            .chain(self.send.values().flatten())
            .chain(self.recv.values().flatten());
        for cr in all {
            let src_bx = src.bx(cr.src_idx);
            let dst_bx = dst.bx(cr.dst_idx).grow(ngrow);
            assert!(
                src_bx.contains_box(&cr.region.shift(-cr.shift)),
                "plan region {:?} reads outside source box {src_bx:?}",
                cr.region
            );
            assert!(
                dst_bx.contains_box(&cr.region),
                "plan region {:?} writes outside destination box {dst_bx:?}",
                cr.region
            );
        }
    }

    /// Points this rank sends to `peer`, summed over regions.
    pub fn send_points(&self, peer: usize) -> usize {
        self.send
            .get(&peer)
            .map_or(0, |rs| rs.iter().map(CopyRegion::num_points).sum())
    }

    /// Points this rank receives from `peer`, summed over regions.
    pub fn recv_points(&self, peer: usize) -> usize {
        self.recv
            .get(&peer)
            .map_or(0, |rs| rs.iter().map(CopyRegion::num_points).sum())
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.send.is_empty() && self.recv.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{BoxArray, IndexType, RankMap};

    fn layout(boxes: Vec<IndexBox>, ranks: Vec<usize>) -> Layout {
        Layout::new(BoxArray::new(boxes).unwrap(), RankMap::new(ranks)).unwrap()
    }

    #[test]
    fn ghost_fill_between_abutting_boxes() {
        let l = layout(
            vec![
                IndexBox::new(IVec::ZERO, IVec::new(4, 4, 1)),
                IndexBox::new(IVec::new(4, 0, 0), IVec::new(8, 4, 1)),
            ],
            vec![0, 0],
        );
        let plan = ExchangePlan::build(
            &l,
            &l,
            IVec::new(1, 1, 0),
            &Periodicity::non_periodic(),
            PlanKind::FillGhosts,
            0,
        );
        assert!(plan.send.is_empty() && plan.recv.is_empty());
        // box 1 fills box 0's x-high ghost face and vice versa
        let into0: Vec<_> = plan.local.iter().filter(|r| r.dst_idx == 0).collect();
        assert_eq!(into0.len(), 1);
        assert_eq!(
            into0[0].region,
            IndexBox::new(IVec::new(4, 0, 0), IVec::new(5, 4, 1))
        );
        assert_eq!(into0[0].src_idx, 1);
        assert_eq!(into0[0].shift, IVec::ZERO);
    }

    #[test]
    fn ghost_regions_never_cover_valid_cells() {
        let l = layout(
            vec![
                IndexBox::new(IVec::ZERO, IVec::new(4, 4, 1)),
                IndexBox::new(IVec::new(2, 4, 0), IVec::new(6, 8, 1)),
            ],
            vec![0, 0],
        );
        let plan = ExchangePlan::build(
            &l,
            &l,
            IVec::new(2, 2, 0),
            &Periodicity::non_periodic(),
            PlanKind::FillGhosts,
            0,
        );
        for cr in &plan.local {
            let valid = l.bx(cr.dst_idx);
            assert!(cr.region.intersection(&valid).is_none());
        }
    }

    #[test]
    fn periodic_wrap_produces_shifted_regions() {
        let domain = IndexBox::new(IVec::ZERO, IVec::new(8, 1, 1));
        let l = layout(vec![domain], vec![0]);
        let period = Periodicity::periodic_axes(&domain, [true, false, false]);
        let plan = ExchangePlan::build(
            &l,
            &l,
            IVec::new(1, 0, 0),
            &period,
            PlanKind::FillGhosts,
            0,
        );
        // the box fills its own lo and hi x ghosts through the wrap
        assert_eq!(plan.local.len(), 2);
        let shifts: Vec<IVec> = plan.local.iter().map(|r| r.shift).collect();
        assert!(shifts.contains(&IVec::new(8, 0, 0)));
        assert!(shifts.contains(&IVec::new(-8, 0, 0)));
    }

    #[test]
    fn send_and_recv_sides_mirror_each_other() {
        let l = layout(
            vec![
                IndexBox::new(IVec::ZERO, IVec::new(4, 4, 1)),
                IndexBox::new(IVec::new(4, 0, 0), IVec::new(8, 4, 1)),
            ],
            vec![0, 1],
        );
        let p = Periodicity::non_periodic();
        let g = IVec::new(1, 0, 0);
        let plan0 = ExchangePlan::build(&l, &l, g, &p, PlanKind::FillGhosts, 0);
        let plan1 = ExchangePlan::build(&l, &l, g, &p, PlanKind::FillGhosts, 1);
        assert_eq!(plan0.send.get(&1).unwrap(), plan1.recv.get(&0).unwrap());
        assert_eq!(plan0.recv.get(&1).unwrap(), plan1.send.get(&0).unwrap());
        assert_eq!(plan0.send_points(1), plan1.recv_points(0));
    }

    #[test]
    fn shared_points_skips_identity_and_finds_seams() {
        // two nodal boxes sharing the x = 4 plane of nodes
        let ty = IndexType::node();
        let l = layout(
            vec![
                IndexBox::new(IVec::ZERO, IVec::new(4, 4, 1)).convert(ty),
                IndexBox::new(IVec::new(4, 0, 0), IVec::new(8, 4, 1)).convert(ty),
            ],
            vec![0, 0],
        );
        let plan = ExchangePlan::build(
            &l,
            &l,
            IVec::ZERO,
            &Periodicity::non_periodic(),
            PlanKind::SharedPoints,
            0,
        );
        // exactly one seam in each direction, no self copies
        assert_eq!(plan.local.len(), 2);
        for cr in &plan.local {
            assert_ne!(cr.src_idx, cr.dst_idx);
            assert_eq!(cr.region.lo()[0], 4);
            assert_eq!(cr.region.hi()[0], 5);
        }
    }
}
