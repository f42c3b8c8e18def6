//! Process-wide cache of communication plans.
//!
//! Plan construction walks the full cross product of two box arrays, so it
//! is worth amortizing: identical (source, destination, ghost, periodicity,
//! kind) requests must return the identical `Arc`. Layouts are keyed by the
//! identity tokens of their box array and rank map, not by content, so a
//! rebuilt layout with equal content gets a fresh plan. Entries are never
//! evicted; layouts outlive the solves that use them.

use std::sync::Arc;

use dashmap::DashMap;
use log::trace;
use once_cell::sync::Lazy;

use crate::comm::plan::{ExchangePlan, PlanKind};
use crate::geom::{IVec, Layout, Periodicity};

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PlanKey {
    src: (u64, u64),
    dst: (u64, u64),
    ngrow: IVec,
    period: [i64; 3],
    kind: PlanKind,
    rank: usize,
}

/// Keyed store of built plans.
#[derive(Default, Debug)]
pub struct PlanCache {
    plans: DashMap<PlanKey, Arc<ExchangePlan>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the plan for this request, building it on first use.
    pub fn get(
        &self,
        src: &Layout,
        dst: &Layout,
        ngrow: IVec,
        period: &Periodicity,
        kind: PlanKind,
        rank: usize,
    ) -> Arc<ExchangePlan> {
        let key = PlanKey {
            src: src.key(),
            dst: dst.key(),
            ngrow,
            period: period.key(),
            kind,
            rank,
        };
        if let Some(plan) = self.plans.get(&key) {
            trace!("plan cache hit for {key:?}");
            return Arc::clone(&plan);
        }
        trace!("plan cache miss for {key:?}");
        let plan = Arc::new(ExchangePlan::build(src, dst, ngrow, period, kind, rank));
        self.plans
            .entry(key)
            .or_insert(plan)
            .value()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

static DEFAULT_CACHE: Lazy<PlanCache> = Lazy::new(PlanCache::new);

/// The process-wide cache used by the container entry points.
pub fn default_plan_cache() -> &'static PlanCache {
    &DEFAULT_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{BoxArray, IndexBox, RankMap};

    fn layout() -> Layout {
        let ba = BoxArray::new(vec![
            IndexBox::new(IVec::ZERO, IVec::new(4, 4, 1)),
            IndexBox::new(IVec::new(4, 0, 0), IVec::new(8, 4, 1)),
        ])
        .unwrap();
        Layout::new(ba, RankMap::new(vec![0, 0])).unwrap()
    }

    #[test]
    fn repeated_requests_share_one_plan() {
        let cache = PlanCache::new();
        let l = layout();
        let p = Periodicity::non_periodic();
        let g = IVec::new(1, 1, 0);
        let a = cache.get(&l, &l, g, &p, PlanKind::FillGhosts, 0);
        let b = cache.get(&l, &l, g, &p, PlanKind::FillGhosts, 0);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_requests_get_distinct_entries() {
        let cache = PlanCache::new();
        let l = layout();
        let p = Periodicity::non_periodic();
        cache.get(&l, &l, IVec::new(1, 1, 0), &p, PlanKind::FillGhosts, 0);
        cache.get(&l, &l, IVec::new(2, 2, 0), &p, PlanKind::FillGhosts, 0);
        cache.get(&l, &l, IVec::new(1, 1, 0), &p, PlanKind::ParallelCopy, 0);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn equal_content_with_new_identity_misses() {
        let cache = PlanCache::new();
        let a = layout();
        let b = layout();
        assert_eq!(a, b);
        let p = Periodicity::non_periodic();
        let pa = cache.get(&a, &a, IVec::ZERO, &p, PlanKind::ParallelCopy, 0);
        let pb = cache.get(&b, &b, IVec::ZERO, &p, PlanKind::ParallelCopy, 0);
        assert!(!Arc::ptr_eq(&pa, &pb));
        assert_eq!(cache.len(), 2);
    }
}
