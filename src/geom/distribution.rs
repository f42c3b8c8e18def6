//! `RankMap`: owning process rank for every BoxArray entry.
//!
//! The map is replicated metadata: every process holds the same vector and
//! derives ownership without communication.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::BoxFieldError;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn fresh_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Maps each global box index to its owning rank.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RankMap {
    ranks: Vec<usize>,
    #[serde(skip, default = "fresh_token")]
    token: u64,
}

impl PartialEq for RankMap {
    fn eq(&self, other: &Self) -> bool {
        self.ranks == other.ranks
    }
}
impl Eq for RankMap {}

impl RankMap {
    pub fn new(ranks: Vec<usize>) -> Self {
        RankMap {
            ranks,
            token: fresh_token(),
        }
    }

    /// Round-robin assignment of `nboxes` boxes over `size` ranks, the
    /// default when the caller has no better partitioner.
    pub fn round_robin(nboxes: usize, size: usize) -> Self {
        assert!(size > 0, "round_robin over zero ranks");
        RankMap::new((0..nboxes).map(|i| i % size).collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Owning rank of box `i`.
    #[inline]
    pub fn rank_of(&self, i: usize) -> usize {
        self.ranks[i]
    }

    /// Global indices of the boxes owned by `rank`, in array order.
    pub fn local_indices(&self, rank: usize) -> impl Iterator<Item = usize> + '_ {
        self.ranks
            .iter()
            .enumerate()
            .filter_map(move |(i, &r)| (r == rank).then_some(i))
    }

    /// Validate every entry against a communicator size.
    pub fn validate(&self, size: usize) -> Result<(), BoxFieldError> {
        match self.ranks.iter().find(|&&r| r >= size) {
            Some(&rank) => Err(BoxFieldError::RankOutOfRange { rank, size }),
            None => Ok(()),
        }
    }
}
