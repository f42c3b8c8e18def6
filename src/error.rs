//! BoxFieldError: unified error type for boxfield public APIs.
//!
//! Fallible construction and lookup paths return this type. Operand
//! mismatches between two containers in a bulk operation (different
//! layouts, component ranges, ghost widths) are treated as programmer
//! errors and abort with a diagnostic instead; see the crate docs.

use thiserror::Error;

use crate::geom::IndexBox;

/// Unified error type for boxfield operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoxFieldError {
    /// A box with `lo >= hi` on some axis was used where a nonempty box is required.
    #[error("empty or inverted box: {0:?}")]
    EmptyBox(IndexBox),
    /// BoxArray and RankMap lengths disagree.
    #[error("layout mismatch: {nboxes} boxes but {nranks} rank entries")]
    LayoutLengthMismatch { nboxes: usize, nranks: usize },
    /// A rank entry exceeds the communicator size it is used with.
    #[error("rank {rank} out of range for {size} processes")]
    RankOutOfRange { rank: usize, size: usize },
    /// A global box index is not mapped to the local rank.
    #[error("box {0} is not owned by this rank (no buffer allocated)")]
    NotLocal(usize),
    /// A global box index is outside the BoxArray.
    #[error("box index {index} out of range ({len} boxes)")]
    BoxIndexOutOfRange { index: usize, len: usize },
    /// A container was asked for with zero components.
    #[error("container must have at least one component")]
    ZeroComponents,
    /// Snapshot header does not match the restoring configuration.
    #[error("snapshot recorded {recorded} processes, restore has {found}")]
    SnapshotProcessCount { recorded: usize, found: usize },
    /// Snapshot buffer count does not match the local box count.
    #[error("snapshot holds {found} buffers, this rank owns {expected} boxes")]
    SnapshotBoxCount { expected: usize, found: usize },
    /// Snapshot buffer length does not match its box.
    #[error("snapshot buffer for box {index} has {found} bytes, expected {expected}")]
    SnapshotBufferLength { index: usize, expected: usize, found: usize },
}
