#![cfg_attr(docsrs, feature(doc_cfg))]
//! # boxfield
//!
//! boxfield is a distributed container library for block-structured mesh
//! data, designed for adaptive-mesh scientific computing codes. A field is
//! a union of axis-aligned boxes partitioned over ranks; each rank
//! allocates only its own boxes and ghost regions are filled through
//! cached, plan-driven exchanges.
//!
//! ## Features
//! - `IndexBox`/`BoxArray`/`Layout` index-space geometry with per-axis
//!   cell or node centering, so face and edge data share one code path
//! - `BoxField<V>` container with ghost regions, strided views, and
//!   rayon-parallel per-box iteration
//! - Ghost fill, parallel copy, and shared-point synchronization over
//!   pluggable communication backends (serial, threaded, MPI)
//! - Deterministic global reductions: results are independent of rank
//!   count and box partitioning
//! - Inter-level transfer: conservative restriction and limited
//!   prolongation between refinement levels
//! - Snapshot capture and restore for checkpointing at a fixed rank count
//!
//! ## Determinism
//!
//! Every collective result is produced by folding per-box partials in
//! global box order and per-rank partials in rank order, so repeated runs
//! and repartitioned runs agree bitwise.
//!
//! ## Usage
//! Add `boxfield` as a dependency in your `Cargo.toml` and enable features
//! as needed:
//!
//! ```toml
//! [dependencies]
//! boxfield = "0.3"
//! # Optional features:
//! # features = ["mpi-support","check-invariants"]
//! ```

pub mod comm;
pub mod data;
pub mod error;
pub mod geom;
pub mod transfer;

pub use error::BoxFieldError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::comm::cache::{PlanCache, default_plan_cache};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::communicator::MpiComm;
    pub use crate::comm::communicator::{Communicator, NoComm, ThreadComm, Wait};
    pub use crate::comm::exchange::{CombineMode, Exchanger};
    pub use crate::data::field::BoxField;
    pub use crate::data::mask::{overlap_mask, owner_mask};
    pub use crate::data::reduce::ValLoc;
    pub use crate::data::snapshot::{Snapshot, SnapshotHeader};
    pub use crate::data::sync::{average_sync, override_sync, weighted_sync};
    pub use crate::data::view::{ArrayView, ArrayViewMut, BoundsPolicy};
    pub use crate::error::BoxFieldError;
    pub use crate::geom::{
        BoxArray, IVec, IndexBox, IndexType, Layout, Periodicity, RankMap,
    };
    pub use crate::transfer::{
        BcKind, BcRec, InterpMethod, Limiter, average_down, average_down_with_vol,
        interp_from_coarse,
    };
}
