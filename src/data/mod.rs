//! Field data: the container, its views, arena accounting, reductions,
//! masks, shared-point synchronization, and checkpointing.

pub mod arena;
pub mod field;
pub mod mask;
pub mod reduce;
pub mod snapshot;
pub mod sync;
pub mod view;

pub use arena::{CountingArena, MemoryArena, default_arena};
pub use field::BoxField;
pub use mask::{overlap_mask, owner_mask};
pub use reduce::{ValLoc, all_gather};
pub use snapshot::{Snapshot, SnapshotHeader};
pub use sync::{average_sync, override_sync, weighted_sync};
pub use view::{ArrayView, ArrayViewMut, BoundsPolicy};
