//! Index-space geometry: coordinates, boxes, box collections, ownership,
//! and periodicity.
//!
//! These are the external collaborators of the container and transfer
//! engine: globally replicated, immutable-once-built metadata from which
//! every process derives the same partition view with no communication.

pub mod box_array;
pub mod coords;
pub mod distribution;
pub mod index_box;
pub mod layout;
pub mod periodicity;

pub use box_array::BoxArray;
pub use coords::{IVec, IndexType};
pub use distribution::RankMap;
pub use index_box::IndexBox;
pub use layout::Layout;
pub use periodicity::Periodicity;
