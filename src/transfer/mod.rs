//! Inter-level transfer: restriction onto a coarser level and
//! prolongation onto a finer one.

pub mod average_down;
pub mod bc;
pub mod interp;
pub mod slopes;

pub use average_down::{average_down, average_down_with_vol};
pub use bc::{BcKind, BcRec};
pub use interp::{InterpMethod, interp_from_coarse};
pub use slopes::Limiter;

use num_traits::Float;

/// Lossless for the small integer and half-integer constants the transfer
/// kernels use.
#[inline]
pub(crate) fn cst<V: Float>(x: f64) -> V {
    V::from(x).unwrap()
}
