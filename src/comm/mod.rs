//! Communication: the message-passing façade, plan construction, the plan
//! cache, and the plan-driven exchange engine.

pub mod cache;
pub mod communicator;
pub mod exchange;
pub mod plan;

pub use cache::{PlanCache, default_plan_cache};
pub use communicator::{Communicator, NoComm, ThreadComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use exchange::{CombineMode, Exchanger};
pub use plan::{CopyRegion, ExchangePlan, PlanKind};
