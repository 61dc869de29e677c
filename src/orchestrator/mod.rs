//! The iterative refinement loop.
//!
//! - [`state`]: session state, phases, and the decide rule
//! - [`session`]: the driver that wires collaborators through the loop

pub mod session;
pub mod state;

pub use session::Session;
pub use state::{Decision, PlanState, SessionState, decide};
