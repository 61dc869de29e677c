//! Session state threaded through the refinement loop.
//!
//! `PlanState` is the single mutable unit of work: generation sets the plan,
//! evaluation sets the feedback, and the decide step advances the iteration
//! counter. The decide rule itself lives here as a pure function so its
//! ordering (budget first, then convergence) is trivially testable.

use crate::finalize::Acceptance;
use crate::plan::{CompletedWeek, WeeklyPlan};
use crate::review::findings::RoundFeedback;
use serde::{Deserialize, Serialize};

/// Observable phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Generating,
    Evaluating,
    Deciding,
    Revising,
    Finalizing,
    Done,
}

/// The unit of work for one refinement session.
#[derive(Debug, Clone)]
pub struct PlanState {
    /// What the user asked for. Immutable after construction.
    pub user_request: String,
    /// Current candidate plan; `None` until the first generation.
    pub plan: Option<WeeklyPlan>,
    /// Aggregated feedback from the most recent evaluation round, or `None`
    /// when the last round was clean (or no round has run yet).
    pub feedback: Option<RoundFeedback>,
    /// Completed evaluation rounds.
    pub iteration: u32,
    /// Week this session plans for (1-based).
    pub week_number: u32,
    /// Prior week's canonical plan and recorded outcomes. Required when
    /// `week_number > 1`; the progression check evaluates it.
    pub previous_week: Option<CompletedWeek>,
}

impl PlanState {
    pub fn new(
        user_request: impl Into<String>,
        week_number: u32,
        previous_week: Option<CompletedWeek>,
    ) -> Self {
        Self {
            user_request: user_request.into(),
            plan: None,
            feedback: None,
            iteration: 0,
            week_number,
            previous_week,
        }
    }

    /// Actionable feedback from the last round, if any.
    pub fn has_outstanding_feedback(&self) -> bool {
        self.feedback.as_ref().is_some_and(|f| !f.is_empty())
    }
}

/// Outcome of the decide step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Finalize with the given acceptance mode.
    Accept(Acceptance),
    /// Loop back into generation in revise mode.
    Revise,
}

/// Decide what happens after an evaluation round.
///
/// Rules apply in order: an exhausted iteration budget forces acceptance
/// (regardless of outstanding feedback), a clean round converges, anything
/// else revises.
pub fn decide(state: &PlanState, max_iterations: u32) -> Decision {
    if state.iteration >= max_iterations {
        Decision::Accept(Acceptance::Forced)
    } else if !state.has_outstanding_feedback() {
        Decision::Accept(Acceptance::Converged)
    } else {
        Decision::Revise
    }
}
