//! Canonical output and finalization.
//!
//! Finalization normalizes the last accepted plan into the shape the rest of
//! the world consumes: sorted day order, fully-populated exercise fields,
//! the week number, any outstanding feedback, and whether acceptance was
//! earned (convergence) or forced by the iteration budget. The two are
//! materially different outcomes and stay distinguishable.

use crate::errors::SessionError;
use crate::orchestrator::state::PlanState;
use crate::plan::Exercise;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acceptance {
    /// Every check came back clean.
    Converged,
    /// The iteration budget ran out with feedback still outstanding.
    Forced,
}

impl Acceptance {
    pub fn is_forced(&self) -> bool {
        matches!(self, Self::Forced)
    }
}

/// The canonical, normalized session output.
///
/// Equality ignores `generated_at`: the normalized body is a pure function
/// of the final state, and that is what idempotence is judged on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalPlan {
    pub week_number: u32,
    pub days: BTreeMap<String, Vec<Exercise>>,
    /// Aggregated feedback still outstanding at finalize time. Present
    /// under forced acceptance, absent on convergence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critic_feedback: Option<String>,
    pub acceptance: Acceptance,
    pub iterations: u32,
    pub generated_at: DateTime<Utc>,
}

impl PartialEq for CanonicalPlan {
    fn eq(&self, other: &Self) -> bool {
        self.week_number == other.week_number
            && self.days == other.days
            && self.critic_feedback == other.critic_feedback
            && self.acceptance == other.acceptance
            && self.iterations == other.iterations
    }
}

/// Normalizes a final state into canonical output.
#[async_trait]
pub trait PlanFinalizer: Send + Sync {
    async fn finalize(
        &self,
        state: &PlanState,
        acceptance: Acceptance,
    ) -> anyhow::Result<CanonicalPlan>;
}

/// The standard finalizer: pure normalization, no model involvement.
pub struct CanonicalFinalizer;

#[async_trait]
impl PlanFinalizer for CanonicalFinalizer {
    async fn finalize(
        &self,
        state: &PlanState,
        acceptance: Acceptance,
    ) -> anyhow::Result<CanonicalPlan> {
        let days: BTreeMap<String, Vec<Exercise>> = state
            .plan
            .as_ref()
            .map(|plan| {
                plan.days
                    .iter()
                    .map(|(day, exercises)| {
                        let normalized = exercises.iter().map(Exercise::normalized).collect();
                        (day.clone(), normalized)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let critic_feedback = state
            .feedback
            .as_ref()
            .filter(|f| !f.is_empty())
            .map(|f| f.render());

        Ok(CanonicalPlan {
            week_number: state.week_number,
            days,
            critic_feedback,
            acceptance,
            iterations: state.iteration,
            generated_at: Utc::now(),
        })
    }
}

/// Wrap a finalizer error into the session-level taxonomy.
pub fn finalization_error(e: anyhow::Error) -> SessionError {
    SessionError::FinalizationFailed(format!("{e:#}"))
}
