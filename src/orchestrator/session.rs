//! The refinement session driver.
//!
//! A `Session` owns its collaborators behind trait objects and walks the
//! state machine: generate a candidate, evaluate it, decide, and either loop
//! back through revision or finalize. Every phase transition is traced with
//! the session id so interleaved runs stay readable in the logs.

use crate::config::SessionConfig;
use crate::errors::SessionError;
use crate::finalize::{CanonicalPlan, PlanFinalizer, finalization_error};
use crate::generate::PlanGenerator;
use crate::orchestrator::state::{Decision, PlanState, SessionState, decide};
use crate::plan::CompletedWeek;
use crate::review::pipeline::ReviewPipeline;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Drives one plan from request to canonical output.
pub struct Session {
    config: SessionConfig,
    generator: Arc<dyn PlanGenerator>,
    pipeline: ReviewPipeline,
    finalizer: Arc<dyn PlanFinalizer>,
}

impl Session {
    /// Build a session. Fails when the configuration is invalid or the
    /// pipeline's check registry for the configured week is unusable.
    pub fn new(
        config: SessionConfig,
        generator: Arc<dyn PlanGenerator>,
        pipeline: ReviewPipeline,
        finalizer: Arc<dyn PlanFinalizer>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            pipeline,
            finalizer,
        })
    }

    /// Run the session to completion.
    ///
    /// Weeks after the first require the prior week's plan and outcomes;
    /// that is checked before any collaborator is called. Generation errors
    /// abort the session with no canonical output.
    pub async fn run(
        &self,
        user_request: &str,
        previous_week: Option<CompletedWeek>,
    ) -> Result<CanonicalPlan, SessionError> {
        if self.config.week_number > 1 && previous_week.is_none() {
            return Err(SessionError::InvalidConfig(format!(
                "week {} requires the previous week's plan and outcomes",
                self.config.week_number
            )));
        }

        let session_id = Uuid::new_v4();
        let mut state = PlanState::new(user_request, self.config.week_number, previous_week);
        let mut phase = SessionState::Init;
        info!(
            %session_id,
            week = state.week_number,
            max_iterations = self.config.max_iterations,
            "session starting"
        );

        phase = self.transition(session_id, phase, SessionState::Generating);
        state.plan = Some(self.generator.create(&state).await.map_err(|e| {
            SessionError::GenerationFailed {
                iteration: state.iteration + 1,
                message: format!("{e:#}"),
            }
        })?);

        let acceptance = loop {
            phase = self.transition(session_id, phase, SessionState::Evaluating);
            let feedback = self.pipeline.run(&state).await;
            info!(
                %session_id,
                iteration = state.iteration + 1,
                actionable_sections = feedback.len(),
                "evaluation round complete"
            );
            state.feedback = if feedback.is_empty() {
                None
            } else {
                Some(feedback)
            };
            state.iteration += 1;

            phase = self.transition(session_id, phase, SessionState::Deciding);
            match decide(&state, self.config.max_iterations) {
                Decision::Accept(acceptance) => {
                    if acceptance.is_forced() && state.has_outstanding_feedback() {
                        warn!(
                            %session_id,
                            iterations = state.iteration,
                            "iteration budget exhausted with feedback outstanding"
                        );
                    }
                    break acceptance;
                }
                Decision::Revise => {
                    phase = self.transition(session_id, phase, SessionState::Revising);
                    // decide() only revises when feedback is outstanding.
                    let feedback = state.feedback.clone().unwrap_or_default();
                    state.plan =
                        Some(self.generator.revise(&state, &feedback).await.map_err(|e| {
                            SessionError::GenerationFailed {
                                iteration: state.iteration + 1,
                                message: format!("{e:#}"),
                            }
                        })?);
                }
            }
        };

        phase = self.transition(session_id, phase, SessionState::Finalizing);
        let canonical = self
            .finalizer
            .finalize(&state, acceptance)
            .await
            .map_err(finalization_error)?;

        self.transition(session_id, phase, SessionState::Done);
        info!(
            %session_id,
            iterations = canonical.iterations,
            acceptance = ?canonical.acceptance,
            "session complete"
        );
        Ok(canonical)
    }

    fn transition(&self, session_id: Uuid, from: SessionState, to: SessionState) -> SessionState {
        info!(%session_id, ?from, ?to, "state transition");
        to
    }
}
