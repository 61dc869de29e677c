//! Plan generation collaborator.
//!
//! The orchestrator only sees the `PlanGenerator` trait; the shipped
//! implementation drives a `ModelClient` with create/revise prompts and
//! extracts a `WeeklyPlan` from whatever comes back. Generation failures
//! propagate (the orchestrator treats them as fatal to the session) but a
//! malformed plan shape degrades to an empty plan rather than crashing.

use crate::model::{ModelClient, ModelReply};
use crate::orchestrator::state::PlanState;
use crate::plan::WeeklyPlan;
use crate::review::findings::RoundFeedback;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces candidate plans. `create` runs once per session; `revise` runs
/// once per feedback round.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn create(&self, state: &PlanState) -> Result<WeeklyPlan>;
    async fn revise(&self, state: &PlanState, feedback: &RoundFeedback) -> Result<WeeklyPlan>;
}

/// JSON skeleton the model is asked to fill in.
const PLAN_STRUCTURE: &str = r#"Respond with JSON of the form:
{
  "weekly_program": {
    "day_1": [
      {"name": "...", "sets": 3, "reps": "8-12", "target_rpe": "7-8", "rest": "60-90 seconds", "cues": "..."}
    ]
  }
}"#;

/// Generator backed by a model client.
pub struct ModelPlanGenerator {
    model: Arc<dyn ModelClient>,
}

impl ModelPlanGenerator {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    fn create_prompt(state: &PlanState) -> String {
        match (&state.previous_week, state.week_number) {
            // Later weeks build forward from what actually happened.
            (Some(previous), week) if week > 1 => format!(
                "Write week {week} of a training program for an individual who requested:\n{}\n\n\
                 {}\n\n\
                 Progress loads, reps, or volume from the recorded outcomes, and add an \
                 \"AI Progression\" note to each carried-over exercise.\n\n{PLAN_STRUCTURE}",
                state.user_request,
                previous.to_prompt_block(),
            ),
            _ => format!(
                "Write a weekly training program for an individual who requested:\n{}\n\n{PLAN_STRUCTURE}",
                state.user_request
            ),
        }
    }

    fn revise_prompt(state: &PlanState, feedback: &RoundFeedback) -> String {
        let current = state
            .plan
            .as_ref()
            .map(|p| p.to_prompt_block())
            .unwrap_or_else(|| "(no plan)".to_string());
        format!(
            "Your colleague reviewed this training program:\n{current}\n\n\
             Their feedback:\n{}\n\n\
             Rewrite the program addressing every point of feedback.\n\n{PLAN_STRUCTURE}",
            feedback.render()
        )
    }

    /// Interpret a model reply as a plan. Failure replies are errors;
    /// unparseable content degrades to an empty plan with a warning.
    fn extract_plan(reply: ModelReply) -> Result<WeeklyPlan> {
        match reply {
            ModelReply::Failure(reason) => bail!("generation model call failed: {reason}"),
            ModelReply::Structured(value) => Ok(WeeklyPlan::from_value(&value).unwrap_or_else(|| {
                warn!("structured generation output had no interpretable plan shape");
                WeeklyPlan::default()
            })),
            ModelReply::Text(text) => Ok(WeeklyPlan::from_model_text(&text)),
        }
    }
}

#[async_trait]
impl PlanGenerator for ModelPlanGenerator {
    async fn create(&self, state: &PlanState) -> Result<WeeklyPlan> {
        let prompt = Self::create_prompt(state);
        debug!(week = state.week_number, "generating fresh plan");
        Self::extract_plan(self.model.complete(&prompt).await)
    }

    async fn revise(&self, state: &PlanState, feedback: &RoundFeedback) -> Result<WeeklyPlan> {
        let prompt = Self::revise_prompt(state, feedback);
        debug!(sections = feedback.len(), "revising plan from feedback");
        Self::extract_plan(self.model.complete(&prompt).await)
    }
}
