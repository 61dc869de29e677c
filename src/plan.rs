//! Weekly plan data model and model-output extraction.
//!
//! A `WeeklyPlan` maps a day key to an ordered list of exercises. Plans come
//! back from the generation model as free-form text, so extraction has to
//! tolerate several shapes: a bare JSON object, an object wrapped in a
//! `weekly_program` key, or JSON buried inside a fenced code block. Anything
//! that cannot be interpreted degrades to an empty plan with a logged warning
//! rather than failing the session.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Key the generation model wraps plans in.
const PLAN_WRAPPER_KEY: &str = "weekly_program";

fn default_name() -> String {
    "Unnamed Exercise".to_string()
}

fn default_sets() -> u32 {
    3
}

fn default_reps() -> String {
    "8-12".to_string()
}

fn default_target_rpe() -> String {
    "7-8".to_string()
}

fn default_rest() -> String {
    "60-90 seconds".to_string()
}

fn default_cues() -> String {
    "Focus on proper form".to_string()
}

/// A single prescribed exercise within a training day.
///
/// Missing fields are filled with conservative defaults during
/// deserialization so a partially-specified model output still yields a
/// usable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_sets")]
    pub sets: u32,
    #[serde(default = "default_reps")]
    pub reps: String,
    #[serde(default = "default_target_rpe")]
    pub target_rpe: String,
    #[serde(default = "default_rest")]
    pub rest: String,
    #[serde(default = "default_cues")]
    pub cues: String,
    /// Progression note attached by the model in week 2+ plans.
    #[serde(
        default,
        alias = "AI Progression",
        alias = "ai progression",
        skip_serializing_if = "Option::is_none"
    )]
    pub suggestion: Option<String>,
}

impl Exercise {
    /// Create an exercise with defaults for everything but the name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sets: default_sets(),
            reps: default_reps(),
            target_rpe: default_target_rpe(),
            rest: default_rest(),
            cues: default_cues(),
            suggestion: None,
        }
    }

    /// Return a copy with empty string fields replaced by their defaults.
    ///
    /// Deserialization only defaults *missing* fields; models occasionally
    /// emit present-but-empty ones. Applying this twice is a no-op.
    pub fn normalized(&self) -> Self {
        let fill = |value: &str, default: String| {
            if value.trim().is_empty() {
                default
            } else {
                value.to_string()
            }
        };
        Self {
            name: fill(&self.name, default_name()),
            sets: if self.sets == 0 { default_sets() } else { self.sets },
            reps: fill(&self.reps, default_reps()),
            target_rpe: fill(&self.target_rpe, default_target_rpe()),
            rest: fill(&self.rest, default_rest()),
            cues: fill(&self.cues, default_cues()),
            suggestion: self
                .suggestion
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }
}

/// A candidate weekly training plan: day key → ordered exercises.
///
/// Day keys are kept sorted so rendering and canonical output are
/// deterministic for the same plan content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyPlan {
    pub days: BTreeMap<String, Vec<Exercise>>,
}

impl WeeklyPlan {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Total number of prescribed exercises across all days.
    pub fn exercise_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    /// Render the plan as pretty JSON for inclusion in prompts.
    pub fn to_prompt_block(&self) -> String {
        serde_json::to_string_pretty(&self.days)
            .unwrap_or_else(|_| "(plan could not be rendered)".to_string())
    }

    /// Extract a plan from a JSON value, unwrapping a `weekly_program` key
    /// if present.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let inner = match value.get(PLAN_WRAPPER_KEY) {
            Some(wrapped) => wrapped,
            None => value,
        };
        if !inner.is_object() {
            return None;
        }
        serde_json::from_value(inner.clone()).ok()
    }

    /// Extract a plan from free-form model text.
    ///
    /// Tries, in order: the whole text as JSON, then the contents of a
    /// ```json fenced block. On failure returns an empty plan; the caller
    /// keeps going with a degraded artifact instead of crashing.
    pub fn from_model_text(text: &str) -> Self {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim())
            && let Some(plan) = Self::from_value(&value)
        {
            return plan;
        }

        if let Some(block) = extract_fenced_json(text)
            && let Ok(value) = serde_json::from_str::<serde_json::Value>(&block)
            && let Some(plan) = Self::from_value(&value)
        {
            return plan;
        }

        warn!(
            text_len = text.len(),
            "could not interpret model output as a weekly plan, continuing with empty plan"
        );
        Self::default()
    }
}

/// A finished week: the canonical plan that was trained plus recorded
/// outcome notes (actual RPEs, missed sessions, and so on). This is the
/// subject the progression check evaluates in week 2+ sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedWeek {
    pub plan: WeeklyPlan,
    pub outcomes: String,
}

impl CompletedWeek {
    pub fn new(plan: WeeklyPlan, outcomes: impl Into<String>) -> Self {
        Self {
            plan,
            outcomes: outcomes.into(),
        }
    }

    /// Render the completed week for inclusion in prompts.
    pub fn to_prompt_block(&self) -> String {
        format!(
            "Previous week's program:\n{}\n\nRecorded outcomes:\n{}",
            self.plan.to_prompt_block(),
            if self.outcomes.trim().is_empty() {
                "(none recorded)"
            } else {
                self.outcomes.trim()
            }
        )
    }
}

/// Pull the contents of the first ```json fenced block out of `text`.
fn extract_fenced_json(text: &str) -> Option<String> {
    let after_open = text.split_once("```json")?.1;
    let block = match after_open.split_once("```") {
        Some((inner, _)) => inner,
        None => after_open,
    };
    let block = block.trim();
    if block.is_empty() {
        None
    } else {
        Some(block.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day_json() -> &'static str {
        r#"{
            "day_1": [
                {"name": "Squat", "sets": 4, "reps": "5", "target_rpe": "8", "rest": "3 min", "cues": "Brace hard"}
            ],
            "day_2": [
                {"name": "Bench Press"}
            ]
        }"#
    }

    #[test]
    fn parses_bare_day_mapping() {
        let plan = WeeklyPlan::from_model_text(day_json());
        assert_eq!(plan.days.len(), 2);
        assert_eq!(plan.days["day_1"][0].name, "Squat");
        assert_eq!(plan.days["day_1"][0].sets, 4);
    }

    #[test]
    fn parses_wrapped_plan() {
        let wrapped = format!(r#"{{"weekly_program": {}}}"#, day_json());
        let plan = WeeklyPlan::from_model_text(&wrapped);
        assert_eq!(plan.days.len(), 2);
    }

    #[test]
    fn parses_fenced_block() {
        let text = format!(
            "Here is your program:\n```json\n{}\n```\nTrain hard!",
            day_json()
        );
        let plan = WeeklyPlan::from_model_text(&text);
        assert_eq!(plan.days.len(), 2);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let plan = WeeklyPlan::from_model_text(day_json());
        let bench = &plan.days["day_2"][0];
        assert_eq!(bench.sets, 3);
        assert_eq!(bench.reps, "8-12");
        assert_eq!(bench.target_rpe, "7-8");
        assert_eq!(bench.rest, "60-90 seconds");
        assert_eq!(bench.cues, "Focus on proper form");
        assert!(bench.suggestion.is_none());
    }

    #[test]
    fn ai_progression_alias_maps_to_suggestion() {
        let text = r#"{"day_1": [{"name": "Squat", "AI Progression": "Add 2.5kg"}]}"#;
        let plan = WeeklyPlan::from_model_text(text);
        assert_eq!(
            plan.days["day_1"][0].suggestion.as_deref(),
            Some("Add 2.5kg")
        );
    }

    #[test]
    fn garbage_degrades_to_empty_plan() {
        let plan = WeeklyPlan::from_model_text("sorry, I can't help with that");
        assert!(plan.is_empty());
    }

    #[test]
    fn non_object_json_degrades_to_empty_plan() {
        let plan = WeeklyPlan::from_model_text("[1, 2, 3]");
        assert!(plan.is_empty());
    }

    #[test]
    fn normalized_fills_empty_strings_and_is_idempotent() {
        let ex = Exercise {
            name: "  ".to_string(),
            sets: 0,
            reps: String::new(),
            target_rpe: "8".to_string(),
            rest: String::new(),
            cues: String::new(),
            suggestion: Some("  ".to_string()),
        };
        let once = ex.normalized();
        assert_eq!(once.name, "Unnamed Exercise");
        assert_eq!(once.sets, 3);
        assert_eq!(once.target_rpe, "8");
        assert!(once.suggestion.is_none());
        assert_eq!(once.normalized(), once);
    }

    #[test]
    fn prompt_block_is_deterministic() {
        let plan = WeeklyPlan::from_model_text(day_json());
        assert_eq!(plan.to_prompt_block(), plan.to_prompt_block());
    }

    #[test]
    fn completed_week_prompt_block_handles_empty_outcomes() {
        let week = CompletedWeek::new(WeeklyPlan::default(), "   ");
        assert!(week.to_prompt_block().contains("(none recorded)"));
    }
}
