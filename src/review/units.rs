//! Check unit definitions for the evaluation pipeline.
//!
//! Each aspect of a plan that gets critiqued is a `CheckKind`, a closed
//! enumeration, so a typo in configuration is a compile error rather than a
//! silent fallback. A `CheckUnit` bundles a kind with its declared
//! dependencies, retrieval needs, and optional static reference data.
//!
//! The active set varies by week: week 1 runs the five structural checks,
//! later weeks run only the progression check against the previous week's
//! recorded results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One evaluation aspect. The set is closed by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    FrequencyAndSplit,
    ExerciseSelection,
    SetVolume,
    RepRanges,
    Rpe,
    Progression,
}

impl CheckKind {
    /// Human-readable name used to label findings.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FrequencyAndSplit => "Frequency and Split",
            Self::ExerciseSelection => "Exercise Selection",
            Self::SetVolume => "Set Volume",
            Self::RepRanges => "Rep Ranges",
            Self::Rpe => "RPE Targets",
            Self::Progression => "Progression",
        }
    }

    /// Identifier used in logs and serialized output.
    pub fn id(&self) -> &'static str {
        match self {
            Self::FrequencyAndSplit => "frequency_and_split",
            Self::ExerciseSelection => "exercise_selection",
            Self::SetVolume => "set_volume",
            Self::RepRanges => "rep_ranges",
            Self::Rpe => "rpe",
            Self::Progression => "progression",
        }
    }

    /// All defined kinds.
    pub fn all() -> Vec<Self> {
        vec![
            Self::FrequencyAndSplit,
            Self::ExerciseSelection,
            Self::SetVolume,
            Self::RepRanges,
            Self::Rpe,
            Self::Progression,
        ]
    }

    /// Retrieval query for this check, phrased around the user's request.
    pub fn retrieval_query(&self, user_request: &str) -> String {
        match self {
            Self::FrequencyAndSplit => {
                format!("What training frequency and split suits {user_request}?")
            }
            Self::ExerciseSelection => {
                format!("Are these exercises appropriate for {user_request}?")
            }
            Self::SetVolume => format!("How much weekly set volume is optimal for {user_request}?"),
            Self::RepRanges => format!("Are these rep ranges optimal for {user_request}?"),
            Self::Rpe => format!("Are the RPE targets appropriate for {user_request}?"),
            Self::Progression => {
                format!("Is progression appropriately structured for {user_request}?")
            }
        }
    }

    /// Focus instructions passed alongside the retrieval query.
    pub fn specialized_instructions(&self) -> &'static str {
        match self {
            Self::FrequencyAndSplit => {
                "Focus on whether weekly frequency and the split structure match the user's schedule and recovery capacity."
            }
            Self::ExerciseSelection => {
                "Focus on exercise selection appropriateness for the user."
            }
            Self::SetVolume => {
                "Focus on whether weekly set counts per muscle group sit inside evidence-based volume ranges."
            }
            Self::RepRanges => {
                "Focus on whether rep ranges are optimal for the stated training goals."
            }
            Self::Rpe => {
                "Focus on whether RPE (Rating of Perceived Exertion) targets are appropriate for the user and for each exercise."
            }
            Self::Progression => {
                "Focus on how the program incorporates progressive overload principles."
            }
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// What a check evaluates: the current draft, or the previous week's
/// canonical plan plus recorded outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectScope {
    Draft,
    History,
}

/// One guideline band within a reference table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelineBand {
    pub tier: String,
    pub min: u32,
    pub max: u32,
}

impl GuidelineBand {
    pub fn new(tier: &str, min: u32, max: u32) -> Self {
        Self {
            tier: tier.to_string(),
            min,
            max,
        }
    }
}

/// Static tiered guideline ranges available to a check without retrieval.
///
/// Rows are kept in a sorted map so `render` output is identical across
/// runs for the same data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTable {
    pub title: String,
    pub unit_label: String,
    pub rows: BTreeMap<String, Vec<GuidelineBand>>,
}

impl ReferenceTable {
    pub fn new(title: &str, unit_label: &str) -> Self {
        Self {
            title: title.to_string(),
            unit_label: unit_label.to_string(),
            rows: BTreeMap::new(),
        }
    }

    pub fn with_row(mut self, key: &str, bands: Vec<GuidelineBand>) -> Self {
        self.rows.insert(key.to_string(), bands);
        self
    }

    /// Render the table as a deterministic textual block for prompts.
    pub fn render(&self) -> String {
        let mut out = format!("Reference guidelines, {} ({}):\n", self.title, self.unit_label);
        for (key, bands) in &self.rows {
            let tiers = bands
                .iter()
                .map(|b| format!("{}: {}-{}", b.tier, b.min, b.max))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("- {key}: {tiers}\n"));
        }
        out
    }
}

/// Weekly set volume landmarks per muscle group.
pub fn volume_landmarks() -> ReferenceTable {
    let bands = |mv: u32, mev: u32, mav: u32, mrv: u32| {
        vec![
            GuidelineBand::new("maintenance", mv, mev),
            GuidelineBand::new("growth", mev, mav),
            GuidelineBand::new("max recoverable", mav, mrv),
        ]
    };
    ReferenceTable::new("weekly set volume landmarks", "sets per week")
        .with_row("back", bands(8, 10, 18, 25))
        .with_row("biceps", bands(5, 8, 14, 20))
        .with_row("chest", bands(8, 10, 16, 22))
        .with_row("hamstrings", bands(4, 6, 12, 16))
        .with_row("quads", bands(8, 10, 16, 20))
        .with_row("shoulders", bands(6, 8, 16, 22))
        .with_row("triceps", bands(4, 6, 12, 18))
}

/// Recommended RPE ranges by training experience.
pub fn rpe_targets() -> ReferenceTable {
    ReferenceTable::new("RPE target ranges", "RPE")
        .with_row(
            "advanced",
            vec![
                GuidelineBand::new("compound", 7, 9),
                GuidelineBand::new("isolation", 8, 10),
            ],
        )
        .with_row(
            "beginner",
            vec![
                GuidelineBand::new("compound", 5, 7),
                GuidelineBand::new("isolation", 6, 8),
            ],
        )
        .with_row(
            "intermediate",
            vec![
                GuidelineBand::new("compound", 6, 8),
                GuidelineBand::new("isolation", 7, 9),
            ],
        )
}

/// Static configuration for one registered check.
#[derive(Debug, Clone)]
pub struct CheckUnit {
    pub kind: CheckKind,
    pub dependencies: Vec<CheckKind>,
    pub needs_retrieval: bool,
    pub reference_data: Option<ReferenceTable>,
    pub subject: SubjectScope,
    /// Task template with `{plan}`, `{request}` placeholders. `None` falls
    /// back to a generic template parameterized by the check's name.
    pub template: Option<String>,
}

impl CheckUnit {
    pub fn new(kind: CheckKind) -> Self {
        Self {
            kind,
            dependencies: Vec::new(),
            needs_retrieval: true,
            reference_data: None,
            subject: SubjectScope::Draft,
            template: builtin_template(kind).map(String::from),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<CheckKind>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_retrieval(mut self, needs_retrieval: bool) -> Self {
        self.needs_retrieval = needs_retrieval;
        self
    }

    pub fn with_reference_data(mut self, table: ReferenceTable) -> Self {
        self.reference_data = Some(table);
        self
    }

    pub fn with_subject(mut self, subject: SubjectScope) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_template(mut self, template: Option<String>) -> Self {
        self.template = template;
        self
    }

    /// Build the full critique prompt for this check.
    ///
    /// `subject` is the rendered artifact under review, `context` the
    /// concatenated reference/retrieved/dependency context blocks.
    pub fn task_prompt(&self, subject: &str, user_request: &str, context: &str) -> String {
        let template = match &self.template {
            Some(template) => template.clone(),
            None => fallback_template(self.kind.display_name()),
        };
        let mut prompt = template
            .replace("{plan}", subject)
            .replace("{request}", user_request);
        if !context.trim().is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(context.trim_end());
        }
        prompt.push_str(NO_ISSUES_INSTRUCTION);
        prompt
    }
}

/// Closing instruction shared by every critique prompt. Keeping the sentinel
/// wording in one place keeps it in sync with findings classification.
const NO_ISSUES_INSTRUCTION: &str =
    "\n\nProvide feedback if any... otherwise only return \"None\"";

fn builtin_template(kind: CheckKind) -> Option<&'static str> {
    let template = match kind {
        CheckKind::FrequencyAndSplit => {
            "You are reviewing the Frequency and Split aspect of a training program.\n\
             Program:\n{plan}\n\
             Written for an individual who provided the following input:\n{request}\n\
             Judge whether the number of sessions per week and the distribution of muscle groups across days fit the request."
        }
        CheckKind::ExerciseSelection => {
            "You are reviewing the Exercise Selection aspect of a training program.\n\
             Program:\n{plan}\n\
             Written for an individual who provided the following input:\n{request}\n\
             Judge whether each chosen exercise is appropriate for the individual's goals, experience, and equipment."
        }
        CheckKind::SetVolume => {
            "You are reviewing the Set Volume aspect of a training program.\n\
             Program:\n{plan}\n\
             Written for an individual who provided the following input:\n{request}\n\
             Count weekly sets per muscle group and compare them to the reference guidelines provided."
        }
        CheckKind::RepRanges => {
            "You are reviewing the Rep Ranges aspect of a training program.\n\
             Program:\n{plan}\n\
             Written for an individual who provided the following input:\n{request}\n\
             Judge whether the prescribed rep ranges serve the stated training goals."
        }
        CheckKind::Rpe => {
            "You are reviewing the RPE Targets aspect of a training program.\n\
             Program:\n{plan}\n\
             Written for an individual who provided the following input:\n{request}\n\
             Judge whether the target RPE for each exercise is appropriate given the rep ranges and the individual's experience."
        }
        CheckKind::Progression => {
            "You are reviewing the Progression aspect of a completed training week.\n\
             {plan}\n\
             The individual originally requested:\n{request}\n\
             Judge whether the recorded results call for load, rep, or volume adjustments next week."
        }
    };
    Some(template)
}

/// Generic template used when a unit has no task template configured.
pub fn fallback_template(display_name: &str) -> String {
    format!(
        "You are reviewing the {display_name} aspect of a training program.\n\
         Program:\n{{plan}}\n\
         Written for an individual who provided the following input:\n{{request}}\n\
         Provide feedback on this aspect."
    )
}

/// Active check set for a session, selected by week number.
///
/// Week 1 runs the five structural checks with their dependency chain;
/// later weeks run only the progression check against the previous week's
/// history.
pub fn units_for_week(week_number: u32) -> Vec<CheckUnit> {
    if week_number <= 1 {
        vec![
            CheckUnit::new(CheckKind::FrequencyAndSplit),
            CheckUnit::new(CheckKind::ExerciseSelection)
                .with_dependencies(vec![CheckKind::FrequencyAndSplit]),
            CheckUnit::new(CheckKind::SetVolume)
                .with_dependencies(vec![
                    CheckKind::FrequencyAndSplit,
                    CheckKind::ExerciseSelection,
                ])
                .with_reference_data(volume_landmarks()),
            CheckUnit::new(CheckKind::RepRanges)
                .with_dependencies(vec![CheckKind::ExerciseSelection]),
            CheckUnit::new(CheckKind::Rpe)
                .with_dependencies(vec![CheckKind::RepRanges])
                .with_reference_data(rpe_targets()),
        ]
    } else {
        vec![
            CheckUnit::new(CheckKind::Progression).with_subject(SubjectScope::History),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_one_registry_has_five_draft_checks() {
        let units = units_for_week(1);
        assert_eq!(units.len(), 5);
        assert!(units.iter().all(|u| u.subject == SubjectScope::Draft));
        assert_eq!(units[0].kind, CheckKind::FrequencyAndSplit);
    }

    #[test]
    fn later_weeks_run_only_progression_against_history() {
        for week in [2, 3, 10] {
            let units = units_for_week(week);
            assert_eq!(units.len(), 1);
            assert_eq!(units[0].kind, CheckKind::Progression);
            assert_eq!(units[0].subject, SubjectScope::History);
        }
    }

    #[test]
    fn set_volume_depends_on_split_and_selection() {
        let units = units_for_week(1);
        let set_volume = units.iter().find(|u| u.kind == CheckKind::SetVolume).unwrap();
        assert_eq!(
            set_volume.dependencies,
            vec![CheckKind::FrequencyAndSplit, CheckKind::ExerciseSelection]
        );
        assert!(set_volume.reference_data.is_some());
    }

    #[test]
    fn reference_tables_render_deterministically() {
        let first = volume_landmarks().render();
        let second = volume_landmarks().render();
        assert_eq!(first, second);
        // Sorted row order, not insertion order.
        let back_pos = first.find("- back").unwrap();
        let chest_pos = first.find("- chest").unwrap();
        assert!(back_pos < chest_pos);
    }

    #[test]
    fn task_prompt_substitutes_plan_and_request() {
        let unit = CheckUnit::new(CheckKind::RepRanges);
        let prompt = unit.task_prompt("THE-PLAN", "THE-REQUEST", "");
        assert!(prompt.contains("THE-PLAN"));
        assert!(prompt.contains("THE-REQUEST"));
        assert!(prompt.contains("only return \"None\""));
    }

    #[test]
    fn task_prompt_appends_context_when_present() {
        let unit = CheckUnit::new(CheckKind::SetVolume);
        let prompt = unit.task_prompt("p", "r", "SOME CONTEXT BLOCK");
        assert!(prompt.contains("SOME CONTEXT BLOCK"));
    }

    #[test]
    fn missing_template_falls_back_to_generic() {
        let unit = CheckUnit::new(CheckKind::Rpe).with_template(None);
        let prompt = unit.task_prompt("p", "r", "");
        assert!(prompt.contains("RPE Targets"));
        assert!(prompt.contains("Provide feedback on this aspect."));
    }

    #[test]
    fn check_kind_ids_are_unique() {
        let mut ids: Vec<_> = CheckKind::all().iter().map(|k| k.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), CheckKind::all().len());
    }

    #[test]
    fn retrieval_query_mentions_user_request() {
        let query = CheckKind::SetVolume.retrieval_query("a 3-day hypertrophy plan");
        assert!(query.contains("a 3-day hypertrophy plan"));
    }
}
