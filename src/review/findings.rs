//! Check results and feedback aggregation.
//!
//! A check's raw text is trimmed of the trailing "no issues" sentinel and
//! classified for actionability once, here, so the rest of the pipeline works
//! with a boolean instead of re-sniffing strings. Actionable results are
//! concatenated, labeled by check, into the round's `RoundFeedback`, the
//! payload the orchestrator inspects to decide between revising and
//! accepting.

use crate::model::ModelReply;
use crate::review::units::CheckKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel a check returns when it found nothing worth changing.
pub const NO_ISSUES_SENTINEL: &str = "None";

/// Minimum trimmed length for a finding to count as actionable.
const MIN_ACTIONABLE_LEN: usize = 10;

/// Phrases that mean "nothing to change" when they make up the whole finding.
const NO_CHANGE_PHRASES: [&str; 4] = [
    "no changes needed",
    "none",
    "no changes are needed",
    "no changes required",
];

/// Outcome of one check for one evaluation round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    /// Findings text after sentinel trimming. May describe a collaborator
    /// failure; those are surfaced, not dropped.
    pub text: String,
    /// Whether this result should feed revision and dependency context.
    pub actionable: bool,
}

impl CheckResult {
    /// Classify raw findings text for a check.
    pub fn from_text(kind: CheckKind, raw: &str) -> Self {
        let text = trim_trailing_sentinel(raw).to_string();
        let actionable = is_actionable(&text);
        Self {
            kind,
            text,
            actionable,
        }
    }

    /// Classify a model reply. Failures become findings text so the failure
    /// stays visible in the aggregated feedback.
    pub fn from_reply(kind: CheckKind, reply: &ModelReply) -> Self {
        Self::from_text(kind, &reply.to_display_text())
    }
}

/// Strip a trailing "no issues" sentinel, if any. Only a final line that is
/// exactly the sentinel (or the whole text being the sentinel) is stripped;
/// a "none" inside real findings is left alone.
fn trim_trailing_sentinel(raw: &str) -> &str {
    fn is_sentinel_line(line: &str) -> bool {
        let lower = line.trim().trim_end_matches('.').to_lowercase();
        lower == NO_ISSUES_SENTINEL.to_lowercase()
    }

    let trimmed = raw.trim();
    if is_sentinel_line(trimmed) {
        return "";
    }
    if let Some((rest, last)) = trimmed.rsplit_once('\n')
        && is_sentinel_line(last)
    {
        return rest.trim_end();
    }
    trimmed
}

/// A finding is actionable when there is enough of it left after trimming
/// and it is not just a "no changes" phrase.
fn is_actionable(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.len() < MIN_ACTIONABLE_LEN {
        return false;
    }
    let normalized = trimmed
        .to_lowercase()
        .trim_end_matches(['.', '!'])
        .to_string();
    !NO_CHANGE_PHRASES.contains(&normalized.as_str())
}

/// One labeled section of aggregated feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSection {
    pub kind: CheckKind,
    pub text: String,
}

/// Aggregated actionable findings for one evaluation round, in execution
/// order. Empty means the round found nothing to change, the signal the
/// orchestrator uses to accept the plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundFeedback {
    pub sections: Vec<FeedbackSection>,
}

impl RoundFeedback {
    /// Collect the actionable results, preserving the given order.
    pub fn from_results<'a>(ordered: impl IntoIterator<Item = &'a CheckResult>) -> Self {
        let sections = ordered
            .into_iter()
            .filter(|r| r.actionable)
            .map(|r| FeedbackSection {
                kind: r.kind,
                text: r.text.clone(),
            })
            .collect();
        Self { sections }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Render the labeled feedback for prompts and canonical output.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("[{}]\n{}", s.kind.display_name(), s.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for RoundFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
