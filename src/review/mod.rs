//! Multi-aspect plan evaluation.
//!
//! - [`units`]: the closed check set, reference tables, and the per-week
//!   registry
//! - [`graph`]: dependency graph construction and wave scheduling
//! - [`findings`]: result classification and feedback aggregation
//! - [`pipeline`]: the round executor

pub mod findings;
pub mod graph;
pub mod pipeline;
pub mod units;

pub use findings::{CheckResult, FeedbackSection, RoundFeedback};
pub use graph::CheckGraph;
pub use pipeline::ReviewPipeline;
pub use units::{CheckKind, CheckUnit, ReferenceTable, SubjectScope, units_for_week};
