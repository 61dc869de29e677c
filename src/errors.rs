//! Typed error hierarchy for the planloop engine.
//!
//! Two top-level enums cover the two subsystems:
//! - `SessionError`: failures that abort a refinement session, naming the
//!   stage that failed
//! - `PipelineError`: registration-time failures in the evaluation pipeline
//!
//! Retrieval and per-check critique failures are deliberately *not* errors:
//! they degrade to empty context or to an error-text finding so the round can
//! complete (see `review::pipeline`).

use thiserror::Error;

/// Errors that abort a refinement session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("Plan generation failed on iteration {iteration}: {message}")]
    GenerationFailed { iteration: u32, message: String },

    #[error("Finalization failed: {0}")]
    FinalizationFailed(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised while registering checks with the evaluation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Duplicate check registered: {0}")]
    DuplicateCheck(String),

    #[error("Cycle detected in check dependencies. Involved checks: {0:?}")]
    DependencyCycle(Vec<String>),

    #[error("No checks registered for the session")]
    EmptyRegistry,
}
