pub mod config;
pub mod errors;
pub mod finalize;
pub mod generate;
pub mod model;
pub mod orchestrator;
pub mod plan;
pub mod retrieval;
pub mod review;

pub use config::SessionConfig;
pub use errors::{PipelineError, SessionError};
pub use finalize::{Acceptance, CanonicalFinalizer, CanonicalPlan, PlanFinalizer};
pub use generate::{ModelPlanGenerator, PlanGenerator};
pub use model::{CommandModel, ModelClient, ModelReply};
pub use orchestrator::Session;
pub use plan::{CompletedWeek, Exercise, WeeklyPlan};
pub use retrieval::{NoRetriever, NotesRetriever, Retriever};
pub use review::{ReviewPipeline, RoundFeedback};
