//! Dependency-ordered evaluation pipeline.
//!
//! One `run` executes every active check against the current state, wave by
//! wave: checks inside a wave share no dependency edges and run
//! concurrently, and results land in the round table only as each wave
//! completes, so a later check always sees the finished results of
//! everything it depends on. Individual check failures (retrieval errors,
//! model failures) degrade into the check's own result text; a round never
//! aborts the session.

use crate::errors::PipelineError;
use crate::model::ModelClient;
use crate::orchestrator::state::PlanState;
use crate::retrieval::Retriever;
use crate::review::findings::{CheckResult, RoundFeedback};
use crate::review::graph::CheckGraph;
use crate::review::units::{CheckKind, CheckUnit, SubjectScope, units_for_week};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Executes the active check set for a session.
pub struct ReviewPipeline {
    units: Vec<CheckUnit>,
    graph: CheckGraph,
    model: Arc<dyn ModelClient>,
    retriever: Arc<dyn Retriever>,
}

impl ReviewPipeline {
    /// Register an explicit check set. The dependency graph is validated
    /// here; a cyclic or duplicate registration never reaches a round.
    pub fn new(
        units: Vec<CheckUnit>,
        model: Arc<dyn ModelClient>,
        retriever: Arc<dyn Retriever>,
    ) -> Result<Self, PipelineError> {
        let graph = CheckGraph::build(&units)?;
        Ok(Self {
            units,
            graph,
            model,
            retriever,
        })
    }

    /// Register the standard check set for the given week.
    pub fn for_week(
        week_number: u32,
        model: Arc<dyn ModelClient>,
        retriever: Arc<dyn Retriever>,
    ) -> Result<Self, PipelineError> {
        Self::new(units_for_week(week_number), model, retriever)
    }

    /// Kinds in stable execution order.
    pub fn active_kinds(&self) -> Vec<CheckKind> {
        self.graph
            .topo_order()
            .into_iter()
            .map(|i| self.units[i].kind)
            .collect()
    }

    pub fn units(&self) -> &[CheckUnit] {
        &self.units
    }

    /// Run one evaluation round.
    ///
    /// Returns the aggregated actionable findings in stable execution
    /// order; empty feedback means every check came back clean.
    pub async fn run(&self, state: &PlanState) -> RoundFeedback {
        let mut table: HashMap<CheckKind, CheckResult> = HashMap::new();
        let waves = self.graph.compute_waves();

        for (wave_idx, wave) in waves.iter().enumerate() {
            debug!(
                wave = wave_idx,
                checks = wave.len(),
                "running evaluation wave"
            );
            let futures = wave
                .iter()
                .map(|&i| self.run_unit(&self.units[i], state, &table));
            let results = join_all(futures).await;
            for result in results {
                table.insert(result.kind, result);
            }
        }

        let ordered: Vec<&CheckResult> = self
            .graph
            .topo_order()
            .into_iter()
            .filter_map(|i| table.get(&self.units[i].kind))
            .collect();
        let feedback = RoundFeedback::from_results(ordered);

        info!(
            actionable = feedback.len(),
            total = self.units.len(),
            "evaluation round complete"
        );
        feedback
    }

    /// Execute one check and classify its result. Never fails; failures
    /// become the result's text.
    async fn run_unit(
        &self,
        unit: &CheckUnit,
        state: &PlanState,
        table: &HashMap<CheckKind, CheckResult>,
    ) -> CheckResult {
        let mut context_blocks: Vec<String> = Vec::new();

        if let Some(table_data) = &unit.reference_data {
            context_blocks.push(table_data.render());
        }

        if unit.needs_retrieval {
            let query = unit.kind.retrieval_query(&state.user_request);
            match self
                .retriever
                .retrieve(&query, unit.kind.specialized_instructions())
                .await
            {
                Ok(retrieved) if !retrieved.trim().is_empty() => {
                    context_blocks.push(format!(
                        "Relevant context from training literature:\n{retrieved}"
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(check = %unit.kind, error = %format!("{e:#}"), "retrieval failed, continuing with empty context");
                }
            }
        }

        let dependency_context = self.dependency_context(unit, table);
        if !dependency_context.is_empty() {
            context_blocks.push(dependency_context);
        }

        let subject = self.subject_for(unit, state);
        let prompt = unit.task_prompt(&subject, &state.user_request, &context_blocks.join("\n\n"));

        let reply = self.model.complete(&prompt).await;
        if reply.is_failure() {
            warn!(check = %unit.kind, "critique model call failed, surfacing as finding");
        }
        let result = CheckResult::from_reply(unit.kind, &reply);
        debug!(check = %unit.kind, actionable = result.actionable, "check complete");
        result
    }

    /// Labeled actionable findings of this check's dependencies, in
    /// declaration order. Absent or clean dependencies contribute nothing.
    fn dependency_context(
        &self,
        unit: &CheckUnit,
        table: &HashMap<CheckKind, CheckResult>,
    ) -> String {
        unit.dependencies
            .iter()
            .filter_map(|dep| table.get(dep))
            .filter(|result| result.actionable)
            .map(|result| {
                format!(
                    "Previous {} critique suggested: {}",
                    result.kind.display_name().to_uppercase(),
                    result.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render the artifact this check evaluates.
    fn subject_for(&self, unit: &CheckUnit, state: &PlanState) -> String {
        match unit.subject {
            SubjectScope::Draft => state
                .plan
                .as_ref()
                .map(|p| p.to_prompt_block())
                .unwrap_or_else(|| "(no plan generated)".to_string()),
            SubjectScope::History => state
                .previous_week
                .as_ref()
                .map(|week| week.to_prompt_block())
                .unwrap_or_else(|| "(no previous week data recorded)".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelReply;
    use crate::plan::{CompletedWeek, WeeklyPlan};
    use crate::retrieval::NoRetriever;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Model that routes replies by the check heading found in the prompt
    /// and records every prompt it sees.
    struct ScriptedModel {
        replies: HashMap<&'static str, ModelReply>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<(&'static str, ModelReply)>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompt_for(&self, heading: &str) -> Option<String> {
            self.prompts
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.contains(heading))
                .cloned()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn complete(&self, prompt: &str) -> ModelReply {
            self.prompts.lock().unwrap().push(prompt.to_string());
            for (heading, reply) in &self.replies {
                if prompt.contains(heading) {
                    return reply.clone();
                }
            }
            ModelReply::Text("None".to_string())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn retrieve(&self, _query: &str, _instructions: &str) -> anyhow::Result<String> {
            Err(anyhow!("vector store unavailable"))
        }
    }

    fn draft_state() -> PlanState {
        let mut state = PlanState::new("a 3-day hypertrophy plan", 1, None);
        state.plan = Some(WeeklyPlan::from_model_text(
            r#"{"day_1": [{"name": "Squat", "sets": 4}]}"#,
        ));
        state
    }

    fn pipeline_with(
        units: Vec<CheckUnit>,
        model: Arc<ScriptedModel>,
    ) -> ReviewPipeline {
        ReviewPipeline::new(units, model, Arc::new(NoRetriever)).unwrap()
    }

    #[tokio::test]
    async fn actionable_dependencies_feed_downstream_checks() {
        // FrequencyAndSplit and ExerciseSelection are actionable, SetVolume
        // comes back clean: aggregation carries the first two, and the
        // downstream prompts contain the upstream findings.
        let model = Arc::new(ScriptedModel::new(vec![
            (
                "Frequency and Split",
                ModelReply::Text("Add a fourth training day for better distribution.".to_string()),
            ),
            (
                "Exercise Selection",
                ModelReply::Text("Swap leg press in for the third squat slot.".to_string()),
            ),
            ("Set Volume", ModelReply::Text("None".to_string())),
        ]));
        let units = vec![
            CheckUnit::new(CheckKind::FrequencyAndSplit).with_retrieval(false),
            CheckUnit::new(CheckKind::ExerciseSelection)
                .with_dependencies(vec![CheckKind::FrequencyAndSplit])
                .with_retrieval(false),
            CheckUnit::new(CheckKind::SetVolume)
                .with_dependencies(vec![
                    CheckKind::FrequencyAndSplit,
                    CheckKind::ExerciseSelection,
                ])
                .with_retrieval(false),
        ];
        let pipeline = pipeline_with(units, model.clone());

        let feedback = pipeline.run(&draft_state()).await;

        assert_eq!(feedback.len(), 2);
        assert_eq!(feedback.sections[0].kind, CheckKind::FrequencyAndSplit);
        assert_eq!(feedback.sections[1].kind, CheckKind::ExerciseSelection);

        let selection_prompt = model.prompt_for("Exercise Selection").unwrap();
        assert!(selection_prompt.contains("Previous FREQUENCY AND SPLIT critique suggested"));
        assert!(selection_prompt.contains("fourth training day"));

        let volume_prompt = model.prompt_for("Set Volume").unwrap();
        assert!(volume_prompt.contains("FREQUENCY AND SPLIT"));
        assert!(volume_prompt.contains("EXERCISE SELECTION"));
    }

    #[tokio::test]
    async fn clean_dependencies_contribute_no_context() {
        let model = Arc::new(ScriptedModel::new(vec![(
            "Exercise Selection",
            ModelReply::Text("Pick a horizontal pull for day 2.".to_string()),
        )]));
        let units = vec![
            CheckUnit::new(CheckKind::FrequencyAndSplit).with_retrieval(false),
            CheckUnit::new(CheckKind::ExerciseSelection)
                .with_dependencies(vec![CheckKind::FrequencyAndSplit])
                .with_retrieval(false),
        ];
        let pipeline = pipeline_with(units, model.clone());

        pipeline.run(&draft_state()).await;

        let prompt = model.prompt_for("Exercise Selection").unwrap();
        assert!(!prompt.contains("critique suggested"));
    }

    #[tokio::test]
    async fn all_clean_round_aggregates_to_empty() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let pipeline = pipeline_with(units_for_week(1), model);
        // Default scripted reply is the sentinel, retrieval uses NoRetriever.
        let feedback = pipeline.run(&draft_state()).await;
        assert!(feedback.is_empty());
    }

    #[tokio::test]
    async fn retrieval_failure_does_not_abort_the_round() {
        let model = Arc::new(ScriptedModel::new(vec![(
            "Set Volume",
            ModelReply::Text("Chest volume exceeds the recoverable range.".to_string()),
        )]));
        let units = vec![CheckUnit::new(CheckKind::SetVolume).with_retrieval(true)];
        let pipeline =
            ReviewPipeline::new(units, model, Arc::new(FailingRetriever)).unwrap();

        let feedback = pipeline.run(&draft_state()).await;
        assert_eq!(feedback.len(), 1);
        assert!(feedback.sections[0].text.contains("recoverable range"));
    }

    #[tokio::test]
    async fn model_failure_is_surfaced_in_aggregation() {
        let model = Arc::new(ScriptedModel::new(vec![(
            "Rep Ranges",
            ModelReply::Failure("rate limited".to_string()),
        )]));
        let units = vec![CheckUnit::new(CheckKind::RepRanges).with_retrieval(false)];
        let pipeline = pipeline_with(units, model);

        let feedback = pipeline.run(&draft_state()).await;
        assert_eq!(feedback.len(), 1);
        assert!(feedback.sections[0].text.contains("rate limited"));
    }

    #[tokio::test]
    async fn reference_data_lands_in_the_prompt() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let units = vec![
            CheckUnit::new(CheckKind::SetVolume)
                .with_retrieval(false)
                .with_reference_data(crate::review::units::volume_landmarks()),
        ];
        let pipeline = pipeline_with(units, model.clone());

        pipeline.run(&draft_state()).await;

        let prompt = model.prompt_for("Set Volume").unwrap();
        assert!(prompt.contains("weekly set volume landmarks"));
        assert!(prompt.contains("- chest"));
    }

    #[tokio::test]
    async fn progression_check_reviews_previous_week_not_draft() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let pipeline = pipeline_with(units_for_week(2), model.clone());

        let mut state = PlanState::new("week 2 please", 2, None);
        state.plan = Some(WeeklyPlan::from_model_text(
            r#"{"day_1": [{"name": "CurrentDraftExercise"}]}"#,
        ));
        state.previous_week = Some(CompletedWeek::new(
            WeeklyPlan::from_model_text(r#"{"day_1": [{"name": "LastWeekSquat"}]}"#),
            "Squat felt easy at RPE 7.",
        ));

        pipeline.run(&state).await;

        let prompt = model.prompt_for("Progression").unwrap();
        assert!(prompt.contains("LastWeekSquat"));
        assert!(prompt.contains("RPE 7"));
        assert!(!prompt.contains("CurrentDraftExercise"));
    }

    #[tokio::test]
    async fn week_one_feedback_preserves_execution_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            (
                "Frequency and Split",
                ModelReply::Text("Spread pressing across two days.".to_string()),
            ),
            (
                "RPE Targets",
                ModelReply::Text("Cap isolation work at RPE 9.".to_string()),
            ),
        ]));
        let pipeline = pipeline_with(units_for_week(1), model);

        let feedback = pipeline.run(&draft_state()).await;
        assert_eq!(feedback.len(), 2);
        assert_eq!(feedback.sections[0].kind, CheckKind::FrequencyAndSplit);
        assert_eq!(feedback.sections[1].kind, CheckKind::Rpe);
    }
}
