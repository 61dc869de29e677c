use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use planloop::config::SessionConfig;
use planloop::finalize::CanonicalFinalizer;
use planloop::generate::ModelPlanGenerator;
use planloop::model::CommandModel;
use planloop::orchestrator::Session;
use planloop::plan::{CompletedWeek, WeeklyPlan};
use planloop::retrieval::{NoRetriever, NotesRetriever, Retriever};
use planloop::review::{ReviewPipeline, units_for_week};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "planloop")]
#[command(version, about = "Iteratively drafts and critiques weekly training plans")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full refinement session and print the canonical plan
    Run {
        /// What to plan for, in the user's own words
        #[arg(short, long)]
        request: String,

        /// Week number (1-based)
        #[arg(short, long, default_value = "1")]
        week: u32,

        /// Maximum evaluation rounds before acceptance is forced
        #[arg(long, default_value = "3")]
        max_iterations: u32,

        /// Command that reads a prompt on stdin and writes a completion to stdout
        #[arg(long)]
        model_cmd: String,

        /// Extra arguments passed to the model command
        #[arg(long)]
        model_arg: Vec<String>,

        /// Directory of reference notes for retrieval-backed checks
        #[arg(long)]
        notes_dir: Option<PathBuf>,

        /// Prior week's plan as JSON (required for week > 1)
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Free-text outcomes recorded for the prior week
        #[arg(long)]
        outcomes: Option<String>,

        /// Write the canonical plan here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the checks that would run for a given week, in execution order
    Checks {
        #[arg(short, long, default_value = "1")]
        week: u32,
    },
}

fn load_previous_week(path: &PathBuf, outcomes: Option<String>) -> Result<CompletedWeek> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read previous plan from {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("previous plan at {} is not valid JSON", path.display()))?;
    let Some(plan) = WeeklyPlan::from_value(&value) else {
        bail!(
            "previous plan at {} has no recognizable weekly program shape",
            path.display()
        );
    };
    Ok(CompletedWeek::new(plan, outcomes.unwrap_or_default()))
}

async fn cmd_run(
    request: String,
    week: u32,
    max_iterations: u32,
    model_cmd: String,
    model_args: Vec<String>,
    notes_dir: Option<PathBuf>,
    previous: Option<PathBuf>,
    outcomes: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let model = Arc::new(CommandModel::new(model_cmd, model_args));
    let retriever: Arc<dyn Retriever> = match notes_dir {
        Some(dir) => Arc::new(NotesRetriever::new(dir)),
        None => Arc::new(NoRetriever),
    };

    let previous_week = previous
        .as_ref()
        .map(|path| load_previous_week(path, outcomes))
        .transpose()?;

    let config = SessionConfig::new(max_iterations, week);
    let pipeline = ReviewPipeline::for_week(week, model.clone(), retriever)?;
    let session = Session::new(
        config,
        Arc::new(ModelPlanGenerator::new(model)),
        pipeline,
        Arc::new(CanonicalFinalizer),
    )?;

    let canonical = session.run(&request, previous_week).await?;
    let rendered = serde_json::to_string_pretty(&canonical)?;
    match output {
        Some(path) => std::fs::write(&path, rendered)
            .with_context(|| format!("failed to write plan to {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn cmd_checks(week: u32) -> Result<()> {
    let units = units_for_week(week);
    let graph = planloop::review::CheckGraph::build(&units)?;
    for (wave_idx, wave) in graph.compute_waves().iter().enumerate() {
        for &index in wave {
            let unit = &units[index];
            let deps = unit
                .dependencies
                .iter()
                .map(|d| d.id())
                .collect::<Vec<_>>()
                .join(", ");
            if deps.is_empty() {
                println!("wave {}: {}", wave_idx + 1, unit.kind.id());
            } else {
                println!("wave {}: {} (after {})", wave_idx + 1, unit.kind.id(), deps);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Run {
            request,
            week,
            max_iterations,
            model_cmd,
            model_arg,
            notes_dir,
            previous,
            outcomes,
            output,
        } => {
            cmd_run(
                request,
                week,
                max_iterations,
                model_cmd,
                model_arg,
                notes_dir,
                previous,
                outcomes,
                output,
            )
            .await?;
        }
        Commands::Checks { week } => cmd_checks(week)?,
    }

    Ok(())
}
