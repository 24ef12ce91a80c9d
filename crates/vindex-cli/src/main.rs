//! # Vindex CLI
//!
//! Thin command-line front end: `compile` builds the action-elimination
//! task for a task/plan pair, `reconcile` maps a solution of that task
//! back to a cleaned plan, and `explain` reports structured redundancy
//! explanations as JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vindex_compile::{
    build_elimination_task, reconcile_solution, CostScalingRecord, EliminationOptions,
    Passthrough, Reduction, COST_RECORD_FILE,
};
use vindex_core::{plan_codec, sas_codec};
use vindex_explain::Explainer;

/// Output file name of the compiled task.
const ELIMINATION_TASK_FILE: &str = "action-elimination.sas";

#[derive(Parser)]
#[command(name = "vindex", version, about = "Plan justification for SAS+ planning tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile an action-elimination task from a task file and a valid plan.
    Compile(CompileArgs),
    /// Map a solution of the elimination task back to a cleaned plan.
    Reconcile(ReconcileArgs),
    /// Report causal chains and per-action explanations as JSON.
    Explain(ExplainArgs),
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReductionArg {
    #[value(name = "MR")]
    Mr,
    #[value(name = "MLR")]
    Mlr,
}

impl From<ReductionArg> for Reduction {
    fn from(arg: ReductionArg) -> Self {
        match arg {
            ReductionArg::Mr => Reduction::MR,
            ReductionArg::Mlr => Reduction::MLR,
        }
    }
}

#[derive(Args)]
struct CompileArgs {
    /// Path to the task file in SAS+ format.
    #[arg(short = 't', long)]
    task: PathBuf,
    /// Path to the plan file.
    #[arg(short = 'p', long)]
    plan: PathBuf,
    /// Keep the original order of the plan's actions.
    #[arg(long)]
    subsequence: bool,
    /// Create skip operators only for skippable actions.
    #[arg(long)]
    enhanced: bool,
    /// Iterate the necessity analysis until a fixpoint is reached.
    #[arg(long)]
    enhanced_fix_point: bool,
    /// Drop trivially unnecessary actions altogether.
    #[arg(long)]
    enhanced_unnecessary: bool,
    /// Fuse runs of necessary actions into macro operators.
    #[arg(long)]
    macro_operators: bool,
    /// Require the position variable to reach the end of the plan.
    #[arg(long)]
    add_pos_to_goal: bool,
    /// MR minimizes total cost, MLR minimizes plan length.
    #[arg(long, value_enum, default_value = "MR")]
    reduction: ReductionArg,
    /// Keep zero-cost actions unscaled; plans found with MR may then not
    /// be perfectly justified.
    #[arg(long)]
    no_cost_scaling: bool,
    /// Re-serialize the parsed task and fail unless it matches the input.
    #[arg(long)]
    verify_parsed_task: bool,
    /// Output directory.
    #[arg(short = 'd', long, default_value = ".")]
    directory: PathBuf,
}

#[derive(Args)]
struct ReconcileArgs {
    /// Path to the solution of the elimination task.
    #[arg(short = 's', long)]
    solution: PathBuf,
    /// Path to the original plan the task was compiled from.
    #[arg(short = 'p', long)]
    plan: PathBuf,
    /// Path to the cost-scaling record written during compilation.
    #[arg(long)]
    costs: Option<PathBuf>,
    /// Where to write the cleaned plan when it improves on the original.
    #[arg(short = 'o', long)]
    output: PathBuf,
}

#[derive(Args)]
struct ExplainArgs {
    /// Path to the task file in SAS+ format.
    #[arg(short = 't', long)]
    task: PathBuf,
    /// Path to the original plan file.
    #[arg(short = 'p', long)]
    plan: PathBuf,
    /// Path to the justified plan containing skip entries.
    #[arg(short = 's', long)]
    splan: PathBuf,
    /// Resolve plan actions per position, as during ordered compilation.
    #[arg(long)]
    subsequence: bool,
    /// Explain a single action instead of the whole plan.
    #[arg(long)]
    action: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Compile(args) => compile(args),
        Command::Reconcile(args) => reconcile(args),
        Command::Explain(args) => explain(args),
    }
}

fn compile(args: CompileArgs) -> anyhow::Result<()> {
    let task = if args.verify_parsed_task {
        sas_codec::read_task_file_verified(&args.task)
    } else {
        sas_codec::read_task_file(&args.task)
    }
    .with_context(|| format!("reading task {}", args.task.display()))?;
    let plan = plan_codec::read_plan_file(&args.plan)
        .with_context(|| format!("reading plan {}", args.plan.display()))?;

    let options = EliminationOptions {
        ordered: args.subsequence,
        enhanced: args.enhanced,
        fixpoint: args.enhanced_fix_point,
        unnecessary: args.enhanced_unnecessary,
        macro_operators: args.macro_operators,
        add_position_to_goal: args.add_pos_to_goal,
        reduction: args.reduction.into(),
        scale_costs: !args.no_cost_scaling,
    };

    let compiled = build_elimination_task(&task, &plan, &options, &Passthrough, &Passthrough)?;

    let task_path = args.directory.join(ELIMINATION_TASK_FILE);
    sas_codec::write_task_file(&compiled.task, &task_path)
        .with_context(|| format!("writing {}", task_path.display()))?;
    info!(path = %task_path.display(), "wrote elimination task");

    if let Some(record) = &compiled.scaling {
        let record_path = args.directory.join(COST_RECORD_FILE);
        record
            .save(&record_path)
            .with_context(|| format!("writing {}", record_path.display()))?;
        info!(path = %record_path.display(), "wrote cost-scaling record");
    }
    Ok(())
}

fn reconcile(args: ReconcileArgs) -> anyhow::Result<()> {
    let solution = plan_codec::read_plan_file(&args.solution)
        .with_context(|| format!("reading solution {}", args.solution.display()))?;
    let original = plan_codec::read_plan_file(&args.plan)
        .with_context(|| format!("reading plan {}", args.plan.display()))?;

    let record_path = args
        .costs
        .clone()
        .or_else(|| {
            let default = PathBuf::from(COST_RECORD_FILE);
            default.exists().then_some(default)
        });
    let record = match &record_path {
        Some(path) => Some(
            CostScalingRecord::load(path)
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };

    let result = reconcile_solution(&solution, &original, record.as_ref())?;
    match result.into_improvement() {
        Some(cleaned) => {
            plan_codec::write_plan_file(&cleaned, &args.output)
                .with_context(|| format!("writing {}", args.output.display()))?;
            info!(path = %args.output.display(), cost = cleaned.cost, "wrote cleaned plan");
        }
        None => info!("no reduction needed, the input plan is already at least as cheap"),
    }
    Ok(())
}

fn explain(args: ExplainArgs) -> anyhow::Result<()> {
    let task = sas_codec::read_task_file(&args.task)
        .with_context(|| format!("reading task {}", args.task.display()))?;
    let plan = plan_codec::read_plan_file(&args.plan)
        .with_context(|| format!("reading plan {}", args.plan.display()))?;
    let justified = plan_codec::read_plan_file(&args.splan)
        .with_context(|| format!("reading justified plan {}", args.splan.display()))?;

    let explainer = Explainer::new(&task, &plan, &justified, args.subsequence)?;
    if explainer.is_perfectly_justified() {
        println!("{}", serde_json::json!({ "perfectly_justified": true }));
        return Ok(());
    }

    let explanations: Vec<_> = match args.action {
        Some(action) => explainer.explain(action).into_iter().collect(),
        None => (1..=plan.len())
            .filter_map(|action| explainer.explain(action))
            .collect(),
    };
    let report = serde_json::json!({
        "perfectly_justified": false,
        "redundant_positions": explainer.redundant_positions(),
        "redundant_objects": explainer.redundant_objects(),
        "causal_chains": explainer.chains(),
        "explanations": explanations,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
