//! Creator Scout CLI
//!
//! Fraud-aware creator scoring, graph expansion and safety-gated outreach.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use scout_core::{ActionMode, ActionType, CampaignContext, ScoutConfig};
use scout_gate::{ActionRequest, Decision};
use scout_runtime::{BatchReport, JsonFileSource, Pipeline};

#[derive(Parser)]
#[command(name = "scout")]
#[command(author, version, about = "Creator Scout: fraud-aware creator discovery with gated outreach", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3); RUST_LOG overrides when set
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a batch of creator records
    Evaluate {
        /// JSON file with creator records
        #[arg(short, long)]
        input: PathBuf,

        /// TOML configuration file
        #[arg(short, long, env = "SCOUT_CONFIG")]
        config: Option<PathBuf>,

        /// Seed creators to expand from after scoring (comma separated)
        #[arg(long, value_delimiter = ',')]
        seeds: Vec<String>,

        /// Campaign name; renders drafts for accepted creators
        #[arg(long)]
        campaign: Option<String>,

        /// Brand name used in drafts
        #[arg(long, default_value = "our brand")]
        brand: String,

        /// Write the full batch report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of shortlisted creators to print
        #[arg(long, default_value = "20")]
        top: usize,
    },

    /// Surface new creators from known-good seeds
    Expand {
        /// JSON file with creator records
        #[arg(short, long)]
        input: PathBuf,

        /// Seed creators (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        seeds: Vec<String>,

        /// TOML configuration file
        #[arg(short, long, env = "SCOUT_CONFIG")]
        config: Option<PathBuf>,

        /// Maximum candidates
        #[arg(long, default_value = "25")]
        limit: usize,
    },

    /// Print the validated effective configuration
    Config {
        /// TOML configuration file
        #[arg(short, long, env = "SCOUT_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Dry-run a burst of actions through a fresh gate
    Gate {
        /// Action mode: review, manual or live
        #[arg(long, default_value = "review")]
        mode: ActionMode,

        /// Action type: dm, comment or export
        #[arg(long, default_value = "dm")]
        action: ActionType,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        count: usize,

        /// Hourly quota across all actions
        #[arg(long)]
        per_hour: Option<u32>,

        /// Engage the kill switch
        #[arg(long)]
        kill_switch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(log_level.into()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Evaluate {
            input,
            config,
            seeds,
            campaign,
            brand,
            output,
            top,
        } => {
            let campaign = campaign.map(|name| CampaignContext::new(&name, &brand));
            run_evaluate(&input, config.as_deref(), &seeds, campaign, output, top).await?;
        }
        Commands::Expand {
            input,
            seeds,
            config,
            limit,
        } => {
            run_expand(&input, config.as_deref(), &seeds, limit).await?;
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml_string()?);
        }
        Commands::Gate {
            mode,
            action,
            count,
            per_hour,
            kill_switch,
        } => {
            run_gate(mode, action, count, per_hour, kill_switch).await?;
        }
    }

    Ok(())
}

/// Defaults, then the file if given, then environment overrides
fn load_config(path: Option<&Path>) -> Result<ScoutConfig> {
    let config = match path {
        Some(path) => ScoutConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let mut config = ScoutConfig::default();
            config.apply_env_overrides()?;
            config.validate()?;
            config
        }
    };
    Ok(config)
}

async fn evaluate_file(input: &Path, config: Option<&Path>) -> Result<(Pipeline, BatchReport)> {
    let pipeline = Pipeline::new(load_config(config)?)?;
    let source = JsonFileSource::new(input);
    let report = pipeline.run_source(&source).await?;
    Ok((pipeline, report))
}

async fn run_evaluate(
    input: &Path,
    config: Option<&Path>,
    seeds: &[String],
    campaign: Option<CampaignContext>,
    output: Option<PathBuf>,
    top: usize,
) -> Result<()> {
    let (pipeline, report) = evaluate_file(input, config).await?;

    println!(
        "Evaluated {} creators: {} accepted, {} archived, {} excluded, {} skipped\n",
        report.evaluations.len(),
        report.accepted(),
        report.archived(),
        report.excluded(),
        report.skipped.len()
    );

    for evaluation in report.shortlist().into_iter().take(top) {
        let niches = evaluation.score.matched_niches.join(", ");
        println!(
            "  {:>3}  @{:<30} {}",
            evaluation.score.score, evaluation.profile.handle, niches
        );
    }

    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.creator, skipped.reason);
    }

    if let Some(campaign) = campaign {
        println!("\nDrafts for {}:", campaign.name);
        for evaluation in report.shortlist().into_iter().take(top) {
            let draft = pipeline.draft_for(evaluation, &campaign)?;
            let mut request = ActionRequest::for_draft(ActionType::Dm, &draft);
            let decision = pipeline.submit(&mut request)?;
            println!(
                "\n--- @{} [{}] ({})\n{}",
                draft.creator_id,
                draft.draft_id,
                decision.as_str(),
                draft.rendered_text
            );
        }
    }

    if !seeds.is_empty() {
        print_candidates(&pipeline, seeds, top);
    }

    if let Some(path) = output {
        fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("\nReport saved to: {}", path.display());
    }

    let graph = pipeline.graph_stats();
    info!(
        "Graph: {} nodes, {} edges, avg weight {:.3}",
        graph.node_count, graph.edge_count, graph.avg_weight
    );
    Ok(())
}

async fn run_expand(input: &Path, config: Option<&Path>, seeds: &[String], limit: usize) -> Result<()> {
    let (pipeline, _) = evaluate_file(input, config).await?;
    print_candidates(&pipeline, seeds, limit);
    Ok(())
}

fn print_candidates(pipeline: &Pipeline, seeds: &[String], limit: usize) {
    let candidates = pipeline.expand(seeds, limit);
    println!("\nCandidates from {}:", seeds.join(", "));
    if candidates.is_empty() {
        println!("  (none)");
    }
    for candidate in candidates {
        println!(
            "  {:.3}  @{:<30} distance {} via {} path(s)",
            candidate.score, candidate.creator_id, candidate.distance, candidate.path_count
        );
    }
}

async fn run_gate(
    mode: ActionMode,
    action: ActionType,
    count: usize,
    per_hour: Option<u32>,
    kill_switch: bool,
) -> Result<()> {
    let mut config = ScoutConfig::default();
    config.safety.kill_switch = kill_switch;
    config.safety.action_mode = mode;
    if let Some(per_hour) = per_hour {
        config.limits.max_actions_per_hour = per_hour;
    }
    let pipeline = Pipeline::new(config)?;

    let requests = (0..count)
        .map(|i| ActionRequest::new(action, &format!("dry-run-{}", i + 1), "dry-run"))
        .collect();
    let outcomes = pipeline.submit_all(requests).await;

    println!("Gate dry run: {} x {} in {} mode\n", count, action, mode);
    for (request, decision) in &outcomes {
        match decision {
            Ok(decision) => println!("  {}  {}", request.creator_id, decision.as_str()),
            Err(e) => println!("  {}  error: {}", request.creator_id, e),
        }
    }

    let stats = pipeline.gate_stats();
    println!();
    for decision in Decision::ALL {
        let n = stats.decisions.get(&decision).copied().unwrap_or(0);
        if n > 0 {
            println!("  {:<13} {}", decision.as_str(), n);
        }
    }
    println!("\n{}", serde_json::to_string_pretty(&stats.windows)?);
    Ok(())
}
