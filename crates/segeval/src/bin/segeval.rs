use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use segeval::{
    backend::{Device, BACKEND_NAME},
    merge_state_files, EvaluationConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segeval")]
#[command(about = "Per-class accuracy reports for semantic segmentation evaluations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the evaluation states of dataset shards into one CSV report
    Merge {
        /// Evaluation state files (JSON)
        #[arg(required = true)]
        states: Vec<PathBuf>,

        /// Output CSV report
        #[arg(short, long, default_value = "accuracy_report.csv")]
        output: PathBuf,

        /// Evaluation configuration the states must match
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also save the merged state to this path
        #[arg(long)]
        merged_state: Option<PathBuf>,
    },

    /// Show backend information
    Info,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Merge {
            states,
            output,
            config,
            merged_state,
        } => merge_states(&states, &output, config.as_deref(), merged_state.as_deref()),

        Commands::Info => {
            println!("segeval information:");
            println!("  Backend: {BACKEND_NAME}");
            println!("  Device: {:?}", Device::default());
            Ok(())
        }
    }
}

/// Merges shard states, writes the report and prints it.
fn merge_states(
    states: &[PathBuf],
    output: &Path,
    config: Option<&Path>,
    merged_state: Option<&Path>,
) -> Result<()> {
    let config = config
        .map(EvaluationConfig::from_file)
        .transpose()
        .context("Failed to load evaluation config")?;
    let merged = merge_state_files(states, config.as_ref())
        .with_context(|| format!("Failed to merge {} evaluation states", states.len()))?;

    let report = merged.report()?;
    report
        .save_csv(output)
        .with_context(|| format!("Failed to write report: {}", output.display()))?;
    tracing::info!(path = %output.display(), images = merged.images, "saved report");

    if let Some(path) = merged_state {
        merged
            .save(path)
            .with_context(|| format!("Failed to save merged state: {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved merged state");
    }

    println!("{report}");
    Ok(())
}
