use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "greenlight")]
#[command(version, about = "Creative-production pipeline orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding run state (one subdirectory per run)
    #[arg(long, default_value = ".greenlight", global = true)]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new run from a profile
    CreateRun {
        /// Path to the YAML run profile; defaults apply when omitted
        #[arg(long)]
        profile: Option<PathBuf>,
    },
    /// Submit a role's artifact JSON to a run
    Submit {
        run_id: String,
        /// Submitting role (showrunner, direction, dance_mapping, ...)
        role: String,
        /// Path to the artifact JSON file
        file: PathBuf,
    },
    /// Freeze the preproduction bundle and record its spec hash
    Lock { run_id: String },
    /// Evaluate the gate the run is sitting at and route on the result
    Gate { run_id: String },
    /// Export the current iteration as a content-addressed manifest
    Export {
        run_id: String,
        /// Write the manifest here instead of the run directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the final report for a run
    Report {
        run_id: String,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a run's stage, iteration, and collected artifacts
    Status { run_id: String },
    /// List known runs
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "greenlight=debug" } else { "greenlight=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::CreateRun { profile } => cmd::cmd_create_run(&cli.data_dir, profile.as_deref())?,
        Commands::Submit { run_id, role, file } => {
            cmd::cmd_submit(&cli.data_dir, run_id, role, file)?
        }
        Commands::Lock { run_id } => cmd::cmd_lock(&cli.data_dir, run_id)?,
        Commands::Gate { run_id } => cmd::cmd_gate(&cli.data_dir, run_id)?,
        Commands::Export { run_id, output } => {
            cmd::cmd_export(&cli.data_dir, run_id, output.as_deref())?
        }
        Commands::Report { run_id, json } => cmd::cmd_report(&cli.data_dir, run_id, *json)?,
        Commands::Status { run_id } => cmd::cmd_status(&cli.data_dir, run_id)?,
        Commands::List => cmd::cmd_list(&cli.data_dir)?,
    }
    Ok(())
}
