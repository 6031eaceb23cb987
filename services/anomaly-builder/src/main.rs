//! ERA5 anomaly builder
//!
//! Computes climatologies and anomaly files for raw ERA5 datasets and
//! writes them next to the raw data.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use climatology::{encode, BatchOrchestrator, ClimatologyKey, SmoothingSpec};
use era5_common::LevelType;
use grid_store::ZarrGridStore;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use anomaly_builder::{load_jobs, run_jobs, HostProfile, Job, Node};

/// ERA5 climatology and anomaly builder
#[derive(Parser, Debug)]
#[command(name = "anomaly-builder")]
#[command(about = "Build ERA5 climatologies and anomalies")]
struct Cli {
    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build anomalies for one dataset
    Run(RunArgs),

    /// Build every job listed in a YAML file
    Jobs {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the path segment of a smoothing specification
    Encode {
        #[arg(short, long, default_value = "")]
        spec: SmoothingSpec,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, default_value = "ERA5")]
    dataset: String,

    #[arg(long)]
    level_type: LevelType,

    #[arg(long)]
    var: String,

    #[arg(long)]
    resolution: String,

    #[arg(long)]
    clim_type: Option<ClimatologyKey>,

    #[arg(long, default_value = "")]
    clim_smoothing: SmoothingSpec,

    #[arg(long, default_value = "")]
    smoothing: SmoothingSpec,
}

impl From<RunArgs> for Job {
    fn from(args: RunArgs) -> Self {
        Job {
            dataset: args.dataset,
            level_type: args.level_type,
            var: args.var,
            resolution: args.resolution,
            clim_type: args.clim_type,
            clim_smoothing: args.clim_smoothing,
            smoothing: args.smoothing,
        }
    }
}

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    if let Err(e) = execute(cli.command) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt().with_env_filter(filter).with_target(true).with_level(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn execute(command: Command) -> Result<()> {
    let jobs = match command {
        Command::Encode { spec } => {
            println!("{}", encode(&spec));
            return Ok(());
        }
        Command::Run(args) => vec![Job::from(args)],
        Command::Jobs { file } => load_jobs(&file)?,
    };

    let config = HostProfile::for_node(Node::current()).resolve();
    let store = ZarrGridStore::new(config.store.clone()).with_extension(config.data.extension.clone());
    let orchestrator = BatchOrchestrator::new(&config, store)?;

    info!(jobs = jobs.len(), "Starting anomaly builder");
    let reports = run_jobs(&orchestrator, &jobs)?;

    let written: usize = reports.iter().map(|r| r.written.len()).sum();
    info!(jobs = reports.len(), written, "All jobs finished");

    for (stage, stats) in orchestrator.timings().snapshot() {
        info!(
            stage = %stage,
            count = stats.count,
            total_ms = stats.total().as_millis() as u64,
            avg_ms = stats.avg_ms(),
            "Stage timing"
        );
    }

    Ok(())
}
