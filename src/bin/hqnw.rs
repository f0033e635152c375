//! hqnw command line
//!
//! Runs integrality gap and runtime experiments on generated quantum networks
//! and appends the results to a csv table.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hqnw::experiment::{scaling_fit, ExperimentParams, ResultRow, ResultTable, Sweep, SweepConfig, SweepDimension};
use hqnw::optimization::{BranchAndBound, DemandMode, SolveConfig};
use hqnw::quantum_network::PathPolicy;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hqnw")]
#[command(about = "Hierarchical quantum network allocation experiments")]
#[command(version)]
struct Cli {
    /// Log filter, overrides RUST_LOG (e.g. "info", "hqnw=debug")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Common {
    /// Parameter file, one line of whitespace separated fields
    #[arg(long)]
    params: PathBuf,

    /// Result table, appended to and created if missing
    #[arg(long)]
    out: PathBuf,

    /// Seed of the first run, run i uses seed + i
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Networks generated per sweep point
    #[arg(long, default_value = "5")]
    runs: usize,

    /// Per solve time budget in seconds
    #[arg(long, default_value = "30")]
    time_budget_secs: f64,

    /// Relay paths kept per client
    #[arg(long, default_value = "4")]
    max_relay_paths: usize,

    /// Print the rows as json on stdout
    #[arg(long)]
    json: bool,

    /// Demand formulation (partial, all_or_nothing)
    #[arg(long, default_value = "partial")]
    demand_mode: DemandMode,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the single point described by the parameter file
    Run {
        #[command(flatten)]
        common: Common,

        /// Parameter reported in the value column (clients, repeaters, rep_coeff, alpha)
        #[arg(long, default_value = "alpha")]
        dimension: SweepDimension,
    },

    /// Sweep one parameter, the rest comes from the parameter file
    Sweep {
        #[command(flatten)]
        common: Common,

        /// Swept parameter (clients, repeaters, rep_coeff, alpha)
        #[arg(long)]
        dimension: SweepDimension,

        /// Values to sweep (comma-separated), the dimension's preset when omitted
        #[arg(long, value_delimiter = ',')]
        values: Vec<f64>,
    },
}

fn init_tracing(log_level:Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    // stdout is reserved for --json
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn sweep_for(common:&Common) -> Result<Sweep<BranchAndBound>> {
    let time_budget = Duration::try_from_secs_f64(common.time_budget_secs)
        .with_context(|| format!("invalid time budget {}", common.time_budget_secs))?;
    let config = SweepConfig::default()
        .with_runs(common.runs)
        .with_base_seed(common.seed)
        .with_policy(PathPolicy::default().with_max_relay_paths(common.max_relay_paths))
        .with_demand_mode(common.demand_mode);
    Ok(Sweep::new(
        BranchAndBound::default(),
        SolveConfig::default().with_time_budget(time_budget),
        config,
    ))
}

fn execute(common:&Common,dimension:SweepDimension,values:&[f64]) -> Result<Vec<ResultRow>> {
    let params = ExperimentParams::load(&common.params)
        .with_context(|| format!("loading {}", common.params.display()))?;
    let mut table = ResultTable::open(&common.out)
        .with_context(|| format!("opening {}", common.out.display()))?;
    let mut sweep = sweep_for(common)?;
    info!(%params, %dimension, out = %common.out.display(), "experiment configured");

    let rows = sweep.run(dimension, &params, values, &mut table)
        .with_context(|| format!("{dimension} sweep over {values:?}"))?;

    if common.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    Ok(rows)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Run { common, dimension } => {
            let params = ExperimentParams::load(&common.params)
                .with_context(|| format!("loading {}", common.params.display()))?;
            let value = dimension.value_of(&params);
            execute(&common, dimension, &[value])?;
        }

        Commands::Sweep { common, dimension, values } => {
            let values = if values.is_empty() {dimension.preset().to_vec()} else {values};
            let rows = execute(&common, dimension, &values)?;
            if dimension != SweepDimension::Alpha && rows.len() >= 4 {
                if let Err(err) = scaling_fit(&rows) {
                    warn!(%err, "no runtime scaling fit");
                }
            }
        }
    }
    Ok(())
}
