use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use clap_derive::Args;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use experiments::*;
use ordered_aggregate::{AtomicAggregator, GlobalLockingAggregator, OnceLockAggregator};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one set of jittered producers and print the ordered result.
    Run {
        #[command(flatten)]
        aggregator_args: AggregatorArgs,

        #[arg(long, default_value_t = 50)]
        max_delay_ms: u64,

        #[arg(long)]
        #[clap(value_enum, default_value_t=LatencyArg::Uniform)]
        latency: LatencyArg,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value = "")]
        separator: String,
    },
    /// Repeatedly submit every slot from a thread pool and check the result order.
    Stress {
        #[command(flatten)]
        aggregator_args: AggregatorArgs,

        #[arg(short, long, default_value_t = 8)]
        threads: usize,

        #[arg(short, long, default_value_t = 5)]
        iterations: u64,
    },
}

#[derive(Args, Debug)]
struct AggregatorArgs {
    #[arg(short, long, value_enum, default_value_t=Aggregator::OnceLock)]
    aggregator: Aggregator,

    #[arg(short, long, default_value_t = 5)]
    producers: usize,

    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,
}

#[derive(ValueEnum, Debug, Copy, Clone)]
#[clap(rename_all = "kebab_case")]
enum Aggregator {
    OnceLock,
    Atomic,
    GlobalLocking,
}

#[derive(ValueEnum, Debug, Copy, Clone)]
enum LatencyArg {
    Uniform,
    Exponential,
}

impl From<LatencyArg> for Latency {
    fn from(arg: LatencyArg) -> Self {
        match arg {
            LatencyArg::Uniform => Latency::Uniform,
            LatencyArg::Exponential => Latency::Exponential,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn run(aggregator: Aggregator, config: &RunConfig) -> Result<RunReport> {
    match aggregator {
        Aggregator::OnceLock => run_producers::<OnceLockAggregator<i64>>(config),
        Aggregator::Atomic => run_producers::<AtomicAggregator<i64>>(config),
        Aggregator::GlobalLocking => run_producers::<GlobalLockingAggregator<i64>>(config),
    }
}

fn stress(aggregator: Aggregator, producers: usize, threads: usize, seed: u64, timeout: Duration) -> Result<Vec<usize>> {
    match aggregator {
        Aggregator::OnceLock => stress_producers::<OnceLockAggregator<usize>>(producers, threads, seed, timeout),
        Aggregator::Atomic => stress_producers::<AtomicAggregator<usize>>(producers, threads, seed, timeout),
        Aggregator::GlobalLocking => stress_producers::<GlobalLockingAggregator<usize>>(producers, threads, seed, timeout),
    }
}

fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Run { aggregator_args, max_delay_ms, latency, seed, separator } => {
            let config = RunConfig {
                producers: aggregator_args.producers,
                max_delay: Duration::from_millis(max_delay_ms),
                latency: latency.into(),
                timeout: Duration::from_millis(aggregator_args.timeout_ms),
                seed,
            };

            let report = run(aggregator_args.aggregator, &config)?;
            verify_run(&report.values)?;
            info!(arrivals = %format_joined(&report.arrivals, ","), "arrival order");
            println!("{}", format_joined(&report.values, &separator));
        },
        Commands::Stress { aggregator_args, threads, iterations } => {
            let timeout = Duration::from_millis(aggregator_args.timeout_ms);
            for seed in 0..iterations {
                let time = Instant::now();
                let values = stress(aggregator_args.aggregator, aggregator_args.producers, threads, seed, timeout)?;
                info!(
                    iteration = seed,
                    slots = values.len(),
                    elapsed = ?time.elapsed(),
                    "stress iteration ordered"
                );
            }
            println!("{} iterations of {} producers complete and ordered", iterations, aggregator_args.producers);
        },
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    match execute(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "aggregation failed");
            ExitCode::FAILURE
        },
    }
}
