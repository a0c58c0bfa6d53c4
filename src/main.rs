use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod artifacts;
mod cli;
mod config;
mod coverage;
mod dedup;
mod engine;
mod failures;
mod functions;
mod history;
mod mapping;
mod paths;
mod report;
mod staging;
mod util;
mod workflow;

const LOG_ENV: &str = "TRACE_REPORT_LOG";

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    init_logging(args.verbose);
    match args.command {
        cli::Command::Init(args) => workflow::run_init(args),
        cli::Command::Report(args) => workflow::run_report(args),
        cli::Command::Coverage(args) => workflow::run_coverage(args),
        cli::Command::Triage(args) => workflow::run_triage(args),
    }
}
