//! CLI argument parsing for the report workflow.
//!
//! The CLI stays thin: every command resolves paths and config, then hands
//! off to the runners in `workflow`.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "trace-report",
    version,
    about = "Traceable test report and coverage engine for generated UI test runs",
    after_help = "Commands:\n  init --artifacts <dir>      Write a default trace_report.json\n  report --artifacts <dir>    Build the CSV/JSON/HTML report for a run\n  coverage --artifacts <dir>  Print coverage metrics without writing files\n  triage --error <text>       Classify one error and rank fix suggestions\n\nExamples:\n  trace-report init --artifacts ./run\n  trace-report report --artifacts ./run --user-story 'User Story 3'\n  trace-report coverage --artifacts ./run --json\n  trace-report triage --error 'Timeout 5000ms exceeded' --target '#submit'",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Log progress at info level (TRACE_REPORT_LOG overrides)
    #[arg(long, global = true)]
    pub verbose: bool,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Report(ReportArgs),
    Coverage(CoverageArgs),
    Triage(TriageArgs),
}

/// Init command inputs.
#[derive(Parser, Debug)]
#[command(about = "Write a default trace_report.json into an artifact directory")]
pub struct InitArgs {
    /// Artifact directory holding viewpoint, test case, route, and result files
    #[arg(long, value_name = "DIR")]
    pub artifacts: PathBuf,

    /// Overwrite an existing trace_report.json
    #[arg(long)]
    pub force: bool,
}

/// Report command inputs.
#[derive(Parser, Debug)]
#[command(about = "Build the traceable report, coverage, and failure analysis")]
pub struct ReportArgs {
    /// Artifact directory holding viewpoint, test case, route, and result files
    #[arg(long, value_name = "DIR")]
    pub artifacts: PathBuf,

    /// User story id or text (digits are used as the id)
    #[arg(long, value_name = "TEXT")]
    pub user_story: Option<String>,

    /// Config file to use instead of <artifacts>/trace_report.json
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output directory (defaults to output_dir from the config)
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Skip the duplicate-run check (history is still updated)
    #[arg(long)]
    pub skip_duplicate_check: bool,

    /// Run remediation_command for duplicate runs that failed
    #[arg(long)]
    pub auto_remediate: bool,
}

/// Coverage command inputs.
#[derive(Parser, Debug)]
#[command(about = "Compute coverage metrics without writing outputs")]
pub struct CoverageArgs {
    /// Artifact directory holding viewpoint, test case, route, and result files
    #[arg(long, value_name = "DIR")]
    pub artifacts: PathBuf,

    /// Config file to use instead of <artifacts>/trace_report.json
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Triage command inputs for a single failed step.
#[derive(Parser, Debug)]
#[command(about = "Classify an error message and rank fix suggestions")]
pub struct TriageArgs {
    /// Error message reported by the driver
    #[arg(long, value_name = "TEXT")]
    pub error: String,

    /// Selector the failed step targeted
    #[arg(long, value_name = "SELECTOR", default_value = "")]
    pub target: String,

    /// Action the failed step performed
    #[arg(long, value_name = "ACTION", default_value = "")]
    pub action: String,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
