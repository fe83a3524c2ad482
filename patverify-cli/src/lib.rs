#![warn(missing_docs)]
//! PatVerify CLI Library
//!
//! Command-line front end of the Patmos verification harness. The binary
//! takes the positional surface of the original test scripts (tool path,
//! artifacts, single-path root, debug flag, execution cases) plus sweep
//! policy flags, and maps every detected failure to exit status 1 after a
//! multi-line diagnostic on stderr.
//!
//! ## Pipeline Overview
//!
//! ```text
//! OptionNode matrix (default_matrix)
//!       │
//!       ▼
//! ┌─────────────┐
//! │    sweep    │  Expand, filter, drive configurations
//! └──────┬──────┘
//!        │ per configuration
//!        ▼
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │   builder   │ → │   runner    │ → │   verify    │
//! └─────────────┘   └─────────────┘   └─────────────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   report    │  Optional JSON sweep report
//! └─────────────┘
//! ```

mod builder;
mod report;
mod runner;
mod sweep;
mod toolchain;
mod verify;

pub use builder::{BuildError, BuildInputs, Builder};
pub use report::{build_report, generate_json_report, ReportMeta, SweepReport, SweepSummary};
pub use runner::{CaseExecution, CaseRunner, RunError, SimulatorRunner};
pub use sweep::{
    default_matrix, run_sweep, ConfigOutcome, ConfigStatus, SweepError, SweepFailure,
    SweepOptions, SweepRequest,
};
pub use toolchain::{ToolError, Toolchain, SIMULATOR_TIMEOUT};
pub use verify::{Verifier, VerifyError, VerifyOutcome};

use anyhow::{bail, Context};
use clap::Parser;
use patverify_core::parse_cases;
use regex::Regex;
use std::path::PathBuf;

/// PatVerify CLI arguments.
///
/// The positional surface matches the original harness invocation so
/// existing test drivers work unchanged.
#[derive(Parser, Debug)]
#[command(name = "patverify")]
#[command(author, version, about = "Determinism test harness for the Patmos single-path backend")]
pub struct Cli {
    /// Path to an LLVM build binary; its directory is searched for llc
    /// and llvm-link
    pub build_tool: PathBuf,

    /// Program source artifact to test
    pub source: PathBuf,

    /// Substitute source artifact; the empty string means no substitution
    pub substitute: String,

    /// Output object path, overwritten per configuration
    pub output: PathBuf,

    /// Start-function artifact linked with every program
    pub start_function: PathBuf,

    /// Compensation-function artifact for constant-execution-time builds
    pub compensation_function: PathBuf,

    /// Root single-path function name
    pub sp_root: String,

    /// Whether llc debug tracing is captured to '<output>.debug'
    /// (the literal strings "true" or "false")
    pub with_debug: String,

    /// Execution cases as '<input>=<expected return code>'; the first is
    /// the baseline, and at least two are required
    #[arg(required = true, num_args = 2..)]
    pub cases: Vec<String>,

    /// Run configurations on this many worker threads
    #[arg(long, default_value = "1")]
    pub jobs: usize,

    /// Only run configurations whose argument strings match this regex
    #[arg(long)]
    pub filter: Option<String>,

    /// Write a JSON sweep report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Keep running configurations after a failure and report all
    /// failures at the end
    #[arg(long)]
    pub keep_going: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the PatVerify CLI. This is the binary's entire main body; any
/// returned error corresponds to exit status 1.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("patverify=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("patverify=info")
            .init();
    }

    run_with_cli(cli)
}

/// Run the harness with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let with_debug = match cli.with_debug.as_str() {
        "true" => true,
        "false" => false,
        other => bail!("debug flag must be 'true' or 'false', got '{}'", other),
    };

    let source = if cli.substitute.is_empty() {
        cli.source.clone()
    } else {
        PathBuf::from(&cli.substitute)
    };

    let cases = parse_cases(&cli.cases)?;

    let filter = cli
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid --filter regex")?;

    let bin_dir = cli.build_tool.parent().unwrap_or_else(|| std::path::Path::new(""));
    let toolchain = Toolchain::discover(bin_dir)?;

    let request = SweepRequest {
        inputs: BuildInputs {
            source,
            start_function: cli.start_function.clone(),
            compensation_function: cli.compensation_function.clone(),
            with_debug,
        },
        output: cli.output.clone(),
        sp_root: cli.sp_root.clone(),
        cases,
    };
    let options = SweepOptions {
        jobs: cli.jobs,
        keep_going: cli.keep_going,
        filter,
    };
    let matrix = default_matrix(&request.sp_root, &request.output);

    match run_sweep(&toolchain, &request, &options, &matrix) {
        Ok(outcomes) => {
            write_report(&cli, &toolchain, &outcomes)?;
            Ok(())
        }
        Err(SweepError::ConfigurationsFailed { outcomes, failures }) => {
            for failure in &failures {
                eprintln!("{}", failure.diagnostic);
            }
            write_report(&cli, &toolchain, &outcomes)?;
            bail!("{} of {} configurations failed", failures.len(), outcomes.len())
        }
        Err(e) => Err(e.into()),
    }
}

fn write_report(
    cli: &Cli,
    toolchain: &Toolchain,
    outcomes: &[ConfigOutcome],
) -> anyhow::Result<()> {
    let Some(path) = &cli.report else {
        return Ok(());
    };
    let report = build_report(toolchain, outcomes);
    let json = generate_json_report(&report)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to '{}'", path.display()))?;
    Ok(())
}
