#![warn(missing_docs)]
//! PatVerify - Determinism Test Harness for the Patmos Backend
//!
//! Sweeps a matrix of code-generation options, builds a program under
//! each configuration, runs every execution case under the Patmos
//! simulator, and proves that single-path builds produce input-independent
//! execution statistics.
//!
//! This facade re-exports the public API of the workspace crates:
//!
//! - [`patverify_core`] — option matrix and execution cases
//! - [`patverify_stats`] — statistics normalization and diffing
//! - [`patverify_cli`] — build, run, verify, sweep, and the CLI

pub use patverify_cli::{
    build_report, default_matrix, generate_json_report, run_sweep, BuildError, BuildInputs,
    Builder, CaseExecution, CaseRunner, ConfigOutcome, ConfigStatus, RunError, SimulatorRunner,
    SweepError, SweepOptions, SweepReport, SweepRequest, ToolError, Toolchain, Verifier,
    VerifyError, VerifyOutcome, SIMULATOR_TIMEOUT,
};
pub use patverify_core::{
    expand, parse_cases, CaseParseError, Configuration, ExecutionCase, MatrixError, OptionNode,
};
pub use patverify_stats::{parse, render_diff, render_lines, NormalizedStats, StatsError};
