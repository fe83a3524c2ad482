//! Simulator Execution
//!
//! Runs one compiled object against one execution case:
//!
//! 1. `ld.lld` finalizes the object into a per-case executable, defining
//!    the case's input value as the `input` symbol.
//! 2. `pasim` executes it with the configuration's simulator arguments,
//!    capturing program output on stdout and the statistics report on
//!    stderr, bounded by [`SIMULATOR_TIMEOUT`].
//!
//! The verifier drives executions through the [`CaseRunner`] trait so its
//! state machine can be exercised without a simulator installed.

use crate::toolchain::{run_tool, run_tool_bounded, BoundedRun, Toolchain, SIMULATOR_TIMEOUT};
use patverify_core::{Configuration, ExecutionCase};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Raw result of one simulated execution.
#[derive(Debug, Clone)]
pub struct CaseExecution {
    /// Exit status of the simulated program.
    pub return_code: i32,
    /// Program output captured from the simulator's stdout.
    pub stdout: String,
    /// Raw statistics report captured from the simulator's stderr.
    pub raw_stats: String,
}

/// Execution-stage failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// The final link of the input value into the executable failed.
    #[error("failed to generate executable from '{object}' for input '{input}'")]
    Link {
        /// Compiled object being finalized.
        object: PathBuf,
        /// Input value of the failing case.
        input: String,
    },
    /// The simulator exceeded its time bound, indicating non-termination
    /// rather than a wrong-output defect.
    #[error("execution of '{object}' for input '{input}' timed out")]
    Timeout {
        /// Executable under simulation.
        object: PathBuf,
        /// Input value of the failing case.
        input: String,
    },
    /// A tool could not be spawned.
    #[error("tool invocation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Seam between the verifier and the simulator.
pub trait CaseRunner {
    /// Execute one case, returning its raw observation.
    fn execute(&self, case: &ExecutionCase) -> Result<CaseExecution, RunError>;
}

/// The production runner: `ld.lld` + `pasim` on a built object.
pub struct SimulatorRunner<'a> {
    toolchain: &'a Toolchain,
    object: &'a Path,
    configuration: &'a Configuration,
}

impl<'a> SimulatorRunner<'a> {
    /// Create a runner for one configuration's built object.
    pub fn new(toolchain: &'a Toolchain, object: &'a Path, configuration: &'a Configuration) -> Self {
        Self {
            toolchain,
            object,
            configuration,
        }
    }
}

impl CaseRunner for SimulatorRunner<'_> {
    fn execute(&self, case: &ExecutionCase) -> Result<CaseExecution, RunError> {
        // Per-case executable name, so cases never clobber each other.
        let mut executable = self.object.as_os_str().to_os_string();
        executable.push(&case.input);
        let executable = PathBuf::from(executable);

        debug!(input = %case.input, exe = %executable.display(), "finalizing executable");
        let status = run_tool(
            &self.toolchain.lld,
            &[
                OsString::from("-nostdlib"),
                OsString::from("-static"),
                OsString::from("-o"),
                executable.clone().into_os_string(),
                self.object.as_os_str().to_os_string(),
                OsString::from("--defsym"),
                OsString::from(format!("input={}", case.input)),
            ],
        )?;
        if status != 0 {
            return Err(RunError::Link {
                object: self.object.to_path_buf(),
                input: case.input.clone(),
            });
        }

        let mut args: Vec<OsString> = vec![executable.clone().into_os_string(), "-V".into()];
        args.extend(
            self.configuration
                .simulator_arg_list()
                .iter()
                .map(OsString::from),
        );

        debug!(input = %case.input, "running simulator");
        match run_tool_bounded(&self.toolchain.pasim, &args, SIMULATOR_TIMEOUT)? {
            BoundedRun::Completed(run) => Ok(CaseExecution {
                return_code: run.return_code,
                stdout: run.stdout,
                raw_stats: run.stderr,
            }),
            BoundedRun::TimedOut => Err(RunError::Timeout {
                object: self.object.to_path_buf(),
                input: case.input.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::tests::stub_tool;

    fn case(input: &str, expected: i32) -> ExecutionCase {
        ExecutionCase {
            input: input.to_string(),
            expected_return: expected,
        }
    }

    fn config(simulator_args: &str) -> Configuration {
        Configuration {
            index: 0,
            backend_args: String::new(),
            simulator_args: simulator_args.to_string(),
        }
    }

    #[test]
    fn test_execute_captures_streams_from_the_simulator() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = Toolchain {
            llvm_link: stub_tool(dir.path(), "llvm-link", "exit 0"),
            llc: stub_tool(dir.path(), "llc", "exit 0"),
            lld: stub_tool(dir.path(), "ld.lld", "exit 0"),
            pasim: stub_tool(dir.path(), "pasim", "echo program-out; echo stats >&2; exit 4"),
        };
        let object = dir.path().join("prog.o");
        let cfg = config("-D ideal");
        let runner = SimulatorRunner::new(&toolchain, &object, &cfg);

        let execution = runner.execute(&case("7", 4)).unwrap();
        assert_eq!(execution.return_code, 4);
        assert_eq!(execution.stdout.trim(), "program-out");
        assert_eq!(execution.raw_stats.trim(), "stats");
    }

    #[test]
    fn test_failed_final_link_is_a_link_error() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = Toolchain {
            llvm_link: stub_tool(dir.path(), "llvm-link", "exit 0"),
            llc: stub_tool(dir.path(), "llc", "exit 0"),
            lld: stub_tool(dir.path(), "ld.lld", "exit 1"),
            pasim: stub_tool(dir.path(), "pasim", "exit 0"),
        };
        let object = dir.path().join("prog.o");
        let cfg = config("");
        let runner = SimulatorRunner::new(&toolchain, &object, &cfg);

        match runner.execute(&case("7", 0)) {
            Err(RunError::Link { input, .. }) => assert_eq!(input, "7"),
            other => panic!("expected link error, got {:?}", other),
        }
    }
}
