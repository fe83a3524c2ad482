//! Toolchain Discovery and Invocation
//!
//! The harness drives four external tools as opaque subprocesses:
//! `llvm-link` and `llc` from the LLVM build directory, and `ld.lld` and
//! `pasim` from `PATH`. Discovery happens once at startup so a missing
//! tool aborts before any configuration is built.
//!
//! Simulator runs are the only invocations with a cancellation bound: a
//! fixed timeout after which the child is killed and the case reported as
//! non-terminating.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Wall-clock bound on one simulator execution.
pub const SIMULATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved paths of all required external tools.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// LLVM bitcode linker, from the build directory.
    pub llvm_link: PathBuf,
    /// Patmos backend compiler, from the build directory.
    pub llc: PathBuf,
    /// ELF linker, from `PATH`.
    pub lld: PathBuf,
    /// Patmos simulator, from `PATH`.
    pub pasim: PathBuf,
}

/// Startup toolchain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// A required tool is not present where it is expected.
    #[error("required tool '{name}' could not be found in {searched}")]
    Missing {
        /// Tool file name.
        name: String,
        /// Where the lookup searched.
        searched: String,
    },
}

impl Toolchain {
    /// Locate every required tool, failing fast on the first one missing.
    ///
    /// `bin_dir` is the directory of the LLVM build binaries (derived from
    /// the build-tool path on the command line).
    pub fn discover(bin_dir: &Path) -> Result<Self, ToolError> {
        let toolchain = Toolchain {
            llvm_link: tool_in_dir(bin_dir, "llvm-link")?,
            llc: tool_in_dir(bin_dir, "llc")?,
            lld: tool_in_path("ld.lld")?,
            pasim: tool_in_path("pasim")?,
        };
        debug!(?toolchain, "toolchain discovered");
        Ok(toolchain)
    }
}

fn tool_in_dir(dir: &Path, name: &str) -> Result<PathBuf, ToolError> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(ToolError::Missing {
            name: name.to_string(),
            searched: dir.display().to_string(),
        })
    }
}

fn tool_in_path(name: &str) -> Result<PathBuf, ToolError> {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ToolError::Missing {
            name: name.to_string(),
            searched: "PATH".to_string(),
        })
}

/// Exit status and captured streams of one bounded tool run.
#[derive(Debug)]
pub struct CapturedRun {
    /// Process exit status (`-1` when terminated by a signal).
    pub return_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Outcome of a run with a deadline.
#[derive(Debug)]
pub enum BoundedRun {
    /// The process finished within the deadline.
    Completed(CapturedRun),
    /// The deadline expired; the process was killed.
    TimedOut,
}

/// Run a tool to completion, inheriting the parent's stdio.
///
/// Build steps use this: their console output goes straight to the user,
/// and only the exit status matters to the harness.
pub fn run_tool<S: AsRef<std::ffi::OsStr>>(
    program: &Path,
    args: &[S],
) -> std::io::Result<i32> {
    debug!(tool = %program.display(), "invoking tool");
    let status = Command::new(program).args(args).status()?;
    Ok(status.code().unwrap_or(-1))
}

/// Run a tool with captured stdio and a hard deadline.
///
/// The child is polled rather than waited on so the deadline can be
/// enforced; on expiry it is killed and reaped. Stream capture runs on
/// dedicated threads to keep the child from blocking on full pipes.
pub fn run_tool_bounded<S: AsRef<std::ffi::OsStr>>(
    program: &Path,
    args: &[S],
    timeout: Duration,
) -> std::io::Result<BoundedRun> {
    debug!(tool = %program.display(), ?timeout, "invoking tool with deadline");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_thread = capture_stream(child.stdout.take());
    let stderr_thread = capture_stream(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                kill_and_reap(&mut child);
                // Let the capture threads observe the closed pipes.
                let _ = stdout_thread.join();
                let _ = stderr_thread.join();
                return Ok(BoundedRun::TimedOut);
            }
            None => std::thread::sleep(Duration::from_millis(10)),
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();
    Ok(BoundedRun::Completed(CapturedRun {
        return_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    }))
}

fn capture_stream<R: Read + Send + 'static>(
    stream: Option<R>,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_string(&mut buf);
        }
        buf
    })
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
