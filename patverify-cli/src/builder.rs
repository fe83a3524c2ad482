//! Build Orchestration
//!
//! Produces the compiled object for one configuration in three steps, each
//! an external tool treated as a black box:
//!
//! 1. `llvm-link` the start function with the program source.
//! 2. For constant-execution-time configurations, `llvm-link` the
//!    compensation function into the intermediate artifact.
//! 3. `llc` the intermediate artifact into an object file (`-filetype=obj`,
//!    not yet an executable) with the configuration's backend arguments.
//!
//! Nothing is retried: any non-zero tool status fails the configuration.
//! The intermediate artifact is mutated in place by successive steps, which
//! is safe because each step's completion gates the next.

use crate::toolchain::{run_tool, Toolchain};
use patverify_core::Configuration;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info};

/// Build failures, each naming the failing step's artifact pair.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Linking the start function with the program source failed.
    #[error("failed to link '{source_file}' and '{start}'")]
    LinkStart {
        /// Program source artifact.
        source_file: PathBuf,
        /// Start-function artifact.
        start: PathBuf,
    },
    /// Linking the compensation function into the intermediate failed.
    #[error("failed to link '{object}' and '{compensation}'")]
    LinkCompensation {
        /// Intermediate linked artifact.
        object: PathBuf,
        /// Compensation-function artifact.
        compensation: PathBuf,
    },
    /// Compiling the intermediate artifact failed.
    #[error("failed to compile '{source_file}' with backend arguments '{backend_args}'")]
    Compile {
        /// Program source artifact.
        source_file: PathBuf,
        /// Backend arguments of the failing configuration.
        backend_args: String,
    },
    /// A tool could not be spawned or a debug file could not be created.
    #[error("tool invocation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The fixed artifacts of one sweep, shared by every configuration.
#[derive(Debug, Clone)]
pub struct BuildInputs {
    /// Program source bitcode.
    pub source: PathBuf,
    /// Start-function bitcode linked with every program.
    pub start_function: PathBuf,
    /// Compensation-function bitcode for constant-execution-time builds.
    pub compensation_function: PathBuf,
    /// Whether to capture llc debug tracing to `<output>.debug`.
    pub with_debug: bool,
}

/// Thin wrapper over the external build tools.
pub struct Builder<'a> {
    toolchain: &'a Toolchain,
    inputs: &'a BuildInputs,
}

impl<'a> Builder<'a> {
    /// Create a builder over a discovered toolchain.
    pub fn new(toolchain: &'a Toolchain, inputs: &'a BuildInputs) -> Self {
        Self { toolchain, inputs }
    }

    /// The sibling path llc debug tracing is written to.
    pub fn debug_file(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_os_string();
        name.push(".debug");
        PathBuf::from(name)
    }

    /// Build `output` for one configuration, returning the object path.
    pub fn build(
        &self,
        configuration: &Configuration,
        output: &Path,
    ) -> Result<PathBuf, BuildError> {
        info!(
            index = configuration.index,
            backend_args = %configuration.backend_args,
            "building configuration"
        );

        let status = run_tool(
            &self.toolchain.llvm_link,
            &[
                self.inputs.start_function.as_os_str(),
                self.inputs.source.as_os_str(),
                "-o".as_ref(),
                output.as_os_str(),
            ],
        )?;
        if status != 0 {
            return Err(BuildError::LinkStart {
                source_file: self.inputs.source.clone(),
                start: self.inputs.start_function.clone(),
            });
        }

        if configuration.uses_cet() {
            debug!(index = configuration.index, "linking compensation function");
            let status = run_tool(
                &self.toolchain.llvm_link,
                &[
                    self.inputs.compensation_function.as_os_str(),
                    output.as_os_str(),
                    "-o".as_ref(),
                    output.as_os_str(),
                ],
            )?;
            if status != 0 {
                return Err(BuildError::LinkCompensation {
                    object: output.to_path_buf(),
                    compensation: self.inputs.compensation_function.clone(),
                });
            }
        }

        let status = self.compile(configuration, output)?;
        if status != 0 {
            return Err(BuildError::Compile {
                source_file: self.inputs.source.clone(),
                backend_args: configuration.backend_args.clone(),
            });
        }

        Ok(output.to_path_buf())
    }

    fn compile(&self, configuration: &Configuration, output: &Path) -> Result<i32, BuildError> {
        let mut args: Vec<OsString> = vec![output.into()];
        args.extend(configuration.backend_arg_list().iter().map(OsString::from));
        args.push("-filetype=obj".into());
        args.push("-o".into());
        args.push(output.into());

        if self.inputs.with_debug {
            args.push("--debug".into());
            args.push("--print-after-all".into());
            let debug_file = std::fs::File::create(Self::debug_file(output))?;
            let status = Command::new(&self.toolchain.llc)
                .args(&args)
                .stderr(Stdio::from(debug_file))
                .status()?;
            Ok(status.code().unwrap_or(-1))
        } else {
            Ok(run_tool(&self.toolchain.llc, &args)?)
        }
    }
}
