//! Configuration Sweep
//!
//! Expands the option matrix and drives build + verification for every
//! configuration. Two policies:
//!
//! - Sequential (default): configurations run in matrix order and the
//!   sweep aborts at the first failure, reusing the caller's artifact
//!   path in place.
//! - Collect-all (`--keep-going`, or any parallel sweep): every
//!   configuration runs to its own verdict and all failures are reported
//!   at the end. Parallel sweeps give each configuration a private
//!   artifact namespace (`<output>.cfg<N>`) since configurations share no
//!   state and have no ordering requirement between them.
//!
//! Individual configuration semantics are identical under both policies:
//! fatal, never retried, full diagnostic.

use crate::builder::{BuildInputs, Builder};
use crate::runner::SimulatorRunner;
use crate::toolchain::Toolchain;
use crate::verify::{Verifier, VerifyOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use patverify_core::{expand, Configuration, ExecutionCase, MatrixError, OptionNode};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Everything one sweep needs besides the toolchain.
#[derive(Debug, Clone)]
pub struct SweepRequest {
    /// Fixed build artifacts.
    pub inputs: BuildInputs,
    /// Output object path; parallel configurations derive siblings from it.
    pub output: PathBuf,
    /// Root single-path function name, substituted into the matrix.
    pub sp_root: String,
    /// Ordered execution cases; the first is the baseline.
    pub cases: Vec<ExecutionCase>,
}

/// Sweep policy knobs.
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    /// Worker threads; 1 means sequential.
    pub jobs: usize,
    /// Run every configuration even after a failure.
    pub keep_going: bool,
    /// Only run configurations whose description matches.
    pub filter: Option<Regex>,
}

/// Verdict of one configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfigStatus {
    /// Build and all execution cases passed.
    Passed {
        /// Execution cases run.
        cases_run: usize,
        /// Statistics comparisons performed.
        comparisons: usize,
    },
    /// The configuration failed; the sweep-level diagnostic was printed.
    Failed {
        /// Short failure message.
        message: String,
    },
    /// The configuration was excluded by the filter.
    Skipped,
}

impl ConfigStatus {
    /// Whether this verdict fails the sweep.
    pub fn is_failure(&self) -> bool {
        matches!(self, ConfigStatus::Failed { .. })
    }
}

/// One configuration's entry in the sweep result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOutcome {
    /// The configuration that ran.
    pub configuration: Configuration,
    /// Its verdict.
    pub status: ConfigStatus,
}

/// Sweep-level failure, carrying the diagnostic block for stderr.
#[derive(Debug, Error)]
#[error("configuration {index} failed: {message}")]
pub struct SweepFailure {
    /// Matrix index of the failing configuration.
    pub index: usize,
    /// Short failure message.
    pub message: String,
    /// Full multi-line diagnostic.
    pub diagnostic: String,
}

/// Sweep errors.
#[derive(Debug, Error)]
pub enum SweepError {
    /// The option matrix itself is malformed.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    /// The parallel worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    Pool(String),
    /// One or more configurations failed.
    #[error("{} of {} configurations failed", failures.len(), outcomes.len())]
    ConfigurationsFailed {
        /// Every configuration's verdict, in matrix order.
        outcomes: Vec<ConfigOutcome>,
        /// The failures, in matrix order.
        failures: Vec<SweepFailure>,
    },
}

/// The default Patmos verification matrix.
///
/// One dimension of code-generation strategies (traditional, metadata
/// serialization, single-path with scheduler and dual-issue variants, and
/// the constant-execution-time compensation algorithms, each paired with
/// the simulator's matching cache model) crossed with one dimension of
/// optimization levels. `sp_root` is the root single-path function;
/// `serialize_base` is the artifact whose `.pml` sibling receives the
/// serialized program metadata.
pub fn default_matrix(sp_root: &str, serialize_base: &Path) -> OptionNode {
    let sp = format!("-mpatmos-singlepath={}", sp_root);
    OptionNode::Sequence(vec![
        OptionNode::Group(vec![
            // Traditional code.
            OptionNode::pair("", ""),
            // Traditional with PML output; only checks serialization runs
            // without errors, the output itself is never inspected.
            OptionNode::tool(format!(
                "-mpatmos-serialize={}.pml -mpatmos-serialize-functions={}",
                serialize_base.display(),
                sp_root
            )),
            // Single-path without dual-issue.
            OptionNode::pair(sp.clone(), "-D ideal"),
            OptionNode::pair(
                format!("{} -mpatmos-enable-singlepath-scheduler-equivalence-class=false", sp),
                "-D ideal",
            ),
            // Single-path with dual-issue.
            OptionNode::pair(format!("{} -mpatmos-disable-vliw=false", sp), "-D ideal"),
            OptionNode::pair(
                format!(
                    "{} -mpatmos-disable-vliw=false \
                     -mpatmos-enable-singlepath-scheduler-equivalence-class=false",
                    sp
                ),
                "-D ideal",
            ),
            OptionNode::pair(
                format!(
                    "{} -mpatmos-disable-vliw=false -mpatmos-disable-permissive-dual-issue=false",
                    sp
                ),
                "-D ideal --permissive-dual-issue",
            ),
            // Constant execution time, opposite-predicate compensation.
            OptionNode::pair(format!("{} -mpatmos-enable-cet=opposite", sp), "-D lru2"),
            // Constant execution time, decrementing-counter compensation.
            OptionNode::pair(format!("{} -mpatmos-enable-cet=counter", sp), "-D lru2"),
            // Counter compensation through a caller-named function.
            OptionNode::pair(
                format!(
                    "{} -mpatmos-enable-cet=counter \
                     -mpatmos-cet-compensation-function=__patmos_comp_fun_for_testing",
                    sp
                ),
                "-D lru2",
            ),
            // Heuristic choice between the compensation algorithms.
            OptionNode::pair(format!("{} -mpatmos-enable-cet=hybrid", sp), "-D lru2"),
        ]),
        // Optimization levels. The low subfunction size bound exercises the
        // function splitter without needing tests with big functions.
        OptionNode::Group(vec![
            OptionNode::tool("-O2"),
            OptionNode::tool(""),
            OptionNode::tool("-O1"),
            OptionNode::tool("-O2 -mpatmos-disable-pseudo-roots"),
            OptionNode::tool("-O2 -mpatmos-disable-countless-loops"),
            OptionNode::tool("-O2 --mpatmos-max-subfunction-size=64"),
        ]),
    ])
}

/// Run one full sweep over an already-expanded matrix.
pub fn run_sweep(
    toolchain: &Toolchain,
    request: &SweepRequest,
    options: &SweepOptions,
    matrix: &OptionNode,
) -> Result<Vec<ConfigOutcome>, SweepError> {
    let configurations = expand(matrix)?;
    info!(configurations = configurations.len(), "matrix expanded");

    let progress = ProgressBar::new(configurations.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let jobs = options.jobs.max(1);
    let outcomes = if jobs == 1 {
        let mut outcomes = Vec::with_capacity(configurations.len());
        for configuration in &configurations {
            let outcome = run_one(toolchain, request, options, configuration, false);
            progress.set_message(format!("cfg {}", configuration.index));
            progress.inc(1);
            let failed = outcome.status.is_failure();
            outcomes.push(outcome);
            if failed && !options.keep_going {
                break;
            }
        }
        outcomes
    } else {
        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| SweepError::Pool(e.to_string()))?;
        pool.install(|| {
            configurations
                .par_iter()
                .map(|configuration| {
                    let outcome = run_one(toolchain, request, options, configuration, true);
                    progress.inc(1);
                    outcome
                })
                .collect()
        })
    };
    progress.finish_with_message("sweep complete");

    let failures: Vec<SweepFailure> = outcomes
        .iter()
        .filter_map(|outcome| match &outcome.status {
            ConfigStatus::Failed { message } => Some(SweepFailure {
                index: outcome.configuration.index,
                message: message.clone(),
                diagnostic: diagnostic_block(request, &outcome.configuration, message),
            }),
            _ => None,
        })
        .collect();

    if failures.is_empty() {
        Ok(outcomes)
    } else {
        Err(SweepError::ConfigurationsFailed { outcomes, failures })
    }
}

/// Build and verify one configuration.
fn run_one(
    toolchain: &Toolchain,
    request: &SweepRequest,
    options: &SweepOptions,
    configuration: &Configuration,
    namespaced: bool,
) -> ConfigOutcome {
    if let Some(filter) = &options.filter {
        if !filter.is_match(&configuration.describe()) {
            return ConfigOutcome {
                configuration: configuration.clone(),
                status: ConfigStatus::Skipped,
            };
        }
    }

    let output = if namespaced {
        namespaced_output(&request.output, configuration.index)
    } else {
        request.output.clone()
    };

    let builder = Builder::new(toolchain, &request.inputs);
    let object = match builder.build(configuration, &output) {
        Ok(object) => object,
        Err(e) => {
            warn!(index = configuration.index, error = %e, "build failed");
            return ConfigOutcome {
                configuration: configuration.clone(),
                status: ConfigStatus::Failed {
                    message: e.to_string(),
                },
            };
        }
    };

    let runner = SimulatorRunner::new(toolchain, &object, configuration);
    let verifier = Verifier::new(&runner, configuration.is_single_path());
    match verifier.verify(&request.cases) {
        Ok(VerifyOutcome {
            cases_run,
            comparisons,
        }) => ConfigOutcome {
            configuration: configuration.clone(),
            status: ConfigStatus::Passed {
                cases_run,
                comparisons,
            },
        },
        Err(e) => {
            warn!(index = configuration.index, error = %e, "verification failed");
            ConfigOutcome {
                configuration: configuration.clone(),
                status: ConfigStatus::Failed {
                    message: e.diagnostic(),
                },
            }
        }
    }
}

/// Private artifact path for one concurrently-running configuration.
fn namespaced_output(output: &Path, index: usize) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(format!(".cfg{}", index));
    PathBuf::from(name)
}

/// The stderr diagnostic block for one failing configuration.
fn diagnostic_block(
    request: &SweepRequest,
    configuration: &Configuration,
    message: &str,
) -> String {
    let start_file = request
        .inputs
        .start_function
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut block = format!(
        "{message}\nStart file: {start_file}\nLLC args: {}\nPasim args: {}",
        configuration.backend_args, configuration.simulator_args
    );
    if request.inputs.with_debug {
        block.push_str(&format!(
            "\nDebug file: {}",
            Builder::debug_file(&request.output).display()
        ));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matrix_expands_to_the_full_product() {
        let matrix = default_matrix("main", Path::new("out.o"));
        let configurations = expand(&matrix).unwrap();
        assert_eq!(configurations.len(), 11 * 6);
        // The single-path share: 9 of 11 strategies, each at 6 levels.
        let single_path = configurations.iter().filter(|c| c.is_single_path()).count();
        assert_eq!(single_path, 9 * 6);
        // The CET share: 4 of 11 strategies.
        let cet = configurations.iter().filter(|c| c.uses_cet()).count();
        assert_eq!(cet, 4 * 6);
    }

    #[test]
    fn test_default_matrix_names_the_root_function() {
        let matrix = default_matrix("binary_search", Path::new("bs.o"));
        let configurations = expand(&matrix).unwrap();
        assert!(configurations
            .iter()
            .any(|c| c.backend_args.contains("-mpatmos-singlepath=binary_search")));
        assert!(configurations
            .iter()
            .any(|c| c.backend_args.contains("-mpatmos-serialize=bs.o.pml")));
    }

    #[test]
    fn test_namespaced_output_is_per_configuration() {
        assert_eq!(
            namespaced_output(Path::new("/tmp/prog.o"), 7),
            PathBuf::from("/tmp/prog.o.cfg7")
        );
    }

    #[test]
    fn test_diagnostic_block_lists_the_failing_configuration() {
        let request = SweepRequest {
            inputs: BuildInputs {
                source: PathBuf::from("prog.ll"),
                start_function: PathBuf::from("dir/start.ll"),
                compensation_function: PathBuf::from("comp.ll"),
                with_debug: true,
            },
            output: PathBuf::from("prog.o"),
            sp_root: "main".to_string(),
            cases: Vec::new(),
        };
        let configuration = Configuration {
            index: 3,
            backend_args: "-O2 -mpatmos-singlepath=main".to_string(),
            simulator_args: "-D ideal".to_string(),
        };
        let block = diagnostic_block(&request, &configuration, "it broke");
        assert!(block.starts_with("it broke"));
        assert!(block.contains("Start file: start.ll"));
        assert!(block.contains("LLC args: -O2 -mpatmos-singlepath=main"));
        assert!(block.contains("Pasim args: -D ideal"));
        assert!(block.contains("Debug file: prog.o.debug"));
    }
}
