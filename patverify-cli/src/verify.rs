//! Equivalence Verification
//!
//! The central state machine of the harness. For one built configuration
//! it runs every execution case and checks:
//!
//! - the simulated exit status against the case's expected value, always;
//! - for single-path configurations, that the normalized statistics of
//!   every case are structurally identical to the baseline's.
//!
//! States: `Idle → BaselineRun → ComparingRun(i) → Done`, or `Failed` on
//! the first violation. Only the first case is ever compared against the
//! others: equality is transitive, so all-equal-to-baseline implies
//! all-pairwise-equal with n−1 comparisons instead of O(n²).

use crate::runner::{CaseRunner, RunError};
use patverify_stats::{render_diff, NormalizedStats, StatsError};
use patverify_core::ExecutionCase;
use thiserror::Error;
use tracing::debug;

/// Verification failures, each terminal for the whole configuration.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// An execution or final link failed.
    #[error(transparent)]
    Run(#[from] RunError),
    /// The simulated program returned the wrong exit status.
    #[error("execution for input '{input}' returned {actual}, expected {expected}")]
    WrongOutput {
        /// Input value of the failing case.
        input: String,
        /// Expected exit status.
        expected: i32,
        /// Actual exit status.
        actual: i32,
        /// Captured program output, for the diagnostic dump.
        stdout: String,
        /// Captured raw statistics stream, for the diagnostic dump.
        raw_stats: String,
    },
    /// The simulator's diagnostic stream was not a statistics report.
    #[error("no statistics for input '{input}': {source}")]
    Stats {
        /// Input value of the failing case.
        input: String,
        /// The parse failure.
        source: StatsError,
        /// The raw diagnostic stream, echoed verbatim in the dump since it
        /// usually carries a tool-level error message.
        stderr: String,
    },
    /// A single-path build produced diverging statistics.
    #[error("executions for inputs '{baseline_input}' and '{input}' were not equivalent")]
    EquivalenceMismatch {
        /// Baseline case input.
        baseline_input: String,
        /// Diverging case input.
        input: String,
        /// Structural diff of the two normalized renderings.
        diff: String,
    },
}

impl VerifyError {
    /// Multi-line diagnostic for stderr, in the harness's banner format.
    pub fn diagnostic(&self) -> String {
        match self {
            VerifyError::Run(e) => e.to_string(),
            VerifyError::WrongOutput {
                input,
                expected,
                actual,
                stdout,
                raw_stats,
            } => format!(
                "The execution for input argument '{input}' gave the wrong output.\n\
                 -------------------- Expected --------------------\n\
                 {expected}\n\
                 --------------------- Actual ---------------------\n\
                 {actual}\n\
                 --------------------- stdout ---------------------\n\
                 {stdout}\n\
                 --------------------- stderr ---------------------\n\
                 {raw_stats}\n\
                 --------------------------------------------------"
            ),
            VerifyError::Stats { input, source, stderr } => format!(
                "Failed to normalize statistics for input argument '{input}': {source}\n\
                 --------------------- stderr ---------------------\n\
                 {stderr}\n\
                 --------------------------------------------------"
            ),
            VerifyError::EquivalenceMismatch {
                baseline_input,
                input,
                diff,
            } => format!(
                "The executions for input arguments '{baseline_input}' and '{input}' \
                 weren't equivalent.\n{diff}"
            ),
        }
    }
}

/// Successful verification summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// Execution cases run (baseline included).
    pub cases_run: usize,
    /// Statistics comparisons performed; n−1 for a single-path build with
    /// n cases, 0 otherwise.
    pub comparisons: usize,
}

/// Verifier states, logged on each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Running the baseline case.
    BaselineRun,
    /// Comparing case `i` against the baseline.
    ComparingRun(usize),
}

/// Runs all cases of one configuration and checks their equivalence.
pub struct Verifier<'a, R: CaseRunner> {
    runner: &'a R,
    /// Whether the configuration requires statistics equivalence.
    single_path: bool,
}

impl<'a, R: CaseRunner> Verifier<'a, R> {
    /// Create a verifier over a case runner.
    pub fn new(runner: &'a R, single_path: bool) -> Self {
        Self { runner, single_path }
    }

    /// Run every case; the first is the baseline.
    ///
    /// The exit-status check always happens before any statistics parsing,
    /// so a wrong-output case never reports a statistics problem.
    pub fn verify(&self, cases: &[ExecutionCase]) -> Result<VerifyOutcome, VerifyError> {
        let mut comparisons = 0;
        let mut baseline_stats: Option<NormalizedStats> = None;

        for (i, case) in cases.iter().enumerate() {
            let state = if i == 0 {
                State::BaselineRun
            } else {
                State::ComparingRun(i)
            };
            debug!(?state, input = %case.input, "running execution case");

            let execution = self.runner.execute(case)?;
            if execution.return_code != case.expected_return {
                return Err(VerifyError::WrongOutput {
                    input: case.input.clone(),
                    expected: case.expected_return,
                    actual: execution.return_code,
                    stdout: execution.stdout,
                    raw_stats: execution.raw_stats,
                });
            }

            let stats =
                patverify_stats::parse(&execution.raw_stats).map_err(|source| VerifyError::Stats {
                    input: case.input.clone(),
                    source,
                    stderr: execution.raw_stats.clone(),
                })?;

            match &baseline_stats {
                None => baseline_stats = Some(stats),
                Some(baseline) if self.single_path => {
                    comparisons += 1;
                    if *baseline != stats {
                        return Err(VerifyError::EquivalenceMismatch {
                            baseline_input: cases[0].input.clone(),
                            input: case.input.clone(),
                            diff: render_diff(baseline, &stats),
                        });
                    }
                }
                Some(_) => {}
            }
        }

        debug!(cases = cases.len(), comparisons, "verification done");
        Ok(VerifyOutcome {
            cases_run: cases.len(),
            comparisons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CaseExecution;
    use std::cell::RefCell;

    /// Scripted runner: maps each input to a canned execution, counting
    /// invocations and refusing inputs it was not scripted for.
    struct ScriptedRunner {
        executions: Vec<(String, CaseExecution)>,
        calls: RefCell<usize>,
    }

    impl ScriptedRunner {
        fn new(executions: Vec<(String, CaseExecution)>) -> Self {
            Self {
                executions,
                calls: RefCell::new(0),
            }
        }
    }

    impl CaseRunner for ScriptedRunner {
        fn execute(&self, case: &ExecutionCase) -> Result<CaseExecution, RunError> {
            *self.calls.borrow_mut() += 1;
            let execution = self
                .executions
                .iter()
                .find(|(input, _)| *input == case.input)
                .map(|(_, e)| e.clone());
            match execution {
                Some(e) => Ok(e),
                None => panic!("no scripted execution for input '{}'", case.input),
            }
        }
    }

    fn stats_report(add_count: u64, cycles: u64) -> String {
        format!(
            "Instruction Statistics:\n   header\n   add  {}  0  0  0  0\n   all:\nCycles: {}\n\
             Profiling information:\nh1\nh2\nh3\n  <main>\n   ---\n   1\nend\n",
            add_count, cycles
        )
    }

    fn ok_execution(add_count: u64) -> CaseExecution {
        CaseExecution {
            return_code: 0,
            stdout: String::new(),
            raw_stats: stats_report(add_count, 100),
        }
    }

    fn case(input: &str) -> ExecutionCase {
        ExecutionCase {
            input: input.to_string(),
            expected_return: 0,
        }
    }

    #[test]
    fn test_single_path_performs_exactly_n_minus_one_comparisons() {
        let runner = ScriptedRunner::new(vec![
            ("1".to_string(), ok_execution(5)),
            ("2".to_string(), ok_execution(5)),
            ("3".to_string(), ok_execution(5)),
        ]);
        let verifier = Verifier::new(&runner, true);
        let outcome = verifier.verify(&[case("1"), case("2"), case("3")]).unwrap();
        assert_eq!(outcome.cases_run, 3);
        assert_eq!(outcome.comparisons, 2);
    }

    #[test]
    fn test_mismatch_diagnostic_contains_both_counts() {
        let runner = ScriptedRunner::new(vec![
            ("1".to_string(), ok_execution(5)),
            ("2".to_string(), ok_execution(6)),
        ]);
        let verifier = Verifier::new(&runner, true);
        let err = verifier.verify(&[case("1"), case("2")]).unwrap_err();
        match &err {
            VerifyError::EquivalenceMismatch { diff, .. } => {
                assert!(diff.contains("add 5"));
                assert!(diff.contains("add 6"));
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
        assert!(err.diagnostic().contains("weren't equivalent"));
    }

    #[test]
    fn test_non_single_path_tolerates_stat_divergence() {
        let runner = ScriptedRunner::new(vec![
            ("1".to_string(), ok_execution(5)),
            ("2".to_string(), ok_execution(6)),
        ]);
        let verifier = Verifier::new(&runner, false);
        let outcome = verifier.verify(&[case("1"), case("2")]).unwrap();
        assert_eq!(outcome.comparisons, 0);
    }

    #[test]
    fn test_wrong_output_fails_before_statistics_parsing() {
        // Unparseable stats plus a wrong exit status: the exit status must
        // win, proving no parse was attempted for the failing case.
        let runner = ScriptedRunner::new(vec![(
            "1".to_string(),
            CaseExecution {
                return_code: 7,
                stdout: "boom".to_string(),
                raw_stats: "not statistics at all".to_string(),
            },
        )]);
        let verifier = Verifier::new(&runner, true);
        let err = verifier.verify(&[case("1"), case("2")]).unwrap_err();
        match err {
            VerifyError::WrongOutput {
                expected, actual, ..
            } => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 7);
            }
            other => panic!("expected wrong output, got {:?}", other),
        }
        // The second case was never run.
        assert_eq!(*runner.calls.borrow(), 1);
    }

    #[test]
    fn test_unparseable_baseline_statistics_echo_the_raw_stream() {
        let runner = ScriptedRunner::new(vec![(
            "1".to_string(),
            CaseExecution {
                return_code: 0,
                stdout: String::new(),
                raw_stats: "Pasim options:\n  -V\n".to_string(),
            },
        )]);
        let verifier = Verifier::new(&runner, false);
        let err = verifier.verify(&[case("1"), case("2")]).unwrap_err();
        match &err {
            VerifyError::Stats { source, .. } => assert_eq!(*source, StatsError::NoStatistics),
            other => panic!("expected stats error, got {:?}", other),
        }
        assert!(err.diagnostic().contains("Pasim options:"));
    }

    #[test]
    fn test_wrong_output_diagnostic_shows_expected_and_actual() {
        let runner = ScriptedRunner::new(vec![(
            "1".to_string(),
            CaseExecution {
                return_code: 3,
                stdout: "printed".to_string(),
                raw_stats: "raw".to_string(),
            },
        )]);
        let verifier = Verifier::new(&runner, false);
        let err = verifier
            .verify(&[
                ExecutionCase {
                    input: "1".to_string(),
                    expected_return: 2,
                },
                case("2"),
            ])
            .unwrap_err();
        let diagnostic = err.diagnostic();
        assert!(diagnostic.contains("Expected"));
        assert!(diagnostic.contains('2'));
        assert!(diagnostic.contains('3'));
        assert!(diagnostic.contains("printed"));
    }
}
