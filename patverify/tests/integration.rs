//! Integration tests for PatVerify
//!
//! These tests verify the end-to-end behavior of the harness pipeline:
//! matrix expansion feeding verification, statistics normalization on
//! realistic simulator reports, and the equivalence state machine over a
//! scripted runner.

use patverify::{
    expand, parse, parse_cases, CaseExecution, CaseRunner, ExecutionCase, OptionNode, RunError,
    StatsError, Verifier, VerifyError,
};
use std::cell::RefCell;

/// A realistic pasim report with configurable add-instruction fetch
/// counts and cycle count.
fn report(add_base: u64, add_bundled: u64, cycles: u64) -> String {
    format!(
        "\
Instruction Statistics:
   Pflb:    #executed  #skipped  #total  #executed  #skipped
   add          {add_base}        0       0         {add_bundled}         0
   ret          1         0       0         0         0
   all:         9         0       0         2         0

Cycles: {cycles}

Profiling information:
  function               calls
  ---------------------------------
  ---------------------------------
  <main>
     ---------------------------
     1      {cycles}   100.0%
  <foo>
     ---------------------------
     7      10   1.0%

"
    )
}

/// Runner that serves canned executions per input and counts calls.
struct ScriptedRunner {
    executions: Vec<(String, CaseExecution)>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    fn new(executions: Vec<(String, CaseExecution)>) -> Self {
        Self {
            executions,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl CaseRunner for ScriptedRunner {
    fn execute(&self, case: &ExecutionCase) -> Result<CaseExecution, RunError> {
        self.calls.borrow_mut().push(case.input.clone());
        let execution = self
            .executions
            .iter()
            .find(|(input, _)| *input == case.input)
            .map(|(_, e)| e.clone())
            .unwrap_or_else(|| panic!("no scripted execution for input '{}'", case.input));
        Ok(execution)
    }
}

fn execution(return_code: i32, raw_stats: String) -> CaseExecution {
    CaseExecution {
        return_code,
        stdout: String::new(),
        raw_stats,
    }
}

#[test]
fn test_expansion_cardinality_matches_the_product_law() {
    let spec = OptionNode::Sequence(vec![
        OptionNode::Group(vec![
            OptionNode::tool("-O2"),
            OptionNode::tool("-O1"),
            OptionNode::tool(""),
        ]),
        OptionNode::Group(vec![
            OptionNode::pair("-mpatmos-singlepath=main", "-D ideal"),
            OptionNode::tool("-mpatmos-disable-vliw=false"),
        ]),
    ]);
    let configurations = expand(&spec).unwrap();
    assert_eq!(configurations.len(), 3 * 2);

    // Determinism: a second expansion yields identical ordered output.
    assert_eq!(configurations, expand(&spec).unwrap());
}

#[test]
fn test_statistics_round_trip_on_synthetic_report() {
    let stats = parse(&report(3, 2, 120)).unwrap();
    assert_eq!(stats.instruction_counts[0], ("add".to_string(), 5));
    assert_eq!(stats.cycles, 120);
    assert_eq!(stats.call_counts[0], ("main".to_string(), 1));
    assert_eq!(stats.call_counts[1], ("foo".to_string(), 7));
}

#[test]
fn test_options_echo_is_detected_as_missing_statistics() {
    let raw = "Pasim options:\n  --help\nInstruction Statistics:\n";
    assert_eq!(parse(raw), Err(StatsError::NoStatistics));
}

#[test]
fn test_verifier_compares_each_case_against_the_baseline_only() {
    let identical = report(3, 2, 120);
    let runner = ScriptedRunner::new(vec![
        ("1".to_string(), execution(0, identical.clone())),
        ("2".to_string(), execution(0, identical.clone())),
        ("3".to_string(), execution(0, identical.clone())),
        ("4".to_string(), execution(0, identical)),
    ]);
    let cases = parse_cases(&["1=0", "2=0", "3=0", "4=0"]).unwrap();

    let verifier = Verifier::new(&runner, true);
    let outcome = verifier.verify(&cases).unwrap();

    // Transitivity shortcut: 4 cases, exactly 3 comparisons.
    assert_eq!(outcome.cases_run, 4);
    assert_eq!(outcome.comparisons, 3);
    assert_eq!(*runner.calls.borrow(), vec!["1", "2", "3", "4"]);
}

#[test]
fn test_single_path_divergence_fails_with_both_counts_in_the_diff() {
    let runner = ScriptedRunner::new(vec![
        ("1".to_string(), execution(0, report(3, 2, 120))),
        ("2".to_string(), execution(0, report(4, 2, 120))),
    ]);
    let cases = parse_cases(&["1=0", "2=0"]).unwrap();

    let verifier = Verifier::new(&runner, true);
    match verifier.verify(&cases).unwrap_err() {
        VerifyError::EquivalenceMismatch { diff, .. } => {
            assert!(diff.contains("add 5"));
            assert!(diff.contains("add 6"));
        }
        other => panic!("expected equivalence mismatch, got {:?}", other),
    }
}

#[test]
fn test_cycle_divergence_alone_fails_single_path_builds() {
    let runner = ScriptedRunner::new(vec![
        ("1".to_string(), execution(0, report(3, 2, 120))),
        ("2".to_string(), execution(0, report(3, 2, 121))),
    ]);
    let cases = parse_cases(&["1=0", "2=0"]).unwrap();

    let verifier = Verifier::new(&runner, true);
    assert!(matches!(
        verifier.verify(&cases),
        Err(VerifyError::EquivalenceMismatch { .. })
    ));
}

#[test]
fn test_traditional_builds_tolerate_diverging_statistics() {
    let runner = ScriptedRunner::new(vec![
        ("1".to_string(), execution(0, report(3, 2, 120))),
        ("2".to_string(), execution(0, report(9, 9, 999))),
    ]);
    let cases = parse_cases(&["1=0", "2=0"]).unwrap();

    let verifier = Verifier::new(&runner, false);
    let outcome = verifier.verify(&cases).unwrap();
    assert_eq!(outcome.comparisons, 0);
}

#[test]
fn test_wrong_output_aborts_before_later_cases_run() {
    let runner = ScriptedRunner::new(vec![
        ("1".to_string(), execution(0, report(3, 2, 120))),
        ("2".to_string(), execution(5, report(3, 2, 120))),
        ("3".to_string(), execution(0, report(3, 2, 120))),
    ]);
    let cases = parse_cases(&["1=0", "2=0", "3=0"]).unwrap();

    let verifier = Verifier::new(&runner, true);
    match verifier.verify(&cases).unwrap_err() {
        VerifyError::WrongOutput {
            input,
            expected,
            actual,
            ..
        } => {
            assert_eq!(input, "2");
            assert_eq!(expected, 0);
            assert_eq!(actual, 5);
        }
        other => panic!("expected wrong output, got {:?}", other),
    }
    // No partial credit: case 3 never ran.
    assert_eq!(*runner.calls.borrow(), vec!["1", "2"]);
}
