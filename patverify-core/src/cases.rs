//! Execution Cases
//!
//! An execution case pairs a program input with the exit status the
//! simulated program is expected to return. Cases arrive on the command
//! line as `<input>=<expected return code>` strings; the first declared
//! case is the baseline every other case is compared against.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// One input/expected-output pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionCase {
    /// Input value, linked into the executable as the `input` symbol.
    pub input: String,
    /// Exit status the simulated program must return.
    pub expected_return: i32,
}

/// Errors from malformed execution-case strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaseParseError {
    /// The string contains no `=` separator.
    #[error("execution case '{0}' is missing the '=' separator")]
    MissingSeparator(String),
    /// The right-hand side is not an integer.
    #[error("execution case '{raw}' has a non-integer expected return code '{value}'")]
    BadReturnCode {
        /// The full case string.
        raw: String,
        /// The unparseable right-hand side.
        value: String,
    },
}

impl FromStr for ExecutionCase {
    type Err = CaseParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // Split on the first '=' only; the input value may not contain one,
        // but the expected-return side is always the trailing field.
        let (input, expected) = raw
            .split_once('=')
            .ok_or_else(|| CaseParseError::MissingSeparator(raw.to_string()))?;
        let expected_return =
            expected
                .parse::<i32>()
                .map_err(|_| CaseParseError::BadReturnCode {
                    raw: raw.to_string(),
                    value: expected.to_string(),
                })?;
        Ok(ExecutionCase {
            input: input.to_string(),
            expected_return,
        })
    }
}

/// Parse an ordered list of case strings. Order is preserved; the first
/// element is the baseline.
pub fn parse_cases<S: AsRef<str>>(raw: &[S]) -> Result<Vec<ExecutionCase>, CaseParseError> {
    raw.iter().map(|s| s.as_ref().parse()).collect()
}
