//! Statistics Parsing
//!
//! Line-oriented scan over the raw pasim statistics text. The report has
//! three sections the harness cares about, in this order:
//!
//! ```text
//! Instruction Statistics:
//!    Pflb:    #executed    ...   #executed    ...      <- table header
//!    add          3        0  0      2        0        <- per-mnemonic rows
//!    all:       ...                                    <- table footer
//! ...
//! Cycles: 120
//! ...
//! Profiling information:
//!    <three table header lines>
//!    <main>
//!       (separator row)
//!       7   ...                                        <- call count
//! ```
//!
//! Per-mnemonic fetch counts appear in two columns (fields 1 and 4). Both
//! count real executions of the instruction, so they are summed into a
//! single total; the harness treats the distinction between the two
//! columns as opaque.

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical, comparison-ready statistics of one simulated execution.
///
/// Both count tables keep first-appearance order so renderings diff
/// line-for-line against a reference, while equality is order-insensitive
/// map equality plus an exact cycle count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedStats {
    /// Fetch count per instruction mnemonic, in order of first appearance.
    pub instruction_counts: Vec<(String, u64)>,
    /// Total execution cycles.
    pub cycles: u64,
    /// Invocation count per function, in order of first appearance.
    pub call_counts: Vec<(String, u64)>,
}

impl PartialEq for NormalizedStats {
    fn eq(&self, other: &Self) -> bool {
        self.cycles == other.cycles
            && as_map(&self.instruction_counts) == as_map(&other.instruction_counts)
            && as_map(&self.call_counts) == as_map(&other.call_counts)
    }
}

impl Eq for NormalizedStats {}

fn as_map(pairs: &[(String, u64)]) -> FxHashMap<&str, u64> {
    pairs.iter().map(|(name, count)| (name.as_str(), *count)).collect()
}

/// Errors from statistics normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// The statistics section never appears. pasim echoes its option help
    /// (or an error message) instead of a report when it never reached
    /// execution, so the caller should surface the raw stream verbatim.
    #[error("no pasim statistics in simulator output")]
    NoStatistics,
    /// The report ends before the named section is complete.
    #[error("statistics report truncated inside the {section} section")]
    Truncated {
        /// Section being scanned when input ran out.
        section: &'static str,
    },
    /// A table row does not match the expected field layout.
    #[error("malformed statistics line '{line}': {reason}")]
    Malformed {
        /// The offending line.
        line: String,
        /// What was expected of it.
        reason: String,
    },
}

/// Parse raw pasim diagnostic output into `NormalizedStats`.
pub fn parse(raw: &str) -> Result<NormalizedStats, StatsError> {
    let mut cursor = Cursor::new(raw);

    // Find the instruction table. "Pasim options:" first means the
    // simulator bailed before executing anything.
    loop {
        let line = cursor.next_line().ok_or(StatsError::NoStatistics)?;
        let trimmed = line.trim();
        if trimmed == "Instruction Statistics:" {
            break;
        }
        if trimmed == "Pasim options:" {
            return Err(StatsError::NoStatistics);
        }
    }
    // One table-header row follows the section header.
    cursor.next_line();

    let mut instruction_counts = Vec::new();
    loop {
        let line = cursor.next_line().ok_or(StatsError::Truncated {
            section: "instruction statistics",
        })?;
        if line.trim().starts_with("all:") {
            break;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(StatsError::Malformed {
                line: line.to_string(),
                reason: "expected at least 5 whitespace-separated fields".to_string(),
            });
        }
        let count = parse_count(line, fields[1])? + parse_count(line, fields[4])?;
        instruction_counts.push((fields[0].to_string(), count));
    }

    let cycles = loop {
        let line = cursor.next_line().ok_or(StatsError::Truncated {
            section: "cycle count",
        })?;
        if line.trim().starts_with("Cycles:") {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let value = fields.get(1).ok_or_else(|| StatsError::Malformed {
                line: line.to_string(),
                reason: "expected a count after the 'Cycles:' label".to_string(),
            })?;
            break parse_count(line, value)?;
        }
    };

    loop {
        let line = cursor.next_line().ok_or(StatsError::Truncated {
            section: "profiling information",
        })?;
        if line.trim() == "Profiling information:" {
            break;
        }
    }
    // Three table-header rows follow the section header.
    for _ in 0..3 {
        cursor.next_line();
    }

    let mut call_counts = Vec::new();
    while let Some(line) = cursor.next_line() {
        let trimmed = line.trim();
        if !trimmed.starts_with('<') {
            // Anything else means the profiling block has ended.
            break;
        }
        let name = trimmed[1..]
            .split('>')
            .next()
            .unwrap_or("")
            .to_string();
        // One structural separator row sits between the label and counts.
        cursor.next_line();
        let counts_line = cursor.next_line().ok_or(StatsError::Truncated {
            section: "profiling information",
        })?;
        let first = counts_line
            .split_whitespace()
            .next()
            .ok_or_else(|| StatsError::Malformed {
                line: counts_line.to_string(),
                reason: "expected a call count".to_string(),
            })?;
        call_counts.push((name, parse_count(counts_line, first)?));
    }

    Ok(NormalizedStats {
        instruction_counts,
        cycles,
        call_counts,
    })
}

fn parse_count(line: &str, field: &str) -> Result<u64, StatsError> {
    field.parse::<u64>().map_err(|_| StatsError::Malformed {
        line: line.to_string(),
        reason: format!("'{}' is not a non-negative count", field),
    })
}

struct Cursor<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> Cursor<'a> {
    fn new(raw: &'a str) -> Self {
        Self { lines: raw.lines() }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        self.lines.next()
    }
}
