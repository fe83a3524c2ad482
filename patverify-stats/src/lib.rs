#![warn(missing_docs)]
//! PatVerify Stats - Statistics Normalization
//!
//! Turns the free-form statistics report pasim writes to its diagnostic
//! stream into a `NormalizedStats` record that can be compared across
//! executions. Everything volatile (option echoes, cache details, table
//! formatting) is discarded; only instruction fetch counts, the cycle
//! count, and per-function call counts survive, since those are exactly
//! the fields that must match for two runs to be execution-equivalent.
//!
//! The parser is the one place in the harness that knows pasim's report
//! layout. If the simulator's format changes, only this crate needs
//! updating.

mod diff;
mod normalize;

pub use diff::{render_diff, render_lines};
pub use normalize::{NormalizedStats, StatsError, parse};
