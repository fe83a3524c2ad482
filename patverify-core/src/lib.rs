#![warn(missing_docs)]
//! PatVerify Core - Option Matrix and Execution Cases
//!
//! This crate provides the pure data model of the verification harness:
//! - `OptionNode` trees describing the backend/simulator option matrix
//! - `expand` for turning a tree into the full cross-product of
//!   concrete `Configuration`s
//! - `ExecutionCase` parsing for `<input>=<expected return code>` strings

mod cases;
mod matrix;

pub use cases::{CaseParseError, ExecutionCase, parse_cases};
pub use matrix::{Configuration, MatrixError, OptionNode, expand};
