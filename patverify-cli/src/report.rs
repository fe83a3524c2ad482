//! Sweep Report
//!
//! Machine-readable record of one sweep, written as prettified JSON when
//! the caller passes `--report <path>`. Captures the toolchain that ran,
//! a UTC timestamp, every configuration's verdict, and the pass/fail
//! tallies.

use crate::sweep::{ConfigOutcome, ConfigStatus};
use crate::toolchain::Toolchain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete sweep report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Report provenance.
    pub meta: ReportMeta,
    /// Every configuration's verdict, in matrix order.
    pub configurations: Vec<ConfigOutcome>,
    /// Pass/fail tallies.
    pub summary: SweepSummary,
}

/// Report provenance metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Harness version.
    pub version: String,
    /// Report generation time.
    pub timestamp: DateTime<Utc>,
    /// Backend compiler that built the artifacts.
    pub llc: PathBuf,
    /// Simulator that executed them.
    pub pasim: PathBuf,
}

/// Pass/fail tallies of one sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Configurations in the expanded matrix that ran.
    pub total: usize,
    /// Configurations that passed every case.
    pub passed: usize,
    /// Configurations that failed.
    pub failed: usize,
    /// Configurations excluded by the filter.
    pub skipped: usize,
}

/// Assemble a report from one sweep's outcomes.
pub fn build_report(toolchain: &Toolchain, outcomes: &[ConfigOutcome]) -> SweepReport {
    let mut summary = SweepSummary {
        total: outcomes.len(),
        ..SweepSummary::default()
    };
    for outcome in outcomes {
        match outcome.status {
            ConfigStatus::Passed { .. } => summary.passed += 1,
            ConfigStatus::Failed { .. } => summary.failed += 1,
            ConfigStatus::Skipped => summary.skipped += 1,
        }
    }

    SweepReport {
        meta: ReportMeta {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            llc: toolchain.llc.clone(),
            pasim: toolchain.pasim.clone(),
        },
        configurations: outcomes.to_vec(),
        summary,
    }
}

/// Serialize a report as prettified JSON.
pub fn generate_json_report(report: &SweepReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
