//! Structural Diff Rendering
//!
//! When a single-path build produces diverging statistics, the mismatch
//! diagnostic shows both executions rendered as line sequences with the
//! differing lines marked. Rendering follows the cleaned report format:
//! one `<mnemonic> <count>` line per instruction, a `Cycles:` line, and
//! one `<function>(): <count>` line per profiled function.

use crate::normalize::NormalizedStats;

/// Render normalized statistics as comparable lines, in insertion order.
pub fn render_lines(stats: &NormalizedStats) -> Vec<String> {
    let mut lines = Vec::with_capacity(stats.instruction_counts.len() + stats.call_counts.len() + 1);
    for (mnemonic, count) in &stats.instruction_counts {
        lines.push(format!("{} {}", mnemonic, count));
    }
    lines.push(format!("Cycles: {}", stats.cycles));
    for (function, count) in &stats.call_counts {
        lines.push(format!("{}(): {}", function, count));
    }
    lines
}

/// Render a line diff between the baseline execution and a diverging one.
///
/// Matching lines are shown with two leading spaces, baseline-only lines
/// with `- `, and diverging-run lines with `+ `. Both sides of every
/// differing pair appear in the output.
pub fn render_diff(baseline: &NormalizedStats, other: &NormalizedStats) -> String {
    let baseline_lines = render_lines(baseline);
    let other_lines = render_lines(other);

    let mut out = String::new();
    out.push_str("--- baseline execution\n");
    out.push_str("+++ diverging execution\n");

    let common = baseline_lines.len().min(other_lines.len());
    for i in 0..common {
        if baseline_lines[i] == other_lines[i] {
            out.push_str("  ");
            out.push_str(&baseline_lines[i]);
            out.push('\n');
        } else {
            out.push_str("- ");
            out.push_str(&baseline_lines[i]);
            out.push('\n');
            out.push_str("+ ");
            out.push_str(&other_lines[i]);
            out.push('\n');
        }
    }
    for line in &baseline_lines[common..] {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
    for line in &other_lines[common..] {
        out.push_str("+ ");
        out.push_str(line);
        out.push('\n');
    }
    out
}
