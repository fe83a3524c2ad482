//! Option Matrix
//!
//! A verification sweep compiles the same program under many combinations of
//! backend and simulator options. The combinations are declared as a tree:
//! each `Sequence` stage is an independent dimension, each `Group` lists the
//! mutually exclusive alternatives of one dimension, and each `Leaf` is one
//! concrete option contribution. Expansion walks the tree depth-first in
//! declaration order and emits the full cross product, so the configuration
//! order is stable across runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend flag marking a single-path build. Single-path configurations must
/// produce identical execution statistics for every input.
pub const SINGLE_PATH_FLAG: &str = "-mpatmos-singlepath=";

/// Backend flag enabling constant-execution-time compensation. Builds using
/// it additionally link the compensation function.
pub const CET_FLAG: &str = "-mpatmos-enable-cet";

/// One node of the option-matrix specification tree.
#[derive(Debug, Clone)]
pub enum OptionNode {
    /// A single concrete option contribution.
    Leaf {
        /// Arguments appended to the backend (llc) invocation.
        tool_arg: String,
        /// Arguments appended to the simulator (pasim) invocation.
        sim_arg: String,
    },
    /// Mutually exclusive alternatives; exactly one is chosen per path.
    Group(Vec<OptionNode>),
    /// Independent dimensions, all combined as a cross product.
    Sequence(Vec<OptionNode>),
}

impl OptionNode {
    /// Leaf contributing both backend and simulator arguments.
    pub fn pair(tool_arg: impl Into<String>, sim_arg: impl Into<String>) -> Self {
        OptionNode::Leaf {
            tool_arg: tool_arg.into(),
            sim_arg: sim_arg.into(),
        }
    }

    /// Leaf contributing backend arguments only.
    pub fn tool(tool_arg: impl Into<String>) -> Self {
        Self::pair(tool_arg, "")
    }
}

/// One fully-expanded build/run configuration.
///
/// Immutable once expansion completes; exactly one build and test cycle is
/// driven by each configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Position of this configuration in the expanded matrix. Used to build
    /// collision-free artifact names when configurations run concurrently.
    pub index: usize,
    /// Accumulated backend (llc) arguments, separated by single spaces.
    pub backend_args: String,
    /// Accumulated simulator (pasim) arguments, separated by single spaces.
    pub simulator_args: String,
}

impl Configuration {
    /// Whether this configuration builds single-path code and therefore
    /// requires statistics equivalence across execution cases.
    pub fn is_single_path(&self) -> bool {
        self.backend_args.contains(SINGLE_PATH_FLAG)
    }

    /// Whether this configuration enables constant-execution-time
    /// compensation and must link the compensation function.
    pub fn uses_cet(&self) -> bool {
        self.backend_args.contains(CET_FLAG)
    }

    /// Backend arguments split for handing to a process builder.
    pub fn backend_arg_list(&self) -> Vec<&str> {
        self.backend_args.split_whitespace().collect()
    }

    /// Simulator arguments split for handing to a process builder.
    pub fn simulator_arg_list(&self) -> Vec<&str> {
        self.simulator_args.split_whitespace().collect()
    }

    /// The configuration rendered as one line, used for filtering and for
    /// failure diagnostics.
    pub fn describe(&self) -> String {
        format!("llc: [{}] pasim: [{}]", self.backend_args, self.simulator_args)
    }
}

/// Structural errors in an option-matrix specification.
///
/// These are authoring errors: the sweep aborts before any build runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// A dimension with no alternatives would collapse the whole product to
    /// zero configurations.
    #[error("option group has no alternatives; every dimension needs at least one")]
    EmptyGroup,
}

/// Expand a specification tree into the full ordered cross product.
///
/// The result size is the product of the alternative counts of every stage
/// reachable on any path. Nested `Sequence`s are composed left-to-right as
/// additional dimensions multiplying the current path. The traversal is
/// deterministic: calling `expand` twice on the same tree yields identical
/// output.
pub fn expand(spec: &OptionNode) -> Result<Vec<Configuration>, MatrixError> {
    let mut expanded = Vec::new();
    expand_into(&[spec], "", "", &mut expanded)?;
    Ok(expanded
        .into_iter()
        .enumerate()
        .map(|(index, (backend_args, simulator_args))| Configuration {
            index,
            backend_args,
            simulator_args,
        })
        .collect())
}

/// Cross-product recursion over the frontier of remaining stages.
fn expand_into(
    pending: &[&OptionNode],
    backend: &str,
    simulator: &str,
    out: &mut Vec<(String, String)>,
) -> Result<(), MatrixError> {
    let Some((&stage, rest)) = pending.split_first() else {
        out.push((backend.to_string(), simulator.to_string()));
        return Ok(());
    };

    match stage {
        OptionNode::Leaf { tool_arg, sim_arg } => {
            // A bare leaf is a singleton group: one alternative, no choice.
            expand_into(rest, &join(backend, tool_arg), &join(simulator, sim_arg), out)
        }
        OptionNode::Sequence(stages) => {
            // Nested sequences contribute their stages before the remaining
            // frontier, preserving declaration order.
            let mut next: Vec<&OptionNode> = stages.iter().collect();
            next.extend_from_slice(rest);
            expand_into(&next, backend, simulator, out)
        }
        OptionNode::Group(alternatives) => {
            if alternatives.is_empty() {
                return Err(MatrixError::EmptyGroup);
            }
            for alternative in alternatives {
                match alternative {
                    OptionNode::Leaf { tool_arg, sim_arg } => expand_into(
                        rest,
                        &join(backend, tool_arg),
                        &join(simulator, sim_arg),
                        out,
                    )?,
                    nested => {
                        // An alternative that is itself a tree becomes the
                        // next stage of this path.
                        let mut next: Vec<&OptionNode> = vec![nested];
                        next.extend_from_slice(rest);
                        expand_into(&next, backend, simulator, out)?;
                    }
                }
            }
            Ok(())
        }
    }
}

/// Append an argument fragment, keeping single-space separation.
fn join(accumulated: &str, arg: &str) -> String {
    if arg.is_empty() {
        accumulated.to_string()
    } else if accumulated.is_empty() {
        arg.to_string()
    } else {
        format!("{} {}", accumulated, arg)
    }
}
