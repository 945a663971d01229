//! Retrograde fixed-point solver.
//!
//! Every value starts unresolved (zero). Pass 0 assigns each terminal node
//! the fastest possible loss; pass n resolves nodes whose fate became forced
//! through children resolved on pass n-1. Passes repeat until one resolves
//! nothing. Nodes still at zero after convergence are positions from which
//! perfect play never terminates: draws by endless repetition, and zero is
//! their final value.

use queah_core::{Value, MAX_VALUE};
use thiserror::Error;

use crate::graph::{Graph, NodeId};
use crate::stats::SolveStats;

/// A node whose value disagrees with the converged fixed point.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("terminal node {0} is not valued as an immediate loss")]
    Terminal(NodeId),
    #[error("node {0} disagrees with its children")]
    Children(NodeId),
}

/// Run the solver to its fixed point.
pub fn solve(graph: &mut Graph) -> SolveStats {
    let mut stats = SolveStats::new(graph.len());

    let resolved = pass0(graph);
    stats.record_pass(resolved);
    if resolved > 0 {
        // Keep iterating until a pass stops making progress.
        let mut pass = 1;
        loop {
            let resolved = pass_n(graph, pass);
            if resolved == 0 {
                break;
            }
            stats.record_pass(resolved);
            pass += 1;
        }
    }
    stats
}

/// Re-check the converged fixed point. A failure indicates a solver or rules
/// bug and the table built from this graph cannot be trusted.
pub fn verify(graph: &Graph) -> Result<(), ConsistencyError> {
    for id in 0..graph.len() as NodeId {
        let node = graph.node(id);
        if node.is_terminal() {
            if node.value() != -MAX_VALUE {
                return Err(ConsistencyError::Terminal(id));
            }
            continue;
        }

        let min_child = graph.min_child_value(id) as i32;
        let consistent = match node.value() as i32 {
            // A draw may not leave a forced finite outcome on the table.
            0 => min_child == 0,
            value if value > 0 => min_child == -value - 1,
            value => min_child == -value + 1,
        };
        if !consistent {
            return Err(ConsistencyError::Children(id));
        }
    }
    Ok(())
}

// Assign values to all terminal nodes. A terminal node means the attacker
// has no moves and has lost, so the value is always the fastest loss.
fn pass0(graph: &mut Graph) -> usize {
    let mut updated = 0;
    for id in 0..graph.len() as NodeId {
        if graph.node(id).is_terminal() {
            graph.node_mut(id).set_value(-MAX_VALUE);
            updated += 1;
        }
    }
    updated
}

// Assign values to nodes whose outcome became forced on the previous pass.
fn pass_n(graph: &mut Graph, pass: i32) -> usize {
    // Largest magnitude assigned on the previous pass. Running out of range
    // means the value encoding cannot cover the game length; that is a
    // configuration error, not a condition to wrap around silently.
    let prev_max = MAX_VALUE as i32 - (pass - 1);
    assert!(
        prev_max > 1,
        "outcome value range exhausted after {pass} passes"
    );

    let mut updated = 0;
    for id in 0..graph.len() as NodeId {
        if graph.node(id).value() != 0 {
            continue;
        }
        let min_child = graph.min_child_value(id) as i32;
        if min_child == prev_max {
            // Every reply hands the opponent a fast win; the attacker cannot
            // avoid losing, one ply slower than the fastest child win.
            graph.node_mut(id).set_value(narrowed(-min_child + 1));
            updated += 1;
        } else if min_child == -prev_max {
            // Some reply is a fast loss for the opponent; the attacker wins
            // by playing it, one ply slower than the child.
            graph.node_mut(id).set_value(narrowed(-min_child - 1));
            updated += 1;
        }
    }
    updated
}

// Narrow back to the stored value width, failing loudly on overflow.
fn narrowed(value: i32) -> Value {
    Value::try_from(value).expect("outcome value overflows its encoding")
}
