//! Structured logging for training runs.

use crate::split::Split;
use crate::tree::NodeId;

/// Verbosity level for training output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// No output.
    #[default]
    Silent,
    /// Run-level summary lines.
    Info,
    /// Per-node expansion and pruning decisions.
    Debug,
}

/// Logger used by the coordinator during a training run.
///
/// Writes to stderr; the result sink stays machine-readable.
#[derive(Debug, Clone, Copy)]
pub struct TrainingLogger {
    verbosity: Verbosity,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn start_training(&self, num_entities: usize, family_size: usize, train_size: usize) {
        if self.verbosity >= Verbosity::Info {
            eprintln!(
                "training: {num_entities} entities, {family_size} candidate splits, \
                 {train_size} records"
            );
        }
    }

    pub fn log_expansion(
        &self,
        node: NodeId,
        depth: u32,
        weight: f64,
        priority: f64,
        split: &Split,
    ) {
        if self.verbosity >= Verbosity::Debug {
            eprintln!(
                "expand node {node}: depth {depth}, weight {weight:.4}, priority {priority:.4}, \
                 split {} ({})",
                split.id(),
                split.describe()
            );
        }
    }

    pub fn log_pruned(&self, node: NodeId, weight: f64, floor: f64) {
        if self.verbosity >= Verbosity::Debug {
            eprintln!("prune node {node}: weight {weight:.5} below floor {floor:.5}");
        }
    }

    pub fn log_low_gain(&self, node: NodeId, gain: f64) {
        if self.verbosity >= Verbosity::Debug {
            eprintln!("skip node {node}: info gain {gain:.5} too small");
        }
    }

    pub fn log_no_split(&self, node: NodeId) {
        if self.verbosity >= Verbosity::Debug {
            eprintln!("skip node {node}: no candidate split");
        }
    }

    pub fn finish_training(&self, node_count: usize, max_depth: u32) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("training done: {node_count} nodes, max depth {max_depth}");
        }
    }
}
