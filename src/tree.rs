//! The master decision tree and its evaluator.
//!
//! Nodes live in an arena addressed by dense integer id; parent-to-child
//! edges are `(branch label, child id)` pairs. The same ids index the mirror
//! trees held by every entity.

use crate::data::Dataset;
use crate::split::{BranchLabel, Split};

/// Type alias for tree node indices.
pub type NodeId = u32;

/// A single coordinator-owned tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Stable id, assigned in allocation order.
    pub id: NodeId,
    /// Depth in the tree; the root has depth 1.
    pub depth: u32,
    /// Noised fraction of training rows reaching this node.
    pub weight: f64,
    /// Whether the node is (still) a leaf.
    pub is_leaf: bool,
    /// Predicted class, set for leaves during labeling. `None` when the
    /// label vote saw no mass at all.
    pub label: Option<u32>,
    /// Split function, present iff the node is not a leaf.
    pub split: Option<Split>,
    /// Branch-label to child-id edges, in branch vocabulary order.
    pub children: Vec<(BranchLabel, NodeId)>,
}

impl TreeNode {
    pub(crate) fn new(id: NodeId, depth: u32) -> Self {
        Self {
            id,
            depth,
            weight: 0.0,
            is_leaf: true,
            label: None,
            split: None,
            children: Vec::new(),
        }
    }

    /// Child id for a branch label, if present.
    pub fn child(&self, branch: BranchLabel) -> Option<NodeId> {
        self.children
            .iter()
            .find(|(b, _)| *b == branch)
            .map(|(_, id)| *id)
    }
}

/// Structural defects reported by [`Tree::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidTree {
    #[error("node {index} has id {id}, ids must be dense")]
    IdMismatch { index: usize, id: NodeId },

    #[error("non-leaf node {0} has no split function")]
    MissingSplit(NodeId),

    #[error("node {node} child branches {got:?} do not match split vocabulary {expected:?}")]
    BranchMismatch {
        node: NodeId,
        got: Vec<BranchLabel>,
        expected: Vec<BranchLabel>,
    },

    #[error("node {node} references out-of-range child {child}")]
    DanglingChild { node: NodeId, child: NodeId },

    #[error("node {node} has depth {got}, expected {expected}")]
    DepthMismatch { node: NodeId, got: u32, expected: u32 },

    #[error("leaf node {0} has children")]
    LeafWithChildren(NodeId),

    #[error("node {0} is reachable through more than one parent")]
    SharedChild(NodeId),
}

/// A trained decision tree, frozen after growth.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub(crate) fn from_nodes(nodes: Vec<TreeNode>) -> Self {
        debug_assert!(!nodes.is_empty());
        Self { nodes }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id as usize]
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Walk the tree and return the predicted class for a feature vector.
    pub fn predict(&self, row: &[f32]) -> Option<u32> {
        let mut node = self.root();
        while !node.is_leaf {
            let split = node
                .split
                .as_ref()
                .expect("non-leaf node without split function");
            match node.child(split.apply(row)) {
                Some(child) => node = self.node(child),
                None => break,
            }
        }
        node.label
    }

    /// Check the structural invariants: dense ids, child vocabularies equal
    /// to split vocabularies, child depths, and single-parent reachability.
    pub fn validate(&self) -> Result<(), InvalidTree> {
        let mut seen = vec![false; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id as usize != index {
                return Err(InvalidTree::IdMismatch { index, id: node.id });
            }
            if node.is_leaf {
                if !node.children.is_empty() {
                    return Err(InvalidTree::LeafWithChildren(node.id));
                }
                continue;
            }
            let split = node
                .split
                .as_ref()
                .ok_or(InvalidTree::MissingSplit(node.id))?;
            let got: Vec<BranchLabel> = node.children.iter().map(|(b, _)| *b).collect();
            if got != split.branch_labels() {
                return Err(InvalidTree::BranchMismatch {
                    node: node.id,
                    got,
                    expected: split.branch_labels().to_vec(),
                });
            }
            for &(_, child) in &node.children {
                let Some(child_node) = self.nodes.get(child as usize) else {
                    return Err(InvalidTree::DanglingChild {
                        node: node.id,
                        child,
                    });
                };
                if child_node.depth != node.depth + 1 {
                    return Err(InvalidTree::DepthMismatch {
                        node: child,
                        got: child_node.depth,
                        expected: node.depth + 1,
                    });
                }
                if seen[child as usize] {
                    return Err(InvalidTree::SharedChild(child));
                }
                seen[child as usize] = true;
            }
        }
        Ok(())
    }
}

/// Fraction of rows in `data` the tree classifies correctly.
///
/// Rows that reach an unlabeled node count as incorrect.
pub fn accuracy(tree: &Tree, data: &Dataset) -> f64 {
    if data.n_rows() == 0 {
        return 0.0;
    }
    let correct = (0..data.n_rows())
        .filter(|&i| tree.predict(data.row(i)) == Some(data.label(i)))
        .count();
    correct as f64 / data.n_rows() as f64
}
