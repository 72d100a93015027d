//! Coordinator-side tree growth.
//!
//! The coordinator owns the master tree and drives a best-first expansion
//! loop: it asks every entity for noised counts, scores candidate splits
//! under a per-depth privacy budget, commits the winner, and broadcasts it
//! so the entities can partition their mirror trees. After growth it spends
//! the remaining budget voting a label at every leaf.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};
use std::sync::Arc;

use crate::config::{Algo, BudgetFn};
use crate::criterion::Criterion;
use crate::entity::Entity;
use crate::logger::{TrainingLogger, Verbosity};
use crate::split::{BranchLabel, Split};
use crate::tree::{NodeId, Tree, TreeNode};

/// Splits whose estimated information gain falls below this are not worth a
/// node of the budget.
pub const MIN_SPLIT_GAIN: f64 = 1e-2;

/// Growth parameters, fixed for one training run.
#[derive(Debug, Clone)]
pub struct TrainParams {
    /// Fraction of the total budget reserved for leaf labeling.
    pub leaf_privacy_fraction: f64,
    /// Expansion stops once this many nodes are allocated.
    pub max_num_nodes: usize,
    /// Children at this depth are labeled but never expanded.
    pub max_depth: u32,
    /// Weight pruning floor: a child whose noised weight is at most
    /// `pruning_floor / max_num_nodes` is not expanded. Unrelated to the
    /// privacy budget.
    pub pruning_floor: f64,
    /// Per-depth budget share.
    pub budget_fn: BudgetFn,
    /// Split proposal and scoring mode.
    pub algo: Algo,
    /// Training output level.
    pub verbosity: Verbosity,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            leaf_privacy_fraction: 0.5,
            max_num_nodes: 512,
            max_depth: 80,
            pruning_floor: 0.1,
            budget_fn: BudgetFn::Decay,
            algo: Algo::DistributedBaseline,
            verbosity: Verbosity::default(),
        }
    }
}

/// Result of one training run.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    /// The frozen master tree.
    pub tree: Tree,
    /// Number of allocated nodes.
    pub node_count: usize,
    /// Maximum depth observed among allocated nodes.
    pub max_depth: u32,
}

/// Frontier entry: an expandable leaf with its tentative best split.
///
/// Ordered by descending priority; ties go to the smaller node id so pop
/// order is fully deterministic.
#[derive(Debug, Clone)]
struct FrontierEntry {
    priority: f64,
    node: NodeId,
    split: Split,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// The central orchestrator of one training run.
pub struct Coordinator {
    params: TrainParams,
    /// Total number of training rows across all entities.
    train_size: usize,
    entities: Vec<Entity>,
    family: Arc<Vec<Split>>,
    criterion: Criterion,
    nodes: Vec<TreeNode>,
    logger: TrainingLogger,
}

impl Coordinator {
    pub fn new(
        params: TrainParams,
        train_size: usize,
        entities: Vec<Entity>,
        family: Arc<Vec<Split>>,
        criterion: Criterion,
    ) -> Self {
        assert!(!entities.is_empty(), "need at least one entity");
        assert!(params.max_num_nodes >= 1);
        assert!(
            params.max_depth >= 2,
            "max_depth must be at least 2, got {}",
            params.max_depth
        );
        assert!(
            (0.0..=1.0).contains(&params.leaf_privacy_fraction),
            "leaf_privacy_fraction must be in [0, 1]"
        );
        assert!(
            params.pruning_floor >= 0.0,
            "pruning_floor must be non-negative, got {}",
            params.pruning_floor
        );
        if params.algo == Algo::SingleMachine {
            assert_eq!(
                entities.len(),
                1,
                "singleMachine requires exactly one entity"
            );
        }
        let logger = TrainingLogger::new(params.verbosity);
        Self {
            params,
            train_size,
            entities,
            family,
            criterion,
            nodes: Vec::new(),
            logger,
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Whether entities draw live noise, i.e. budgets are meaningful. In
    /// the `alpha = -1` reference mode every query is answered exactly and
    /// the budget values are sentinels.
    fn noise_live(&self) -> bool {
        self.entities.iter().any(Entity::noise_enabled)
    }

    /// Normalized per-leaf share of the structure budget at a depth.
    pub fn leaf_budget(&self, depth: u32) -> f64 {
        assert!(
            depth < self.params.max_depth,
            "no budget at depth {depth}, max_depth is {}",
            self.params.max_depth
        );
        match self.params.budget_fn {
            BudgetFn::Uniform => 1.0 / self.params.max_num_nodes as f64,
            BudgetFn::Decay => 0.5f64.powi(depth as i32),
            BudgetFn::Harmonic => {
                let max_depth = f64::from(self.params.max_depth);
                let mut multiplier = 0.0;
                for i in 1..=depth {
                    multiplier += 1.0 / (max_depth - f64::from(i) + 1.0);
                }
                multiplier / max_depth
            }
        }
    }

    /// Grow and label a tree under total privacy budget `alpha`.
    ///
    /// `alpha = -1.0` is the reference mode: entities must have been built
    /// with noise disabled, and every count is exact. A coordinator drives a
    /// single training run.
    pub fn train(&mut self, alpha: f64) -> TrainOutput {
        assert!(self.nodes.is_empty(), "coordinator already trained");
        self.logger
            .start_training(self.entities.len(), self.family.len(), self.train_size);

        let splits_alpha = alpha * (1.0 - self.params.leaf_privacy_fraction);
        let mut frontier = BinaryHeap::new();

        let root = self.alloc_node(1);
        self.nodes[root as usize].weight = 1.0;
        let root_eps = splits_alpha * self.leaf_budget(1);
        let (split, gain) = self.private_split(root, self.train_size as f64, root_eps);
        match split {
            Some(split) if !gain.is_nan() && gain >= MIN_SPLIT_GAIN => {
                frontier.push(FrontierEntry {
                    priority: gain,
                    node: root,
                    split,
                });
            }
            Some(_) => self.logger.log_low_gain(root, gain),
            None => self.logger.log_no_split(root),
        }

        while self.nodes.len() < self.params.max_num_nodes {
            let Some(FrontierEntry {
                priority,
                node,
                split,
            }) = frontier.pop()
            else {
                break;
            };

            // Commit the expansion.
            let depth = self.nodes[node as usize].depth;
            assert!(self.nodes[node as usize].is_leaf);
            self.logger.log_expansion(
                node,
                depth,
                self.nodes[node as usize].weight,
                priority,
                &split,
            );
            self.nodes[node as usize].is_leaf = false;

            // Broadcast so every mirror tree partitions the same way.
            for entity in &mut self.entities {
                entity.split_leaf_with_fn(node, &split);
            }

            // Allocate a child per branch label even when it will not be
            // expanded; the partition invariant needs the complete keyset.
            for &branch in split.branch_labels() {
                let child = self.alloc_node(depth + 1);
                self.nodes[node as usize].children.push((branch, child));
                self.evaluate_child(child, splits_alpha, &mut frontier);
            }
            self.nodes[node as usize].split = Some(split);
        }

        let label_alpha = alpha * self.params.leaf_privacy_fraction;
        let max_depth = self.label_leaves(label_alpha);

        let nodes = std::mem::take(&mut self.nodes);
        let output = TrainOutput {
            node_count: nodes.len(),
            max_depth,
            tree: Tree::from_nodes(nodes),
        };
        self.logger
            .finish_training(output.node_count, output.max_depth);
        output
    }

    /// Weigh a freshly allocated child and, if it clears the pruning floor
    /// and the gain gate, push it onto the frontier.
    fn evaluate_child(
        &mut self,
        child: NodeId,
        splits_alpha: f64,
        frontier: &mut BinaryHeap<FrontierEntry>,
    ) {
        let depth = self.nodes[child as usize].depth;
        if depth >= self.params.max_depth {
            // Internal nodes stop at max_depth - 1; this child can only be
            // labeled.
            return;
        }

        let child_eps = splits_alpha * self.leaf_budget(depth);
        if self.noise_live() && child_eps <= 0.0 {
            // No structure budget at this depth; the child can only be
            // labeled.
            self.logger.log_no_split(child);
            return;
        }
        let total = self.total_count_across(child, child_eps / 3.0);
        let weight = total / self.train_size as f64;
        debug_assert!(weight <= 1.0 + 1e-9);
        self.nodes[child as usize].weight = weight;

        let floor = self.params.pruning_floor / self.params.max_num_nodes as f64;
        if weight <= floor {
            self.logger.log_pruned(child, weight, floor);
            return;
        }

        let (split, gain) = self.private_split(child, total, 2.0 * child_eps / 3.0);
        let Some(split) = split else {
            self.logger.log_no_split(child);
            return;
        };
        if gain.is_nan() || gain < MIN_SPLIT_GAIN {
            self.logger.log_low_gain(child, gain);
            return;
        }
        frontier.push(FrontierEntry {
            priority: weight * gain,
            node: child,
            split,
        });
    }

    /// Vote a label at every leaf, breadth-first, spending `label_alpha`
    /// once per leaf (leaves are disjoint, so the charges compose in
    /// parallel). With no labeling budget (`leaf_privacy_fraction = 0`
    /// under live noise) no vote is held and leaves keep `label = None`.
    /// Returns the maximum depth observed.
    fn label_leaves(&mut self, label_alpha: f64) -> u32 {
        let vote = !(self.noise_live() && label_alpha <= 0.0);
        let mut max_depth = 1;
        let mut queue = VecDeque::from([0 as NodeId]);
        while let Some(id) = queue.pop_front() {
            max_depth = max_depth.max(self.nodes[id as usize].depth);

            if self.nodes[id as usize].children.is_empty() {
                assert!(self.nodes[id as usize].is_leaf);
                if vote {
                    let counts = self.label_counts_across(id, label_alpha);

                    // Argmax; ties go to the smallest label id.
                    let mut best = None;
                    let mut max_count = 0.0;
                    for (label, &count) in counts.iter().enumerate() {
                        if count > max_count {
                            max_count = count;
                            best = Some(label as u32);
                        }
                    }
                    self.nodes[id as usize].label = best;
                }
            }

            for &(_, child) in &self.nodes[id as usize].children {
                queue.push_back(child);
            }
        }
        max_depth
    }

    fn alloc_node(&mut self, depth: u32) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(TreeNode::new(id, depth));
        id
    }

    // ========================================================================
    // Private split selection
    // ========================================================================

    /// Select a split for a node under budget `eps`, reporting its estimated
    /// information gain. `(None, NaN)` means the node is not worth
    /// expanding; a run with no structure budget at all
    /// (`leaf_privacy_fraction = 1`) declines every node this way.
    fn private_split(&mut self, node: NodeId, total: f64, eps: f64) -> (Option<Split>, f64) {
        if self.noise_live() && eps <= 0.0 {
            return (None, f64::NAN);
        }
        match self.params.algo {
            Algo::SingleMachine => self.entities[0].local_rnm(node, eps),
            Algo::LocalRnm => {
                // Half the budget builds the pool from per-entity winners,
                // the other half scores it across entities.
                let mut pool = Vec::new();
                for entity in &mut self.entities {
                    let (split, gain) = entity.local_rnm(node, eps / 2.0);
                    match split {
                        Some(split) => pool.push(split),
                        None => debug_assert!(gain.is_nan()),
                    }
                }
                self.score_candidates(node, total, eps / 2.0, &pool)
            }
            Algo::DistributedBaseline => {
                let family = Arc::clone(&self.family);
                self.score_candidates(node, total, eps, &family)
            }
        }
    }

    /// Score candidates across entities: `eps / 3k` per candidate for each
    /// of the two count queries, `eps / 3` for the parent histogram.
    fn score_candidates(
        &mut self,
        node: NodeId,
        total: f64,
        eps: f64,
        candidates: &[Split],
    ) -> (Option<Split>, f64) {
        if candidates.is_empty() {
            return (None, f64::NAN);
        }
        let each_eps = eps / (3.0 * candidates.len() as f64);

        let mut best = None;
        let mut min_cond_g = f64::INFINITY;
        for candidate in candidates {
            let split_label_counts = self.split_label_counts_across(node, candidate, each_eps);
            let split_counts = self.split_counts_across(node, candidate, each_eps);

            let mut cond_g = 0.0;
            for (branch, hist) in &split_label_counts {
                let branch_count = split_counts
                    .get(branch)
                    .copied()
                    .expect("branch missing from split counts");
                cond_g += branch_count / total * self.criterion.g(hist);
            }
            assert!(!cond_g.is_nan(), "conditional impurity is NaN");

            if cond_g < min_cond_g {
                min_cond_g = cond_g;
                best = Some(candidate.clone());
            }
        }

        let parent_counts = self.label_counts_across(node, eps / 3.0);
        let info_gain = self.criterion.g(&parent_counts) - min_cond_g;
        (best, info_gain)
    }

    // ========================================================================
    // Cross-entity aggregation
    // ========================================================================
    //
    // Entities are queried in index order and sums are accumulated in that
    // order; per-entity noise draws advance entity RNG state, so the order
    // is part of the run's determinism contract.

    fn total_count_across(&mut self, node: NodeId, eps: f64) -> f64 {
        self.entities
            .iter_mut()
            .map(|entity| entity.get_total_count(node, eps))
            .sum()
    }

    fn label_counts_across(&mut self, node: NodeId, eps: f64) -> Vec<f64> {
        let mut counts = vec![0.0; self.criterion.num_labels() as usize];
        for entity in &mut self.entities {
            for (label, count) in entity.get_label_counts(node, eps).into_iter().enumerate() {
                counts[label] += count;
            }
        }
        counts
    }

    fn split_counts_across(
        &mut self,
        node: NodeId,
        split: &Split,
        eps: f64,
    ) -> BTreeMap<BranchLabel, f64> {
        let mut counts: BTreeMap<BranchLabel, f64> = BTreeMap::new();
        for entity in &mut self.entities {
            for (branch, count) in entity.get_split_counts(node, split, eps) {
                *counts.entry(branch).or_insert(0.0) += count;
            }
        }
        counts
    }

    fn split_label_counts_across(
        &mut self,
        node: NodeId,
        split: &Split,
        eps: f64,
    ) -> BTreeMap<BranchLabel, Vec<f64>> {
        let num_labels = self.criterion.num_labels() as usize;
        let mut counts: BTreeMap<BranchLabel, Vec<f64>> = BTreeMap::new();
        for entity in &mut self.entities {
            for (branch, hist) in entity.get_split_label_counts(node, split, eps) {
                let acc = counts
                    .entry(branch)
                    .or_insert_with(|| vec![0.0; num_labels]);
                for (label, count) in hist.into_iter().enumerate() {
                    acc[label] += count;
                }
            }
        }
        counts
    }
}
