//! Entity-side query engine.
//!
//! An entity holds a disjoint shard of rows and never discloses them.
//! It mirrors the coordinator's tree (same dense node ids, but storing row
//! index sets instead of split metadata) and answers bucketed-count queries
//! with calibrated Laplace noise. Every answered query charges its privacy
//! budget against the queried node in the entity's ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::criterion::Criterion;
use crate::noise::{NoiseSource, PrivacyLedger};
use crate::split::{BranchLabel, Split};
use crate::tree::NodeId;

/// Shard validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShardError {
    #[error("feature buffer holds {got} values, expected {rows} rows x {cols} cols = {expected}")]
    FeatureLenMismatch {
        got: usize,
        rows: usize,
        cols: usize,
        expected: usize,
    },

    #[error("number of columns must be positive")]
    NoColumns,
}

/// One entity's read-only slice of the training data.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    features: Vec<f32>,
    labels: Vec<u32>,
    num_cols: usize,
}

impl Shard {
    pub fn new(features: Vec<f32>, labels: Vec<u32>, num_cols: usize) -> Result<Self, ShardError> {
        if num_cols == 0 {
            return Err(ShardError::NoColumns);
        }
        let expected = labels.len() * num_cols;
        if features.len() != expected {
            return Err(ShardError::FeatureLenMismatch {
                got: features.len(),
                rows: labels.len(),
                cols: num_cols,
                expected,
            });
        }
        Ok(Self {
            features,
            labels,
            num_cols,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.features[i * self.num_cols..(i + 1) * self.num_cols]
    }

    pub fn label(&self, i: usize) -> u32 {
        self.labels[i]
    }
}

/// Entity-owned shadow of one coordinator node.
#[derive(Debug, Clone)]
struct MirrorNode {
    is_leaf: bool,
    /// Indices into the shard routed to this node. Children partition the
    /// parent's set; parents keep theirs.
    rows: Vec<u32>,
    children: Vec<(BranchLabel, NodeId)>,
}

impl MirrorNode {
    fn new() -> Self {
        Self {
            is_leaf: true,
            rows: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// A data-holding party answering the coordinator's noised count queries.
pub struct Entity {
    index: usize,
    shard: Shard,
    noise: NoiseSource,
    ledger: PrivacyLedger,
    nodes: Vec<MirrorNode>,
    family: Arc<Vec<Split>>,
    criterion: Criterion,
}

impl Entity {
    /// Create an entity over its shard. The noise RNG is seeded
    /// `index + run_seed`; `noise_enabled = false` is the reference mode.
    pub fn new(
        index: usize,
        run_seed: u64,
        noise_enabled: bool,
        shard: Shard,
        family: Arc<Vec<Split>>,
        criterion: Criterion,
    ) -> Self {
        let mut root = MirrorNode::new();
        root.rows = (0..shard.n_rows() as u32).collect();
        Self {
            index,
            shard,
            noise: NoiseSource::new(index as u64 + run_seed, noise_enabled),
            ledger: PrivacyLedger::new(),
            nodes: vec![root],
            family,
            criterion,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this entity draws live noise (budgets are meaningful).
    pub fn noise_enabled(&self) -> bool {
        self.noise.is_enabled()
    }

    pub fn shard_size(&self) -> usize {
        self.shard.n_rows()
    }

    /// Number of mirror nodes; always equals the coordinator's node count.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Row indices currently routed to a node.
    pub fn node_rows(&self, id: NodeId) -> &[u32] {
        &self.nodes[id as usize].rows
    }

    /// Child edges of a node, in branch vocabulary order.
    pub fn node_children(&self, id: NodeId) -> &[(BranchLabel, NodeId)] {
        &self.nodes[id as usize].children
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id as usize].is_leaf
    }

    /// Per-node privacy ledger for this entity.
    pub fn ledger(&self) -> &PrivacyLedger {
        &self.ledger
    }

    /// Budget consumed by any single record: the maximum over root-to-leaf
    /// paths of the per-node charges along the path.
    pub fn composed_privacy_spend(&self) -> f64 {
        self.path_spend(0)
    }

    fn path_spend(&self, id: NodeId) -> f64 {
        let node = &self.nodes[id as usize];
        let below = node
            .children
            .iter()
            .map(|&(_, child)| self.path_spend(child))
            .fold(0.0, f64::max);
        self.ledger.node_spend(id) + below
    }

    /// A query with no usable budget is declined: nothing is charged and
    /// nothing is disclosed. Only meaningful while noise is live; the
    /// reference mode answers every query exactly regardless of budget.
    fn declined(&self, eps: f64) -> bool {
        self.noise.is_enabled() && eps <= 0.0
    }

    /// Record a query's budget against a node.
    fn charge(&mut self, id: NodeId, eps: f64) {
        if self.noise.is_enabled() {
            assert!(
                eps.is_finite() && eps > 0.0,
                "query budget must be positive and finite, got {eps}"
            );
            self.ledger.charge(id, eps);
        }
    }

    // ========================================================================
    // Tree mirroring
    // ========================================================================

    /// Split a mirror leaf with the coordinator's chosen function.
    ///
    /// Allocates one child per branch label (dense ids, matching the
    /// coordinator's allocation order) and routes every row index of the
    /// node to the child its branch selects.
    pub fn split_leaf_with_fn(&mut self, id: NodeId, split: &Split) {
        let node = &self.nodes[id as usize];
        assert!(node.is_leaf, "node {id} is already split");
        assert!(node.children.is_empty());

        let mut children = Vec::with_capacity(split.branch_labels().len());
        for &branch in split.branch_labels() {
            let child = self.nodes.len() as NodeId;
            self.nodes.push(MirrorNode::new());
            children.push((branch, child));
        }

        // Route rows without cloning the parent's index list.
        let rows = std::mem::take(&mut self.nodes[id as usize].rows);
        for &idx in &rows {
            let branch = split.apply(self.shard.row(idx as usize));
            let &(_, child) = children
                .iter()
                .find(|(b, _)| *b == branch)
                .expect("split emitted a branch outside its vocabulary");
            self.nodes[child as usize].rows.push(idx);
        }

        let node = &mut self.nodes[id as usize];
        node.rows = rows;
        node.children = children;
        node.is_leaf = false;
    }

    // ========================================================================
    // Noised count queries
    // ========================================================================

    /// Noised per-branch row counts at a node, clipped to `[1, shard_size]`.
    /// Declined (empty) when no budget is available.
    pub fn get_split_counts(
        &mut self,
        id: NodeId,
        split: &Split,
        eps: f64,
    ) -> BTreeMap<BranchLabel, f64> {
        if self.declined(eps) {
            return BTreeMap::new();
        }
        self.charge(id, eps);
        let scale = 1.0 / eps;
        let counts = self.true_split_counts(id, split);

        let mut noised = BTreeMap::new();
        for (branch, count) in counts {
            let value = count as f64 + self.noise.laplace(scale);
            noised.insert(branch, self.clip_count(value));
        }
        noised
    }

    /// Noised (branch, label) cell counts at a node. Each observed cell is
    /// noised independently and clipped to `[1, shard_size]`; cells with no
    /// rows stay exactly zero. Declined (empty) when no budget is
    /// available.
    pub fn get_split_label_counts(
        &mut self,
        id: NodeId,
        split: &Split,
        eps: f64,
    ) -> BTreeMap<BranchLabel, Vec<f64>> {
        if self.declined(eps) {
            return BTreeMap::new();
        }
        self.charge(id, eps);
        let scale = 1.0 / eps;
        let counts = self.true_split_label_counts(id, split);

        let mut noised = BTreeMap::new();
        for (branch, hist) in counts {
            let mut out = vec![0.0; hist.len()];
            for (label, &count) in hist.iter().enumerate() {
                if count > 0 {
                    let value = count as f64 + self.noise.laplace(scale);
                    out[label] = self.clip_count(value);
                }
            }
            noised.insert(branch, out);
        }
        noised
    }

    /// Noised label histogram at a node; observed labels clipped to
    /// `[1, shard_size]`, unobserved labels exactly zero. Declined
    /// (all-zero) when no budget is available.
    pub fn get_label_counts(&mut self, id: NodeId, eps: f64) -> Vec<f64> {
        if self.declined(eps) {
            return vec![0.0; self.criterion.num_labels() as usize];
        }
        self.charge(id, eps);
        let scale = 1.0 / eps;
        let counts = self.true_label_counts(id);

        let mut noised = vec![0.0; counts.len()];
        for (label, &count) in counts.iter().enumerate() {
            if count > 0 {
                let value = count as f64 + self.noise.laplace(scale);
                noised[label] = self.clip_count(value);
            }
        }
        noised
    }

    /// Noised row count at a node, clipped to `[0, shard_size]`. Declined
    /// (zero) when no budget is available.
    pub fn get_total_count(&mut self, id: NodeId, eps: f64) -> f64 {
        if self.declined(eps) {
            return 0.0;
        }
        self.charge(id, eps);
        let total = self.nodes[id as usize].rows.len() as f64;
        let value = total + self.noise.laplace(1.0 / eps);
        value.clamp(0.0, self.shard.n_rows() as f64)
    }

    /// Report-noisy-max over the entity's own candidate pool and shard.
    ///
    /// Scores every candidate's conditional impurity from true counts, adds
    /// one `Laplace(sensitivity / eps)` draw per candidate, and returns the
    /// argmin together with its noised information gain. An empty node,
    /// empty pool, or declined budget yields `(None, NaN)`.
    pub fn local_rnm(&mut self, id: NodeId, eps: f64) -> (Option<Split>, f64) {
        if self.declined(eps) || self.nodes[id as usize].rows.is_empty() {
            return (None, f64::NAN);
        }
        self.charge(id, eps);

        let label_counts: Vec<f64> = self
            .true_label_counts(id)
            .iter()
            .map(|&c| c as f64)
            .collect();
        let orig_g = self.criterion.g(&label_counts);

        let total = self.nodes[id as usize].rows.len();
        let scale = self.criterion.sensitivity(total) / eps;

        let family = Arc::clone(&self.family);
        let mut best: Option<Split> = None;
        let mut min_cond_g = f64::INFINITY;
        for split in family.iter() {
            let split_label_counts = self.true_split_label_counts(id, split);
            let split_counts = self.true_split_counts(id, split);

            let mut cond_g = 0.0;
            for (branch, hist) in &split_label_counts {
                let hist: Vec<f64> = hist.iter().map(|&c| c as f64).collect();
                cond_g += split_counts[branch] as f64 / total as f64 * self.criterion.g(&hist);
            }

            // Noised score is clipped to stay a valid impurity.
            let noised = (cond_g + self.noise.laplace(scale)).max(0.0);
            if noised < min_cond_g {
                min_cond_g = noised;
                best = Some(split.clone());
            }
        }

        match best {
            Some(split) => (Some(split), orig_g - min_cond_g),
            None => (None, f64::NAN),
        }
    }

    // ========================================================================
    // True counts
    // ========================================================================

    fn clip_count(&self, value: f64) -> f64 {
        value.clamp(1.0, self.shard.n_rows() as f64)
    }

    fn true_split_counts(&self, id: NodeId, split: &Split) -> BTreeMap<BranchLabel, u32> {
        let mut counts = BTreeMap::new();
        for &idx in &self.nodes[id as usize].rows {
            let branch = split.apply(self.shard.row(idx as usize));
            *counts.entry(branch).or_insert(0) += 1;
        }
        counts
    }

    fn true_split_label_counts(
        &self,
        id: NodeId,
        split: &Split,
    ) -> BTreeMap<BranchLabel, Vec<u32>> {
        let num_labels = self.criterion.num_labels() as usize;
        let mut counts: BTreeMap<BranchLabel, Vec<u32>> = BTreeMap::new();
        for &idx in &self.nodes[id as usize].rows {
            let branch = split.apply(self.shard.row(idx as usize));
            let hist = counts.entry(branch).or_insert_with(|| vec![0; num_labels]);
            hist[self.shard.label(idx as usize) as usize] += 1;
        }
        counts
    }

    fn true_label_counts(&self, id: NodeId) -> Vec<u32> {
        let mut counts = vec![0; self.criterion.num_labels() as usize];
        for &idx in &self.nodes[id as usize].rows {
            counts[self.shard.label(idx as usize) as usize] += 1;
        }
        counts
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("index", &self.index)
            .field("shard_size", &self.shard.n_rows())
            .field("n_nodes", &self.nodes.len())
            .finish()
    }
}
