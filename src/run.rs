//! In-process training entry point.
//!
//! Wires a loaded dataset, a candidate family, entities, and a coordinator
//! into one training run, mirroring the experiment harness interface: one
//! call per configuration, returning accuracies, timings, and tree shape.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Algo, BudgetFn, ConfigError};
use crate::coordinator::{Coordinator, TrainOutput, TrainParams};
use crate::criterion::{Criterion, CriterionKind};
use crate::data::{io::load_training, Dataset, ReadError};
use crate::entity::Entity;
use crate::logger::Verbosity;
use crate::split::{preset_family, Split};
use crate::tree::accuracy;

/// Tolerance for the `alpha = -1` noise-off sentinel.
const NOISE_OFF_TOLERANCE: f64 = 1e-6;

/// One experiment configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Dataset name; selects the preset split family and the file names.
    pub dataset: String,
    /// Directory holding `<dataset>_train` and `<dataset>_test` files.
    pub data_dir: PathBuf,
    /// Fraction of the training file to keep after shuffling.
    pub train_fraction: f64,
    /// Number of entities the training rows are sharded across. Forced to
    /// one shard under `singleMachine`.
    pub num_entities: usize,
    /// Run seed; drives shuffling and every entity's noise stream.
    pub seed: u64,
    pub criterion: CriterionKind,
    pub leaf_privacy_fraction: f64,
    pub max_num_nodes: usize,
    pub max_depth: u32,
    /// Weight pruning floor (not a privacy parameter).
    pub pruning_floor: f64,
    /// Total privacy budget; `-1.0` disables noise.
    pub alpha: f64,
    pub budget_fn: BudgetFn,
    pub algo: Algo,
    pub verbosity: Verbosity,
}

impl RunConfig {
    /// Fail-fast parameter validation, before any data is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0 < self.train_fraction && self.train_fraction <= 1.0) {
            return Err(ConfigError::FractionOutOfRange {
                name: "train_fraction",
                value: self.train_fraction,
            });
        }
        if !(0.0..=1.0).contains(&self.leaf_privacy_fraction) {
            return Err(ConfigError::FractionOutOfRange {
                name: "leaf_privacy_fraction",
                value: self.leaf_privacy_fraction,
            });
        }
        if self.num_entities < 1 {
            return Err(ConfigError::TooSmall {
                name: "num_entities",
                min: 1,
                got: self.num_entities,
            });
        }
        if self.max_num_nodes < 1 {
            return Err(ConfigError::TooSmall {
                name: "max_num_nodes",
                min: 1,
                got: self.max_num_nodes,
            });
        }
        if self.max_depth < 2 {
            return Err(ConfigError::TooSmall {
                name: "max_depth",
                min: 2,
                got: self.max_depth as usize,
            });
        }
        if self.pruning_floor.is_nan() || self.pruning_floor < 0.0 {
            return Err(ConfigError::NegativePruningFloor(self.pruning_floor));
        }
        let alpha_ok = noise_disabled(self.alpha) || self.alpha > 0.0;
        if !alpha_ok {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        Ok(())
    }

    fn train_params(&self) -> TrainParams {
        TrainParams {
            leaf_privacy_fraction: self.leaf_privacy_fraction,
            max_num_nodes: self.max_num_nodes,
            max_depth: self.max_depth,
            pruning_floor: self.pruning_floor,
            budget_fn: self.budget_fn,
            algo: self.algo,
            verbosity: self.verbosity,
        }
    }
}

/// Metrics of one completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub train_acc: f64,
    pub test_acc: f64,
    pub training_time: Duration,
    pub evaluation_time: Duration,
    pub node_count: usize,
    pub max_depth: u32,
}

/// Errors surfaced by [`run`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load dataset: {0}")]
    Data(#[from] ReadError),
}

/// Whether `alpha` selects the noise-off reference mode.
pub fn noise_disabled(alpha: f64) -> bool {
    (alpha + 1.0).abs() < NOISE_OFF_TOLERANCE
}

/// Shard a dataset and assemble the coordinator for one run.
///
/// Under `singleMachine` the whole dataset forms one shard; otherwise rows
/// are split evenly with the remainder going to the last entity.
pub fn build_coordinator(
    train_data: &Dataset,
    family: Vec<Split>,
    criterion_kind: CriterionKind,
    params: TrainParams,
    num_entities: usize,
    seed: u64,
    alpha: f64,
) -> Coordinator {
    let criterion = Criterion::new(criterion_kind, train_data.num_labels());
    let family = Arc::new(family);

    let sizes = match params.algo {
        Algo::SingleMachine => vec![train_data.n_rows()],
        Algo::LocalRnm | Algo::DistributedBaseline => {
            Dataset::even_partition_sizes(train_data.n_rows(), num_entities)
        }
    };

    let noise_enabled = !noise_disabled(alpha);
    let entities: Vec<Entity> = train_data
        .partition(&sizes)
        .into_iter()
        .enumerate()
        .map(|(index, shard)| {
            Entity::new(
                index,
                seed,
                noise_enabled,
                shard,
                Arc::clone(&family),
                criterion,
            )
        })
        .collect();

    Coordinator::new(params, train_data.n_rows(), entities, family, criterion)
}

/// Train one tree on an in-memory dataset.
pub fn train(
    train_data: &Dataset,
    family: Vec<Split>,
    criterion_kind: CriterionKind,
    params: TrainParams,
    num_entities: usize,
    seed: u64,
    alpha: f64,
) -> TrainOutput {
    let mut coordinator = build_coordinator(
        train_data,
        family,
        criterion_kind,
        params,
        num_entities,
        seed,
        alpha,
    );
    coordinator.train(alpha)
}

/// Execute one full configuration: load, train, evaluate.
pub fn run(config: &RunConfig) -> Result<RunSummary, RunError> {
    config.validate()?;
    let family = preset_family(&config.dataset)?;

    let train_path = config.data_dir.join(format!("{}_train", config.dataset));
    let test_path = config.data_dir.join(format!("{}_test", config.dataset));
    let train_data = load_training(&train_path, config.seed, config.train_fraction)?;
    let test_data = Dataset::read_from(&test_path)?;

    let started = Instant::now();
    let output = train(
        &train_data,
        family,
        config.criterion,
        config.train_params(),
        config.num_entities,
        config.seed,
        config.alpha,
    );
    let training_time = started.elapsed();

    let started = Instant::now();
    let train_acc = accuracy(&output.tree, &train_data);
    let test_acc = accuracy(&output.tree, &test_data);
    let evaluation_time = started.elapsed();

    Ok(RunSummary {
        train_acc,
        test_acc,
        training_time,
        evaluation_time,
        node_count: output.node_count,
        max_depth: output.max_depth,
    })
}
