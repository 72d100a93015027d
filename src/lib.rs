//! privtree: differentially private decision trees over partitioned data.
//!
//! Trains a decision tree classifier over rows sharded across multiple
//! non-colluding entities, under a global (ε, 0) privacy budget. Entities
//! never disclose raw rows; a central coordinator grows the tree from
//! noised count queries answered by each entity's mirror of the tree.
//!
//! # Key Types
//!
//! - [`Coordinator`] / [`TrainParams`] - Budget allocation and best-first growth
//! - [`Entity`] - Shard holder answering Laplace-noised count queries
//! - [`Split`] / [`FamilyBuilder`] - Candidate split pools
//! - [`Criterion`] - Entropy or Gini impurity with sensitivity bounds
//! - [`Tree`] - The trained tree, with a walk-based evaluator
//! - [`Dataset`] - Data loading, shuffling, and sharding
//!
//! # Training
//!
//! Build a [`RunConfig`] and call [`run::run`] for the file-based harness
//! path, or assemble a coordinator directly with [`run::build_coordinator`]
//! for in-memory datasets. `alpha = -1.0` disables noise entirely and is
//! the reference mode for validating the non-private algorithm.

pub mod config;
pub mod coordinator;
pub mod criterion;
pub mod data;
pub mod entity;
pub mod logger;
pub mod noise;
pub mod report;
pub mod run;
pub mod split;
pub mod testing;
pub mod tree;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use config::{Algo, BudgetFn, ConfigError};
pub use coordinator::{Coordinator, TrainOutput, TrainParams, MIN_SPLIT_GAIN};
pub use criterion::{Criterion, CriterionKind};
pub use data::{DataError, Dataset};
pub use entity::{Entity, Shard};
pub use logger::{TrainingLogger, Verbosity};
pub use noise::{NoiseSource, PrivacyLedger};
pub use run::{RunConfig, RunError, RunSummary};
pub use split::{BranchLabel, FamilyBuilder, Split, SplitId, SplitKind};
pub use tree::{accuracy, NodeId, Tree, TreeNode};
