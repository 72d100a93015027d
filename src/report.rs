//! Delimited result sink.
//!
//! Appends one row per completed configuration to a CSV file, writing the
//! header when the file is first created. Columns mirror the training entry
//! point's inputs plus the run metrics.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::run::{RunConfig, RunSummary};

const HEADER: &str = "dataset,train_fraction,num_entities,seed,criterion,\
                      leaf_privacy_fraction,max_num_nodes,max_depth,pruning_floor,alpha,\
                      budget_fn,algo,train_acc,test_acc,training_secs,evaluation_secs,\
                      num_nodes,max_achieved_depth";

/// Append one result row, creating the file (with header) if needed.
pub fn append_summary(
    path: impl AsRef<Path>,
    config: &RunConfig,
    summary: &RunSummary,
) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

    if file.metadata()?.len() == 0 {
        writeln!(file, "{HEADER}")?;
    }

    writeln!(
        file,
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{:.3},{:.3},{},{}",
        config.dataset,
        config.train_fraction,
        config.num_entities,
        config.seed,
        config.criterion,
        config.leaf_privacy_fraction,
        config.max_num_nodes,
        config.max_depth,
        config.pruning_floor,
        config.alpha,
        config.budget_fn,
        config.algo,
        summary.train_acc,
        summary.test_acc,
        summary.training_time.as_secs_f64(),
        summary.evaluation_time.as_secs_f64(),
        summary.node_count,
        summary.max_depth,
    )
}
