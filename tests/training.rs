//! End-to-end training scenarios and invariants.
//!
//! Focused on behavior: fixed seeds, noise off unless a scenario says
//! otherwise, and assertions on tree shape, accuracy, determinism, and
//! privacy-budget composition.

use privtree::coordinator::TrainParams;
use privtree::run::{build_coordinator, train};
use privtree::{accuracy, Algo, BudgetFn, CriterionKind, Dataset, FamilyBuilder, Split, Verbosity};

// ============================================================================
// Fixtures
// ============================================================================

/// Four rows on a line, labels split at the midpoint.
fn line_dataset() -> Dataset {
    Dataset::new(vec![0.0, 1.0, 2.0, 3.0], vec![0, 0, 1, 1], 1, 2).unwrap()
}

/// Thresholds 0.5, 1.5, 2.5, 3.5 over the single feature.
fn line_family() -> Vec<Split> {
    let mut b = FamilyBuilder::new();
    b.thresholds(&[0], 0.0, 4.0, 4);
    b.build()
}

/// 256 rows in four clusters forming XOR: label = (x > 0.5) ^ (y > 0.5).
///
/// Axis-aligned thresholds carry no signal at the root, but thresholds over
/// the two-feature mean peel off the corner clusters.
fn xor_dataset() -> Dataset {
    let centers: [(f32, f32, u32); 4] = [
        (0.25, 0.25, 0),
        (0.25, 0.75, 1),
        (0.75, 0.25, 1),
        (0.75, 0.75, 0),
    ];
    let mut features = Vec::with_capacity(512);
    let mut labels = Vec::with_capacity(256);
    for i in 0..64u32 {
        for &(cx, cy, label) in &centers {
            // Deterministic jitter in [-0.05, 0.045]; clusters stay apart.
            let dx = ((i * 13) % 17) as f32 / 170.0 - 0.05;
            let dy = ((i * 7) % 19) as f32 / 190.0 - 0.05;
            features.push(cx + dx);
            features.push(cy + dy);
            labels.push(label);
        }
    }
    Dataset::new(features, labels, 2, 2).unwrap()
}

fn xor_family() -> Vec<Split> {
    let mut b = FamilyBuilder::new();
    b.thresholds(&[0], 0.0, 1.0, 5)
        .thresholds(&[1], 0.0, 1.0, 5)
        .thresholds(&[0, 1], 0.0, 1.0, 4);
    b.build()
}

fn params(algo: Algo, max_num_nodes: usize, max_depth: u32) -> TrainParams {
    TrainParams {
        leaf_privacy_fraction: 0.5,
        max_num_nodes,
        max_depth,
        pruning_floor: 0.1,
        budget_fn: BudgetFn::Uniform,
        algo,
        verbosity: Verbosity::Silent,
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn s1_single_machine_separates_line_dataset() {
    let data = line_dataset();
    let output = train(
        &data,
        line_family(),
        CriterionKind::Entropy,
        params(Algo::SingleMachine, 3, 2),
        1,
        1,
        -1.0,
    );

    assert_eq!(output.max_depth, 2);
    assert_eq!(output.node_count, 3);
    output.tree.validate().unwrap();
    assert_eq!(accuracy(&output.tree, &data), 1.0);
}

#[test]
fn s2_distributed_baseline_matches_single_machine() {
    let data = line_dataset();

    let single = train(
        &data,
        line_family(),
        CriterionKind::Entropy,
        params(Algo::SingleMachine, 3, 2),
        1,
        1,
        -1.0,
    );
    // Two entities holding [[0],[1]] and [[2],[3]].
    let distributed = train(
        &data,
        line_family(),
        CriterionKind::Entropy,
        params(Algo::DistributedBaseline, 3, 2),
        2,
        1,
        -1.0,
    );

    assert_eq!(distributed.node_count, single.node_count);
    assert_eq!(distributed.max_depth, single.max_depth);
    assert_eq!(distributed.tree, single.tree);
    assert_eq!(accuracy(&distributed.tree, &data), 1.0);
}

#[test]
fn s3_noised_run_is_reproducible_bitwise() {
    let data = line_dataset();
    let run_once = || {
        train(
            &data,
            line_family(),
            CriterionKind::Entropy,
            params(Algo::SingleMachine, 3, 2),
            1,
            7,
            64.0,
        )
    };

    let first = run_once();
    let second = run_once();

    first.tree.validate().unwrap();
    assert_eq!(first.node_count, second.node_count);
    assert_eq!(first.max_depth, second.max_depth);
    assert_eq!(first.tree, second.tree);
}

#[test]
fn s4_xor_dataset_reaches_full_accuracy() {
    let data = xor_dataset();
    let output = train(
        &data,
        xor_family(),
        CriterionKind::Entropy,
        params(Algo::SingleMachine, 15, 4),
        1,
        1,
        -1.0,
    );

    output.tree.validate().unwrap();
    assert!(
        accuracy(&output.tree, &data) >= 0.99,
        "train accuracy {} below 0.99",
        accuracy(&output.tree, &data)
    );
}

#[test]
fn s5_constant_label_dataset_yields_single_leaf() {
    let data = Dataset::new(vec![0.0, 1.0, 2.0, 3.0], vec![1, 1, 1, 1], 1, 2).unwrap();
    let output = train(
        &data,
        line_family(),
        CriterionKind::Entropy,
        params(Algo::DistributedBaseline, 16, 4),
        2,
        1,
        -1.0,
    );

    assert_eq!(output.node_count, 1);
    assert_eq!(output.max_depth, 1);
    assert!(output.tree.root().is_leaf);
    assert_eq!(output.tree.root().label, Some(1));
}

#[test]
fn s6_single_node_budget_votes_majority_across_entities() {
    // Entity shards [[0],[1]] -> labels [0, 0] and [[2],[3]] -> [0, 1]:
    // the summed vote is 3:1 for label 0.
    let data = Dataset::new(vec![0.0, 1.0, 2.0, 3.0], vec![0, 0, 0, 1], 1, 2).unwrap();
    let output = train(
        &data,
        line_family(),
        CriterionKind::Entropy,
        params(Algo::DistributedBaseline, 1, 4),
        2,
        1,
        -1.0,
    );

    assert_eq!(output.node_count, 1);
    assert!(output.tree.root().is_leaf);
    assert_eq!(output.tree.root().label, Some(0));
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn gini_criterion_also_separates_line_dataset() {
    let data = line_dataset();
    let output = train(
        &data,
        line_family(),
        CriterionKind::Gini,
        params(Algo::SingleMachine, 3, 2),
        1,
        1,
        -1.0,
    );

    assert_eq!(accuracy(&output.tree, &data), 1.0);
}

#[test]
fn local_rnm_mode_learns_xor_across_entities() {
    let data = xor_dataset();
    let output = train(
        &data,
        xor_family(),
        CriterionKind::Entropy,
        params(Algo::LocalRnm, 15, 4),
        2,
        1,
        -1.0,
    );

    output.tree.validate().unwrap();
    assert!(accuracy(&output.tree, &data) >= 0.99);
}

#[test]
fn local_rnm_noised_run_is_reproducible() {
    let data = xor_dataset();
    let run_once = || {
        train(
            &data,
            xor_family(),
            CriterionKind::Entropy,
            params(Algo::LocalRnm, 15, 4),
            2,
            11,
            64.0,
        )
    };

    assert_eq!(run_once().tree, run_once().tree);
}

#[test]
fn noise_off_mode_is_bit_stable_across_runs() {
    let data = xor_dataset();
    let run_once = || {
        train(
            &data,
            xor_family(),
            CriterionKind::Entropy,
            params(Algo::DistributedBaseline, 15, 4),
            2,
            5,
            -1.0,
        )
    };

    assert_eq!(run_once().tree, run_once().tree);
}

#[test]
fn mirror_trees_share_dense_ids_with_coordinator() {
    let data = xor_dataset();
    let mut coordinator = build_coordinator(
        &data,
        xor_family(),
        CriterionKind::Entropy,
        params(Algo::DistributedBaseline, 15, 4),
        3,
        9,
        8.0,
    );
    let output = coordinator.train(8.0);

    output.tree.validate().unwrap();
    for entity in coordinator.entities() {
        assert_eq!(entity.n_nodes(), output.node_count);
        for node in output.tree.nodes() {
            assert_eq!(entity.node_children(node.id), &node.children[..]);
        }
    }
}

#[test]
fn mirror_children_partition_parent_rows() {
    let data = xor_dataset();
    let mut coordinator = build_coordinator(
        &data,
        xor_family(),
        CriterionKind::Entropy,
        params(Algo::DistributedBaseline, 15, 4),
        2,
        3,
        16.0,
    );
    let output = coordinator.train(16.0);

    for entity in coordinator.entities() {
        for node in output.tree.nodes() {
            if node.children.is_empty() {
                continue;
            }
            let mut child_rows: Vec<u32> = node
                .children
                .iter()
                .flat_map(|&(_, child)| entity.node_rows(child).iter().copied())
                .collect();
            child_rows.sort_unstable();

            let mut parent_rows: Vec<u32> = entity.node_rows(node.id).to_vec();
            parent_rows.sort_unstable();

            assert_eq!(child_rows, parent_rows, "node {} at entity", node.id);
        }
    }
}

#[test]
fn composed_privacy_spend_stays_within_alpha() {
    let alpha = 64.0;
    let data = xor_dataset();
    for budget_fn in [BudgetFn::Uniform, BudgetFn::Decay, BudgetFn::Harmonic] {
        let mut train_params = params(Algo::DistributedBaseline, 15, 4);
        train_params.budget_fn = budget_fn;

        let mut coordinator = build_coordinator(
            &data,
            xor_family(),
            CriterionKind::Entropy,
            train_params,
            2,
            7,
            alpha,
        );
        coordinator.train(alpha);

        for entity in coordinator.entities() {
            let spent = entity.composed_privacy_spend();
            assert!(spent > 0.0, "{budget_fn}: no budget recorded");
            assert!(
                spent <= alpha + 1e-6,
                "{budget_fn}: composed spend {spent} exceeds alpha {alpha}"
            );
        }
    }
}

#[test]
fn high_pruning_floor_stops_expansion_after_root() {
    let data = xor_dataset();
    let mut train_params = params(Algo::SingleMachine, 15, 4);
    // Floor of 12.0 / 15 nodes = 0.8: no child weight can clear it.
    train_params.pruning_floor = 12.0;

    let output = train(
        &data,
        xor_family(),
        CriterionKind::Entropy,
        train_params,
        1,
        1,
        -1.0,
    );

    // The root expands once; both children are pruned and only labeled.
    assert_eq!(output.node_count, 3);
    assert_eq!(output.max_depth, 2);
    for node in output.tree.nodes().iter().skip(1) {
        assert!(node.is_leaf);
        assert!(node.label.is_some());
    }
}

#[test]
fn leaf_privacy_fraction_boundaries_train_without_panicking() {
    // Both endpoints of the [0, 1] interval are legal: 1.0 spends the
    // whole budget on labeling (no growth), 0.0 spends it all on growth
    // (no labeling vote).
    let data = xor_dataset();
    for fraction in [0.0, 1.0] {
        let mut train_params = params(Algo::DistributedBaseline, 15, 4);
        train_params.leaf_privacy_fraction = fraction;

        let output = train(
            &data,
            xor_family(),
            CriterionKind::Entropy,
            train_params,
            2,
            7,
            64.0,
        );
        output.tree.validate().unwrap();
        if fraction == 1.0 {
            assert_eq!(output.node_count, 1);
            assert!(output.tree.root().label.is_some());
        }
    }
}

#[test]
fn noised_training_still_produces_valid_trees() {
    let data = xor_dataset();
    for alpha in [0.5, 4.0, 64.0, 512.0] {
        let output = train(
            &data,
            xor_family(),
            CriterionKind::Entropy,
            params(Algo::DistributedBaseline, 15, 4),
            2,
            13,
            alpha,
        );

        output.tree.validate().unwrap();
        assert!(output.node_count >= 1);
        assert!(output.max_depth <= 4);
    }
}
