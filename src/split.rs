//! Splitting functions and candidate-pool construction.
//!
//! A split maps a feature vector to a branch label from a small fixed
//! vocabulary (binary for every supplied family). Candidate pools are built
//! once per run by [`FamilyBuilder`], which owns the id allocator: ids are
//! dense, assigned in construction order, and scoped to the builder so
//! concurrent runs never interfere.

use crate::config::ConfigError;

/// Identifier of a split within one training run.
pub type SplitId = u32;

/// Branch label emitted by a split.
pub type BranchLabel = u32;

/// Branch vocabulary shared by both split kinds.
const BINARY_BRANCHES: [BranchLabel; 2] = [0, 1];

/// The closed set of split predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitKind {
    /// Branch 1 iff the mean of the selected attributes is at most
    /// `threshold`.
    Threshold { attrs: Vec<u32>, threshold: f32 },
    /// Branch 1 iff `mean(ys) <= slope * mean(xs) + intercept`.
    Oblique {
        xs: Vec<u32>,
        ys: Vec<u32>,
        slope: f32,
        intercept: f32,
    },
}

/// An immutable splitting function with a run-scoped id.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    id: SplitId,
    kind: SplitKind,
}

impl Split {
    pub fn id(&self) -> SplitId {
        self.id
    }

    pub fn kind(&self) -> &SplitKind {
        &self.kind
    }

    /// Ordered branch vocabulary of this split.
    pub fn branch_labels(&self) -> &'static [BranchLabel] {
        &BINARY_BRANCHES
    }

    /// Route a feature vector to a branch label.
    #[inline]
    pub fn apply(&self, row: &[f32]) -> BranchLabel {
        match &self.kind {
            SplitKind::Threshold { attrs, threshold } => {
                let sum: f32 = attrs.iter().map(|&a| row[a as usize]).sum();
                // Compare the sum against threshold * |attrs| rather than
                // dividing per row.
                u32::from(sum <= threshold * attrs.len() as f32)
            }
            SplitKind::Oblique {
                xs,
                ys,
                slope,
                intercept,
            } => {
                let x: f32 = xs.iter().map(|&a| row[a as usize]).sum::<f32>() / xs.len() as f32;
                let y: f32 = ys.iter().map(|&a| row[a as usize]).sum::<f32>() / ys.len() as f32;
                u32::from(y <= slope * x + intercept)
            }
        }
    }

    /// Human-readable description, for logging.
    pub fn describe(&self) -> String {
        match &self.kind {
            SplitKind::Threshold { attrs, threshold } => {
                format!("mean{attrs:?} <= {threshold}")
            }
            SplitKind::Oblique {
                xs,
                ys,
                slope,
                intercept,
            } => format!("mean{ys:?} <= {slope} * mean{xs:?} + {intercept}"),
        }
    }
}

// ============================================================================
// FamilyBuilder
// ============================================================================

/// Builds a candidate split pool for one training run.
///
/// Output length and order are fully determined by the sequence of builder
/// calls, so the same geometry always yields the same pool with the same ids.
#[derive(Debug, Default)]
pub struct FamilyBuilder {
    splits: Vec<Split>,
}

impl FamilyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: SplitKind) {
        let id = self.splits.len() as SplitId;
        self.splits.push(Split { id, kind });
    }

    /// A single threshold split over the mean of `attrs`.
    pub fn threshold(&mut self, attrs: &[u32], threshold: f32) -> &mut Self {
        assert!(!attrs.is_empty());
        self.push(SplitKind::Threshold {
            attrs: attrs.to_vec(),
            threshold,
        });
        self
    }

    /// `count` evenly spaced thresholds over a continuous range. The i-th
    /// threshold sits at `(i + 0.5) * (high - low) / count`; only the step
    /// size depends on the range bounds.
    pub fn thresholds(&mut self, attrs: &[u32], low: f32, high: f32, count: u32) -> &mut Self {
        let step = (high - low) / count as f32;
        for i in 0..count {
            self.threshold(attrs, (i as f32 + 0.5) * step);
        }
        self
    }

    /// One `<= 0.5` threshold per attribute, for one-hot encoded columns.
    pub fn one_hot(&mut self, attrs: std::ops::Range<u32>) -> &mut Self {
        for attr in attrs {
            self.threshold(&[attr], 0.5);
        }
        self
    }

    /// An oblique split comparing two attribute-group means.
    pub fn oblique(&mut self, xs: &[u32], ys: &[u32], slope: f32, intercept: f32) -> &mut Self {
        assert!(!xs.is_empty() && !ys.is_empty());
        self.push(SplitKind::Oblique {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            slope,
            intercept,
        });
        self
    }

    /// Block-average thresholds for a `width x height` image laid out one
    /// pixel per attribute. Each `block_w x block_h` block receives `count`
    /// thresholds evenly spread over pixel range `[0, 255]`.
    pub fn image_blocks(
        &mut self,
        width: u32,
        height: u32,
        block_w: u32,
        block_h: u32,
        count: u32,
    ) -> &mut Self {
        assert!(width % block_w == 0, "block width must divide image width");
        assert!(height % block_h == 0, "block height must divide image height");
        for block_row in 0..height / block_h {
            for block_col in 0..width / block_w {
                let mut attrs = Vec::with_capacity((block_w * block_h) as usize);
                for inner_row in 0..block_h {
                    for inner_col in 0..block_w {
                        let row = block_row * block_h + inner_row;
                        let col = block_col * block_w + inner_col;
                        attrs.push(col * width + row);
                    }
                }
                self.thresholds(&attrs, 0.0, 255.0, count);
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    pub fn build(self) -> Vec<Split> {
        self.splits
    }
}

// ============================================================================
// Preset families
// ============================================================================

/// Candidate pool for a named dataset geometry.
///
/// Continuous feature ranges and one-hot index ranges follow the published
/// preprocessing for each dataset.
pub fn preset_family(dataset: &str) -> Result<Vec<Split>, ConfigError> {
    let mut builder = FamilyBuilder::new();
    match dataset {
        "mnist60k" | "mnist100k" => {
            builder.image_blocks(28, 28, 4, 4, 3);
        }
        "adult" => {
            // Six continuous features first, then one-hot encodings.
            builder
                .thresholds(&[0], 18.0, 80.0, 10)
                .thresholds(&[1], 0.0, 800_000.0, 10)
                .thresholds(&[2], 1.0, 16.0, 10)
                .thresholds(&[3], 0.0, 20_000.0, 10)
                .thresholds(&[4], 0.0, 25_000.0, 10)
                .thresholds(&[5], 0.0, 100.0, 10)
                .one_hot(6..108);
        }
        "nursery" => {
            builder.one_hot(0..27);
        }
        "bank" => {
            builder
                .thresholds(&[0], 18.0, 95.0, 10)
                .thresholds(&[1], -8019.0, 102_127.0, 10)
                .thresholds(&[2], 1.0, 31.0, 10)
                .thresholds(&[3], 0.0, 4918.0, 10)
                .thresholds(&[4], 1.0, 63.0, 10)
                .thresholds(&[5], 0.0, 871.0, 10)
                // pdays = -1 encodes "not previously contacted".
                .threshold(&[5], -0.5)
                .thresholds(&[6], 0.0, 275.0, 10)
                .one_hot(7..51);
        }
        "skin" => {
            builder
                .thresholds(&[0], 0.0, 255.0, 32)
                .thresholds(&[1], 0.0, 255.0, 32)
                .thresholds(&[2], 0.0, 255.0, 32);
        }
        other => return Err(ConfigError::UnknownDataset(other.to_string())),
    }
    Ok(builder.build())
}
