//! Impurity criteria for split scoring.
//!
//! A criterion maps a label histogram to an impurity in `[0, 1]` and bounds
//! how much that impurity can move when a single record is added or removed
//! (the sensitivity used to calibrate report-noisy-max).

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Which impurity measure to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionKind {
    /// Normalized Shannon entropy: `-sum p_i log p_i / log L`.
    Entropy,
    /// Gini impurity: `1 - sum p_i^2`.
    Gini,
}

impl FromStr for CriterionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entropy" => Ok(Self::Entropy),
            "gini" => Ok(Self::Gini),
            other => Err(ConfigError::UnknownCriterion(other.to_string())),
        }
    }
}

impl fmt::Display for CriterionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entropy => f.write_str("entropy"),
            Self::Gini => f.write_str("gini"),
        }
    }
}

/// Impurity criterion bound to a label cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion {
    kind: CriterionKind,
    num_labels: u32,
}

impl Criterion {
    /// `num_labels` is the label cardinality `L`; entropy is normalized by
    /// `ln L` so the uniform distribution scores exactly 1.
    pub fn new(kind: CriterionKind, num_labels: u32) -> Self {
        assert!(num_labels >= 2, "need at least two labels, got {num_labels}");
        Self { kind, num_labels }
    }

    pub fn kind(&self) -> CriterionKind {
        self.kind
    }

    pub fn num_labels(&self) -> u32 {
        self.num_labels
    }

    /// Impurity of a dense label histogram. Zero-weight cells are skipped
    /// (`0 * log 0 = 0`); an all-zero histogram scores 0.
    pub fn g(&self, counts: &[f64]) -> f64 {
        let total: f64 = counts.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        match self.kind {
            CriterionKind::Entropy => {
                let norm = f64::from(self.num_labels).ln();
                let mut result = 0.0;
                for &count in counts {
                    if count > 0.0 {
                        let p = count / total;
                        result -= p * p.ln() / norm;
                    }
                }
                result
            }
            CriterionKind::Gini => {
                let mut result = 1.0;
                for &count in counts {
                    if count > 0.0 {
                        let p = count / total;
                        result -= p * p;
                    }
                }
                result
            }
        }
    }

    /// Upper bound on how much `g` of a node with `n` records can change
    /// when one record is added or removed. Assumes binary splits.
    pub fn sensitivity(&self, n: usize) -> f64 {
        debug_assert!(n >= 1, "sensitivity undefined for empty nodes");
        let m = n as f64;
        match self.kind {
            CriterionKind::Entropy => {
                let num_branches = 2.0;
                num_branches / m + f64::from(self.num_labels) * m.ln() / m * (num_branches + 1.0)
            }
            CriterionKind::Gini => 1.0 - (m / (m + 1.0)).powi(2) - (1.0 / (m + 1.0)).powi(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn entropy_of_uniform_distribution_is_one() {
        let criterion = Criterion::new(CriterionKind::Entropy, 4);
        assert_abs_diff_eq!(criterion.g(&[5.0, 5.0, 5.0, 5.0]), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn entropy_of_pure_node_is_zero() {
        let criterion = Criterion::new(CriterionKind::Entropy, 3);
        assert_eq!(criterion.g(&[7.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn gini_of_pure_node_is_zero() {
        let criterion = Criterion::new(CriterionKind::Gini, 2);
        assert_abs_diff_eq!(criterion.g(&[0.0, 9.0]), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn gini_of_balanced_binary_is_half() {
        let criterion = Criterion::new(CriterionKind::Gini, 2);
        assert_abs_diff_eq!(criterion.g(&[4.0, 4.0]), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn empty_histogram_scores_zero_for_both() {
        for kind in [CriterionKind::Entropy, CriterionKind::Gini] {
            let criterion = Criterion::new(kind, 2);
            assert_eq!(criterion.g(&[0.0, 0.0]), 0.0);
            assert_eq!(criterion.g(&[]), 0.0);
        }
    }

    #[test]
    fn impurity_stays_in_unit_interval() {
        let cases: &[&[f64]] = &[
            &[1.0, 2.0, 3.0],
            &[100.0, 1.0, 0.0],
            &[0.5, 0.5, 0.5],
            &[1e6, 1.0, 1e-3],
        ];
        for kind in [CriterionKind::Entropy, CriterionKind::Gini] {
            let criterion = Criterion::new(kind, 3);
            for counts in cases {
                let g = criterion.g(counts);
                assert!((0.0..=1.0 + 1e-12).contains(&g), "{kind}: g = {g}");
            }
        }
    }

    #[test]
    fn entropy_sensitivity_formula() {
        let criterion = Criterion::new(CriterionKind::Entropy, 2);
        let n = 100;
        let m = n as f64;
        let expected = 2.0 / m + 2.0 * m.ln() / m * 3.0;
        assert_abs_diff_eq!(criterion.sensitivity(n), expected, epsilon = 1e-12);
    }

    #[test]
    fn gini_sensitivity_formula() {
        let criterion = Criterion::new(CriterionKind::Gini, 2);
        let n = 9;
        let expected = 1.0 - (0.9f64).powi(2) - (0.1f64).powi(2);
        assert_abs_diff_eq!(criterion.sensitivity(n), expected, epsilon = 1e-12);
    }

    #[test]
    fn parses_criterion_names() {
        assert_eq!(
            "entropy".parse::<CriterionKind>().unwrap(),
            CriterionKind::Entropy
        );
        assert_eq!("gini".parse::<CriterionKind>().unwrap(), CriterionKind::Gini);
        assert!("mse".parse::<CriterionKind>().is_err());
    }
}
