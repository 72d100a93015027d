//! Calibrated noise for the Laplace mechanism.
//!
//! Every statistic an entity releases is perturbed with a draw from
//! `Laplace(0, b)` where `b = sensitivity / epsilon`. Samples are produced as
//! the difference of two exponential draws, which has exactly the Laplace
//! density. The source can be disabled, in which case every draw is `0.0`;
//! this is the reference mode used to validate the non-private algorithm.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::tree::NodeId;

/// Seeded Laplace noise generator, one per entity.
///
/// Seeds are derived as `entity_index + run_seed` so a run is reproducible
/// bit-for-bit given the same seed, while entities draw independent streams.
pub struct NoiseSource {
    rng: Xoshiro256PlusPlus,
    enabled: bool,
}

impl NoiseSource {
    /// Create a noise source. With `enabled = false` every draw is `0.0` and
    /// the RNG is never advanced, so the reference mode does not depend on
    /// how many queries a run happens to issue.
    pub fn new(seed: u64, enabled: bool) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            enabled,
        }
    }

    /// Whether this source actually perturbs its inputs.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// One draw from `Laplace(0, scale)`.
    ///
    /// Sampled as `X1 - X2` with `Xi ~ Exponential(rate = 1/scale)`.
    pub fn laplace(&mut self, scale: f64) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        debug_assert!(
            scale.is_finite() && scale > 0.0,
            "Laplace scale must be positive and finite, got {scale}"
        );
        let rate = 1.0 / scale;
        self.exponential(rate) - self.exponential(rate)
    }

    /// One draw from `Exponential(rate)` via inverse-CDF sampling.
    fn exponential(&mut self, rate: f64) -> f64 {
        // u in [0, 1); 1 - u is in (0, 1] so the log is finite.
        let u: f64 = self.rng.gen();
        -(1.0 - u).ln() / rate
    }
}

impl std::fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseSource")
            .field("enabled", &self.enabled)
            .finish()
    }
}

// ============================================================================
// PrivacyLedger
// ============================================================================

/// Per-node record of the privacy budget an entity has spent.
///
/// Each answered query charges its full `epsilon` against the queried node.
/// Queries against disjoint sibling nodes compose in parallel (a record
/// participates in at most one of them), so the budget actually consumed by
/// one record is the sum of the charges along its root-to-leaf path. The
/// ledger stores the per-node sums; the entity combines them with its mirror
/// tree to produce that path maximum.
#[derive(Debug, Clone, Default)]
pub struct PrivacyLedger {
    per_node: Vec<f64>,
}

impl PrivacyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge `epsilon` against `node`.
    pub fn charge(&mut self, node: NodeId, epsilon: f64) {
        let idx = node as usize;
        if idx >= self.per_node.len() {
            self.per_node.resize(idx + 1, 0.0);
        }
        self.per_node[idx] += epsilon;
    }

    /// Total budget charged against a single node.
    pub fn node_spend(&self, node: NodeId) -> f64 {
        self.per_node.get(node as usize).copied().unwrap_or(0.0)
    }

    /// Sum over every node, ignoring parallel composition. Upper bound only;
    /// useful for sanity checks, not the composed guarantee.
    pub fn gross_spend(&self) -> f64 {
        self.per_node.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_source_returns_exact_zero() {
        let mut noise = NoiseSource::new(7, false);
        for _ in 0..100 {
            assert_eq!(noise.laplace(0.5), 0.0);
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = NoiseSource::new(42, true);
        let mut b = NoiseSource::new(42, true);
        for _ in 0..100 {
            assert_eq!(a.laplace(1.0), b.laplace(1.0));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = NoiseSource::new(1, true);
        let mut b = NoiseSource::new(2, true);
        let same = (0..32).all(|_| a.laplace(1.0) == b.laplace(1.0));
        assert!(!same);
    }

    #[test]
    fn sample_mean_approximately_zero() {
        let mut noise = NoiseSource::new(9, true);
        let n = 20_000;
        let sum: f64 = (0..n).map(|_| noise.laplace(1.0)).sum();
        let mean = sum / n as f64;

        // Standard error of the mean is sqrt(2/n) for unit scale.
        let se = (2.0 / n as f64).sqrt();
        assert!(mean.abs() < 4.0 * se, "mean {mean} too far from 0");
    }

    #[test]
    fn sample_variance_matches_scale() {
        let mut noise = NoiseSource::new(13, true);
        let scale = 2.0;
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| noise.laplace(scale)).collect();
        let mean: f64 = samples.iter().sum::<f64>() / n as f64;
        let var: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;

        // Var(Laplace(0, b)) = 2b^2.
        let expected = 2.0 * scale * scale;
        assert!(
            (var - expected).abs() / expected < 0.2,
            "variance {var} too far from {expected}"
        );
    }

    #[test]
    fn ledger_accumulates_per_node() {
        let mut ledger = PrivacyLedger::new();
        ledger.charge(0, 0.5);
        ledger.charge(2, 0.25);
        ledger.charge(0, 0.5);

        assert_eq!(ledger.node_spend(0), 1.0);
        assert_eq!(ledger.node_spend(1), 0.0);
        assert_eq!(ledger.node_spend(2), 0.25);
        assert!((ledger.gross_spend() - 1.25).abs() < 1e-12);
    }
}
