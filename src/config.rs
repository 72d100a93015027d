//! Run configuration enums and fail-fast validation errors.

use std::fmt;
use std::str::FromStr;

/// Configuration errors. All of these are raised before training starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown budget function {0:?} (expected uniform, decay or harmonic)")]
    UnknownBudgetFn(String),

    #[error("unknown algorithm {0:?} (expected singleMachine, localRNM or distributedBaseline)")]
    UnknownAlgo(String),

    #[error("unknown splitting criterion {0:?} (expected entropy or gini)")]
    UnknownCriterion(String),

    #[error("unknown dataset {0:?}")]
    UnknownDataset(String),

    #[error("{name} must be in [0, 1], got {value}")]
    FractionOutOfRange { name: &'static str, value: f64 },

    #[error("pruning_floor must be non-negative, got {0}")]
    NegativePruningFloor(f64),

    #[error("alpha must be -1 (noise disabled) or positive, got {0}")]
    InvalidAlpha(f64),

    #[error("{name} must be at least {min}, got {got}")]
    TooSmall {
        name: &'static str,
        min: usize,
        got: usize,
    },
}

/// How the structure budget is shared across depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetFn {
    /// Every depth gets `1 / max_num_nodes`.
    Uniform,
    /// Depth `d` gets `1 / 2^d`; deeper nodes get exponentially less.
    Decay,
    /// Depth `d` gets `(sum_{i=1..d} 1/(max_depth - i + 1)) / max_depth`;
    /// non-decreasing in depth.
    Harmonic,
}

impl FromStr for BudgetFn {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "decay" => Ok(Self::Decay),
            "harmonic" => Ok(Self::Harmonic),
            other => Err(ConfigError::UnknownBudgetFn(other.to_string())),
        }
    }
}

impl fmt::Display for BudgetFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform => f.write_str("uniform"),
            Self::Decay => f.write_str("decay"),
            Self::Harmonic => f.write_str("harmonic"),
        }
    }
}

/// How candidate splits are proposed and scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algo {
    /// One entity; split selection runs entirely inside it.
    SingleMachine,
    /// Entities propose local report-noisy-max winners; the proposals are
    /// then scored across entities.
    LocalRnm,
    /// The full global family is scored across entities.
    DistributedBaseline,
}

impl FromStr for Algo {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "singleMachine" => Ok(Self::SingleMachine),
            "localRNM" => Ok(Self::LocalRnm),
            "distributedBaseline" => Ok(Self::DistributedBaseline),
            other => Err(ConfigError::UnknownAlgo(other.to_string())),
        }
    }
}

impl fmt::Display for Algo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleMachine => f.write_str("singleMachine"),
            Self::LocalRnm => f.write_str("localRNM"),
            Self::DistributedBaseline => f.write_str("distributedBaseline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("uniform".parse::<BudgetFn>().unwrap(), BudgetFn::Uniform);
        assert_eq!("decay".parse::<BudgetFn>().unwrap(), BudgetFn::Decay);
        assert_eq!("harmonic".parse::<BudgetFn>().unwrap(), BudgetFn::Harmonic);
        assert_eq!("localRNM".parse::<Algo>().unwrap(), Algo::LocalRnm);
        assert_eq!(
            "distributedBaseline".parse::<Algo>().unwrap(),
            Algo::DistributedBaseline
        );
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(matches!(
            "exponential".parse::<BudgetFn>(),
            Err(ConfigError::UnknownBudgetFn(_))
        ));
        assert!(matches!(
            "federated".parse::<Algo>(),
            Err(ConfigError::UnknownAlgo(_))
        ));
    }

    #[test]
    fn display_round_trips() {
        for algo in [Algo::SingleMachine, Algo::LocalRnm, Algo::DistributedBaseline] {
            assert_eq!(algo.to_string().parse::<Algo>().unwrap(), algo);
        }
        for budget in [BudgetFn::Uniform, BudgetFn::Decay, BudgetFn::Harmonic] {
            assert_eq!(budget.to_string().parse::<BudgetFn>().unwrap(), budget);
        }
    }
}
