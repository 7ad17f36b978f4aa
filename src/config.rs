//! Session configuration: the enumerated options of spec §6, with the
//! stated defaults and the weight-sum invariants of spec §8.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// The three weights a `ProcessRewardModel` composite score combines:
/// axiom-compliance, logical-consistency, evidence-strength. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrmWeights {
    pub axiom: f64,
    pub logic: f64,
    pub evidence: f64,
}

impl Default for PrmWeights {
    fn default() -> Self {
        Self {
            axiom: 0.4,
            logic: 0.4,
            evidence: 0.2,
        }
    }
}

impl PrmWeights {
    pub fn sum(&self) -> f64 {
        self.axiom + self.logic + self.evidence
    }

    pub fn is_valid(&self) -> bool {
        (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }
}

/// The three weights MCTS simulation combines: variant-score,
/// axiom-conclusion, fact-quality. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    pub variant_score: f64,
    pub axiom_conclusion: f64,
    pub fact_quality: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            variant_score: 0.5,
            axiom_conclusion: 0.3,
            fact_quality: 0.2,
        }
    }
}

impl RewardWeights {
    pub fn sum(&self) -> f64 {
        self.variant_score + self.axiom_conclusion + self.fact_quality
    }

    pub fn is_valid(&self) -> bool {
        (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }
}

/// Weights for `UncertaintyEvaluator`'s per-node score. Intentionally
/// allowed to sum to more than 1.0 (treated as unnormalized); the only
/// invariant is that scaling every weight by k scales the result by k,
/// which falls out of the formula being linear and needs no validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyWeights {
    pub conflicts: f64,
    pub confidence_variance: f64,
    pub coverage_gap: f64,
    pub axiom_gap: f64,
}

impl Default for UncertaintyWeights {
    fn default() -> Self {
        Self {
            conflicts: 0.3,
            confidence_variance: 0.4,
            coverage_gap: 0.2,
            axiom_gap: 0.3,
        }
    }
}

/// Tier-promotion thresholds (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Minimum external-experience consensus score for Silver → Gold
    /// when no "empirical-validation" source is present in provenance.
    pub consensus: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self { consensus: 0.6 }
    }
}

/// All session-scoped hyperparameters enumerated in spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub max_depth: u32,
    pub branching_factor: u32,
    pub variant_count: u32,
    pub exploration_constant: f64,
    pub coverage_weight: f64,
    pub prior_weight: f64,
    pub reward_weights: RewardWeights,
    pub prm_weights: PrmWeights,
    pub convergence_threshold: f64,
    pub convergence_streak: u32,
    /// The axiom-alignment a node's winning variant must cross, with no
    /// further decomposition produced, for the node to terminate directly
    /// instead of expanding children (spec §4.6's `expanded -> terminal`
    /// condition names this threshold without enumerating it as a
    /// hyperparameter; kept on the same [0,1] scale as
    /// `ToTNode::axiom_alignment`).
    pub terminal_axiom_alignment_threshold: f64,
    pub mcts_iteration_budget: u32,
    pub mcts_time_budget_ms: u64,
    pub judge_temperature: f64,
    pub variant_temperatures: Vec<f64>,
    pub enable_uncertainty_evaluator: bool,
    pub tier_thresholds: TierThresholds,
    pub uncertainty_weights: UncertaintyWeights,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            branching_factor: 3,
            variant_count: 3,
            exploration_constant: std::f64::consts::SQRT_2,
            coverage_weight: 0.25,
            prior_weight: 0.15,
            reward_weights: RewardWeights::default(),
            prm_weights: PrmWeights::default(),
            convergence_threshold: 0.83,
            convergence_streak: 3,
            terminal_axiom_alignment_threshold: 0.9,
            mcts_iteration_budget: 200,
            mcts_time_budget_ms: 0,
            judge_temperature: 0.1,
            variant_temperatures: vec![0.7, 0.8, 0.9],
            enable_uncertainty_evaluator: true,
            tier_thresholds: TierThresholds::default(),
            uncertainty_weights: UncertaintyWeights::default(),
        }
    }
}

impl SessionConfig {
    /// Validate the config's invariants. A session must refuse to start
    /// (spec §8) if this returns an error — always `Error::Fatal`.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth < 1 {
            return Err(Error::fatal("max_depth must be >= 1"));
        }
        if self.branching_factor < 1 {
            return Err(Error::fatal("branching_factor must be >= 1"));
        }
        if self.variant_count < 1 {
            return Err(Error::fatal("variant_count must be >= 1"));
        }
        if self.variant_temperatures.len() != self.variant_count as usize {
            return Err(Error::fatal(format!(
                "variant_temperatures has {} entries, expected variant_count={}",
                self.variant_temperatures.len(),
                self.variant_count
            )));
        }
        if self.exploration_constant <= 0.0 {
            return Err(Error::fatal("exploration_constant must be > 0"));
        }
        if self.coverage_weight < 0.0 || self.prior_weight < 0.0 {
            return Err(Error::fatal("coverage_weight and prior_weight must be >= 0"));
        }
        if !self.prm_weights.is_valid() {
            return Err(Error::fatal(format!(
                "prm_weights must sum to 1.0, got {}",
                self.prm_weights.sum()
            )));
        }
        if !self.reward_weights.is_valid() {
            return Err(Error::fatal(format!(
                "reward_weights must sum to 1.0, got {}",
                self.reward_weights.sum()
            )));
        }
        if !(0.0..=1.0).contains(&self.convergence_threshold) {
            return Err(Error::fatal("convergence_threshold must be in [0,1]"));
        }
        if !(0.0..=1.0).contains(&self.terminal_axiom_alignment_threshold) {
            return Err(Error::fatal("terminal_axiom_alignment_threshold must be in [0,1]"));
        }
        if self.convergence_streak < 1 {
            return Err(Error::fatal("convergence_streak must be >= 1"));
        }
        if self.mcts_iteration_budget < 1 {
            return Err(Error::fatal("mcts_iteration_budget must be >= 1"));
        }
        if self.judge_temperature < 0.0 {
            return Err(Error::fatal("judge_temperature must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.tier_thresholds.consensus) {
            return Err(Error::fatal("tier_thresholds.consensus must be in [0,1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn prm_weight_sum_invariant_is_enforced() {
        let mut cfg = SessionConfig::default();
        cfg.prm_weights = PrmWeights {
            axiom: 0.5,
            logic: 0.4,
            evidence: 0.2,
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn reward_weight_sum_invariant_is_enforced() {
        let mut cfg = SessionConfig::default();
        cfg.reward_weights = RewardWeights {
            variant_score: 0.5,
            axiom_conclusion: 0.3,
            fact_quality: 0.3,
        };
        assert!(cfg.validate().unwrap_err().is_fatal());
    }

    #[test]
    fn variant_temperature_count_must_match_variant_count() {
        let mut cfg = SessionConfig::default();
        cfg.variant_count = 4;
        assert!(cfg.validate().unwrap_err().is_fatal());
    }

    #[test]
    fn weight_sum_within_epsilon_is_accepted() {
        let weights = PrmWeights {
            axiom: 0.4 + 1e-10,
            logic: 0.4,
            evidence: 0.2,
        };
        assert!(weights.is_valid());
    }
}
