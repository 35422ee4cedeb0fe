//! Thompson-sampling execute/defer threshold advisor. An external
//! advisor to the scheduler, not a core gate: it never blocks
//! dispatch on its own, it only publishes a recommended threshold a
//! caller may consult before invoking a risky tool.

use std::collections::HashMap;

use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Safe,
    Moderate,
    Dangerous,
}

impl RiskCategory {
    fn base_threshold(self) -> f64 {
        match self {
            RiskCategory::Safe => 0.3,
            RiskCategory::Moderate => 0.55,
            RiskCategory::Dangerous => 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvisorMode {
    Active,
    Passive,
    Speculation,
}

impl AdvisorMode {
    fn shift(self) -> f64 {
        match self {
            AdvisorMode::Active => 0.0,
            AdvisorMode::Passive => 0.1,
            AdvisorMode::Speculation => -0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BetaCounts {
    alpha: f64,
    beta: f64,
}

impl Default for BetaCounts {
    fn default() -> Self {
        Self { alpha: 1.0, beta: 1.0 }
    }
}

/// Per-tool Beta(alpha, beta) posteriors over success probability, with
/// a UCB exploration bonus layered on top.
#[derive(Debug, Default)]
pub struct ThresholdAdvisor {
    counts: HashMap<String, BetaCounts>,
    exploration_constant: f64,
}

impl ThresholdAdvisor {
    pub fn new(exploration_constant: f64) -> Self {
        Self { counts: HashMap::new(), exploration_constant }
    }

    pub fn record_outcome(&mut self, tool: &str, success: bool) {
        let counts = self.counts.entry(tool.to_string()).or_default();
        if success {
            counts.alpha += 1.0;
        } else {
            counts.beta += 1.0;
        }
    }

    fn total_observations(&self) -> f64 {
        self.counts.values().map(|c| c.alpha + c.beta - 2.0).sum()
    }

    /// Samples a success-probability estimate from the tool's posterior
    /// and adds a `sqrt(c * ln(N+1) / n_i)` exploration bonus, then
    /// compares against `risk_category`'s base threshold shifted by
    /// `mode`. Returns `(should_execute, sampled_probability, threshold)`.
    pub fn advise(&self, tool: &str, risk: RiskCategory, mode: AdvisorMode) -> (bool, f64, f64) {
        let counts = self.counts.get(tool).cloned().unwrap_or_default();
        let n_i = (counts.alpha + counts.beta - 2.0).max(1.0);
        let total = self.total_observations().max(0.0);

        let sample = Beta::new(counts.alpha, counts.beta).map(|dist| dist.sample(&mut rand::thread_rng())).unwrap_or(0.5);

        let bonus = (self.exploration_constant * (total + 1.0).ln() / n_i).sqrt();
        let adjusted = (sample + bonus).min(1.0);

        let threshold = (risk.base_threshold() + mode.shift()).clamp(0.0, 1.0);
        (adjusted >= threshold, adjusted, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangerous_tools_need_a_higher_threshold_than_safe_ones() {
        assert!(RiskCategory::Dangerous.base_threshold() > RiskCategory::Safe.base_threshold());
    }

    #[test]
    fn speculation_mode_lowers_the_effective_threshold() {
        let advisor = ThresholdAdvisor::new(1.0);
        let (_, _, speculative_threshold) = advisor.advise("t", RiskCategory::Moderate, AdvisorMode::Speculation);
        let (_, _, passive_threshold) = advisor.advise("t", RiskCategory::Moderate, AdvisorMode::Passive);
        assert!(speculative_threshold < passive_threshold);
    }

    #[test]
    fn repeated_successes_raise_the_sampled_probability_on_average() {
        let mut advisor = ThresholdAdvisor::new(1.0);
        for _ in 0..50 {
            advisor.record_outcome("reliable:tool", true);
        }
        let samples: f64 = (0..20).map(|_| advisor.advise("reliable:tool", RiskCategory::Safe, AdvisorMode::Active).1).sum::<f64>() / 20.0;
        assert!(samples > 0.6);
    }
}
