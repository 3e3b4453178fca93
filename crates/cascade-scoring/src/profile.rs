//! Scoring profiles
//!
//! A profile pins the baseline the speedup is measured against and the
//! shape of the penalty record. The default reproduces the frozen
//! submission scoring.

use cascade_core::{ConfigurationError, EvaluatorConfig, BASELINE_CYCLES};
use serde::{Deserialize, Serialize};

/// Constants that turn cycle counts into scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringProfile {
    /// Profile name (e.g., "submission@1.0")
    pub name: String,

    /// Cycles of the unoptimized reference kernel
    pub baseline_cycles: u64,

    /// `combined_score = speedup * score_scale`
    pub score_scale: f64,

    /// Speedup reported on the penalty record
    pub penalty_speedup: f64,

    /// Penalty cycles as a multiple of the baseline
    pub penalty_cycle_factor: u64,
}

impl ScoringProfile {
    pub fn submission() -> Self {
        Self {
            name: "submission@1.0".to_string(),
            baseline_cycles: BASELINE_CYCLES,
            score_scale: 10.0,
            penalty_speedup: 0.5,
            penalty_cycle_factor: 2,
        }
    }

    /// Submission scoring against the baseline an evaluator was configured with.
    pub fn from_config(config: &EvaluatorConfig) -> Self {
        Self {
            baseline_cycles: config.baseline_cycles,
            ..Self::submission()
        }
    }

    /// Load profile from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        let profile: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.baseline_cycles == 0 {
            return Err(ConfigurationError::Baseline(format!(
                "{}: baseline_cycles must be positive",
                self.name
            )));
        }
        if !(self.score_scale.is_finite() && self.score_scale > 0.0) {
            return Err(ConfigurationError::Baseline(format!(
                "{}: score_scale must be a positive number",
                self.name
            )));
        }
        Ok(())
    }

    pub fn penalty_cycles(&self) -> u64 {
        self.baseline_cycles.saturating_mul(self.penalty_cycle_factor)
    }
}

impl Default for ScoringProfile {
    fn default() -> Self {
        Self::submission()
    }
}
