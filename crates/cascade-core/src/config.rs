//! Evaluator configuration
//!
//! Defaults reproduce the frozen submission setup: a one-trial smoke test on
//! a small seeded instance, then 3 and 8 unseeded trials at full size.
use crate::error::ConfigurationError;
use crate::data_model::StageId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reference cycle count of the unoptimized kernel on the full problem.
pub const BASELINE_CYCLES: u64 = 147_734;

/// Seed used by the smoke stage.
pub const SMOKE_SEED: u64 = 42;

/// Size knobs and trial count for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageParams {
    pub trials: usize,
    pub tree_height: usize,
    pub rounds: usize,
    pub batch_size: usize,
    /// Fixed seed; `None` samples fresh entropy per trial.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl StageParams {
    pub fn smoke() -> Self {
        Self {
            trials: 1,
            tree_height: 5,
            rounds: 4,
            batch_size: 64,
            seed: Some(SMOKE_SEED),
        }
    }

    pub fn medium() -> Self {
        Self {
            trials: 3,
            tree_height: 10,
            rounds: 16,
            batch_size: 256,
            seed: None,
        }
    }

    pub fn full() -> Self {
        Self {
            trials: 8,
            ..Self::medium()
        }
    }

    fn validate(&self, stage: StageId) -> Result<(), ConfigurationError> {
        if self.trials == 0 {
            return Err(ConfigurationError::Stage(format!("{} needs at least one trial", stage)));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::Stage(format!("{} batch_size must be positive", stage)));
        }
        Ok(())
    }
}

/// Options for candidates that run as their own process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Wall-clock limit for one `build_kernel` invocation.
    #[serde(default)]
    pub build_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub baseline_cycles: u64,
    pub smoke: StageParams,
    pub medium: StageParams,
    pub full: StageParams,
    /// Upper bound on simultaneously registered candidates.
    pub registry_capacity: usize,
    pub process: ProcessConfig,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            baseline_cycles: BASELINE_CYCLES,
            smoke: StageParams::smoke(),
            medium: StageParams::medium(),
            full: StageParams::full(),
            registry_capacity: 1024,
            process: ProcessConfig::default(),
        }
    }
}

impl EvaluatorConfig {
    /// Load config from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    pub fn stage(&self, id: StageId) -> &StageParams {
        match id {
            StageId::Smoke => &self.smoke,
            StageId::Medium => &self.medium,
            StageId::Full => &self.full,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.baseline_cycles == 0 {
            return Err(ConfigurationError::Baseline(
                "baseline_cycles must be positive".to_string(),
            ));
        }
        if self.registry_capacity == 0 {
            return Err(ConfigurationError::Stage(
                "registry_capacity must be positive".to_string(),
            ));
        }
        for id in [StageId::Smoke, StageId::Medium, StageId::Full] {
            self.stage(id).validate(id)?;
        }
        Ok(())
    }
}
