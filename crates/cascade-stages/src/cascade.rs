//! Cascade controller: chains the stages with fail-fast gating
//!
//! ```text
//! Stage1Smoke ──ok──► Stage2Medium ──ok──► Stage3Full ──► Done
//!      │                   │                   │
//!      └──── incorrect ────┴──── incorrect ────┴──► Failed(stage)
//! ```
//!
//! The oracle is resolved before any candidate is touched, so a broken
//! harness surfaces as `ConfigurationError` instead of a zero score.
use crate::stage::{SmokeStage, TrialStage};
use cascade_core::{
    ConfigurationError, ErrorKind, EvalError, EvaluationContext, EvaluatorConfig, LoadError,
    LoadedCandidate, ModuleKey, Oracle, Stage, StageId, StageResult,
};
use cascade_loader::{CandidateLoader, CandidateLoaders, ModuleRegistry, OracleLoader, RegistryLease};
use cascade_scoring::{FeedbackRenderer, Scorer, ScoringProfile};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Where a cascade run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum CascadeState {
    Stage1Smoke,
    Stage2Medium,
    Stage3Full,
    Done,
    Failed(StageId),
}

impl CascadeState {
    /// Stage to run in this state, if any.
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Self::Stage1Smoke => Some(StageId::Smoke),
            Self::Stage2Medium => Some(StageId::Medium),
            Self::Stage3Full => Some(StageId::Full),
            Self::Done | Self::Failed(_) => None,
        }
    }

    pub fn advance(self, passed: bool) -> Self {
        match (self, passed) {
            (Self::Stage1Smoke, true) => Self::Stage2Medium,
            (Self::Stage2Medium, true) => Self::Stage3Full,
            (Self::Stage3Full, true) => Self::Done,
            (state, false) => match state.stage() {
                Some(stage) => Self::Failed(stage),
                None => state,
            },
            (terminal, true) => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage().is_none()
    }
}

/// One executed stage inside a cascade run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageId,
    pub latency_ms: u64,
    pub deterministic: bool,
    pub result: StageResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeReport {
    pub pipeline_id: String,
    pub trace_id: String,
    pub module_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_hash: Option<String>,
    pub stages: Vec<StageRecord>,
    pub state: CascadeState,
    /// Last full-size record, or the penalty record of the failing stage.
    pub final_result: StageResult,
}

impl CascadeReport {
    pub fn passed(&self) -> bool {
        self.state == CascadeState::Done
    }

    pub fn render_feedback(&self) -> Result<String, String> {
        FeedbackRenderer::new().render_report(self)
    }
}

/// Entry point used by the search controller.
pub struct Evaluator {
    config: EvaluatorConfig,
    oracle: OracleLoader,
    loader: Box<dyn CandidateLoader>,
    registry: Arc<ModuleRegistry>,
    scorer: Scorer,
    smoke: SmokeStage,
    medium: TrialStage,
    full: TrialStage,
}

impl Evaluator {
    pub fn new(
        config: EvaluatorConfig,
        oracle: OracleLoader,
        loader: impl CandidateLoader + 'static,
    ) -> Result<Self, ConfigurationError> {
        Self::with_profile(ScoringProfile::from_config(&config), config, oracle, loader)
    }

    pub fn with_profile(
        profile: ScoringProfile,
        config: EvaluatorConfig,
        oracle: OracleLoader,
        loader: impl CandidateLoader + 'static,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        profile.validate()?;

        let scorer = Scorer::new(profile);
        Ok(Self {
            registry: ModuleRegistry::new(config.registry_capacity),
            smoke: SmokeStage::new(config.smoke.clone(), scorer.clone()),
            medium: TrialStage::new(StageId::Medium, config.medium.clone(), scorer.clone()),
            full: TrialStage::new(StageId::Full, config.full.clone(), scorer.clone()),
            scorer,
            loader: Box::new(loader),
            oracle,
            config,
        })
    }

    /// Default loader chain (kernel files, then executables).
    pub fn with_defaults(config: EvaluatorConfig, oracle: OracleLoader) -> Result<Self, ConfigurationError> {
        let loader = CandidateLoaders::new(&config);
        Self::new(config, oracle, loader)
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Resolve the oracle now instead of on the first evaluation.
    pub fn preload_oracle(&self) -> Result<(), ConfigurationError> {
        self.oracle.get().map(|_| ())
    }

    pub fn evaluate_stage1(&self, path: impl AsRef<Path>) -> Result<StageResult, ConfigurationError> {
        self.evaluate_single(StageId::Smoke, path.as_ref())
    }

    pub fn evaluate_stage2(&self, path: impl AsRef<Path>) -> Result<StageResult, ConfigurationError> {
        self.evaluate_single(StageId::Medium, path.as_ref())
    }

    pub fn evaluate_stage3(&self, path: impl AsRef<Path>) -> Result<StageResult, ConfigurationError> {
        self.evaluate_single(StageId::Full, path.as_ref())
    }

    /// Non-cascaded default: the full-size stage.
    pub fn evaluate(&self, path: impl AsRef<Path>) -> Result<StageResult, ConfigurationError> {
        self.evaluate_stage3(path)
    }

    pub fn evaluate_cascade(&self, path: impl AsRef<Path>) -> Result<CascadeReport, ConfigurationError> {
        let path = path.as_ref();
        let oracle = self.oracle.get()?;
        let key = ModuleKey::generate();
        let ctx = EvaluationContext::new(key.clone());
        let pipeline_id = [StageId::Smoke, StageId::Medium, StageId::Full]
            .iter()
            .map(StageId::as_str)
            .collect::<Vec<_>>()
            .join("→");

        let (candidate, _lease) = match self.load(path, &key) {
            Ok(loaded) => loaded,
            Err(e) => {
                let first = self.load_failure(StageId::Smoke, &e);
                return Ok(CascadeReport {
                    pipeline_id,
                    trace_id: ctx.trace_id,
                    module_key: key.to_string(),
                    candidate_hash: None,
                    stages: vec![StageRecord {
                        stage: StageId::Smoke,
                        latency_ms: 0,
                        deterministic: self.smoke.deterministic(),
                        result: first,
                    }],
                    state: CascadeState::Failed(StageId::Smoke),
                    final_result: self.load_failure(StageId::Full, &e),
                });
            }
        };

        let mut state = CascadeState::Stage1Smoke;
        let mut records = Vec::new();

        while let Some(id) = state.stage() {
            let stage = self.stage(id);
            let start = Instant::now();
            let result = stage.run(&candidate, oracle.as_ref(), &ctx);
            let latency_ms = start.elapsed().as_millis() as u64;

            state = state.advance(result.is_correct());
            records.push(StageRecord {
                stage: id,
                latency_ms,
                deterministic: stage.deterministic(),
                result,
            });
        }

        let final_result = match records.last() {
            Some(last) if state == CascadeState::Done => last.result.clone(),
            Some(last) => self.promote_to_penalty(&last.result),
            None => self.scorer.penalty(StageId::Full),
        };
        info!(
            "{} cascade {:?} after {} stage(s): combined_score={:.4}",
            key,
            state,
            records.len(),
            final_result.combined_score
        );

        Ok(CascadeReport {
            pipeline_id,
            trace_id: ctx.trace_id,
            module_key: key.to_string(),
            candidate_hash: Some(candidate.content_hash().to_string()),
            stages: records,
            state,
            final_result,
        })
    }

    fn stage(&self, id: StageId) -> &dyn Stage {
        match id {
            StageId::Smoke => &self.smoke,
            StageId::Medium => &self.medium,
            StageId::Full => &self.full,
        }
    }

    fn evaluate_single(&self, id: StageId, path: &Path) -> Result<StageResult, ConfigurationError> {
        let oracle = self.oracle.get()?;
        let key = ModuleKey::generate();
        let ctx = EvaluationContext::new(key.clone());

        let (candidate, _lease) = match self.load(path, &key) {
            Ok(loaded) => loaded,
            Err(e) => return Ok(self.load_failure(id, &e)),
        };
        Ok(self.run_stage(id, &candidate, oracle.as_ref(), &ctx))
    }

    fn run_stage(
        &self,
        id: StageId,
        candidate: &LoadedCandidate,
        oracle: &dyn Oracle,
        ctx: &EvaluationContext,
    ) -> StageResult {
        self.stage(id).run(candidate, oracle, ctx)
    }

    /// Load a fresh, registered instance of the candidate at `path`.
    fn load(&self, path: &Path, key: &ModuleKey) -> Result<(LoadedCandidate, RegistryLease), LoadError> {
        let candidate = self.loader.load(path, key)?;
        let lease = self.registry.register(&candidate)?;
        info!(
            "loaded {} as {} ({})",
            path.display(),
            key,
            candidate.content_hash()
        );
        Ok((candidate, lease))
    }

    fn load_failure(&self, id: StageId, err: &LoadError) -> StageResult {
        warn!("candidate failed to load: {}", err);
        self.scorer.rejected(id, &EvalError::from(err.clone()), None)
    }

    /// Full penalty record carrying a failed stage's diagnostics.
    fn promote_to_penalty(&self, failed: &StageResult) -> StageResult {
        StageResult {
            error: failed.error.clone(),
            error_kind: failed.error_kind.or(Some(ErrorKind::Correctness)),
            trace: failed.trace.clone(),
            ..self.scorer.penalty(failed.stage)
        }
    }
}
