//! Smoke and full-size stages
use crate::problem::ProblemGenerator;
use crate::trial::TrialRunner;
use cascade_core::{
    ErrorKind, EvaluationContext, LoadedCandidate, Oracle, Stage, StageId, StageParams, StageResult,
    TrialOutcome,
};
use cascade_scoring::Scorer;
use tracing::{debug, info};

/// Runs a stage's trials in order, stopping at the first incorrect one.
fn run_trials(
    id: StageId,
    params: &StageParams,
    candidate: &LoadedCandidate,
    oracle: &dyn Oracle,
    ctx: &EvaluationContext,
) -> Vec<TrialOutcome> {
    let seed = ctx.determinism_seed.or(params.seed);
    let runner = TrialRunner::new(oracle);
    let mut outcomes = Vec::with_capacity(params.trials);

    for (i, instance) in ProblemGenerator::new(oracle)
        .instances(params, seed)
        .enumerate()
    {
        let outcome = runner.run(candidate, &instance);
        debug!(
            "{} {} trial {}/{}: correct={} cycles={:?}",
            ctx.trace_id,
            id,
            i + 1,
            params.trials,
            outcome.correct,
            outcome.cycles
        );
        let correct = outcome.correct;
        outcomes.push(outcome);
        if !correct {
            break;
        }
    }
    outcomes
}

/// One small seeded instance; pass/fail only.
pub struct SmokeStage {
    params: StageParams,
    scorer: Scorer,
}

impl SmokeStage {
    pub fn new(params: StageParams, scorer: Scorer) -> Self {
        Self { params, scorer }
    }

    pub fn params(&self) -> &StageParams {
        &self.params
    }
}

impl Stage for SmokeStage {
    fn id(&self) -> StageId {
        StageId::Smoke
    }

    fn deterministic(&self) -> bool {
        self.params.seed.is_some()
    }

    fn run(
        &self,
        candidate: &LoadedCandidate,
        oracle: &dyn Oracle,
        ctx: &EvaluationContext,
    ) -> StageResult {
        let outcomes = run_trials(self.id(), &self.params, candidate, oracle, ctx);
        let result = match outcomes.iter().find(|o| !o.correct).or(outcomes.last()) {
            Some(outcome) => self.scorer.quick(outcome),
            None => self.scorer.quick_failure("no trials were run", ErrorKind::Execution, None),
        };
        info!(
            "{} {}: quick_score={}",
            candidate.key(),
            self.id(),
            result.combined_score
        );
        result
    }
}

/// Several full-size instances scored on the slowest one.
pub struct TrialStage {
    id: StageId,
    params: StageParams,
    scorer: Scorer,
}

impl TrialStage {
    pub fn new(id: StageId, params: StageParams, scorer: Scorer) -> Self {
        Self { id, params, scorer }
    }

    pub fn params(&self) -> &StageParams {
        &self.params
    }
}

impl Stage for TrialStage {
    fn id(&self) -> StageId {
        self.id
    }

    fn deterministic(&self) -> bool {
        self.params.seed.is_some()
    }

    fn run(
        &self,
        candidate: &LoadedCandidate,
        oracle: &dyn Oracle,
        ctx: &EvaluationContext,
    ) -> StageResult {
        let outcomes = run_trials(self.id, &self.params, candidate, oracle, ctx);
        let result = self.scorer.score_trials(self.id, &outcomes);
        info!(
            "{} {}: combined_score={:.4} cycles={:?} correctness={}",
            candidate.key(),
            self.id,
            result.combined_score,
            result.cycles,
            result.correctness
        );
        result
    }
}
