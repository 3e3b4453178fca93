//! Scorer: trial outcomes to stage records
//!
//! Stages 2 and 3 are all-or-nothing. One incorrect trial yields the fixed
//! penalty record, otherwise the slowest trial sets the speedup. Stage 1 only
//! reports whether the smoke instance came out right.

use super::profile::ScoringProfile;
use cascade_core::{ErrorKind, EvalError, StageId, StageResult, TrialOutcome};

/// Turns trial outcomes into `StageResult`s under one profile
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    profile: ScoringProfile,
}

impl Scorer {
    pub fn new(profile: ScoringProfile) -> Self {
        Self { profile }
    }

    /// Submission scoring against a custom baseline.
    pub fn for_baseline(baseline_cycles: u64) -> Self {
        Self::new(ScoringProfile {
            baseline_cycles,
            ..ScoringProfile::submission()
        })
    }

    pub fn profile(&self) -> &ScoringProfile {
        &self.profile
    }

    /// Baseline over worst-case cycles; zero cycles count as one.
    pub fn speedup(&self, worst_cycles: u64) -> f64 {
        self.profile.baseline_cycles as f64 / worst_cycles.max(1) as f64
    }

    pub fn combined_score(&self, worst_cycles: u64) -> f64 {
        self.speedup(worst_cycles) * self.profile.score_scale
    }

    /// Record for a stage whose every trial was correct.
    pub fn passed(&self, stage: StageId, worst_cycles: u64) -> StageResult {
        StageResult {
            stage,
            combined_score: self.combined_score(worst_cycles),
            quick_score: None,
            cycles: Some(worst_cycles),
            speedup: Some(self.speedup(worst_cycles)),
            correctness: 1,
            error: None,
            error_kind: None,
            trace: None,
        }
    }

    /// The fixed penalty record, without diagnostics.
    pub fn penalty(&self, stage: StageId) -> StageResult {
        StageResult {
            stage,
            combined_score: 0.0,
            quick_score: None,
            cycles: Some(self.profile.penalty_cycles()),
            speedup: Some(self.profile.penalty_speedup),
            correctness: 0,
            error: None,
            error_kind: None,
            trace: None,
        }
    }

    /// Penalty record carrying what went wrong.
    pub fn failure(
        &self,
        stage: StageId,
        error: impl Into<String>,
        kind: ErrorKind,
        trace: Option<String>,
    ) -> StageResult {
        StageResult {
            error: Some(error.into()),
            error_kind: Some(kind),
            trace,
            ..self.penalty(stage)
        }
    }

    /// Penalty record for a classified error.
    pub fn rejected(&self, stage: StageId, err: &EvalError, trace: Option<String>) -> StageResult {
        match stage {
            StageId::Smoke => self.quick_failure(err.detail(), err.kind(), trace),
            _ => self.failure(stage, err.detail(), err.kind(), trace),
        }
    }

    /// Scores a full-size stage. Empty input counts as a failure.
    pub fn score_trials(&self, stage: StageId, outcomes: &[TrialOutcome]) -> StageResult {
        if outcomes.is_empty() {
            return self.failure(stage, "no trials were run", ErrorKind::Execution, None);
        }

        if let Some(bad) = outcomes.iter().find(|o| !o.correct) {
            return self.failed_outcome(stage, bad);
        }

        let worst = outcomes.iter().filter_map(|o| o.cycles).max().unwrap_or(0);
        self.passed(stage, worst)
    }

    /// Quick record for the smoke stage.
    pub fn quick(&self, outcome: &TrialOutcome) -> StageResult {
        if let Some(failure) = &outcome.failure {
            return self.rejected(StageId::Smoke, &failure.to_error(), failure.trace());
        }
        let quick_score = if outcome.correct { 1.0 } else { 0.0 };
        StageResult {
            stage: StageId::Smoke,
            combined_score: quick_score,
            quick_score: Some(quick_score),
            cycles: None,
            speedup: None,
            correctness: u8::from(outcome.correct),
            error: None,
            error_kind: None,
            trace: None,
        }
    }

    /// Quick record for a failed smoke stage.
    pub fn quick_failure(
        &self,
        error: impl Into<String>,
        kind: ErrorKind,
        trace: Option<String>,
    ) -> StageResult {
        StageResult {
            stage: StageId::Smoke,
            combined_score: 0.0,
            quick_score: Some(0.0),
            cycles: None,
            speedup: None,
            correctness: 0,
            error: Some(error.into()),
            error_kind: Some(kind),
            trace,
        }
    }

    fn failed_outcome(&self, stage: StageId, outcome: &TrialOutcome) -> StageResult {
        match &outcome.failure {
            Some(failure) => self.rejected(stage, &failure.to_error(), failure.trace()),
            None => self.failure(stage, "Incorrect output values", ErrorKind::Correctness, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::{LoadError, TrialFailure};

    fn mismatch() -> TrialOutcome {
        TrialOutcome::failed(Some(900), TrialFailure::Mismatch { first_difference: Some(3) })
    }

    #[test]
    fn test_worst_case_cycles_are_scored() {
        let scorer = Scorer::for_baseline(1000);
        let outcomes = vec![
            TrialOutcome::passed(400),
            TrialOutcome::passed(500),
            TrialOutcome::passed(450),
        ];
        let result = scorer.score_trials(StageId::Medium, &outcomes);
        assert_eq!(result.correctness, 1);
        assert_eq!(result.cycles, Some(500));
        assert_eq!(result.speedup, Some(2.0));
        assert_eq!(result.combined_score, 20.0);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_single_incorrect_trial_gives_exact_penalty() {
        let scorer = Scorer::default();
        let outcomes = vec![TrialOutcome::passed(10), mismatch(), TrialOutcome::passed(5)];
        let result = scorer.score_trials(StageId::Full, &outcomes);

        assert_eq!(result.combined_score, 0.0);
        assert_eq!(result.cycles, Some(295_468));
        assert_eq!(result.speedup, Some(0.5));
        assert_eq!(result.correctness, 0);
        assert!(result.error.as_deref().unwrap().starts_with("Incorrect output values"));
        assert_eq!(result.error_kind, Some(ErrorKind::Correctness));
    }

    #[test]
    fn test_execution_failure_keeps_message_and_trace() {
        let scorer = Scorer::default();
        let outcomes = vec![TrialOutcome::failed(
            None,
            TrialFailure::Execution {
                message: "EXEC/candidate panicked: boom".into(),
                trace: Some("boom\n  at build_kernel".into()),
            },
        )];
        let result = scorer.score_trials(StageId::Medium, &outcomes);
        assert_eq!(result.error.as_deref(), Some("EXEC/candidate panicked: boom"));
        assert_eq!(result.error_kind, Some(ErrorKind::Execution));
        assert!(result.trace.is_some());
        assert_eq!(result.cycles, Some(295_468));
    }

    #[test]
    fn test_rejected_uses_error_class() {
        let scorer = Scorer::default();
        let err: EvalError = LoadError::MissingEntryPoint("no kernels".into()).into();

        let smoke = scorer.rejected(StageId::Smoke, &err, None);
        assert_eq!(smoke.quick_score, Some(0.0));
        assert_eq!(smoke.error_kind, Some(ErrorKind::Load));
        assert!(smoke.cycles.is_none());

        let full = scorer.rejected(StageId::Full, &err, None);
        assert_eq!(full.cycles, Some(295_468));
        assert_eq!(full.error.as_deref(), Some("LOAD/ENTRY_POINT: no kernels"));
    }

    #[test]
    fn test_zero_cycles_clamped() {
        let scorer = Scorer::for_baseline(100);
        assert_eq!(scorer.speedup(0), 100.0);
        let result = scorer.score_trials(StageId::Full, &[TrialOutcome::passed(0)]);
        assert_eq!(result.combined_score, 1000.0);
    }

    #[test]
    fn test_empty_trials_fail() {
        let result = Scorer::default().score_trials(StageId::Full, &[]);
        assert_eq!(result.correctness, 0);
        assert_eq!(result.combined_score, 0.0);
    }

    #[test]
    fn test_quick_record() {
        let scorer = Scorer::default();
        let ok = scorer.quick(&TrialOutcome::passed(1234));
        assert_eq!(ok.quick_score, Some(1.0));
        assert_eq!(ok.combined_score, 1.0);
        assert_eq!(ok.correctness, 1);
        assert!(ok.cycles.is_none());

        let bad = scorer.quick(&mismatch());
        assert_eq!(bad.quick_score, Some(0.0));
        assert_eq!(bad.combined_score, 0.0);
        assert_eq!(bad.correctness, 0);
        assert!(bad.speedup.is_none());
        assert_eq!(bad.error_kind, Some(ErrorKind::Correctness));
        assert!(bad.error.as_deref().unwrap().starts_with("Incorrect output values"));
    }

    #[test]
    fn test_penalty_serializes_exact_fields() {
        let json = Scorer::default().penalty(StageId::Full).to_json();
        assert_eq!(json["combined_score"], 0.0);
        assert_eq!(json["cycles"], 295_468);
        assert_eq!(json["speedup"], 0.5);
        assert_eq!(json["correctness"], 0);
    }
}
