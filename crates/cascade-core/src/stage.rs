//! Stage Trait: single contract shared by every evaluation stage
use crate::context::EvaluationContext;
use crate::data_model::{StageId, StageResult};
use crate::kernel::LoadedCandidate;
use crate::machine::Oracle;

/// One fidelity level of evaluation.
///
/// `run` never fails: candidate-side problems are folded into the returned
/// record. Harness misconfiguration is detected before a stage runs.
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Whether repeated runs see identical problem instances.
    fn deterministic(&self) -> bool {
        false
    }

    fn run(
        &self,
        candidate: &LoadedCandidate,
        oracle: &dyn Oracle,
        ctx: &EvaluationContext,
    ) -> StageResult;
}
