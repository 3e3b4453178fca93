//! Trial Runner: build, execute, compare
//!
//! Everything the candidate touches runs under `catch_unwind`, so a panic in
//! `build_kernel` or inside the simulated machine becomes a failed outcome
//! instead of tearing down the evaluator.
use cascade_core::{
    DebugInfo, ExecutionError, Instruction, LoadedCandidate, Oracle, ProblemInstance,
    TrialFailure, TrialOutcome, Word, OUTPUT_POINTER_SLOT,
};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

pub struct TrialRunner<'a> {
    oracle: &'a dyn Oracle,
}

impl<'a> TrialRunner<'a> {
    pub fn new(oracle: &'a dyn Oracle) -> Self {
        Self { oracle }
    }

    pub fn run(&self, candidate: &LoadedCandidate, instance: &ProblemInstance) -> TrialOutcome {
        let (instrs, debug_info) = match self.build(candidate, instance) {
            Ok(built) => built,
            Err(e) => return execution_failure(None, e),
        };
        debug!("{} built {} instructions", candidate.key(), instrs.len());

        let (cycles, mem) = match self.execute(instance, instrs, debug_info) {
            Ok(finished) => finished,
            Err(e) => return execution_failure(None, e),
        };

        let Some(expected) = self.oracle.reference_kernel(instance.mem.clone()).last() else {
            warn!(
                "oracle {} produced no final state for {}",
                self.oracle.id(),
                candidate.key()
            );
            return TrialOutcome::failed(Some(cycles), TrialFailure::OracleProducedNothing);
        };

        match compare_output(&mem, &expected, instance.output_len()) {
            None => TrialOutcome::passed(cycles),
            Some(failure) => {
                debug!("{} incorrect after {} cycles: {}", candidate.key(), cycles, failure);
                TrialOutcome::failed(Some(cycles), failure)
            }
        }
    }

    fn build(
        &self,
        candidate: &LoadedCandidate,
        instance: &ProblemInstance,
    ) -> Result<(Vec<Instruction>, DebugInfo), ExecutionError> {
        let params = instance.kernel_params();
        guarded(|| {
            let mut builder = candidate.new_builder();
            builder.build_kernel(&params)?;
            Ok((builder.instrs().to_vec(), builder.debug_info()))
        })
    }

    fn execute(
        &self,
        instance: &ProblemInstance,
        instrs: Vec<Instruction>,
        debug_info: DebugInfo,
    ) -> Result<(u64, Vec<Word>), ExecutionError> {
        guarded(|| {
            let mut machine =
                self.oracle
                    .machine(instance.mem.clone(), instrs, debug_info, self.oracle.n_cores())?;
            machine.set_enable_pause(false);
            machine.set_enable_debug(false);
            machine.run()?;
            Ok((machine.cycle(), machine.mem().to_vec()))
        })
    }
}

/// Runs candidate-facing code, folding errors and panics into `ExecutionError`.
fn guarded<T>(f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, ExecutionError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ExecutionError::from_anyhow(e)),
        Err(payload) => Err(ExecutionError::from_panic(payload.as_ref())),
    }
}

fn execution_failure(cycles: Option<u64>, err: ExecutionError) -> TrialOutcome {
    warn!("candidate failed: {}", err);
    let trace = err.trace();
    TrialOutcome::failed(
        cycles,
        TrialFailure::Execution {
            message: err.message,
            trace,
        },
    )
}

/// `None` when the output regions match word for word.
pub fn compare_output(actual: &[Word], expected: &[Word], len: usize) -> Option<TrialFailure> {
    let Some(&pointer) = expected.get(OUTPUT_POINTER_SLOT) else {
        return Some(TrialFailure::OutputOutOfBounds {
            pointer: OUTPUT_POINTER_SLOT,
            len: 1,
        });
    };
    let pointer = pointer as usize;
    let out_of_bounds = TrialFailure::OutputOutOfBounds { pointer, len };

    let Some(end) = pointer.checked_add(len) else {
        return Some(out_of_bounds);
    };
    let (Some(got), Some(want)) = (actual.get(pointer..end), expected.get(pointer..end)) else {
        return Some(out_of_bounds);
    };

    if got == want {
        return None;
    }
    let first_difference = got.iter().zip(want).position(|(a, b)| a != b);
    Some(TrialFailure::Mismatch { first_difference })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemGenerator;
    use cascade_core::{ModuleKey, StageParams};
    use cascade_core::{KernelBuilder, KernelParams};
    use cascade_testkit::{
        FailingKernel, Op, PanickingKernel, ReferenceKernel, ToyOracle, ZeroKernel,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn candidate<K: KernelBuilder + Default + 'static>() -> LoadedCandidate {
        LoadedCandidate::new(
            ModuleKey::generate(),
            "builtin",
            "blake3:test",
            Arc::new(|| Box::new(K::default()) as Box<dyn KernelBuilder>),
        )
    }

    /// Stores through an address far past the end of memory.
    #[derive(Default)]
    struct WildStoreKernel {
        instrs: Vec<Instruction>,
    }

    impl KernelBuilder for WildStoreKernel {
        fn build_kernel(&mut self, _params: &KernelParams) -> anyhow::Result<()> {
            self.instrs = vec![
                Op::Const { dst: 0, imm: 1_000_000 }.to_instruction(),
                Op::Store { addr: 0, src: 0 }.to_instruction(),
            ];
            Ok(())
        }

        fn instrs(&self) -> &[Instruction] {
            &self.instrs
        }

        fn debug_info(&self) -> DebugInfo {
            DebugInfo::default()
        }
    }

    /// Emits an instruction the machine cannot decode.
    #[derive(Default)]
    struct UnknownOpKernel {
        instrs: Vec<Instruction>,
    }

    impl KernelBuilder for UnknownOpKernel {
        fn build_kernel(&mut self, _params: &KernelParams) -> anyhow::Result<()> {
            self.instrs = vec![Instruction(serde_json::json!({"op": "teleport"}))];
            Ok(())
        }

        fn instrs(&self) -> &[Instruction] {
            &self.instrs
        }

        fn debug_info(&self) -> DebugInfo {
            DebugInfo::default()
        }
    }

    fn smoke_instance(oracle: &ToyOracle) -> ProblemInstance {
        ProblemGenerator::new(oracle).generate(&StageParams::smoke(), &mut StdRng::seed_from_u64(42))
    }

    #[test]
    fn test_reference_kernel_passes() {
        let oracle = ToyOracle::new();
        let instance = smoke_instance(&oracle);
        let outcome = TrialRunner::new(&oracle).run(&candidate::<ReferenceKernel>(), &instance);
        assert!(outcome.correct, "{:?}", outcome.failure);
        assert_eq!(
            outcome.cycles,
            Some(ReferenceKernel::cycle_count(&instance.kernel_params()))
        );
    }

    #[test]
    fn test_zero_kernel_mismatches() {
        let oracle = ToyOracle::new();
        let instance = smoke_instance(&oracle);
        let outcome = TrialRunner::new(&oracle).run(&candidate::<ZeroKernel>(), &instance);
        assert!(!outcome.correct);
        assert!(matches!(
            outcome.failure,
            Some(TrialFailure::Mismatch { first_difference: Some(_) })
        ));
        assert!(outcome.cycles.is_some());
    }

    #[test]
    fn test_panic_in_build_is_contained() {
        let oracle = ToyOracle::new();
        let instance = smoke_instance(&oracle);
        let outcome = TrialRunner::new(&oracle).run(&candidate::<PanickingKernel>(), &instance);
        assert!(!outcome.correct);
        match outcome.failure {
            Some(TrialFailure::Execution { message, .. }) => {
                assert!(message.contains("index out of range in build_kernel"));
            }
            other => panic!("unexpected failure {:?}", other),
        }
    }

    #[test]
    fn test_build_error_keeps_message_and_trace() {
        let oracle = ToyOracle::new();
        let instance = smoke_instance(&oracle);
        let outcome = TrialRunner::new(&oracle).run(&candidate::<FailingKernel>(), &instance);
        match outcome.failure {
            Some(TrialFailure::Execution { message, trace }) => {
                assert!(message.starts_with("NameError: name 'VLEN' is not defined"));
                assert!(trace.is_some());
            }
            other => panic!("unexpected failure {:?}", other),
        }
    }

    #[test]
    fn test_machine_fault_is_execution_failure() {
        let oracle = ToyOracle::new();
        let instance = smoke_instance(&oracle);
        let outcome = TrialRunner::new(&oracle).run(&candidate::<WildStoreKernel>(), &instance);
        assert!(!outcome.correct);
        assert!(outcome.cycles.is_none());
        match outcome.failure {
            Some(TrialFailure::Execution { message, .. }) => {
                assert!(message.starts_with("memory address 1000000 out of range"), "{}", message);
            }
            other => panic!("unexpected failure {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_program_is_execution_failure() {
        let oracle = ToyOracle::new();
        let instance = smoke_instance(&oracle);
        let outcome = TrialRunner::new(&oracle).run(&candidate::<UnknownOpKernel>(), &instance);
        match outcome.failure {
            Some(TrialFailure::Execution { message, trace }) => {
                assert_eq!(message, "invalid instruction #0");
                assert!(trace.unwrap().contains("teleport"));
            }
            other => panic!("unexpected failure {:?}", other),
        }
    }

    #[test]
    fn test_silent_oracle_is_incorrect() {
        let oracle = ToyOracle::silent();
        let instance = smoke_instance(&oracle);
        let outcome = TrialRunner::new(&oracle).run(&candidate::<ReferenceKernel>(), &instance);
        assert!(!outcome.correct);
        assert_eq!(outcome.failure, Some(TrialFailure::OracleProducedNothing));
    }

    #[test]
    fn test_compare_output_bounds() {
        let mut expected = vec![0; 8];
        expected[OUTPUT_POINTER_SLOT] = 6;
        assert_eq!(
            compare_output(&expected, &expected, 10),
            Some(TrialFailure::OutputOutOfBounds { pointer: 6, len: 10 })
        );
        assert_eq!(compare_output(&expected, &expected, 2), None);
        assert_eq!(
            compare_output(&[], &[], 2),
            Some(TrialFailure::OutputOutOfBounds { pointer: OUTPUT_POINTER_SLOT, len: 1 })
        );
    }

    #[test]
    fn test_compare_output_first_difference() {
        let mut expected = vec![0; 10];
        expected[OUTPUT_POINTER_SLOT] = 7;
        let mut actual = expected.clone();
        actual[8] = 1;
        assert_eq!(
            compare_output(&actual, &expected, 3),
            Some(TrialFailure::Mismatch { first_difference: Some(1) })
        );
    }
}
