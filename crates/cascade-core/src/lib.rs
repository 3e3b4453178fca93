//! Cascade Core: data model, error taxonomy and the oracle/candidate contracts
//!
//! Every stage shares one contract (`Stage`) and reports one externally
//! visible record (`StageResult`). The machine and the reference
//! transformation are reached only through the `Oracle` trait.

pub mod config;
pub mod context;
pub mod data_model;
pub mod error;
pub mod kernel;
pub mod machine;
pub mod stage;
pub mod telemetry;

pub use config::{EvaluatorConfig, ProcessConfig, StageParams, BASELINE_CYCLES, SMOKE_SEED};
pub use context::EvaluationContext;
pub use data_model::{ProblemInstance, StageId, StageResult, TrialFailure, TrialOutcome};
pub use error::{
    ConfigurationError, CorrectnessFailure, ErrorKind, EvalError, ExecutionError, LoadError,
};
pub use kernel::{BuilderFactory, BuiltKernel, KernelBuilder, KernelParams, LoadedCandidate, ModuleKey};
pub use machine::{DebugInfo, Input, Instruction, Machine, Oracle, Tree, Word, OUTPUT_POINTER_SLOT};
pub use stage::Stage;
