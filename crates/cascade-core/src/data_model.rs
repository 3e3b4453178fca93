//! Data Model: ProblemInstance, TrialOutcome, StageResult
use crate::error::{CorrectnessFailure, ErrorKind, EvalError, ExecutionError};
use crate::kernel::KernelParams;
use crate::machine::{Input, Tree, Word};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One generated problem: structural input, value input, memory image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemInstance {
    pub tree: Tree,
    pub input: Input,
    pub mem: Vec<Word>,
}

impl ProblemInstance {
    pub fn kernel_params(&self) -> KernelParams {
        KernelParams {
            tree_height: self.tree.height,
            value_count: self.tree.values.len(),
            index_count: self.input.indices.len(),
            round_count: self.input.rounds,
        }
    }

    /// Length of the output region compared against the oracle.
    pub fn output_len(&self) -> usize {
        self.input.values.len()
    }
}

/// Why a trial did not count as correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrialFailure {
    /// The reference transformation yielded no state at all.
    OracleProducedNothing,
    Mismatch { first_difference: Option<usize> },
    OutputOutOfBounds { pointer: usize, len: usize },
    Execution { message: String, trace: Option<String> },
}

impl fmt::Display for TrialFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OracleProducedNothing => write!(f, "reference kernel produced no final state"),
            Self::Mismatch { first_difference: Some(i) } => {
                write!(f, "Incorrect output values (first difference at offset {})", i)
            }
            Self::Mismatch { first_difference: None } => write!(f, "Incorrect output values"),
            Self::OutputOutOfBounds { pointer, len } => write!(
                f,
                "output region [{}, {}) lies outside machine memory",
                pointer,
                pointer + len
            ),
            Self::Execution { message, .. } => write!(f, "{}", message),
        }
    }
}

impl TrialFailure {
    /// Error taxonomy view: execution problems stay execution errors,
    /// everything else is a correctness failure.
    pub fn to_error(&self) -> EvalError {
        match self {
            Self::Execution { message, .. } => ExecutionError::new(message.clone()).into(),
            other => CorrectnessFailure(other.to_string()).into(),
        }
    }

    pub fn trace(&self) -> Option<String> {
        match self {
            Self::Execution { trace, .. } => trace.clone(),
            _ => None,
        }
    }
}

/// Result of one generate-execute-compare cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutcome {
    pub cycles: Option<u64>,
    pub correct: bool,
    pub failure: Option<TrialFailure>,
}

impl TrialOutcome {
    pub fn passed(cycles: u64) -> Self {
        Self {
            cycles: Some(cycles),
            correct: true,
            failure: None,
        }
    }

    pub fn failed(cycles: Option<u64>, failure: TrialFailure) -> Self {
        Self {
            cycles,
            correct: false,
            failure: Some(failure),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|f| f.to_error().kind())
    }
}

/// Evaluation fidelity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageId {
    #[serde(rename = "stage1")]
    Smoke,
    #[serde(rename = "stage2")]
    Medium,
    #[serde(rename = "stage3")]
    Full,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smoke => "stage1",
            Self::Medium => "stage2",
            Self::Full => "stage3",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible record handed back to the search controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageId,
    pub combined_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speedup: Option<f64>,
    pub correctness: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl StageResult {
    pub fn is_correct(&self) -> bool {
        self.correctness == 1
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
