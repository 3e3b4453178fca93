//! Unified Error Model
//!
//! Candidate-side failures (`Load`, `Execution`, `Correctness`) are converted
//! into penalty records at the stage boundary. `Configuration` is the only
//! class that reaches the caller as an `Err`.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Candidate failed to load into an executable unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("LOAD/NOT_FOUND: {}", .0.display())]
    NotFound(PathBuf),

    #[error("LOAD/UNREADABLE: {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("LOAD/MALFORMED: {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("LOAD/ENTRY_POINT: {0}")]
    MissingEntryPoint(String),

    #[error("LOAD/NOT_EXECUTABLE: {}", .0.display())]
    NotExecutable(PathBuf),

    #[error("LOAD/KEY_COLLISION: {0}")]
    KeyCollision(String),
}

/// Candidate build or machine execution failed during a trial.
#[derive(Error, Debug)]
#[error("EXEC/{message}")]
pub struct ExecutionError {
    pub message: String,
    pub cause: Option<anyhow::Error>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn from_anyhow(err: anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            cause: Some(err),
        }
    }

    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(format!("candidate panicked: {}", detail))
    }

    /// Cause chain rendered the way `anyhow` prints it with `{:?}`.
    pub fn trace(&self) -> Option<String> {
        self.cause.as_ref().map(|e| format!("{:?}", e))
    }
}

/// Trial ran to completion but the output region differs from the oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("CORRECTNESS/{0}")]
pub struct CorrectnessFailure(pub String);

/// The harness itself cannot proceed for any candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("CONFIG/ORACLE: {0}")]
    Oracle(String),

    #[error("CONFIG/BASELINE: {0}")]
    Baseline(String),

    #[error("CONFIG/STAGE: {0}")]
    Stage(String),

    #[error("CONFIG/PARSE: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum EvalError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Correctness(#[from] CorrectnessFailure),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Load(_) => ErrorKind::Load,
            Self::Execution(_) => ErrorKind::Execution,
            Self::Correctness(_) => ErrorKind::Correctness,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Text for a record's `error` field, without the area prefix for
    /// candidate-side failures.
    pub fn detail(&self) -> String {
        match self {
            Self::Execution(e) => e.message.clone(),
            Self::Correctness(e) => e.0.clone(),
            Self::Load(e) => e.to_string(),
            Self::Configuration(e) => e.to_string(),
        }
    }
}

/// Failure class reported alongside a penalty record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Load,
    Execution,
    Correctness,
    Timeout,
    Configuration,
}
