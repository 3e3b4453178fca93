//! Concurrent evaluation of many candidates
//!
//! Each evaluation is synchronous and CPU-bound, so it runs on tokio's
//! blocking pool behind a semaphore. The permit travels into the blocking
//! task, so the limit counts evaluations that are still running. A timed-out
//! candidate is scored as a penalty right away; its blocking task finishes in
//! the background and only then frees its permit and registry lease.
use crate::cascade::Evaluator;
use cascade_core::{ConfigurationError, ErrorKind, StageId, StageResult};
use cascade_scoring::Scorer;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, warn};

/// What to run for every candidate in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    Stage(StageId),
    /// Full cascade; the item carries the cascade's final record.
    Cascade,
}

impl BatchMode {
    /// Stage a penalty record is attributed to.
    pub fn stage(&self) -> StageId {
        match self {
            Self::Stage(id) => *id,
            Self::Cascade => StageId::Full,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: BatchMode,
    pub concurrency: usize,
    pub timeout: Option<Duration>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: BatchMode::Cascade,
            concurrency: 4,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub path: PathBuf,
    pub result: StageResult,
}

/// Evaluate `paths` concurrently, keeping input order in the output.
///
/// Only harness misconfiguration is returned as `Err`; it is checked once up
/// front so no candidate runs against a missing oracle.
pub async fn evaluate_batch(
    evaluator: Arc<Evaluator>,
    paths: Vec<PathBuf>,
    options: BatchOptions,
) -> Result<Vec<BatchItem>, ConfigurationError> {
    evaluator.preload_oracle()?;

    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut handles = Vec::with_capacity(paths.len());

    for path in &paths {
        let evaluator = Arc::clone(&evaluator);
        let semaphore = Arc::clone(&semaphore);
        let options = options.clone();
        let path = path.clone();
        handles.push(tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await.ok();
            evaluate_one(evaluator, path, &options, permit).await
        }));
    }

    let mut items = Vec::with_capacity(handles.len());
    for (path, handle) in paths.into_iter().zip(handles) {
        let result = match handle.await {
            Ok(result) => result?,
            Err(e) => {
                error!("batch task for {} failed: {}", path.display(), e);
                failure_record(
                    evaluator.scorer(),
                    options.mode.stage(),
                    format!("evaluation aborted: {}", e),
                    ErrorKind::Execution,
                )
            }
        };
        items.push(BatchItem { path, result });
    }
    Ok(items)
}

async fn evaluate_one(
    evaluator: Arc<Evaluator>,
    path: PathBuf,
    options: &BatchOptions,
    permit: Option<OwnedSemaphorePermit>,
) -> Result<StageResult, ConfigurationError> {
    let stage = options.mode.stage();
    let mode = options.mode;
    let scorer = evaluator.scorer().clone();
    let name = path.display().to_string();

    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        match mode {
            BatchMode::Stage(StageId::Smoke) => evaluator.evaluate_stage1(&path),
            BatchMode::Stage(StageId::Medium) => evaluator.evaluate_stage2(&path),
            BatchMode::Stage(StageId::Full) => evaluator.evaluate_stage3(&path),
            BatchMode::Cascade => evaluator.evaluate_cascade(&path).map(|report| report.final_result),
        }
    });

    let joined = match options.timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("{} timed out after {}ms", name, limit.as_millis());
                return Ok(failure_record(
                    &scorer,
                    stage,
                    format!("evaluation timed out after {}ms", limit.as_millis()),
                    ErrorKind::Timeout,
                ));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) => {
            error!("evaluation of {} aborted: {}", name, e);
            Ok(failure_record(
                &scorer,
                stage,
                format!("evaluation aborted: {}", e),
                ErrorKind::Execution,
            ))
        }
    }
}

fn failure_record(scorer: &Scorer, stage: StageId, error: String, kind: ErrorKind) -> StageResult {
    match stage {
        StageId::Smoke => scorer.quick_failure(error, kind, None),
        _ => scorer.failure(stage, error, kind, None),
    }
}
