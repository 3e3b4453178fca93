//! Concurrent batch evaluation.

use cascade_core::{
    ConfigurationError, DebugInfo, ErrorKind, EvaluatorConfig, Instruction, KernelBuilder,
    KernelParams, StageId,
};
use cascade_loader::{BuiltinLoader, DirectoryOracleSource, OracleLoader};
use cascade_stages::{evaluate_batch, BatchMode, BatchOptions, Evaluator};
use cascade_testkit::{ReferenceKernel, ToyOracle, ZeroKernel};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sleeps inside `build_kernel` before delegating to the reference kernel.
#[derive(Default)]
struct SlowKernel {
    inner: ReferenceKernel,
}

impl KernelBuilder for SlowKernel {
    fn build_kernel(&mut self, params: &KernelParams) -> anyhow::Result<()> {
        std::thread::sleep(Duration::from_millis(200));
        self.inner.build_kernel(params)
    }

    fn instrs(&self) -> &[Instruction] {
        self.inner.instrs()
    }

    fn debug_info(&self) -> DebugInfo {
        self.inner.debug_info()
    }
}

/// Builds running at the same time, and the most ever seen at once.
#[derive(Default)]
struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
    builds: AtomicUsize,
}

/// Reference kernel whose build takes 150ms and reports to a `Gauge`.
struct GaugedKernel {
    gauge: Arc<Gauge>,
    inner: ReferenceKernel,
}

impl KernelBuilder for GaugedKernel {
    fn build_kernel(&mut self, params: &KernelParams) -> anyhow::Result<()> {
        let now = self.gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        self.gauge.builds.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(150));
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
        self.inner.build_kernel(params)
    }

    fn instrs(&self) -> &[Instruction] {
        self.inner.instrs()
    }

    fn debug_info(&self) -> DebugInfo {
        self.inner.debug_info()
    }
}

fn evaluator() -> Arc<Evaluator> {
    cascade_core::telemetry::init_for_tests();
    let loader = BuiltinLoader::new()
        .with("reference", || Box::new(ReferenceKernel::default()))
        .with("zero", || Box::new(ZeroKernel::default()))
        .with("slow", || Box::new(SlowKernel::default()));
    let oracle = OracleLoader::preloaded(Arc::new(ToyOracle::new()));
    Arc::new(Evaluator::new(EvaluatorConfig::default(), oracle, loader).unwrap())
}

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

#[tokio::test]
async fn test_batch_keeps_input_order() {
    let options = BatchOptions {
        mode: BatchMode::Stage(StageId::Smoke),
        concurrency: 2,
        timeout: None,
    };
    let items = evaluate_batch(evaluator(), paths(&["reference", "zero", "reference", "missing"]), options)
        .await
        .unwrap();

    let scores: Vec<_> = items.iter().map(|i| i.result.combined_score).collect();
    assert_eq!(scores, vec![1.0, 0.0, 1.0, 0.0]);
    assert_eq!(items[1].path, PathBuf::from("zero"));
    assert_eq!(items[3].result.error_kind, Some(ErrorKind::Load));
}

#[tokio::test]
async fn test_batch_cascade_reports_final_records() {
    let ev = evaluator();
    let items = evaluate_batch(Arc::clone(&ev), paths(&["zero", "reference"]), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(items[0].result.correctness, 0);
    assert_eq!(items[0].result.speedup, Some(0.5));
    assert_eq!(items[1].result.correctness, 1);
    assert_eq!(items[1].result.stage, StageId::Full);
    assert!(ev.registry().is_empty());
}

#[tokio::test]
async fn test_batch_timeout_is_penalized() {
    let options = BatchOptions {
        mode: BatchMode::Stage(StageId::Medium),
        concurrency: 1,
        timeout: Some(Duration::from_millis(50)),
    };
    let items = evaluate_batch(evaluator(), paths(&["slow"]), options).await.unwrap();

    let result = &items[0].result;
    assert_eq!(result.correctness, 0);
    assert_eq!(result.combined_score, 0.0);
    assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    assert!(result.error.as_deref().unwrap().contains("timed out after 50ms"));
}

#[tokio::test]
async fn test_batch_without_oracle_fails_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = OracleLoader::new(DirectoryOracleSource::new(dir.path().join("missing")));
    let ev = Evaluator::new(EvaluatorConfig::default(), oracle, BuiltinLoader::new()).unwrap();

    let err = evaluate_batch(Arc::new(ev), paths(&["reference"]), BatchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::Oracle(_)));
}

#[tokio::test]
async fn test_timed_out_evaluations_keep_their_slot() {
    cascade_core::telemetry::init_for_tests();
    let gauge = Arc::new(Gauge::default());
    let shared = Arc::clone(&gauge);
    let loader = BuiltinLoader::new().with("hang", move || {
        Box::new(GaugedKernel {
            gauge: Arc::clone(&shared),
            inner: ReferenceKernel::default(),
        })
    });
    let oracle = OracleLoader::preloaded(Arc::new(ToyOracle::new()));
    let ev = Evaluator::new(EvaluatorConfig::default(), oracle, loader).unwrap();
    let options = BatchOptions {
        mode: BatchMode::Stage(StageId::Smoke),
        concurrency: 1,
        timeout: Some(Duration::from_millis(20)),
    };

    let items = evaluate_batch(Arc::new(ev), paths(&["hang"; 4]), options).await.unwrap();
    assert_eq!(items.len(), 4);
    for item in &items {
        assert_eq!(item.result.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(item.result.quick_score, Some(0.0));
    }

    for _ in 0..100 {
        if gauge.builds.load(Ordering::SeqCst) == 4 && gauge.active.load(Ordering::SeqCst) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(gauge.builds.load(Ordering::SeqCst), 4);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
}
