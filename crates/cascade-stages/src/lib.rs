//! Cascade Stages: problem generation, trials and the fail-fast cascade
//!
//! # Pipeline Flow
//!
//! ```text
//! path → load (fresh key) → Stage1 smoke → Stage2 medium → Stage3 full → record
//!                               │               │               │
//!                            quick          penalty or      penalty or
//!                            record         worst-case      worst-case
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cascade_core::EvaluatorConfig;
//! use cascade_loader::{DirectoryOracleSource, OracleLoader};
//! use cascade_stages::Evaluator;
//!
//! let oracle = OracleLoader::new(DirectoryOracleSource::new("problem/"));
//! let evaluator = Evaluator::with_defaults(EvaluatorConfig::default(), oracle)?;
//! let report = evaluator.evaluate_cascade("candidates/kernel_0042.json")?;
//! println!("{}", report.final_result.to_json());
//! ```

pub mod batch;
pub mod cascade;
pub mod problem;
pub mod stage;
pub mod trial;

pub use batch::{evaluate_batch, BatchItem, BatchMode, BatchOptions};
pub use cascade::{CascadeReport, CascadeState, Evaluator, StageRecord};
pub use problem::ProblemGenerator;
pub use stage::{SmokeStage, TrialStage};
pub use trial::{compare_output, TrialRunner};
