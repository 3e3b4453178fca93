//! Cascade Scoring: cycle counts to scores
//!
//! Correct candidates score `baseline / worst_cycles * 10`; anything else
//! gets the fixed penalty record.
//!
//! # Example
//!
//! ```
//! use cascade_core::{StageId, TrialOutcome};
//! use cascade_scoring::Scorer;
//!
//! let scorer = Scorer::for_baseline(1000);
//! let result = scorer.score_trials(StageId::Full, &[TrialOutcome::passed(500)]);
//! assert_eq!(result.combined_score, 20.0);
//! ```

pub mod profile;
pub mod report;
pub mod score;

pub use profile::ScoringProfile;
pub use report::{render_feedback, FeedbackRenderer, CASCADE_TEMPLATE, STAGE_TEMPLATE};
pub use score::Scorer;
