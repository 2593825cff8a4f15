//! Submission evaluation for Codeturn.
//!
//! Takes the shared buffer plus the level's pinned test case, runs it in
//! an isolated child process with a hard timeout, and classifies what
//! happened:
//!
//! ```text
//! Submission ──compose──→ program ──run──→ RunOutput ──classify──→ Verdict
//!              (marshal)           (runner)              (verify)
//! ```
//!
//! The room layer only sees the [`Evaluator`] trait, so tests can swap the
//! Python runner for a scripted one.

mod error;
pub mod marshal;
mod runner;
mod score;
pub mod verify;

use std::future::Future;
use std::time::Duration;

use codeturn_protocol::ExpectedType;
use serde_json::Value;

pub use error::EvalError;
pub use marshal::EntryCall;
pub use runner::{EvalConfig, PythonEvaluator, RunOutput, truncate_chars};
pub use score::ScoreRules;

/// Everything needed to evaluate one submission. Owned, so it can move
/// into a worker task.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub code: String,
    /// For function levels: the entry function and the pinned arguments.
    pub call: Option<EntryCall>,
    pub expected_type: ExpectedType,
    pub expected: Value,
}

/// How a submission went.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Ran cleanly and printed the expected value.
    Correct { output: String },
    /// Ran cleanly but printed something else.
    Mismatch {
        expected_type: ExpectedType,
        expected: String,
        obtained: String,
    },
    /// Killed after running past the time limit.
    Timeout { limit: Duration },
    /// Raised or crashed. `diagnostic` is already truncated.
    RuntimeError { diagnostic: String },
    /// The level's entry function isn't defined by the submitted code.
    MissingEntryFunction { function: String },
    /// The submission couldn't be run at all (server-side problem).
    Internal { reason: String },
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, Self::Correct { .. })
    }
}

/// Runs submissions. Implementations must be shareable across tasks: the
/// room actor clones an `Arc` of it into one worker task per submission.
pub trait Evaluator: Send + Sync + 'static {
    fn evaluate(&self, submission: Submission) -> impl Future<Output = Verdict> + Send;
}
