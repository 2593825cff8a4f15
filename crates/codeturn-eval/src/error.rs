//! Error types for the evaluation layer.

use std::path::PathBuf;

/// Things that stop a submission from being run at all.
///
/// These never reach clients directly: the evaluator turns them into
/// [`Verdict::Internal`](crate::Verdict::Internal).
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// A test argument has no literal encoding (e.g. a JSON object).
    #[error("unsupported argument: {0}")]
    UnsupportedArgument(String),

    /// The level names an entry function that isn't a valid identifier.
    #[error("invalid entry function name: {0:?}")]
    InvalidEntryFunction(String),

    /// Writing the temporary source unit failed.
    #[error("failed to write {path}: {source}")]
    WriteSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The interpreter could not be started.
    #[error("failed to start {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    /// Collecting the child's output failed.
    #[error("i/o error while running submission: {0}")]
    Io(#[from] std::io::Error),
}
