//! Running a composed program as a Python child process.
//!
//! Every run gets its own source file named `codeturn_<uuid>.py` so
//! concurrent submissions (from any room) never share a path. The file is
//! removed after the run whatever the outcome.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::marshal::{MISSING_ENTRY_EXIT_CODE, compose_program};
use crate::verify::{DEFAULT_EPSILON, display_value, outputs_match};
use crate::{EvalError, Evaluator, Submission, Verdict};

/// Evaluator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Interpreter executable, looked up on `PATH`.
    pub interpreter: String,
    /// Hard wall-clock limit per run, in seconds.
    pub timeout_secs: u64,
    /// Where temporary source units go. `None` means the OS temp dir.
    pub work_dir: Option<PathBuf>,
    /// Runtime diagnostics longer than this are truncated.
    pub max_diagnostic_chars: usize,
    /// Tolerance for `number` levels.
    pub epsilon: f64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 5,
            work_dir: None,
            max_diagnostic_chars: 2000,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl EvalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Raw result of one child process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutput {
    /// The process exited on its own.
    Exited {
        /// `None` if it was killed by a signal.
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The time limit hit and the process was killed.
    TimedOut,
}

/// Runs submissions with a local Python interpreter.
#[derive(Debug, Clone)]
pub struct PythonEvaluator {
    config: EvalConfig,
}

impl PythonEvaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    fn work_dir(&self) -> PathBuf {
        self.config
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Write `program` to a fresh source unit, run it, and clean up.
    pub async fn run(&self, program: &str) -> Result<RunOutput, EvalError> {
        let path = self
            .work_dir()
            .join(format!("codeturn_{}.py", uuid::Uuid::new_v4()));

        tokio::fs::write(&path, program)
            .await
            .map_err(|source| EvalError::WriteSource {
                path: path.clone(),
                source,
            })?;

        let result = self.execute(&path).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "failed to remove submission source");
        }

        result
    }

    async fn execute(&self, path: &Path) -> Result<RunOutput, EvalError> {
        let child = Command::new(&self.config.interpreter)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EvalError::Spawn {
                interpreter: self.config.interpreter.clone(),
                source,
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.config.timeout(), child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(RunOutput::Exited {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            Err(_) => {
                debug!(path = %path.display(), "submission timed out, killed");
                Ok(RunOutput::TimedOut)
            }
        }
    }

    /// Map a finished run to a verdict.
    pub fn classify(&self, submission: &Submission, output: RunOutput) -> Verdict {
        match output {
            RunOutput::TimedOut => Verdict::Timeout {
                limit: self.config.timeout(),
            },
            RunOutput::Exited {
                code: Some(0),
                stdout,
                ..
            } => {
                let obtained = stdout.trim().to_string();
                if outputs_match(
                    submission.expected_type,
                    &submission.expected,
                    &obtained,
                    self.config.epsilon,
                ) {
                    Verdict::Correct { output: obtained }
                } else {
                    Verdict::Mismatch {
                        expected_type: submission.expected_type,
                        expected: display_value(&submission.expected),
                        obtained,
                    }
                }
            }
            RunOutput::Exited {
                code: Some(MISSING_ENTRY_EXIT_CODE),
                ..
            } if submission.call.is_some() => Verdict::MissingEntryFunction {
                function: submission
                    .call
                    .as_ref()
                    .map(|c| c.function.clone())
                    .unwrap_or_default(),
            },
            RunOutput::Exited { stdout, stderr, .. } => {
                let diagnostic = if stderr.trim().is_empty() { stdout } else { stderr };
                Verdict::RuntimeError {
                    diagnostic: truncate_chars(diagnostic.trim(), self.config.max_diagnostic_chars),
                }
            }
        }
    }
}

impl Default for PythonEvaluator {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}

impl Evaluator for PythonEvaluator {
    async fn evaluate(&self, submission: Submission) -> Verdict {
        let program = match compose_program(&submission.code, submission.call.as_ref()) {
            Ok(program) => program,
            Err(e) => return Verdict::Internal { reason: e.to_string() },
        };
        match self.run(&program).await {
            Ok(output) => self.classify(&submission, output),
            Err(e) => Verdict::Internal { reason: e.to_string() },
        }
    }
}

/// Keep at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntryCall;
    use codeturn_protocol::ExpectedType;
    use serde_json::json;

    fn submission(call: Option<EntryCall>) -> Submission {
        Submission {
            code: String::new(),
            call,
            expected_type: ExpectedType::Number,
            expected: json!(3),
        }
    }

    fn exited(code: i32, stdout: &str, stderr: &str) -> RunOutput {
        RunOutput::Exited {
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_truncate_chars_short_text_unchanged() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcde", 5), "abcde");
    }

    #[test]
    fn test_truncate_chars_long_text_marked() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        // Multi-byte characters are never split.
        assert_eq!(truncate_chars("ééé", 2), "éé...");
    }

    #[test]
    fn test_classify_timeout() {
        let eval = PythonEvaluator::default();
        let verdict = eval.classify(&submission(None), RunOutput::TimedOut);
        assert_eq!(verdict, Verdict::Timeout { limit: Duration::from_secs(5) });
    }

    #[test]
    fn test_classify_correct_and_mismatch() {
        let eval = PythonEvaluator::default();
        assert_eq!(
            eval.classify(&submission(None), exited(0, "3.0\n", "")),
            Verdict::Correct { output: "3.0".into() }
        );
        assert_eq!(
            eval.classify(&submission(None), exited(0, "4\n", "")),
            Verdict::Mismatch {
                expected_type: ExpectedType::Number,
                expected: "3".into(),
                obtained: "4".into(),
            }
        );
    }

    #[test]
    fn test_classify_reserved_code_is_missing_function_only_for_calls() {
        let eval = PythonEvaluator::default();
        let call = EntryCall::new("solve", vec![]);
        assert_eq!(
            eval.classify(&submission(Some(call)), exited(MISSING_ENTRY_EXIT_CODE, "", "")),
            Verdict::MissingEntryFunction { function: "solve".into() }
        );
        assert!(matches!(
            eval.classify(&submission(None), exited(MISSING_ENTRY_EXIT_CODE, "", "")),
            Verdict::RuntimeError { .. }
        ));
    }

    #[test]
    fn test_classify_runtime_error_prefers_stderr_and_truncates() {
        let eval = PythonEvaluator::new(EvalConfig {
            max_diagnostic_chars: 10,
            ..EvalConfig::default()
        });
        let verdict = eval.classify(
            &submission(None),
            exited(1, "partial", "Traceback (most recent call last): boom"),
        );
        assert_eq!(
            verdict,
            Verdict::RuntimeError { diagnostic: "Traceback ...".into() }
        );
    }
}
