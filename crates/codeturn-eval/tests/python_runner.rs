//! Integration tests that run real submissions through `python3`.
//!
//! Skipped (with a note on stderr) when no interpreter is installed.

use std::path::PathBuf;

use codeturn_eval::{EntryCall, EvalConfig, Evaluator, PythonEvaluator, Submission, Verdict};
use codeturn_protocol::ExpectedType;
use serde_json::{Value, json};

// =========================================================================
// Helpers
// =========================================================================

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! require_python {
    () => {
        if !python_available() {
            eprintln!("python3 not found, skipping");
            return;
        }
    };
}

/// A private work dir per test so leftover-file checks don't race.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("codeturn-eval-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn evaluator_in(dir: &PathBuf) -> PythonEvaluator {
    PythonEvaluator::new(EvalConfig {
        work_dir: Some(dir.clone()),
        timeout_secs: 2,
        ..EvalConfig::default()
    })
}

fn fixed(code: &str, ty: ExpectedType, expected: Value) -> Submission {
    Submission {
        code: code.into(),
        call: None,
        expected_type: ty,
        expected,
    }
}

fn called(code: &str, function: &str, args: Vec<Value>, ty: ExpectedType, expected: Value) -> Submission {
    Submission {
        code: code.into(),
        call: Some(EntryCall::new(function, args)),
        expected_type: ty,
        expected,
    }
}

fn dir_is_empty(dir: &PathBuf) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

// =========================================================================
// Fixed-output levels
// =========================================================================

#[tokio::test]
async fn test_fixed_output_correct() {
    require_python!();
    let dir = scratch_dir("fixed-ok");
    let eval = evaluator_in(&dir);

    let verdict = eval
        .evaluate(fixed("print(6 * 7)", ExpectedType::Number, json!(42)))
        .await;
    assert_eq!(verdict, Verdict::Correct { output: "42".into() });
    assert!(dir_is_empty(&dir), "source unit should be removed");
}

#[tokio::test]
async fn test_fixed_output_mismatch_reports_obtained() {
    require_python!();
    let dir = scratch_dir("fixed-bad");
    let eval = evaluator_in(&dir);

    let verdict = eval
        .evaluate(fixed("print('Hi')", ExpectedType::String, json!("hi")))
        .await;
    assert_eq!(
        verdict,
        Verdict::Mismatch {
            expected_type: ExpectedType::String,
            expected: "hi".into(),
            obtained: "Hi".into(),
        }
    );
}

// =========================================================================
// Function levels
// =========================================================================

#[tokio::test]
async fn test_function_level_calls_entry_with_args() {
    require_python!();
    let dir = scratch_dir("call-ok");
    let eval = evaluator_in(&dir);

    let code = "def test(a, b):\n    return a + b\n";
    let verdict = eval
        .evaluate(called(code, "test", vec![json!(2), json!(3)], ExpectedType::Number, json!(5)))
        .await;
    assert!(verdict.is_correct(), "got {verdict:?}");
}

#[tokio::test]
async fn test_function_level_boolean_printed_by_python() {
    require_python!();
    let dir = scratch_dir("call-bool");
    let eval = evaluator_in(&dir);

    let code = "def init(s):\n    return s == s[::-1]\n";
    let verdict = eval
        .evaluate(called(code, "init", vec![json!("abca")], ExpectedType::Boolean, json!(false)))
        .await;
    assert!(verdict.is_correct(), "got {verdict:?}");
}

#[tokio::test]
async fn test_string_argument_cannot_inject_code() {
    require_python!();
    let dir = scratch_dir("inject");
    let eval = evaluator_in(&dir);

    let payload = "\"); print(\"pwned\"); (\"";
    let code = "def test(s):\n    return len(s)\n";
    let verdict = eval
        .evaluate(called(
            code,
            "test",
            vec![json!(payload)],
            ExpectedType::Number,
            json!(payload.chars().count()),
        ))
        .await;
    assert!(verdict.is_correct(), "got {verdict:?}");
}

#[tokio::test]
async fn test_missing_entry_function_is_distinct() {
    require_python!();
    let dir = scratch_dir("missing");
    let eval = evaluator_in(&dir);

    let verdict = eval
        .evaluate(called("x = 1\n", "test", vec![json!(1)], ExpectedType::Number, json!(1)))
        .await;
    assert_eq!(verdict, Verdict::MissingEntryFunction { function: "test".into() });
}

#[tokio::test]
async fn test_error_inside_function_is_runtime_error() {
    require_python!();
    let dir = scratch_dir("raise");
    let eval = evaluator_in(&dir);

    let code = "def test(a):\n    raise ValueError('nope')\n";
    let verdict = eval
        .evaluate(called(code, "test", vec![json!(1)], ExpectedType::Number, json!(1)))
        .await;
    match verdict {
        Verdict::RuntimeError { diagnostic } => assert!(diagnostic.contains("ValueError")),
        other => panic!("expected RuntimeError, got {other:?}"),
    }
}

// =========================================================================
// Limits
// =========================================================================

#[tokio::test]
async fn test_infinite_loop_times_out_and_cleans_up() {
    require_python!();
    let dir = scratch_dir("timeout");
    let eval = PythonEvaluator::new(EvalConfig {
        work_dir: Some(dir.clone()),
        timeout_secs: 1,
        ..EvalConfig::default()
    });

    let verdict = eval
        .evaluate(fixed("while True:\n    pass\n", ExpectedType::Number, json!(0)))
        .await;
    assert!(matches!(verdict, Verdict::Timeout { .. }), "got {verdict:?}");
    assert!(dir_is_empty(&dir), "source unit should be removed after a timeout");
}

#[tokio::test]
async fn test_missing_interpreter_is_internal() {
    let dir = scratch_dir("no-interp");
    let eval = PythonEvaluator::new(EvalConfig {
        interpreter: "definitely-not-a-python-binary".into(),
        work_dir: Some(dir.clone()),
        ..EvalConfig::default()
    });

    let verdict = eval
        .evaluate(fixed("print(1)", ExpectedType::Number, json!(1)))
        .await;
    assert!(matches!(verdict, Verdict::Internal { .. }), "got {verdict:?}");
    assert!(dir_is_empty(&dir));
}
