//! Level records as they appear in the level catalog and on the wire.
//!
//! A [`Level`] is immutable once loaded. Levels come in two flavours:
//!
//! - **Fixed output**: the submitted program must print `expectedValue`.
//! - **Function levels**: `inputs`/`expectedOutputs` list test cases; the
//!   server calls the level's entry function with one pinned input and
//!   compares against the matching output.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entry function called for function levels that don't name one.
pub const DEFAULT_ENTRY_FUNCTION: &str = "test";

/// How the printed output of a submission is compared to the expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedType {
    Number,
    Boolean,
    String,
}

impl fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::String => write!(f, "string"),
        }
    }
}

/// One test input: an argument list, or a bare scalar meaning a single
/// argument.
///
/// `untagged` tries the variants in order, so `[1, 2]` is two arguments
/// and `5` is one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestInput {
    Args(Vec<Value>),
    Single(Value),
}

impl TestInput {
    /// The positional arguments this input expands to.
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::Args(args) => args.clone(),
            Self::Single(value) => vec![value.clone()],
        }
    }
}

/// A level descriptor, as stored in `levels.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub expected_type: ExpectedType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<TestInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outputs: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_function: Option<String>,
}

impl Level {
    /// Returns `true` if this level is evaluated by calling an entry
    /// function with a pinned input.
    pub fn has_inputs(&self) -> bool {
        self.inputs.is_some()
    }

    /// Name of the function the server calls on function levels.
    pub fn entry_function(&self) -> &str {
        self.entry_function
            .as_deref()
            .unwrap_or(DEFAULT_ENTRY_FUNCTION)
    }

    /// Number of `(input, expectedOutput)` pairs. Zero for fixed-output levels.
    pub fn case_count(&self) -> usize {
        match (&self.inputs, &self.expected_outputs) {
            (Some(inputs), Some(outputs)) => inputs.len().min(outputs.len()),
            _ => 0,
        }
    }

    /// The `index`-th test case as `(arguments, expected output)`.
    pub fn case(&self, index: usize) -> Option<(Vec<Value>, Value)> {
        let input = self.inputs.as_ref()?.get(index)?;
        let output = self.expected_outputs.as_ref()?.get(index)?;
        Some((input.args(), output.clone()))
    }

    /// The code loaded into the shared buffer when this level activates.
    pub fn starting_code(&self) -> String {
        self.initial_code.clone().unwrap_or_default()
    }

    /// The client-facing view of this level. `number` is 1-based.
    pub fn view(&self, number: usize, total: usize) -> LevelView {
        LevelView {
            id: self.id,
            number,
            total,
            title: self.title.clone(),
            description: self.description.clone(),
            expected_type: self.expected_type,
            entry_function: self.has_inputs().then(|| self.entry_function().to_string()),
        }
    }
}

/// What clients are told about the active level. The hidden test-case
/// list is never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelView {
    pub id: u32,
    pub number: usize,
    pub total: usize,
    pub title: Option<String>,
    pub description: Option<String>,
    pub expected_type: ExpectedType,
    pub entry_function: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_parses_fixed_output_level() {
        let level: Level = serde_json::from_value(json!({
            "id": 1,
            "expectedType": "number",
            "expectedValue": 42
        }))
        .unwrap();
        assert!(!level.has_inputs());
        assert_eq!(level.case_count(), 0);
        assert_eq!(level.expected_value, Some(json!(42)));
    }

    #[test]
    fn test_level_parses_function_level_with_mixed_inputs() {
        let level: Level = serde_json::from_value(json!({
            "id": 2,
            "expectedType": "number",
            "inputs": [[1, 2], 5],
            "expectedOutputs": [3, 25],
            "entryFunction": "init"
        }))
        .unwrap();
        assert_eq!(level.entry_function(), "init");
        assert_eq!(level.case(0), Some((vec![json!(1), json!(2)], json!(3))));
        assert_eq!(level.case(1), Some((vec![json!(5)], json!(25))));
        assert_eq!(level.case(2), None);
    }

    #[test]
    fn test_level_entry_function_defaults_to_test() {
        let level: Level = serde_json::from_value(json!({
            "id": 3,
            "expectedType": "boolean",
            "inputs": [[true]],
            "expectedOutputs": [false]
        }))
        .unwrap();
        assert_eq!(level.entry_function(), DEFAULT_ENTRY_FUNCTION);
    }

    #[test]
    fn test_level_rejects_unknown_expected_type() {
        let result: Result<Level, _> = serde_json::from_value(json!({
            "id": 4,
            "expectedType": "list",
            "expectedValue": []
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_level_view_hides_test_cases() {
        let level: Level = serde_json::from_value(json!({
            "id": 5,
            "title": "Add",
            "expectedType": "number",
            "inputs": [[1, 1]],
            "expectedOutputs": [2]
        }))
        .unwrap();
        let view = serde_json::to_value(level.view(2, 5)).unwrap();
        assert_eq!(view["number"], 2);
        assert_eq!(view["total"], 5);
        assert_eq!(view["entryFunction"], "test");
        assert!(view.get("inputs").is_none());
        assert!(view.get("expectedOutputs").is_none());
    }
}
