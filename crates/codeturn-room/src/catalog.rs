//! The level catalog: an ordered, read-only list of levels.
//!
//! Loaded once at startup and shared by every room through an `Arc`.
//! Anything wrong with the file is a [`CatalogError`] and stops the
//! server from starting; rooms never see a half-valid catalog.

use std::collections::HashSet;
use std::path::Path;

use codeturn_eval::marshal::is_identifier;
use codeturn_protocol::{ExpectedType, Level};
use serde::Deserialize;
use serde_json::Value;

use crate::CatalogError;

/// Accepted file shapes: `{"levels": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped { levels: Vec<Level> },
    Bare(Vec<Level>),
}

/// Ordered levels. Index 0 is shown to players as level 1.
#[derive(Debug, Clone)]
pub struct LevelCatalog {
    levels: Vec<Level>,
}

impl LevelCatalog {
    /// Read and validate a catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), levels = catalog.len(), "level catalog loaded");
        Ok(catalog)
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let levels = match serde_json::from_str::<CatalogFile>(text)? {
            CatalogFile::Wrapped { levels } | CatalogFile::Bare(levels) => levels,
        };
        Self::from_levels(levels)
    }

    /// Validate an in-memory list of levels.
    pub fn from_levels(levels: Vec<Level>) -> Result<Self, CatalogError> {
        if levels.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for level in &levels {
            if !seen.insert(level.id) {
                return Err(CatalogError::DuplicateId(level.id));
            }
            validate_level(level).map_err(|reason| CatalogError::InvalidLevel {
                id: level.id,
                reason,
            })?;
        }
        Ok(Self { levels })
    }

    pub fn get(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.levels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter()
    }
}

fn validate_level(level: &Level) -> Result<(), String> {
    match (&level.inputs, &level.expected_outputs) {
        (Some(inputs), Some(outputs)) => {
            if inputs.is_empty() {
                return Err("inputs must not be empty".into());
            }
            if inputs.len() != outputs.len() {
                return Err(format!(
                    "{} inputs but {} expected outputs",
                    inputs.len(),
                    outputs.len()
                ));
            }
            if !is_identifier(level.entry_function()) {
                return Err(format!(
                    "entry function {:?} is not a valid identifier",
                    level.entry_function()
                ));
            }
            for input in inputs {
                if input.args().iter().any(contains_object) {
                    return Err("inputs may not contain objects".into());
                }
            }
            for output in outputs {
                check_fits(level.expected_type, output)?;
            }
            Ok(())
        }
        (Some(_), None) => Err("inputs without expectedOutputs".into()),
        (None, Some(_)) => Err("expectedOutputs without inputs".into()),
        (None, None) => match &level.expected_value {
            Some(value) => check_fits(level.expected_type, value),
            None => Err("needs expectedValue or inputs/expectedOutputs".into()),
        },
    }
}

fn contains_object(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(contains_object),
        _ => false,
    }
}

fn check_fits(expected_type: ExpectedType, value: &Value) -> Result<(), String> {
    let fits = match (expected_type, value) {
        (ExpectedType::Number, Value::Number(_)) => true,
        (ExpectedType::Number, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
        (ExpectedType::Boolean, Value::Bool(_)) => true,
        (ExpectedType::Boolean, Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "false")
        }
        (ExpectedType::String, Value::String(_) | Value::Number(_) | Value::Bool(_)) => true,
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(format!("expected value {value} is not a {expected_type}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<LevelCatalog, CatalogError> {
        LevelCatalog::from_json(text)
    }

    #[test]
    fn test_from_json_wrapped_and_bare_arrays() {
        let wrapped = parse(r#"{"levels":[{"id":1,"expectedType":"number","expectedValue":1}]}"#)
            .unwrap();
        let bare = parse(r#"[{"id":1,"expectedType":"number","expectedValue":1}]"#).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(bare.len(), 1);
    }

    #[test]
    fn test_from_json_keeps_order() {
        let catalog = parse(
            r#"[{"id":7,"expectedType":"string","expectedValue":"a"},
                {"id":3,"expectedType":"boolean","expectedValue":true}]"#,
        )
        .unwrap();
        assert_eq!(catalog.get(0).unwrap().id, 7);
        assert_eq!(catalog.get(1).unwrap().id, 3);
        assert!(!catalog.is_last(0));
        assert!(catalog.is_last(1));
    }

    #[test]
    fn test_from_json_empty_is_error() {
        assert!(matches!(parse(r#"{"levels":[]}"#), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_from_json_malformed_is_parse_error() {
        assert!(matches!(parse("{not json"), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_from_json_duplicate_ids_rejected() {
        let result = parse(
            r#"[{"id":1,"expectedType":"number","expectedValue":1},
                {"id":1,"expectedType":"number","expectedValue":2}]"#,
        );
        assert!(matches!(result, Err(CatalogError::DuplicateId(1))));
    }

    #[test]
    fn test_level_without_expectation_rejected() {
        let result = parse(r#"[{"id":1,"expectedType":"number"}]"#);
        assert!(matches!(result, Err(CatalogError::InvalidLevel { id: 1, .. })));
    }

    #[test]
    fn test_level_mismatched_case_lengths_rejected() {
        let result = parse(
            r#"[{"id":2,"expectedType":"number","inputs":[[1],[2]],"expectedOutputs":[1]}]"#,
        );
        assert!(matches!(result, Err(CatalogError::InvalidLevel { id: 2, .. })));
    }

    #[test]
    fn test_level_expected_value_must_fit_type() {
        let result = parse(r#"[{"id":3,"expectedType":"boolean","expectedValue":"yes"}]"#);
        assert!(matches!(result, Err(CatalogError::InvalidLevel { id: 3, .. })));
        let ok = parse(r#"[{"id":3,"expectedType":"number","expectedValue":"2.5"}]"#);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_level_object_inputs_rejected() {
        let result = parse(
            r#"[{"id":4,"expectedType":"number","inputs":[[{"a":1}]],"expectedOutputs":[1]}]"#,
        );
        assert!(matches!(result, Err(CatalogError::InvalidLevel { id: 4, .. })));
    }

    #[test]
    fn test_level_bad_entry_function_rejected() {
        let result = parse(
            r#"[{"id":5,"expectedType":"number","inputs":[[1]],"expectedOutputs":[1],"entryFunction":"os.system"}]"#,
        );
        assert!(matches!(result, Err(CatalogError::InvalidLevel { id: 5, .. })));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = LevelCatalog::load("/definitely/not/here/levels.json");
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }
}
