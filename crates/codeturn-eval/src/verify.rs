//! Type-aware comparison of program output against the expected value.

use codeturn_protocol::ExpectedType;
use serde_json::Value;

/// Default tolerance for `number` comparisons.
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Compare trimmed `obtained` output against `expected`.
///
/// - `number`: both sides parsed as `f64`, equal within `epsilon`
///   (relative for large magnitudes), so `3` matches `3.0`.
/// - `boolean`: case-insensitive `true`/`false`, so `False` matches `false`.
/// - `string`: exact equality after trimming.
pub fn outputs_match(
    expected_type: ExpectedType,
    expected: &Value,
    obtained: &str,
    epsilon: f64,
) -> bool {
    let obtained = obtained.trim();
    match expected_type {
        ExpectedType::Number => {
            let (Some(want), Ok(got)) = (as_number(expected), obtained.parse::<f64>()) else {
                return false;
            };
            if !want.is_finite() || !got.is_finite() {
                return false;
            }
            let scale = want.abs().max(got.abs()).max(1.0);
            (want - got).abs() <= epsilon * scale
        }
        ExpectedType::Boolean => {
            let Some(want) = as_bool(expected) else {
                return false;
            };
            match obtained.to_ascii_lowercase().as_str() {
                "true" => want,
                "false" => !want,
                _ => false,
            }
        }
        ExpectedType::String => display_value(expected).trim() == obtained,
    }
}

/// Render an expected value the way players would type it.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(ty: ExpectedType, expected: Value, obtained: &str) -> bool {
        outputs_match(ty, &expected, obtained, DEFAULT_EPSILON)
    }

    #[test]
    fn test_number_integer_output_matches_float_expected() {
        assert!(check(ExpectedType::Number, json!(3.0), "3"));
        assert!(check(ExpectedType::Number, json!(3), "3.0\n"));
    }

    #[test]
    fn test_number_within_epsilon_matches() {
        assert!(check(ExpectedType::Number, json!(0.3), "0.30000000000000004"));
        assert!(!check(ExpectedType::Number, json!(0.3), "0.31"));
    }

    #[test]
    fn test_number_non_numeric_output_is_mismatch() {
        assert!(!check(ExpectedType::Number, json!(1), "one"));
        assert!(!check(ExpectedType::Number, json!(1), ""));
        assert!(!check(ExpectedType::Number, json!(1), "nan"));
    }

    #[test]
    fn test_number_expected_as_string_is_parsed() {
        assert!(check(ExpectedType::Number, json!("42"), "42"));
    }

    #[test]
    fn test_boolean_is_case_insensitive() {
        assert!(check(ExpectedType::Boolean, json!(false), "False"));
        assert!(check(ExpectedType::Boolean, json!(true), "TRUE\n"));
        assert!(!check(ExpectedType::Boolean, json!(true), "False"));
    }

    #[test]
    fn test_boolean_other_tokens_are_mismatch() {
        assert!(!check(ExpectedType::Boolean, json!(true), "1"));
        assert!(!check(ExpectedType::Boolean, json!(false), "None"));
    }

    #[test]
    fn test_string_matches_after_trim() {
        assert!(check(ExpectedType::String, json!("hi"), "hi\n"));
        assert!(check(ExpectedType::String, json!("hi"), "  hi  "));
    }

    #[test]
    fn test_string_is_case_sensitive() {
        assert!(!check(ExpectedType::String, json!("hi"), "Hi"));
    }

    #[test]
    fn test_display_value_strips_string_quotes() {
        assert_eq!(display_value(&json!("hi")), "hi");
        assert_eq!(display_value(&json!(3.5)), "3.5");
        assert_eq!(display_value(&json!(false)), "false");
    }
}
