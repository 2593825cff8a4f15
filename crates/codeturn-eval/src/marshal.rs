//! Turning a level's test call into Python source.
//!
//! Arguments are never spliced in as raw text. Each JSON value goes
//! through an allow-list of literal encodings:
//!
//! | JSON      | Python literal            |
//! |-----------|---------------------------|
//! | number    | the number as written     |
//! | string    | JSON string literal       |
//! | `true`    | `True`                    |
//! | `false`   | `False`                   |
//! | `null`    | `None`                    |
//! | array     | list of the above         |
//!
//! JSON string escapes (`\"`, `\\`, `\n`, `\uXXXX`) mean the same thing in
//! a Python string literal, so a submitted string can't break out of its
//! quotes.

use serde_json::Value;

use crate::EvalError;

/// Exit status the call guard uses when the entry function isn't defined.
pub const MISSING_ENTRY_EXIT_CODE: i32 = 97;

/// A call to append after the submitted code.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCall {
    pub function: String,
    pub args: Vec<Value>,
}

impl EntryCall {
    pub fn new(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

/// Encode one value as a Python literal.
pub fn python_literal(value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Null => Ok("None".to_string()),
        Value::Bool(true) => Ok("True".to_string()),
        Value::Bool(false) => Ok("False".to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => serde_json::to_string(s)
            .map_err(|e| EvalError::UnsupportedArgument(e.to_string())),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(python_literal)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", parts.join(", ")))
        }
        Value::Object(_) => Err(EvalError::UnsupportedArgument(
            "objects cannot be passed as arguments".to_string(),
        )),
    }
}

/// `true` for names Python accepts as a plain ASCII identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Build the program to run: the submitted code, then (for function
/// levels) a guarded call whose result is printed.
///
/// The guard looks the function up before calling it, so a missing
/// function exits with [`MISSING_ENTRY_EXIT_CODE`] while an exception
/// raised *inside* the function still surfaces as a normal traceback.
pub fn compose_program(code: &str, call: Option<&EntryCall>) -> Result<String, EvalError> {
    let Some(call) = call else {
        return Ok(code.to_string());
    };
    if !is_identifier(&call.function) {
        return Err(EvalError::InvalidEntryFunction(call.function.clone()));
    }

    let args = call
        .args
        .iter()
        .map(python_literal)
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");

    let mut program = String::with_capacity(code.len() + 256);
    program.push_str(code);
    if !code.ends_with('\n') {
        program.push('\n');
    }
    program.push_str(&format!(
        "\n\
         import sys as _codeturn_sys\n\
         _codeturn_entry = globals().get({name:?})\n\
         if not callable(_codeturn_entry):\n\
         \x20   _codeturn_sys.exit({code})\n\
         print(_codeturn_entry({args}))\n",
        name = call.function,
        code = MISSING_ENTRY_EXIT_CODE,
    ));
    Ok(program)
}
