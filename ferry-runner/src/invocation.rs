//! Invocation decoding
//!
//! Turns the three raw inputs (target reference, args JSON, kwargs JSON)
//! into a typed invocation. Both override encodings land here: command-style
//! flags and environment variables carry the same three strings.

use ferry_core::domain::target::TaskTarget;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Runner failures, each with its own process exit code
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("Could not bind {target}: {reason}")]
    Bind { target: String, reason: String },

    #[error("{target} failed: {message}")]
    TargetFailed { target: String, message: String },
}

impl RunnerError {
    pub fn bind(target: &TaskTarget, reason: impl Into<String>) -> Self {
        RunnerError::Bind {
            target: target.canonical(),
            reason: reason.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            RunnerError::InvalidInvocation(_) => 2,
            RunnerError::Bind { .. } => 3,
            RunnerError::TargetFailed { .. } => 4,
        }
    }
}

/// A decoded request to call one target
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub target: TaskTarget,
    pub args: Vec<JsonValue>,
    pub kwargs: Map<String, JsonValue>,
}

impl Invocation {
    /// Decode the raw inputs
    ///
    /// `args` must be a JSON array and `kwargs` a JSON object.
    pub fn decode(target: &str, args: &str, kwargs: &str) -> Result<Self, RunnerError> {
        let target = TaskTarget::parse(target)
            .map_err(|e| RunnerError::InvalidInvocation(e.to_string()))?;

        let args = match parse_json("args", args)? {
            JsonValue::Array(items) => items,
            other => {
                return Err(RunnerError::InvalidInvocation(format!(
                    "args must be a JSON array, got {}",
                    kind(&other)
                )));
            }
        };
        let kwargs = match parse_json("kwargs", kwargs)? {
            JsonValue::Object(map) => map,
            other => {
                return Err(RunnerError::InvalidInvocation(format!(
                    "kwargs must be a JSON object, got {}",
                    kind(&other)
                )));
            }
        };

        Ok(Self {
            target,
            args,
            kwargs,
        })
    }
}

fn parse_json(label: &str, text: &str) -> Result<JsonValue, RunnerError> {
    serde_json::from_str(text)
        .map_err(|e| RunnerError::InvalidInvocation(format!("{} is not valid JSON: {}", label, e)))
}

fn kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode() {
        let invocation =
            Invocation::decode("jobs.etl:run", r#"[1, "a"]"#, r#"{"mode": "full"}"#).unwrap();
        assert_eq!(invocation.target.module, "jobs.etl");
        assert_eq!(invocation.target.attribute, "run");
        assert_eq!(invocation.args, vec![json!(1), json!("a")]);
        assert_eq!(invocation.kwargs.get("mode"), Some(&json!("full")));
    }

    #[test]
    fn test_dotted_target() {
        let invocation = Invocation::decode("jobs.etl.run", "[]", "{}").unwrap();
        assert_eq!(invocation.target.module, "jobs.etl");
        assert!(invocation.args.is_empty());
        assert!(invocation.kwargs.is_empty());
    }

    #[test]
    fn test_shape_errors_exit_2() {
        for (args, kwargs) in [("{}", "{}"), ("[]", "[]"), ("not json", "{}"), ("[]", "1")] {
            let err = Invocation::decode("jobs.etl:run", args, kwargs).unwrap_err();
            assert_eq!(err.exit_code(), 2, "args={} kwargs={}", args, kwargs);
        }
    }

    #[test]
    fn test_bad_target_exits_2() {
        let err = Invocation::decode("nodots", "[]", "{}").unwrap_err();
        assert!(matches!(err, RunnerError::InvalidInvocation(_)));
    }
}
