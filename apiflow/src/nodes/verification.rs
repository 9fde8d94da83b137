//! Verification node: asserts on the output of upstream nodes.

use crate::core::{Value, ValueMap};
use crate::errors::TaskError;
use crate::tasks::{Task, TaskContext};
use async_trait::async_trait;
use regex::Regex;

/// Supported assertion kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionType {
    /// Canonical JSON of expected and actual are identical.
    Equals,
    /// The expected text occurs in the canonical JSON of actual.
    Contains,
    /// The expected pattern matches the canonical JSON of actual.
    Regex,
    /// Reserved for user scripts; always passes.
    Custom,
}

impl AssertionType {
    fn from_config(config: &Value) -> Result<Self, TaskError> {
        match config.get("assertionType") {
            None | Some(Value::Null) => Ok(Self::Equals),
            Some(Value::String(s)) => match s.as_str() {
                "" | "equals" => Ok(Self::Equals),
                "contains" => Ok(Self::Contains),
                "regex" => Ok(Self::Regex),
                "custom" => Ok(Self::Custom),
                other => Err(TaskError::config(format!("invalid assertion type: {other}"))),
            },
            Some(other) => Err(TaskError::config(format!("invalid assertion type: {other}"))),
        }
    }
}

/// Compares upstream data against `expected` using `assertionType`.
///
/// The value under test is the `data` mapping flattened into the input when
/// present, otherwise the whole input.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationNode;

impl VerificationNode {
    fn actual(input: ValueMap) -> Value {
        match input.get("data") {
            Some(data @ Value::Map(_)) => data.clone(),
            _ => Value::Map(input),
        }
    }

    fn check(kind: AssertionType, expected: &Value, actual: &Value) -> Result<bool, TaskError> {
        let actual_json = actual.canonical_json();
        match kind {
            AssertionType::Equals => Ok(expected.canonical_json() == actual_json),
            AssertionType::Contains => {
                let needle = match expected {
                    Value::String(s) => s.clone(),
                    other => other.canonical_json(),
                };
                Ok(actual_json.contains(&needle))
            }
            AssertionType::Regex => {
                let pattern = expected
                    .as_str()
                    .ok_or_else(|| TaskError::execution("regex pattern must be a string"))?;
                let re = Regex::new(pattern)
                    .map_err(|e| TaskError::execution(format!("invalid regex pattern: {e}")))?;
                Ok(re.is_match(&actual_json))
            }
            AssertionType::Custom => Ok(true),
        }
    }
}

#[async_trait]
impl Task for VerificationNode {
    fn validate(&self, config: &Value) -> Result<(), TaskError> {
        AssertionType::from_config(config).map(|_| ())
    }

    async fn execute(&self, ctx: &TaskContext, input: ValueMap) -> Result<Value, TaskError> {
        let kind = AssertionType::from_config(&ctx.config)?;
        let expected = ctx
            .config_value("expected")
            .cloned()
            .ok_or_else(|| TaskError::execution("expected value is required"))?;
        let actual = Self::actual(input);

        if !Self::check(kind, &expected, &actual)? {
            return Err(TaskError::execution(format!(
                "verification failed: expected {expected}, got {actual}"
            )));
        }

        Ok([
            ("passed".to_string(), Value::from(true)),
            ("expected".to_string(), expected),
            ("actual".to_string(), actual),
        ]
        .into_iter()
        .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn ctx(config: serde_json::Value) -> TaskContext {
        TaskContext::new(Uuid::nil(), "V", "verification").with_config(Value::from(config))
    }

    fn input(value: serde_json::Value) -> ValueMap {
        match Value::from(value) {
            Value::Map(map) => map,
            _ => ValueMap::new(),
        }
    }

    #[test]
    fn test_validate_assertion_type() {
        let node = VerificationNode;
        assert!(node.validate(&Value::Null).is_ok());
        assert!(node.validate(&Value::from(json!({"assertionType": "regex"}))).is_ok());

        let err = node
            .validate(&Value::from(json!({"assertionType": "fuzzy"})))
            .unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(err.to_string(), "invalid assertion type: fuzzy");
    }

    #[tokio::test]
    async fn test_equals_on_data() {
        let out = VerificationNode
            .execute(
                &ctx(json!({"expected": {"x": 1}})),
                input(json!({"data": {"x": 1}, "A": {"data": {"x": 1}}})),
            )
            .await
            .unwrap();
        assert_eq!(out.get("passed").and_then(Value::as_bool), Some(true));
    }

    #[tokio::test]
    async fn test_equals_mismatch() {
        let err = VerificationNode
            .execute(&ctx(json!({"expected": {"x": 2}})), input(json!({"data": {"x": 1}})))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("verification failed: expected {\"x\":2}"));
    }

    #[tokio::test]
    async fn test_contains_and_regex() {
        let data = json!({"data": {"message": "hello world"}});

        VerificationNode
            .execute(
                &ctx(json!({"assertionType": "contains", "expected": "hello"})),
                input(data.clone()),
            )
            .await
            .unwrap();

        VerificationNode
            .execute(
                &ctx(json!({"assertionType": "regex", "expected": "w[o]rld"})),
                input(data.clone()),
            )
            .await
            .unwrap();

        let err = VerificationNode
            .execute(&ctx(json!({"assertionType": "regex", "expected": 5})), input(data))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "regex pattern must be a string");
    }

    #[tokio::test]
    async fn test_missing_expected() {
        let err = VerificationNode
            .execute(&ctx(json!({})), ValueMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, TaskError::execution("expected value is required"));
    }

    #[tokio::test]
    async fn test_custom_passes() {
        let out = VerificationNode
            .execute(
                &ctx(json!({"assertionType": "custom", "expected": null})),
                ValueMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.get("passed").and_then(Value::as_bool), Some(true));
    }
}
