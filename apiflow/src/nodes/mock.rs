//! Mock node: returns a canned response after an optional delay.

use crate::core::{Value, ValueMap};
use crate::errors::TaskError;
use crate::tasks::{Task, TaskContext};
use crate::utils::unix_seconds;
use async_trait::async_trait;
use std::time::Duration;

/// Returns `mockResponse`, optionally after `mockDelay` milliseconds.
///
/// A mapping response is returned as-is; any other non-null response is
/// wrapped as `{"status": 200, "data": <response>}`. Without a response the
/// node returns a default payload stamped with the current Unix time.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockNode;

impl MockNode {
    fn delay(config: &Value) -> Result<Option<Duration>, TaskError> {
        let Some(ms) = config.get("mockDelay").and_then(Value::as_f64) else {
            return Ok(None);
        };
        if ms <= 0.0 {
            return Ok(None);
        }
        Duration::try_from_secs_f64(ms / 1000.0)
            .map(Some)
            .map_err(|_| TaskError::config(format!("mockDelay out of range: {ms}")))
    }

    fn response(config: &Value) -> Value {
        match config.get("mockResponse") {
            Some(map @ Value::Map(_)) => map.clone(),
            Some(other) if !other.is_null() => envelope(other.clone()),
            _ => {
                let data: Value = [
                    ("message".to_string(), Value::from("Mock response")),
                    ("timestamp".to_string(), Value::from(unix_seconds())),
                ]
                .into_iter()
                .collect();
                envelope(data)
            }
        }
    }
}

fn envelope(data: Value) -> Value {
    [
        ("status".to_string(), Value::from(200_i64)),
        ("data".to_string(), data),
    ]
    .into_iter()
    .collect()
}

#[async_trait]
impl Task for MockNode {
    fn validate(&self, config: &Value) -> Result<(), TaskError> {
        Self::delay(config).map(|_| ())
    }

    async fn execute(&self, ctx: &TaskContext, _input: ValueMap) -> Result<Value, TaskError> {
        if let Some(delay) = Self::delay(&ctx.config)? {
            tokio::select! {
                () = ctx.cancel.cancelled() => return Err(TaskError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
        Ok(Self::response(&ctx.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn ctx(config: serde_json::Value) -> TaskContext {
        TaskContext::new(Uuid::nil(), "M", "mock").with_config(Value::from(config))
    }

    #[test]
    fn test_unrepresentable_delay_rejected() {
        let config = Value::from(json!({"mockDelay": 1e300}));
        let err = MockNode.validate(&config).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().starts_with("mockDelay out of range"));

        assert!(MockNode.validate(&Value::from(json!({"mockDelay": 25}))).is_ok());
        assert!(MockNode.validate(&Value::from(json!({"mockDelay": -5}))).is_ok());
        assert!(MockNode.validate(&Value::from(json!({}))).is_ok());
    }

    #[tokio::test]
    async fn test_map_response_returned_verbatim() {
        let out = MockNode
            .execute(&ctx(json!({"mockResponse": {"data": {"x": 1}}})), ValueMap::new())
            .await
            .unwrap();
        assert_eq!(out.to_json(), json!({"data": {"x": 1}}));
    }

    #[tokio::test]
    async fn test_scalar_response_wrapped() {
        let out = MockNode
            .execute(&ctx(json!({"mockResponse": [1, 2]})), ValueMap::new())
            .await
            .unwrap();
        assert_eq!(out.to_json(), json!({"status": 200, "data": [1, 2]}));
    }

    #[tokio::test]
    async fn test_default_response() {
        let out = MockNode.execute(&ctx(json!({})), ValueMap::new()).await.unwrap();
        assert_eq!(out.get("status").and_then(Value::as_u64), Some(200));
        let data = out.data_map().unwrap();
        assert_eq!(data.get("message").and_then(Value::as_str), Some("Mock response"));
        assert!(data.contains_key("timestamp"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_honoured() {
        let start = tokio::time::Instant::now();
        MockNode
            .execute(&ctx(json!({"mockDelay": 250})), ValueMap::new())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_cancellable() {
        let ctx = ctx(json!({"mockDelay": 60_000}));
        ctx.cancel.cancel("stop");
        let err = MockNode.execute(&ctx, ValueMap::new()).await.unwrap_err();
        assert_eq!(err, TaskError::Cancelled);
    }
}
