//! Report node: summarizes everything upstream into a named report.

use crate::core::{Value, ValueMap};
use crate::errors::TaskError;
use crate::tasks::{Task, TaskContext};
use crate::utils::{now_utc, rfc3339};
use async_trait::async_trait;

const DEFAULT_REPORT_NAME: &str = "Test Report";

/// Emits `{name, timestamp, input, status: "completed"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportNode;

#[async_trait]
impl Task for ReportNode {
    async fn execute(&self, ctx: &TaskContext, input: ValueMap) -> Result<Value, TaskError> {
        let name = ctx
            .config_value("reportName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_REPORT_NAME);

        Ok([
            ("name".to_string(), Value::from(name)),
            ("timestamp".to_string(), Value::from(rfc3339(&now_utc()))),
            ("input".to_string(), Value::Map(input)),
            ("status".to_string(), Value::from("completed")),
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

    #[tokio::test]
    async fn test_report_defaults() {
        let ctx = TaskContext::new(Uuid::nil(), "R", "report");
        let mut input = ValueMap::new();
        input.insert("A".into(), Value::from(json!({"data": {"x": 1}})));

        let out = ReportNode.execute(&ctx, input).await.unwrap();
        assert_eq!(out.get("name").and_then(Value::as_str), Some("Test Report"));
        assert_eq!(out.get("status").and_then(Value::as_str), Some("completed"));
        assert_eq!(out.get("input").map(Value::to_json), Some(json!({"A": {"data": {"x": 1}}})));
        assert!(out
            .get("timestamp")
            .and_then(Value::as_str)
            .is_some_and(|ts| chrono::DateTime::parse_from_rfc3339(ts).is_ok()));
    }

    #[tokio::test]
    async fn test_report_name() {
        let ctx = TaskContext::new(Uuid::nil(), "R", "report")
            .with_config(Value::from(json!({"reportName": "Nightly"})));
        let out = ReportNode.execute(&ctx, ValueMap::new()).await.unwrap();
        assert_eq!(out.get("name").and_then(Value::as_str), Some("Nightly"));
    }
}
