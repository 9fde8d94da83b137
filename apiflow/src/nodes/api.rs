//! API node: performs one HTTP request described by the node configuration.

use crate::core::{Value, ValueMap};
use crate::errors::TaskError;
use crate::tasks::{Task, TaskContext};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::debug;

/// Per-request ceiling; independent of the run deadline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Sends `method` to `url` with optional `headers` and string `body`.
///
/// Output is `{status, statusText, headers, data}`, where `data` is the
/// parsed JSON body or the raw text when it is not JSON. Non-2xx responses
/// are still successful node outputs; a verification node downstream decides
/// whether they are acceptable.
#[derive(Debug, Clone)]
pub struct ApiNode {
    client: Client,
}

impl ApiNode {
    /// Creates a node with its own client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Creates a node sharing an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn request_parts(config: &Value) -> Result<(Method, &str), TaskError> {
        let method = config
            .get("method")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| TaskError::config("method is required"))?;
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| TaskError::config("url is required"))?;

        if !METHODS.contains(&method) {
            return Err(TaskError::config(format!("invalid HTTP method: {method}")));
        }
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| TaskError::config(format!("invalid HTTP method: {method}")))?;
        Ok((method, url))
    }
}

#[async_trait]
impl Task for ApiNode {
    fn validate(&self, config: &Value) -> Result<(), TaskError> {
        Self::request_parts(config).map(|_| ())
    }

    async fn execute(&self, ctx: &TaskContext, _input: ValueMap) -> Result<Value, TaskError> {
        let (method, url) = Self::request_parts(&ctx.config)?;
        let mut request = self.client.request(method.clone(), url);

        let mut has_content_type = false;
        if let Some(headers) = ctx.config_value("headers").and_then(Value::as_map) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    has_content_type |= name.eq_ignore_ascii_case(CONTENT_TYPE.as_str());
                    request = request.header(name.as_str(), value);
                }
            }
        }

        if let Some(body) = ctx
            .config_value("body")
            .and_then(Value::as_str)
            .filter(|b| !b.is_empty())
        {
            if !has_content_type {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            request = request.body(body.to_string());
        }

        debug!(node_id = %ctx.node_id, %method, url, "Sending request");
        let response = tokio::select! {
            () = ctx.cancel.cancelled() => return Err(TaskError::Cancelled),
            response = request.send() => {
                response.map_err(|e| TaskError::execution(format!("request failed: {e}")))?
            }
        };

        let status = response.status();
        let headers: ValueMap = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), Value::from(v)))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| TaskError::execution(format!("failed to read response: {e}")))?;
        let data = serde_json::from_str::<serde_json::Value>(&text)
            .map_or_else(|_| Value::from(text), Value::from);

        let status_text = match status.canonical_reason() {
            Some(reason) => format!("{} {reason}", status.as_u16()),
            None => status.as_u16().to_string(),
        };

        Ok([
            ("status".to_string(), Value::from(u64::from(status.as_u16()))),
            ("statusText".to_string(), Value::from(status_text)),
            ("headers".to_string(), Value::Map(headers)),
            ("data".to_string(), data),
        ]
        .into_iter()
        .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_requires_method_and_url() {
        let node = ApiNode::with_client(Client::new());

        let err = node.validate(&Value::from(json!({"url": "http://x"}))).unwrap_err();
        assert_eq!(err.to_string(), "method is required");

        let err = node.validate(&Value::from(json!({"method": "GET"}))).unwrap_err();
        assert_eq!(err.to_string(), "url is required");

        let err = node
            .validate(&Value::from(json!({"method": "TRACE", "url": "http://x"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid HTTP method: TRACE");
        assert!(err.is_config_error());

        assert!(node
            .validate(&Value::from(json!({"method": "PATCH", "url": "http://x"})))
            .is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_execution() {
        let node = ApiNode::new().unwrap();
        // Port 9 (discard) on loopback is not expected to accept connections.
        let ctx = TaskContext::new(uuid::Uuid::nil(), "api", "api")
            .with_config(Value::from(json!({"method": "GET", "url": "http://127.0.0.1:9/"})));

        let err = node.execute(&ctx, ValueMap::new()).await.unwrap_err();
        assert!(!err.is_config_error());
        assert!(err.to_string().starts_with("request failed"));
    }
}
