//! Web search through the Tavily search API.
//!
//! Results come back as `[{"url": .., "content": ..}]`, best match first.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use toolchat_core::error::ToolError;
use toolchat_core::tool::Tool;
use tracing::debug;

const TAVILY_API: &str = "https://api.tavily.com";

pub struct TavilySearchTool {
    client: reqwest::Client,
    api_key: Option<String>,
    max_results: u32,
    base_url: String,
}

impl TavilySearchTool {
    pub fn new(client: reqwest::Client, api_key: Option<String>, max_results: u32) -> Self {
        Self {
            client,
            api_key,
            max_results,
            base_url: TAVILY_API.into(),
        }
    }

    /// Point the tool at a different endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn failure(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        "tavily_search_results_json"
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted results. \
         Useful for answering questions about current events. Input should be a search query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let query = arguments["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| self.failure("TAVILY_API_KEY is not configured"))?;

        debug!(query = %query, "Tavily search");
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(api_key)
            .json(&json!({
                "api_key": api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await
            .map_err(|e| self.failure(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.failure(format!("search API returned {}", response.status())));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| self.failure(format!("unreadable response: {e}")))?;

        let hits: Vec<Value> = body
            .results
            .into_iter()
            .take(self.max_results as usize)
            .map(|hit| json!({ "url": hit.url, "content": hit.content }))
            .collect();
        Ok(Value::Array(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use axum::{Json, Router, routing::post};

    fn tool(api_key: Option<&str>, base_url: &str) -> TavilySearchTool {
        TavilySearchTool::new(reqwest::Client::new(), api_key.map(String::from), 2)
            .with_base_url(base_url)
    }

    #[tokio::test]
    async fn returns_url_and_content_pairs() {
        let app = Router::new().route(
            "/search",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["query"], "rust async");
                Json(json!({
                    "query": "rust async",
                    "results": [
                        {"title": "A", "url": "https://a.example", "content": "first", "score": 0.9},
                        {"title": "B", "url": "https://b.example", "content": "second", "score": 0.8},
                        {"title": "C", "url": "https://c.example", "content": "third", "score": 0.1}
                    ]
                }))
            }),
        );
        let base = test_server::spawn(app).await;

        let out = tool(Some("tvly-test"), &base)
            .execute(json!({"query": "rust async"}))
            .await
            .unwrap();
        assert_eq!(
            out,
            json!([
                {"url": "https://a.example", "content": "first"},
                {"url": "https://b.example", "content": "second"}
            ])
        );
    }

    #[tokio::test]
    async fn missing_key_is_an_execution_error() {
        let err = tool(None, "http://127.0.0.1:1")
            .execute(json!({"query": "anything"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("TAVILY_API_KEY"));
    }

    #[tokio::test]
    async fn upstream_error_status_is_reported() {
        let app = Router::new().route(
            "/search",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = test_server::spawn(app).await;
        let err = tool(Some("k"), &base)
            .execute(json!({"query": "q"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn blank_query_rejected() {
        let err = tool(Some("k"), "http://127.0.0.1:1")
            .execute(json!({"query": "  "}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn tool_definition() {
        let def = tool(None, TAVILY_API).to_definition();
        assert_eq!(def.name, "tavily_search_results_json");
        assert_eq!(def.parameters["required"][0], "query");
    }
}
