//! Secondary web search through the DuckDuckGo instant-answer API.
//!
//! Needs no API key. Returns the same `[{"url", "content"}]` shape as the
//! Tavily tool so the model can treat both alike.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use toolchat_core::error::ToolError;
use toolchat_core::tool::Tool;
use tracing::debug;

const DUCKDUCKGO_API: &str = "https://api.duckduckgo.com";

pub struct DuckDuckGoSearchTool {
    client: reqwest::Client,
    region: String,
    max_results: u32,
    base_url: String,
}

impl DuckDuckGoSearchTool {
    pub fn new(client: reqwest::Client, region: impl Into<String>, max_results: u32) -> Self {
        Self {
            client,
            region: region.into(),
            max_results,
            base_url: DUCKDUCKGO_API.into(),
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

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a single topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

impl InstantAnswer {
    fn into_hits(self, limit: usize) -> Vec<Value> {
        let mut hits = Vec::new();
        if !self.answer.is_empty() {
            hits.push(json!({ "url": self.abstract_url, "content": self.answer }));
        }
        if !self.abstract_text.is_empty() {
            hits.push(json!({ "url": self.abstract_url, "content": self.abstract_text }));
        }
        let mut stack: Vec<RelatedTopic> = self.related_topics.into_iter().rev().collect();
        while let Some(topic) = stack.pop() {
            match topic {
                RelatedTopic::Topic { text, first_url } if !text.is_empty() => {
                    hits.push(json!({ "url": first_url, "content": text }));
                }
                RelatedTopic::Topic { .. } => {}
                RelatedTopic::Group { topics } => stack.extend(topics.into_iter().rev()),
            }
        }
        hits.truncate(limit);
        hits
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearchTool {
    fn name(&self) -> &str {
        "duckduckgo_search"
    }

    fn description(&self) -> &str {
        "A wrapper around DuckDuckGo Search. Useful for answering questions about current events \
         or general knowledge. Input should be a search query."
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

        debug!(query = %query, region = %self.region, "DuckDuckGo search");
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
                ("kl", self.region.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.failure(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.failure(format!("search API returned {}", response.status())));
        }

        // The API answers with `application/x-javascript`, so parse the text ourselves.
        let text = response
            .text()
            .await
            .map_err(|e| self.failure(format!("unreadable response: {e}")))?;
        let answer: InstantAnswer = serde_json::from_str(&text)
            .map_err(|e| self.failure(format!("unexpected response: {e}")))?;

        Ok(Value::Array(answer.into_hits(self.max_results as usize)))
    }
}
