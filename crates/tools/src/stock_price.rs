//! Latest stock quote through Alpha Vantage's `GLOBAL_QUOTE` endpoint.

use async_trait::async_trait;
use serde_json::{Value, json};
use toolchat_core::error::ToolError;
use toolchat_core::tool::Tool;
use tracing::debug;

const ALPHA_VANTAGE_API: &str = "https://www.alphavantage.co";

pub struct StockPriceTool {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl StockPriceTool {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: ALPHA_VANTAGE_API.into(),
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

fn valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= 12
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'))
}

#[async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &str {
        "get_stock_price"
    }

    fn description(&self) -> &str {
        "Fetch the latest stock price for a given symbol (e.g. 'AAPL', 'TSLA') using Alpha Vantage."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": { "type": "string", "description": "Ticker symbol, e.g. AAPL" }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let symbol = arguments["symbol"]
            .as_str()
            .map(|s| s.trim().to_ascii_uppercase())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'symbol' argument".into()))?;
        if !valid_symbol(&symbol) {
            return Err(ToolError::InvalidArguments(format!("Invalid ticker symbol '{symbol}'")));
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| self.failure("ALPHA_VANTAGE_API_KEY is not configured"))?;

        debug!(symbol = %symbol, "Fetching stock quote");
        let response = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol.as_str()),
                ("apikey", api_key),
            ])
            .send()
            .await
            .map_err(|e| self.failure(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.failure(format!("quote API returned {}", response.status())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| self.failure(format!("unreadable response: {e}")))?;

        // Alpha Vantage reports most failures with HTTP 200 and an explanatory field.
        if let Some(message) = body["Error Message"].as_str() {
            return Err(self.failure(message.to_string()));
        }
        Ok(body)
    }
}
