//! Built-in tool implementations for toolchat.
//!
//! Tools give the model access to the outside world: two web search
//! providers, arithmetic, and stock quotes. Network-backed tools share one
//! HTTP client.

pub mod calculator;
pub mod duckduckgo_search;
pub mod stock_price;
pub mod tavily_search;

pub use calculator::CalculatorTool;
pub use duckduckgo_search::DuckDuckGoSearchTool;
pub use stock_price::StockPriceTool;
pub use tavily_search::TavilySearchTool;

use std::time::Duration;
use toolchat_config::ToolsConfig;
use toolchat_core::tool::ToolRegistry;

/// Build the registry of all built-in tools.
///
/// `call_timeout` bounds each dispatched call; `config.http_timeout_secs`
/// bounds each individual HTTP request.
pub fn default_registry(config: &ToolsConfig, call_timeout: Duration) -> Result<ToolRegistry, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .user_agent(concat!("toolchat/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut registry = ToolRegistry::new().with_timeout(call_timeout);
    registry.register(Box::new(TavilySearchTool::new(
        client.clone(),
        config.tavily_api_key.clone(),
        config.search_max_results,
    )));
    registry.register(Box::new(DuckDuckGoSearchTool::new(
        client.clone(),
        config.duckduckgo_region.clone(),
        config.search_max_results,
    )));
    registry.register(Box::new(CalculatorTool));
    registry.register(Box::new(StockPriceTool::new(
        client,
        config.alpha_vantage_api_key.clone(),
    )));
    Ok(registry)
}
