//! `toolchat serve`: Start the HTTP/SSE gateway.

use std::path::Path;

use super::load_config;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("toolchat gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.default_provider, config.default_model);
    println!(
        "   Stream:    GET /chat_stream/{{message}}?checkpoint_id=<id>"
    );

    toolchat_gateway::start(config).await?;

    Ok(())
}
