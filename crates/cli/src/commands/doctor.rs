//! `toolchat doctor`: Diagnose configuration and backends.

use std::path::Path;
use std::time::Duration;

use toolchat_checkpoint::BackendKind;
use toolchat_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("toolchat doctor");
    println!("===============\n");

    let mut issues = 0;

    let path = config_path.map_or_else(AppConfig::config_path, Path::to_path_buf);
    if path.exists() {
        println!("  [ok]   Config file: {}", path.display());
    } else {
        println!("  [warn] No config file at {}; using defaults (run `toolchat init`)", path.display());
    }

    let config = match AppConfig::load_with(config_path) {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 issue found. Fix the config and re-run.");
            return Ok(());
        }
    };

    // Provider
    match toolchat_providers::router::build_from_config(&config) {
        Ok(provider) => println!(
            "  [ok]   Provider: {} ({})",
            provider.name(),
            config.default_model
        ),
        Err(e) => {
            println!("  [fail] Provider: {e}");
            issues += 1;
        }
    }

    // Checkpoint backend, without the in-memory fallback
    let backend = BackendKind::from_url(config.checkpoint.database_url.as_deref());
    match backend {
        Some(BackendKind::Memory) => {
            println!("  [warn] Checkpoints: in-memory only, sessions are lost on restart")
        }
        Some(kind) => match toolchat_checkpoint::connect(&config.checkpoint).await {
            Ok(store) => println!("  [ok]   Checkpoints: {} reachable ({kind:?})", store.name()),
            Err(e) => {
                let fallback = if config.checkpoint.fallback_to_memory {
                    "serve would fall back to memory"
                } else {
                    "serve would refuse to start"
                };
                println!("  [fail] Checkpoints: {e} ({fallback})");
                issues += 1;
            }
        },
        None => {
            println!("  [fail] Checkpoints: unsupported database URL scheme");
            issues += 1;
        }
    }

    // Tools
    let call_timeout = Duration::from_secs(config.agent.tool_timeout_secs);
    match toolchat_tools::default_registry(&config.tools, call_timeout) {
        Ok(tools) => println!("  [ok]   Tools: {}", tools.names().join(", ")),
        Err(e) => {
            println!("  [fail] Tools: {e}");
            issues += 1;
        }
    }
    if config.tools.tavily_api_key.is_none() {
        println!("  [warn] TAVILY_API_KEY not set; tavily_search_results_json will return errors");
    }
    if config.tools.alpha_vantage_api_key.is_none() {
        println!("  [warn] ALPHA_VANTAGE_API_KEY not set; get_stock_price will return errors");
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
