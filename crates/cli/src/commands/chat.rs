//! `toolchat chat`: Run one turn against the configured backends.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use toolchat_agent::{AppContext, StreamEvent, chat_stream};
use toolchat_config::AppConfig;

use super::load_config;

pub async fn run(
    config_path: Option<&Path>,
    message: String,
    checkpoint_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    if config.default_provider == "groq" && !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set GROQ_API_KEY (or TOOLCHAT_API_KEY), or add api_key to:");
        eprintln!("    {}", config_path.map_or_else(AppConfig::config_path, Path::to_path_buf).display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let ctx = Arc::new(AppContext::build(&config).await?);
    let mut session = checkpoint_id.clone();
    let mut events = chat_stream::start(ctx, message, checkpoint_id);

    let mut stdout = std::io::stdout();
    let mut failed = false;
    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Checkpoint { checkpoint_id } => session = Some(checkpoint_id),
            StreamEvent::Content { content } => {
                print!("{content}");
                stdout.flush()?;
            }
            StreamEvent::ToolOutput { output } => {
                let status = if output.success { "ok" } else { "error" };
                println!("\n[{} {}] {}", output.name, status, output.result);
            }
            StreamEvent::LoopLimitExceeded { max_iterations } => {
                eprintln!("\n[stopped after {max_iterations} model decisions]");
            }
            StreamEvent::Error { message } => {
                eprintln!("\n[error] {message}");
                failed = true;
            }
            StreamEvent::End => println!(),
        }
    }

    if let Some(id) = session {
        eprintln!("session: {id}");
        eprintln!("resume with: toolchat chat --checkpoint-id {id} \"...\"");
    }

    if failed {
        return Err("the model could not be reached".into());
    }
    Ok(())
}
