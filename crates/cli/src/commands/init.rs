//! `toolchat init`: Write a default config file.

use std::path::Path;

use toolchat_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.map_or_else(AppConfig::config_path, Path::to_path_buf);

    if path.exists() {
        println!("Config already exists at: {}", path.display());
        println!("   Edit it manually or delete and re-run init.");
        return Ok(());
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;

    println!("Created {}", path.display());
    println!("\nNext steps:");
    println!("   1. Export GROQ_API_KEY (or set api_key in the file)");
    println!("   2. Optionally set [checkpoint] database_url for durable sessions");
    println!("   3. Run: toolchat chat \"What is 6 times 7?\"");

    Ok(())
}
