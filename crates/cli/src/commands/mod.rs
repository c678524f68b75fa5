pub mod chat;
pub mod doctor;
pub mod init;
pub mod serve;

use std::path::Path;

use toolchat_config::AppConfig;

pub(crate) fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load_with(path).map_err(|e| format!("Failed to load config: {e}").into())
}
