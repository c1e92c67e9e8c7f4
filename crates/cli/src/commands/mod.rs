pub mod chat;
pub mod doctor;
pub mod mcp;
pub mod memory;
pub mod onboard;
pub mod runtime;

use aru_config::{AppConfig, ConfigError};
use std::path::Path;

/// Load the config from `path`, or from `~/.aru/config.toml` when absent.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => AppConfig::load(),
    }
}
