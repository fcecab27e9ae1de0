pub mod ask;
pub mod config_cmd;
pub mod serve;

use repolens_config::{AppConfig, ConfigError};
use std::path::Path;

/// Load from `--config` when given, else the default location; env
/// overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}
