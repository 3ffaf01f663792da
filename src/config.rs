use crate::audio::AnalysisConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default location of the configuration file
pub const CONFIG_FILE: &str = "config.toml";

/// Settings read from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
}

/// Errors while loading the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load configuration from `config.toml` in the working directory.
///
/// A missing file yields the default configuration.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_in(Path::new("."))
}

/// Load `config.toml` from `dir`, falling back to defaults if it is absent
pub fn load_config_in(dir: &Path) -> Result<Config, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config_from(&path)
}

/// Load configuration from an explicit file
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}
