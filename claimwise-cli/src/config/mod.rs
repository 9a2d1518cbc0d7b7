//! Configuration management for the claimwise CLI.
//!
//! Settings are layered:
//! 1. Default values
//! 2. Config file (`~/.claimwise/config.toml`)
//! 3. Environment variables (`OPENAI_API_KEY`, `OPENAI_BASE_URL`, `BOX_DEVELOPER_TOKEN`)

mod schema;

pub use schema::{ClaimwiseConfig, IssueLevel, StorageBackend};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// Missing required field.
    #[error("missing required config: {0}")]
    MissingField(String),
    /// Invalid value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Get the default config directory path.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claimwise")
}

/// Get the default config file path.
#[must_use]
pub fn config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a specific path, with environment overrides.
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub async fn load_config_from(path: &Path) -> ConfigResult<ClaimwiseConfig> {
    if !path.exists() {
        info!(path = %path.display(), "config file not found, using defaults");
        return Ok(ClaimwiseConfig::default().with_env());
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: ClaimwiseConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), "loaded config file");

    Ok(config.with_env())
}

/// Save configuration to a specific path.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be written.
pub async fn save_config_to(config: &ClaimwiseConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let content = toml::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    info!(path = %path.display(), "saved config file");

    Ok(())
}

/// Write a default configuration to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be written.
pub async fn init_config(path: &Path) -> ConfigResult<ClaimwiseConfig> {
    let config = ClaimwiseConfig::default();
    save_config_to(&config, path).await?;
    info!("created default config at {}", path.display());
    Ok(config)
}

/// Fail on error-level issues, log warnings.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] naming every error-level issue.
pub fn ensure_valid(config: &ClaimwiseConfig) -> ConfigResult<()> {
    let issues = config.validate();
    let mut errors = Vec::new();
    for issue in issues {
        match issue.level {
            IssueLevel::Warning => tracing::warn!(path = %issue.path, "{}", issue.message),
            IssueLevel::Error => errors.push(issue.to_string()),
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(errors.join("; ")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    #[test]
    fn test_default_paths() {
        let cfg_dir = default_config_dir();
        assert!(cfg_dir.ends_with(".claimwise"));

        let cfg_path = config_path();
        assert!(cfg_path.ends_with("config.toml"));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(config.pipeline.max_steps, 10);
    }

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        init_config(&path).await.unwrap();
        assert!(path.exists());
        let loaded = load_config_from(&path).await.unwrap();
        assert_eq!(loaded.models.vision, "gpt-4o");
    }

    #[tokio::test]
    async fn test_parse_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let file = dir.child("config.toml");
        file.write_str("[models\n").unwrap();
        assert!(matches!(
            load_config_from(file.path()).await,
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_ensure_valid_collects_errors() {
        let mut config = ClaimwiseConfig::default();
        config.pipeline.max_steps = 0;
        config.pipeline.shop_results = 0;
        let Err(ConfigError::InvalidValue(message)) = ensure_valid(&config) else {
            panic!("expected invalid value");
        };
        assert!(message.contains("pipeline.max_steps"));
        assert!(message.contains("pipeline.shop_results"));
    }
}
