//! TOML Configuration File Support
//!
//! Centralized configuration loading, supporting a TOML file at
//! `$XDG_CONFIG_HOME/quill/config.toml` (typically
//! `~/.config/quill/config.toml`).
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! The provider credential is never read from the file; it comes from the
//! environment variable named by `provider.credential_env`.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:3000"
//!
//! [provider]
//! base_url = "https://generativelanguage.googleapis.com"
//! model = "gemini-2.0-flash-exp"
//! temperature = 0.7
//! max_output_tokens = 4000
//! credential_env = "GEMINI_API_KEY"
//!
//! [pacing]
//! intro_ms = 1000
//! stage_ms = 800
//! chunk_ms = 25
//!
//! [limits]
//! max_prompt_bytes = 32768
//! max_context_bytes = 262144
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pacing::PacingConfig;
use crate::provider::{ProviderConfig, ProviderCredential};
use crate::request::RequestLimits;

/// Environment variable overriding `server.bind`
pub const ENV_BIND: &str = "QUILL_BIND";
/// Environment variable overriding `provider.base_url`
pub const ENV_PROVIDER_URL: &str = "QUILL_PROVIDER_URL";
/// Environment variable overriding `provider.model`
pub const ENV_MODEL: &str = "QUILL_MODEL";
/// Environment variable disabling pacing when set to `off`, `0` or `false`
pub const ENV_PACING: &str = "QUILL_PACING";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// No provider credential in the environment
    #[error("API key not configured: set {env} (or {legacy}) in the environment")]
    MissingCredential {
        /// Configured variable name
        env: String,
        /// Legacy fallback variable name
        legacy: &'static str,
    },
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the configuration's highest-priority values came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Configuration Structures
// =============================================================================

/// `[server]` section
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Complete service configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Provider connection settings
    pub provider: ProviderConfig,
    /// Output pacing
    pub pacing: PacingConfig,
    /// Request size limits
    pub limits: RequestLimits,

    /// Where the highest-priority values came from
    #[serde(skip)]
    source: ConfigSource,
    /// File the configuration was read from, if any
    #[serde(skip)]
    config_file_path: Option<PathBuf>,
}

impl QuillConfig {
    /// Where the highest-priority values came from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// File the configuration was read from, if any
    #[must_use]
    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    /// Resolve the provider credential from the environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when neither the configured
    /// nor the legacy variable holds a non-blank value.
    pub fn credential(&self) -> Result<ProviderCredential, ConfigError> {
        self.provider
            .credential()
            .ok_or_else(|| ConfigError::MissingCredential {
                env: self.provider.credential_env.clone(),
                legacy: ProviderConfig::LEGACY_CREDENTIAL_ENV,
            })
    }

    /// Apply environment overrides using the given lookup
    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup(ENV_BIND) {
            self.server.bind = bind;
            self.source = ConfigSource::Env;
        }
        if let Some(url) = lookup(ENV_PROVIDER_URL) {
            self.provider.base_url = url;
            self.source = ConfigSource::Env;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.provider.model = model;
            self.source = ConfigSource::Env;
        }
        if let Some(pacing) = lookup(ENV_PACING) {
            let pacing = pacing.to_lowercase();
            self.pacing.enabled = !matches!(pacing.as_str(), "off" | "0" | "false");
            self.source = ConfigSource::Env;
        }
    }
}

/// Get the default configuration file path
///
/// Returns `None` when the platform has no config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("quill").join("config.toml"))
}

/// Load configuration from a specific path, then the environment
///
/// A missing file is not an error; defaults are used.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<QuillConfig, ConfigError> {
    let mut config = read_config_file(path)?;
    config.apply_env_with(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
    Ok(config)
}

fn read_config_file(path: Option<PathBuf>) -> Result<QuillConfig, ConfigError> {
    let Some(config_path) = path else {
        return Ok(QuillConfig::default());
    };

    if !config_path.exists() {
        tracing::debug!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        return Ok(QuillConfig::default());
    }

    let toml_content =
        std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
            path: config_path.clone(),
            source: e,
        })?;

    let mut config: QuillConfig = toml::from_str(&toml_content)?;
    config.source = ConfigSource::File;

    tracing::info!(
        path = %config_path.display(),
        "Loaded configuration from file"
    );
    config.config_file_path = Some(config_path);
    Ok(config)
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Values supplied on the command line
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Listen address override
    pub bind: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Disable pacing
    pub no_pacing: bool,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set listen address override
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = Some(bind.into());
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Disable pacing
    #[must_use]
    pub fn without_pacing(mut self) -> Self {
        self.no_pacing = true;
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut QuillConfig) {
        if self.bind.is_some() || self.model.is_some() || self.no_pacing {
            config.source = ConfigSource::Cli;
        }
        if let Some(ref bind) = self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(ref model) = self.model {
            config.provider.model = model.clone();
        }
        if self.no_pacing {
            config.pacing.enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = QuillConfig::default();

        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(config.provider.model, "gemini-2.0-flash-exp");
        assert_eq!(config.provider.max_output_tokens, 4000);
        assert!(config.pacing.enabled);
        assert_eq!(config.limits.max_context_bytes, 262_144);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("quill/config.toml"));
        }
    }

    #[test]
    fn test_parse_partial_toml() {
        let file = write_config(
            r#"
[server]
bind = "0.0.0.0:8080"

[pacing]
chunk_ms = 5
"#,
        );

        let config = read_config_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.pacing.chunk_ms, 5);
        assert_eq!(config.pacing.stage_ms, 800);
        assert_eq!(config.provider, ProviderConfig::default());
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path(), Some(file.path()));
    }

    #[test]
    fn test_missing_file_graceful() {
        let config =
            read_config_file(Some(PathBuf::from("/nonexistent/quill/config.toml"))).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert_eq!(config.config_file_path(), None);
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = write_config("[server\nbind = 3");
        let result = read_config_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[provider]\nmodel = \"file-model\"\n");
        let mut config = read_config_file(Some(file.path().to_path_buf())).unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_MODEL, "env-model"),
            (ENV_PROVIDER_URL, "http://127.0.0.1:9999"),
            (ENV_PACING, "OFF"),
        ]
        .into_iter()
        .collect();
        config.apply_env_with(|name| env.get(name).map(ToString::to_string));

        assert_eq!(config.provider.model, "env-model");
        assert_eq!(config.provider.base_url, "http://127.0.0.1:9999");
        assert!(!config.pacing.enabled);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = QuillConfig::default();
        config.apply_env_with(|name| (name == ENV_BIND).then(|| "0.0.0.0:1".to_string()));

        ConfigOverrides::new()
            .with_bind("127.0.0.1:4000")
            .without_pacing()
            .apply(&mut config);

        assert_eq!(config.server.bind, "127.0.0.1:4000");
        assert!(!config.pacing.enabled);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_model_override_keeps_other_settings() {
        let mut config = QuillConfig::default();
        ConfigOverrides::new()
            .with_model("gemini-1.5-pro")
            .apply(&mut config);

        assert_eq!(config.provider.model, "gemini-1.5-pro");
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert!(config.pacing.enabled);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_no_change() {
        let mut config = QuillConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config, QuillConfig::default());
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_missing_credential_names_variables() {
        let mut config = QuillConfig::default();
        config.provider.credential_env = "QUILL_TEST_UNSET_CREDENTIAL_VAR".to_string();

        // The legacy variable may be set on a developer machine
        if std::env::var(ProviderConfig::LEGACY_CREDENTIAL_ENV).is_ok() {
            return;
        }

        let err = config.credential().unwrap_err();
        assert_eq!(
            err.to_string(),
            "API key not configured: set QUILL_TEST_UNSET_CREDENTIAL_VAR (or OPENAI_API_KEY) in the environment"
        );
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }
}
