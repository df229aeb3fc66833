//! CLI configuration loading.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. The file given by `--config` or `SCM_HOOKS_CONFIG` (format by extension)
//! 3. Environment variables prefixed `SCM_HOOKS__` with `__` between keys,
//!    e.g. `SCM_HOOKS__PROVIDER__SSH_HOST=git.example.com`

use scm_hooks_core::secrets::RepositorySecretResolver;
use scm_hooks_core::webhook::bitbucket::BitbucketConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

const REDACTED: &str = "<REDACTED>";

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] scm_hooks_core::ConfigError),

    #[error("Invalid logging configuration: {message}")]
    Logging { message: String },
}

// ============================================================================
// Configuration Types
// ============================================================================

/// CLI configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Bitbucket provider settings
    pub provider: BitbucketConfig,

    /// Webhook secrets used by `parse` and `sign`
    pub secrets: SecretsConfig,

    /// Default logging configuration
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Load configuration from defaults, an optional file, and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&CliConfig::default())?);

        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: CliConfig = builder
            .add_source(config::Environment::with_prefix("SCM_HOOKS").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;
        self.logging.validate()
    }

    /// Copy of the configuration safe to print
    pub fn redacted(&self) -> Self {
        Self {
            secrets: self.secrets.redacted(),
            ..self.clone()
        }
    }
}

/// Webhook secrets
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Secret for repositories without their own entry
    pub default: Option<String>,

    /// Secrets keyed by repository full name
    pub repositories: BTreeMap<String, String>,
}

impl SecretsConfig {
    /// Build the resolver `parse` authenticates with
    pub fn resolver(&self) -> RepositorySecretResolver {
        let mut resolver = self
            .repositories
            .iter()
            .fold(RepositorySecretResolver::new(), |resolver, (name, secret)| {
                resolver.with_repository(name.clone(), secret.as_str())
            });

        if let Some(default) = self.default.as_deref().filter(|s| !s.is_empty()) {
            resolver = resolver.with_fallback(default);
        }

        resolver
    }

    fn redacted(&self) -> Self {
        Self {
            default: self.default.as_ref().map(|_| REDACTED.to_string()),
            repositories: self
                .repositories
                .keys()
                .map(|name| (name.clone(), REDACTED.to_string()))
                .collect(),
        }
    }
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("default", &self.default.as_ref().map(|_| REDACTED))
            .field("repositories", &self.repositories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(()),
            other => Err(ConfigError::Logging {
                message: format!("unknown level '{}'", other),
            }),
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "json")]
    Json,
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
