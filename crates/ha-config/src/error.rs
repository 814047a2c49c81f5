//! Error types for configuration loading

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("secret '{key}' not found in secrets.yaml")]
    SecretNotFound { key: String },

    #[error("circular include detected: {path}")]
    CircularInclude { path: PathBuf },

    #[error("environment variable '{var}' not set")]
    EnvVarNotFound { var: String },

    /// A tag was given something other than a scalar string
    #[error("invalid value for tag {tag}: expected a string")]
    InvalidTagValue { tag: String },

    #[error("invalid configuration for '{key}': {source}")]
    InvalidSection {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },
}
