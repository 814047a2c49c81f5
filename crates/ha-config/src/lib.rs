//! YAML configuration loading
//!
//! Reads `configuration.yaml` and resolves the custom tags it may use:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use ha_config::YamlLoader;
//!
//! let mut loader = YamlLoader::new("/config")?;
//! let config = loader.load_file("configuration.yaml")?;
//! let section: Option<MySection> = ha_config::section(&config, "ai_assistant")?;
//! ```

mod error;
mod loader;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, section, YamlLoader, CONFIG_FILE};
pub use secrets::Secrets;

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
