//! secrets.yaml lookup

use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Key/value pairs from `secrets.yaml`, all values stringified
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    secrets: HashMap<String, String>,
}

impl Secrets {
    /// Load `<config_dir>/secrets.yaml`; a missing file yields no secrets
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join("secrets.yaml");

        if !path.exists() {
            debug!("No secrets.yaml found at {:?}, using empty secrets", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        let raw: HashMap<String, serde_yaml::Value> =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                path: path.clone(),
                source: e,
            })?;

        let secrets: HashMap<String, String> = raw
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Null => String::new(),
                    other => serde_yaml::to_string(&other)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                };
                (k, value)
            })
            .collect();

        debug!("Loaded {} secrets from {:?}", secrets.len(), path);
        Ok(Self { secrets })
    }

    pub fn from_map(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }

    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        self.secrets
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_secrets_stringifies_values() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("secrets.yaml"),
            "openai_api_key: sk-test-1234567890\nport: 8123\nenabled: true\nempty:\n",
        )
        .unwrap();

        let secrets = Secrets::load(dir.path()).unwrap();
        assert_eq!(secrets.len(), 4);
        assert_eq!(secrets.get("openai_api_key").unwrap(), "sk-test-1234567890");
        assert_eq!(secrets.get("port").unwrap(), "8123");
        assert_eq!(secrets.get("enabled").unwrap(), "true");
        assert_eq!(secrets.get("empty").unwrap(), "");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let secrets = Secrets::load(dir.path()).unwrap();
        assert!(secrets.is_empty());
        assert!(matches!(
            secrets.get("anything"),
            Err(ConfigError::SecretNotFound { .. })
        ));
    }
}
