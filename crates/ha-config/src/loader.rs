//! YAML configuration loader with custom tag support

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Main configuration file name inside the config directory
pub const CONFIG_FILE: &str = "configuration.yaml";

pub struct YamlLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, for circular include detection
    include_stack: HashSet<PathBuf>,
}

impl YamlLoader {
    /// Loader for a config directory, reading its secrets.yaml
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: HashSet::new(),
        }
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref(), None);
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Parse YAML text; `source_path` anchors relative includes and error messages
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                trace!("Processing tag '{}'", tag);

                match tag.as_str() {
                    "!include" => {
                        let target = tag_string(&tag, &tagged.value)?;
                        let path = self.resolve_path(Path::new(target), Some(source_path));
                        self.load_file(path)
                    }
                    "!secret" => {
                        let key = tag_string(&tag, &tagged.value)?;
                        Ok(Value::String(self.secrets.get(key)?.to_string()))
                    }
                    "!env_var" => env_var(tag_string(&tag, &tagged.value)?),
                    _ => {
                        // unknown tags pass through untouched
                        let inner = self.process_value(tagged.value, source_path)?;
                        Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                            tag: tagged.tag,
                            value: inner,
                        })))
                    }
                }
            }
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let v = self.process_value(v, source_path)?;
                    result.insert(k, v);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    /// Includes resolve relative to the including file, everything else to the config dir
    fn resolve_path(&self, path: &Path, including_file: Option<&Path>) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let base = including_file
            .and_then(Path::parent)
            .unwrap_or(&self.config_dir);
        base.join(path)
    }
}

fn tag_string<'a>(tag: &str, value: &'a Value) -> ConfigResult<&'a str> {
    value.as_str().ok_or_else(|| ConfigError::InvalidTagValue {
        tag: tag.to_string(),
    })
}

/// `!env_var NAME` or `!env_var NAME fallback`
fn env_var(raw: &str) -> ConfigResult<Value> {
    let (name, fallback) = match raw.split_once(char::is_whitespace) {
        Some((name, fallback)) => (name, Some(fallback.trim())),
        None => (raw, None),
    };

    match (std::env::var(name), fallback) {
        (Ok(value), _) => Ok(Value::String(value)),
        (Err(_), Some(fallback)) => Ok(Value::String(fallback.to_string())),
        (Err(_), None) => Err(ConfigError::EnvVarNotFound {
            var: name.to_string(),
        }),
    }
}

/// Load `configuration.yaml` from a config directory
pub fn load_yaml(config_dir: impl Into<PathBuf>) -> ConfigResult<Value> {
    let mut loader = YamlLoader::new(config_dir)?;
    loader.load_file(CONFIG_FILE)
}

/// Deserialize one top-level section, `None` when the key is absent
///
/// A key with no body (`ai_assistant:`) deserializes like an empty mapping.
pub fn section<T: DeserializeOwned>(config: &Value, key: &str) -> ConfigResult<Option<T>> {
    let Some(raw) = config.get(key) else {
        return Ok(None);
    };

    let raw = match raw {
        Value::Null => Value::Mapping(serde_yaml::Mapping::new()),
        other => other.clone(),
    };

    serde_yaml::from_value(raw)
        .map(Some)
        .map_err(|source| ConfigError::InvalidSection {
            key: key.to_string(),
            source,
        })
}
