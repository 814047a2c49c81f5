//! Entry options decoded from config entry data

use crate::constants::*;
use crate::error::AssistantResult;
use ha_config_entries::ConfigEntry;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which chat-completion endpoint to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    #[default]
    OpenAi,
    /// Any OpenAI-compatible endpoint at `api_url`
    Custom,
}

impl ApiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "openai",
            ApiProvider::Custom => "custom",
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ApiProvider::OpenAi),
            "custom" => Ok(ApiProvider::Custom),
            other => Err(format!("unknown api provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantOptions {
    #[serde(default = "default_name")]
    pub name: String,

    /// Polling interval in seconds
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_provider: ApiProvider,

    #[serde(default = "default_model")]
    pub model: String,

    /// Endpoint for the custom provider
    #[serde(default, deserialize_with = "empty_as_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Upper bound for one question, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL.as_secs()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

/// Blank strings count as "not set"
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl Default for AssistantOptions {
    fn default() -> Self {
        Self {
            name: default_name(),
            update_interval: default_update_interval(),
            api_key: None,
            api_provider: ApiProvider::default(),
            model: default_model(),
            api_url: None,
            system_prompt: default_system_prompt(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl AssistantOptions {
    /// Decode from entry data, with entry options taking precedence
    pub fn from_entry(entry: &ConfigEntry) -> AssistantResult<Self> {
        Self::from_map(entry.merged_data())
    }

    pub fn from_map(data: HashMap<String, serde_json::Value>) -> AssistantResult<Self> {
        let map: serde_json::Map<String, serde_json::Value> = data.into_iter().collect();
        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }

    pub fn update_interval(&self) -> Duration {
        // a zero period would make the polling interval panic
        Duration::from_secs(self.update_interval.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Chat-completion URL for the configured provider
    pub fn endpoint(&self) -> Option<&str> {
        match self.api_provider {
            ApiProvider::OpenAi => Some(OPENAI_CHAT_COMPLETIONS_URL),
            ApiProvider::Custom => self.api_url.as_deref(),
        }
    }
}
