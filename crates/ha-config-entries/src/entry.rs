//! Config Entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state_machine::InvalidTransition;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    #[default]
    NotLoaded,
    SetupInProgress,
    Loaded,
    /// Setup failed, can be retried
    SetupError,
    UnloadInProgress,
    /// Unload failed, terminal
    FailedUnload,
}

/// How the entry was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Through the config flow
    #[default]
    User,
    /// From configuration.yaml
    Import,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain, e.g. "ai_assistant"
    pub domain: String,

    pub title: String,

    /// Data collected by the config flow
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// User-adjustable options, these win over `data`
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,

    #[serde(default = "default_version")]
    pub version: u32,

    /// Guards against configuring the same thing twice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub source: ConfigEntrySource,

    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Why the entry is in a failed state
    #[serde(skip, default)]
    pub reason: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            options: HashMap::new(),
            version: 1,
            unique_id: None,
            source: ConfigEntrySource::User,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_options(mut self, options: HashMap<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// `data` overlaid with `options`
    pub fn merged_data(&self) -> HashMap<String, serde_json::Value> {
        let mut merged = self.data.clone();
        merged.extend(self.options.clone());
        merged
    }

    /// Move to a new lifecycle state, rejecting transitions the FSM forbids
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state = self.state.try_transition(new_state)?;
        self.reason = reason;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_entry_new() {
        let entry = ConfigEntry::new("ai_assistant", "AI Assistant");
        assert_eq!(entry.domain, "ai_assistant");
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);
        assert_eq!(entry.source, ConfigEntrySource::User);
        assert!(!entry.entry_id.is_empty());
    }

    #[test]
    fn test_options_override_data() {
        let entry = ConfigEntry::new("ai_assistant", "AI Assistant")
            .with_data(HashMap::from([
                ("model".to_string(), json!("gpt-3.5-turbo")),
                ("update_interval".to_string(), json!(30)),
            ]))
            .with_options(HashMap::from([("model".to_string(), json!("gpt-4o"))]));

        let merged = entry.merged_data();
        assert_eq!(merged["model"], json!("gpt-4o"));
        assert_eq!(merged["update_interval"], json!(30));
    }

    #[test]
    fn test_try_set_state() {
        let mut entry = ConfigEntry::new("ai_assistant", "AI Assistant");

        assert!(entry
            .try_set_state(ConfigEntryState::Loaded, None)
            .is_err());
        assert_eq!(entry.state, ConfigEntryState::NotLoaded);

        entry
            .try_set_state(ConfigEntryState::SetupInProgress, None)
            .unwrap();
        entry
            .try_set_state(ConfigEntryState::SetupError, Some("boom".into()))
            .unwrap();
        assert_eq!(entry.reason.as_deref(), Some("boom"));
    }

    #[test]
    fn test_runtime_fields_not_serialized() {
        let mut entry = ConfigEntry::new("ai_assistant", "AI Assistant")
            .with_unique_id("ai_assistant")
            .with_source(ConfigEntrySource::Import);
        entry
            .try_set_state(ConfigEntryState::SetupInProgress, None)
            .unwrap();

        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("state").is_none());
        assert_eq!(json["source"], "import");

        let parsed: ConfigEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.state, ConfigEntryState::NotLoaded);
        assert_eq!(parsed.unique_id.as_deref(), Some("ai_assistant"));
    }
}
