//! Builder for assistant config entries

use ai_assistant::constants::{DOMAIN, UNIQUE_ID};
use ha_config_entries::ConfigEntry;
use serde_json::{json, Value};
use std::collections::HashMap;

pub const TEST_API_KEY: &str = "sk-test-0123456789";

#[derive(Debug, Clone)]
pub struct MockConfigEntry {
    title: String,
    data: HashMap<String, Value>,
    options: HashMap<String, Value>,
    unique_id: Option<String>,
}

impl MockConfigEntry {
    /// Entry without an API key
    pub fn new() -> Self {
        Self {
            title: "AI Assistant".to_string(),
            data: HashMap::from([
                ("name".to_string(), json!("AI Assistant")),
                ("update_interval".to_string(), json!(30)),
            ]),
            options: HashMap::new(),
            unique_id: Some(UNIQUE_ID.to_string()),
        }
    }

    pub fn with_api_key(self) -> Self {
        self.with_data_value("api_key", json!(TEST_API_KEY))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_data_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Several entries of the domain need distinct unique ids
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn build(self) -> ConfigEntry {
        let entry = ConfigEntry::new(DOMAIN, self.title)
            .with_data(self.data)
            .with_options(self.options);
        match self.unique_id {
            Some(unique_id) => entry.with_unique_id(unique_id),
            None => entry,
        }
    }
}

impl Default for MockConfigEntry {
    fn default() -> Self {
        Self::new()
    }
}
