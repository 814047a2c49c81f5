//! Entity state snapshot

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, MAX_STATE_LENGTH};

/// The state of an entity at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,

    /// State value, at most MAX_STATE_LENGTH characters
    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Last time the state value changed
    pub last_changed: DateTime<Utc>,

    /// Last time the state or its attributes were written
    pub last_updated: DateTime<Utc>,

    pub context: Context,
}

impl State {
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: truncate_state(state.into()),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Next state for the same entity; `last_changed` only moves when the value does
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = truncate_state(new_state.into());
        let last_changed = if new_state == self.state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

fn truncate_state(state: String) -> String {
    if state.chars().count() <= MAX_STATE_LENGTH {
        state
    } else {
        state.chars().take(MAX_STATE_LENGTH).collect()
    }
}

impl PartialEq for State {
    // timestamps and context do not take part in equality
    fn eq(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status_id() -> EntityId {
        EntityId::new("sensor", "ai_assistant_status").unwrap()
    }

    #[test]
    fn test_long_state_truncated() {
        let state = State::new(status_id(), "è".repeat(300), HashMap::new(), Context::new());
        assert_eq!(state.state.chars().count(), MAX_STATE_LENGTH);
    }

    #[test]
    fn test_update_preserves_last_changed_for_same_value() {
        let first = State::new(status_id(), "online", HashMap::new(), Context::new());
        let attrs = HashMap::from([("available".to_string(), json!(true))]);

        let same = first.with_update("online", attrs.clone(), Context::new());
        assert_eq!(same.last_changed, first.last_changed);
        assert!(same.last_updated >= first.last_updated);

        let changed = same.with_update("thinking", attrs, Context::new());
        assert_eq!(changed.state, "thinking");
        assert!(changed.last_changed >= same.last_changed);
    }

    #[test]
    fn test_attribute_lookup() {
        let attrs = HashMap::from([("available".to_string(), json!(false))]);
        let state = State::new(status_id(), "error", attrs, Context::new());

        assert_eq!(state.attribute::<bool>("available"), Some(false));
        assert_eq!(state.attribute::<bool>("missing"), None);
    }
}
