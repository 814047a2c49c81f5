//! Entity state machine
//!
//! Holds the current [`State`] of every published entity and fires
//! `state_changed` on the event bus for each write and removal.

use dashmap::DashMap;
use ha_core::events::StateChangedData;
use ha_core::{Context, EntityId, State};
use ha_event_bus::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

pub struct StateMachine {
    /// Entity states keyed by the entity_id string
    states: DashMap<String, State>,
    event_bus: Arc<EventBus>,
}

impl StateMachine {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            event_bus,
        }
    }

    /// Write an entity state and fire `state_changed`
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let key = entity_id.to_string();
        let old_state = self.states.get(&key).map(|s| s.clone());

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context.clone()),
            None => State::new(entity_id.clone(), state, attributes, context.clone()),
        };

        debug!(state = %new_state.state, "Setting entity state");
        self.states.insert(key, new_state.clone());

        self.event_bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state,
                new_state: Some(new_state.clone()),
            },
            context,
        );

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Just the state value
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// Entity IDs of one domain, sorted
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .states
            .iter()
            .filter(|s| s.entity_id.domain() == domain)
            .map(|s| s.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Remove an entity and fire `state_changed` with no new state
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let (_, old_state) = self.states.remove(&entity_id.to_string())?;
        trace!("Removed entity state");

        self.event_bus.fire_typed(
            StateChangedData {
                entity_id: entity_id.clone(),
                old_state: Some(old_state.clone()),
                new_state: None,
            },
            context,
        );

        Some(old_state)
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

pub type SharedStateMachine = Arc<StateMachine>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_test_setup() -> (Arc<EventBus>, StateMachine) {
        let event_bus = Arc::new(EventBus::new());
        let state_machine = StateMachine::new(event_bus.clone());
        (event_bus, state_machine)
    }

    fn entity(id: &str) -> EntityId {
        id.parse().unwrap()
    }

    #[test]
    fn test_set_and_get_state() {
        let (_, sm) = make_test_setup();
        let attrs = HashMap::from([("icon".to_string(), json!("mdi:robot"))]);

        let state = sm.set(
            entity("sensor.ai_assistant_status"),
            "online",
            attrs.clone(),
            Context::new(),
        );

        assert_eq!(state.state, "online");
        assert_eq!(state.attributes, attrs);
        assert_eq!(
            sm.get_state("sensor.ai_assistant_status").as_deref(),
            Some("online")
        );
        assert!(sm.get("sensor.missing").is_none());
    }

    #[test]
    fn test_entity_ids_by_domain() {
        let (_, sm) = make_test_setup();

        sm.set(entity("sensor.b"), "1", HashMap::new(), Context::new());
        sm.set(entity("sensor.a"), "2", HashMap::new(), Context::new());
        sm.set(entity("switch.a"), "on", HashMap::new(), Context::new());

        assert_eq!(sm.entity_ids("sensor"), vec!["sensor.a", "sensor.b"]);
        assert_eq!(sm.entity_ids("switch"), vec!["switch.a"]);
        assert_eq!(sm.entity_count(), 3);
    }

    #[test]
    fn test_remove_state() {
        let (_, sm) = make_test_setup();
        let id = entity("sensor.ai_assistant_status");

        sm.set(id.clone(), "online", HashMap::new(), Context::new());
        let removed = sm.remove(&id, Context::new()).unwrap();

        assert_eq!(removed.state, "online");
        assert!(sm.get("sensor.ai_assistant_status").is_none());
        assert!(sm.remove(&id, Context::new()).is_none());
    }

    #[tokio::test]
    async fn test_state_changed_events() {
        let (bus, sm) = make_test_setup();
        let mut rx = bus.subscribe_typed::<StateChangedData>();
        let id = entity("sensor.ai_assistant_status");

        sm.set(id.clone(), "online", HashMap::new(), Context::new());
        sm.set(id.clone(), "thinking", HashMap::new(), Context::new());
        sm.remove(&id, Context::new());

        let created = rx.recv().await.unwrap();
        assert!(created.data.old_state.is_none());

        let updated = rx.recv().await.unwrap();
        assert_eq!(updated.data.old_state.unwrap().state, "online");
        assert_eq!(updated.data.new_state.unwrap().state, "thinking");

        let removed = rx.recv().await.unwrap();
        assert!(removed.data.new_state.is_none());
    }
}
