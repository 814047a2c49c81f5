//! Test host with the assistant integration registered

use ai_assistant::constants::{DOMAIN, SERVICE_ASK_QUESTION, SERVICE_RESET};
use ai_assistant::{AssistantIntegration, Host};
use ha_config_entries::{ConfigEntries, ConfigEntry, ConfigEntryState};
use ha_core::{Context, Event, State};
use ha_service_registry::ServiceResult;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use super::ScriptedClient;

pub struct TestHomeAssistant {
    pub host: Host,
    pub config_entries: Arc<ConfigEntries>,
    pub integration: Arc<AssistantIntegration>,
    /// Subscribed before anything is set up, so no event is missed
    events: Mutex<broadcast::Receiver<Event<Value>>>,
}

impl TestHomeAssistant {
    /// Host whose entries get `client` when they have an API key
    pub fn new(client: Arc<ScriptedClient>) -> Self {
        Self::with_integration(|host| {
            AssistantIntegration::new(host).with_client_factory(super::scripted_factory(client))
        })
    }

    /// Host whose entries talk HTTP through the real chat-completion client
    pub fn with_http_client() -> Self {
        Self::with_integration(AssistantIntegration::new)
    }

    fn with_integration(build: impl FnOnce(Host) -> AssistantIntegration) -> Self {
        let host = Host::new();
        let events = Mutex::new(host.bus.subscribe_all());
        let integration = Arc::new(build(host.clone()));
        let config_entries = Arc::new(ConfigEntries::new());
        config_entries.register_integration(DOMAIN, integration.clone());

        Self {
            host,
            config_entries,
            integration,
            events,
        }
    }

    /// Add and set up an entry, returning its id
    pub async fn setup_entry(&self, entry: ConfigEntry) -> String {
        let entry = self.config_entries.add(entry).expect("entry added");
        self.config_entries
            .setup(&entry.entry_id)
            .await
            .expect("entry set up");
        entry.entry_id
    }

    pub fn entry_state(&self, entry_id: &str) -> Option<ConfigEntryState> {
        self.config_entries.get(entry_id).map(|e| e.state)
    }

    pub async fn ask(&self, data: Value) -> ServiceResult {
        self.host
            .services
            .call(DOMAIN, SERVICE_ASK_QUESTION, data, Context::new(), true)
            .await
    }

    pub async fn reset(&self, data: Value) -> ServiceResult {
        self.host
            .services
            .call(DOMAIN, SERVICE_RESET, data, Context::new(), false)
            .await
    }

    pub fn get_state(&self, entity_id: &str) -> Option<State> {
        self.host.states.get(entity_id)
    }

    pub fn assert_state(&self, entity_id: &str, expected: &str) {
        let state = self.host.states.get_state(entity_id);
        assert_eq!(
            state.as_deref(),
            Some(expected),
            "Expected entity {} to be in state '{}', but was {:?}",
            entity_id,
            expected,
            state
        );
    }

    /// Events of one type fired since the last call
    pub fn captured_events(&self, event_type: &str) -> Vec<Event<Value>> {
        let mut rx = self.events.lock().unwrap();
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) if event.event_type.as_str() == event_type => events.push(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}
