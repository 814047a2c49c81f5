//! AI Assistant integration
//!
//! Exposes a chat-completion backed assistant as three sensors and two
//! services. Each config entry gets its own [`AssistantCoordinator`], which
//! owns the conversation state; the integration keeps the coordinators in an
//! explicit map from entry id to runtime, built at setup and torn down at
//! unload.
//!
//! # Key Types
//!
//! - [`AssistantIntegration`] - setup/unload hooks registered with the config entries manager
//! - [`AssistantCoordinator`] - conversation state, ask flow and polling
//! - [`AssistantClient`] - blocking chat-completion call
//! - [`ConfigFlow`] - two-step setup validation

pub mod client;
pub mod config_flow;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod listeners;
pub mod options;
pub mod runtime;
pub mod sensor;
pub mod services;

pub use client::{AssistantClient, ChatCompletionClient};
pub use config_flow::{ConfigFlow, FlowInput, FlowResult, ValidationError};
pub use coordinator::{AssistantCoordinator, ConversationState, ConversationStatus, Snapshot};
pub use error::{AssistantError, AssistantResult, ClientError, UpdateFailed};
pub use options::{ApiProvider, AssistantOptions};
pub use services::AssistantResponseData;

use async_trait::async_trait;
use constants::DOMAIN;
use ha_config_entries::{ConfigEntry, IntegrationHandler};
use ha_event_bus::EventBus;
use ha_service_registry::ServiceRegistry;
use ha_state_machine::StateMachine;
use runtime::Coordinators;
use sensor::SensorPlatform;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The parts of the host an integration talks to
#[derive(Clone)]
pub struct Host {
    pub bus: Arc<EventBus>,
    pub states: Arc<StateMachine>,
    pub services: Arc<ServiceRegistry>,
}

impl Host {
    pub fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        Self {
            states: Arc::new(StateMachine::new(bus.clone())),
            services: Arc::new(ServiceRegistry::new()),
            bus,
        }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the client for an entry, `None` when it cannot ask anything
pub type ClientFactory =
    Arc<dyn Fn(&AssistantOptions) -> Option<Arc<dyn AssistantClient>> + Send + Sync>;

fn default_client_factory() -> ClientFactory {
    Arc::new(|options: &AssistantOptions| {
        ChatCompletionClient::from_options(options)
            .map(|client| Arc::new(client) as Arc<dyn AssistantClient>)
    })
}

pub struct AssistantIntegration {
    host: Host,
    coordinators: Arc<Coordinators>,
    client_factory: ClientFactory,
}

impl AssistantIntegration {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            coordinators: Arc::new(Coordinators::new()),
            client_factory: default_client_factory(),
        }
    }

    /// Replace how clients are built, e.g. with a scripted client in tests
    pub fn with_client_factory(
        mut self,
        factory: impl Fn(&AssistantOptions) -> Option<Arc<dyn AssistantClient>> + Send + Sync + 'static,
    ) -> Self {
        self.client_factory = Arc::new(factory);
        self
    }

    pub fn coordinator(&self, entry_id: &str) -> Option<Arc<AssistantCoordinator>> {
        self.coordinators.get(entry_id)
    }

    pub fn loaded_count(&self) -> usize {
        self.coordinators.len()
    }

    /// Build and start everything an entry needs
    ///
    /// Must run inside a tokio runtime, the polling loop is spawned here.
    #[instrument(skip(self, entry), fields(entry_id = %entry.entry_id))]
    pub fn setup(&self, entry: &ConfigEntry) -> AssistantResult<()> {
        let options = AssistantOptions::from_entry(entry)?;
        let client = (self.client_factory)(&options);

        let coordinator = Arc::new(AssistantCoordinator::new(
            entry.entry_id.clone(),
            &options,
            client,
        ));
        coordinator.refresh()?;

        let sensors = SensorPlatform::setup(&coordinator, self.host.states.clone())?;
        let polling = coordinator.start_polling();
        self.coordinators.insert(coordinator, sensors, polling);

        if !self
            .host
            .services
            .has_service(DOMAIN, constants::SERVICE_ASK_QUESTION)
        {
            services::register_services(&self.host, self.coordinators.clone());
        }

        info!(name = %options.name, "AI assistant entry set up");
        Ok(())
    }

    /// Stop polling, drop the sensors and forget the coordinator
    ///
    /// Returns false for an entry that was never set up.
    #[instrument(skip(self))]
    pub fn unload(&self, entry_id: &str) -> bool {
        let Some(runtime) = self.coordinators.remove(entry_id) else {
            warn!("Unload requested for unknown entry");
            return false;
        };

        runtime.polling.stop();
        runtime.sensors.unload(&self.host.states);

        if self.coordinators.is_empty() {
            let removed = self.host.services.unregister_domain(DOMAIN);
            debug!(removed, "Last entry unloaded, services removed");
        }

        info!("AI assistant entry unloaded");
        true
    }
}

#[async_trait]
impl IntegrationHandler for AssistantIntegration {
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<bool, String> {
        self.setup(entry).map(|_| true).map_err(|e| e.to_string())
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<bool, String> {
        Ok(self.unload(&entry.entry_id))
    }
}
