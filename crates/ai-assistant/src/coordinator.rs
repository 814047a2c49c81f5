//! Conversation coordinator
//!
//! [`AssistantCoordinator`] is the single owner of an entry's
//! [`ConversationState`]. Questions go through [`AssistantCoordinator::ask`],
//! which runs the blocking client on the blocking pool and reports failures
//! through state instead of returning them. Observers either subscribe with
//! [`AssistantCoordinator::add_listener`] or read the last [`Snapshot`].
//!
//! Asks are serialized: a second question waits until the first one has
//! written its result. `reset` waits behind in-flight questions as well.

use crate::client::AssistantClient;
use crate::constants::{ERROR_PREFIX, INITIAL_RESPONSE, MISSING_API_KEY_WARNING, RESET_RESPONSE};
use crate::error::{ClientError, UpdateFailed};
use crate::listeners::{ListenerHandle, ListenerRegistry};
use crate::options::AssistantOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Online,
    /// A question is in flight
    Thinking,
    /// The last question failed
    Error,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Online => "online",
            ConversationStatus::Thinking => "thinking",
            ConversationStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one entry, only written by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    pub status: ConversationStatus,
    pub last_response: String,
    pub conversation_count: u64,
    pub available: bool,
}

impl ConversationState {
    fn new(available: bool) -> Self {
        Self {
            status: ConversationStatus::Online,
            last_response: INITIAL_RESPONSE.to_string(),
            conversation_count: 0,
            available,
        }
    }
}

/// What observers see: the state plus the time it was read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: ConversationStatus,
    pub last_response: String,
    pub conversation_count: u64,
    pub available: bool,
    pub last_update: DateTime<Utc>,
}

pub struct AssistantCoordinator {
    entry_id: String,
    name: String,
    model: String,
    system_prompt: String,
    update_interval: Duration,
    request_timeout: Duration,
    client: Option<Arc<dyn AssistantClient>>,
    state: RwLock<ConversationState>,
    /// Last snapshot handed to observers
    data: RwLock<Option<Snapshot>>,
    last_update_success: AtomicBool,
    ask_lock: Mutex<()>,
    listeners: ListenerRegistry<AssistantCoordinator>,
}

impl AssistantCoordinator {
    pub fn new(
        entry_id: impl Into<String>,
        options: &AssistantOptions,
        client: Option<Arc<dyn AssistantClient>>,
    ) -> Self {
        let entry_id = entry_id.into();
        if client.is_none() {
            warn!(entry_id = %entry_id, "No API key configured, questions will not be answered");
        }

        Self {
            name: options.name.clone(),
            model: options.model.clone(),
            system_prompt: options.system_prompt.clone(),
            update_interval: options.update_interval(),
            request_timeout: options.request_timeout(),
            state: RwLock::new(ConversationState::new(client.is_some())),
            data: RwLock::new(None),
            last_update_success: AtomicBool::new(true),
            ask_lock: Mutex::new(()),
            listeners: ListenerRegistry::new(),
            client,
            entry_id,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Copy of the current state
    pub fn state(&self) -> ConversationState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last published snapshot, `None` before the first refresh
    pub fn data(&self) -> Option<Snapshot> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }

    fn mutate(&self, f: impl FnOnce(&mut ConversationState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    /// Ask a question and return the answer, or the error text on failure
    ///
    /// Never fails: without a client the fixed warning is returned and state
    /// is left alone, and a client error ends up as `status = error` with
    /// the error text as `last_response`.
    #[instrument(skip(self, question), fields(entry_id = %self.entry_id))]
    pub async fn ask(&self, question: &str) -> String {
        let Some(client) = self.client.clone() else {
            warn!("Question ignored, no API key configured");
            return MISSING_API_KEY_WARNING.to_string();
        };

        let _guard = self.ask_lock.lock().await;

        self.mutate(|state| state.status = ConversationStatus::Thinking);
        self.publish();

        match self.dispatch(client, question).await {
            Ok(response) => {
                info!(
                    response = %truncate(&response, 100),
                    "Question answered"
                );
                self.mutate(|state| {
                    state.last_response = response.clone();
                    state.conversation_count += 1;
                    state.status = ConversationStatus::Online;
                });
                self.publish();
                response
            }
            Err(err) => {
                error!(error = %err, "Question failed");
                let message = format!("{ERROR_PREFIX} {err}");
                self.mutate(|state| {
                    state.last_response = message.clone();
                    state.status = ConversationStatus::Error;
                });
                self.publish();
                message
            }
        }
    }

    /// Run the blocking client on the blocking pool, bounded by the request timeout
    async fn dispatch(
        &self,
        client: Arc<dyn AssistantClient>,
        question: &str,
    ) -> Result<String, ClientError> {
        let system_prompt = self.system_prompt.clone();
        let model = self.model.clone();
        let question = question.to_string();

        let call = tokio::task::spawn_blocking(move || {
            client.complete(&system_prompt, &model, &question)
        });

        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ClientError::Worker(join_error.to_string())),
            Err(_) => Err(ClientError::Timeout(self.request_timeout)),
        }
    }

    /// Zero the counter and mark the response as reset
    #[instrument(skip(self), fields(entry_id = %self.entry_id))]
    pub async fn reset(&self) {
        let _guard = self.ask_lock.lock().await;

        self.mutate(|state| {
            state.conversation_count = 0;
            state.last_response = RESET_RESPONSE.to_string();
        });
        info!("Conversation reset");
        self.publish();
    }

    /// Read the current state with a fresh timestamp
    ///
    /// Does not publish anything and never calls the client.
    pub fn refresh_snapshot(&self) -> Result<Snapshot, UpdateFailed> {
        let state = self
            .state
            .read()
            .map_err(|_| UpdateFailed("conversation state lock poisoned".to_string()))?;

        Ok(Snapshot {
            status: state.status,
            last_response: state.last_response.clone(),
            conversation_count: state.conversation_count,
            available: state.available && self.client.is_some(),
            last_update: Utc::now(),
        })
    }

    /// Take a snapshot, store it as `data` and notify listeners
    ///
    /// Listeners are notified on failure too, so they can go unavailable.
    pub fn refresh(&self) -> Result<Snapshot, UpdateFailed> {
        let result = self.refresh_snapshot();

        match &result {
            Ok(snapshot) => {
                debug!(entry_id = %self.entry_id, status = %snapshot.status, "Refreshed snapshot");
                *self.data.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(snapshot.clone());
                self.last_update_success.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                warn!(entry_id = %self.entry_id, error = %err, "Refresh failed");
                self.last_update_success.store(false, Ordering::SeqCst);
            }
        }

        self.update_listeners();
        result
    }

    /// Refresh and drop the error, which `refresh` already logged
    fn publish(&self) {
        let _ = self.refresh();
    }

    /// Subscribe to updates; dropping the handle unsubscribes
    #[must_use = "dropping the handle unsubscribes the listener"]
    pub fn add_listener(
        &self,
        listener: impl Fn(&AssistantCoordinator) + Send + Sync + 'static,
    ) -> ListenerHandle<AssistantCoordinator> {
        self.listeners.add(listener)
    }

    pub fn update_listeners(&self) {
        self.listeners.notify(self);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Refresh every `update_interval` until the handle is dropped
    ///
    /// The task holds only a weak reference, so it also ends once the
    /// coordinator is gone.
    pub fn start_polling(self: &Arc<Self>) -> PollingTask {
        let coordinator = Arc::downgrade(self);
        let period = self.update_interval;

        debug!(entry_id = %self.entry_id, ?period, "Starting polling");
        PollingTask {
            handle: tokio::spawn(poll(coordinator, period)),
        }
    }
}

async fn poll(coordinator: Weak<AssistantCoordinator>, period: Duration) {
    // the first refresh happens during setup
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };
        let _ = coordinator.refresh();
    }
}

/// Background polling loop, aborted on drop
pub struct PollingTask {
    handle: JoinHandle<()>,
}

impl PollingTask {
    pub fn stop(self) {}
}

impl Drop for PollingTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
