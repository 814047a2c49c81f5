//! Config Entries Manager
//!
//! Keeps every entry in memory and drives setup/unload through the
//! [`IntegrationHandler`] registered for the entry's domain.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::state_machine::InvalidTransition;

#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("setup failed: {0}")]
    SetupFailed(String),

    #[error("unload failed: {0}")]
    UnloadFailed(String),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Setup and unload hooks of an integration
///
/// Both hooks report `Ok(false)` or `Err(reason)` when they could not do
/// their job; the manager turns either into a failed entry state.
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<bool, String>;

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<bool, String>;
}

pub struct ConfigEntries {
    /// entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// domain -> integration hooks
    handlers: DashMap<String, Arc<dyn IntegrationHandler>>,

    /// Serializes setup/unload across all entries
    setup_lock: Mutex<()>,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            handlers: DashMap::new(),
            setup_lock: Mutex::new(()),
        }
    }

    pub fn register_integration(&self, domain: &str, handler: Arc<dyn IntegrationHandler>) {
        self.handlers.insert(domain.to_string(), handler);
        debug!("Registered integration handler for domain: {}", domain);
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Entries of a domain, oldest first
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|r| r.domain == domain)
            .map(|r| r.value().clone())
            .collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    pub fn get_loaded_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.get_by_domain(domain)
            .into_iter()
            .filter(|e| e.is_loaded())
            .collect()
    }

    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.entries
            .iter()
            .find(|r| r.domain == domain && r.unique_id.as_deref() == Some(unique_id))
            .map(|r| r.value().clone())
    }

    /// Add a new entry; a second entry with the same `(domain, unique_id)` is rejected
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.entries.insert(entry.entry_id.clone(), entry.clone());
        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    fn set_state(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(entry.value().clone())
    }

    fn handler(&self, domain: &str) -> Option<Arc<dyn IntegrationHandler>> {
        self.handlers.get(domain).map(|h| Arc::clone(h.value()))
    }

    /// Set up an entry through its integration's `setup_entry` hook
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self.set_state(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let Some(handler) = self.handler(&entry.domain) else {
            debug!(
                "No integration handler for domain {}, marking as loaded",
                entry.domain
            );
            self.set_state(entry_id, ConfigEntryState::Loaded, None)?;
            return Ok(());
        };

        let failure = match handler.setup_entry(&entry).await {
            Ok(true) => None,
            Ok(false) => Some("integration reported setup failure".to_string()),
            Err(reason) => Some(reason),
        };

        match failure {
            None => {
                self.set_state(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Some(reason) => {
                warn!("Setup failed for entry {}: {}", entry_id, reason);
                self.set_state(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                Err(ConfigEntriesError::SetupFailed(reason))
            }
        }
    }

    /// Unload an entry; entries that are not loaded are left alone
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.state == ConfigEntryState::NotLoaded {
            return Ok(());
        }
        let was_loaded = entry.is_loaded();
        self.set_state(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        // a failed setup has nothing to tear down
        let result = match self.handler(&entry.domain) {
            Some(handler) if was_loaded => handler.unload_entry(&entry).await,
            _ => Ok(true),
        };

        let failure = match result {
            Ok(true) => None,
            Ok(false) => Some("integration reported unload failure".to_string()),
            Err(reason) => Some(reason),
        };

        match failure {
            None => {
                self.set_state(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Some(reason) => {
                warn!("Unload failed for entry {}: {}", entry_id, reason);
                self.set_state(entry_id, ConfigEntryState::FailedUnload, Some(reason.clone()))?;
                Err(ConfigEntriesError::UnloadFailed(reason))
            }
        }
    }

    /// Unload and then forget an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        self.unload(entry_id).await?;

        let (_, entry) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    /// Set up every entry that is not loaded yet, oldest first
    pub async fn setup_all(&self) -> Vec<(String, ConfigEntriesResult<()>)> {
        let mut pending: Vec<_> = self
            .entries
            .iter()
            .filter(|r| r.state == ConfigEntryState::NotLoaded)
            .map(|r| (r.created_at, r.entry_id.clone()))
            .collect();
        pending.sort();

        let mut results = Vec::with_capacity(pending.len());
        for (_, entry_id) in pending {
            let result = self.setup(&entry_id).await;
            results.push((entry_id, result));
        }
        results
    }

    /// Unload every loaded entry, used on shutdown
    pub async fn unload_all(&self) -> Vec<(String, ConfigEntriesResult<()>)> {
        let loaded: Vec<_> = self
            .entries
            .iter()
            .filter(|r| r.is_loaded())
            .map(|r| r.entry_id.clone())
            .collect();

        let mut results = Vec::with_capacity(loaded.len());
        for entry_id in loaded {
            let result = self.unload(&entry_id).await;
            results.push((entry_id, result));
        }
        results
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}
