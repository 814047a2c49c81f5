//! Per-entry runtime objects, keyed by entry id

use crate::coordinator::{AssistantCoordinator, PollingTask};
use crate::sensor::SensorPlatform;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Everything an entry owns while it is loaded
pub struct EntryRuntime {
    pub coordinator: Arc<AssistantCoordinator>,
    pub sensors: SensorPlatform,
    pub polling: PollingTask,
    /// Load order, used to pick a default target for services
    seq: u64,
}

#[derive(Default)]
pub struct Coordinators {
    entries: DashMap<String, EntryRuntime>,
    next_seq: AtomicU64,
}

impl Coordinators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        coordinator: Arc<AssistantCoordinator>,
        sensors: SensorPlatform,
        polling: PollingTask,
    ) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry_id = coordinator.entry_id().to_string();
        self.entries.insert(
            entry_id,
            EntryRuntime {
                coordinator,
                sensors,
                polling,
                seq,
            },
        );
    }

    pub fn remove(&self, entry_id: &str) -> Option<EntryRuntime> {
        self.entries.remove(entry_id).map(|(_, runtime)| runtime)
    }

    pub fn get(&self, entry_id: &str) -> Option<Arc<AssistantCoordinator>> {
        self.entries
            .get(entry_id)
            .map(|runtime| runtime.coordinator.clone())
    }

    /// Coordinator of the earliest loaded entry still present
    pub fn first(&self) -> Option<Arc<AssistantCoordinator>> {
        self.entries
            .iter()
            .min_by_key(|runtime| runtime.seq)
            .map(|runtime| runtime.coordinator.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
