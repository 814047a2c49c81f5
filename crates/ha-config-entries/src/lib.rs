//! Config Entries
//!
//! A config entry is one configured instance of an integration. This crate
//! owns the entries, enforces their lifecycle state machine and drives the
//! integration's setup/unload hooks.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`IntegrationHandler`] - Setup/unload hooks an integration provides

pub mod entry;
pub mod manager;
pub mod state_machine;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState};
pub use manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult, IntegrationHandler};
pub use state_machine::InvalidTransition;
