//! Core host types
//!
//! Value types shared by every crate in the workspace: entity identifiers,
//! entity states, events, service calls and the context that ties them
//! together.

mod context;
mod entity_id;
mod event;
mod service_call;
mod state;

pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use event::{Event, EventData, EventOrigin, EventType};
pub use service_call::{ServiceCall, SupportsResponse};
pub use state::State;

/// Maximum length for a state value
pub const MAX_STATE_LENGTH: usize = 255;

/// State value for entities whose value is not known yet
pub const STATE_UNKNOWN: &str = "unknown";

/// State value for entities whose source cannot be reached
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Event types fired by the host itself
pub mod events {
    use super::*;

    /// Fired whenever an entity state is written or removed
    pub const STATE_CHANGED: &str = "state_changed";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}
