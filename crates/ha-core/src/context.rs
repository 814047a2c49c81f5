//! Context type for tracking who triggered an action

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Origin of an event, state write or service call
///
/// A service call handler passes its call's context on to everything it
/// causes (state writes, fired events), so observers can correlate a
/// `ai_assistant_response` event with the `ask_question` call behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier (ULID)
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Context that caused this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
            user_id: None,
            parent_id: None,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
