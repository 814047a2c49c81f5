//! Error types of the integration

use std::time::Duration;
use thiserror::Error;

/// A failed exchange with the chat-completion endpoint
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The worker thread running the request panicked or was cancelled
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Raised by a refresh that could not produce a snapshot
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Error communicating with AI Assistant: {0}")]
pub struct UpdateFailed(pub String);

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("invalid entry options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error("entry not ready: {0}")]
    NotReady(#[from] UpdateFailed),

    #[error("invalid sensor entity id: {0}")]
    EntityId(#[from] ha_core::EntityIdError),
}

pub type AssistantResult<T> = Result<T, AssistantError>;
