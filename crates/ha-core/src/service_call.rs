//! Service call type

use crate::Context;
use serde::{Deserialize, Serialize};

/// A call to a registered service such as `ai_assistant.ask_question`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub service_data: serde_json::Value,
    pub context: Context,
}

impl ServiceCall {
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: serde_json::Value,
        context: Context,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
            context,
        }
    }
}

/// Whether a service can hand a response back to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportsResponse {
    #[default]
    None,
    Optional,
    Only,
}
