//! `ai_assistant.ask_question` and `ai_assistant.reset`

use crate::constants::*;
use crate::coordinator::AssistantCoordinator;
use crate::runtime::Coordinators;
use crate::Host;
use ha_core::{EventData, ServiceCall, SupportsResponse};
use ha_event_bus::EventBus;
use ha_service_registry::{ServiceDescription, ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Data of the `ai_assistant_response` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantResponseData {
    pub question: String,
    pub response: String,
}

impl EventData for AssistantResponseData {
    fn event_type() -> &'static str {
        EVENT_RESPONSE
    }
}

fn optional_string(call: &ServiceCall, key: &str) -> Result<Option<String>, ServiceError> {
    match call.service_data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ServiceError::InvalidData(format!(
            "{key} must be a string, got {other}"
        ))),
    }
}

/// The entry named in the call, or the first loaded one
fn target(
    coordinators: &Coordinators,
    call: &ServiceCall,
) -> Result<Arc<AssistantCoordinator>, ServiceError> {
    match optional_string(call, ATTR_ENTRY_ID)? {
        Some(entry_id) => coordinators.get(&entry_id).ok_or_else(|| {
            ServiceError::CallFailed(format!("no loaded {DOMAIN} entry with id {entry_id}"))
        }),
        None => coordinators
            .first()
            .ok_or_else(|| ServiceError::CallFailed(format!("no loaded {DOMAIN} entry"))),
    }
}

async fn ask_question(
    coordinators: &Coordinators,
    bus: &EventBus,
    call: ServiceCall,
) -> ServiceResult {
    let coordinator = target(coordinators, &call)?;
    let question = optional_string(&call, ATTR_QUESTION)?.unwrap_or_default();
    info!(entry_id = %coordinator.entry_id(), "Question received: {}", question);

    let response = coordinator.ask(&question).await;

    bus.fire_typed(
        AssistantResponseData {
            question,
            response: response.clone(),
        },
        call.context.clone(),
    );
    Ok(Some(json!({ ATTR_RESPONSE: response })))
}

async fn reset(coordinators: &Coordinators, call: ServiceCall) -> ServiceResult {
    target(coordinators, &call)?.reset().await;
    Ok(None)
}

pub(crate) fn register_services(host: &Host, coordinators: Arc<Coordinators>) {
    let bus = host.bus.clone();
    let ask_coordinators = coordinators.clone();
    host.services.register(
        ServiceDescription {
            name: Some("Ask question".to_string()),
            description: Some("Ask the AI assistant a question".to_string()),
            fields: Some(json!({
                ATTR_QUESTION: {"description": "The question to ask", "example": "Which lights are on?"},
                ATTR_ENTRY_ID: {"description": "Entry to ask, defaults to the first loaded one"}
            })),
            supports_response: SupportsResponse::Optional,
            ..ServiceDescription::new(DOMAIN, SERVICE_ASK_QUESTION)
        },
        move |call: ServiceCall| {
            let coordinators = ask_coordinators.clone();
            let bus = bus.clone();
            async move { ask_question(&coordinators, &bus, call).await }
        },
    );

    host.services.register(
        ServiceDescription {
            name: Some("Reset".to_string()),
            description: Some("Reset the conversation counter".to_string()),
            fields: Some(json!({
                ATTR_ENTRY_ID: {"description": "Entry to reset, defaults to the first loaded one"}
            })),
            ..ServiceDescription::new(DOMAIN, SERVICE_RESET)
        },
        move |call: ServiceCall| {
            let coordinators = coordinators.clone();
            async move { reset(&coordinators, call).await }
        },
    );

    info!("AI assistant services registered");
}
