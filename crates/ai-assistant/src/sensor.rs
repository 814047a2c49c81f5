//! Sensor platform
//!
//! Three read-through sensors per entry. They are written into the
//! [`StateMachine`] whenever the coordinator notifies its listeners.

use crate::coordinator::{AssistantCoordinator, Snapshot};
use crate::constants::DEFAULT_NAME;
use crate::error::AssistantResult;
use crate::listeners::ListenerHandle;
use ha_core::{Context, EntityId, STATE_UNAVAILABLE};
use ha_state_machine::StateMachine;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const SENSOR_DOMAIN: &str = "sensor";

/// Static description of one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub unit_of_measurement: Option<&'static str>,
}

pub const SENSOR_TYPES: [SensorDescription; 3] = [
    SensorDescription {
        key: "status",
        name: "Status",
        icon: "mdi:robot",
        unit_of_measurement: None,
    },
    SensorDescription {
        key: "conversation_count",
        name: "Conversation Count",
        icon: "mdi:message-text",
        unit_of_measurement: Some("conversations"),
    },
    SensorDescription {
        key: "last_response",
        name: "Last Response",
        icon: "mdi:comment-text",
        unit_of_measurement: None,
    },
];

#[derive(Debug, Clone)]
pub struct AssistantSensor {
    description: SensorDescription,
    entity_id: EntityId,
    unique_id: String,
    friendly_name: String,
}

impl AssistantSensor {
    pub fn new(entry_id: &str, description: SensorDescription) -> AssistantResult<Self> {
        let friendly_name = format!("{} {}", DEFAULT_NAME, description.name);
        Ok(Self {
            entity_id: EntityId::from_name(SENSOR_DOMAIN, &friendly_name)?,
            unique_id: format!("{}_{}", entry_id, description.key),
            friendly_name,
            description,
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn key(&self) -> &'static str {
        self.description.key
    }

    /// Value read from the snapshot, or this sensor's placeholder without one
    pub fn native_value(&self, snapshot: Option<&Snapshot>) -> Value {
        match (self.description.key, snapshot) {
            ("status", Some(s)) => json!(s.status),
            ("conversation_count", Some(s)) => json!(s.conversation_count),
            ("last_response", Some(s)) => json!(s.last_response),
            ("conversation_count", None) => json!(0),
            ("last_response", None) => json!("No response yet"),
            _ => json!(ha_core::STATE_UNKNOWN),
        }
    }

    /// State string as published; long responses are cut by the state machine
    pub fn state(&self, coordinator: &AssistantCoordinator) -> String {
        if !coordinator.last_update_success() {
            return STATE_UNAVAILABLE.to_string();
        }
        match self.native_value(coordinator.data().as_ref()) {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    pub fn attributes(&self, coordinator: &AssistantCoordinator) -> HashMap<String, Value> {
        let data = coordinator.data();
        let mut attributes = HashMap::from([
            ("friendly_name".to_string(), json!(self.friendly_name)),
            ("icon".to_string(), json!(self.description.icon)),
            (
                "last_update".to_string(),
                json!(data.as_ref().map(|d| d.last_update.to_rfc3339())),
            ),
            (
                "available".to_string(),
                json!(data.as_ref().map(|d| d.available).unwrap_or(false)),
            ),
        ]);
        if let Some(unit) = self.description.unit_of_measurement {
            attributes.insert("unit_of_measurement".to_string(), json!(unit));
        }
        if self.description.key == "last_response" {
            // the state is capped, the attribute keeps the full text
            attributes.insert("response".to_string(), self.native_value(data.as_ref()));
        }
        attributes
    }

    pub fn publish(&self, states: &StateMachine, coordinator: &AssistantCoordinator) {
        states.set(
            self.entity_id.clone(),
            self.state(coordinator),
            self.attributes(coordinator),
            Context::new(),
        );
    }
}

/// Sensors of one entry plus their coordinator subscription
pub struct SensorPlatform {
    sensors: Arc<Vec<AssistantSensor>>,
    listener: ListenerHandle<AssistantCoordinator>,
}

impl SensorPlatform {
    /// Create the sensors, publish them once and follow coordinator updates
    pub fn setup(
        coordinator: &AssistantCoordinator,
        states: Arc<StateMachine>,
    ) -> AssistantResult<Self> {
        let sensors = SENSOR_TYPES
            .iter()
            .map(|description| AssistantSensor::new(coordinator.entry_id(), *description))
            .collect::<AssistantResult<Vec<_>>>()?;
        let sensors = Arc::new(sensors);

        for sensor in sensors.iter() {
            sensor.publish(&states, coordinator);
        }

        let listener = {
            let sensors = sensors.clone();
            coordinator.add_listener(move |coordinator| {
                for sensor in sensors.iter() {
                    sensor.publish(&states, coordinator);
                }
            })
        };

        info!(
            entry_id = %coordinator.entry_id(),
            count = sensors.len(),
            "Sensor platform set up"
        );
        Ok(Self {
            sensors,
            listener,
        })
    }

    pub fn sensors(&self) -> &[AssistantSensor] {
        &self.sensors
    }

    /// Unsubscribe and remove the sensor states
    pub fn unload(self, states: &StateMachine) {
        let SensorPlatform { sensors, listener } = self;
        listener.remove();

        for sensor in sensors.iter() {
            states.remove(sensor.entity_id(), Context::new());
        }
        debug!("Sensor platform unloaded");
    }
}
