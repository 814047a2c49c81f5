//! Event bus with typed pub/sub
//!
//! Every event type gets its own broadcast channel, created on first
//! subscription. Events fired before anyone subscribed to their type only
//! reach the match-all channel.

use dashmap::DashMap;
use ha_core::{Context, Event, EventData, EventType};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

type RawEvent = Event<serde_json::Value>;

pub struct EventBus {
    channels: DashMap<EventType, broadcast::Sender<RawEvent>>,
    match_all: broadcast::Sender<RawEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all, _) = broadcast::channel(capacity);
        Self {
            channels: DashMap::new(),
            match_all,
            capacity,
        }
    }

    /// Subscribe to one event type, or to everything with `*`
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<RawEvent> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        if event_type.is_match_all() {
            return self.match_all.subscribe();
        }

        self.channels
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<RawEvent> {
        self.match_all.subscribe()
    }

    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver {
            rx: self.subscribe(T::event_type()),
            _phantom: PhantomData,
        }
    }

    /// Deliver an event to its type's subscribers and to match-all subscribers
    pub fn fire(&self, event: RawEvent) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.channels.get(&event.event_type) {
            // a send error only means nobody is listening right now
            let _ = sender.send(event.clone());
        }
        let _ = self.match_all.send(event);
    }

    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        let event = Event::typed(data, context);
        match serde_json::to_value(&event.data) {
            Ok(value) => self.fire(event.map_data(|_| value)),
            Err(err) => warn!(
                event_type = %event.event_type,
                error = %err,
                "Dropping event with unserializable data"
            ),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver that yields only events whose data parses as `T`
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<RawEvent>,
    _phantom: PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    /// Wait for the next event; events that fail to parse are skipped
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(event.map_data(|_| data));
            }
        }
    }
}

pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Answer {
        question: String,
        response: String,
    }

    impl EventData for Answer {
        fn event_type() -> &'static str {
            "test_answer"
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("test_event");

        bus.fire(Event::new("test_event", json!({"key": "value"}), Context::new()));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), "test_event");
        assert_eq!(received.data["key"], "value");
    }

    #[tokio::test]
    async fn test_match_all_sees_everything() {
        let bus = EventBus::new();
        let mut all = bus.subscribe("*");

        bus.fire(Event::new("event_a", json!({}), Context::new()));
        bus.fire(Event::new("event_b", json!({}), Context::new()));

        assert_eq!(all.recv().await.unwrap().event_type.as_str(), "event_a");
        assert_eq!(all.recv().await.unwrap().event_type.as_str(), "event_b");
    }

    #[tokio::test]
    async fn test_typed_round_trip_keeps_context() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<Answer>();
        let ctx = Context::new();

        bus.fire_typed(
            Answer {
                question: "lights?".into(),
                response: "off".into(),
            },
            ctx.clone(),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.data.response, "off");
        assert_eq!(event.context.id, ctx.id);
    }

    #[tokio::test]
    async fn test_typed_receiver_skips_foreign_payloads() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<Answer>();

        bus.fire(Event::new("test_answer", json!({"unrelated": 1}), Context::new()));
        bus.fire(Event::new(
            "test_answer",
            json!({"question": "q", "response": "r"}),
            Context::new(),
        ));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.data.question, "q");
    }

    #[test]
    fn test_no_cross_event_pollution() {
        let bus = EventBus::new();
        let mut rx_b = bus.subscribe("event_b");

        bus.fire(Event::new("event_a", json!({}), Context::new()));

        assert!(rx_b.try_recv().is_err());
    }
}
