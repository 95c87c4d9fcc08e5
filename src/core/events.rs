//! Internal event bus for subscription publication
//!
//! The EventBus decouples writers (typically mutation resolvers) from the
//! subscription broker. It uses `tokio::sync::broadcast`, so publishing is
//! synchronous and never blocks the resolver that triggers it.
//!
//! # Architecture
//!
//! ```text
//! Mutation resolver ──▶ EventBus::publish() ──▶ broadcast channel ──▶ SubscriptionBroker::run_dispatch_loop()
//!                                                                       │
//!                                                                 publish(field, payload)
//!                                                                       │
//!                                                           one execution per subscriber
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let event_bus = EventBus::new(1024);
//! let rx = event_bus.subscribe();
//! tokio::spawn(async move { broker.run_dispatch_loop(rx).await });
//!
//! event_bus.publish(SubscriptionEvent::new("postAdded", json!({"id": "104"})));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A value published for a subscription root field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    /// Subscription field name (e.g. "postAdded")
    pub field: String,
    /// Event value handed to the subscription's root field
    pub payload: serde_json::Value,
}

impl SubscriptionEvent {
    pub fn new(field: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            payload,
        }
    }
}

/// Envelope wrapping a subscription event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: SubscriptionEvent,
}

impl EventEnvelope {
    /// Create a new event envelope
    pub fn new(event: SubscriptionEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone and shareable across threads.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// The capacity determines how many events can be buffered before
    /// slow receivers start losing events (lagged).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all receivers
    ///
    /// Never fails. Without receivers the event is dropped.
    /// Returns the number of receivers that will see the event.
    pub fn publish(&self, event: SubscriptionEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the current number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
