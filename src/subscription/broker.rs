//! Subscription broker
//!
//! Tracks live subscriptions by subscription root field name. Each
//! published event runs a fresh execution of every matching subscriber's
//! prepared operation, with the event as root value, and pushes the result
//! to that subscriber's channel.
//!
//! ```text
//! EventBus ──recv──▶ SubscriptionBroker::run_dispatch_loop()
//!                          │
//!                    publish(field, payload)
//!                          │
//!                    for each Active subscriber of field
//!                          │
//!                    Executor pass (root value = payload)
//!                          │
//!                    ──▶ SubscriptionReceiver
//! ```

use super::handle::{StateCell, SubscriptionHandle, SubscriptionReceiver, SubscriptionState};
use crate::config::SubscriptionConfig;
use crate::core::error::ValidationError;
use crate::core::events::{EventBus, EventEnvelope};
use crate::execution::{ExecutionResult, Executor, OperationDocument, OperationKind, PreparedOperation, Variables};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Broker-side registration of one subscriber
#[derive(Clone)]
struct Subscriber {
    id: String,
    operation: PreparedOperation,
    state: Arc<StateCell>,
    tx: mpsc::UnboundedSender<ExecutionResult>,
}

/// Manages subscriptions and fans published events out to them
///
/// Reads (publish) vastly outnumber writes (subscribe/unsubscribe), hence
/// the `RwLock`.
pub struct SubscriptionBroker {
    executor: Executor,
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    event_bus: EventBus,
}

impl SubscriptionBroker {
    pub fn new(executor: Executor) -> Self {
        Self::with_config(executor, &SubscriptionConfig::default())
    }

    pub fn with_config(executor: Executor, config: &SubscriptionConfig) -> Self {
        Self::with_event_bus(executor, EventBus::new(config.event_bus_capacity))
    }

    /// Use an existing bus, e.g. one already handed to mutation resolvers
    pub fn with_event_bus(executor: Executor, event_bus: EventBus) -> Self {
        Self {
            executor,
            subscribers: RwLock::new(HashMap::new()),
            event_bus,
        }
    }

    /// Bus whose envelopes [`run_dispatch_loop`](Self::run_dispatch_loop) forwards
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Register a subscription operation
    ///
    /// The document is validated once, here. It must be a subscription
    /// selecting exactly one root field.
    pub async fn subscribe(
        &self,
        document: OperationDocument,
        variables: &Variables,
    ) -> Result<(SubscriptionHandle, SubscriptionReceiver), ValidationError> {
        if document.kind != OperationKind::Subscription {
            return Err(ValidationError::NotASubscription {
                operation: document.kind,
            });
        }

        let operation = self.executor.prepare(document, variables)?;
        let field = operation
            .root_field()
            .ok_or(ValidationError::SingleRootField { count: 0 })?
            .to_string();

        let id = format!("sub_{}", Uuid::new_v4().simple());
        let state = Arc::new(StateCell::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let subscriber = Subscriber {
            id: id.clone(),
            operation,
            state: state.clone(),
            tx,
        };

        self.subscribers
            .write()
            .await
            .entry(field.clone())
            .or_default()
            .push(subscriber);
        state.activate();

        tracing::debug!(subscription_id = %id, field = %field, "Subscription added");

        Ok((SubscriptionHandle { id, field, state }, SubscriptionReceiver { rx }))
    }

    /// Deliver an event to every active subscriber of `field`
    ///
    /// Returns the number of results delivered. Subscribers whose receiver
    /// was dropped are terminated and removed.
    pub async fn publish(&self, field: &str, event: Value) -> usize {
        let targets: Vec<Subscriber> = match self.subscribers.read().await.get(field) {
            Some(subscribers) => subscribers
                .iter()
                .filter(|s| s.state.get() == SubscriptionState::Active)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        if targets.is_empty() {
            tracing::trace!(field = %field, "No subscribers for event");
            return 0;
        }

        let executions = targets.iter().map(|subscriber| {
            let event = event.clone();
            async move {
                if subscriber.tx.is_closed() {
                    return None;
                }
                Some(
                    self.executor
                        .execute_prepared(&subscriber.operation, event, CancellationToken::new())
                        .await,
                )
            }
        });
        let results = join_all(executions).await;

        let mut delivered = 0;
        let mut disconnected = Vec::new();
        for (subscriber, result) in targets.iter().zip(results) {
            // Unsubscribed while executing: discard
            if subscriber.state.get() != SubscriptionState::Active {
                continue;
            }
            let Some(result) = result else {
                disconnected.push(subscriber.id.as_str());
                continue;
            };
            if !result.errors.is_empty() {
                tracing::debug!(
                    subscription_id = %subscriber.id,
                    errors = result.errors.len(),
                    "Subscription delivery carries field errors"
                );
            }
            match subscriber.tx.send(result) {
                Ok(()) => delivered += 1,
                Err(_) => disconnected.push(subscriber.id.as_str()),
            }
        }

        if !disconnected.is_empty() {
            tracing::warn!(
                field = %field,
                count = disconnected.len(),
                "Receivers gone, dropping deliveries and terminating subscriptions"
            );
            self.remove(field, &disconnected).await;
        }

        tracing::debug!(field = %field, delivered = delivered, "Event published");
        delivered
    }

    /// Terminate a subscription
    ///
    /// Returns `true` if the subscription was active and is now removed.
    /// An in-flight publication for it completes but is not delivered.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = self.remove(&handle.field, &[handle.id.as_str()]).await;
        if removed > 0 {
            tracing::debug!(
                subscription_id = %handle.id,
                field = %handle.field,
                "Subscription removed"
            );
        }
        removed > 0
    }

    async fn remove(&self, field: &str, ids: &[&str]) -> usize {
        let mut subscribers = self.subscribers.write().await;
        let Some(list) = subscribers.get_mut(field) else {
            return 0;
        };

        let before = list.len();
        list.retain(|subscriber| {
            if !ids.contains(&subscriber.id.as_str()) {
                return true;
            }
            subscriber.state.terminate();
            false
        });
        let removed = before - list.len();

        if list.is_empty() {
            subscribers.remove(field);
        }
        removed
    }

    /// Number of registered subscribers for a field
    pub async fn subscriber_count(&self, field: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(field)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Forward events from an [`EventBus`] receiver to [`publish`](Self::publish)
    ///
    /// Should be spawned as a background task. Exits when every sender of
    /// the bus has been dropped.
    pub async fn run_dispatch_loop(&self, mut rx: broadcast::Receiver<EventEnvelope>) {
        tracing::info!("Subscription dispatch loop started");

        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    tracing::trace!(event_id = %envelope.id, field = %envelope.event.field, "Dispatching event");
                    self.publish(&envelope.event.field, envelope.event.payload).await;
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    tracing::warn!(
                        count = count,
                        "Subscription dispatch loop lagged, {} events skipped",
                        count
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("EventBus closed, stopping subscription dispatch loop");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionBroker")
            .field("executor", &self.executor)
            .field("event_bus", &self.event_bus)
            .finish()
    }
}
