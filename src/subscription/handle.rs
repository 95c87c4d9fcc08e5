//! Subscription handles, lifecycle state and delivery receivers

use crate::execution::ExecutionResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Lifecycle of one subscription
///
/// `Idle → Active` on subscribe, `Active → Terminated` on unsubscribe or
/// when the receiving side goes away. `Terminated` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    Idle,
    Active,
    Terminated,
}

impl SubscriptionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SubscriptionState::Idle,
            1 => SubscriptionState::Active,
            _ => SubscriptionState::Terminated,
        }
    }
}

/// State shared by a handle and the broker's registration
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SubscriptionState::Idle as u8))
    }

    pub fn get(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Idle → Active; false if the subscription already left Idle
    pub fn activate(&self) -> bool {
        self.0
            .compare_exchange(
                SubscriptionState::Idle as u8,
                SubscriptionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to Terminated; returns the previous state
    pub fn terminate(&self) -> SubscriptionState {
        SubscriptionState::from_u8(
            self.0
                .swap(SubscriptionState::Terminated as u8, Ordering::AcqRel),
        )
    }
}

/// Caller-side reference to a registered subscription
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    pub(crate) id: String,
    pub(crate) field: String,
    pub(crate) state: Arc<StateCell>,
}

impl SubscriptionHandle {
    /// Unique subscription ID (`sub_…`)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Subscription root field the handle is registered against
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn state(&self) -> SubscriptionState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }
}

/// Output channel of one subscriber: one [`ExecutionResult`] per event
///
/// Dropping the receiver counts as a client disconnect; the broker
/// terminates the subscription on its next publication.
#[derive(Debug)]
pub struct SubscriptionReceiver {
    pub(crate) rx: mpsc::UnboundedReceiver<ExecutionResult>,
}

impl SubscriptionReceiver {
    /// Next delivered result; `None` once the subscription is terminated
    pub async fn recv(&mut self) -> Option<ExecutionResult> {
        self.rx.recv().await
    }

    /// Already delivered result, without waiting
    pub fn try_recv(&mut self) -> Option<ExecutionResult> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<ExecutionResult> {
        UnboundedReceiverStream::new(self.rx)
    }
}
