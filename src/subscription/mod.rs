//! Live subscriptions
//!
//! Subscriptions are registered against their root field name and receive
//! one [`ExecutionResult`](crate::execution::ExecutionResult) per published
//! event.

pub mod broker;
pub mod handle;

pub use broker::SubscriptionBroker;
pub use handle::{SubscriptionHandle, SubscriptionReceiver, SubscriptionState};
