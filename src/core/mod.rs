//! Core module containing the error taxonomy and event plumbing

pub mod error;
pub mod events;

pub use error::{EngineError, FieldErrorKind, ResolverError, SchemaError, ValidationError};
pub use events::{EventBus, EventEnvelope, SubscriptionEvent};
