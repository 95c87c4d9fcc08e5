//! # this-graphql
//!
//! A GraphQL execution engine: takes an operation against a schema and a
//! table of field resolvers and produces a correctly shaped, partially
//! failable response.
//!
//! ## Features
//!
//! - **Schema Registry**: object, interface, enum, input and scalar types,
//!   built from Rust values or SDL and validated once at build time
//! - **Resolver Table**: async resolvers per (type, field), with a default
//!   property resolver for everything else
//! - **Execution Engine**: concurrent sibling resolution, sequential
//!   mutations, null propagation to the nearest nullable ancestor, field
//!   errors with response paths, deadlines and cooperative cancellation
//! - **Subscription Broker**: live subscriptions keyed by root field,
//!   one execution per subscriber per published event
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use this_graphql::prelude::*;
//!
//! let schema = SchemaRegistry::from_sdl(r#"
//!     type User { id: ID! name: String }
//!     type Query { user(id: ID!): User }
//! "#)?;
//!
//! let mut resolvers = ResolverTable::new();
//! resolvers.register_fn("Query", "user", |_, args, _| async move {
//!     Ok(json!({ "id": args["id"], "name": "Alice" }))
//! });
//!
//! let executor = Executor::new(Arc::new(schema), Arc::new(resolvers))?;
//! let result = executor
//!     .execute_request(r#"{ user(id: "1") { name } }"#, None, None)
//!     .await;
//! assert_eq!(result.to_json(), json!({ "data": { "user": { "name": "Alice" } } }));
//! ```

pub mod config;
pub mod core;
pub mod execution;
pub mod resolver;
pub mod schema;
pub mod subscription;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Schema ===
    pub use crate::schema::{FieldDef, InputValueDef, RootTypes, SchemaRegistry, TypeDef, TypeRef};

    // === Resolvers ===
    pub use crate::resolver::{Arguments, Resolver, ResolverContext, ResolverTable};

    // === Execution ===
    pub use crate::execution::{
        ExecutionOptions, ExecutionResult, Executor, FieldError, OperationDocument, OperationKind,
        PathSegment, SelectionNode, Variables, execute,
    };

    // === Subscriptions ===
    pub use crate::core::events::{EventBus, SubscriptionEvent};
    pub use crate::subscription::{
        SubscriptionBroker, SubscriptionHandle, SubscriptionReceiver, SubscriptionState,
    };

    // === Errors and config ===
    pub use crate::config::EngineConfig;
    pub use crate::core::error::{
        EngineError, FieldErrorKind, ResolverError, SchemaError, ValidationError,
    };

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
