//! Per-field context handed to resolvers

use crate::execution::document::OperationKind;
use crate::execution::result::ResponsePath;
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Coerced argument values of a field, in declaration order
pub type Arguments = Map<String, Value>;

/// Shared application data made available to every resolver
pub type AppData = Arc<dyn Any + Send + Sync>;

/// Everything a resolver may need besides its parent value and arguments
///
/// Cheap to clone: the variables, cancellation token and application data
/// are shared with the whole execution.
#[derive(Clone)]
pub struct ResolverContext {
    parent_type: String,
    field_name: String,
    path: ResponsePath,
    operation: OperationKind,
    variables: Arc<Map<String, Value>>,
    cancellation: CancellationToken,
    app_data: Option<AppData>,
}

impl ResolverContext {
    pub(crate) fn new(
        parent_type: &str,
        field_name: &str,
        path: ResponsePath,
        operation: OperationKind,
        variables: Arc<Map<String, Value>>,
        cancellation: CancellationToken,
        app_data: Option<AppData>,
    ) -> Self {
        Self {
            parent_type: parent_type.to_string(),
            field_name: field_name.to_string(),
            path,
            operation,
            variables,
            cancellation,
            app_data,
        }
    }

    /// Context for invoking a resolver outside of an execution (tests, tools)
    pub fn detached(parent_type: &str, field_name: &str) -> Self {
        Self::new(
            parent_type,
            field_name,
            Vec::new(),
            OperationKind::Query,
            Arc::new(Map::new()),
            CancellationToken::new(),
            None,
        )
    }

    /// Name of the object type owning the field
    pub fn parent_type(&self) -> &str {
        &self.parent_type
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Response path of the field being resolved
    pub fn path(&self) -> &ResponsePath {
        &self.path
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Coerced operation variables
    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// Token cancelled when the client goes away or the deadline elapses
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Application data registered on the executor, if of type `T`
    pub fn data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.app_data.as_ref()?.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for ResolverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverContext")
            .field("parent_type", &self.parent_type)
            .field("field_name", &self.field_name)
            .field("path", &self.path)
            .field("operation", &self.operation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Store {
        name: &'static str,
    }

    #[test]
    fn test_data_downcast() {
        let mut ctx = ResolverContext::detached("Query", "user");
        assert!(ctx.data::<Store>().is_none());

        ctx.app_data = Some(Arc::new(Store { name: "memory" }));
        assert_eq!(ctx.data::<Store>().map(|s| s.name), Some("memory"));
        assert!(ctx.data::<String>().is_none());
    }

    #[test]
    fn test_cancellation_is_shared() {
        let ctx = ResolverContext::detached("Query", "user");
        let clone = ctx.clone();
        ctx.cancellation().cancel();
        assert!(clone.is_cancelled());
    }
}
