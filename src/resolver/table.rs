//! Resolver table: (type, field) → resolver capability

use super::context::{Arguments, ResolverContext};
use crate::core::error::{ResolverError, SchemaError};
use crate::schema::SchemaRegistry;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Unit of logic producing a field's value
///
/// Resolvers may perform I/O; their suspension only delays the field they
/// resolve, sibling fields keep progressing.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        parent: &Value,
        args: &Arguments,
        ctx: &ResolverContext,
    ) -> Result<Value, ResolverError>;
}

/// Resolver used for every field without a registered resolver
///
/// Reads the field name as a key of the parent object, falling back to the
/// snake_case spelling of a camelCase field (`createdAt` → `created_at`).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPropertyResolver;

impl DefaultPropertyResolver {
    pub fn lookup(parent: &Value, field_name: &str) -> Value {
        let Some(object) = parent.as_object() else {
            return Value::Null;
        };
        if let Some(value) = object.get(field_name) {
            return value.clone();
        }
        object
            .get(&camel_to_snake(field_name))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl Resolver for DefaultPropertyResolver {
    async fn resolve(
        &self,
        parent: &Value,
        _args: &Arguments,
        ctx: &ResolverContext,
    ) -> Result<Value, ResolverError> {
        Ok(Self::lookup(parent, ctx.field_name()))
    }
}

/// Convert camelCase to snake_case
fn camel_to_snake(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

/// Adapter turning an async closure into a [`Resolver`]
///
/// The closure receives owned copies so the returned future can be `'static`.
pub struct FnResolver<F> {
    f: F,
}

impl<F> FnResolver<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Resolver for FnResolver<F>
where
    F: Fn(Value, Arguments, ResolverContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ResolverError>> + Send + 'static,
{
    async fn resolve(
        &self,
        parent: &Value,
        args: &Arguments,
        ctx: &ResolverContext,
    ) -> Result<Value, ResolverError> {
        (self.f)(parent.clone(), args.clone(), ctx.clone()).await
    }
}

/// Decides the concrete object type of a value returned for an interface
pub type TypeResolver = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Maps (type name, field name) to resolvers
///
/// Immutable once handed to an executor; shared behind an `Arc` by all
/// concurrent executions.
#[derive(Default)]
pub struct ResolverTable {
    resolvers: HashMap<String, HashMap<String, Arc<dyn Resolver>>>,
    type_resolvers: HashMap<String, TypeResolver>,
    default_resolver: DefaultPropertyResolver,
}

impl ResolverTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver for `type_name.field_name`, replacing any previous one
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: Arc<dyn Resolver>,
    ) -> &mut Self {
        self.resolvers
            .entry(type_name.into())
            .or_default()
            .insert(field_name.into(), resolver);
        self
    }

    /// Register an async closure as resolver
    ///
    /// ```rust,ignore
    /// table.register_fn("Query", "user", |_parent, args, ctx| async move {
    ///     let store = ctx.data::<Store>().ok_or("store missing")?;
    ///     Ok(store.user(args["id"].as_str().unwrap_or_default()))
    /// });
    /// ```
    pub fn register_fn<F, Fut>(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        f: F,
    ) -> &mut Self
    where
        F: Fn(Value, Arguments, ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolverError>> + Send + 'static,
    {
        self.register(type_name, field_name, Arc::new(FnResolver::new(f)))
    }

    /// Register how values of an interface map to concrete object types
    pub fn register_type_resolver<F>(&mut self, interface: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.type_resolvers.insert(interface.into(), Arc::new(f));
        self
    }

    /// Resolver for a field, or the default property resolver
    pub fn lookup(&self, type_name: &str, field_name: &str) -> &dyn Resolver {
        match self.find(type_name, field_name) {
            Some(resolver) => resolver.as_ref(),
            None => &self.default_resolver,
        }
    }

    /// Explicitly registered resolver for a field
    pub fn find(&self, type_name: &str, field_name: &str) -> Option<&Arc<dyn Resolver>> {
        self.resolvers.get(type_name)?.get(field_name)
    }

    /// Concrete object type for a value in interface position
    ///
    /// Uses the registered type resolver, else the value's `__typename` key.
    pub fn resolve_abstract_type(&self, interface: &str, value: &Value) -> Option<String> {
        if let Some(resolver) = self.type_resolvers.get(interface) {
            return resolver(value);
        }
        value
            .get("__typename")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Check that every registered resolver names a field the schema declares
    pub fn bind(&self, schema: &SchemaRegistry) -> Result<(), SchemaError> {
        for (type_name, fields) in &self.resolvers {
            for field_name in fields.keys() {
                if schema.field(type_name, field_name).is_none() {
                    return Err(SchemaError::InvalidResolverBinding {
                        type_name: type_name.clone(),
                        field_name: field_name.clone(),
                    });
                }
            }
        }
        for interface in self.type_resolvers.keys() {
            schema.resolve_type(interface)?;
        }
        Ok(())
    }

    /// Number of registered field resolvers
    pub fn len(&self) -> usize {
        self.resolvers.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ResolverTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bound: Vec<String> = self
            .resolvers
            .iter()
            .flat_map(|(t, fields)| fields.keys().map(move |field| format!("{}.{}", t, field)))
            .collect();
        bound.sort();
        f.debug_struct("ResolverTable")
            .field("resolvers", &bound)
            .field("type_resolvers", &self.type_resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, TypeDef, TypeRef};
    use serde_json::json;

    #[tokio::test]
    async fn test_default_resolver_reads_parent_key() {
        let table = ResolverTable::new();
        let parent = json!({"name": "Alice", "created_at": "2024-01-01"});

        let ctx = ResolverContext::detached("User", "name");
        let value = table
            .lookup("User", "name")
            .resolve(&parent, &Arguments::new(), &ctx)
            .await
            .unwrap();
        assert_eq!(value, json!("Alice"));

        let ctx = ResolverContext::detached("User", "createdAt");
        let value = table
            .lookup("User", "createdAt")
            .resolve(&parent, &Arguments::new(), &ctx)
            .await
            .unwrap();
        assert_eq!(value, json!("2024-01-01"));
    }

    #[test]
    fn test_default_resolver_on_non_object_parent() {
        assert_eq!(DefaultPropertyResolver::lookup(&json!(3), "id"), Value::Null);
        assert_eq!(DefaultPropertyResolver::lookup(&json!({}), "id"), Value::Null);
    }

    #[tokio::test]
    async fn test_registered_fn_resolver() {
        let mut table = ResolverTable::new();
        table.register_fn("Query", "greet", |_parent, args, _ctx| async move {
            let name = args.get("name").and_then(Value::as_str).unwrap_or("world").to_string();
            Ok(json!(format!("hello {}", name)))
        });

        let mut args = Arguments::new();
        args.insert("name".to_string(), json!("Bob"));
        let ctx = ResolverContext::detached("Query", "greet");
        let value = table
            .lookup("Query", "greet")
            .resolve(&Value::Null, &args, &ctx)
            .await
            .unwrap();
        assert_eq!(value, json!("hello Bob"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("createdAt"), "created_at");
        assert_eq!(camel_to_snake("id"), "id");
        assert_eq!(camel_to_snake("authorUserId"), "author_user_id");
    }

    #[test]
    fn test_abstract_type_resolution() {
        let mut table = ResolverTable::new();
        assert_eq!(
            table.resolve_abstract_type("Node", &json!({"__typename": "User"})),
            Some("User".to_string())
        );
        assert_eq!(table.resolve_abstract_type("Node", &json!({})), None);

        table.register_type_resolver("Node", |value| {
            value.get("title").map(|_| "Post".to_string())
        });
        assert_eq!(
            table.resolve_abstract_type("Node", &json!({"title": "x"})),
            Some("Post".to_string())
        );
    }

    #[test]
    fn test_bind_rejects_unknown_field() {
        let schema = SchemaRegistry::build(vec![TypeDef::object(
            "Query",
            [FieldDef::new("ping", TypeRef::named("String"))],
        )])
        .unwrap();

        let mut table = ResolverTable::new();
        table.register_fn("Query", "ping", |_, _, _| async { Ok(json!("pong")) });
        assert!(table.bind(&schema).is_ok());

        table.register_fn("Query", "pong", |_, _, _| async { Ok(json!("ping")) });
        assert_eq!(
            table.bind(&schema),
            Err(SchemaError::InvalidResolverBinding {
                type_name: "Query".to_string(),
                field_name: "pong".to_string()
            })
        );
    }
}
