//! Tests for the typed error taxonomy
//!
//! These tests verify that:
//! - Schema problems are caught when the registry is built
//! - Request problems reject the operation with a stable error code
//! - Resolver failures convert from common error types
//! - Field errors keep their kind and serialize without it

mod blog_harness;

use blog_harness::*;
use serde_json::json;
use std::sync::Arc;
use this_graphql::prelude::*;

// =============================================================================
// Schema build errors
// =============================================================================

mod schema_error_tests {
    use super::*;

    #[test]
    fn test_duplicate_type_is_rejected() {
        let err = SchemaRegistry::build(vec![
            TypeDef::object("Query", [FieldDef::new("ping", TypeRef::named("String"))]),
            TypeDef::object("Query", [FieldDef::new("pong", TypeRef::named("String"))]),
        ])
        .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_DUPLICATE_TYPE");
    }

    #[test]
    fn test_dangling_reference_is_rejected() {
        let err = SchemaRegistry::from_sdl("type Query { post: Post }").unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_DANGLING_REFERENCE");
        assert!(err.to_string().contains("Post"));
    }

    #[test]
    fn test_incomplete_interface_implementation() {
        let err = SchemaRegistry::from_sdl(
            r#"
            interface Node { id: ID! }
            type User implements Node { name: String }
            type Query { node: Node }
            "#,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_INVALID_IMPLEMENTATION");
    }

    #[test]
    fn test_missing_operation_root() {
        let schema = blog_schema();
        assert!(schema.root_operation_type(OperationKind::Mutation).is_ok());

        let schema = SchemaRegistry::from_sdl("type Query { ping: String }").unwrap();
        let err = schema
            .root_operation_type(OperationKind::Subscription)
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::OperationNotSupported {
                operation: OperationKind::Subscription
            }
        );
    }

    #[test]
    fn test_resolver_binding_checked_by_executor() {
        let mut resolvers = ResolverTable::new();
        resolvers.register_fn("Post", "body", |_, _, _| async { Ok(json!("text")) });

        let err = Executor::new(blog_schema(), Arc::new(resolvers)).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_INVALID_RESOLVER_BINDING");

        let engine_err: EngineError = err.into();
        assert_eq!(engine_err.error_code(), "SCHEMA_INVALID_RESOLVER_BINDING");
    }
}

// =============================================================================
// Request (validation) errors
// =============================================================================

mod validation_error_tests {
    use super::*;

    async fn rejection(query: &str, operation_name: Option<&str>) -> ValidationError {
        let blog = blog();
        let document = match OperationDocument::parse_operation(query, operation_name) {
            Ok(document) => document,
            Err(err) => return err,
        };
        this_graphql::execution::validate(blog.executor.schema(), &document, &Variables::new())
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_parse_error() {
        let err = rejection("{ user(id: ", None).await;
        assert_eq!(err.error_code(), "VALIDATION_PARSE_ERROR");
        assert!(err.to_string().starts_with("Failed to parse query"));
    }

    #[tokio::test]
    async fn test_operation_selection() {
        let two = "query A { posts { id } } query B { posts { title } }";
        assert_eq!(rejection(two, None).await, ValidationError::AmbiguousOperation);
        assert_eq!(
            rejection(two, Some("C")).await,
            ValidationError::UnknownOperation {
                name: "C".to_string()
            }
        );
        assert_eq!(
            rejection("fragment F on User { id }", None).await,
            ValidationError::NoOperation
        );
    }

    #[tokio::test]
    async fn test_unknown_field_and_directive() {
        assert_eq!(
            rejection("{ posts { body } }", None).await.error_code(),
            "VALIDATION_UNKNOWN_FIELD"
        );
        assert_eq!(
            rejection("{ posts { id @live } }", None).await.error_code(),
            "VALIDATION_UNKNOWN_DIRECTIVE"
        );
    }

    #[tokio::test]
    async fn test_validation_error_response_shape() {
        let blog = blog();
        let result = blog
            .executor
            .execute_request("{ posts { body } }", None, None)
            .await;
        assert_eq!(
            result.to_json(),
            json!({"errors": [{"message": "Cannot query field 'body' on type 'Post'"}]})
        );
    }
}

// =============================================================================
// Resolver errors
// =============================================================================

mod resolver_error_tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let from_str: ResolverError = "boom".into();
        assert_eq!(from_str.message, "boom");

        let from_anyhow: ResolverError = anyhow::anyhow!("db down").into();
        assert_eq!(from_anyhow.message, "db down");

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let from_json: ResolverError = json_err.into();
        assert!(!from_json.message.is_empty());
    }

    #[tokio::test]
    async fn test_question_mark_in_resolvers() {
        let schema = Arc::new(SchemaRegistry::from_sdl("type Query { parsed: Int }").unwrap());
        let mut resolvers = ResolverTable::new();
        resolvers.register_fn("Query", "parsed", |_, _, _| async {
            let value: serde_json::Value = serde_json::from_str("{ not json")?;
            Ok::<_, ResolverError>(value)
        });
        let executor = Executor::new(schema, Arc::new(resolvers)).unwrap();

        let result = executor.execute_request("{ parsed }", None, None).await;
        assert_eq!(result.data, Some(json!({"parsed": null})));
        assert_eq!(result.errors[0].kind, FieldErrorKind::Resolver);
        assert_eq!(result.errors[0].path_string(), "parsed");
    }

    #[tokio::test]
    async fn test_coercion_failure_is_a_field_error() {
        let schema = Arc::new(SchemaRegistry::from_sdl("type Query { count: Int! other: String }").unwrap());
        let mut resolvers = ResolverTable::new();
        resolvers
            .register_fn("Query", "count", |_, _, _| async { Ok(json!("many")) })
            .register_fn("Query", "other", |_, _, _| async { Ok(json!(true)) });
        let executor = Executor::new(schema, Arc::new(resolvers)).unwrap();

        let result = executor.execute_request("{ count other }", None, None).await;
        assert_eq!(result.data, Some(serde_json::Value::Null));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, FieldErrorKind::Coercion);
        assert_eq!(result.errors[0].kind.error_code(), "COERCION_ERROR");

        let serialized = serde_json::to_value(&result.errors[0]).unwrap();
        assert!(serialized.get("kind").is_none());
    }
}
