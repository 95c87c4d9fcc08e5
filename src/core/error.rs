//! Typed error handling for the execution engine
//!
//! Errors fall in two families:
//!
//! - Request-fatal errors, raised before any resolver runs:
//!   - [`SchemaError`]: the schema could not be built, no registry is produced
//!   - [`ValidationError`]: the operation document is rejected, `data` is absent
//! - Field-scoped errors, recovered through null propagation:
//!   - [`ResolverError`]: returned by resolvers
//!   - [`FieldErrorKind`]: the classification recorded with each field error
//!     (resolver failure, coercion, non-null violation, timeout, cancellation)
//!
//! # Example
//!
//! ```rust,ignore
//! use this_graphql::prelude::*;
//!
//! match SchemaRegistry::from_sdl(sdl) {
//!     Ok(schema) => println!("{} types", schema.types().count()),
//!     Err(SchemaError::DuplicateType { name }) => eprintln!("{} defined twice", name),
//!     Err(e) => eprintln!("{} ({})", e, e.error_code()),
//! }
//! ```

use crate::execution::document::OperationKind;
use thiserror::Error;

/// Umbrella error for entry points that may fail before execution starts
#[derive(Debug, Error)]
pub enum EngineError {
    /// Schema construction failed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The operation document was rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl EngineError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Schema(e) => e.error_code(),
            EngineError::Validation(e) => e.error_code(),
        }
    }
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors raised while building or querying the schema registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No type with this name is registered
    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    /// The schema declares no root type for this operation kind
    #[error("Schema does not support {operation} operations")]
    OperationNotSupported { operation: OperationKind },

    /// Two definitions share the same type name
    #[error("Type '{name}' is defined more than once")]
    DuplicateType { name: String },

    /// A field, argument or interface list references a type that does not exist
    #[error("'{referrer}' references unknown type '{name}'")]
    DanglingReference { referrer: String, name: String },

    /// A type reference is malformed (e.g. a non-null wrapping a non-null)
    #[error("'{referrer}' has an invalid type reference '{type_ref}'")]
    InvalidTypeRef { referrer: String, type_ref: String },

    /// An object type does not satisfy an interface it declares
    #[error("Type '{object}' does not correctly implement '{interface}': {message}")]
    InvalidImplementation {
        object: String,
        interface: String,
        message: String,
    },

    /// An input type used in output position, or an output type used as input
    #[error("'{referrer}' cannot use type '{name}' here: {message}")]
    InvalidFieldType {
        referrer: String,
        name: String,
        message: String,
    },

    /// A root operation type is missing or is not an object type
    #[error("Invalid {operation} root type '{name}'")]
    InvalidRootType {
        operation: OperationKind,
        name: String,
    },

    /// A type, field or argument name is not a valid GraphQL name
    #[error("Invalid name: '{name}'")]
    InvalidName { name: String },

    /// A resolver was registered for a field the schema does not declare
    #[error("Resolver bound to unknown field {type_name}.{field_name}")]
    InvalidResolverBinding {
        type_name: String,
        field_name: String,
    },

    /// The schema definition text could not be loaded
    #[error("Schema definition error: {message}")]
    Sdl { message: String },
}

impl SchemaError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SchemaError::UnknownType { .. } => "SCHEMA_UNKNOWN_TYPE",
            SchemaError::OperationNotSupported { .. } => "SCHEMA_OPERATION_NOT_SUPPORTED",
            SchemaError::DuplicateType { .. } => "SCHEMA_DUPLICATE_TYPE",
            SchemaError::DanglingReference { .. } => "SCHEMA_DANGLING_REFERENCE",
            SchemaError::InvalidTypeRef { .. } => "SCHEMA_INVALID_TYPE_REF",
            SchemaError::InvalidImplementation { .. } => "SCHEMA_INVALID_IMPLEMENTATION",
            SchemaError::InvalidFieldType { .. } => "SCHEMA_INVALID_FIELD_TYPE",
            SchemaError::InvalidRootType { .. } => "SCHEMA_INVALID_ROOT_TYPE",
            SchemaError::InvalidName { .. } => "SCHEMA_INVALID_NAME",
            SchemaError::InvalidResolverBinding { .. } => "SCHEMA_INVALID_RESOLVER_BINDING",
            SchemaError::Sdl { .. } => "SCHEMA_SDL_ERROR",
        }
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors that reject an operation before any resolver runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The operation text is not valid GraphQL
    #[error("Failed to parse query: {message}")]
    Parse { message: String },

    /// The document contains no operation definition
    #[error("No operation found in document")]
    NoOperation,

    /// The requested operation name does not exist in the document
    #[error("Unknown operation named '{name}'")]
    UnknownOperation { name: String },

    /// Several operations are defined and none was selected
    #[error("Document defines several operations, an operation name is required")]
    AmbiguousOperation,

    /// The schema has no root type for this operation kind
    #[error("Schema does not support {operation} operations")]
    OperationNotSupported { operation: OperationKind },

    /// A fragment spreads itself, directly or transitively
    #[error("Fragment '{name}' spreads itself")]
    CyclicFragment { name: String },

    /// A fragment spread names a fragment that is not defined
    #[error("Unknown fragment '{name}'")]
    UnknownFragment { name: String },

    /// A type condition or variable type names an unknown type
    #[error("Unknown type '{name}'")]
    UnknownType { name: String },

    /// A required variable was not supplied and has no default
    #[error("Variable '${name}' of required type '{expected}' was not provided")]
    MissingVariable { name: String, expected: String },

    /// A variable is used but never declared by the operation
    #[error("Variable '${name}' is not defined")]
    UndeclaredVariable { name: String },

    /// A variable is declared with a type that is not an input type
    #[error("Variable '${name}' cannot be of non-input type '{type_ref}'")]
    InvalidVariableType { name: String, type_ref: String },

    /// A supplied variable value does not match its declared type
    #[error("Variable '${name}' got invalid value: {message}")]
    InvalidVariableValue { name: String, message: String },

    /// An argument value does not match the argument's declared type
    #[error("Argument '{argument}' on field '{field}' has invalid value: {message}")]
    ArgumentTypeMismatch {
        field: String,
        argument: String,
        message: String,
    },

    /// A required argument is absent
    #[error("Field '{field}' argument '{argument}' of type '{expected}' is required")]
    MissingArgument {
        field: String,
        argument: String,
        expected: String,
    },

    /// An argument is not declared by the field
    #[error("Unknown argument '{argument}' on field '{field}'")]
    UnknownArgument { field: String, argument: String },

    /// The field does not exist on the selected type
    #[error("Cannot query field '{field}' on type '{type_name}'")]
    UnknownField { type_name: String, field: String },

    /// A directive other than `@include` or `@skip`
    #[error("Unknown directive '@{name}'")]
    UnknownDirective { name: String },

    /// A leaf field has a sub-selection, or a composite field has none
    #[error("Invalid selection on field '{field}': {message}")]
    InvalidSelection { field: String, message: String },

    /// A subscription selects more or less than one root field
    #[error("Subscription must select exactly one top level field, found {count}")]
    SingleRootField { count: usize },

    /// A non-subscription document was handed to the subscription broker
    #[error("Expected a subscription operation, got {operation}")]
    NotASubscription { operation: OperationKind },
}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::Parse { .. } => "VALIDATION_PARSE_ERROR",
            ValidationError::NoOperation => "VALIDATION_NO_OPERATION",
            ValidationError::UnknownOperation { .. } => "VALIDATION_UNKNOWN_OPERATION",
            ValidationError::AmbiguousOperation => "VALIDATION_AMBIGUOUS_OPERATION",
            ValidationError::OperationNotSupported { .. } => "VALIDATION_OPERATION_NOT_SUPPORTED",
            ValidationError::CyclicFragment { .. } => "VALIDATION_CYCLIC_FRAGMENT",
            ValidationError::UnknownFragment { .. } => "VALIDATION_UNKNOWN_FRAGMENT",
            ValidationError::UnknownType { .. } => "VALIDATION_UNKNOWN_TYPE",
            ValidationError::MissingVariable { .. } => "VALIDATION_MISSING_VARIABLE",
            ValidationError::UndeclaredVariable { .. } => "VALIDATION_UNDECLARED_VARIABLE",
            ValidationError::InvalidVariableType { .. } => "VALIDATION_INVALID_VARIABLE_TYPE",
            ValidationError::InvalidVariableValue { .. } => "VALIDATION_INVALID_VARIABLE_VALUE",
            ValidationError::ArgumentTypeMismatch { .. } => "VALIDATION_ARGUMENT_TYPE_MISMATCH",
            ValidationError::MissingArgument { .. } => "VALIDATION_MISSING_ARGUMENT",
            ValidationError::UnknownArgument { .. } => "VALIDATION_UNKNOWN_ARGUMENT",
            ValidationError::UnknownField { .. } => "VALIDATION_UNKNOWN_FIELD",
            ValidationError::UnknownDirective { .. } => "VALIDATION_UNKNOWN_DIRECTIVE",
            ValidationError::InvalidSelection { .. } => "VALIDATION_INVALID_SELECTION",
            ValidationError::SingleRootField { .. } => "VALIDATION_SINGLE_ROOT_FIELD",
            ValidationError::NotASubscription { .. } => "VALIDATION_NOT_A_SUBSCRIPTION",
        }
    }
}

// =============================================================================
// Field Errors
// =============================================================================

/// Failure returned by a resolver
///
/// Resolvers can build one from a string or propagate any `anyhow::Error`
/// with `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResolverError {
    pub message: String,
}

impl ResolverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ResolverError {
    fn from(err: anyhow::Error) -> Self {
        ResolverError::new(err.to_string())
    }
}

impl From<String> for ResolverError {
    fn from(message: String) -> Self {
        ResolverError { message }
    }
}

impl From<&str> for ResolverError {
    fn from(message: &str) -> Self {
        ResolverError::new(message)
    }
}

impl From<serde_json::Error> for ResolverError {
    fn from(err: serde_json::Error) -> Self {
        ResolverError::new(err.to_string())
    }
}

/// Classification of a recorded field error
///
/// Every kind is field-scoped: the engine nulls the smallest nullable
/// ancestor and keeps executing unrelated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldErrorKind {
    /// The resolver returned an error
    Resolver,
    /// The resolved value could not be coerced to the declared type
    Coercion,
    /// A non-null position resolved to null
    NonNull,
    /// The execution deadline elapsed before the field resolved
    Timeout,
    /// The execution was cancelled before the field resolved
    Cancelled,
    /// Request-level error carried in the response (validation failure)
    Request,
}

impl FieldErrorKind {
    pub fn error_code(&self) -> &'static str {
        match self {
            FieldErrorKind::Resolver => "RESOLVER_ERROR",
            FieldErrorKind::Coercion => "COERCION_ERROR",
            FieldErrorKind::NonNull => "NON_NULL_VIOLATION",
            FieldErrorKind::Timeout => "TIMEOUT_ERROR",
            FieldErrorKind::Cancelled => "CANCELLED",
            FieldErrorKind::Request => "REQUEST_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::DanglingReference {
            referrer: "User.posts".to_string(),
            name: "Post".to_string(),
        };
        assert!(err.to_string().contains("User.posts"));
        assert!(err.to_string().contains("Post"));
        assert_eq!(err.error_code(), "SCHEMA_DANGLING_REFERENCE");
    }

    #[test]
    fn test_operation_not_supported_mentions_kind() {
        let err = SchemaError::OperationNotSupported {
            operation: OperationKind::Mutation,
        };
        assert_eq!(err.to_string(), "Schema does not support mutation operations");
    }

    #[test]
    fn test_validation_error_codes() {
        assert_eq!(
            ValidationError::CyclicFragment {
                name: "A".to_string()
            }
            .error_code(),
            "VALIDATION_CYCLIC_FRAGMENT"
        );
        assert_eq!(
            ValidationError::MissingVariable {
                name: "id".to_string(),
                expected: "ID!".to_string()
            }
            .error_code(),
            "VALIDATION_MISSING_VARIABLE"
        );
    }

    #[test]
    fn test_engine_error_wraps_codes() {
        let err: EngineError = ValidationError::NoOperation.into();
        assert_eq!(err.error_code(), "VALIDATION_NO_OPERATION");

        let err: EngineError = SchemaError::InvalidName {
            name: "1bad".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "SCHEMA_INVALID_NAME");
        assert!(err.to_string().contains("1bad"));
    }

    #[test]
    fn test_resolver_error_from_anyhow() {
        let err: ResolverError = anyhow::anyhow!("database unavailable").into();
        assert_eq!(err.message, "database unavailable");

        let err: ResolverError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }
}
