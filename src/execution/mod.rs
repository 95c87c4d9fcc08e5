//! Operation parsing, validation and execution

pub mod coercion;
mod collect;
pub mod document;
pub mod executor;
pub mod parser;
pub mod result;
pub mod validation;

use serde_json::{Map, Value};

/// Variable values supplied with an operation, keyed by name (without `$`)
pub type Variables = Map<String, Value>;

pub use coercion::{coerce_input, coerce_output_leaf};
pub use document::{
    Directive, FragmentDefinition, FragmentSpread, InlineFragment, InputValue, OperationDocument,
    OperationKind, Selection, SelectionNode, VariableDefinition,
};
pub use executor::{ExecutionOptions, Executor, PreparedOperation, execute};
pub use result::{ExecutionResult, FieldError, PathSegment, ResponsePath};
pub use validation::validate;
