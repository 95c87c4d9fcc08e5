//! Pre-execution validation
//!
//! Everything that can reject an operation as a whole is checked here,
//! before any resolver runs: root operation support, variable presence and
//! types, fragment existence and cycles, field existence, argument types
//! and selection shapes.

use super::Variables;
use super::coercion::{check_literal_kind, coerce_input};
use super::document::{
    Directive, InputValue, OperationDocument, OperationKind, Selection, SelectionNode,
};
use crate::core::error::ValidationError;
use crate::schema::{SchemaRegistry, TypeDef, TypeRef};
use std::collections::{HashMap, HashSet};

/// Validate a document against a schema and coerce its variables
///
/// Returns the coerced variable values (defaults applied) on success.
pub fn validate(
    schema: &SchemaRegistry,
    document: &OperationDocument,
    variables: &Variables,
) -> Result<Variables, ValidationError> {
    let root = schema
        .root_type_name(document.kind)
        .map_err(|_| ValidationError::OperationNotSupported {
            operation: document.kind,
        })?;

    let coerced = coerce_variables(schema, document, variables)?;
    check_fragment_cycles(document)?;

    let mut validator = SelectionValidator {
        schema,
        document,
        variables: &coerced,
        validated_fragments: HashSet::new(),
    };
    validator.validate_selection_set(root, &document.selections)?;

    if document.kind == OperationKind::Subscription {
        let count = count_root_fields(document, &document.selections);
        if count != 1 {
            return Err(ValidationError::SingleRootField { count });
        }
    }

    Ok(coerced)
}

/// Coerce supplied variables against the operation's declarations
fn coerce_variables(
    schema: &SchemaRegistry,
    document: &OperationDocument,
    variables: &Variables,
) -> Result<Variables, ValidationError> {
    let mut coerced = Variables::new();

    for (name, definition) in &document.variables {
        let Some(type_def) = schema.get_type(definition.ty.named_type()) else {
            return Err(ValidationError::UnknownType {
                name: definition.ty.named_type().to_string(),
            });
        };
        if !type_def.is_input() || !definition.ty.is_well_formed() {
            return Err(ValidationError::InvalidVariableType {
                name: name.clone(),
                type_ref: definition.ty.to_string(),
            });
        }

        match variables.get(name).or(definition.default.as_ref()) {
            Some(value) => {
                let value = coerce_input(schema, &definition.ty, value).map_err(|message| {
                    ValidationError::InvalidVariableValue {
                        name: name.clone(),
                        message,
                    }
                })?;
                coerced.insert(name.clone(), value);
            }
            None if definition.ty.is_non_null() => {
                return Err(ValidationError::MissingVariable {
                    name: name.clone(),
                    expected: definition.ty.to_string(),
                });
            }
            None => {}
        }
    }

    Ok(coerced)
}

/// Names of fragments spread anywhere inside a selection set
fn spreads_of(selections: &[Selection]) -> Vec<&str> {
    let mut names = Vec::new();
    let mut stack: Vec<&[Selection]> = vec![selections];
    while let Some(set) = stack.pop() {
        for selection in set {
            match selection {
                Selection::Field(field) => stack.push(&field.selections),
                Selection::FragmentSpread(spread) => names.push(spread.name.as_str()),
                Selection::InlineFragment(inline) => stack.push(&inline.selections),
            }
        }
    }
    names
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Reject unknown fragments and fragments that spread themselves
fn check_fragment_cycles(document: &OperationDocument) -> Result<(), ValidationError> {
    fn visit<'a>(
        document: &'a OperationDocument,
        name: &'a str,
        state: &mut HashMap<&'a str, Visit>,
    ) -> Result<(), ValidationError> {
        match state.get(name) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => {
                return Err(ValidationError::CyclicFragment {
                    name: name.to_string(),
                });
            }
            None => {}
        }
        let fragment = document
            .fragments
            .get(name)
            .ok_or_else(|| ValidationError::UnknownFragment {
                name: name.to_string(),
            })?;

        state.insert(name, Visit::InProgress);
        for spread in spreads_of(&fragment.selections) {
            visit(document, spread, state)?;
        }
        state.insert(name, Visit::Done);
        Ok(())
    }

    let mut state = HashMap::new();
    for name in document.fragments.keys() {
        visit(document, name, &mut state)?;
    }
    for name in spreads_of(&document.selections) {
        visit(document, name, &mut state)?;
    }
    Ok(())
}

/// Number of root fields, looking through fragments
fn count_root_fields(document: &OperationDocument, selections: &[Selection]) -> usize {
    selections
        .iter()
        .map(|selection| match selection {
            Selection::Field(_) => 1,
            Selection::InlineFragment(inline) => count_root_fields(document, &inline.selections),
            Selection::FragmentSpread(spread) => document
                .fragments
                .get(&spread.name)
                .map(|f| count_root_fields(document, &f.selections))
                .unwrap_or(0),
        })
        .sum()
}

struct SelectionValidator<'a> {
    schema: &'a SchemaRegistry,
    document: &'a OperationDocument,
    variables: &'a Variables,
    validated_fragments: HashSet<&'a str>,
}

impl<'a> SelectionValidator<'a> {
    fn validate_selection_set(
        &mut self,
        type_name: &str,
        selections: &'a [Selection],
    ) -> Result<(), ValidationError> {
        for selection in selections {
            self.validate_directives(selection.directives())?;
            match selection {
                Selection::Field(field) => self.validate_field(type_name, field)?,
                Selection::InlineFragment(inline) => {
                    let target = match &inline.type_condition {
                        Some(condition) => {
                            self.composite_type(condition)?;
                            condition.as_str()
                        }
                        None => type_name,
                    };
                    self.validate_selection_set(target, &inline.selections)?;
                }
                Selection::FragmentSpread(spread) => {
                    let fragment = self.document.fragments.get(&spread.name).ok_or_else(|| {
                        ValidationError::UnknownFragment {
                            name: spread.name.clone(),
                        }
                    })?;
                    if self.validated_fragments.insert(fragment.name.as_str()) {
                        self.composite_type(&fragment.type_condition)?;
                        self.validate_selection_set(&fragment.type_condition, &fragment.selections)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn composite_type(&self, name: &str) -> Result<&'a TypeDef, ValidationError> {
        match self.schema.get_type(name) {
            Some(type_def) if type_def.is_composite() => Ok(type_def),
            _ => Err(ValidationError::UnknownType {
                name: name.to_string(),
            }),
        }
    }

    fn validate_field(&mut self, type_name: &str, field: &'a SelectionNode) -> Result<(), ValidationError> {
        if field.name == "__typename" {
            if !field.selections.is_empty() {
                return Err(ValidationError::InvalidSelection {
                    field: field.name.clone(),
                    message: "leaf field cannot have a selection set".to_string(),
                });
            }
            return Ok(());
        }

        let field_def = self.schema.field(type_name, &field.name).ok_or_else(|| {
            ValidationError::UnknownField {
                type_name: type_name.to_string(),
                field: field.name.clone(),
            }
        })?;
        let qualified = format!("{}.{}", type_name, field.name);

        for argument in field.arguments.keys() {
            if field_def.find_argument(argument).is_none() {
                return Err(ValidationError::UnknownArgument {
                    field: qualified,
                    argument: argument.clone(),
                });
            }
        }
        for definition in &field_def.arguments {
            let provided = field.arguments.get(&definition.name);
            self.validate_argument(&qualified, &definition.name, &definition.ty, provided, definition.default.is_some())?;
        }

        let target = self
            .schema
            .get_type(field_def.ty.named_type())
            .ok_or_else(|| ValidationError::UnknownType {
                name: field_def.ty.named_type().to_string(),
            })?;
        match (target.is_leaf(), field.selections.is_empty()) {
            (true, false) => Err(ValidationError::InvalidSelection {
                field: qualified,
                message: format!("leaf type '{}' cannot have a selection set", target.name()),
            }),
            (false, true) => Err(ValidationError::InvalidSelection {
                field: qualified,
                message: format!("type '{}' must have a selection of subfields", target.name()),
            }),
            (true, true) => Ok(()),
            (false, false) => self.validate_selection_set(target.name(), &field.selections),
        }
    }

    fn validate_argument(
        &self,
        field: &str,
        argument: &str,
        ty: &TypeRef,
        provided: Option<&InputValue>,
        has_default: bool,
    ) -> Result<(), ValidationError> {
        if let Some(value) = provided {
            for variable in value.variables() {
                if !self.document.variables.contains_key(variable) {
                    return Err(ValidationError::UndeclaredVariable {
                        name: variable.to_string(),
                    });
                }
            }
            check_literal_kind(self.schema, ty, value).map_err(|message| {
                ValidationError::ArgumentTypeMismatch {
                    field: field.to_string(),
                    argument: argument.to_string(),
                    message,
                }
            })?;
        }

        match provided.and_then(|v| v.resolve(self.variables)) {
            Some(value) => coerce_input(self.schema, ty, &value).map(|_| ()).map_err(|message| {
                ValidationError::ArgumentTypeMismatch {
                    field: field.to_string(),
                    argument: argument.to_string(),
                    message,
                }
            }),
            None if ty.is_non_null() && !has_default => Err(ValidationError::MissingArgument {
                field: field.to_string(),
                argument: argument.to_string(),
                expected: ty.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn validate_directives(&self, directives: &[Directive]) -> Result<(), ValidationError> {
        let condition_type = TypeRef::required("Boolean");
        for directive in directives {
            if directive.name != "include" && directive.name != "skip" {
                return Err(ValidationError::UnknownDirective {
                    name: directive.name.clone(),
                });
            }
            let label = format!("@{}", directive.name);
            if let Some(unknown) = directive.arguments.keys().find(|k| k.as_str() != "if") {
                return Err(ValidationError::UnknownArgument {
                    field: label,
                    argument: unknown.clone(),
                });
            }
            self.validate_argument(&label, "if", &condition_type, directive.arguments.get("if"), false)?;
        }
        Ok(())
    }
}

/// Evaluate `@include` / `@skip` on a selection
///
/// Expects validated directives; an unresolvable condition keeps the field.
pub(crate) fn should_include(directives: &[Directive], variables: &Variables) -> bool {
    directives.iter().all(|directive| {
        let condition = directive
            .arguments
            .get("if")
            .and_then(|v| v.resolve(variables))
            .and_then(|v| v.as_bool());
        match (directive.name.as_str(), condition) {
            ("skip", Some(true)) => false,
            ("include", Some(false)) => false,
            _ => true,
        }
    })
}
