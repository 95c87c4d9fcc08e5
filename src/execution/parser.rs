//! Conversion of GraphQL query text into an [`OperationDocument`]

use super::coercion::const_value_to_json;
use super::document::{
    Directive, FragmentDefinition, FragmentSpread, InlineFragment, InputValue, OperationDocument,
    OperationKind, Selection, SelectionNode, VariableDefinition,
};
use crate::core::error::ValidationError;
use crate::schema::TypeRef;
use graphql_parser::query::{
    self as q, Definition, OperationDefinition, TypeCondition, parse_query,
};
use indexmap::IndexMap;

impl OperationDocument {
    /// Parse a document holding exactly one operation
    ///
    /// A shorthand selection set (`{ ... }`) is a query.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        Self::parse_operation(text, None)
    }

    /// Parse a document and select one of its operations by name
    pub fn parse_operation(text: &str, operation_name: Option<&str>) -> Result<Self, ValidationError> {
        let doc = parse_query::<String>(text).map_err(|e| ValidationError::Parse {
            message: e.to_string(),
        })?;

        let mut operations = Vec::new();
        let mut fragments = IndexMap::new();
        for definition in &doc.definitions {
            match definition {
                Definition::Operation(operation) => operations.push(operation),
                Definition::Fragment(fragment) => {
                    let converted = convert_fragment(fragment);
                    fragments.insert(converted.name.clone(), converted);
                }
            }
        }

        let operation = match operation_name {
            Some(name) => operations
                .into_iter()
                .find(|op| operation_name_of(op) == Some(name))
                .ok_or_else(|| ValidationError::UnknownOperation {
                    name: name.to_string(),
                })?,
            None => match operations.len() {
                0 => return Err(ValidationError::NoOperation),
                1 => operations[0],
                _ => return Err(ValidationError::AmbiguousOperation),
            },
        };

        let mut document = convert_operation(operation);
        document.fragments = fragments;
        Ok(document)
    }
}

fn operation_name_of<'a>(operation: &'a OperationDefinition<'_, String>) -> Option<&'a str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref(),
    }
}

fn convert_operation(operation: &OperationDefinition<'_, String>) -> OperationDocument {
    let (kind, name, variables, selection_set) = match operation {
        OperationDefinition::SelectionSet(selection_set) => {
            (OperationKind::Query, None, &[][..], selection_set)
        }
        OperationDefinition::Query(query) => (
            OperationKind::Query,
            query.name.clone(),
            &query.variable_definitions[..],
            &query.selection_set,
        ),
        OperationDefinition::Mutation(mutation) => (
            OperationKind::Mutation,
            mutation.name.clone(),
            &mutation.variable_definitions[..],
            &mutation.selection_set,
        ),
        OperationDefinition::Subscription(subscription) => (
            OperationKind::Subscription,
            subscription.name.clone(),
            &subscription.variable_definitions[..],
            &subscription.selection_set,
        ),
    };

    OperationDocument {
        kind,
        name,
        variables: variables
            .iter()
            .map(|def| {
                (
                    def.name.clone(),
                    VariableDefinition {
                        name: def.name.clone(),
                        ty: convert_type(&def.var_type),
                        default: def.default_value.as_ref().map(const_value_to_json),
                    },
                )
            })
            .collect(),
        selections: convert_selection_set(selection_set),
        fragments: IndexMap::new(),
    }
}

fn convert_fragment(fragment: &q::FragmentDefinition<'_, String>) -> FragmentDefinition {
    let TypeCondition::On(type_condition) = &fragment.type_condition;
    FragmentDefinition {
        name: fragment.name.clone(),
        type_condition: type_condition.clone(),
        selections: convert_selection_set(&fragment.selection_set),
    }
}

fn convert_selection_set(selection_set: &q::SelectionSet<'_, String>) -> Vec<Selection> {
    selection_set.items.iter().map(convert_selection).collect()
}

fn convert_selection(selection: &q::Selection<'_, String>) -> Selection {
    match selection {
        q::Selection::Field(field) => Selection::Field(SelectionNode {
            alias: field.alias.clone(),
            name: field.name.clone(),
            arguments: convert_arguments(&field.arguments),
            selections: convert_selection_set(&field.selection_set),
            directives: convert_directives(&field.directives),
        }),
        q::Selection::FragmentSpread(spread) => Selection::FragmentSpread(FragmentSpread {
            name: spread.fragment_name.clone(),
            directives: convert_directives(&spread.directives),
        }),
        q::Selection::InlineFragment(inline) => Selection::InlineFragment(InlineFragment {
            type_condition: inline
                .type_condition
                .as_ref()
                .map(|TypeCondition::On(name)| name.clone()),
            directives: convert_directives(&inline.directives),
            selections: convert_selection_set(&inline.selection_set),
        }),
    }
}

fn convert_directives(directives: &[q::Directive<'_, String>]) -> Vec<Directive> {
    directives
        .iter()
        .map(|d| Directive {
            name: d.name.clone(),
            arguments: convert_arguments(&d.arguments),
        })
        .collect()
}

fn convert_arguments(arguments: &[(String, q::Value<'_, String>)]) -> IndexMap<String, InputValue> {
    arguments
        .iter()
        .map(|(name, value)| (name.clone(), convert_value(value)))
        .collect()
}

/// Convert a parsed literal into an [`InputValue`]
fn convert_value(value: &q::Value<'_, String>) -> InputValue {
    match value {
        q::Value::Null => InputValue::Null,
        // Integers outside i64 fall back to float and fail Int coercion later
        q::Value::Int(i) => match i.as_i64() {
            Some(i) => InputValue::Int(i),
            None => InputValue::Float(f64::INFINITY),
        },
        q::Value::Float(f) => InputValue::Float(*f),
        q::Value::String(s) => InputValue::String(s.clone()),
        q::Value::Boolean(b) => InputValue::Boolean(*b),
        q::Value::Enum(e) => InputValue::Enum(e.clone()),
        q::Value::Variable(name) => InputValue::Variable(name.clone()),
        q::Value::List(items) => InputValue::List(items.iter().map(convert_value).collect()),
        q::Value::Object(fields) => InputValue::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), convert_value(v)))
                .collect(),
        ),
    }
}

fn convert_type(ty: &q::Type<'_, String>) -> TypeRef {
    match ty {
        q::Type::NamedType(name) => TypeRef::named(name.clone()),
        q::Type::ListType(inner) => TypeRef::list(convert_type(inner)),
        q::Type::NonNullType(inner) => TypeRef::NonNull(Box::new(convert_type(inner))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_shorthand_query() {
        let doc = OperationDocument::parse(r#"{ user(id: "1") { name posts { title } } }"#).unwrap();

        assert_eq!(doc.kind, OperationKind::Query);
        assert_eq!(doc.selections.len(), 1);
        let Selection::Field(user) = &doc.selections[0] else {
            panic!("Expected field");
        };
        assert_eq!(user.name, "user");
        assert_eq!(user.arguments.get("id"), Some(&InputValue::from("1")));
        assert_eq!(user.selections.len(), 2);
    }

    #[test]
    fn test_parse_variables_and_defaults() {
        let doc = OperationDocument::parse(
            "query Feed($limit: Int = 5, $after: ID) { posts(limit: $limit) { id } }",
        )
        .unwrap();

        assert_eq!(doc.name.as_deref(), Some("Feed"));
        let limit = doc.variables.get("limit").unwrap();
        assert_eq!(limit.ty, TypeRef::named("Int"));
        assert_eq!(limit.default, Some(json!(5)));
        assert_eq!(doc.variables.get("after").unwrap().default, None);
    }

    #[test]
    fn test_parse_mutation_with_alias() {
        let doc = OperationDocument::parse("mutation { a: create(x: 1) { id } b: create(x: 2) { id } }")
            .unwrap();
        assert_eq!(doc.kind, OperationKind::Mutation);
        let keys: Vec<_> = doc
            .selections
            .iter()
            .map(|s| match s {
                Selection::Field(f) => f.response_key().to_string(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_fragments_and_directives() {
        let doc = OperationDocument::parse(
            r#"
            query ($withPosts: Boolean!) {
                user(id: "1") {
                    ...UserFields
                    posts @include(if: $withPosts) { title }
                    ... on User { id }
                }
            }
            fragment UserFields on User { name }
            "#,
        )
        .unwrap();

        let fragment = doc.fragments.get("UserFields").unwrap();
        assert_eq!(fragment.type_condition, "User");

        let Selection::Field(user) = &doc.selections[0] else {
            panic!("Expected field");
        };
        assert!(matches!(&user.selections[0], Selection::FragmentSpread(s) if s.name == "UserFields"));
        let Selection::Field(posts) = &user.selections[1] else {
            panic!("Expected field");
        };
        assert_eq!(posts.directives[0], Directive::include(InputValue::variable("withPosts")));
        assert!(matches!(
            &user.selections[2],
            Selection::InlineFragment(i) if i.type_condition.as_deref() == Some("User")
        ));
    }

    #[test]
    fn test_parse_error() {
        let err = OperationDocument::parse("not valid graphql {{{{").unwrap_err();
        assert!(matches!(err, ValidationError::Parse { .. }));
        assert!(err.to_string().contains("Failed to parse query"));
    }

    #[test]
    fn test_fragment_only_document_has_no_operation() {
        let err = OperationDocument::parse("fragment F on User { id }").unwrap_err();
        assert_eq!(err, ValidationError::NoOperation);
    }

    #[test]
    fn test_operation_selection_by_name() {
        let text = "query A { a } query B { b }";
        assert_eq!(
            OperationDocument::parse(text).unwrap_err(),
            ValidationError::AmbiguousOperation
        );
        let doc = OperationDocument::parse_operation(text, Some("B")).unwrap();
        assert_eq!(doc.name.as_deref(), Some("B"));
        assert!(matches!(
            OperationDocument::parse_operation(text, Some("C")),
            Err(ValidationError::UnknownOperation { .. })
        ));
    }
}
