//! Schema registry: immutable type collection with root operation types
//!
//! The registry is built once from a flattened collection of type
//! definitions and is read-only afterwards. Building fails fast on the
//! first structural problem so that no half-valid registry ever exists.

use super::types::{
    BUILTIN_SCALARS, FieldDef, InputValueDef, InterfaceType, ObjectType, TypeDef, TypeRef,
};
use crate::core::error::SchemaError;
use crate::execution::document::OperationKind;
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

fn name_regex() -> &'static Regex {
    static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    NAME_REGEX.get_or_init(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("valid name regex"))
}

/// Names of the root operation types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootTypes {
    pub query: String,
    pub mutation: Option<String>,
    pub subscription: Option<String>,
}

impl Default for RootTypes {
    fn default() -> Self {
        Self {
            query: "Query".to_string(),
            mutation: Some("Mutation".to_string()),
            subscription: Some("Subscription".to_string()),
        }
    }
}

/// Immutable, validated collection of type definitions
///
/// Safe to share between concurrent executions behind an `Arc` without
/// any locking.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    types: IndexMap<String, TypeDef>,
    query: String,
    mutation: Option<String>,
    subscription: Option<String>,
}

impl SchemaRegistry {
    /// Build a registry using the conventional root names
    ///
    /// `Query` is required; `Mutation` and `Subscription` are picked up when
    /// a type with that name exists.
    pub fn build<I>(types: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = TypeDef>,
    {
        Self::build_with_roots(types, RootTypes::default())
    }

    /// Build a registry with explicit root operation type names
    ///
    /// When the mutation or subscription names are set but no such type is
    /// defined, that operation is simply unsupported, unless the name came
    /// from an explicit override that differs from the convention, in which
    /// case the reference is dangling.
    pub fn build_with_roots<I>(types: I, roots: RootTypes) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = TypeDef>,
    {
        let mut registry: IndexMap<String, TypeDef> = IndexMap::new();

        for scalar in BUILTIN_SCALARS {
            registry.insert(scalar.to_string(), TypeDef::scalar(scalar));
        }

        for type_def in types {
            let name = type_def.name().to_string();
            if !name_regex().is_match(&name) {
                return Err(SchemaError::InvalidName { name });
            }
            if registry.contains_key(&name) {
                return Err(SchemaError::DuplicateType { name });
            }
            registry.insert(name, type_def);
        }

        let conventional = RootTypes::default();
        let mutation = Self::optional_root(
            &registry,
            roots.mutation,
            conventional.mutation.as_deref(),
        )?;
        let subscription = Self::optional_root(
            &registry,
            roots.subscription,
            conventional.subscription.as_deref(),
        )?;

        let schema = Self {
            types: registry,
            query: roots.query,
            mutation,
            subscription,
        };

        schema.validate()?;

        tracing::debug!(
            types = schema.types.len(),
            query = %schema.query,
            mutation = ?schema.mutation,
            subscription = ?schema.subscription,
            "Schema registry built"
        );

        Ok(schema)
    }

    fn optional_root(
        registry: &IndexMap<String, TypeDef>,
        requested: Option<String>,
        conventional: Option<&str>,
    ) -> Result<Option<String>, SchemaError> {
        let Some(name) = requested else {
            return Ok(None);
        };
        if registry.contains_key(&name) {
            return Ok(Some(name));
        }
        if Some(name.as_str()) == conventional {
            return Ok(None);
        }
        Err(SchemaError::DanglingReference {
            referrer: "schema".to_string(),
            name,
        })
    }

    /// Look up a type by name
    pub fn resolve_type(&self, name: &str) -> Result<&TypeDef, SchemaError> {
        self.types.get(name).ok_or_else(|| SchemaError::UnknownType {
            name: name.to_string(),
        })
    }

    /// Look up a type by name, returning `None` when absent
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// All registered types, built-in scalars first
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// Name of the root type for an operation kind
    pub fn root_type_name(&self, kind: OperationKind) -> Result<&str, SchemaError> {
        let name = match kind {
            OperationKind::Query => Some(self.query.as_str()),
            OperationKind::Mutation => self.mutation.as_deref(),
            OperationKind::Subscription => self.subscription.as_deref(),
        };
        name.ok_or(SchemaError::OperationNotSupported { operation: kind })
    }

    /// Root object type for an operation kind
    pub fn root_operation_type(&self, kind: OperationKind) -> Result<&ObjectType, SchemaError> {
        let name = self.root_type_name(kind)?;
        match self.resolve_type(name)? {
            TypeDef::Object(object) => Ok(object),
            _ => Err(SchemaError::InvalidRootType {
                operation: kind,
                name: name.to_string(),
            }),
        }
    }

    /// Field definition on an object or interface
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.types.get(type_name)?.fields()?.get(field_name)
    }

    /// Can an object of type `object_name` appear where `type_name` is expected?
    ///
    /// True when both name the same type, or when `type_name` is an
    /// interface the object implements.
    pub fn is_possible_type(&self, type_name: &str, object_name: &str) -> bool {
        if type_name == object_name {
            return true;
        }
        match self.types.get(object_name) {
            Some(TypeDef::Object(object)) => object.implements.contains(type_name),
            _ => false,
        }
    }

    /// Object types implementing an interface, in definition order
    pub fn implementations<'a>(&'a self, interface: &'a str) -> impl Iterator<Item = &'a ObjectType> {
        self.types.values().filter_map(move |t| match t {
            TypeDef::Object(object) if object.implements.contains(interface) => Some(object),
            _ => None,
        })
    }

    // -------------------------------------------------------------------------
    // Build-time validation
    // -------------------------------------------------------------------------

    fn validate(&self) -> Result<(), SchemaError> {
        match self.types.get(&self.query) {
            Some(TypeDef::Object(_)) => {}
            _ => {
                return Err(SchemaError::InvalidRootType {
                    operation: OperationKind::Query,
                    name: self.query.clone(),
                });
            }
        }
        for (kind, name) in [
            (OperationKind::Mutation, &self.mutation),
            (OperationKind::Subscription, &self.subscription),
        ] {
            if let Some(name) = name
                && !matches!(self.types.get(name), Some(TypeDef::Object(_)))
            {
                return Err(SchemaError::InvalidRootType {
                    operation: kind,
                    name: name.clone(),
                });
            }
        }

        for type_def in self.types.values() {
            match type_def {
                TypeDef::Scalar(_) => {}
                TypeDef::Enum(e) => {
                    for value in &e.values {
                        self.check_name(value)?;
                    }
                }
                TypeDef::Object(object) => {
                    self.validate_output_fields(&object.name, &object.fields)?;
                    for interface in &object.implements {
                        self.validate_implementation(object, interface)?;
                    }
                }
                TypeDef::Interface(interface) => {
                    self.validate_output_fields(&interface.name, &interface.fields)?;
                }
                TypeDef::InputObject(input) => {
                    for field in input.fields.values() {
                        let referrer = format!("{}.{}", input.name, field.name);
                        self.validate_input_value(&referrer, field)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<(), SchemaError> {
        if name_regex().is_match(name) {
            Ok(())
        } else {
            Err(SchemaError::InvalidName {
                name: name.to_string(),
            })
        }
    }

    fn check_type_ref(&self, referrer: &str, ty: &TypeRef) -> Result<&TypeDef, SchemaError> {
        if !ty.is_well_formed() {
            return Err(SchemaError::InvalidTypeRef {
                referrer: referrer.to_string(),
                type_ref: ty.to_string(),
            });
        }
        self.types
            .get(ty.named_type())
            .ok_or_else(|| SchemaError::DanglingReference {
                referrer: referrer.to_string(),
                name: ty.named_type().to_string(),
            })
    }

    fn validate_output_fields(
        &self,
        owner: &str,
        fields: &IndexMap<String, FieldDef>,
    ) -> Result<(), SchemaError> {
        for field in fields.values() {
            self.check_name(&field.name)?;
            let referrer = format!("{}.{}", owner, field.name);
            let target = self.check_type_ref(&referrer, &field.ty)?;
            if !target.is_output() {
                return Err(SchemaError::InvalidFieldType {
                    referrer,
                    name: target.name().to_string(),
                    message: format!("{} types cannot be returned by fields", target.kind()),
                });
            }
            for argument in &field.arguments {
                let referrer = format!("{}.{}({})", owner, field.name, argument.name);
                self.validate_input_value(&referrer, argument)?;
            }
        }
        Ok(())
    }

    fn validate_input_value(&self, referrer: &str, value: &InputValueDef) -> Result<(), SchemaError> {
        self.check_name(&value.name)?;
        let target = self.check_type_ref(referrer, &value.ty)?;
        if !target.is_input() {
            return Err(SchemaError::InvalidFieldType {
                referrer: referrer.to_string(),
                name: target.name().to_string(),
                message: format!("{} types cannot be used as input", target.kind()),
            });
        }
        Ok(())
    }

    fn validate_implementation(
        &self,
        object: &ObjectType,
        interface_name: &str,
    ) -> Result<(), SchemaError> {
        let interface: &InterfaceType = match self.types.get(interface_name) {
            Some(TypeDef::Interface(interface)) => interface,
            Some(other) => {
                return Err(SchemaError::InvalidImplementation {
                    object: object.name.clone(),
                    interface: interface_name.to_string(),
                    message: format!("'{}' is a {} type", interface_name, other.kind()),
                });
            }
            None => {
                return Err(SchemaError::DanglingReference {
                    referrer: object.name.clone(),
                    name: interface_name.to_string(),
                });
            }
        };

        for (name, expected) in &interface.fields {
            let Some(actual) = object.fields.get(name) else {
                return Err(SchemaError::InvalidImplementation {
                    object: object.name.clone(),
                    interface: interface.name.clone(),
                    message: format!("missing field '{}'", name),
                });
            };
            if !self.is_subtype(&actual.ty, &expected.ty) {
                return Err(SchemaError::InvalidImplementation {
                    object: object.name.clone(),
                    interface: interface.name.clone(),
                    message: format!(
                        "field '{}' has type '{}', expected '{}'",
                        name, actual.ty, expected.ty
                    ),
                });
            }
        }
        Ok(())
    }

    /// Covariant output type check used for interface fields
    fn is_subtype(&self, actual: &TypeRef, expected: &TypeRef) -> bool {
        match (actual, expected) {
            (TypeRef::NonNull(a), TypeRef::NonNull(e)) => self.is_subtype(a, e),
            (TypeRef::NonNull(a), e) => self.is_subtype(a, e),
            (_, TypeRef::NonNull(_)) => false,
            (TypeRef::List(a), TypeRef::List(e)) => self.is_subtype(a, e),
            (TypeRef::Named(a), TypeRef::Named(e)) => self.is_possible_type(e, a),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::FieldDef;

    fn blog_types() -> Vec<TypeDef> {
        vec![
            TypeDef::object(
                "User",
                [
                    FieldDef::new("id", TypeRef::required("ID")),
                    FieldDef::new("name", TypeRef::named("String")),
                    FieldDef::new(
                        "posts",
                        TypeRef::non_null(TypeRef::list(TypeRef::required("Post"))),
                    ),
                ],
            ),
            TypeDef::object(
                "Post",
                [
                    FieldDef::new("id", TypeRef::required("ID")),
                    FieldDef::new("title", TypeRef::named("String")),
                    FieldDef::new("author", TypeRef::required("User")),
                ],
            ),
            TypeDef::object(
                "Query",
                [FieldDef::new("user", TypeRef::named("User"))
                    .argument(InputValueDef::new("id", TypeRef::required("ID")))],
            ),
        ]
    }

    #[test]
    fn test_build_and_resolve() {
        let schema = SchemaRegistry::build(blog_types()).unwrap();

        assert!(matches!(schema.resolve_type("User"), Ok(TypeDef::Object(_))));
        assert!(matches!(schema.resolve_type("String"), Ok(TypeDef::Scalar(_))));
        assert_eq!(
            schema.resolve_type("Comment"),
            Err(SchemaError::UnknownType {
                name: "Comment".to_string()
            })
        );
        assert_eq!(schema.field("Post", "author").unwrap().ty.to_string(), "User!");
    }

    #[test]
    fn test_root_operation_types() {
        let schema = SchemaRegistry::build(blog_types()).unwrap();
        assert_eq!(
            schema.root_operation_type(OperationKind::Query).unwrap().name,
            "Query"
        );
        assert_eq!(
            schema.root_operation_type(OperationKind::Mutation),
            Err(SchemaError::OperationNotSupported {
                operation: OperationKind::Mutation
            })
        );
        assert!(schema.root_operation_type(OperationKind::Subscription).is_err());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut types = blog_types();
        types.push(TypeDef::object("User", []));
        assert_eq!(
            SchemaRegistry::build(types).unwrap_err(),
            SchemaError::DuplicateType {
                name: "User".to_string()
            }
        );
    }

    #[test]
    fn test_builtin_scalar_redefinition_rejected() {
        let mut types = blog_types();
        types.push(TypeDef::scalar("String"));
        assert!(matches!(
            SchemaRegistry::build(types),
            Err(SchemaError::DuplicateType { .. })
        ));
    }

    #[test]
    fn test_dangling_field_reference_rejected() {
        let mut types = blog_types();
        types.push(TypeDef::object(
            "Comment",
            [FieldDef::new("reactions", TypeRef::list(TypeRef::named("Reaction")))],
        ));
        assert_eq!(
            SchemaRegistry::build(types).unwrap_err(),
            SchemaError::DanglingReference {
                referrer: "Comment.reactions".to_string(),
                name: "Reaction".to_string()
            }
        );
    }

    #[test]
    fn test_dangling_interface_rejected() {
        let mut types = blog_types();
        types.push(TypeDef::object("Comment", [FieldDef::new("id", TypeRef::required("ID"))]).implementing(["Node"]));
        assert!(matches!(
            SchemaRegistry::build(types),
            Err(SchemaError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_nested_non_null_rejected() {
        let mut types = blog_types();
        types.push(TypeDef::object(
            "Broken",
            [FieldDef::new(
                "x",
                TypeRef::NonNull(Box::new(TypeRef::required("Int"))),
            )],
        ));
        assert!(matches!(
            SchemaRegistry::build(types),
            Err(SchemaError::InvalidTypeRef { .. })
        ));
    }

    #[test]
    fn test_missing_query_root_rejected() {
        let types = vec![TypeDef::object("User", [FieldDef::new("id", TypeRef::required("ID"))])];
        assert!(matches!(
            SchemaRegistry::build(types),
            Err(SchemaError::InvalidRootType {
                operation: OperationKind::Query,
                ..
            })
        ));
    }

    #[test]
    fn test_input_type_in_output_position_rejected() {
        let mut types = blog_types();
        types.push(TypeDef::input_object(
            "PostInput",
            [InputValueDef::new("title", TypeRef::required("String"))],
        ));
        types.push(TypeDef::object(
            "Draft",
            [FieldDef::new("input", TypeRef::named("PostInput"))],
        ));
        assert!(matches!(
            SchemaRegistry::build(types),
            Err(SchemaError::InvalidFieldType { .. })
        ));
    }

    #[test]
    fn test_interface_implementation_checked() {
        let node = TypeDef::interface("Node", [FieldDef::new("id", TypeRef::required("ID"))]);

        let mut types = blog_types();
        types.push(node.clone());
        types.push(TypeDef::object("Tag", [FieldDef::new("label", TypeRef::named("String"))]).implementing(["Node"]));
        assert!(matches!(
            SchemaRegistry::build(types),
            Err(SchemaError::InvalidImplementation { .. })
        ));

        let mut types = blog_types();
        types.push(node);
        types.push(TypeDef::object("Tag", [FieldDef::new("id", TypeRef::required("ID"))]).implementing(["Node"]));
        let schema = SchemaRegistry::build(types).unwrap();
        assert!(schema.is_possible_type("Node", "Tag"));
        assert!(!schema.is_possible_type("Node", "User"));
        assert_eq!(schema.implementations("Node").count(), 1);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut types = blog_types();
        types.push(TypeDef::scalar("1Date"));
        assert!(matches!(
            SchemaRegistry::build(types),
            Err(SchemaError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_explicit_roots() {
        let mut types = blog_types();
        types.push(TypeDef::object(
            "RootMutation",
            [FieldDef::new("noop", TypeRef::named("Boolean"))],
        ));
        let roots = RootTypes {
            query: "Query".to_string(),
            mutation: Some("RootMutation".to_string()),
            subscription: None,
        };
        let schema = SchemaRegistry::build_with_roots(types.clone(), roots).unwrap();
        assert_eq!(
            schema.root_type_name(OperationKind::Mutation).unwrap(),
            "RootMutation"
        );

        let roots = RootTypes {
            query: "Query".to_string(),
            mutation: Some("Missing".to_string()),
            subscription: None,
        };
        assert!(matches!(
            SchemaRegistry::build_with_roots(types, roots),
            Err(SchemaError::DanglingReference { .. })
        ));
    }
}
