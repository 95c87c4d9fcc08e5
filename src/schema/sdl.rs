//! Schema loading from the GraphQL schema definition language
//!
//! Parses SDL with `graphql-parser`, flattens `extend ...` blocks into
//! their base definitions and hands the resulting type collection to
//! [`SchemaRegistry::build_with_roots`].

use super::registry::{RootTypes, SchemaRegistry};
use super::types::{FieldDef, InputValueDef, TypeDef, TypeRef};
use crate::core::error::SchemaError;
use crate::execution::coercion::const_value_to_json;
use graphql_parser::schema::{
    Definition, Document, Field, InputValue, Type, TypeDefinition, TypeExtension, parse_schema,
};
use indexmap::IndexMap;

impl SchemaRegistry {
    /// Build a registry from SDL text
    ///
    /// ```rust,ignore
    /// let schema = SchemaRegistry::from_sdl(r#"
    ///     type User { id: ID!, name: String }
    ///     type Query { user(id: ID!): User }
    /// "#)?;
    /// ```
    pub fn from_sdl(sdl: &str) -> Result<Self, SchemaError> {
        let (types, roots) = type_collection_from_sdl(sdl)?;
        SchemaRegistry::build_with_roots(types, roots)
    }
}

/// Parse SDL into a flattened type collection plus root type names
pub fn type_collection_from_sdl(sdl: &str) -> Result<(Vec<TypeDef>, RootTypes), SchemaError> {
    let document: Document<'_, String> = parse_schema::<String>(sdl).map_err(|e| SchemaError::Sdl {
        message: e.to_string(),
    })?;

    let mut roots = RootTypes::default();
    let mut types: IndexMap<String, TypeDef> = IndexMap::new();
    let mut extensions = Vec::new();

    for definition in &document.definitions {
        match definition {
            Definition::SchemaDefinition(schema) => {
                if let Some(query) = &schema.query {
                    roots.query = query.clone();
                }
                roots.mutation = schema.mutation.clone();
                roots.subscription = schema.subscription.clone();
            }
            Definition::TypeDefinition(type_definition) => {
                let type_def = convert_type_definition(type_definition)?;
                let name = type_def.name().to_string();
                if types.contains_key(&name) {
                    return Err(SchemaError::DuplicateType { name });
                }
                types.insert(name, type_def);
            }
            Definition::TypeExtension(extension) => extensions.push(extension),
            // Only @include and @skip are supported, custom directive
            // definitions carry no execution semantics here.
            Definition::DirectiveDefinition(directive) => {
                tracing::debug!(directive = %directive.name, "Ignoring directive definition");
            }
        }
    }

    for extension in extensions {
        apply_extension(&mut types, extension)?;
    }

    Ok((types.into_values().collect(), roots))
}

fn convert_type(ty: &Type<'_, String>) -> TypeRef {
    match ty {
        Type::NamedType(name) => TypeRef::named(name.clone()),
        Type::ListType(inner) => TypeRef::list(convert_type(inner)),
        Type::NonNullType(inner) => TypeRef::NonNull(Box::new(convert_type(inner))),
    }
}

fn convert_input_value(value: &InputValue<'_, String>) -> InputValueDef {
    InputValueDef {
        name: value.name.clone(),
        ty: convert_type(&value.value_type),
        default: value.default_value.as_ref().map(const_value_to_json),
    }
}

fn convert_field(field: &Field<'_, String>) -> FieldDef {
    FieldDef {
        name: field.name.clone(),
        ty: convert_type(&field.field_type),
        arguments: field.arguments.iter().map(convert_input_value).collect(),
    }
}

fn convert_type_definition(definition: &TypeDefinition<'_, String>) -> Result<TypeDef, SchemaError> {
    let type_def = match definition {
        TypeDefinition::Scalar(scalar) => TypeDef::scalar(scalar.name.clone()),
        TypeDefinition::Enum(e) => {
            TypeDef::enumeration(e.name.clone(), e.values.iter().map(|v| v.name.clone()))
        }
        TypeDefinition::Object(object) => {
            TypeDef::object(object.name.clone(), object.fields.iter().map(convert_field))
                .implementing(object.implements_interfaces.iter().cloned())
        }
        TypeDefinition::Interface(interface) => TypeDef::interface(
            interface.name.clone(),
            interface.fields.iter().map(convert_field),
        ),
        TypeDefinition::InputObject(input) => TypeDef::input_object(
            input.name.clone(),
            input.fields.iter().map(convert_input_value),
        ),
        TypeDefinition::Union(union) => {
            return Err(SchemaError::Sdl {
                message: format!("union type '{}' is not supported", union.name),
            });
        }
    };
    Ok(type_def)
}

fn extension_target<'a>(
    types: &'a mut IndexMap<String, TypeDef>,
    name: &str,
) -> Result<&'a mut TypeDef, SchemaError> {
    types.get_mut(name).ok_or_else(|| SchemaError::DanglingReference {
        referrer: format!("extend {}", name),
        name: name.to_string(),
    })
}

fn kind_mismatch(name: &str, expected: &str) -> SchemaError {
    SchemaError::Sdl {
        message: format!("cannot extend '{}' as {} type", name, expected),
    }
}

fn apply_extension(
    types: &mut IndexMap<String, TypeDef>,
    extension: &TypeExtension<'_, String>,
) -> Result<(), SchemaError> {
    match extension {
        TypeExtension::Object(ext) => match extension_target(types, &ext.name)? {
            TypeDef::Object(object) => {
                for field in &ext.fields {
                    object.fields.insert(field.name.clone(), convert_field(field));
                }
                object
                    .implements
                    .extend(ext.implements_interfaces.iter().cloned());
            }
            _ => return Err(kind_mismatch(&ext.name, "an object")),
        },
        TypeExtension::Interface(ext) => match extension_target(types, &ext.name)? {
            TypeDef::Interface(interface) => {
                for field in &ext.fields {
                    interface.fields.insert(field.name.clone(), convert_field(field));
                }
            }
            _ => return Err(kind_mismatch(&ext.name, "an interface")),
        },
        TypeExtension::Enum(ext) => match extension_target(types, &ext.name)? {
            TypeDef::Enum(e) => {
                e.values.extend(ext.values.iter().map(|v| v.name.clone()));
            }
            _ => return Err(kind_mismatch(&ext.name, "an enum")),
        },
        TypeExtension::InputObject(ext) => match extension_target(types, &ext.name)? {
            TypeDef::InputObject(input) => {
                for field in &ext.fields {
                    input.fields.insert(field.name.clone(), convert_input_value(field));
                }
            }
            _ => return Err(kind_mismatch(&ext.name, "an input")),
        },
        TypeExtension::Scalar(ext) => {
            extension_target(types, &ext.name)?;
        }
        TypeExtension::Union(ext) => {
            return Err(SchemaError::Sdl {
                message: format!("union type '{}' is not supported", ext.name),
            });
        }
    }
    Ok(())
}
