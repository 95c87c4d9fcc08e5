//! Input and output value coercion
//!
//! Input coercion checks argument and variable values against their
//! declared [`TypeRef`]; output coercion turns resolver results for leaf
//! fields into values of the declared scalar or enum.

use super::document::InputValue;
use crate::schema::{SchemaRegistry, TypeDef, TypeRef};
use graphql_parser::query as q;
use serde_json::{Map, Number, Value};

/// Convert a constant parsed literal (defaults) into JSON
///
/// Variables cannot appear in constant positions and convert to `null`.
pub fn const_value_to_json(value: &q::Value<'_, String>) -> Value {
    match value {
        q::Value::Null | q::Value::Variable(_) => Value::Null,
        q::Value::Int(i) => i.as_i64().map(Value::from).unwrap_or(Value::Null),
        q::Value::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        q::Value::String(s) => Value::String(s.clone()),
        q::Value::Boolean(b) => Value::Bool(*b),
        q::Value::Enum(e) => Value::String(e.clone()),
        q::Value::List(items) => Value::Array(items.iter().map(const_value_to_json).collect()),
        q::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), const_value_to_json(v)))
                .collect(),
        ),
    }
}

/// Short human description of a JSON value for error messages
fn describe(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 64 {
        format!("{}...", text.chars().take(61).collect::<String>())
    } else {
        text
    }
}

/// Check that a literal's kind fits its position
///
/// Enum positions take enum literals only, and built-in scalars reject enum
/// literals. Variables carry no literal kind and are skipped.
pub fn check_literal_kind(
    schema: &SchemaRegistry,
    ty: &TypeRef,
    literal: &InputValue,
) -> Result<(), String> {
    match (ty, literal) {
        (_, InputValue::Variable(_) | InputValue::Null) => Ok(()),
        (TypeRef::NonNull(inner), _) => check_literal_kind(schema, inner, literal),
        (TypeRef::List(item), InputValue::List(items)) => items
            .iter()
            .try_for_each(|i| check_literal_kind(schema, item, i)),
        (TypeRef::List(item), single) => check_literal_kind(schema, item, single),
        (TypeRef::Named(name), _) => match (schema.get_type(name), literal) {
            (Some(TypeDef::Enum(e)), InputValue::String(s)) => Err(format!(
                "enum '{}' expects an enum value, found string \"{}\"",
                e.name, s
            )),
            (Some(TypeDef::Scalar(scalar)), InputValue::Enum(value))
                if matches!(scalar.name.as_str(), "Int" | "Float" | "String" | "Boolean" | "ID") =>
            {
                Err(format!("{} cannot represent enum value {}", scalar.name, value))
            }
            (Some(TypeDef::InputObject(input)), InputValue::Object(fields)) => {
                fields.iter().try_for_each(|(field, value)| match input.fields.get(field) {
                    Some(def) => check_literal_kind(schema, &def.ty, value)
                        .map_err(|e| format!("in field '{}.{}': {}", input.name, field, e)),
                    None => Ok(()),
                })
            }
            _ => Ok(()),
        },
    }
}

/// Coerce an input value (argument, variable or input object field)
///
/// Follows GraphQL input coercion: a single value is accepted where a list
/// is expected, `ID` accepts integers, `Float` accepts integers.
pub fn coerce_input(schema: &SchemaRegistry, ty: &TypeRef, value: &Value) -> Result<Value, String> {
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(format!("expected non-null value of type '{}'", ty));
            }
            coerce_input(schema, inner, value)
        }
        _ if value.is_null() => Ok(Value::Null),
        TypeRef::List(item) => match value {
            Value::Array(items) => items
                .iter()
                .map(|v| coerce_input(schema, item, v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_input(schema, item, single)?])),
        },
        TypeRef::Named(name) => {
            let type_def = schema
                .get_type(name)
                .ok_or_else(|| format!("unknown type '{}'", name))?;
            coerce_input_named(schema, type_def, value)
        }
    }
}

fn coerce_input_named(
    schema: &SchemaRegistry,
    type_def: &TypeDef,
    value: &Value,
) -> Result<Value, String> {
    match type_def {
        TypeDef::Scalar(scalar) => match (scalar.name.as_str(), value) {
            ("Int", Value::Number(n)) => n
                .as_i64()
                .filter(|i| i32::try_from(*i).is_ok())
                .map(Value::from)
                .ok_or_else(|| format!("Int cannot represent {}", n)),
            ("Float", Value::Number(n)) => Ok(Value::Number(n.clone())),
            ("String", Value::String(_)) => Ok(value.clone()),
            ("Boolean", Value::Bool(_)) => Ok(value.clone()),
            ("ID", Value::String(_)) => Ok(value.clone()),
            ("ID", Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Ok(Value::String(n.to_string()))
            }
            ("Int" | "Float" | "String" | "Boolean" | "ID", other) => Err(format!(
                "{} cannot represent {}",
                scalar.name,
                describe(other)
            )),
            // Custom scalars accept any value
            _ => Ok(value.clone()),
        },
        TypeDef::Enum(e) => match value {
            Value::String(s) if e.values.contains(s) => Ok(value.clone()),
            other => Err(format!(
                "value {} is not a member of enum '{}'",
                describe(other),
                e.name
            )),
        },
        TypeDef::InputObject(input) => {
            let Value::Object(fields) = value else {
                return Err(format!(
                    "expected an object for input type '{}', got {}",
                    input.name,
                    describe(value)
                ));
            };
            if let Some(unknown) = fields.keys().find(|k| !input.fields.contains_key(*k)) {
                return Err(format!(
                    "field '{}' is not defined by input type '{}'",
                    unknown, input.name
                ));
            }
            let mut coerced = Map::new();
            for (name, def) in &input.fields {
                match fields.get(name).or(def.default.as_ref()) {
                    Some(v) => {
                        let v = coerce_input(schema, &def.ty, v)
                            .map_err(|e| format!("in field '{}.{}': {}", input.name, name, e))?;
                        coerced.insert(name.clone(), v);
                    }
                    None if def.ty.is_non_null() => {
                        return Err(format!(
                            "field '{}.{}' of required type '{}' was not provided",
                            input.name, name, def.ty
                        ));
                    }
                    None => {}
                }
            }
            Ok(Value::Object(coerced))
        }
        TypeDef::Object(_) | TypeDef::Interface(_) => Err(format!(
            "'{}' is an output type and cannot be used as input",
            type_def.name()
        )),
    }
}

/// Coerce a resolved value for a leaf field
///
/// `value` is never null here; nullability is handled by the executor.
pub fn coerce_output_leaf(type_def: &TypeDef, value: &Value) -> Result<Value, String> {
    match type_def {
        TypeDef::Scalar(scalar) => match scalar.name.as_str() {
            "Int" => coerce_output_int(value),
            "Float" => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("Float cannot represent non numeric value: {}", describe(value))),
                other => Err(format!("Float cannot represent non numeric value: {}", describe(other))),
            },
            "String" => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(format!("String cannot represent value: {}", describe(other))),
            },
            "Boolean" => match value {
                Value::Bool(_) => Ok(value.clone()),
                other => Err(format!("Boolean cannot represent a non boolean value: {}", describe(other))),
            },
            "ID" => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
                other => Err(format!("ID cannot represent value: {}", describe(other))),
            },
            _ => Ok(value.clone()),
        },
        TypeDef::Enum(e) => match value {
            Value::String(s) if e.values.contains(s) => Ok(value.clone()),
            other => Err(format!(
                "Enum '{}' cannot represent value: {}",
                e.name,
                describe(other)
            )),
        },
        _ => Err(format!("'{}' is not a leaf type", type_def.name())),
    }
}

fn coerce_output_int(value: &Value) -> Result<Value, String> {
    let as_int = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= i32::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    };
    match as_int {
        Some(i) if i32::try_from(i).is_ok() => Ok(Value::from(i)),
        Some(i) => Err(format!("Int cannot represent non 32-bit signed integer value: {}", i)),
        None => Err(format!("Int cannot represent non-integer value: {}", describe(value))),
    }
}
