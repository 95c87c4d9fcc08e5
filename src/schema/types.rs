//! Type definitions held by the schema registry

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Names of the scalars every schema provides
pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Reference to a named type wrapped in list / non-null modifiers
///
/// `NonNull(NonNull(T))` is representable but rejected when the schema is
/// built (and by [`TypeRef::non_null`], which is idempotent).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    /// Wrap in a non-null modifier, leaving an already non-null type as is
    pub fn non_null(inner: TypeRef) -> Self {
        match inner {
            TypeRef::NonNull(_) => inner,
            other => TypeRef::NonNull(Box::new(other)),
        }
    }

    /// Shorthand for `NonNull(Named(name))`
    pub fn required(name: impl Into<String>) -> Self {
        TypeRef::non_null(TypeRef::named(name))
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    /// The type with its outermost non-null modifier removed
    pub fn nullable(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => inner,
            other => other,
        }
    }

    /// Name of the innermost named type
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }

    /// True when no non-null modifier directly wraps another non-null
    pub fn is_well_formed(&self) -> bool {
        match self {
            TypeRef::Named(_) => true,
            TypeRef::List(inner) => inner.is_well_formed(),
            TypeRef::NonNull(inner) => !inner.is_non_null() && inner.is_well_formed(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

impl FromStr for TypeRef {
    type Err = String;

    /// Parse the SDL notation, e.g. `[Post!]!`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_suffix('!') {
            let inner: TypeRef = inner.parse()?;
            if inner.is_non_null() {
                return Err(format!("'{}' wraps a non-null type in non-null", s));
            }
            return Ok(TypeRef::NonNull(Box::new(inner)));
        }
        if let Some(inner) = s.strip_prefix('[') {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| format!("unbalanced list brackets in '{}'", s))?;
            return Ok(TypeRef::list(inner.parse()?));
        }
        if s.is_empty() || s.contains(['[', ']', '!', ' ']) {
            return Err(format!("invalid type reference '{}'", s));
        }
        Ok(TypeRef::named(s))
    }
}

/// Definition of an argument or input object field
#[derive(Debug, Clone, PartialEq)]
pub struct InputValueDef {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Value>,
}

impl InputValueDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Must the caller supply a value?
    pub fn is_required(&self) -> bool {
        self.ty.is_non_null() && self.default.is_none()
    }
}

/// Definition of an output field on an object or interface
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub arguments: Vec<InputValueDef>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            arguments: Vec::new(),
        }
    }

    pub fn argument(mut self, argument: InputValueDef) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn find_argument(&self, name: &str) -> Option<&InputValueDef> {
        self.arguments.iter().find(|arg| arg.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarType {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub values: IndexSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub name: String,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: IndexSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceType {
    pub name: String,
    pub fields: IndexMap<String, FieldDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputObjectType {
    pub name: String,
    pub fields: IndexMap<String, InputValueDef>,
}

/// A named type definition
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDef {
    Scalar(ScalarType),
    Enum(EnumType),
    Object(ObjectType),
    Interface(InterfaceType),
    InputObject(InputObjectType),
}

impl TypeDef {
    pub fn scalar(name: impl Into<String>) -> Self {
        TypeDef::Scalar(ScalarType { name: name.into() })
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeDef::Enum(EnumType {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn object<I>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = FieldDef>,
    {
        TypeDef::Object(ObjectType {
            name: name.into(),
            fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
            implements: IndexSet::new(),
        })
    }

    pub fn interface<I>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = FieldDef>,
    {
        TypeDef::Interface(InterfaceType {
            name: name.into(),
            fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
        })
    }

    pub fn input_object<I>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = InputValueDef>,
    {
        TypeDef::InputObject(InputObjectType {
            name: name.into(),
            fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
        })
    }

    /// Declare interfaces on an object type; no-op for other kinds
    pub fn implementing<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let TypeDef::Object(object) = &mut self {
            object.implements.extend(interfaces.into_iter().map(Into::into));
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            TypeDef::Scalar(t) => &t.name,
            TypeDef::Enum(t) => &t.name,
            TypeDef::Object(t) => &t.name,
            TypeDef::Interface(t) => &t.name,
            TypeDef::InputObject(t) => &t.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TypeDef::Scalar(_) => "scalar",
            TypeDef::Enum(_) => "enum",
            TypeDef::Object(_) => "object",
            TypeDef::Interface(_) => "interface",
            TypeDef::InputObject(_) => "input object",
        }
    }

    /// Output fields of an object or interface
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            TypeDef::Object(t) => Some(&t.fields),
            TypeDef::Interface(t) => Some(&t.fields),
            _ => None,
        }
    }

    /// Scalars and enums
    pub fn is_leaf(&self) -> bool {
        matches!(self, TypeDef::Scalar(_) | TypeDef::Enum(_))
    }

    /// Objects and interfaces
    pub fn is_composite(&self) -> bool {
        matches!(self, TypeDef::Object(_) | TypeDef::Interface(_))
    }

    pub fn is_input(&self) -> bool {
        matches!(
            self,
            TypeDef::Scalar(_) | TypeDef::Enum(_) | TypeDef::InputObject(_)
        )
    }

    pub fn is_output(&self) -> bool {
        !matches!(self, TypeDef::InputObject(_))
    }
}
