//! Operation document model
//!
//! A single executable operation: its kind, declared variables, root
//! selections and the named fragments they may spread. Documents are
//! built by [`OperationDocument::parse`] or programmatically with the
//! builder helpers on [`SelectionNode`].

use crate::schema::TypeRef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Kind of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        };
        write!(f, "{}", name)
    }
}

/// Literal or variable reference appearing in an argument position
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    List(Vec<InputValue>),
    Object(IndexMap<String, InputValue>),
    Variable(String),
}

impl InputValue {
    pub fn variable(name: impl Into<String>) -> Self {
        InputValue::Variable(name.into())
    }

    /// Substitute variables and convert to a JSON value
    ///
    /// Returns `None` only when the value is a bare variable that was not
    /// supplied. A missing variable nested inside a list or object becomes
    /// `null`.
    pub fn resolve(&self, variables: &Map<String, Value>) -> Option<Value> {
        match self {
            InputValue::Variable(name) => variables.get(name).cloned(),
            other => Some(other.resolve_nested(variables)),
        }
    }

    fn resolve_nested(&self, variables: &Map<String, Value>) -> Value {
        match self {
            InputValue::Null => Value::Null,
            InputValue::Int(i) => Value::Number((*i).into()),
            InputValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            InputValue::String(s) | InputValue::Enum(s) => Value::String(s.clone()),
            InputValue::Boolean(b) => Value::Bool(*b),
            InputValue::List(items) => {
                Value::Array(items.iter().map(|i| i.resolve_nested(variables)).collect())
            }
            InputValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.resolve_nested(variables)))
                    .collect(),
            ),
            InputValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// Names of every variable referenced by this value
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            InputValue::Variable(name) => names.push(name),
            InputValue::List(items) => items.iter().for_each(|i| i.collect_variables(names)),
            InputValue::Object(fields) => fields.values().for_each(|v| v.collect_variables(names)),
            _ => {}
        }
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::String(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::String(value)
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Int(value)
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Boolean(value)
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Float(value)
    }
}

/// Directive annotation on a selection (`@include` / `@skip`)
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: IndexMap<String, InputValue>,
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: IndexMap::new(),
        }
    }

    /// `@include(if: condition)`
    pub fn include(condition: InputValue) -> Self {
        Self::new("include").argument("if", condition)
    }

    /// `@skip(if: condition)`
    pub fn skip(condition: InputValue) -> Self {
        Self::new("skip").argument("if", condition)
    }

    pub fn argument(mut self, name: impl Into<String>, value: InputValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }
}

/// A requested field
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionNode {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: IndexMap<String, InputValue>,
    pub selections: Vec<Selection>,
    pub directives: Vec<Directive>,
}

impl SelectionNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: IndexMap::new(),
            selections: Vec::new(),
            directives: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    /// Append child fields
    pub fn select<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = SelectionNode>,
    {
        self.selections
            .extend(children.into_iter().map(Selection::Field));
        self
    }

    /// Append arbitrary child selections (fields, spreads, inline fragments)
    pub fn select_all<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Selection>,
    {
        self.selections.extend(children);
        self
    }

    /// Key under which this field appears in the result
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// `...Name`
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    pub name: String,
    pub directives: Vec<Directive>,
}

/// `... on Type { ... }` or `... @include(if: $x) { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selections: Vec<Selection>,
}

/// One entry of a selection set
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(SelectionNode),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

impl Selection {
    pub fn spread(name: impl Into<String>) -> Self {
        Selection::FragmentSpread(FragmentSpread {
            name: name.into(),
            directives: Vec::new(),
        })
    }

    pub fn inline<I>(type_condition: Option<&str>, selections: I) -> Self
    where
        I: IntoIterator<Item = Selection>,
    {
        Selection::InlineFragment(InlineFragment {
            type_condition: type_condition.map(str::to_string),
            directives: Vec::new(),
            selections: selections.into_iter().collect(),
        })
    }

    pub fn directives(&self) -> &[Directive] {
        match self {
            Selection::Field(field) => &field.directives,
            Selection::FragmentSpread(spread) => &spread.directives,
            Selection::InlineFragment(inline) => &inline.directives,
        }
    }
}

impl From<SelectionNode> for Selection {
    fn from(node: SelectionNode) -> Self {
        Selection::Field(node)
    }
}

/// `fragment Name on Type { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub selections: Vec<Selection>,
}

/// Declared operation variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Value>,
}

/// A single executable operation with its fragments
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDocument {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: IndexMap<String, VariableDefinition>,
    pub selections: Vec<Selection>,
    pub fragments: IndexMap<String, FragmentDefinition>,
}

impl OperationDocument {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            name: None,
            variables: IndexMap::new(),
            selections: Vec::new(),
            fragments: IndexMap::new(),
        }
    }

    pub fn query() -> Self {
        Self::new(OperationKind::Query)
    }

    pub fn mutation() -> Self {
        Self::new(OperationKind::Mutation)
    }

    pub fn subscription() -> Self {
        Self::new(OperationKind::Subscription)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn variable(mut self, name: impl Into<String>, ty: TypeRef, default: Option<Value>) -> Self {
        let name = name.into();
        self.variables.insert(
            name.clone(),
            VariableDefinition { name, ty, default },
        );
        self
    }

    /// Append root fields
    pub fn select<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = SelectionNode>,
    {
        self.selections.extend(fields.into_iter().map(Selection::Field));
        self
    }

    /// Append arbitrary root selections
    pub fn select_all<I>(mut self, selections: I) -> Self
    where
        I: IntoIterator<Item = Selection>,
    {
        self.selections.extend(selections);
        self
    }

    pub fn fragment(mut self, fragment: FragmentDefinition) -> Self {
        self.fragments.insert(fragment.name.clone(), fragment);
        self
    }
}
