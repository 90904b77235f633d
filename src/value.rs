//! Arena-based object graph and the runtime value model.
//!
//! Validated data lives in an [`ObjectGraph`]: an arena of bean instances
//! addressed by [`BeanId`]. References between beans are ids rather than
//! owning pointers, so arbitrary cyclic graphs are expressible and bean
//! identity is a plain arena key. [`Value`] is the runtime value vocabulary;
//! [`ValueType`] is the *static* type vocabulary used by declarations and
//! validator resolution.

use indexmap::IndexMap;
use std::fmt::{self, Display};

/// Identity of a bean instance within an [`ObjectGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeanId(usize);

/// The container shapes the engine can traverse into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// An indexed sequence of values.
    List,
    /// A string-keyed map of values.
    Map,
    /// An optional value.
    Optional,
}

impl Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::List => write!(f, "List"),
            ContainerKind::Map => write!(f, "Map"),
            ContainerKind::Optional => write!(f, "Optional"),
        }
    }
}

/// A runtime value subject to validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Optional(Option<Box<Value>>),
    Bean(BeanId),
}

impl Value {
    /// A shared null, handy where a `&Value` is needed for an absent field.
    pub(crate) const NULL: Value = Value::Null;

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the bean id if this value references a bean.
    pub fn as_bean(&self) -> Option<BeanId> {
        match self {
            Value::Bean(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the string slice if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the container kind of this value, if it is a container.
    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self {
            Value::List(_) => Some(ContainerKind::List),
            Value::Map(_) => Some(ContainerKind::Map),
            Value::Optional(_) => Some(ContainerKind::Optional),
            _ => None,
        }
    }

    /// A short description of the value used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Str(s) => format!("{:?}", s),
            Value::List(items) => format!("list of {} element(s)", items.len()),
            Value::Map(entries) => format!("map of {} entry(ies)", entries.len()),
            Value::Optional(None) => "empty optional".into(),
            Value::Optional(Some(inner)) => format!("optional {}", inner.describe()),
            Value::Bean(id) => format!("bean #{}", id.0),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<BeanId> for Value {
    fn from(id: BeanId) -> Self {
        Value::Bean(id)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        Value::Optional(opt.map(|v| Box::new(v.into())))
    }
}

/// A bean instance held in an [`ObjectGraph`].
#[derive(Debug, Clone)]
pub struct BeanInstance {
    type_name: String,
    fields: IndexMap<String, Value>,
}

impl BeanInstance {
    /// The declared type of this instance.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Reads a field value; absent fields read as null.
    pub fn field(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&Value::NULL)
    }

    /// Iterates the populated fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// An arena of bean instances forming the graph under validation.
///
/// Beans reference each other through [`Value::Bean`] ids, so cyclic graphs
/// (`a.partner == b`, `b.partner == a`) are built with plain `set_field`
/// calls in any order.
///
/// # Example
///
/// ```rust
/// use verdict::{ObjectGraph, Value};
///
/// let mut graph = ObjectGraph::new();
/// let user = graph.add_bean("User");
/// graph.set_field(user, "name", Value::from("Ada"));
/// graph.set_field(user, "age", Value::from(36i64));
///
/// assert_eq!(graph.bean(user).field("name"), &Value::from("Ada"));
/// assert!(graph.bean(user).field("missing").is_null());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    beans: Vec<BeanInstance>,
}

impl ObjectGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bean of the given declared type and returns its id.
    pub fn add_bean(&mut self, type_name: impl Into<String>) -> BeanId {
        let id = BeanId(self.beans.len());
        self.beans.push(BeanInstance {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        });
        id
    }

    /// Sets a field on a bean, replacing any prior value.
    pub fn set_field(&mut self, bean: BeanId, name: impl Into<String>, value: impl Into<Value>) {
        self.beans[bean.0].fields.insert(name.into(), value.into());
    }

    /// Returns the bean instance for the given id.
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this graph.
    pub fn bean(&self, id: BeanId) -> &BeanInstance {
        &self.beans[id.0]
    }

    /// Number of beans in the graph.
    pub fn len(&self) -> usize {
        self.beans.len()
    }

    /// Returns true if the graph holds no beans.
    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }
}

/// Static type of a declared element, used for validator resolution.
///
/// `ValueType` forms a small lattice: `Int` and `Float` are subtypes of
/// `Number`; every bean type is a subtype of its declared parents and of
/// `AnyBean`; everything is a subtype of `Any`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Any,
    Bool,
    Int,
    Float,
    Number,
    Str,
    List,
    Map,
    Optional,
    AnyBean,
    Bean(String),
}

impl ValueType {
    /// Creates a bean type reference.
    pub fn bean(name: impl Into<String>) -> Self {
        ValueType::Bean(name.into())
    }

    /// The direct supertypes of this type, bean parents excluded (those come
    /// from declared metadata).
    pub(crate) fn direct_supertypes(&self) -> Vec<ValueType> {
        match self {
            ValueType::Any => vec![],
            ValueType::Int | ValueType::Float => vec![ValueType::Number],
            ValueType::Number
            | ValueType::Bool
            | ValueType::Str
            | ValueType::List
            | ValueType::Map
            | ValueType::Optional
            | ValueType::AnyBean => vec![ValueType::Any],
            ValueType::Bean(_) => vec![ValueType::AnyBean],
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "Any"),
            ValueType::Bool => write!(f, "Bool"),
            ValueType::Int => write!(f, "Int"),
            ValueType::Float => write!(f, "Float"),
            ValueType::Number => write!(f, "Number"),
            ValueType::Str => write!(f, "Str"),
            ValueType::List => write!(f, "List"),
            ValueType::Map => write!(f, "Map"),
            ValueType::Optional => write!(f, "Optional"),
            ValueType::AnyBean => write!(f, "AnyBean"),
            ValueType::Bean(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_builds_cycles() {
        let mut graph = ObjectGraph::new();
        let a = graph.add_bean("A");
        let b = graph.add_bean("B");
        graph.set_field(a, "b", b);
        graph.set_field(b, "a", a);

        assert_eq!(graph.bean(a).field("b").as_bean(), Some(b));
        assert_eq!(graph.bean(b).field("a").as_bean(), Some(a));
    }

    #[test]
    fn test_absent_field_reads_null() {
        let mut graph = ObjectGraph::new();
        let a = graph.add_bean("A");
        assert!(graph.bean(a).field("nope").is_null());
    }

    #[test]
    fn test_optional_conversion() {
        let some: Value = Some(3i64).into();
        assert_eq!(some, Value::Optional(Some(Box::new(Value::Int(3)))));

        let none: Value = Option::<i64>::None.into();
        assert_eq!(none, Value::Optional(None));
    }

    #[test]
    fn test_container_kind() {
        assert_eq!(
            Value::List(vec![]).container_kind(),
            Some(ContainerKind::List)
        );
        assert_eq!(
            Value::Map(IndexMap::new()).container_kind(),
            Some(ContainerKind::Map)
        );
        assert_eq!(
            Value::Optional(None).container_kind(),
            Some(ContainerKind::Optional)
        );
        assert_eq!(Value::Int(1).container_kind(), None);
    }

    #[test]
    fn test_numeric_supertypes() {
        assert_eq!(ValueType::Int.direct_supertypes(), vec![ValueType::Number]);
        assert_eq!(
            ValueType::Number.direct_supertypes(),
            vec![ValueType::Any]
        );
        assert!(ValueType::Any.direct_supertypes().is_empty());
    }
}
