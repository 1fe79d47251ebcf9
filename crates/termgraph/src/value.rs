//! Term output values.
//!
//! A closed set of kinds. Aggregates and behaviors are Arc-wrapped so that
//! cloning a value out of the arena is O(1).

use ordered_float::OrderedFloat;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::function::Function;

/// Payload of a Type term. The term holding it is the type's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDef {
    pub name: Arc<str>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().into(),
        }
    }
}

/// Host value with no graph representation, carried by identity.
#[derive(Clone)]
pub struct HostOpaque {
    type_id: TypeId,
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl HostOpaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for HostOpaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostOpaque")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for HostOpaque {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    /// No output
    Null,
    Int(i64),
    Float(OrderedFloat<f64>),
    Text(Arc<str>),
    Bool(bool),
    Type(Arc<TypeDef>),
    /// Plain functions and subroutines alike
    Function(Arc<Function>),
    Composite(Arc<Vec<Value>>),
    Host(HostOpaque),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value::Int(v)
    }

    pub fn float(v: f64) -> Self {
        Value::Float(OrderedFloat(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Value::Text(v.into().into())
    }

    pub fn bool(v: bool) -> Self {
        Value::Bool(v)
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Composite(Arc::new(items.into_iter().collect()))
    }

    pub fn type_def(name: impl Into<String>) -> Self {
        Value::Type(Arc::new(TypeDef::new(name)))
    }

    pub fn function(function: Function) -> Self {
        Value::Function(Arc::new(function))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(v.into_inner()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeDef> {
        match self {
            Value::Type(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<Function>> {
        match self {
            Value::Function(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::Composite(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bool(_) => "bool",
            Value::Type(_) => "Type",
            Value::Function(_) => "Function",
            Value::Composite(_) => "List",
            Value::Host(_) => "host",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Composite(a), Value::Composite(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{}", v.into_inner()),
            Value::Text(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Type(t) => write!(f, "<Type {}>", t.name),
            Value::Function(func) => write!(f, "<Function {}>", func.name),
            Value::Composite(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Host(host) => write!(f, "<host {}>", host.type_name()),
        }
    }
}
