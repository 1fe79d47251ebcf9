//! Foreign-value bridge: host values and types in and out of the graph.
//!
//! The [`TypeTable`] maps host types to graph Type terms one-to-one. It is
//! written while the kernel is built and read-only afterwards. The adapters
//! at the bottom turn plain Rust closures into function behaviors by
//! unwrapping inputs positionally and wrapping the result.

use anyhow::anyhow;
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;

use crate::context::TermContext;
use crate::error::{KernelError, Result};
use crate::function::HostBehavior;
use crate::ids::TermId;
use crate::value::Value;

/// Host-side type identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostType {
    Int,
    Float,
    Text,
    Bool,
    Type,
    Function,
    List,
    Opaque(TypeId, &'static str),
}

impl HostType {
    pub fn of<T: HostValue>() -> Self {
        T::host_type()
    }

    pub fn opaque<T: Any>() -> Self {
        HostType::Opaque(TypeId::of::<T>(), std::any::type_name::<T>())
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Int => write!(f, "i64"),
            HostType::Float => write!(f, "f64"),
            HostType::Text => write!(f, "String"),
            HostType::Bool => write!(f, "bool"),
            HostType::Type => write!(f, "TypeDef"),
            HostType::Function => write!(f, "Function"),
            HostType::List => write!(f, "Vec"),
            HostType::Opaque(_, name) => write!(f, "{name}"),
        }
    }
}

/// A host value with a graph representation.
pub trait HostValue: Sized {
    fn host_type() -> HostType;
    fn into_value(self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

impl HostValue for i64 {
    fn host_type() -> HostType {
        HostType::Int
    }
    fn into_value(self) -> Value {
        Value::Int(self)
    }
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl HostValue for f64 {
    fn host_type() -> HostType {
        HostType::Float
    }
    fn into_value(self) -> Value {
        Value::float(self)
    }
    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl HostValue for bool {
    fn host_type() -> HostType {
        HostType::Bool
    }
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl HostValue for String {
    fn host_type() -> HostType {
        HostType::Text
    }
    fn into_value(self) -> Value {
        Value::text(self)
    }
    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(str::to_string)
    }
}

impl<T: HostValue> HostValue for Vec<T> {
    fn host_type() -> HostType {
        HostType::List
    }
    fn into_value(self) -> Value {
        Value::list(self.into_iter().map(HostValue::into_value))
    }
    fn from_value(value: &Value) -> Option<Self> {
        value.as_list()?.iter().map(T::from_value).collect()
    }
}

/// Host type <-> graph type mapping
#[derive(Debug, Default)]
pub struct TypeTable {
    to_graph: FxHashMap<HostType, TermId>,
    to_host: FxHashMap<TermId, HostType>,
    frozen: bool,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a one-to-one mapping. Either side already mapped is an error.
    pub fn register_type(&mut self, host: HostType, graph: TermId) -> Result<()> {
        if self.frozen {
            return Err(KernelError::TableFrozen);
        }
        if self.to_graph.contains_key(&host) {
            return Err(KernelError::DuplicateMapping(host.to_string()));
        }
        if self.to_host.contains_key(&graph) {
            return Err(KernelError::DuplicateMapping(graph.to_string()));
        }
        self.to_graph.insert(host, graph);
        self.to_host.insert(graph, host);
        log::debug!("mapped host type {host} to {graph}");
        Ok(())
    }

    pub fn graph_type(&self, host: &HostType) -> Result<TermId> {
        self.to_graph
            .get(host)
            .copied()
            .ok_or(KernelError::UnmappedType(*host))
    }

    pub fn host_type(&self, graph: TermId) -> Option<HostType> {
        self.to_host.get(&graph).copied()
    }

    pub fn len(&self) -> usize {
        self.to_graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_graph.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// Reads a graph value back into a host value.
pub fn unwrap<T: HostValue>(value: &Value) -> Option<T> {
    T::from_value(value)
}

fn input<T: HostValue>(ctx: &TermContext<'_>, index: usize) -> anyhow::Result<T> {
    let value = ctx.input(index)?;
    T::from_value(value).ok_or_else(|| {
        anyhow!(
            "input {index} is {}, expected {}",
            value.kind_name(),
            T::host_type()
        )
    })
}

pub fn host_fn1<A, R>(f: impl Fn(A) -> R + Send + Sync + 'static) -> HostBehavior
where
    A: HostValue,
    R: HostValue,
{
    HostBehavior::new(move |ctx| {
        let a = input::<A>(ctx, 0)?;
        ctx.set_output(f(a).into_value())?;
        Ok(())
    })
}

pub fn host_fn2<A, B, R>(f: impl Fn(A, B) -> R + Send + Sync + 'static) -> HostBehavior
where
    A: HostValue,
    B: HostValue,
    R: HostValue,
{
    try_host_fn2(move |a, b| Ok(f(a, b)))
}

/// Like [`host_fn2`] for callables that can fail.
pub fn try_host_fn2<A, B, R>(
    f: impl Fn(A, B) -> anyhow::Result<R> + Send + Sync + 'static,
) -> HostBehavior
where
    A: HostValue,
    B: HostValue,
    R: HostValue,
{
    HostBehavior::new(move |ctx| {
        let a = input::<A>(ctx, 0)?;
        let b = input::<B>(ctx, 1)?;
        ctx.set_output(f(a, b)?.into_value())?;
        Ok(())
    })
}

/// Adapter over raw values, for callables that take any kind.
pub fn host_fn_values(
    f: impl Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
) -> HostBehavior {
    HostBehavior::new(move |ctx| {
        let inputs = ctx.input_values()?;
        ctx.set_output(f(&inputs)?)?;
        Ok(())
    })
}
