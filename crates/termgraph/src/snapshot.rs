//! Snapshots of a unit for debugging and inspection.
//!
//! A snapshot is a versioned, serializable dump of the unit's own terms. It
//! is not a persistence format: function behaviors and host values are
//! recorded by name only.

use serde::{Deserialize, Serialize};

use crate::code_unit::CodeUnit;
use crate::ids::{TermId, UnitId};
use crate::value::Value;

/// A serializable snapshot of a code unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Version for migration support
    pub version: u32,
    pub unit: UnitId,
    pub terms: Vec<TermSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermSnapshot {
    pub id: TermId,
    pub name: Option<String>,
    pub function: TermId,
    /// Name of the bound function, when it resolves
    pub function_name: Option<String>,
    pub inputs: Vec<TermId>,
    pub ty: Option<TermId>,
    pub value: Option<SerializedValue>,
    pub state: Option<SerializedValue>,
    pub dirty: bool,
}

/// A serializable representation of a Value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SerializedValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Type(String),
    Function(String),
    List(Vec<SerializedValue>),
    Host(String),
}

impl From<&Value> for SerializedValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SerializedValue::Null,
            Value::Int(v) => SerializedValue::Int(*v),
            Value::Float(v) => SerializedValue::Float(v.into_inner()),
            Value::Text(v) => SerializedValue::Text(v.to_string()),
            Value::Bool(v) => SerializedValue::Bool(*v),
            Value::Type(def) => SerializedValue::Type(def.name.to_string()),
            Value::Function(function) => SerializedValue::Function(function.name.clone()),
            Value::Composite(items) => {
                SerializedValue::List(items.iter().map(SerializedValue::from).collect())
            }
            Value::Host(host) => SerializedValue::Host(host.type_name().to_string()),
        }
    }
}

impl UnitSnapshot {
    /// Current snapshot version.
    pub const VERSION: u32 = 1;

    pub fn capture(unit: &CodeUnit) -> Self {
        let terms = unit
            .all_terms()
            .map(|term| TermSnapshot {
                id: term.id,
                name: term.name.clone(),
                function: term.function,
                function_name: unit
                    .function_value(term.function)
                    .ok()
                    .map(|function| function.name.clone()),
                inputs: term.inputs.to_vec(),
                ty: term.ty,
                value: term.value.as_ref().map(SerializedValue::from),
                state: term.state.as_ref().map(SerializedValue::from),
                dirty: term.is_dirty(),
            })
            .collect();
        Self {
            version: Self::VERSION,
            unit: unit.id(),
            terms,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn term(&self, id: TermId) -> Option<&TermSnapshot> {
        self.terms.iter().find(|term| term.id == id)
    }

    /// One line per term: `#7 sum = add(#5, #6) -> Int(7)`
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for term in &self.terms {
            let mut line = term.id.to_string();
            if let Some(name) = &term.name {
                line.push(' ');
                line.push_str(name);
            }
            let function = term
                .function_name
                .clone()
                .unwrap_or_else(|| term.function.to_string());
            let inputs: Vec<String> = term.inputs.iter().map(ToString::to_string).collect();
            line.push_str(&format!(" = {function}({})", inputs.join(", ")));
            if let Some(value) = &term.value {
                line.push_str(&format!(" -> {value:?}"));
            }
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}
