//! The view a function behavior gets of the term it is computing.

use anyhow::anyhow;

use crate::code_unit::CodeUnit;
use crate::diagnostics::ChangeCause;
use crate::error::{Result, StructuralError};
use crate::ids::TermId;
use crate::value::Value;

static NULL: Value = Value::Null;

/// Handed to `evaluate`, `init` and `feedback` behaviors.
///
/// Reads go through the unit so that inputs owned by the kernel resolve.
/// Writes are limited to the term's own value and state, except for
/// [`feedback_input`](Self::feedback_input), which is how feedback travels
/// upstream one hop at a time.
pub struct TermContext<'u> {
    unit: &'u mut CodeUnit,
    term: TermId,
    cause: ChangeCause,
}

impl<'u> TermContext<'u> {
    pub(crate) fn new(unit: &'u mut CodeUnit, term: TermId, cause: ChangeCause) -> Self {
        Self { unit, term, cause }
    }

    pub fn term(&self) -> TermId {
        self.term
    }

    pub fn unit(&self) -> &CodeUnit {
        &*self.unit
    }

    pub fn input_count(&self) -> usize {
        self.unit
            .term(self.term)
            .map(|term| term.inputs.len())
            .unwrap_or(0)
    }

    pub fn input_id(&self, index: usize) -> anyhow::Result<TermId> {
        let term = self.unit.term(self.term)?;
        term.inputs
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("{} has no input {index}", self.term))
    }

    /// Current value of input `index`; `Null` when it produced nothing.
    pub fn input(&self, index: usize) -> anyhow::Result<&Value> {
        let id = self.input_id(index)?;
        Ok(self.unit.term(id)?.value.as_ref().unwrap_or(&NULL))
    }

    /// Value of input `index` after bringing it up to date. Feedback
    /// handlers use this to solve against current upstream values.
    pub fn evaluated_input(&mut self, index: usize) -> Result<Value> {
        let id = self
            .unit
            .term(self.term)?
            .inputs
            .get(index)
            .copied()
            .ok_or(StructuralError::InputIndex {
                term: self.term,
                index,
            })?;
        crate::eval::evaluate(self.unit, id)
    }

    /// Declared type of input `index`
    pub fn input_type(&self, index: usize) -> anyhow::Result<Option<TermId>> {
        let id = self.input_id(index)?;
        Ok(self.unit.term(id)?.ty)
    }

    pub fn input_values(&self) -> anyhow::Result<Vec<Value>> {
        (0..self.input_count())
            .map(|index| self.input(index).cloned())
            .collect()
    }

    pub fn state(&self) -> Option<&Value> {
        self.unit.term(self.term).ok()?.state.as_ref()
    }

    pub fn set_state(&mut self, state: Value) -> Result<()> {
        self.unit.term_mut(self.term)?.state = Some(state);
        Ok(())
    }

    pub fn output(&self) -> Option<&Value> {
        self.unit.term(self.term).ok()?.value.as_ref()
    }

    /// Writes the term's value without invalidating users.
    pub fn set_output(&mut self, value: Value) -> Result<()> {
        let cause = self.cause;
        let term = self.unit.term_mut(self.term)?;
        let old = term.value.replace(value);
        let new = term.value.clone();
        self.unit
            .changes
            .record(self.term, cause, old.as_ref(), new.as_ref());
        Ok(())
    }

    /// Writes the term's value and marks every downstream term dirty.
    pub fn assign_output(&mut self, value: Value) -> Result<()> {
        self.unit.assign(self.term, value, self.cause)
    }

    /// Pushes `desired` into input `index` through that input's own feedback.
    pub fn feedback_input(&mut self, index: usize, desired: Value) -> Result<()> {
        let id = {
            let term = self.unit.term(self.term)?;
            term.inputs
                .get(index)
                .copied()
                .ok_or(StructuralError::InputIndex {
                    term: self.term,
                    index,
                })?
        };
        crate::feedback::feedback(self.unit, id, desired)
    }
}
