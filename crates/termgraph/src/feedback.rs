//! Feedback engine: pushes a desired value backwards into a term.
//!
//! Feedback never chains on its own. A behavior that wants to reach further
//! upstream calls [`TermContext::feedback_input`] itself.

use crate::code_unit::CodeUnit;
use crate::context::TermContext;
use crate::diagnostics::ChangeCause;
use crate::error::{KernelError, Result, StructuralError};
use crate::function::FunctionKind;
use crate::ids::TermId;
use crate::value::Value;

pub fn feedback(unit: &mut CodeUnit, id: TermId, desired: Value) -> Result<()> {
    let function = unit.function_of(id)?;
    if !function.has_feedback() {
        return Err(KernelError::NoFeedbackSupport {
            term: id,
            function: function.name.clone(),
        });
    }
    if !unit.owns(id) {
        return Err(StructuralError::FrozenTerm(id).into());
    }
    log::trace!("feedback {desired} into {id} via `{}`", function.name);

    match &function.kind {
        FunctionKind::Constant => {
            if let Some(ty) = unit.term(id)?.ty {
                unit.check_value_type(ty, &desired)?;
            }
            unit.assign(id, desired, ChangeCause::Feedback)
        }
        FunctionKind::Host(behavior) => match &behavior.feedback {
            Some(handler) => handler(&mut TermContext::new(unit, id, ChangeCause::Feedback), desired),
            None => Err(KernelError::NoFeedbackSupport {
                term: id,
                function: function.name.clone(),
            }),
        },
        _ => Err(KernelError::NoFeedbackSupport {
            term: id,
            function: function.name.clone(),
        }),
    }
}
