//! Evaluation engine.
//!
//! Depth-first and left to right: a term computes strictly after all of its
//! inputs. Each top-level `evaluate` opens a pass; a term computes at most
//! once per pass, so a stateful input shared by two consumers advances once.
//! Clean, non-volatile terms keep their cached value across passes.

use crate::code_unit::CodeUnit;
use crate::context::TermContext;
use crate::diagnostics::ChangeCause;
use crate::error::{KernelError, Result, StructuralError};
use crate::function::{Function, FunctionKind};
use crate::ids::TermId;
use crate::value::Value;

/// Evaluates `id` and returns its value (`Null` when it has no output).
pub fn evaluate(unit: &mut CodeUnit, id: TermId) -> Result<Value> {
    if unit.depth == 0 {
        unit.passes += 1;
        unit.pass = unit.passes;
    }
    evaluate_term(unit, id)?;
    Ok(unit.term(id)?.value.clone().unwrap_or(Value::Null))
}

pub(crate) fn evaluate_term(unit: &mut CodeUnit, id: TermId) -> Result<()> {
    let term = unit.term(id)?;
    // Kernel terms are settled when the kernel is built.
    if !unit.owns(id) {
        return Ok(());
    }
    if term.evaluated_in == Some(unit.pass) {
        return Ok(());
    }
    if !term.dirty && !term.volatile && term.value.is_some() {
        return Ok(());
    }

    let limit = unit.config().max_eval_depth;
    if unit.depth >= limit {
        return Err(KernelError::ResourceExhausted { term: id, limit });
    }
    unit.depth += 1;
    let result = compute(unit, id);
    unit.depth -= 1;
    result
}

fn compute(unit: &mut CodeUnit, id: TermId) -> Result<()> {
    let inputs = unit.term(id)?.inputs.clone();
    for input in inputs {
        evaluate_term(unit, input)?;
    }

    let function = unit.function_of(id)?;
    log::trace!("evaluating {id} with `{}`", function.name);

    match &function.kind {
        FunctionKind::ConstantGenerator => generate_constant_function(unit, id)?,
        FunctionKind::Constant => {
            let term = unit.term_mut(id)?;
            if term.value.is_none() {
                term.value = Some(Value::Null);
            }
        }
        FunctionKind::Uninstalled => {
            return Err(KernelError::Evaluation {
                term: id,
                function: function.name.clone(),
                source: anyhow::anyhow!("function `{}` has no installed behavior", function.name),
            });
        }
        FunctionKind::Input => {
            if unit.term(id)?.value.is_none() {
                return Err(StructuralError::Unbound(id).into());
            }
        }
        FunctionKind::Host(behavior) => {
            let mut ctx = TermContext::new(unit, id, ChangeCause::Evaluate);
            if function.stateful && ctx.state().is_none() {
                let state = match &behavior.init {
                    Some(init) => init(&mut ctx).map_err(|source| failed(id, &function, source))?,
                    None => Value::Null,
                };
                ctx.set_state(state)?;
            }
            (behavior.evaluate)(&mut ctx).map_err(|source| failed(id, &function, source))?;
        }
        FunctionKind::Subroutine => {
            let subroutine = unit.term(id)?.function;
            let args = TermContext::new(unit, id, ChangeCause::Evaluate)
                .input_values()
                .map_err(|source| failed(id, &function, source))?;
            let result = crate::subroutine::invoke(unit, subroutine, &args)?;
            TermContext::new(unit, id, ChangeCause::Evaluate).set_output(result)?;
        }
    }

    let pass = unit.pass;
    let term = unit.term_mut(id)?;
    term.dirty = false;
    term.evaluated_in = Some(pass);
    Ok(())
}

/// Applies the constant generator: a Type input becomes a constant function
/// whose output is that type.
fn generate_constant_function(unit: &mut CodeUnit, id: TermId) -> Result<()> {
    let ty = unit
        .term(id)?
        .inputs
        .first()
        .copied()
        .ok_or(StructuralError::InputIndex { term: id, index: 0 })?;
    let name = match unit.term(ty)?.value.as_ref().and_then(Value::as_type) {
        Some(def) => format!("const-{}", def.name),
        None => return Err(StructuralError::NotAType(ty).into()),
    };
    let function = Function::new(name)
        .with_output(ty)
        .with_kind(FunctionKind::Constant);
    TermContext::new(unit, id, ChangeCause::Evaluate).set_output(Value::function(function))
}

fn failed(term: TermId, function: &Function, source: anyhow::Error) -> KernelError {
    log::trace!("{term} failed in `{}`: {source:#}", function.name);
    KernelError::Evaluation {
        term,
        function: function.name.clone(),
        source,
    }
}
