//! Subroutines: invocable sub-graphs with lexical scoping.
//!
//! A subroutine is defined by a named term whose value is a Function of kind
//! `Subroutine`. The term also carries the [`Subroutine`] record: input
//! placeholders and branches. Branch 0 is the main branch; nested blocks are
//! name scopes layered over their parent, and their terms run as part of the
//! main body in creation order.
//!
//! Names resolve at definition time: current block, enclosing blocks,
//! placeholders, then the unit (and its kernel).

use indexmap::IndexMap;
use serde::Serialize;

use crate::bridge::HostValue;
use crate::code_unit::CodeUnit;
use crate::diagnostics::ChangeCause;
use crate::error::{KernelError, Result, StructuralError};
use crate::eval;
use crate::function::{Function, FunctionKind};
use crate::ids::TermId;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubroutineState {
    /// Only input placeholders exist
    Unbound,
    /// The body references placeholders and locals
    Defined,
    Invocable,
}

/// A lexical scope inside a subroutine
#[derive(Debug, Clone, Default)]
pub struct Branch {
    pub names: IndexMap<String, TermId>,
    pub parent: Option<usize>,
    pub terms: Vec<TermId>,
}

#[derive(Debug, Clone)]
pub struct Subroutine {
    pub name: String,
    /// Input placeholders by name, in declaration order
    pub placeholders: IndexMap<String, TermId>,
    pub branches: Vec<Branch>,
    /// Body terms of every branch, in creation order
    pub order: Vec<TermId>,
    pub result: Option<TermId>,
    /// Body state persists across invocations
    pub stateful: bool,
    pub state: SubroutineState,
    pub(crate) active: bool,
}

impl Subroutine {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            placeholders: IndexMap::new(),
            branches: vec![Branch::default()],
            order: Vec::new(),
            result: None,
            stateful: false,
            state: SubroutineState::Unbound,
            active: false,
        }
    }

    pub fn inputs(&self) -> impl Iterator<Item = TermId> + '_ {
        self.placeholders.values().copied()
    }

    pub fn main(&self) -> &Branch {
        &self.branches[0]
    }
}

/// Builds a subroutine inside a unit.
pub struct SubroutineBuilder<'u> {
    unit: &'u mut CodeUnit,
    id: TermId,
    subroutine: Subroutine,
    current: usize,
}

impl<'u> SubroutineBuilder<'u> {
    /// Creates the defining term `name`.
    pub fn new(unit: &'u mut CodeUnit, name: &str) -> Result<Self> {
        let ty = unit
            .kernel_terms()
            .ok_or(StructuralError::MissingKernel)?
            .subroutine;
        let function = Function::new(name).with_kind(FunctionKind::Subroutine);
        let id = unit.create_constant(Some(name), Value::function(function), ty)?;
        let subroutine = Subroutine::new(name);
        unit.term_mut(id)?.subroutine = Some(Box::new(subroutine.clone()));
        log::trace!("defining subroutine `{name}` at {id}");
        Ok(Self {
            unit,
            id,
            subroutine,
            current: 0,
        })
    }

    pub fn id(&self) -> TermId {
        self.id
    }

    pub fn unit(&self) -> &CodeUnit {
        &*self.unit
    }

    pub fn state(&self) -> SubroutineState {
        self.subroutine.state
    }

    pub fn set_stateful(&mut self, stateful: bool) -> &mut Self {
        self.subroutine.stateful = stateful;
        self
    }

    /// Adds an input placeholder of type `ty`.
    pub fn add_input(&mut self, name: &str, ty: TermId) -> Result<TermId> {
        if self.subroutine.placeholders.contains_key(name) {
            return Err(KernelError::DuplicateName(name.to_string()));
        }
        if self.unit.term(ty)?.value.as_ref().and_then(Value::as_type).is_none() {
            return Err(StructuralError::NotAType(ty).into());
        }
        let placeholder = self
            .unit
            .kernel_terms()
            .ok_or(StructuralError::MissingKernel)?
            .input_placeholder;
        let id = self.unit.create_term(placeholder, &[], None)?;
        let term = self.unit.term_mut(id)?;
        term.ty = Some(ty);
        term.name = Some(name.to_string());
        self.subroutine.placeholders.insert(name.to_string(), id);
        Ok(id)
    }

    /// Resolves `name` from the current block outwards.
    pub fn lookup(&self, name: &str) -> Result<TermId> {
        let mut block = Some(self.current);
        while let Some(index) = block {
            let branch = &self.subroutine.branches[index];
            if let Some(id) = branch.names.get(name) {
                return Ok(*id);
            }
            block = branch.parent;
        }
        if let Some(id) = self.subroutine.placeholders.get(name) {
            return Ok(*id);
        }
        self.unit.get_named_term(name)
    }

    /// Creates a body term in the current block.
    pub fn create_term(
        &mut self,
        function: TermId,
        inputs: &[TermId],
        name: Option<&str>,
    ) -> Result<TermId> {
        self.check_unbound_locally(name)?;
        let id = self.unit.create_term(function, inputs, None)?;
        for input in inputs {
            self.capture(*input);
        }
        let calls_subroutine = function != self.id
            && matches!(
                self.unit.function_value(function).map(|f| &f.kind),
                Ok(FunctionKind::Subroutine)
            );
        if calls_subroutine {
            self.capture(function);
        }
        self.bind(id, name)
    }

    /// Terms from outside the body invalidate the definition, and through it
    /// every call site.
    fn capture(&mut self, outer: TermId) {
        let local = self.subroutine.order.contains(&outer)
            || self.subroutine.placeholders.values().any(|id| *id == outer);
        if !local {
            self.unit.add_user(outer, self.id);
        }
    }

    /// Creates a body term applying `function_name` to named inputs.
    pub fn call(
        &mut self,
        function_name: &str,
        input_names: &[&str],
        name: Option<&str>,
    ) -> Result<TermId> {
        let function = self.lookup(function_name)?;
        let inputs = input_names
            .iter()
            .map(|input| self.lookup(input))
            .collect::<Result<Vec<_>>>()?;
        self.create_term(function, &inputs, name)
    }

    /// Creates a body constant.
    pub fn constant(&mut self, name: Option<&str>, value: Value, ty: TermId) -> Result<TermId> {
        self.check_unbound_locally(name)?;
        let id = self.unit.create_constant(None, value, ty)?;
        self.bind(id, name)
    }

    pub fn wrap<T: HostValue>(&mut self, name: Option<&str>, value: T) -> Result<TermId> {
        self.check_unbound_locally(name)?;
        let id = self.unit.wrap(None, value)?;
        self.bind(id, name)
    }

    /// Opens a nested block whose names layer over the current one.
    pub fn enter_block(&mut self) -> usize {
        self.subroutine.branches.push(Branch {
            parent: Some(self.current),
            ..Branch::default()
        });
        self.current = self.subroutine.branches.len() - 1;
        self.current
    }

    pub fn exit_block(&mut self) -> Result<()> {
        match self.subroutine.branches[self.current].parent {
            Some(parent) => {
                self.current = parent;
                Ok(())
            }
            None => Err(self.not_invocable("no block is open")),
        }
    }

    /// Designates the term whose value the subroutine returns.
    pub fn set_result(&mut self, name: &str) -> Result<TermId> {
        let id = self.lookup(name)?;
        self.subroutine.result = Some(id);
        Ok(id)
    }

    pub fn set_result_term(&mut self, id: TermId) -> Result<()> {
        self.unit.term(id)?;
        self.subroutine.result = Some(id);
        Ok(())
    }

    /// Completes the definition. Without an explicit result the last term
    /// of the main branch is returned.
    pub fn finish(mut self) -> Result<TermId> {
        if self.current != 0 {
            return Err(self.not_invocable("a nested block is still open"));
        }
        if self.subroutine.result.is_none() {
            self.subroutine.result = self.subroutine.main().terms.last().copied();
        }

        let mut inputs = Vec::with_capacity(self.subroutine.placeholders.len());
        for placeholder in self.subroutine.inputs() {
            if let Some(ty) = self.unit.term(placeholder)?.ty {
                inputs.push(ty);
            }
        }
        let output = match self.subroutine.result {
            Some(result) => self.unit.term(result)?.ty,
            None => None,
        };

        let function = self.unit.function_mut(self.id)?;
        function.inputs = inputs;
        function.output = output;
        function.stateful = self.subroutine.stateful;

        self.subroutine.state = SubroutineState::Invocable;
        log::trace!(
            "subroutine `{}` invocable with {} body terms",
            self.subroutine.name,
            self.subroutine.order.len()
        );
        self.unit.term_mut(self.id)?.subroutine = Some(Box::new(self.subroutine));
        Ok(self.id)
    }

    fn check_unbound_locally(&self, name: Option<&str>) -> Result<()> {
        match name {
            Some(name) if self.subroutine.branches[self.current].names.contains_key(name) => {
                Err(KernelError::DuplicateName(name.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn bind(&mut self, id: TermId, name: Option<&str>) -> Result<TermId> {
        if let Some(name) = name {
            self.unit.term_mut(id)?.name = Some(name.to_string());
            self.subroutine.branches[self.current]
                .names
                .insert(name.to_string(), id);
        }
        self.subroutine.branches[self.current].terms.push(id);
        self.subroutine.order.push(id);
        self.subroutine.state = SubroutineState::Defined;
        Ok(id)
    }

    fn not_invocable(&self, reason: &str) -> KernelError {
        StructuralError::NotInvocable {
            subroutine: self.id,
            reason: reason.to_string(),
        }
        .into()
    }
}

/// Binds `args` to the placeholders and evaluates the body in its own pass.
pub fn invoke(unit: &mut CodeUnit, id: TermId, args: &[Value]) -> Result<Value> {
    let term = unit.term(id)?;
    let Some(subroutine) = term.subroutine.as_deref() else {
        return Err(StructuralError::NotSubroutine(id).into());
    };
    let not_invocable = |reason: String| StructuralError::NotInvocable {
        subroutine: id,
        reason,
    };
    if !unit.owns(id) {
        return Err(not_invocable("defined in a frozen kernel unit".to_string()).into());
    }
    if subroutine.state != SubroutineState::Invocable {
        return Err(not_invocable(format!("definition is {:?}", subroutine.state)).into());
    }
    if subroutine.active {
        return Err(StructuralError::Reentrant(id).into());
    }
    if args.len() != subroutine.placeholders.len() {
        return Err(StructuralError::Arity {
            function: subroutine.name.clone(),
            expected: subroutine.placeholders.len(),
            found: args.len(),
        }
        .into());
    }

    let placeholders: Vec<TermId> = subroutine.inputs().collect();
    let order = subroutine.order.clone();
    let result = subroutine.result;
    let stateful = subroutine.stateful;
    log::trace!("invoking `{}` with {args:?}", subroutine.name);

    for (placeholder, arg) in placeholders.iter().zip(args) {
        if let Some(ty) = unit.term(*placeholder)?.ty {
            unit.check_value_type(ty, arg)?;
        }
    }

    set_active(unit, id, true)?;
    let outcome = run(unit, &placeholders, &order, result, stateful, args);
    set_active(unit, id, false)?;
    outcome
}

fn run(
    unit: &mut CodeUnit,
    placeholders: &[TermId],
    order: &[TermId],
    result: Option<TermId>,
    stateful: bool,
    args: &[Value],
) -> Result<Value> {
    for (placeholder, arg) in placeholders.iter().zip(args) {
        unit.assign(*placeholder, arg.clone(), ChangeCause::Bind)?;
    }
    if !stateful {
        for id in order {
            if unit.term(*id)?.state.is_some() {
                unit.reset_state(*id)?;
            }
        }
    }

    let saved = unit.pass;
    unit.passes += 1;
    unit.pass = unit.passes;
    let mut outcome = Ok(());
    for id in order {
        outcome = eval::evaluate_term(unit, *id);
        if outcome.is_err() {
            break;
        }
    }
    unit.pass = saved;
    outcome?;

    match result {
        Some(result) => Ok(unit.term(result)?.value.clone().unwrap_or(Value::Null)),
        None => Ok(Value::Null),
    }
}

fn set_active(unit: &mut CodeUnit, id: TermId, active: bool) -> Result<()> {
    if let Some(subroutine) = unit.term_mut(id)?.subroutine.as_deref_mut() {
        subroutine.active = active;
    }
    Ok(())
}
