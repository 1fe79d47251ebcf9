//! The Function/Type fixed point.
//!
//! Three terms depend on each other: `Type` needs a constant function and a
//! type, the constant function needs the generator, and the generator's
//! signature needs `Type` and `Function`. [`Bootstrap`] builds them in the
//! only order that works, leaving references unset until the cycle closes
//! and back-filling them afterwards:
//!
//! 1. `constant-generator` (A), bound to itself
//! 2. `const-Type` (B), bound to A
//! 3. `Type` (T), bound to B; `T.ty = T`
//! 4. back-fill: A takes `[T]`, B outputs `T`
//! 5. `Function` (F), bound to B; A outputs `F`
//!
//! Any other order is a [`KernelError::BootstrapOrder`].

use crate::code_unit::CodeUnit;
use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::function::{Function, FunctionKind};
use crate::ids::TermId;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapStep {
    ConstantGenerator,
    ConstantType,
    TypeType,
    Backfill,
    FunctionType,
    Finish,
    Done,
}

impl BootstrapStep {
    fn next(self) -> Self {
        match self {
            BootstrapStep::ConstantGenerator => BootstrapStep::ConstantType,
            BootstrapStep::ConstantType => BootstrapStep::TypeType,
            BootstrapStep::TypeType => BootstrapStep::Backfill,
            BootstrapStep::Backfill => BootstrapStep::FunctionType,
            BootstrapStep::FunctionType => BootstrapStep::Finish,
            BootstrapStep::Finish | BootstrapStep::Done => BootstrapStep::Done,
        }
    }
}

/// Ids of the four fixed-point terms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    pub constant_generator: TermId,
    pub constant_type: TermId,
    pub type_type: TermId,
    pub function_type: TermId,
}

/// Staged builder for the fixed point.
pub struct Bootstrap {
    unit: CodeUnit,
    step: BootstrapStep,
    constant_generator: Option<TermId>,
    constant_type: Option<TermId>,
    type_type: Option<TermId>,
    function_type: Option<TermId>,
}

impl Bootstrap {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            unit: CodeUnit::empty(config),
            step: BootstrapStep::ConstantGenerator,
            constant_generator: None,
            constant_type: None,
            type_type: None,
            function_type: None,
        }
    }

    /// Runs every step in order.
    pub fn run(config: KernelConfig) -> Result<(CodeUnit, FixedPoint)> {
        let mut bootstrap = Self::new(config);
        bootstrap.constant_generator()?;
        bootstrap.constant_type()?;
        bootstrap.type_type()?;
        bootstrap.backfill()?;
        bootstrap.function_type()?;
        bootstrap.finish()
    }

    pub fn step(&self) -> BootstrapStep {
        self.step
    }

    pub fn unit(&self) -> &CodeUnit {
        &self.unit
    }

    fn enter(&mut self, attempted: BootstrapStep) -> Result<()> {
        if self.step != attempted {
            return Err(KernelError::BootstrapOrder {
                attempted,
                expected: self.step,
            });
        }
        log::debug!("bootstrap step {attempted:?}");
        self.step = attempted.next();
        Ok(())
    }

    fn require(&self, id: Option<TermId>, attempted: BootstrapStep) -> Result<TermId> {
        id.ok_or(KernelError::BootstrapOrder {
            attempted,
            expected: self.step,
        })
    }

    /// Step 1: the generator, bound to itself with an unset signature.
    pub fn constant_generator(&mut self) -> Result<TermId> {
        self.enter(BootstrapStep::ConstantGenerator)?;
        let id = self.unit.push_term(None, &[], Some("constant-generator"))?;
        let function =
            Function::new("constant-generator").with_kind(FunctionKind::ConstantGenerator);
        self.unit.term_mut(id)?.value = Some(Value::function(function));
        self.unit.constant_generator = Some(id);
        self.constant_generator = Some(id);
        Ok(id)
    }

    /// Step 2: the constant function for Type, before Type exists.
    pub fn constant_type(&mut self) -> Result<TermId> {
        let generator = self.require(self.constant_generator, BootstrapStep::ConstantType)?;
        self.enter(BootstrapStep::ConstantType)?;
        let id = self.unit.push_term(Some(generator), &[], Some("const-Type"))?;
        let function = Function::new("const-Type").with_kind(FunctionKind::Constant);
        self.unit.term_mut(id)?.value = Some(Value::function(function));
        self.constant_type = Some(id);
        Ok(id)
    }

    /// Step 3: Type, which is its own type.
    pub fn type_type(&mut self) -> Result<TermId> {
        let constant_type = self.require(self.constant_type, BootstrapStep::TypeType)?;
        self.enter(BootstrapStep::TypeType)?;
        let id = self.unit.push_term(Some(constant_type), &[], Some("Type"))?;
        let term = self.unit.term_mut(id)?;
        term.value = Some(Value::type_def("Type"));
        term.ty = Some(id);
        term.dirty = false;
        self.type_type = Some(id);
        Ok(id)
    }

    /// Step 4: close the generator/Type cycle.
    pub fn backfill(&mut self) -> Result<()> {
        let generator = self.require(self.constant_generator, BootstrapStep::Backfill)?;
        let constant_type = self.require(self.constant_type, BootstrapStep::Backfill)?;
        let type_type = self.require(self.type_type, BootstrapStep::Backfill)?;
        self.enter(BootstrapStep::Backfill)?;

        self.unit.function_mut(generator)?.inputs = vec![type_type];
        self.unit.function_mut(constant_type)?.output = Some(type_type);
        // const-Type is the generator applied to Type
        self.unit.term_mut(constant_type)?.inputs.push(type_type);
        self.unit.term_mut(type_type)?.users.push(constant_type);
        self.unit.cache_constant_function(type_type, constant_type);
        Ok(())
    }

    /// Step 5: Function, after which the generator's output is known.
    pub fn function_type(&mut self) -> Result<TermId> {
        let generator = self.require(self.constant_generator, BootstrapStep::FunctionType)?;
        let constant_type = self.require(self.constant_type, BootstrapStep::FunctionType)?;
        let type_type = self.require(self.type_type, BootstrapStep::FunctionType)?;
        self.enter(BootstrapStep::FunctionType)?;

        let id = self.unit.push_term(Some(constant_type), &[], Some("Function"))?;
        let term = self.unit.term_mut(id)?;
        term.value = Some(Value::type_def("Function"));
        term.ty = Some(type_type);
        term.dirty = false;

        self.unit.function_mut(generator)?.output = Some(id);
        for function in [generator, constant_type] {
            let term = self.unit.term_mut(function)?;
            term.ty = Some(id);
            term.dirty = false;
        }
        self.function_type = Some(id);
        Ok(id)
    }

    /// Verifies that every function reference and type resolves.
    pub fn finish(mut self) -> Result<(CodeUnit, FixedPoint)> {
        let fixed = FixedPoint {
            constant_generator: self.require(self.constant_generator, BootstrapStep::Finish)?,
            constant_type: self.require(self.constant_type, BootstrapStep::Finish)?,
            type_type: self.require(self.type_type, BootstrapStep::Finish)?,
            function_type: self.require(self.function_type, BootstrapStep::Finish)?,
        };
        self.enter(BootstrapStep::Finish)?;

        for term in self.unit.all_terms() {
            if self.unit.function_value(term.function).is_err() {
                return Err(incomplete(term.id, "function reference does not hold a Function"));
            }
            let Some(ty) = term.ty else {
                return Err(incomplete(term.id, "type is unset"));
            };
            let holds_type = self
                .unit
                .term(ty)
                .ok()
                .and_then(|ty| ty.value.as_ref())
                .and_then(Value::as_type)
                .is_some();
            if !holds_type {
                return Err(incomplete(term.id, "type does not hold a Type"));
            }
        }
        if self.unit.term(fixed.type_type)?.ty != Some(fixed.type_type) {
            return Err(incomplete(fixed.type_type, "Type is not its own type"));
        }
        let generator = self.unit.function_value(fixed.constant_generator)?;
        if generator.inputs != [fixed.type_type] || generator.output != Some(fixed.function_type) {
            return Err(incomplete(
                fixed.constant_generator,
                "generator signature was not back-filled",
            ));
        }

        log::debug!("bootstrap fixed point closed: {fixed:?}");
        Ok((self.unit, fixed))
    }
}

fn incomplete(term: TermId, reason: &str) -> KernelError {
    KernelError::BootstrapIncomplete {
        term,
        reason: reason.to_string(),
    }
}
