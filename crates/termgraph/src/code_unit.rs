//! Term storage, id allocation and name resolution.
//!
//! A unit owns its terms in creation order. A unit built over a [`Kernel`]
//! continues the kernel's id sequence: ids below [`CodeUnit::base`] resolve
//! to the kernel's (frozen) unit, everything else to this one.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::any::Any;
use std::sync::Arc;

use crate::bridge::{HostType, HostValue};
use crate::config::KernelConfig;
use crate::diagnostics::{ChangeCause, ChangeLog};
use crate::error::{KernelError, Result, StructuralError};
use crate::function::{Function, FunctionKind, HostBehavior};
use crate::ids::{TermId, UnitId};
use crate::kernel::{Kernel, KernelTerms};
use crate::term::Term;
use crate::value::{HostOpaque, Value};

pub struct CodeUnit {
    id: UnitId,
    /// Kernel this unit is layered over; `None` for the kernel's own unit
    library: Option<Arc<Kernel>>,
    config: KernelConfig,
    /// First id owned by this unit
    base: TermId,
    terms: Vec<Term>,
    names: IndexMap<String, TermId>,
    next_id: TermId,
    /// Type -> constant function generated for it
    const_functions: FxHashMap<TermId, TermId>,
    pub(crate) core: Option<Arc<KernelTerms>>,
    pub(crate) constant_generator: Option<TermId>,
    pub(crate) depth: usize,
    /// Current evaluation pass
    pub(crate) pass: u64,
    pub(crate) passes: u64,
    pub(crate) changes: ChangeLog,
}

impl CodeUnit {
    /// Unit with no kernel beneath it. Only the bootstrap builds these.
    pub(crate) fn empty(config: KernelConfig) -> Self {
        let mut changes = ChangeLog::new();
        if config.record_changes {
            changes.enable();
        }
        Self {
            id: UnitId::new(),
            library: None,
            config,
            base: TermId::FIRST,
            terms: Vec::new(),
            names: IndexMap::new(),
            next_id: TermId::FIRST,
            const_functions: FxHashMap::default(),
            core: None,
            constant_generator: None,
            depth: 0,
            pass: 0,
            passes: 0,
            changes,
        }
    }

    /// New unit over `kernel`, inheriting its config.
    pub fn new(kernel: Arc<Kernel>) -> Self {
        let config = kernel.config().clone();
        Self::with_config(kernel, config)
    }

    pub fn with_config(kernel: Arc<Kernel>, config: KernelConfig) -> Self {
        let mut unit = Self::empty(config);
        let library = kernel.unit();
        unit.base = library.next_id;
        unit.next_id = library.next_id;
        unit.core = library.core.clone();
        unit.constant_generator = library.constant_generator;
        unit.library = Some(kernel);
        log::debug!("unit {} created over kernel at {}", unit.id, unit.base);
        unit
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn kernel(&self) -> Option<&Arc<Kernel>> {
        self.library.as_ref()
    }

    /// Well-known kernel terms, once primitive types exist
    pub fn kernel_terms(&self) -> Option<&KernelTerms> {
        self.core.as_deref()
    }

    pub fn base(&self) -> TermId {
        self.base
    }

    pub fn next_id(&self) -> TermId {
        self.next_id
    }

    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    pub fn changes_mut(&mut self) -> &mut ChangeLog {
        &mut self.changes
    }

    pub fn owns(&self, id: TermId) -> bool {
        id >= self.base && id < self.next_id
    }

    pub fn term(&self, id: TermId) -> Result<&Term> {
        if id < self.base {
            return match &self.library {
                Some(kernel) => kernel.unit().term(id),
                None => Err(StructuralError::UnknownTerm(id).into()),
            };
        }
        self.terms
            .get((id.0 - self.base.0) as usize)
            .ok_or_else(|| StructuralError::UnknownTerm(id).into())
    }

    /// Mutable access to a term this unit owns.
    pub fn term_mut(&mut self, id: TermId) -> Result<&mut Term> {
        if id < self.base {
            return Err(match self.library {
                Some(_) if id >= TermId::FIRST => StructuralError::FrozenTerm(id),
                _ => StructuralError::UnknownTerm(id),
            }
            .into());
        }
        self.terms
            .get_mut((id.0 - self.base.0) as usize)
            .ok_or_else(|| StructuralError::UnknownTerm(id).into())
    }

    /// Terms owned by this unit, in creation order
    pub fn all_terms(&self) -> impl Iterator<Item = &Term> + '_ {
        self.terms.iter()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Names bound by this unit, in binding order
    pub fn names(&self) -> impl Iterator<Item = (&str, TermId)> + '_ {
        self.names.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Resolves `name` here, then in the kernel.
    pub fn lookup(&self, name: &str) -> Option<TermId> {
        self.names.get(name).copied().or_else(|| {
            self.library
                .as_ref()
                .and_then(|kernel| kernel.unit().lookup(name))
        })
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn get_named_term(&self, name: &str) -> Result<TermId> {
        self.lookup(name)
            .ok_or_else(|| KernelError::NameNotFound(name.to_string()))
    }

    /// Value of `id` as a function.
    pub fn function_value(&self, id: TermId) -> Result<&Arc<Function>> {
        self.term(id)?
            .value
            .as_ref()
            .and_then(Value::as_function)
            .ok_or_else(|| StructuralError::NotAFunction(id).into())
    }

    /// Function `term` is bound to.
    pub fn function_of(&self, term: TermId) -> Result<Arc<Function>> {
        let function = self.term(term)?.function;
        self.function_value(function).cloned()
    }

    pub fn function_mut(&mut self, id: TermId) -> Result<&mut Function> {
        match &mut self.term_mut(id)?.value {
            Some(Value::Function(function)) => Ok(Arc::make_mut(function)),
            _ => Err(StructuralError::NotAFunction(id).into()),
        }
    }

    /// Name of a type term, for messages.
    pub fn type_name(&self, ty: TermId) -> String {
        self.term(ty)
            .ok()
            .and_then(|term| term.value.as_ref())
            .and_then(Value::as_type)
            .map(|def| def.name.to_string())
            .unwrap_or_else(|| ty.to_string())
    }

    /// Allocates a term with no checks beyond the name. The bootstrap uses
    /// this directly while function references cannot resolve yet.
    pub(crate) fn push_term(
        &mut self,
        function: Option<TermId>,
        inputs: &[TermId],
        name: Option<&str>,
    ) -> Result<TermId> {
        if let Some(name) = name {
            if self.is_bound(name) {
                return Err(KernelError::DuplicateName(name.to_string()));
            }
        }

        let id = self.next_id;
        self.next_id = id.next();

        let mut term = Term::new(id, function.unwrap_or(id), inputs.iter().copied().collect());
        term.name = name.map(str::to_string);
        self.terms.push(term);

        if let Some(name) = name {
            self.names.insert(name.to_string(), id);
        }
        for input in inputs {
            self.add_user(*input, id);
        }
        Ok(id)
    }

    /// Records `user` as depending on `id`. Kernel terms never change, so
    /// they keep no users from other units.
    pub(crate) fn add_user(&mut self, id: TermId, user: TermId) {
        if let Ok(term) = self.term_mut(id) {
            if !term.users.contains(&user) {
                term.users.push(user);
            }
        }
    }

    /// Creates a term bound to `function` over `inputs`.
    pub fn create_term(
        &mut self,
        function: TermId,
        inputs: &[TermId],
        name: Option<&str>,
    ) -> Result<TermId> {
        if let Some(name) = name {
            if self.is_bound(name) {
                return Err(KernelError::DuplicateName(name.to_string()));
            }
        }
        let func = self.function_value(function)?.clone();

        let mut volatile = func.stateful;
        for input in inputs {
            volatile |= self.term(*input)?.volatile;
        }
        if self.config.check_input_types {
            self.check_arity(&func, inputs.len())?;
            for (index, input) in inputs.iter().enumerate() {
                self.check_input_type(&func, index, *input)?;
            }
        }

        let id = self.push_term(Some(function), inputs, name)?;
        // Call sites follow their subroutine's definition
        if matches!(func.kind, FunctionKind::Subroutine) {
            self.add_user(function, id);
        }
        let term = self.term_mut(id)?;
        term.ty = func.output;
        term.volatile = volatile;
        log::trace!("created {id} = {}({inputs:?})", func.name);
        Ok(id)
    }

    /// Creates a term by function name, resolving through the kernel.
    pub fn apply(
        &mut self,
        function_name: &str,
        inputs: &[TermId],
        name: Option<&str>,
    ) -> Result<TermId> {
        let function = self.get_named_term(function_name)?;
        self.create_term(function, inputs, name)
    }

    /// Creates a zero-input term holding `value`, bound through the
    /// constant function generated for `ty`.
    pub fn create_constant(
        &mut self,
        name: Option<&str>,
        value: Value,
        ty: TermId,
    ) -> Result<TermId> {
        if let Some(name) = name {
            if self.is_bound(name) {
                return Err(KernelError::DuplicateName(name.to_string()));
            }
        }
        if self.term(ty)?.value.as_ref().and_then(Value::as_type).is_none() {
            return Err(StructuralError::NotAType(ty).into());
        }
        self.check_value_type(ty, &value)?;

        let function = self.constant_function_for(ty)?;
        let id = self.create_term(function, &[], name)?;
        let term = self.term_mut(id)?;
        term.value = Some(value);
        term.ty = Some(ty);
        term.dirty = false;
        Ok(id)
    }

    fn cached_constant_function(&self, ty: TermId) -> Option<TermId> {
        self.const_functions.get(&ty).copied().or_else(|| {
            self.library
                .as_ref()
                .and_then(|kernel| kernel.unit().cached_constant_function(ty))
        })
    }

    pub(crate) fn cache_constant_function(&mut self, ty: TermId, function: TermId) {
        self.const_functions.insert(ty, function);
    }

    /// Constant function for `ty`, generating it on first use.
    pub fn constant_function_for(&mut self, ty: TermId) -> Result<TermId> {
        if let Some(function) = self.cached_constant_function(ty) {
            return Ok(function);
        }
        let generator = self
            .constant_generator
            .ok_or(StructuralError::MissingKernel)?;
        let function = self.create_term(generator, &[ty], None)?;
        crate::eval::evaluate(self, function)?;
        self.const_functions.insert(ty, function);
        log::debug!("generated constant function {function} for {}", self.type_name(ty));
        Ok(function)
    }

    fn check_arity(&self, func: &Function, found: usize) -> Result<()> {
        let expected = func.inputs.len();
        let fits = if func.variadic {
            found + 1 >= expected
        } else {
            found == expected
        };
        if fits {
            Ok(())
        } else {
            Err(StructuralError::Arity {
                function: func.name.clone(),
                expected,
                found,
            }
            .into())
        }
    }

    fn check_input_type(&self, func: &Function, index: usize, input: TermId) -> Result<()> {
        let Some(core) = &self.core else {
            return Ok(());
        };
        let Some(expected) = func.input_type(index) else {
            return Ok(());
        };
        let found = self.term(input)?.ty;
        if expected == core.any || found == Some(expected) || found == Some(core.any) {
            return Ok(());
        }
        Err(StructuralError::InputType {
            function: func.name.clone(),
            index,
            expected: self.type_name(expected),
            found: match found {
                Some(ty) => self.type_name(ty),
                None => "nothing".to_string(),
            },
        }
        .into())
    }

    /// Checks that `value` fits the primitive type `ty`. Types without a
    /// primitive representation accept any value.
    pub fn check_value_type(&self, ty: TermId, value: &Value) -> Result<()> {
        let Some(core) = &self.core else {
            return Ok(());
        };
        if ty == core.any || !core.is_primitive(ty) {
            return Ok(());
        }
        let fits = match value {
            Value::Null => ty == core.void,
            Value::Int(_) => ty == core.int,
            Value::Float(_) => ty == core.float,
            Value::Text(_) => ty == core.text,
            Value::Bool(_) => ty == core.bool,
            Value::Type(_) => ty == core.type_type,
            Value::Function(_) => ty == core.function_type || ty == core.subroutine,
            Value::Composite(_) => ty == core.list,
            Value::Host(_) => false,
        };
        if fits {
            return Ok(());
        }
        Err(StructuralError::ValueType {
            expected: self.type_name(ty),
            found: value.kind_name(),
        }
        .into())
    }

    /// Replaces input slot `index` of `term`.
    pub fn set_input(&mut self, term: TermId, index: usize, input: TermId) -> Result<()> {
        let old = {
            let current = self.term_mut(term)?;
            match current.inputs.get(index) {
                Some(old) => *old,
                None => return Err(StructuralError::InputIndex { term, index }.into()),
            }
        };
        self.term(input)?;
        if input == term || self.depends_on(input, term)? {
            return Err(StructuralError::Cycle { term, input }.into());
        }
        if self.config.check_input_types {
            let func = self.function_of(term)?;
            self.check_input_type(&func, index, input)?;
        }

        self.term_mut(term)?.inputs[index] = input;
        if !self.term(term)?.inputs.contains(&old) {
            if let Ok(old) = self.term_mut(old) {
                old.users.retain(|user| *user != term);
            }
        }
        self.add_user(input, term);

        self.refresh_volatility(term)?;
        self.invalidate(term, true);
        Ok(())
    }

    /// Whether `from` reaches `target` through inputs.
    fn depends_on(&self, from: TermId, target: TermId) -> Result<bool> {
        let mut visited = FxHashSet::default();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == target {
                return Ok(true);
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.term(current)?.inputs.iter().copied());
        }
        Ok(false)
    }

    fn refresh_volatility(&mut self, from: TermId) -> Result<()> {
        let mut queue = vec![from];
        while let Some(id) = queue.pop() {
            let stateful = self.function_of(id)?.stateful;
            let mut volatile = stateful;
            for input in self.term(id)?.inputs.clone() {
                volatile |= self.term(input)?.volatile;
            }
            let term = self.term_mut(id)?;
            if term.volatile != volatile || id == from {
                term.volatile = volatile;
                queue.extend(term.users.iter().copied());
            }
        }
        Ok(())
    }

    /// Marks every transitive user of `id` dirty, and `id` itself if asked.
    pub(crate) fn invalidate(&mut self, id: TermId, include_self: bool) {
        let mut visited = FxHashSet::default();
        let mut stack: SmallVec<[TermId; 8]> = SmallVec::new();
        if include_self {
            stack.push(id);
        } else if let Ok(term) = self.term(id) {
            stack.extend(term.users.iter().copied());
        }
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Ok(term) = self.term_mut(current) {
                term.dirty = true;
                stack.extend(term.users.iter().copied());
            }
        }
    }

    /// Sets `id`'s value and marks its users dirty.
    pub fn assign(&mut self, id: TermId, value: Value, cause: ChangeCause) -> Result<()> {
        let term = self.term_mut(id)?;
        let old = term.value.replace(value);
        let new = term.value.clone();
        self.changes.record(id, cause, old.as_ref(), new.as_ref());
        self.invalidate(id, false);
        Ok(())
    }

    /// Drops `id`'s state so the next evaluation runs `init` again.
    pub fn reset_state(&mut self, id: TermId) -> Result<()> {
        let term = self.term_mut(id)?;
        let old = term.state.take();
        term.dirty = true;
        if old.is_some() {
            self.changes.record(id, ChangeCause::Reset, old.as_ref(), None);
        }
        self.invalidate(id, false);
        Ok(())
    }

    pub fn evaluate(&mut self, id: TermId) -> Result<Value> {
        crate::eval::evaluate(self, id)
    }

    pub fn feedback(&mut self, id: TermId, desired: Value) -> Result<()> {
        crate::feedback::feedback(self, id, desired)
    }

    pub fn invoke(&mut self, subroutine: TermId, args: &[Value]) -> Result<Value> {
        crate::subroutine::invoke(self, subroutine, args)
    }

    /// Attaches `behavior` to the declared function `name`.
    pub fn install_func(&mut self, name: &str, behavior: HostBehavior) -> Result<()> {
        let id = self.get_named_term(name)?;
        let function = self.function_mut(id)?;
        if function.is_installed() {
            return Err(KernelError::AlreadyInstalled(name.to_string()));
        }
        function.kind = FunctionKind::Host(behavior);
        log::debug!("installed `{name}` on {id}");
        Ok(())
    }

    /// Wraps a host value as a constant of its mapped graph type.
    pub fn wrap<T: HostValue>(&mut self, name: Option<&str>, value: T) -> Result<TermId> {
        let kernel = self.library.clone().ok_or(StructuralError::MissingKernel)?;
        let ty = kernel.types().graph_type(&T::host_type())?;
        self.create_constant(name, value.into_value(), ty)
    }

    /// Wraps a host value with no graph representation, carried by identity.
    pub fn wrap_opaque<T: Any + Send + Sync>(
        &mut self,
        name: Option<&str>,
        value: T,
    ) -> Result<TermId> {
        let kernel = self.library.clone().ok_or(StructuralError::MissingKernel)?;
        let ty = kernel.types().graph_type(&HostType::opaque::<T>())?;
        self.create_constant(name, Value::Host(HostOpaque::new(value)), ty)
    }
}

impl std::fmt::Debug for CodeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeUnit")
            .field("id", &self.id)
            .field("base", &self.base)
            .field("terms", &self.terms.len())
            .field("names", &self.names.len())
            .finish_non_exhaustive()
    }
}
