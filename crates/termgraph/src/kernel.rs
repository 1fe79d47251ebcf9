//! The kernel: the bootstrapped, frozen unit every user unit is built on.
//!
//! [`KernelBuilder`] runs the fixed point, creates the primitive types and
//! constants, fills the foreign-value table and loads library sources. Once
//! built, the kernel is read-only and shared through an `Arc`.

use std::sync::{Arc, Mutex};

use crate::bootstrap::{Bootstrap, FixedPoint};
use crate::bridge::{HostType, HostValue, TypeTable};
use crate::builtins::StandardLibrary;
use crate::code_unit::CodeUnit;
use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::function::{Function, FunctionKind, HostBehavior, Signature};
use crate::ids::TermId;
use crate::library::LibrarySource;
use crate::value::Value;

/// Ids of the terms the engine itself relies on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelTerms {
    pub constant_generator: TermId,
    pub constant_type: TermId,
    pub type_type: TermId,
    pub function_type: TermId,
    pub any: TermId,
    pub void: TermId,
    pub int: TermId,
    pub float: TermId,
    pub text: TermId,
    pub bool: TermId,
    pub subroutine: TermId,
    pub reference: TermId,
    pub list: TermId,
    /// Function of subroutine input placeholders
    pub input_placeholder: TermId,
}

impl KernelTerms {
    /// Types whose values have a fixed kind.
    pub fn is_primitive(&self, ty: TermId) -> bool {
        [
            self.void,
            self.int,
            self.float,
            self.text,
            self.bool,
            self.type_type,
            self.function_type,
            self.subroutine,
            self.list,
        ]
        .contains(&ty)
    }
}

pub struct KernelBuilder {
    unit: CodeUnit,
    terms: Arc<KernelTerms>,
    types: TypeTable,
    libraries: Vec<String>,
}

impl KernelBuilder {
    pub fn new() -> Result<Self> {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Result<Self> {
        let (mut unit, fixed) = Bootstrap::run(config)?;
        let terms = Arc::new(Self::create_primitives(&mut unit, fixed)?);
        unit.core = Some(terms.clone());
        // Constant functions for the primitives, shared by every unit
        for ty in [
            terms.int,
            terms.float,
            terms.text,
            terms.bool,
            terms.list,
            terms.reference,
            terms.subroutine,
        ] {
            unit.constant_function_for(ty)?;
        }

        let mut builder = Self {
            unit,
            terms,
            types: TypeTable::new(),
            libraries: Vec::new(),
        };
        for (host, graph) in [
            (HostType::Int, builder.terms.int),
            (HostType::Float, builder.terms.float),
            (HostType::Text, builder.terms.text),
            (HostType::Bool, builder.terms.bool),
            (HostType::Type, builder.terms.type_type),
            (HostType::Function, builder.terms.function_type),
            (HostType::List, builder.terms.list),
        ] {
            builder.types.register_type(host, graph)?;
        }
        builder.create_constant(Some("true"), Value::Bool(true), builder.terms.bool)?;
        builder.create_constant(Some("false"), Value::Bool(false), builder.terms.bool)?;
        Ok(builder)
    }

    fn create_primitives(unit: &mut CodeUnit, fixed: FixedPoint) -> Result<KernelTerms> {
        let mut create_type =
            |name: &str| unit.create_constant(Some(name), Value::type_def(name), fixed.type_type);
        let any = create_type("any")?;
        let void = create_type("void")?;
        let int = create_type("int")?;
        let float = create_type("float")?;
        let text = create_type("text")?;
        let bool = create_type("bool")?;
        let subroutine = create_type("Subroutine")?;
        let reference = create_type("Ref")?;
        let list = create_type("List")?;

        let placeholder = Function::new("input")
            .with_output(any)
            .with_kind(FunctionKind::Input);
        let input_placeholder =
            unit.create_constant(Some("input"), Value::function(placeholder), fixed.function_type)?;

        Ok(KernelTerms {
            constant_generator: fixed.constant_generator,
            constant_type: fixed.constant_type,
            type_type: fixed.type_type,
            function_type: fixed.function_type,
            any,
            void,
            int,
            float,
            text,
            bool,
            subroutine,
            reference,
            list,
            input_placeholder,
        })
    }

    pub fn terms(&self) -> &KernelTerms {
        &self.terms
    }

    pub fn unit(&self) -> &CodeUnit {
        &self.unit
    }

    pub fn unit_mut(&mut self) -> &mut CodeUnit {
        &mut self.unit
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Names of the libraries loaded so far.
    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    pub fn get_named_term(&self, name: &str) -> Result<TermId> {
        self.unit.get_named_term(name)
    }

    /// Creates a new named type.
    pub fn create_type(&mut self, name: &str) -> Result<TermId> {
        let type_type = self.terms.type_type;
        self.unit
            .create_constant(Some(name), Value::type_def(name), type_type)
    }

    pub fn create_constant(
        &mut self,
        name: Option<&str>,
        value: Value,
        ty: TermId,
    ) -> Result<TermId> {
        self.unit.create_constant(name, value, ty)
    }

    pub fn register_type(&mut self, host: HostType, graph: TermId) -> Result<()> {
        self.types.register_type(host, graph)
    }

    pub fn wrap<T: HostValue>(&mut self, name: Option<&str>, value: T) -> Result<TermId> {
        let ty = self.types.graph_type(&T::host_type())?;
        self.unit.create_constant(name, value.into_value(), ty)
    }

    /// Declares a function with no behavior yet.
    pub fn declare_function(&mut self, name: &str, signature: Signature) -> Result<TermId> {
        let function = signature.into_function(name);
        let function_type = self.terms.function_type;
        let id = self
            .unit
            .create_constant(Some(name), Value::function(function), function_type)?;
        log::debug!("declared `{name}` at {id}");
        Ok(id)
    }

    pub fn install_func(&mut self, name: &str, behavior: HostBehavior) -> Result<()> {
        self.unit.install_func(name, behavior)
    }

    /// Declares `name` and installs `behavior` in one go.
    pub fn define_function(
        &mut self,
        name: &str,
        signature: Signature,
        behavior: HostBehavior,
    ) -> Result<TermId> {
        let id = self.declare_function(name, signature)?;
        self.install_func(name, behavior)?;
        Ok(id)
    }

    pub fn load_library(&mut self, source: &dyn LibrarySource) -> Result<()> {
        let library = source.name().to_string();
        log::debug!("loading library `{library}`");
        source
            .populate(self)
            .map_err(|source| KernelError::LibraryLoad {
                library: library.clone(),
                source,
            })?;
        self.libraries.push(library);
        Ok(())
    }

    /// Freezes the type table and seals the unit.
    pub fn build(mut self) -> Kernel {
        for term in self.unit.all_terms() {
            let uninstalled = term
                .value
                .as_ref()
                .and_then(Value::as_function)
                .is_some_and(|function| !function.is_installed());
            if uninstalled {
                log::warn!("`{}` declared but never installed", term.display_name());
            }
        }
        self.types.freeze();
        log::debug!(
            "kernel built: {} terms, {} host types, libraries {:?}",
            self.unit.len(),
            self.types.len(),
            self.libraries
        );
        Kernel {
            unit: self.unit,
            terms: self.terms,
            types: self.types,
            libraries: self.libraries,
        }
    }
}

#[derive(Debug)]
pub struct Kernel {
    unit: CodeUnit,
    terms: Arc<KernelTerms>,
    types: TypeTable,
    libraries: Vec<String>,
}

static SHARED: Mutex<Option<Arc<Kernel>>> = Mutex::new(None);

impl Kernel {
    /// Fresh kernel with the standard library.
    pub fn standard() -> Result<Arc<Kernel>> {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Result<Arc<Kernel>> {
        let mut builder = KernelBuilder::with_config(config)?;
        builder.load_library(&StandardLibrary)?;
        Ok(Arc::new(builder.build()))
    }

    /// The process-wide standard kernel, bootstrapped on first use.
    pub fn shared() -> Result<Arc<Kernel>> {
        let mut shared = SHARED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(kernel) = shared.as_ref() {
            return Ok(kernel.clone());
        }
        let kernel = Self::standard()?;
        *shared = Some(kernel.clone());
        Ok(kernel)
    }

    pub fn unit(&self) -> &CodeUnit {
        &self.unit
    }

    pub fn terms(&self) -> &KernelTerms {
        &self.terms
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn config(&self) -> &KernelConfig {
        self.unit.config()
    }

    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    pub fn get_named_term(&self, name: &str) -> Result<TermId> {
        self.unit.get_named_term(name)
    }

    /// New user unit over this kernel.
    pub fn new_unit(self: &Arc<Self>) -> CodeUnit {
        CodeUnit::new(self.clone())
    }
}
