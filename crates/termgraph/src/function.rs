//! Function values: the behavior contract a term is bound to.
//!
//! A term's `function` reference points at a term whose value is a
//! [`Function`]. The declared signature lives in the value, the behavior in
//! its [`FunctionKind`].

use std::fmt;
use std::sync::Arc;

use crate::context::TermContext;
use crate::error::Result;
use crate::ids::TermId;
use crate::value::Value;

pub type EvaluateFn = dyn Fn(&mut TermContext<'_>) -> anyhow::Result<()> + Send + Sync;
pub type InitFn = dyn Fn(&mut TermContext<'_>) -> anyhow::Result<Value> + Send + Sync;
pub type FeedbackFn = dyn Fn(&mut TermContext<'_>, Value) -> Result<()> + Send + Sync;

/// Host-implemented behavior: evaluate, plus optional init and feedback.
#[derive(Clone)]
pub struct HostBehavior {
    pub(crate) evaluate: Arc<EvaluateFn>,
    pub(crate) init: Option<Arc<InitFn>>,
    pub(crate) feedback: Option<Arc<FeedbackFn>>,
}

impl HostBehavior {
    pub fn new(
        evaluate: impl Fn(&mut TermContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            evaluate: Arc::new(evaluate),
            init: None,
            feedback: None,
        }
    }

    /// Allocates the initial state of a stateful term.
    pub fn with_init(
        mut self,
        init: impl Fn(&mut TermContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.init = Some(Arc::new(init));
        self
    }

    pub fn with_feedback(
        mut self,
        feedback: impl Fn(&mut TermContext<'_>, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.feedback = Some(Arc::new(feedback));
        self
    }

    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    pub fn has_feedback(&self) -> bool {
        self.feedback.is_some()
    }
}

impl fmt::Debug for HostBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBehavior")
            .field("init", &self.init.is_some())
            .field("feedback", &self.feedback.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum FunctionKind {
    /// Root of the fixed point: turns a Type input into a constant function.
    ConstantGenerator,
    /// Value is set at construction; feedback overwrites it.
    Constant,
    /// Declared by a library source, waiting for `install_func`.
    Uninstalled,
    /// Subroutine input slot, bound on invocation.
    Input,
    Host(HostBehavior),
    /// Invokes the branches stored on the defining term.
    Subroutine,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// Declared input types, in order
    pub inputs: Vec<TermId>,
    /// When set, the last declared input type repeats
    pub variadic: bool,
    /// Declared output type; `None` means no output
    pub output: Option<TermId>,
    pub stateful: bool,
    pub kind: FunctionKind,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            variadic: false,
            output: None,
            stateful: false,
            kind: FunctionKind::Uninstalled,
        }
    }

    pub fn with_inputs(mut self, inputs: impl Into<Vec<TermId>>) -> Self {
        self.inputs = inputs.into();
        self
    }

    pub fn with_output(mut self, output: TermId) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_kind(mut self, kind: FunctionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn has_feedback(&self) -> bool {
        match &self.kind {
            FunctionKind::Constant => true,
            FunctionKind::Host(behavior) => behavior.has_feedback(),
            _ => false,
        }
    }

    pub fn is_installed(&self) -> bool {
        !matches!(self.kind, FunctionKind::Uninstalled)
    }

    /// Declared type expected at input position `index`.
    pub fn input_type(&self, index: usize) -> Option<TermId> {
        match self.inputs.get(index) {
            Some(ty) => Some(*ty),
            None if self.variadic => self.inputs.last().copied(),
            None => None,
        }
    }
}

/// Signature handed to `KernelBuilder::declare_function`.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub inputs: Vec<TermId>,
    pub output: Option<TermId>,
    pub stateful: bool,
    pub variadic: bool,
}

impl Signature {
    pub fn new(inputs: impl Into<Vec<TermId>>, output: Option<TermId>) -> Self {
        Self {
            inputs: inputs.into(),
            output,
            stateful: false,
            variadic: false,
        }
    }

    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub(crate) fn into_function(self, name: &str) -> Function {
        Function {
            name: name.to_string(),
            inputs: self.inputs,
            variadic: self.variadic,
            output: self.output,
            stateful: self.stateful,
            kind: FunctionKind::Uninstalled,
        }
    }
}
