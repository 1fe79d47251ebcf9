//! Kernel errors.
//!
//! - **Startup**: [`KernelError::BootstrapOrder`], [`KernelError::BootstrapIncomplete`],
//!   [`KernelError::LibraryLoad`] are fatal; the process has no usable kernel.
//! - **Construction**: [`KernelError::DuplicateName`], [`KernelError::NameNotFound`]
//!   leave the unit untouched and can be reported by the caller.
//! - **Structure**: [`KernelError::Structural`] rejects malformed terms and cycles.
//! - **Usage**: feedback, bridge and install errors surface misuse by the host.
//! - **Runtime**: [`KernelError::Evaluation`] and [`KernelError::ResourceExhausted`]
//!   abort the current `evaluate` call and name the originating term.

use thiserror::Error;

use crate::bootstrap::BootstrapStep;
use crate::bridge::HostType;
use crate::ids::TermId;

pub type Result<T> = std::result::Result<T, KernelError>;

#[derive(Debug, Error)]
pub enum KernelError {
    /// A fixed-point step was attempted before the steps it depends on.
    #[error("bootstrap step {attempted:?} attempted out of order, expected {expected:?}")]
    BootstrapOrder {
        attempted: BootstrapStep,
        expected: BootstrapStep,
    },

    /// The fixed point finished with an unresolved function reference or type.
    #[error("bootstrap left {term} unresolved: {reason}")]
    BootstrapIncomplete { term: TermId, reason: String },

    #[error("name `{0}` is already bound")]
    DuplicateName(String),

    #[error("name `{0}` not found")]
    NameNotFound(String),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("function `{function}` of {term} has no feedback behavior")]
    NoFeedbackSupport { term: TermId, function: String },

    #[error("host type {0} has no graph type mapping")]
    UnmappedType(HostType),

    #[error("function `{0}` already has a behavior installed")]
    AlreadyInstalled(String),

    #[error("type mapping for {0} already registered")]
    DuplicateMapping(String),

    /// The foreign-value table is read-only once the kernel is built.
    #[error("foreign-value type table is frozen")]
    TableFrozen,

    /// A function behavior failed while computing `term`.
    #[error("evaluation of {term} (`{function}`) failed")]
    Evaluation {
        term: TermId,
        function: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("evaluation depth limit {limit} exceeded at {term}")]
    ResourceExhausted { term: TermId, limit: usize },

    #[error("library `{library}` failed to load")]
    LibraryLoad {
        library: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Malformed graph structure, detected at construction or invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("unknown term {0}")]
    UnknownTerm(TermId),

    #[error("{0} belongs to a frozen library unit")]
    FrozenTerm(TermId),

    #[error("{0} does not hold a Function")]
    NotAFunction(TermId),

    #[error("{0} does not hold a Type")]
    NotAType(TermId),

    #[error("connecting {input} into {term} would create a cycle")]
    Cycle { term: TermId, input: TermId },

    #[error("`{function}` takes {expected} inputs, got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("`{function}` input {index} expects {expected}, got {found}")]
    InputType {
        function: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("{term} has no input {index}")]
    InputIndex { term: TermId, index: usize },

    #[error("value of kind {found} does not fit type {expected}")]
    ValueType { expected: String, found: &'static str },

    #[error("placeholder {0} is not bound")]
    Unbound(TermId),

    #[error("subroutine {subroutine} is not invocable: {reason}")]
    NotInvocable { subroutine: TermId, reason: String },

    #[error("subroutine {0} is already being invoked")]
    Reentrant(TermId),

    #[error("{0} does not define a subroutine")]
    NotSubroutine(TermId),

    #[error("unit has no kernel; bootstrap is incomplete")]
    MissingKernel,
}
