//! Term-graph execution kernel.
//!
//! A program is a graph of [`Term`]s owned by a [`CodeUnit`]. Every term is
//! bound to a [`Function`] that is itself the value of another term, and
//! every type is a term too. The kernel bootstraps that self-describing
//! Function/Type system from nothing, then evaluates terms on demand with
//! persistent per-term state, pushes desired values backwards through
//! feedback, and invokes user-defined subroutines.
//!
//! ```no_run
//! use termgraph::{CodeUnit, Kernel, Value};
//!
//! # fn main() -> termgraph::Result<()> {
//! let kernel = Kernel::shared()?;
//! let mut unit = CodeUnit::new(kernel);
//! let a = unit.wrap(Some("a"), 3_i64)?;
//! let b = unit.wrap(Some("b"), 4_i64)?;
//! let sum = unit.apply("add", &[a, b], Some("sum"))?;
//! assert_eq!(unit.evaluate(sum)?, Value::Int(7));
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod bridge;
pub mod builtins;
pub mod code_unit;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod feedback;
pub mod function;
pub mod ids;
pub mod kernel;
pub mod library;
pub mod snapshot;
pub mod subroutine;
pub mod term;
pub mod value;

pub use bootstrap::{Bootstrap, BootstrapStep, FixedPoint};
pub use bridge::{HostType, HostValue, TypeTable};
pub use builtins::StandardLibrary;
pub use code_unit::CodeUnit;
pub use config::KernelConfig;
pub use context::TermContext;
pub use diagnostics::{ChangeCause, ChangeEvent, ChangeLog};
pub use error::{KernelError, Result, StructuralError};
pub use function::{Function, FunctionKind, HostBehavior, Signature};
pub use ids::{TermId, UnitId};
pub use kernel::{Kernel, KernelBuilder, KernelTerms};
pub use library::{DeclarationSource, LibrarySource};
pub use snapshot::UnitSnapshot;
pub use subroutine::{Branch, Subroutine, SubroutineBuilder, SubroutineState};
pub use term::Term;
pub use value::{HostOpaque, TypeDef, Value};
