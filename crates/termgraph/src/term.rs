//! Graph nodes.

use smallvec::SmallVec;

use crate::ids::TermId;
use crate::subroutine::Subroutine;
use crate::value::Value;

/// A single value-producing operation.
///
/// All cross-references (`function`, `inputs`, `users`, `ty`) are ids into
/// the owning unit's arena, or into the kernel unit beneath it.
#[derive(Debug, Clone)]
pub struct Term {
    pub id: TermId,
    /// Term whose value is this term's [`Function`](crate::Function)
    pub function: TermId,
    pub inputs: SmallVec<[TermId; 4]>,
    pub value: Option<Value>,
    pub ty: Option<TermId>,
    pub name: Option<String>,
    /// Persistent state, allocated by the function's `init`
    pub state: Option<Value>,
    /// Branches, present only on subroutine-defining terms
    pub subroutine: Option<Box<Subroutine>>,
    /// Terms that read this one as an input
    pub(crate) users: SmallVec<[TermId; 2]>,
    pub(crate) dirty: bool,
    /// Stateful function, or a volatile input: recomputed every pass
    pub(crate) volatile: bool,
    pub(crate) evaluated_in: Option<u64>,
}

impl Term {
    pub(crate) fn new(id: TermId, function: TermId, inputs: SmallVec<[TermId; 4]>) -> Self {
        Self {
            id,
            function,
            inputs,
            value: None,
            ty: None,
            name: None,
            state: None,
            subroutine: None,
            users: SmallVec::new(),
            dirty: true,
            volatile: false,
            evaluated_in: None,
        }
    }

    pub fn users(&self) -> &[TermId] {
        &self.users
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.id),
            None => self.id.to_string(),
        }
    }
}
