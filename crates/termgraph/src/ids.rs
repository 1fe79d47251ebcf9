//! Stable identifiers for terms and code units.
//!
//! Cross-references inside the graph (function references, inputs, users)
//! are always `TermId`s into an arena, never direct references.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identity of a term.
///
/// Allocated from 1 and strictly increasing. A unit built over a kernel
/// continues the kernel's sequence, so ids never collide between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u32);

impl TermId {
    pub const FIRST: Self = Self(1);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub Ulid);

impl UnitId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_ids_increase() {
        let first = TermId::FIRST;
        let second = first.next();

        assert!(second > first);
        assert_eq!(second.raw(), 2);
        assert_eq!(second.to_string(), "#2");
    }

    #[test]
    fn unit_ids_are_distinct() {
        assert_ne!(UnitId::new(), UnitId::new());
    }
}
