//! Change log for debugging.
//!
//! Answers "why did this term's value change?" when recording is enabled.

use serde::Serialize;

use crate::ids::TermId;
use crate::value::Value;

/// What caused a value change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeCause {
    Evaluate,
    Feedback,
    /// A subroutine placeholder bound to an argument
    Bind,
    /// State dropped for re-init
    Reset,
}

/// A recorded change event
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub sequence: u64,
    pub term: TermId,
    pub cause: ChangeCause,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

#[derive(Debug, Default)]
pub struct ChangeLog {
    /// Enable detailed tracking
    pub enabled: bool,
    events: Vec<ChangeEvent>,
    next_sequence: u64,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Records a change. Writes that leave the value unchanged are skipped.
    pub fn record(
        &mut self,
        term: TermId,
        cause: ChangeCause,
        old_value: Option<&Value>,
        new_value: Option<&Value>,
    ) {
        if !self.enabled || old_value == new_value {
            return;
        }
        self.events.push(ChangeEvent {
            sequence: self.next_sequence,
            term,
            cause,
            old_value: old_value.cloned(),
            new_value: new_value.cloned(),
        });
        self.next_sequence += 1;
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn changes_for(&self, term: TermId) -> Vec<&ChangeEvent> {
        self.events.iter().filter(|e| e.term == term).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_log_records_nothing() {
        let mut log = ChangeLog::new();
        log.record(TermId(1), ChangeCause::Evaluate, None, Some(&Value::int(1)));
        assert!(log.events().is_empty());
    }

    #[test]
    fn unchanged_values_are_skipped() {
        let mut log = ChangeLog::new();
        log.enable();

        log.record(TermId(1), ChangeCause::Evaluate, None, Some(&Value::int(1)));
        log.record(
            TermId(1),
            ChangeCause::Evaluate,
            Some(&Value::int(1)),
            Some(&Value::int(1)),
        );
        log.record(
            TermId(2),
            ChangeCause::Feedback,
            Some(&Value::int(1)),
            Some(&Value::int(2)),
        );

        assert_eq!(log.events().len(), 2);
        assert_eq!(log.changes_for(TermId(2))[0].sequence, 1);
        assert_eq!(log.changes_for(TermId(2))[0].cause, ChangeCause::Feedback);
    }
}
