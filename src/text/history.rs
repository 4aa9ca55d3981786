//! Linear undo/redo history
//!
//! The primary export of this module is the [`History`] struct: a single list of edits, along with
//! the position in that list that the text currently corresponds to. When new changes are made
//! from a point back in the history, all changes that had previously occurred after that are
//! discarded.

use super::Edit;

/// A linear list of edits that can be undone and redone
#[derive(Debug, Default)]
pub struct History {
    edits: Vec<Edit>,
    /// The first index in `edits` that isn't currently applied. This is equal to `edits.len()` if
    /// there's nothing to redo.
    current: usize,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    /// Records a newly applied edit, discarding anything that could have been redone
    pub fn push(&mut self, edit: Edit) {
        if self.current < self.edits.len() {
            log::debug!(
                "discarding {} undone edit(s) from history",
                self.edits.len() - self.current
            );
        }

        self.edits.truncate(self.current);
        self.edits.push(edit);
        self.current += 1;
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current < self.edits.len()
    }

    /// Moves back by one edit, returning the edit that must now be reversed
    pub fn step_back(&mut self) -> Option<&Edit> {
        self.current = self.current.checked_sub(1)?;
        Some(&self.edits[self.current])
    }

    /// Moves forward by one edit, returning the edit that must now be re-applied
    pub fn step_forward(&mut self) -> Option<&Edit> {
        let edit = self.edits.get(self.current)?;
        self.current += 1;
        Some(edit)
    }

    /// Returns the total number of edits stored, including those that have been undone
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Returns the number of edits currently applied
    pub fn current(&self) -> usize {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use crate::text::{Edit, Modification};

    fn edit(position: usize) -> Edit {
        let mut e = Edit::new();
        e.push(Modification {
            position,
            removed: Vec::new(),
            added: b"x".to_vec(),
        });
        e
    }

    #[test]
    fn undo_redo_cursor() {
        let mut history = History::new();
        assert!(!history.can_undo());
        assert!(history.step_back().is_none());

        history.push(edit(0));
        history.push(edit(1));
        assert_eq!((history.current(), history.len()), (2, 2));
        assert!(history.step_forward().is_none());

        assert_eq!(history.step_back(), Some(&edit(1)));
        assert_eq!(history.step_back(), Some(&edit(0)));
        assert!(history.step_back().is_none());
        assert_eq!(history.current(), 0);

        assert_eq!(history.step_forward(), Some(&edit(0)));
        assert!(history.can_redo());
    }

    #[test]
    fn push_truncates_redo() {
        let mut history = History::new();
        history.push(edit(0));
        history.push(edit(1));
        history.step_back();

        history.push(edit(5));
        assert_eq!((history.current(), history.len()), (2, 2));
        assert!(!history.can_redo());
        assert_eq!(history.step_back(), Some(&edit(5)));
    }
}
