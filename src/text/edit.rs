//! Types describing changes to a buffer's content
//!
//! The unit of change is the [`Modification`]: a single replacement of some bytes at a position.
//! Modifications are grouped into [`Edit`]s, which are applied (and undone) atomically.

use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};

/// A single replacement of bytes in the text
///
/// `position` is the index of the first removed (or added) byte, at the time the modification was
/// made -- i.e. after all previous modifications in the same edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modification {
    pub position: usize,
    pub removed: Vec<u8>,
    pub added: Vec<u8>,
}

impl Modification {
    /// Returns the modification that exactly reverses this one
    pub fn inverse(&self) -> Modification {
        Modification {
            position: self.position,
            removed: self.added.clone(),
            added: self.removed.clone(),
        }
    }

    /// Returns the change in the length of the text caused by the modification
    pub fn diff(&self) -> isize {
        self.added.len() as isize - self.removed.len() as isize
    }
}

/// An ordered group of modifications, treated as one unit in the undo history
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Edit {
    // Most edits come from a single insertion or deletion
    modifications: SmallVec<[Modification; 1]>,
}

impl Edit {
    pub fn new() -> Self {
        Edit::default()
    }

    pub fn push(&mut self, modification: Modification) {
        self.modifications.push(modification);
    }

    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Produces the modifications that -- when applied in order -- undo the edit
    pub fn inverse(&self) -> Vec<Modification> {
        self.modifications.iter().rev().map(Modification::inverse).collect()
    }
}

/// The reason for an edit
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EditKind {
    /// An ordinary change, recorded in the undo history
    Normal,
    /// Undoing a previous edit
    Undo,
    /// Redoing an undone edit
    Redo,
    /// A change that originated outside of this process (e.g. the file changing on disk). These
    /// are recorded in the history as well.
    External,
}

impl EditKind {
    /// Returns whether edits of this kind are appended to the history when they end
    pub fn is_recorded(self) -> bool {
        matches!(self, EditKind::Normal | EditKind::External)
    }
}

impl Display for EditKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let s = match self {
            EditKind::Normal => "normal",
            EditKind::Undo => "undo",
            EditKind::Redo => "redo",
            EditKind::External => "external",
        };

        f.write_str(s)
    }
}

/// An opaque tag identifying who is responsible for an edit
///
/// Observers can use this to ignore their own edits. Values other than the constants defined here
/// are up to the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EditSource(pub u32);

impl EditSource {
    pub const UNKNOWN: EditSource = EditSource(0);

    /// The source used for edits made by undo and redo
    pub const HISTORY: EditSource = EditSource(1);
}

#[cfg(test)]
mod tests {
    use super::{Edit, EditKind, Modification};

    fn m(position: usize, removed: &str, added: &str) -> Modification {
        Modification {
            position,
            removed: removed.into(),
            added: added.into(),
        }
    }

    #[test]
    fn inverse_reverses_order() {
        let mut edit = Edit::new();
        edit.push(m(2, "ab", "xyz"));
        edit.push(m(10, "", "Q"));

        assert_eq!(edit.inverse(), vec![m(10, "Q", ""), m(2, "xyz", "ab")]);
        assert_eq!(edit.modifications()[0].diff(), 1);
    }

    #[test]
    fn recorded_kinds() {
        assert!(EditKind::Normal.is_recorded());
        assert!(EditKind::External.is_recorded());
        assert!(!EditKind::Undo.is_recorded());
        assert!(!EditKind::Redo.is_recorded());
    }
}
