//! Wrapper module for [`Buffer`], the editable document
//!
//! All changes to a buffer go through a [`Modifier`], created by [`Buffer::begin`]. The modifier
//! holds the buffer's write lock until the edit is finished, so that other threads only ever see
//! the content from entirely before or entirely after an edit.
//!
//! A typical edit looks like this:
//!
//! ```no_run
//! # use chunktext::{BufferManager, text::{EditKind, EditSource}};
//! let manager = BufferManager::default();
//! let buffer = manager.create_with(b"hello world".to_vec());
//!
//! let mut m = buffer.begin(EditKind::Normal, EditSource::UNKNOWN);
//! m.modify(0, 5, b"goodbye");
//! // Positions given to `modify` refer to the text from before the edit started:
//! m.modify(6, 5, b"moon");
//! m.end();
//!
//! assert_eq!(buffer.to_vec(), b"goodbye moon");
//! ```

use std::any::Any;
use std::fmt::{self, Display, Formatter};
use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::Mutex;

use crate::events::{
    BeginEdit, BeginModify, EditObserver, EndEdit, EndModify, ListenerId, Observers,
};
use crate::lock::{Lock, ReadGuard, WriteGuard};
use crate::manager::{ManagerInner, TagSlot};
use crate::text::{
    ChunkLimits, ChunkTree, Edit, EditKind, EditSource, History, Modification, PatchRange,
};

/// The identity of a buffer, used by the [`BufferManager`](crate::BufferManager) to avoid
/// opening the same file twice
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferId {
    Path(PathBuf),
    Unnamed(u32),
}

impl Display for BufferId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            BufferId::Path(p) => write!(f, "{}", p.display()),
            BufferId::Unnamed(n) => write!(f, "[unnamed #{}]", n),
        }
    }
}

/// The lockable content of a [`Buffer`]
#[derive(Debug)]
pub struct Content {
    chunks: ChunkTree,
    history: History,
}

impl Content {
    pub fn chunks(&self) -> &ChunkTree {
        &self.chunks
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}

type Tag = Box<dyn Any + Send + Sync>;

/// A single document, shared between any number of threads
///
/// Buffers are created by a [`BufferManager`](crate::BufferManager) and are always handled
/// through an `Arc`. Once the last reference is dropped, the manager forgets about the buffer.
pub struct Buffer {
    id: BufferId,
    content: Lock<Content>,
    observers: Observers,
    tags: Mutex<Vec<Option<Tag>>>,
    manager: Weak<ManagerInner>,
}

impl Buffer {
    pub(crate) fn new(
        id: BufferId,
        bytes: &[u8],
        limits: ChunkLimits,
        manager: Weak<ManagerInner>,
    ) -> Buffer {
        log::debug!("creating buffer {} with {} bytes", id, bytes.len());

        Buffer {
            id,
            content: Lock::new(Content {
                chunks: ChunkTree::from_bytes(bytes, limits),
                history: History::new(),
            }),
            observers: Observers::default(),
            tags: Mutex::new(Vec::new()),
            manager,
        }
    }

    pub fn id(&self) -> &BufferId {
        &self.id
    }

    /// Acquires shared read access to the content of the buffer
    ///
    /// ## Panics
    ///
    /// This method panics if called from a thread that's in the middle of an edit to this
    /// buffer; use [`Modifier::content`] instead.
    pub fn read(&self) -> ReadGuard<Content> {
        self.content.read()
    }

    /// Returns the length of the buffer, in bytes
    pub fn len(&self) -> usize {
        self.read().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the entire content of the buffer
    pub fn to_vec(&self) -> Vec<u8> {
        self.read().chunks.to_vec()
    }

    pub fn subscribe(&self, observer: Arc<dyn EditObserver>) -> ListenerId {
        self.observers.subscribe(observer)
    }

    /// Removes an observer, returning whether it was subscribed
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Returns the number of observers currently subscribed
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Starts a new edit, blocking until the buffer can be locked
    ///
    /// Observers are sent [`BeginEdit`] *before* this blocks.
    ///
    /// Undo and redo edits can only be made through [`undo`](Self::undo) and
    /// [`redo`](Self::redo), which keep the history in step with the content.
    ///
    /// ## Panics
    ///
    /// This method panics if `kind` is [`EditKind::Undo`] or [`EditKind::Redo`], or if the current
    /// thread is already editing this buffer. Calling this while the current thread holds a read
    /// guard for the buffer deadlocks.
    pub fn begin(&self, kind: EditKind, source: EditSource) -> Modifier {
        assert!(
            kind.is_recorded(),
            "{}: {} edits can only be made through the buffer's history",
            self.id,
            kind
        );

        self.begin_unchecked(kind, source)
    }

    /// (*Internal*) Starts an edit of any kind, including those from the history
    fn begin_unchecked(&self, kind: EditKind, source: EditSource) -> Modifier {
        self.observers
            .emit(|o| o.begin_edit(&BeginEdit { kind, source }));

        let guard = self.content.write();
        log::debug!("{}: starting {} edit", self.id, kind);

        Modifier {
            buffer: self,
            guard: Some(guard),
            kind,
            source,
            edit: Edit::new(),
            diff: 0,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.read().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.read().history.can_redo()
    }

    /// Undoes the most recent edit, returning false if there was nothing to undo
    ///
    /// If the edit is undone by someone else while this is waiting for the lock, observers still
    /// see an undo edit begin and end, with no modifications in between.
    pub fn try_undo(&self) -> bool {
        if !self.can_undo() {
            return false;
        }

        let mut m = self.begin_unchecked(EditKind::Undo, EditSource::HISTORY);
        // Something else could have undone the last edit while we were waiting for the lock
        let inverse = match m.history_mut().step_back() {
            Some(edit) => edit.inverse(),
            None => {
                log::debug!("{}: history was undone by someone else first", self.id);
                m.end_custom();
                return false;
            }
        };

        for mm in inverse {
            m.modify_nofixup(mm.position, mm.removed.len(), &mm.added);
        }

        m.end_custom();
        true
    }

    /// Redoes the most recently undone edit, returning false if there was nothing to redo
    pub fn try_redo(&self) -> bool {
        if !self.can_redo() {
            return false;
        }

        let mut m = self.begin_unchecked(EditKind::Redo, EditSource::HISTORY);
        let modifications = match m.history_mut().step_forward() {
            Some(edit) => edit.modifications().to_vec(),
            None => {
                log::debug!("{}: history was redone by someone else first", self.id);
                m.end_custom();
                return false;
            }
        };

        for mm in modifications {
            m.modify_nofixup(mm.position, mm.removed.len(), &mm.added);
        }

        m.end_custom();
        true
    }

    /// Undoes the most recent edit
    ///
    /// ## Panics
    ///
    /// This method panics if there is nothing to undo.
    pub fn undo(&self) {
        assert!(self.try_undo(), "{}: nothing to undo", self.id);
    }

    /// Redoes the most recently undone edit
    ///
    /// ## Panics
    ///
    /// This method panics if there is nothing to redo.
    pub fn redo(&self) {
        assert!(self.try_redo(), "{}: nothing to redo", self.id);
    }

    /// Stores a value in the tag slot, returning the previous one
    pub fn set_tag<T: Any + Send + Sync>(&self, slot: TagSlot, value: T) -> Option<Tag> {
        let mut tags = self.tags.lock();
        let idx = slot.index();
        if tags.len() <= idx {
            tags.resize_with(idx + 1, || None);
        }

        mem::replace(&mut tags[idx], Some(Box::new(value)))
    }

    /// Calls `f` with the value in the tag slot, if there is one and it has type `T`
    ///
    /// All of the buffer's tags are locked while `f` runs.
    pub fn with_tag<T: Any, R>(&self, slot: TagSlot, f: impl FnOnce(Option<&mut T>) -> R) -> R {
        let mut tags = self.tags.lock();
        let value = tags
            .get_mut(slot.index())
            .and_then(|t| t.as_mut())
            .and_then(|t| t.downcast_mut::<T>());
        f(value)
    }

    /// Removes the value from the tag slot
    pub fn take_tag(&self, slot: TagSlot) -> Option<Tag> {
        self.tags.lock().get_mut(slot.index()).and_then(Option::take)
    }

    /// Removes the values in a tag slot that's being released
    pub(crate) fn clear_tag(&self, slot: TagSlot) {
        drop(self.take_tag(slot));
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        log::debug!("dropping buffer {}", self.id);
        if let Some(manager) = self.manager.upgrade() {
            manager.forget(&self.id);
        }
    }
}

/// An in-progress edit to a [`Buffer`]
///
/// The buffer stays write-locked for as long as the `Modifier` exists. Edits can't be cancelled
/// once they've begun: dropping a `Modifier` without calling [`end`] finishes the edit just as
/// `end` would have.
///
/// [`end`]: Self::end
pub struct Modifier<'a> {
    buffer: &'a Buffer,
    // Always `Some` until the edit is finished
    guard: Option<WriteGuard<'a, Content>>,
    kind: EditKind,
    source: EditSource,
    edit: Edit,
    /// The total change in length from the modifications so far
    diff: isize,
}

impl Modifier<'_> {
    fn guard(&self) -> &WriteGuard<Content> {
        self.guard.as_ref().expect("modifier used after it was finished")
    }

    fn history_mut(&mut self) -> &mut History {
        &mut self
            .guard
            .as_mut()
            .expect("modifier used after it was finished")
            .history
    }

    pub fn kind(&self) -> EditKind {
        self.kind
    }

    pub fn source(&self) -> EditSource {
        self.source
    }

    /// Returns the current content of the buffer, including the modifications made so far
    pub fn content(&self) -> &ChunkTree {
        &self.guard().chunks
    }

    /// Returns the amount positions from before the edit need to be shifted by to account for
    /// the modifications so far
    pub fn fixup_offset(&self) -> isize {
        self.diff
    }

    /// Replaces `erase_len` bytes at `position` with `insert`
    ///
    /// `position` refers to the text from before the edit started; it's shifted by the
    /// [`fixup_offset`] before being applied. This only works as expected when modifications are
    /// made in increasing order of position. For positions that are already relative to the
    /// current content, use [`modify_nofixup`].
    ///
    /// ## Panics
    ///
    /// This method panics if the shifted range doesn't fit within the current content.
    ///
    /// [`fixup_offset`]: Self::fixup_offset
    /// [`modify_nofixup`]: Self::modify_nofixup
    pub fn modify(&mut self, position: usize, erase_len: usize, insert: &[u8]) {
        let adjusted = position as isize + self.diff;
        assert!(
            adjusted >= 0,
            "position {} shifted by {} is before the start of the buffer",
            position,
            self.diff
        );

        self.modify_nofixup(adjusted as usize, erase_len, insert);
    }

    /// Replaces `erase_len` bytes at `position` in the current content with `insert`
    ///
    /// ## Panics
    ///
    /// This method panics if the range doesn't fit within the current content.
    pub fn modify_nofixup(&mut self, position: usize, erase_len: usize, insert: &[u8]) {
        let buffer = self.buffer;
        let content = self
            .guard
            .as_mut()
            .expect("modifier used after it was finished");

        let len = content.chunks.len();
        let end = position
            .checked_add(erase_len)
            .filter(|&e| e <= len)
            .unwrap_or_else(|| {
                panic!(
                    "{}: modification of {} bytes at {} is out of bounds for length {}",
                    buffer.id, erase_len, position, len
                )
            });

        if erase_len == 0 && insert.is_empty() {
            return;
        }

        buffer.observers.emit(|o| {
            o.begin_modify(&BeginModify {
                position,
                erase_len,
                insert,
            })
        });

        let removed = content.chunks.clip(position..end);
        content.chunks.erase(position..end);
        content.chunks.insert(position, insert);
        self.diff += insert.len() as isize - erase_len as isize;

        log::trace!(
            "{}: replaced {} bytes at {} with {}",
            buffer.id,
            erase_len,
            position,
            insert.len()
        );

        buffer.observers.emit(|o| {
            o.end_modify(&EndModify {
                position,
                erased: &removed,
                inserted: insert,
            })
        });

        self.edit.push(Modification {
            position,
            removed,
            added: insert.to_vec(),
        });
    }

    /// Finishes the edit, adding it to the buffer's history
    ///
    /// Edits without any modifications aren't recorded. Edits of kinds that aren't recorded
    /// (i.e. undo and redo) are finished as with [`end_custom`](Self::end_custom).
    pub fn end(mut self) {
        self.finish(self.kind.is_recorded(), true);
    }

    /// Finishes the edit without adding it to the history
    pub(crate) fn end_custom(mut self) {
        self.finish(false, true);
    }

    fn finish(&mut self, record: bool, notify: bool) {
        let mut guard = match self.guard.take() {
            Some(g) => g,
            None => return,
        };

        let edit = mem::take(&mut self.edit);
        let modifications = edit.modifications().to_vec();

        if record {
            match edit.is_empty() {
                true => log::warn!("{}: not recording empty {} edit", self.buffer.id, self.kind),
                false => guard.history.push(edit),
            }
        }

        drop(guard);
        log::debug!(
            "{}: finished {} edit with {} modification(s)",
            self.buffer.id,
            self.kind,
            modifications.len()
        );

        if notify {
            let event = EndEdit {
                kind: self.kind,
                source: self.source,
                positions: PatchRange::from_applied(&modifications),
                modifications,
            };
            self.buffer.observers.emit(|o| o.end_edit(&event));
        }
    }
}

impl Drop for Modifier<'_> {
    fn drop(&mut self) {
        if self.guard.is_none() {
            return;
        }

        // Whatever was applied before a panic stays applied, so it still needs to be in the
        // history. Observers aren't told about it.
        match thread::panicking() {
            true => self.finish(self.kind.is_recorded(), false),
            false => {
                log::debug!("{}: edit finished by drop", self.buffer.id);
                self.finish(self.kind.is_recorded(), true);
            }
        }
    }
}
