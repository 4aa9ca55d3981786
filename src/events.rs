//! Notifications sent to observers of a [`Buffer`](crate::Buffer) as its content changes
//!
//! Every edit produces the same sequence of events: a single [`BeginEdit`], then a
//! [`BeginModify`] / [`EndModify`] pair for each modification, and finally a single [`EndEdit`].
//!
//! `BeginEdit` is sent *before* the buffer's write lock is acquired, which gives long-running
//! readers on other threads the chance to stop early instead of holding up the edit. The modify
//! events are sent while the write lock is held, so observers must not try to lock the buffer
//! from inside of them; `EndEdit` is sent after the lock has been released again.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::text::{EditKind, EditSource, Modification, PatchRange};

/// Sent at the start of an edit, before the buffer is locked
#[derive(Copy, Clone, Debug)]
pub struct BeginEdit {
    pub kind: EditKind,
    pub source: EditSource,
}

/// Sent before each modification is applied
#[derive(Copy, Clone, Debug)]
pub struct BeginModify<'a> {
    pub position: usize,
    pub erase_len: usize,
    pub insert: &'a [u8],
}

/// Sent after each modification has been applied
#[derive(Copy, Clone, Debug)]
pub struct EndModify<'a> {
    pub position: usize,
    pub erased: &'a [u8],
    pub inserted: &'a [u8],
}

/// Sent at the end of an edit, after the buffer has been unlocked
///
/// `positions` gives the affected ranges in the form expected by the
/// [`PositionPatcher`](crate::text::PositionPatcher).
#[derive(Clone, Debug)]
pub struct EndEdit {
    pub kind: EditKind,
    pub source: EditSource,
    pub modifications: Vec<Modification>,
    pub positions: Vec<PatchRange>,
}

/// Something that wants to know about changes to a buffer
///
/// All of the methods default to doing nothing, so implementors only need to provide the ones
/// they're interested in.
pub trait EditObserver: Send + Sync {
    fn begin_edit(&self, _event: &BeginEdit) {}
    fn begin_modify(&self, _event: &BeginModify) {}
    fn end_modify(&self, _event: &EndModify) {}
    fn end_edit(&self, _event: &EndEdit) {}
}

/// A unique identifier for a subscription, used to unsubscribe
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The set of observers subscribed to a single buffer
#[derive(Default)]
pub(crate) struct Observers {
    inner: Mutex<ObserverList>,
}

#[derive(Default)]
struct ObserverList {
    next_id: u64,
    list: Vec<(ListenerId, Arc<dyn EditObserver>)>,
}

impl Observers {
    pub fn subscribe(&self, observer: Arc<dyn EditObserver>) -> ListenerId {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.list.push((id, observer));
        id
    }

    /// Removes the observer, returning whether it was subscribed
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.list.len();
        inner.list.retain(|(i, _)| *i != id);
        inner.list.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.lock().list.len()
    }

    /// Calls `f` on every observer
    ///
    /// The list is copied out first, so observers are free to subscribe or unsubscribe from
    /// inside of `f`.
    pub fn emit(&self, f: impl Fn(&dyn EditObserver)) {
        let observers: Vec<_> = self
            .inner
            .lock()
            .list
            .iter()
            .map(|(_, o)| o.clone())
            .collect();

        for o in observers {
            f(&*o);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BeginEdit, EditObserver, Observers};
    use crate::text::{EditKind, EditSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl EditObserver for Counter {
        fn begin_edit(&self, _: &BeginEdit) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let observers = Observers::default();
        let counter = Arc::new(Counter::default());

        let id = observers.subscribe(counter.clone());
        let event = BeginEdit {
            kind: EditKind::Normal,
            source: EditSource::UNKNOWN,
        };
        observers.emit(|o| o.begin_edit(&event));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.emit(|o| o.begin_edit(&event));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(observers.len(), 0);
    }
}
