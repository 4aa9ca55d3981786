//! Wrapper module for [`BufferManager`]
//!
//! The manager is the shared context that buffers are created through. It makes sure that each
//! path is only ever open in a single [`Buffer`], gives out the ids for unnamed buffers, hands out
//! the [`TagSlot`]s that let independent users attach their own values to buffers, and stores the
//! [`Config`] that new buffers are created with.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::buffer::{Buffer, BufferId};
use crate::config::Config;

/// A handle to the per-buffer tag storage, allocated by [`BufferManager::allocate_tag_slot`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TagSlot(usize);

impl TagSlot {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// The registry of open buffers
///
/// Cloning a `BufferManager` gives another handle to the same registry.
#[derive(Clone)]
pub struct BufferManager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    config: ArcSwap<Config>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    by_path: HashMap<PathBuf, Weak<Buffer>>,
    unnamed: HashMap<u32, Weak<Buffer>>,
    next_unnamed: u32,

    next_tag_slot: usize,
    free_tag_slots: Vec<TagSlot>,
}

impl Default for BufferManager {
    fn default() -> Self {
        BufferManager::new(Config::default())
    }
}

impl ManagerInner {
    /// Removes a buffer that's being dropped
    ///
    /// The entry is only removed if nothing else has replaced it in the meantime.
    pub(crate) fn forget(&self, id: &BufferId) {
        let mut state = self.state.lock();
        let map_entry = match id {
            BufferId::Path(p) => state.by_path.get(p),
            BufferId::Unnamed(n) => state.unnamed.get(n),
        };

        if map_entry.map(|w| w.strong_count() == 0) != Some(true) {
            return;
        }

        match id {
            BufferId::Path(p) => drop(state.by_path.remove(p)),
            BufferId::Unnamed(n) => drop(state.unnamed.remove(n)),
        }
        log::debug!("forgot buffer {}", id);
    }
}

impl BufferManager {
    pub fn new(config: Config) -> Self {
        BufferManager {
            inner: Arc::new(ManagerInner {
                config: ArcSwap::from_pointee(config),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Returns the current configuration
    pub fn config(&self) -> Arc<Config> {
        self.inner.config.load_full()
    }

    /// Replaces the configuration
    ///
    /// Buffers that are already open keep the chunk limits they were created with.
    pub fn set_config(&self, config: Config) {
        self.inner.config.store(Arc::new(config));
    }

    fn new_buffer(&self, id: BufferId, bytes: &[u8]) -> Arc<Buffer> {
        let limits = self.inner.config.load().chunk_limits();
        Arc::new(Buffer::new(id, bytes, limits, Arc::downgrade(&self.inner)))
    }

    /// Returns the buffer for the path, loading it if it isn't already open
    ///
    /// `load` is only called if there isn't an open buffer for the path. Paths are compared
    /// exactly as given; callers wanting to treat different spellings of the same file as equal
    /// should canonicalize them first.
    ///
    /// ## Errors
    ///
    /// Any error from `load` is returned unchanged.
    pub fn open(
        &self,
        path: &Path,
        load: impl FnOnce(&Path) -> io::Result<Vec<u8>>,
    ) -> io::Result<Arc<Buffer>> {
        if let Some(buf) = self.get(path) {
            return Ok(buf);
        }

        // Loading happens without the lock held, so someone else may have opened the same path in
        // the meantime. If so, theirs wins.
        let bytes = load(path)?;

        let mut state = self.inner.state.lock();
        if let Some(buf) = state.by_path.get(path).and_then(Weak::upgrade) {
            log::debug!("'{}' was opened concurrently; discarding our copy", path.display());
            return Ok(buf);
        }

        let buf = self.new_buffer(BufferId::Path(path.to_owned()), &bytes);
        state.by_path.insert(path.to_owned(), Arc::downgrade(&buf));
        Ok(buf)
    }

    /// Returns the open buffer for the path, if there is one
    pub fn get(&self, path: &Path) -> Option<Arc<Buffer>> {
        self.inner
            .state
            .lock()
            .by_path
            .get(path)
            .and_then(Weak::upgrade)
    }

    /// Creates a new, empty unnamed buffer
    pub fn create(&self) -> Arc<Buffer> {
        self.create_with(Vec::new())
    }

    /// Creates a new unnamed buffer with the given content
    pub fn create_with(&self, bytes: Vec<u8>) -> Arc<Buffer> {
        let mut state = self.inner.state.lock();

        let mut n = state.next_unnamed;
        while state.unnamed.contains_key(&n) {
            n = n.wrapping_add(1);
        }
        state.next_unnamed = n.wrapping_add(1);

        let buf = self.new_buffer(BufferId::Unnamed(n), &bytes);
        state.unnamed.insert(n, Arc::downgrade(&buf));
        buf
    }

    /// Returns the number of buffers currently open
    pub fn buffer_count(&self) -> usize {
        let state = self.inner.state.lock();
        let alive = |w: &Weak<Buffer>| w.strong_count() > 0;
        state.by_path.values().filter(|w| alive(w)).count()
            + state.unnamed.values().filter(|w| alive(w)).count()
    }

    /// Returns every buffer that's currently open
    pub fn buffers(&self) -> Vec<Arc<Buffer>> {
        let state = self.inner.state.lock();
        state
            .by_path
            .values()
            .chain(state.unnamed.values())
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Allocates a new slot for attaching values to buffers
    pub fn allocate_tag_slot(&self) -> TagSlot {
        let mut state = self.inner.state.lock();
        if let Some(slot) = state.free_tag_slots.pop() {
            return slot;
        }

        let slot = TagSlot(state.next_tag_slot);
        state.next_tag_slot += 1;
        slot
    }

    /// Releases the slot, dropping any values stored in it
    pub fn release_tag_slot(&self, slot: TagSlot) {
        for buf in self.buffers() {
            buf.clear_tag(slot);
        }

        self.inner.state.lock().free_tag_slots.push(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::BufferManager;
    use crate::buffer::BufferId;
    use crate::config::Config;
    use std::io;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn paths_are_deduplicated() {
        let manager = BufferManager::default();
        let path = Path::new("some/file.txt");

        let a = manager.open(path, |_| Ok(b"contents".to_vec())).unwrap();
        let b = manager
            .open(path, |_| panic!("already open; shouldn't be loaded again"))
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.id(), &BufferId::Path(path.to_owned()));
        assert_eq!(a.to_vec(), b"contents");
        assert_eq!(manager.buffer_count(), 1);

        drop(a);
        assert!(manager.get(path).is_some());
        drop(b);
        assert!(manager.get(path).is_none());
        assert_eq!(manager.buffer_count(), 0);
    }

    #[test]
    fn load_errors_are_passed_through() {
        let manager = BufferManager::default();
        let err = manager
            .open(Path::new("missing"), |_| {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
            })
            .err()
            .unwrap();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(manager.buffer_count(), 0);
    }

    #[test]
    fn unnamed_ids_are_unique() {
        let manager = BufferManager::default();
        let a = manager.create();
        let b = manager.create();
        assert_ne!(a.id(), b.id());
        assert_eq!(manager.buffer_count(), 2);

        drop(a);
        assert_eq!(manager.buffer_count(), 1);
        assert_eq!(manager.buffers().len(), 1);
    }

    #[test]
    fn new_buffers_use_current_config() {
        let manager = BufferManager::default();
        let before = manager.create_with(vec![b'x'; 100]);

        manager.set_config(Config::from_yaml_str("max_chunk_size: 10").unwrap());
        let after = manager.create_with(vec![b'x'; 100]);

        assert_eq!(before.read().chunks().chunk_count(), 1);
        assert_eq!(after.read().chunks().chunk_count(), 10);
        assert_eq!(manager.config().max_chunk_size, 10);
    }

    #[test]
    fn tag_slots_are_reused() {
        let manager = BufferManager::default();
        let buffer = manager.create();

        let a = manager.allocate_tag_slot();
        let b = manager.allocate_tag_slot();
        assert_ne!(a, b);

        buffer.set_tag(a, "value");
        manager.release_tag_slot(a);
        assert!(buffer.take_tag(a).is_none());

        assert_eq!(manager.allocate_tag_slot(), a);
    }

    #[test]
    fn buffers_outlive_manager() {
        let manager = BufferManager::default();
        let buffer = manager.create_with(b"abc".to_vec());
        drop(manager);

        assert_eq!(buffer.to_vec(), b"abc");
    }
}
