//! Utilities for a unique lock implementation
//!
//! The primary type defined here is [`Lock`], a reader/writer lock that keeps track of which
//! thread currently holds write access. Any buffer content is stored behind one of these: edits
//! hold the write lock for their entire duration, while any number of readers may share access
//! in between.
//!
//! Tracking the writing thread allows us to turn the most common deadlock -- a thread trying to
//! lock the content again while it's in the middle of an edit -- into an immediate panic.
//!
//! Additionally, a few type definitions surrounding the `RwLock`s provided by `parking_lot` are
//! provided.

use std::fmt::{self, Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RawRwLock};

/// A type identical to `parking_lot`'s `RwLock`
///
/// The type is defined here so that we might also define [read] and [write] guards.
///
/// [read]: RwLockReadGuard
/// [write]: RwLockWriteGuard
pub type RwLock<T> = lock_api::RwLock<RawRwLock, T>;
pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawRwLock, T>;
pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawRwLock, T>;

/// A reader/writer lock that knows which thread is writing
///
/// Read and write access behave as with a normal `RwLock`, except that attempting to acquire
/// either while the current thread already holds write access will panic instead of deadlocking.
/// Acquiring write access while the current thread holds *read* access still deadlocks; that
/// can't be detected without tracking every reader.
pub struct Lock<T> {
    /// The thread that currently holds the write guard, if any
    writer: Mutex<Option<ThreadId>>,
    inner: RwLock<T>,
}

/// A RAII structure around shared read access to a [`Lock`]
///
/// This is created by the [`read`](Lock::read) method.
pub struct ReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
}

/// A RAII structure around unique write access to a [`Lock`]
///
/// This is created by the [`write`](Lock::write) method.
pub struct WriteGuard<'a, T> {
    lock: &'a Lock<T>,
    guard: RwLockWriteGuard<'a, T>,
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        // The inner guard is only released after this, so no other writer can have set itself yet
        *self.lock.writer.lock() = None;
    }
}

impl<T> Lock<T> {
    /// Creates a new, unlocked `Lock` with the given value
    pub fn new(val: T) -> Self {
        Lock {
            writer: Mutex::new(None),
            inner: RwLock::new(val),
        }
    }

    /// (*Internal*) Panics if the current thread is holding the write lock
    fn check_not_writer(&self, action: &str) {
        if *self.writer.lock() == Some(thread::current().id()) {
            panic!(
                "deadlock: attempted to {} while this thread holds the write lock",
                action
            );
        }
    }

    /// Acquires shared read access, blocking while there's a writer
    ///
    /// ## Panics
    ///
    /// This method panics if the current thread holds the write lock.
    pub fn read(&self) -> ReadGuard<T> {
        self.check_not_writer("acquire a read lock");

        ReadGuard {
            guard: self.inner.read(),
        }
    }

    /// Attempts to acquire shared read access without blocking
    pub fn try_read(&self) -> Option<ReadGuard<T>> {
        let guard = self.inner.try_read()?;
        Some(ReadGuard { guard })
    }

    /// Acquires unique write access, blocking until all other guards have been released
    ///
    /// ## Panics
    ///
    /// This method panics if the current thread already holds the write lock.
    pub fn write(&self) -> WriteGuard<T> {
        self.check_not_writer("acquire a second write lock");

        let guard = self.inner.write();
        *self.writer.lock() = Some(thread::current().id());

        WriteGuard { lock: self, guard }
    }

    /// Returns whether any thread currently holds the write lock
    pub fn is_write_locked(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Gives direct access to the value, which is statically known to be unlocked
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Debug> Debug for Lock<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Lock")
            .field("writer", &*self.writer.lock())
            .field("inner", &self.inner)
            .finish()
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.deref_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::Lock;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn many_readers() {
        let lock = Lock::new(5);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a + *b, 10);
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn writer_is_tracked() {
        let lock = Lock::new(Vec::new());
        {
            let mut guard = lock.write();
            guard.push(1);
            assert!(lock.is_write_locked());
            assert!(lock.try_read().is_none());
        }

        assert!(!lock.is_write_locked());
        assert_eq!(*lock.read(), vec![1]);
    }

    #[test]
    #[should_panic(expected = "deadlock")]
    fn reentrant_write_panics() {
        let lock = Lock::new(());
        let _guard = lock.write();
        let _again = lock.write();
    }

    #[test]
    #[should_panic(expected = "deadlock")]
    fn read_while_writing_panics() {
        let lock = Lock::new(());
        let _guard = lock.write();
        let _read = lock.read();
    }

    #[test]
    fn writer_waits_for_readers() {
        let lock = Arc::new(Lock::new(0));
        let (tx, rx) = mpsc::channel();

        let read = lock.read();
        let handle = {
            let lock = lock.clone();
            thread::spawn(move || {
                *lock.write() = 1;
                tx.send(()).unwrap();
            })
        };

        // The writer can't proceed while we're still holding the read guard
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(*read, 0);
        drop(read);

        rx.recv().unwrap();
        handle.join().unwrap();
        assert_eq!(*lock.read(), 1);
    }
}
