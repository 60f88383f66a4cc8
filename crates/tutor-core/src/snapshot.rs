//! Atomically swappable read-only snapshots.
//!
//! Readers clone the current `Arc` under a short read lock and keep using it
//! for the whole search, so a concurrent `swap` never affects in-flight work.

use parking_lot::RwLock;
use std::sync::Arc;

pub struct SnapshotCell<T> {
    current: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn new(value: T) -> Self {
        Self { current: RwLock::new(Arc::new(value)) }
    }

    pub fn load(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Installs `value` and returns the previous snapshot.
    pub fn swap(&self, value: T) -> Arc<T> {
        std::mem::replace(&mut *self.current.write(), Arc::new(value))
    }
}
