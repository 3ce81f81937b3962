//! A grid store shared between threads.
//!
//! Every access goes through one mutex, so a batch opened and closed
//! inside a single `with`/`batch` call is atomic with respect to other
//! writers.

use qc_store::GridStore;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<GridStore>>,
}

impl SharedStore {
    pub fn new(store: GridStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// A listener that panicked while holding the lock leaves the store in a
    /// consistent state (mutations complete before notices go out), so a
    /// poisoned lock is recovered rather than propagated.
    pub fn with<R>(&self, f: impl FnOnce(&mut GridStore) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Run `f` inside a batch, holding the lock throughout.
    pub fn batch<R>(&self, f: impl FnOnce(&mut GridStore) -> R) -> R {
        self.with(|store| store.batch(f))
    }
}

impl fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStore").finish_non_exhaustive()
    }
}
