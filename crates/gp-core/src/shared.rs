use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::event::{Diagnostics, Event};
use crate::session::Session;
use crate::view::StateView;

/// A [`Session`] shared between an ingesting writer and any number of
/// viewers.
///
/// Mutations (`append`, `set_focus`, `follow_latest`, `reset`,
/// `set_diagnostics`) serialize on one write lock. Views take the read lock
/// and return owned snapshots, so a reader sees the log either before or
/// after an append, never halfway. Every mutation is all-or-nothing, so a
/// poisoned lock still guards consistent data and is recovered.
#[derive(Clone, Debug)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, event: Event) -> Result<()> {
        self.write().append(event)
    }

    pub fn set_focus(&self, index: usize) -> Result<()> {
        self.write().set_focus(index)
    }

    pub fn follow_latest(&self) {
        self.write().follow_latest();
    }

    pub fn reset(&self) {
        self.write().reset();
    }

    pub fn set_diagnostics(&self, diagnostics: Diagnostics) {
        self.write().set_diagnostics(diagnostics);
    }

    pub fn view(&self) -> StateView {
        self.read().view()
    }

    pub fn view_at(&self, index: usize) -> Result<StateView> {
        self.read().view_at(index)
    }

    /// Run `f` against a consistent read snapshot.
    pub fn with<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.read())
    }

    /// Run `f` under the write lock.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.write())
    }
}
