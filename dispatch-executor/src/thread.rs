use std::thread::{self, JoinHandle, ThreadId};

use log::trace;

use crate::error::SpawnError;

/// A single OS thread that joins automatically when dropped.
///
/// Mirrors `fz::thread`: spawn once, run a closure to completion, and guarantee the
/// thread is joined no later than when the wrapper itself goes out of scope.
pub struct OwnedThread {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl OwnedThread {
    /// Spawns `f` on a fresh OS thread named `name`.
    pub fn spawn<F>(name: impl Into<String>, f: F) -> Result<Self, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(f)
            .map_err(|e| SpawnError::new(Some(name.clone()), e))?;
        trace!("spawned thread \"{name}\"");
        Ok(Self {
            name,
            handle: Some(handle),
        })
    }

    /// The OS-level id of the running thread, if it hasn't been joined yet.
    pub fn id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|h| h.thread().id())
    }

    /// Blocks until the thread terminates. A no-op if already joined.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let name = self.name.clone();
            let _ = handle.join();
            trace!("joined thread \"{name}\"");
        }
    }
}

impl Drop for OwnedThread {
    fn drop(&mut self) {
        self.join();
    }
}
