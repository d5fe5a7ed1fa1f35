use std::io;

/// Failure to spawn the OS thread backing an owned [`crate::thread::OwnedThread`]
/// or a new thread-pool worker.
#[derive(Debug, thiserror::Error)]
#[error("failed to spawn thread{}: {source}", .name.as_deref().map(|n| format!(" \"{n}\"")).unwrap_or_default())]
pub struct SpawnError {
    pub(crate) name: Option<String>,
    #[source]
    pub(crate) source: io::Error,
}

impl SpawnError {
    pub(crate) fn new(name: Option<String>, source: io::Error) -> Self {
        Self { name, source }
    }
}
