//! OS thread and thread-pool primitives consumed by `dispatch-core`.
//!
//! A way to spawn a dedicated thread that joins on drop ([`OwnedThread`]), and a
//! reusable pool of worker threads that can host a loop instead
//! ([`ThreadPool`]/[`AsyncTask`]).

mod error;
mod pool;
mod thread;

pub use error::SpawnError;
pub use pool::{AsyncTask, ThreadPool};
pub use thread::OwnedThread;
