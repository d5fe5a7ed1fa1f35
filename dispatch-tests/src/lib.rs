//! No library surface of its own; this crate exists to hold cross-crate
//! integration tests under `tests/` that exercise `dispatch-core` running atop
//! `dispatch-executor`'s thread pool.
