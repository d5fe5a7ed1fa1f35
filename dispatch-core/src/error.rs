/// Failure constructing an owned-thread [`crate::EventLoop`].
///
/// There's no sensible "stuck but otherwise valid" loop to hand back if the OS
/// thread spawn fails, so this is surfaced as a typed error rather than swallowed.
pub use dispatch_executor::SpawnError;
