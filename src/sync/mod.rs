//! Bidirectional synchronization with the remote relational backend

pub mod backend;
pub mod coordinator;
pub mod rest;
pub mod scheduler;
pub mod wire;

#[cfg(test)]
pub mod mock;

pub use backend::RemoteBackend;
pub use coordinator::SyncCoordinator;
pub use rest::RestBackend;
pub use scheduler::SyncScheduler;
