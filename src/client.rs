//! The page side: a correlated link to the worker and the coordinator on top.

pub mod channel;
pub mod coordinator;

pub use channel::WorkerLink;
pub use coordinator::{ClientCoordinator, PeriodicSyncMode};
