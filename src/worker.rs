//! The background worker: scheduler, asset cache, event dispatch and hosting.

pub mod cache;
pub mod container;
pub mod host;
pub mod runtime;
pub mod scheduler;

pub use cache::AssetCache;
pub use container::WorkerContainer;
pub use host::{WorkerHandle, spawn};
pub use runtime::{EventOutcome, WorkerEvent, WorkerRuntime, WorkerState};
pub use scheduler::{NotificationScheduler, ScheduleOutcome, ScheduledEntry};
