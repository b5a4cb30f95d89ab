use crate::ports::platform::PermissionState;

use thiserror::Error;

/// Errors surfaced to callers of the client coordinator and worker runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// The platform lacks notifications, worker hosting or push.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Notification permission was not granted.
    #[error("notification permission is {0}")]
    Permission(PermissionState),

    /// A request/response round-trip to the worker exceeded its timeout.
    #[error("{operation} timed out after {attempts} attempt(s)")]
    Timeout {
        operation: &'static str,
        attempts: u32,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    InvalidReminder(#[from] InvalidReminder),

    /// The worker answered with an explicit error reply.
    #[error("worker error: {0}")]
    Worker(String),

    /// The worker answered with something that does not match the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Host(#[from] HostError),

    /// No worker registration exists.
    #[error("worker is not registered")]
    Unregistered,

    /// The worker went away while a request was in flight.
    #[error("worker channel closed")]
    Disconnected,
}

/// Failure reported by the local reminder store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt reminder store: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("reminder has no identifier")]
    MissingId,
}

/// A reminder record that fails boundary validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReminder {
    #[error("reminder title is empty")]
    EmptyTitle,

    #[error("invalid reminder date '{0}'")]
    Date(String),

    #[error("invalid reminder time '{0}'")]
    Time(String),
}

/// The host environment (display, window clients, network, platform) rejected an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host error: {0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure talking to the remote reminder API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Outcome of a failed server-initiated push delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The push service reports the endpoint as gone; the subscription must be recreated.
    #[error("subscription-expired")]
    Expired,

    #[error("transient delivery failure: {0}")]
    Transient(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, Error>;
