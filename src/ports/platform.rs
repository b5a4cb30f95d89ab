use crate::error::HostError;
use crate::types::push::PushSubscription;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Default,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Default => "default",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub notifications: bool,
    pub workers: bool,
    pub push: bool,
    pub periodic_sync: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            notifications: true,
            workers: true,
            push: true,
            periodic_sync: true,
        }
    }

    /// Name of the first capability a reminder-capable page is missing.
    pub fn missing(&self) -> Option<&'static str> {
        if !self.notifications {
            Some("notifications")
        } else if !self.workers {
            Some("background workers")
        } else if !self.push {
            Some("push messaging")
        } else {
            None
        }
    }
}

/// The page-side platform: permissions, push manager and periodic sync.
pub trait Platform: Send + Sync + 'static {
    fn capabilities(&self) -> Capabilities;
    fn permission(&self) -> PermissionState;
    fn request_permission(&self) -> impl Future<Output = PermissionState> + Send;

    fn push_subscription(&self) -> impl Future<Output = Option<PushSubscription>> + Send;
    fn subscribe(
        &self,
        application_server_key: &str,
    ) -> impl Future<Output = Result<PushSubscription, HostError>> + Send;
    /// Returns whether a subscription existed.
    fn unsubscribe(&self) -> impl Future<Output = Result<bool, HostError>> + Send;

    fn periodic_sync_permission(&self) -> impl Future<Output = PermissionState> + Send;
    fn register_periodic_sync(
        &self,
        tag: &str,
        min_interval: Duration,
    ) -> impl Future<Output = Result<(), HostError>> + Send;
}
