//! Host and platform adapters for running the worker outside a browser.
//!
//! Notifications go to the log, there are no window clients, and push
//! messaging is unavailable.

use crate::error::HostError;
use crate::ports::host::{Asset, AssetNetwork, NotificationDisplay, WindowClient, WindowClients};
use crate::ports::platform::{Capabilities, PermissionState, Platform};
use crate::types::notification::NotificationPayload;
use crate::types::push::PushSubscription;

use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct HeadlessHost<N> {
    network: N,
}

impl<N> HeadlessHost<N> {
    pub fn new(network: N) -> Self {
        Self { network }
    }
}

impl<N: AssetNetwork> NotificationDisplay for HeadlessHost<N> {
    async fn show(&self, notification: &NotificationPayload) -> Result<(), HostError> {
        info!(
            title = %notification.title,
            body = %notification.body,
            url = notification.data.url.as_deref().unwrap_or(""),
            "notification"
        );
        Ok(())
    }

    async fn close(&self, notification: &NotificationPayload) {
        debug!(title = %notification.title, "notification closed");
    }
}

impl<N: AssetNetwork> WindowClients for HeadlessHost<N> {
    async fn match_all(&self) -> Vec<WindowClient> {
        Vec::new()
    }

    async fn focus(&self, id: &str) -> Result<(), HostError> {
        Err(HostError::new(format!("no window client '{id}'")))
    }

    async fn open_window(&self, url: &str) -> Result<(), HostError> {
        info!(url, "open window");
        Ok(())
    }
}

impl<N: AssetNetwork> AssetNetwork for HeadlessHost<N> {
    async fn fetch(&self, path: &str) -> Result<Asset, HostError> {
        self.network.fetch(path).await
    }
}

/// A platform with a fixed notification permission and no push manager.
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    permission: PermissionState,
}

impl HeadlessPlatform {
    pub fn new(permission: PermissionState) -> Self {
        Self { permission }
    }
}

impl Platform for HeadlessPlatform {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            notifications: true,
            workers: true,
            push: false,
            periodic_sync: false,
        }
    }

    fn permission(&self) -> PermissionState {
        self.permission
    }

    async fn request_permission(&self) -> PermissionState {
        self.permission
    }

    async fn push_subscription(&self) -> Option<PushSubscription> {
        None
    }

    async fn subscribe(&self, _application_server_key: &str) -> Result<PushSubscription, HostError> {
        Err(HostError::new("push messaging is not available headless"))
    }

    async fn unsubscribe(&self) -> Result<bool, HostError> {
        Ok(false)
    }

    async fn periodic_sync_permission(&self) -> PermissionState {
        PermissionState::Denied
    }

    async fn register_periodic_sync(
        &self,
        tag: &str,
        _min_interval: Duration,
    ) -> Result<(), HostError> {
        Err(HostError::new(format!(
            "periodic sync '{tag}' is not available headless"
        )))
    }
}
