//! Capabilities the worker borrows from its hosting environment.

use crate::error::HostError;
use crate::types::notification::NotificationPayload;

pub trait NotificationDisplay: Send + Sync + 'static {
    fn show(
        &self,
        notification: &NotificationPayload,
    ) -> impl Future<Output = Result<(), HostError>> + Send;

    fn close(&self, notification: &NotificationPayload) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}

pub trait WindowClients: Send + Sync + 'static {
    fn match_all(&self) -> impl Future<Output = Vec<WindowClient>> + Send;
    fn focus(&self, id: &str) -> impl Future<Output = Result<(), HostError>> + Send;
    fn open_window(&self, url: &str) -> impl Future<Output = Result<(), HostError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

pub trait AssetNetwork: Send + Sync + 'static {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Asset, HostError>> + Send;
}
