//! Test doubles shared by the unit tests.

use crate::error::{ApiError, HostError};
use crate::ports::host::{Asset, AssetNetwork, NotificationDisplay, WindowClient, WindowClients};
use crate::ports::platform::{Capabilities, PermissionState, Platform};
use crate::ports::{ReminderApi, TimeProvider};
use crate::types::notification::NotificationPayload;
use crate::types::push::PushSubscription;
use crate::types::reminder::{CreateReminderResponse, Reminder, ReminderFilter};

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::oneshot;

pub(crate) fn at(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).expect("parse timestamp")
}

pub(crate) fn create_temp_root(name: &str) -> PathBuf {
    let mut root = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    root.push(format!("remind-{name}-{nanos}"));
    std::fs::create_dir_all(&root).expect("create temp root");
    root
}

/// Lets spawned tasks on the current-thread runtime run to their next pending point.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Clock whose sleeps only complete when triggered, or immediately when `instant`.
#[derive(Clone)]
pub(crate) struct TestTime {
    now: Arc<Mutex<OffsetDateTime>>,
    sleeps: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
    durations: Arc<Mutex<Vec<Duration>>>,
    instant: bool,
}

impl TestTime {
    pub(crate) fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
            durations: Arc::new(Mutex::new(Vec::new())),
            instant: false,
        }
    }

    pub(crate) fn instant(now: OffsetDateTime) -> Self {
        Self {
            instant: true,
            ..Self::new(now)
        }
    }

    pub(crate) fn set_now(&self, now: OffsetDateTime) {
        *self.now.lock().expect("now lock") = now;
    }

    pub(crate) fn sleep_durations(&self) -> Vec<Duration> {
        self.durations.lock().expect("durations lock").clone()
    }

    pub(crate) fn trigger_all(&self) {
        let mut sends = self.sleeps.lock().expect("sleeps lock");
        for sender in sends.drain(..) {
            let _ = sender.send(());
        }
    }
}

pub(crate) struct ManualSleep {
    receiver: oneshot::Receiver<()>,
}

impl Future for ManualSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl TimeProvider for TestTime {
    type Sleep<'a>
        = ManualSleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("now lock")
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        let (sender, receiver) = oneshot::channel();
        self.durations
            .lock()
            .expect("durations lock")
            .push(duration);
        if self.instant {
            let _ = sender.send(());
        } else {
            self.sleeps.lock().expect("sleeps lock").push(sender);
        }
        ManualSleep { receiver }
    }
}

/// Host double recording displayed notifications and window interactions.
#[derive(Clone, Default)]
pub(crate) struct RecordingHost {
    pub(crate) shown: Arc<Mutex<Vec<NotificationPayload>>>,
    pub(crate) closed: Arc<Mutex<Vec<NotificationPayload>>>,
    pub(crate) windows: Arc<Mutex<Vec<WindowClient>>>,
    pub(crate) focused: Arc<Mutex<Vec<String>>>,
    pub(crate) opened: Arc<Mutex<Vec<String>>>,
    pub(crate) assets: Arc<Mutex<HashMap<String, Asset>>>,
    pub(crate) fetched: Arc<Mutex<Vec<String>>>,
}

impl RecordingHost {
    pub(crate) fn with_asset(self, path: &str, body: &str) -> Self {
        self.assets.lock().expect("assets lock").insert(
            path.to_string(),
            Asset {
                path: path.to_string(),
                content_type: "text/plain".to_string(),
                body: body.as_bytes().to_vec(),
            },
        );
        self
    }

    pub(crate) fn with_window(self, id: &str, url: &str) -> Self {
        self.windows.lock().expect("windows lock").push(WindowClient {
            id: id.to_string(),
            url: url.to_string(),
        });
        self
    }

    pub(crate) fn shown(&self) -> Vec<NotificationPayload> {
        self.shown.lock().expect("shown lock").clone()
    }
}

impl NotificationDisplay for RecordingHost {
    async fn show(&self, notification: &NotificationPayload) -> Result<(), HostError> {
        self.shown
            .lock()
            .expect("shown lock")
            .push(notification.clone());
        Ok(())
    }

    async fn close(&self, notification: &NotificationPayload) {
        self.closed
            .lock()
            .expect("closed lock")
            .push(notification.clone());
    }
}

impl WindowClients for RecordingHost {
    async fn match_all(&self) -> Vec<WindowClient> {
        self.windows.lock().expect("windows lock").clone()
    }

    async fn focus(&self, id: &str) -> Result<(), HostError> {
        self.focused
            .lock()
            .expect("focused lock")
            .push(id.to_string());
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), HostError> {
        self.opened.lock().expect("opened lock").push(url.to_string());
        Ok(())
    }
}

impl AssetNetwork for RecordingHost {
    async fn fetch(&self, path: &str) -> Result<Asset, HostError> {
        self.fetched
            .lock()
            .expect("fetched lock")
            .push(path.to_string());
        self.assets
            .lock()
            .expect("assets lock")
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::new(format!("404 {path}")))
    }
}

#[derive(Clone)]
pub(crate) struct FakePlatform {
    pub(crate) capabilities: Capabilities,
    pub(crate) permission: Arc<Mutex<PermissionState>>,
    pub(crate) prompt_result: PermissionState,
    pub(crate) subscription: Arc<Mutex<Option<PushSubscription>>>,
    pub(crate) subscribe_keys: Arc<Mutex<Vec<String>>>,
    pub(crate) periodic_permission: PermissionState,
    pub(crate) periodic_registrations: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl FakePlatform {
    pub(crate) fn granted() -> Self {
        Self {
            capabilities: Capabilities::all(),
            permission: Arc::new(Mutex::new(PermissionState::Granted)),
            prompt_result: PermissionState::Granted,
            subscription: Arc::new(Mutex::new(None)),
            subscribe_keys: Arc::new(Mutex::new(Vec::new())),
            periodic_permission: PermissionState::Granted,
            periodic_registrations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn with_permission(self, permission: PermissionState) -> Self {
        *self.permission.lock().expect("permission lock") = permission;
        self
    }
}

impl Platform for FakePlatform {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn permission(&self) -> PermissionState {
        *self.permission.lock().expect("permission lock")
    }

    async fn request_permission(&self) -> PermissionState {
        let mut permission = self.permission.lock().expect("permission lock");
        if *permission == PermissionState::Default {
            *permission = self.prompt_result;
        }
        *permission
    }

    async fn push_subscription(&self) -> Option<PushSubscription> {
        self.subscription.lock().expect("subscription lock").clone()
    }

    async fn subscribe(&self, application_server_key: &str) -> Result<PushSubscription, HostError> {
        self.subscribe_keys
            .lock()
            .expect("subscribe keys lock")
            .push(application_server_key.to_string());
        let subscription = PushSubscription::new("https://push.example/sub", "p256", "auth");
        *self.subscription.lock().expect("subscription lock") = Some(subscription.clone());
        Ok(subscription)
    }

    async fn unsubscribe(&self) -> Result<bool, HostError> {
        Ok(self
            .subscription
            .lock()
            .expect("subscription lock")
            .take()
            .is_some())
    }

    async fn periodic_sync_permission(&self) -> PermissionState {
        self.periodic_permission
    }

    async fn register_periodic_sync(
        &self,
        tag: &str,
        min_interval: Duration,
    ) -> Result<(), HostError> {
        self.periodic_registrations
            .lock()
            .expect("periodic lock")
            .push((tag.to_string(), min_interval));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiCall {
    Create(String),
    List(ReminderFilter),
    PublicKey,
    SaveSubscription(String),
    DeleteSubscription,
}

#[derive(Clone, Default)]
pub(crate) struct FakeApi {
    pub(crate) calls: Arc<Mutex<Vec<ApiCall>>>,
    pub(crate) reminders: Arc<Mutex<Vec<Reminder>>>,
    pub(crate) fail_create: bool,
}

impl FakeApi {
    pub(crate) fn with_reminders(reminders: Vec<Reminder>) -> Self {
        Self {
            reminders: Arc::new(Mutex::new(reminders)),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

impl ReminderApi for FakeApi {
    async fn create_reminder(
        &self,
        reminder: &Reminder,
    ) -> Result<CreateReminderResponse, ApiError> {
        self.record(ApiCall::Create(reminder.title.clone()));
        if self.fail_create {
            return Err(ApiError::Status {
                status: 500,
                message: "database unavailable".to_string(),
            });
        }
        let mut stored = reminder.clone();
        if stored.id.is_none() {
            stored.id = Some(format!("srv-{}", reminder.title));
        }
        self.reminders
            .lock()
            .expect("reminders lock")
            .push(stored.clone());
        Ok(CreateReminderResponse {
            success: true,
            reminder: stored,
        })
    }

    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<Reminder>, ApiError> {
        self.record(ApiCall::List(filter.clone()));
        Ok(self
            .reminders
            .lock()
            .expect("reminders lock")
            .iter()
            .filter(|reminder| filter.matches(reminder))
            .cloned()
            .collect())
    }

    async fn public_key(&self) -> Result<String, ApiError> {
        self.record(ApiCall::PublicKey);
        Ok("BTestPublicKey".to_string())
    }

    async fn save_subscription(&self, subscription: &PushSubscription) -> Result<(), ApiError> {
        self.record(ApiCall::SaveSubscription(subscription.endpoint.clone()));
        Ok(())
    }

    async fn delete_subscription(&self) -> Result<(), ApiError> {
        self.record(ApiCall::DeleteSubscription);
        Ok(())
    }
}
