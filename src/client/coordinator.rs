use crate::client::channel::WorkerLink;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::ports::platform::{PermissionState, Platform};
use crate::ports::{ReminderApi, TimeProvider};
use crate::types::protocol::WorkerRequest;
use crate::types::push::PushSubscription;
use crate::types::reminder::{CreateReminderResponse, Reminder, ReminderFilter};
use crate::worker::container::WorkerContainer;

use futures::future::join_all;
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicSyncMode {
    /// The platform wakes the worker on its own schedule.
    Platform,
    /// A page-local loop posts manual syncs while the page stays open.
    InPageFallback,
}

type LinkSlot = Arc<Mutex<Option<Arc<WorkerLink>>>>;

/// Page-side bridge to the background worker and the reminder API.
pub struct ClientCoordinator<P, A, T> {
    platform: Arc<P>,
    api: Arc<A>,
    time: T,
    config: Arc<ClientConfig>,
    container: WorkerContainer,
    link: LinkSlot,
    subscription: Mutex<Option<PushSubscription>>,
    fallback_sync: Mutex<Option<JoinHandle<()>>>,
}

impl<P, A, T> ClientCoordinator<P, A, T>
where
    P: Platform,
    A: ReminderApi,
    T: TimeProvider,
{
    pub fn new(
        platform: Arc<P>,
        api: Arc<A>,
        time: T,
        container: WorkerContainer,
        config: ClientConfig,
    ) -> Self {
        Self {
            platform,
            api,
            time,
            config: Arc::new(config),
            container,
            link: Arc::new(Mutex::new(None)),
            subscription: Mutex::new(None),
            fallback_sync: Mutex::new(None),
        }
    }

    pub fn container(&self) -> &WorkerContainer {
        &self.container
    }

    /// Waits for the registered worker, connects to it and picks up any
    /// existing push subscription.
    pub async fn connect(&self) -> Result<(), Error> {
        if !self.platform.capabilities().workers {
            return Err(Error::Unsupported("background workers"));
        }
        self.reconnect().await?;
        if self.platform.permission() == PermissionState::Granted {
            let existing = self.platform.push_subscription().await;
            *self.subscription.lock().expect("subscription lock") = existing;
        }
        info!("connected to worker");
        Ok(())
    }

    pub fn cached_subscription(&self) -> Option<PushSubscription> {
        self.subscription.lock().expect("subscription lock").clone()
    }

    pub async fn request_permission(&self) -> Result<PermissionState, Error> {
        self.ensure_supported()?;
        let permission = self.platform.request_permission().await;
        debug!(%permission, "notification permission");
        Ok(permission)
    }

    /// Returns the current subscription, creating and saving one if absent.
    pub async fn subscribe_to_push(&self) -> Result<PushSubscription, Error> {
        if let Some(subscription) = self.cached_subscription() {
            return Ok(subscription);
        }
        if let Some(subscription) = self.platform.push_subscription().await {
            *self.subscription.lock().expect("subscription lock") = Some(subscription.clone());
            return Ok(subscription);
        }
        if self.container.controller().is_none() {
            return Err(Error::Unregistered);
        }

        let public_key = self.api.public_key().await?;
        let subscription = self.platform.subscribe(&public_key).await?;
        self.api.save_subscription(&subscription).await?;
        info!(endpoint = %subscription.endpoint, "push subscription created");
        *self.subscription.lock().expect("subscription lock") = Some(subscription.clone());
        Ok(subscription)
    }

    /// Returns whether a subscription was torn down.
    pub async fn unsubscribe_from_push(&self) -> Result<bool, Error> {
        let cached = self.cached_subscription();
        let existing = match cached {
            Some(subscription) => Some(subscription),
            None => self.platform.push_subscription().await,
        };
        if existing.is_none() {
            return Ok(false);
        }
        self.platform.unsubscribe().await?;
        self.api.delete_subscription().await?;
        *self.subscription.lock().expect("subscription lock") = None;
        info!("push subscription removed");
        Ok(true)
    }

    /// Asks the worker to schedule `reminder`, retrying timed-out attempts with
    /// exponential backoff. An explicit error reply is not retried.
    pub async fn schedule_notification(&self, reminder: &Reminder) -> Result<(), Error> {
        let request = WorkerRequest::ScheduleNotification(reminder.clone());
        let retries = self.config.schedule_retries;
        let mut attempt = 0;
        loop {
            let link = self.link().await?;
            match link.call(&request, self.config.request_timeout).await {
                Ok(_) => return Ok(()),
                Err(Error::Timeout { .. }) if attempt < retries => {
                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        title = %reminder.title,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "schedule request timed out, retrying"
                    );
                    self.time.sleep(delay).await;
                    attempt += 1;
                }
                Err(Error::Timeout { operation, .. }) => {
                    return Err(Error::Timeout {
                        operation,
                        attempts: attempt + 1,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Schedules the reminder locally, then saves it through the API.
    ///
    /// Fails before touching the worker or the network when notifications are
    /// unsupported or not permitted. The two writes are not atomic: if the API
    /// call fails, the reminder still fires locally.
    pub async fn create_reminder(
        &self,
        mut reminder: Reminder,
    ) -> Result<CreateReminderResponse, Error> {
        self.ensure_supported()?;
        let permission = match self.platform.permission() {
            PermissionState::Default => self.platform.request_permission().await,
            permission => permission,
        };
        if permission != PermissionState::Granted {
            return Err(Error::Permission(permission));
        }

        self.subscribe_to_push().await?;
        reminder.ensure_id(self.time.now());
        self.schedule_notification(&reminder).await?;
        let response = self.api.create_reminder(&reminder).await?;
        info!(title = %reminder.title, "reminder created");
        Ok(response)
    }

    /// Fetches reminders from the API and re-arms every enabled one.
    ///
    /// Scheduling failures are logged per reminder and never fail the batch.
    pub async fn get_reminders(&self, filter: &ReminderFilter) -> Result<Vec<Reminder>, Error> {
        let reminders = self.api.list_reminders(filter).await?;
        if self.platform.permission() == PermissionState::Granted {
            let rearm = reminders
                .iter()
                .filter(|reminder| reminder.notification.enabled)
                .map(|reminder| async move {
                    if let Err(err) = self.schedule_notification(reminder).await {
                        warn!(title = %reminder.title, "failed to re-arm reminder: {err}");
                    }
                });
            join_all(rearm).await;
        }
        Ok(reminders)
    }

    pub async fn get_stored_reminders(&self) -> Result<Vec<Reminder>, Error> {
        let link = self.link().await?;
        let value = link
            .call(&WorkerRequest::GetStoredReminders, self.config.request_timeout)
            .await?;
        serde_json::from_value(value).map_err(|err| Error::Protocol(err.to_string()))
    }

    pub async fn clear_stored_reminders(&self) -> Result<(), Error> {
        let link = self.link().await?;
        link.call(&WorkerRequest::ClearStoredReminders, self.config.request_timeout)
            .await?;
        Ok(())
    }

    /// Registers the recurring worker wake, or starts the in-page daily loop
    /// when the platform cannot.
    pub async fn register_periodic_sync(&self) -> Result<PeriodicSyncMode, Error> {
        if self.platform.capabilities().periodic_sync
            && self.platform.periodic_sync_permission().await == PermissionState::Granted
        {
            match self
                .platform
                .register_periodic_sync(&self.config.sync_tag, self.config.periodic_sync_interval)
                .await
            {
                Ok(()) => {
                    info!(tag = %self.config.sync_tag, "periodic sync registered");
                    return Ok(PeriodicSyncMode::Platform);
                }
                Err(err) => warn!("periodic sync registration failed: {err}"),
            }
        }

        self.start_fallback_sync();
        Ok(PeriodicSyncMode::InPageFallback)
    }

    fn start_fallback_sync(&self) {
        let mut fallback = self.fallback_sync.lock().expect("fallback lock");
        if fallback.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let time = self.time.clone();
        let link = Arc::clone(&self.link);
        let config = Arc::clone(&self.config);
        info!(
            interval_secs = config.fallback_sync_interval.as_secs(),
            "periodic sync unavailable, using in-page fallback"
        );
        *fallback = Some(tokio::spawn(async move {
            loop {
                time.sleep(config.fallback_sync_interval).await;
                let current = link.lock().expect("link lock").clone();
                let Some(current) = current else {
                    warn!("fallback sync skipped: worker not connected");
                    continue;
                };
                match current
                    .call(&WorkerRequest::ManualSync, config.request_timeout)
                    .await
                {
                    Ok(_) => debug!("fallback sync posted"),
                    Err(err) => warn!("fallback sync failed: {err}"),
                }
            }
        }));
    }

    /// Reconnects to the new worker and restores its state: re-fetches
    /// reminders so their timers are re-armed, then re-checks the subscription.
    pub async fn on_controller_change(&self) -> Result<usize, Error> {
        self.reconnect().await?;
        let reminders = self.get_reminders(&ReminderFilter::default()).await?;
        let permission = self.platform.permission();
        if permission == PermissionState::Granted && self.platform.capabilities().push {
            *self.subscription.lock().expect("subscription lock") = None;
            if let Err(err) = self.subscribe_to_push().await {
                warn!("failed to restore push subscription: {err}");
            }
        }
        info!(reminders = reminders.len(), "controller changed");
        Ok(reminders.len())
    }

    /// Follows controller changes for as long as the coordinator is alive.
    pub fn watch_controller(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.container.controller_changes();
        changes.mark_unchanged();
        let coordinator: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                if let Err(err) = coordinator.on_controller_change().await {
                    warn!("failed to handle controller change: {err}");
                }
            }
        })
    }

    fn ensure_supported(&self) -> Result<(), Error> {
        match self.platform.capabilities().missing() {
            Some(missing) => Err(Error::Unsupported(missing)),
            None => Ok(()),
        }
    }

    async fn reconnect(&self) -> Result<Arc<WorkerLink>, Error> {
        let worker = self.container.ready().await?;
        let link = Arc::new(WorkerLink::connect(worker));
        *self.link.lock().expect("link lock") = Some(Arc::clone(&link));
        Ok(link)
    }

    async fn link(&self) -> Result<Arc<WorkerLink>, Error> {
        let current = self.link.lock().expect("link lock").clone();
        match current {
            Some(link) if !link.is_closed() => Ok(link),
            _ => self.reconnect().await,
        }
    }
}

impl<P, A, T> Drop for ClientCoordinator<P, A, T> {
    fn drop(&mut self) {
        if let Ok(mut fallback) = self.fallback_sync.lock()
            && let Some(handle) = fallback.take()
        {
            handle.abort();
        }
    }
}
