//! The background worker's event dispatch table.
//!
//! One [`WorkerRuntime`] owns the notification scheduler, the reminder store
//! behind it and the static asset cache. The host loop in [`super::host`]
//! feeds it one [`WorkerEvent`] per platform event and keeps the worker alive
//! until the returned future resolves.

use crate::config::WorkerConfig;
use crate::error::Error;
use crate::ports::host::{Asset, AssetNetwork, NotificationDisplay, WindowClients};
use crate::ports::{ReminderStore, TimeProvider};
use crate::types::notification::{ACTION_OPEN, NotificationPayload};
use crate::types::protocol::{Envelope, Reply, ReplyEnvelope, WorkerRequest};
use crate::worker::cache::AssetCache;
use crate::worker::scheduler::NotificationScheduler;

use reqwest::Url;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch {
        path: String,
    },
    Message(Envelope),
    Push(Vec<u8>),
    NotificationClick {
        notification: NotificationPayload,
        action: Option<String>,
    },
    PeriodicSync {
        tag: String,
    },
}

impl WorkerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch { .. } => "fetch",
            WorkerEvent::Message(_) => "message",
            WorkerEvent::Push(_) => "push",
            WorkerEvent::NotificationClick { .. } => "notificationclick",
            WorkerEvent::PeriodicSync { .. } => "periodicsync",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Completed,
    Ignored,
    Asset(Asset),
    Reply(ReplyEnvelope),
}

pub struct WorkerRuntime<T, S, H> {
    config: Arc<WorkerConfig>,
    host: Arc<H>,
    cache: AssetCache,
    scheduler: NotificationScheduler<T, S, H>,
    state: watch::Sender<WorkerState>,
}

impl<T, S, H> WorkerRuntime<T, S, H>
where
    T: TimeProvider,
    S: ReminderStore,
    H: NotificationDisplay + WindowClients + AssetNetwork,
{
    pub fn new(time: T, store: Arc<S>, host: Arc<H>, config: WorkerConfig) -> Self {
        let config = Arc::new(config);
        let scheduler =
            NotificationScheduler::new(time, store, Arc::clone(&host), Arc::clone(&config));
        let (state, _) = watch::channel(WorkerState::Installing);
        Self {
            config,
            host,
            cache: AssetCache::new(),
            scheduler,
            state,
        }
    }

    /// Seeds the asset cache, e.g. with entries left by a previous worker version.
    pub fn with_cache(mut self, cache: AssetCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn scheduler(&self) -> &NotificationScheduler<T, S, H> {
        &self.scheduler
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
        debug!(?state, "worker state");
    }

    pub async fn handle(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        match event {
            WorkerEvent::Install => self.install().await,
            WorkerEvent::Activate => self.activate().await,
            WorkerEvent::Fetch { path } => self.fetch(&path).await.map(EventOutcome::Asset),
            WorkerEvent::Message(envelope) => Ok(self.message(envelope).await),
            WorkerEvent::Push(data) => self.push(&data).await,
            WorkerEvent::NotificationClick {
                notification,
                action,
            } => self.notification_click(&notification, action.as_deref()).await,
            WorkerEvent::PeriodicSync { tag } => self.periodic_sync(&tag).await,
        }
    }

    /// Cancels every armed timer. Stored records survive for the next worker.
    pub fn teardown(&self) {
        self.scheduler.cancel_all();
        self.set_state(WorkerState::Redundant);
    }

    async fn install(&self) -> Result<EventOutcome, Error> {
        self.set_state(WorkerState::Installing);
        for path in &self.config.precache {
            let asset = self.host.fetch(path).await?;
            self.cache.put(&self.config.cache_name, asset);
        }
        info!(
            cache = %self.config.cache_name,
            assets = self.config.precache.len(),
            "worker installed"
        );
        self.set_state(WorkerState::Installed);
        Ok(EventOutcome::Completed)
    }

    async fn activate(&self) -> Result<EventOutcome, Error> {
        self.set_state(WorkerState::Activating);
        for stale in self.cache.retain_only(&self.config.cache_name) {
            info!(cache = %stale, "purged stale asset cache");
        }
        match self.scheduler.check_scheduled().await {
            Ok(armed) => info!(armed, "worker activated"),
            Err(err) => warn!("failed to recover scheduled reminders: {err}"),
        }
        self.set_state(WorkerState::Active);
        Ok(EventOutcome::Completed)
    }

    async fn fetch(&self, path: &str) -> Result<Asset, Error> {
        if let Some(asset) = self.cache.lookup(path) {
            debug!(path, "served from cache");
            return Ok(asset);
        }
        Ok(self.host.fetch(path).await?)
    }

    async fn message(&self, envelope: Envelope) -> EventOutcome {
        let token = envelope.token;
        let request = match WorkerRequest::from_envelope(&envelope) {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(tag = %envelope.tag, "ignoring unknown message");
                return EventOutcome::Ignored;
            }
            Err(err) => {
                warn!(tag = %envelope.tag, "malformed message payload: {err}");
                return reply(token, Reply::Error(format!("malformed payload: {err}")));
            }
        };
        debug!(token, tag = request.tag(), "message");

        let result = match request {
            WorkerRequest::ScheduleNotification(reminder) => match reminder.validate() {
                Ok(()) => self
                    .scheduler
                    .schedule(reminder)
                    .await
                    .map(|_| Reply::success()),
                Err(err) => Err(err.into()),
            },
            WorkerRequest::GetStoredReminders => match self.scheduler.store().get_all().await {
                Ok(reminders) => serde_json::to_value(reminders)
                    .map(Reply::Ok)
                    .map_err(|err| Error::Protocol(err.to_string())),
                Err(err) => Err(err.into()),
            },
            WorkerRequest::ClearStoredReminders => {
                self.scheduler.clear().await.map(|()| Reply::success())
            }
            WorkerRequest::ManualSync => self
                .scheduler
                .check_scheduled()
                .await
                .map(|_| Reply::success()),
        };

        match result {
            Ok(ok) => reply(token, ok),
            Err(err) => {
                warn!(token, "message handler failed: {err}");
                reply(token, Reply::Error(err.to_string()))
            }
        }
    }

    async fn push(&self, data: &[u8]) -> Result<EventOutcome, Error> {
        let notification = self.push_notification(data);
        self.host.show(&notification).await?;
        info!(title = %notification.title, "push notification shown");
        if let Err(err) = self.scheduler.check_scheduled().await {
            warn!("failed to recover scheduled reminders on push: {err}");
        }
        Ok(EventOutcome::Completed)
    }

    fn push_notification(&self, data: &[u8]) -> NotificationPayload {
        let mut notification = match serde_json::from_slice::<NotificationPayload>(data) {
            Ok(notification) => notification,
            Err(_) => {
                let text = String::from_utf8_lossy(data).trim().to_string();
                NotificationPayload::new(self.config.push_title.clone(), text)
            }
        };
        if notification.title.trim().is_empty() {
            notification.title = self.config.push_title.clone();
        }
        if notification.vibrate.is_empty() {
            notification.vibrate = self.config.vibrate.clone();
        }
        if notification.icon.is_none() {
            notification.icon = self.config.icon.clone();
        }
        notification
    }

    async fn notification_click(
        &self,
        notification: &NotificationPayload,
        action: Option<&str>,
    ) -> Result<EventOutcome, Error> {
        self.host.close(notification).await;
        if action != Some(ACTION_OPEN) {
            return Ok(EventOutcome::Completed);
        }

        let url = notification
            .data
            .url
            .clone()
            .unwrap_or_else(|| self.config.deep_link.clone());
        let windows = self.host.match_all().await;
        match windows
            .iter()
            .find(|window| same_page(&window.url, &url))
        {
            Some(window) => {
                debug!(id = %window.id, url = %url, "focusing open window");
                self.host.focus(&window.id).await?;
            }
            None => {
                debug!(url = %url, "opening window");
                self.host.open_window(&url).await?;
            }
        }
        Ok(EventOutcome::Completed)
    }

    async fn periodic_sync(&self, tag: &str) -> Result<EventOutcome, Error> {
        if tag != self.config.sync_tag {
            debug!(tag, "ignoring periodic sync");
            return Ok(EventOutcome::Ignored);
        }
        let armed = self.scheduler.check_scheduled().await?;
        debug!(armed, "periodic sync");
        Ok(EventOutcome::Completed)
    }
}

/// Whether `window_url` shows the page `target` points at.
///
/// A relative target is resolved against the window's own origin, then origin
/// and path must match exactly. Query and fragment are ignored.
fn same_page(window_url: &str, target: &str) -> bool {
    let Ok(window) = Url::parse(window_url) else {
        return window_url == target;
    };
    match window.join(target) {
        Ok(target) => target.origin() == window.origin() && target.path() == window.path(),
        Err(_) => false,
    }
}

fn reply(token: u64, reply: Reply) -> EventOutcome {
    EventOutcome::Reply(ReplyEnvelope { token, reply })
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::store::MemoryReminderStore;
    use crate::testing::{RecordingHost, TestTime, at, settle};
    use crate::types::protocol::{TAG_CLEAR_STORED_REMINDERS, TAG_GET_STORED_REMINDERS};
    use crate::types::reminder::Reminder;

    use serde_json::{Value, json};

    type Runtime = WorkerRuntime<TestTime, MemoryReminderStore, RecordingHost>;

    fn runtime(host: RecordingHost, store: MemoryReminderStore) -> (Runtime, TestTime) {
        let time = TestTime::new(at("2024-12-31T09:00:00Z"));
        let runtime = WorkerRuntime::new(
            time.clone(),
            Arc::new(store),
            Arc::new(host),
            WorkerConfig::default(),
        );
        (runtime, time)
    }

    fn precached_host() -> RecordingHost {
        RecordingHost::default()
            .with_asset("/", "<html></html>")
            .with_asset("/manifest.json", "{}")
    }

    fn pay_rent() -> Reminder {
        Reminder::new("Pay rent", "2025-01-01", "09:00", "todo")
            .with_id("r1")
            .with_entity_id("t1")
    }

    fn envelope(token: u64, request: &WorkerRequest) -> WorkerEvent {
        WorkerEvent::Message(request.to_envelope(token).expect("envelope"))
    }

    fn replied(outcome: EventOutcome) -> ReplyEnvelope {
        match outcome {
            EventOutcome::Reply(reply) => reply,
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handle__should_precache_on_install_and_purge_stale_on_activate() {
        // Given
        let host = precached_host();
        let stale = AssetCache::new();
        stale.put(
            "remind-v0",
            Asset {
                path: "/old.js".to_string(),
                content_type: "text/javascript".to_string(),
                body: Vec::new(),
            },
        );
        let (runtime, _) = runtime(host.clone(), MemoryReminderStore::new());
        let runtime = runtime.with_cache(stale);

        // When
        runtime.handle(WorkerEvent::Install).await.expect("install");
        let installed = runtime.state();
        runtime.handle(WorkerEvent::Activate).await.expect("activate");

        // Then
        assert_eq!(installed, WorkerState::Installed);
        assert_eq!(runtime.state(), WorkerState::Active);
        assert_eq!(runtime.cache().cache_names(), vec!["remind-v1".to_string()]);
        assert!(runtime.cache().lookup("/manifest.json").is_some());
        assert!(runtime.cache().lookup("/old.js").is_none());
    }

    #[tokio::test]
    async fn handle__should_fail_install_when_precache_fetch_fails() {
        let (runtime, _) = runtime(RecordingHost::default(), MemoryReminderStore::new());

        let result = runtime.handle(WorkerEvent::Install).await;

        assert!(matches!(result, Err(Error::Host(_))));
    }

    #[tokio::test]
    async fn handle__should_rearm_stored_reminders_on_activate() {
        // Given
        let store = MemoryReminderStore::new();
        store.put(&pay_rent()).await.expect("put");
        let (runtime, _) = runtime(precached_host(), store);

        // When
        runtime.handle(WorkerEvent::Activate).await.expect("activate");

        // Then
        assert_eq!(runtime.scheduler().pending_count(), 1);
    }

    #[tokio::test]
    async fn handle__should_serve_cached_asset_before_network() {
        // Given
        let host = precached_host();
        let (runtime, _) = runtime(host.clone(), MemoryReminderStore::new());
        runtime.handle(WorkerEvent::Install).await.expect("install");
        let fetched_during_install = host.fetched.lock().expect("fetched lock").len();

        // When
        let cached = runtime
            .handle(WorkerEvent::Fetch {
                path: "/".to_string(),
            })
            .await
            .expect("fetch");
        let missing = runtime
            .handle(WorkerEvent::Fetch {
                path: "/api/unknown".to_string(),
            })
            .await;

        // Then
        assert!(matches!(cached, EventOutcome::Asset(asset) if asset.body == b"<html></html>"));
        assert!(missing.is_err());
        assert_eq!(
            host.fetched.lock().expect("fetched lock").len(),
            fetched_during_install + 1
        );
    }

    #[tokio::test]
    async fn handle__should_schedule_then_list_then_clear_over_messages() {
        // Given
        let store = MemoryReminderStore::new();
        let (runtime, _) = runtime(precached_host(), store.clone());

        // When
        let scheduled = replied(
            runtime
                .handle(envelope(1, &WorkerRequest::ScheduleNotification(pay_rent())))
                .await
                .expect("schedule"),
        );
        let listed = replied(
            runtime
                .handle(envelope(2, &WorkerRequest::GetStoredReminders))
                .await
                .expect("list"),
        );
        let cleared = replied(
            runtime
                .handle(envelope(3, &WorkerRequest::ClearStoredReminders))
                .await
                .expect("clear"),
        );

        // Then
        assert_eq!(scheduled.token, 1);
        assert_eq!(scheduled.reply, Reply::success());
        let Reply::Ok(Value::Array(records)) = listed.reply else {
            panic!("expected reminder array");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["title"], "Pay rent");
        assert_eq!(cleared.reply, Reply::Ok(json!({ "success": true })));
        assert!(store.is_empty());
        assert_eq!(runtime.scheduler().pending_count(), 0);
    }

    #[tokio::test]
    async fn handle__should_reply_error_for_invalid_reminder() {
        // Given
        let (runtime, _) = runtime(precached_host(), MemoryReminderStore::new());
        let mut reminder = pay_rent();
        reminder.title = "  ".to_string();

        // When
        let outcome = runtime
            .handle(envelope(9, &WorkerRequest::ScheduleNotification(reminder)))
            .await
            .expect("handle");

        // Then
        let reply = replied(outcome);
        assert_eq!(reply.token, 9);
        assert!(matches!(reply.reply, Reply::Error(message) if message.contains("title")));
    }

    #[tokio::test]
    async fn handle__should_ignore_unknown_message_tags() {
        let (runtime, _) = runtime(precached_host(), MemoryReminderStore::new());

        let outcome = runtime
            .handle(WorkerEvent::Message(Envelope {
                token: 4,
                tag: "skip-waiting".to_string(),
                payload: Value::Null,
            }))
            .await
            .expect("handle");

        assert_eq!(outcome, EventOutcome::Ignored);
    }

    #[tokio::test]
    async fn handle__should_reply_with_stored_records_even_when_empty() {
        let (runtime, _) = runtime(precached_host(), MemoryReminderStore::new());

        let outcome = runtime
            .handle(WorkerEvent::Message(Envelope {
                token: 5,
                tag: TAG_GET_STORED_REMINDERS.to_string(),
                payload: Value::Null,
            }))
            .await
            .expect("handle");

        assert_eq!(replied(outcome).reply, Reply::Ok(json!([])));
    }

    #[tokio::test]
    async fn handle__should_cancel_timers_on_clear_message() {
        // Given
        let host = precached_host();
        let (runtime, time) = runtime(host.clone(), MemoryReminderStore::new());
        runtime
            .handle(envelope(1, &WorkerRequest::ScheduleNotification(pay_rent())))
            .await
            .expect("schedule");
        settle().await;

        // When
        runtime
            .handle(WorkerEvent::Message(Envelope {
                token: 2,
                tag: TAG_CLEAR_STORED_REMINDERS.to_string(),
                payload: Value::Null,
            }))
            .await
            .expect("clear");
        time.trigger_all();
        settle().await;

        // Then
        assert!(host.shown().is_empty());
    }

    #[tokio::test]
    async fn handle__should_display_push_payload_directly() {
        // Given
        let host = precached_host();
        let store = MemoryReminderStore::new();
        let (runtime, _) = runtime(host.clone(), store.clone());
        let payload = json!({
            "title": "Invoice due",
            "body": "Electricity bill",
            "data": { "url": "/Finances" }
        });

        // When
        runtime
            .handle(WorkerEvent::Push(payload.to_string().into_bytes()))
            .await
            .expect("push");

        // Then
        let shown = host.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Invoice due");
        assert_eq!(shown[0].body, "Electricity bill");
        assert_eq!(shown[0].vibrate, vec![100, 50, 100]);
        assert_eq!(shown[0].data.url.as_deref(), Some("/Finances"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn handle__should_show_plain_text_push_under_default_title() {
        let host = precached_host();
        let (runtime, _) = runtime(host.clone(), MemoryReminderStore::new());

        runtime
            .handle(WorkerEvent::Push(b"Server says hi".to_vec()))
            .await
            .expect("push");

        let shown = host.shown();
        assert_eq!(shown[0].title, "New notification");
        assert_eq!(shown[0].body, "Server says hi");
    }

    #[tokio::test]
    async fn handle__should_focus_matching_window_on_open_click() {
        // Given
        let host = precached_host()
            .with_window("w1", "https://app.example/Calendar")
            .with_window("w2", "https://app.example/Features");
        let (runtime, _) = runtime(host.clone(), MemoryReminderStore::new());
        let mut notification = NotificationPayload::new("Pay rent", "Reminder!");
        notification.data.url = Some("/Features".to_string());

        // When
        runtime
            .handle(WorkerEvent::NotificationClick {
                notification,
                action: Some("open".to_string()),
            })
            .await
            .expect("click");

        // Then
        assert_eq!(host.closed.lock().expect("closed lock").len(), 1);
        assert_eq!(*host.focused.lock().expect("focused lock"), vec!["w2".to_string()]);
        assert!(host.opened.lock().expect("opened lock").is_empty());
    }

    #[tokio::test]
    async fn handle__should_open_window_when_none_matches() {
        // Given
        let host = precached_host().with_window("w1", "https://app.example/Calendar");
        let (runtime, _) = runtime(host.clone(), MemoryReminderStore::new());

        // When
        runtime
            .handle(WorkerEvent::NotificationClick {
                notification: NotificationPayload::new("Pay rent", "Reminder!"),
                action: Some("open".to_string()),
            })
            .await
            .expect("click");

        // Then
        assert_eq!(
            *host.opened.lock().expect("opened lock"),
            vec!["/Features".to_string()]
        );
    }

    #[tokio::test]
    async fn handle__should_not_focus_window_whose_path_only_ends_with_target() {
        // Given
        let host = precached_host().with_window("w1", "https://app.example/admin/Features");
        let (runtime, _) = runtime(host.clone(), MemoryReminderStore::new());

        // When
        runtime
            .handle(WorkerEvent::NotificationClick {
                notification: NotificationPayload::new("Pay rent", "Reminder!"),
                action: Some("open".to_string()),
            })
            .await
            .expect("click");

        // Then
        assert!(host.focused.lock().expect("focused lock").is_empty());
        assert_eq!(
            *host.opened.lock().expect("opened lock"),
            vec!["/Features".to_string()]
        );
    }

    #[test]
    fn same_page__should_compare_resolved_path_and_origin() {
        assert!(same_page("https://app.example/Features", "/Features"));
        assert!(same_page("https://app.example/Features?tab=2#top", "/Features"));
        assert!(same_page(
            "https://app.example/Features",
            "https://app.example/Features"
        ));
        assert!(!same_page("https://app.example/admin/Features", "/Features"));
        assert!(!same_page("https://app.example/Features", "https://other.example/Features"));
        assert!(!same_page("https://app.example/Calendar", "/Features"));
    }

    #[tokio::test]
    async fn handle__should_only_close_on_close_action() {
        let host = precached_host().with_window("w1", "https://app.example/Features");
        let (runtime, _) = runtime(host.clone(), MemoryReminderStore::new());

        runtime
            .handle(WorkerEvent::NotificationClick {
                notification: NotificationPayload::new("Pay rent", "Reminder!"),
                action: Some("close".to_string()),
            })
            .await
            .expect("click");

        assert_eq!(host.closed.lock().expect("closed lock").len(), 1);
        assert!(host.focused.lock().expect("focused lock").is_empty());
        assert!(host.opened.lock().expect("opened lock").is_empty());
    }

    #[tokio::test]
    async fn handle__should_recheck_schedules_on_periodic_sync() {
        // Given
        let store = MemoryReminderStore::new();
        let (runtime, _) = runtime(precached_host(), store.clone());

        store.put(&pay_rent()).await.expect("put");

        // When
        let synced = runtime
            .handle(WorkerEvent::PeriodicSync {
                tag: "check-notifications".to_string(),
            })
            .await
            .expect("sync");
        let other = runtime
            .handle(WorkerEvent::PeriodicSync {
                tag: "content-refresh".to_string(),
            })
            .await
            .expect("sync");

        // Then
        assert_eq!(synced, EventOutcome::Completed);
        assert_eq!(other, EventOutcome::Ignored);
        assert_eq!(runtime.scheduler().pending_count(), 1);
    }

    #[tokio::test]
    async fn teardown__should_cancel_timers_but_keep_records() {
        let store = MemoryReminderStore::new();
        let (runtime, _) = runtime(precached_host(), store.clone());
        runtime
            .scheduler()
            .schedule(pay_rent())
            .await
            .expect("schedule");

        runtime.teardown();

        assert_eq!(runtime.state(), WorkerState::Redundant);
        assert_eq!(runtime.scheduler().pending_count(), 0);
        assert!(store.contains("r1"));
    }
}
