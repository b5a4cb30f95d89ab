use crate::config::WorkerConfig;
use crate::error::Error;
use crate::ports::{NotificationDisplay, ReminderStore, TimeProvider};
use crate::types::notification::{
    ACTION_CLOSE, ACTION_OPEN, NotificationAction, NotificationData, NotificationPayload,
};
use crate::types::reminder::Reminder;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Timers = Arc<Mutex<HashMap<String, ScheduledNotificationHandle>>>;

pub(crate) struct ScheduledNotificationHandle {
    pub(crate) fire_at: OffsetDateTime,
    pub(crate) scheduled_at: OffsetDateTime,
    generation: u64,
    handle: JoinHandle<()>,
}

impl ScheduledNotificationHandle {
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub(crate) fn abort(&self) {
        self.handle.abort();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { id: String, delay: Duration },
    /// The fire instant was not in the future; nothing was stored or armed.
    Dropped { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEntry {
    pub id: String,
    pub fire_at: OffsetDateTime,
    pub scheduled_at: OffsetDateTime,
    pub finished: bool,
}

/// Arms one timer per pending reminder and shows its notification when it fires.
///
/// Timers live only as long as this scheduler; the records behind them are in
/// the reminder store so [`NotificationScheduler::check_scheduled`] can re-arm
/// them after a restart.
pub struct NotificationScheduler<T, S, D> {
    time: T,
    store: Arc<S>,
    display: Arc<D>,
    config: Arc<WorkerConfig>,
    timers: Timers,
    generation: Arc<AtomicU64>,
}

impl<T: Clone, S, D> Clone for NotificationScheduler<T, S, D> {
    fn clone(&self) -> Self {
        Self {
            time: self.time.clone(),
            store: Arc::clone(&self.store),
            display: Arc::clone(&self.display),
            config: Arc::clone(&self.config),
            timers: Arc::clone(&self.timers),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<T, S, D> NotificationScheduler<T, S, D>
where
    T: TimeProvider,
    S: ReminderStore,
    D: NotificationDisplay,
{
    pub fn new(time: T, store: Arc<S>, display: Arc<D>, config: Arc<WorkerConfig>) -> Self {
        Self {
            time,
            store,
            display,
            config,
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn schedule(&self, mut reminder: Reminder) -> Result<ScheduleOutcome, Error> {
        let id = reminder.ensure_id(self.time.now()).to_string();
        let fire_at = reminder.fire_at(self.config.utc_offset)?;
        let Some(delay) = self.time.delay_until(fire_at) else {
            debug!(id = %id, %fire_at, "dropping past-due reminder");
            return Ok(ScheduleOutcome::Dropped { id });
        };

        self.store.put(&reminder).await?;

        let notification = render_notification(&reminder, &self.config);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let scheduled_at = self.time.now();

        // The lock is held across spawn so a fast-firing task cannot look for
        // its entry before it is inserted.
        let mut timers = self.timers.lock().expect("timers lock");
        let handle = {
            let time = self.time.clone();
            let store = Arc::clone(&self.store);
            let display = Arc::clone(&self.display);
            let timers = Arc::clone(&self.timers);
            let id = id.clone();
            tokio::spawn(async move {
                time.sleep(delay).await;
                fire(&*store, &*display, &timers, &id, generation, notification).await;
            })
        };
        let previous = timers.insert(
            id.clone(),
            ScheduledNotificationHandle {
                fire_at,
                scheduled_at,
                generation,
                handle,
            },
        );
        drop(timers);

        if let Some(previous) = previous {
            previous.abort();
        }
        debug!(id = %id, delay_ms = delay.as_millis() as u64, "reminder armed");
        Ok(ScheduleOutcome::Scheduled { id, delay })
    }

    /// Re-arms every stored reminder with a delay derived from the current time.
    ///
    /// Returns the number of armed timers. Records whose time has passed are
    /// deleted from the store. Records that fail to schedule are logged and
    /// skipped.
    pub async fn check_scheduled(&self) -> Result<usize, Error> {
        let reminders = self.store.get_all().await?;
        let mut armed = 0;
        for reminder in reminders {
            let id = reminder.id.clone().unwrap_or_default();
            match self.schedule(reminder).await {
                Ok(ScheduleOutcome::Scheduled { .. }) => armed += 1,
                Ok(ScheduleOutcome::Dropped { id }) => {
                    if let Err(err) = self.store.remove(&id).await {
                        warn!(id = %id, "failed to delete past-due reminder: {err}");
                    }
                }
                Err(err) => warn!(id = %id, "failed to re-arm stored reminder: {err}"),
            }
        }
        debug!(armed, "checked scheduled reminders");
        Ok(armed)
    }

    /// Cancels every timer, then deletes every stored record.
    pub async fn clear(&self) -> Result<(), Error> {
        self.cancel_all();
        self.store.clear().await?;
        Ok(())
    }

    pub fn cancel_all(&self) {
        let mut timers = self.timers.lock().expect("timers lock");
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }

    pub fn scheduled(&self) -> Vec<ScheduledEntry> {
        let timers = self.timers.lock().expect("timers lock");
        let mut entries: Vec<ScheduledEntry> = timers
            .iter()
            .map(|(id, handle)| ScheduledEntry {
                id: id.clone(),
                fire_at: handle.fire_at,
                scheduled_at: handle.scheduled_at,
                finished: handle.is_finished(),
            })
            .collect();
        entries.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    pub fn pending_count(&self) -> usize {
        self.timers.lock().expect("timers lock").len()
    }
}

async fn fire<S, D>(
    store: &S,
    display: &D,
    timers: &Mutex<HashMap<String, ScheduledNotificationHandle>>,
    id: &str,
    generation: u64,
    notification: NotificationPayload,
) where
    S: ReminderStore,
    D: NotificationDisplay,
{
    match display.show(&notification).await {
        Ok(()) => info!(id, title = %notification.title, "reminder notification shown"),
        Err(err) => warn!(id, "failed to show reminder notification: {err}"),
    }
    if let Err(err) = store.remove(id).await {
        warn!(id, "failed to remove fired reminder: {err}");
    }

    let mut timers = timers.lock().expect("timers lock");
    if timers
        .get(id)
        .is_some_and(|handle| handle.generation == generation)
    {
        timers.remove(id);
    }
}

pub(crate) fn render_notification(reminder: &Reminder, config: &WorkerConfig) -> NotificationPayload {
    NotificationPayload {
        title: reminder.title.clone(),
        body: reminder.body(&config.default_body).to_string(),
        icon: config.icon.clone(),
        badge: None,
        tag: reminder.id.clone(),
        vibrate: config.vibrate.clone(),
        data: NotificationData {
            entity_type: Some(reminder.entity_type.clone()),
            entity_id: reminder.entity_id.clone(),
            url: Some(config.deep_link.clone()),
        },
        actions: vec![
            NotificationAction::new(ACTION_OPEN, "Open"),
            NotificationAction::new(ACTION_CLOSE, "Close"),
        ],
    }
}
