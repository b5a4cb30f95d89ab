use crate::config::AppConfig;
use crate::push::WebPushDispatcher;
use crate::types::push::PushSubscription;
use crate::types::reminder::Reminder;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub reminders: Arc<RwLock<Vec<Reminder>>>,
    pub subscription: Arc<Mutex<Option<PushSubscription>>>,
    pub push: Option<Arc<WebPushDispatcher>>,
    next_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: AppConfig, push: Option<WebPushDispatcher>) -> Self {
        Self {
            config,
            reminders: Arc::new(RwLock::new(Vec::new())),
            subscription: Arc::new(Mutex::new(None)),
            push: push.map(Arc::new),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub(crate) fn next_reminder_id(&self) -> String {
        format!("rem-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}
