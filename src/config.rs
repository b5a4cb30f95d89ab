use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use time::UtcOffset;

pub const SYNC_TAG: &str = "check-notifications";

/// Reference server configuration, assembled by the CLI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: SocketAddr,
    pub app_name: String,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            app_name: "Remind".to_string(),
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
        }
    }
}

/// Background worker settings: asset cache, notification rendering and wake tags.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Caches with any other name are purged on activation.
    pub cache_name: String,
    pub precache: Vec<String>,
    pub deep_link: String,
    pub default_body: String,
    /// Title used for push messages that arrive as plain text.
    pub push_title: String,
    pub icon: Option<String>,
    pub vibrate: Vec<u32>,
    /// Offset in which reminder date/time fields are read.
    pub utc_offset: UtcOffset,
    pub sync_tag: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: "remind-v1".to_string(),
            precache: vec!["/".to_string(), "/manifest.json".to_string()],
            deep_link: "/Features".to_string(),
            default_body: "Reminder!".to_string(),
            push_title: "New notification".to_string(),
            icon: None,
            vibrate: vec![100, 50, 100],
            utc_offset: UtcOffset::UTC,
            sync_tag: SYNC_TAG.to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    pub fn with_precache(mut self, paths: Vec<String>) -> Self {
        self.precache = paths;
        self
    }

    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Settings for the headless agent: a worker and a coordinator in one process.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub server_url: String,
    pub store_path: PathBuf,
    pub worker: WorkerConfig,
    pub client: ClientConfig,
}

impl AgentConfig {
    pub fn new(server_url: impl Into<String>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            server_url: server_url.into(),
            store_path: store_path.into(),
            worker: WorkerConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

/// Page-side coordinator settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub request_timeout: Duration,
    /// Retries after the first timed-out schedule request.
    pub schedule_retries: u32,
    pub retry_base_delay: Duration,
    pub periodic_sync_interval: Duration,
    pub fallback_sync_interval: Duration,
    pub sync_tag: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            schedule_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            periodic_sync_interval: Duration::from_secs(15 * 60),
            fallback_sync_interval: Duration::from_secs(24 * 60 * 60),
            sync_tag: SYNC_TAG.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_schedule_retries(mut self, retries: u32, base_delay: Duration) -> Self {
        self.schedule_retries = retries;
        self.retry_base_delay = base_delay;
        self
    }

    pub fn with_fallback_sync_interval(mut self, interval: Duration) -> Self {
        self.fallback_sync_interval = interval;
        self
    }

    /// Backoff before retry number `attempt + 1`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}
