//! Server-side push delivery.

use crate::adapters::{TokioTimeProvider, WebPushSender};
use crate::config;

mod dispatch;
pub(crate) mod vapid;

use tracing::{info, warn};

pub use dispatch::{Delivered, PushDispatcher};
pub use vapid::{VapidCredentials, generate_vapid_credentials};
pub(crate) use vapid::{VapidConfigStatus, load_vapid_config};

pub type WebPushDispatcher = PushDispatcher<TokioTimeProvider, WebPushSender>;

/// Builds a web-push dispatcher when VAPID is fully configured.
///
/// Partial configuration disables push with a warning; no configuration at all
/// disables it silently.
pub fn dispatcher_from_config(config: &config::AppConfig) -> Option<WebPushDispatcher> {
    let vapid = match load_vapid_config(config) {
        VapidConfigStatus::Ready(vapid) => vapid,
        VapidConfigStatus::Incomplete => {
            warn!("push notifications disabled: incomplete VAPID configuration");
            return None;
        }
        VapidConfigStatus::Missing => return None,
    };

    match WebPushSender::new(vapid) {
        Ok(sender) => {
            info!("push notifications enabled");
            Some(PushDispatcher::new(TokioTimeProvider, sender))
        }
        Err(err) => {
            warn!("push notifications disabled: failed to init web-push ({err})");
            None
        }
    }
}
