use crate::error::DeliveryError;
use crate::ports::{PushSender, TimeProvider};
use crate::types::notification::NotificationPayload;
use crate::types::push::PushSubscription;

use std::time::Duration;
use tracing::{debug, warn};

/// Successful delivery and the number of sends it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    pub attempts: u32,
}

/// Delivers notification descriptors to push subscriptions.
///
/// Transient failures are retried with exponential backoff. An expired
/// subscription or a rejected message ends delivery at once.
#[derive(Debug, Clone)]
pub struct PushDispatcher<T, S> {
    time: T,
    sender: S,
    retries: u32,
    base_delay: Duration,
}

impl<T, S> PushDispatcher<T, S>
where
    T: TimeProvider,
    S: PushSender,
{
    pub fn new(time: T, sender: S) -> Self {
        Self {
            time,
            sender,
            retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retries(mut self, retries: u32, base_delay: Duration) -> Self {
        self.retries = retries;
        self.base_delay = base_delay;
        self
    }

    pub async fn dispatch(
        &self,
        subscription: &PushSubscription,
        notification: &NotificationPayload,
    ) -> Result<Delivered, DeliveryError> {
        let payload = serde_json::to_vec(notification)
            .map_err(|err| DeliveryError::Rejected(err.to_string()))?;

        let mut attempt = 0;
        loop {
            match self.sender.send(subscription, &payload).await {
                Ok(()) => {
                    debug!(endpoint = %subscription.endpoint, attempts = attempt + 1, "push delivered");
                    return Ok(Delivered {
                        attempts: attempt + 1,
                    });
                }
                Err(DeliveryError::Transient(reason)) if attempt < self.retries => {
                    let delay = self
                        .base_delay
                        .saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        endpoint = %subscription.endpoint,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "push delivery failed, retrying: {reason}"
                    );
                    self.time.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(endpoint = %subscription.endpoint, "push delivery failed: {err}");
                    return Err(err);
                }
            }
        }
    }
}
