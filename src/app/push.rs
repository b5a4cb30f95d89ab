use crate::error::DeliveryError;
use crate::ports::{PushSender, TimeProvider};
use crate::push::{PushDispatcher, VapidConfigStatus, load_vapid_config};
use crate::state;
use crate::types::notification::NotificationPayload;
use crate::types::push::PushSubscription;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: &'static str,
}

#[derive(Serialize)]
pub(crate) struct SuccessResponse {
    pub(crate) success: bool,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn failure(status: StatusCode, error: &'static str) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error }))
}

pub(crate) async fn push_public_key(
    State(state): State<state::AppState>,
) -> ApiResult<PublicKeyResponse> {
    match load_vapid_config(&state.config) {
        VapidConfigStatus::Ready(vapid) => Ok(Json(PublicKeyResponse {
            public_key: vapid.public_key,
        })),
        VapidConfigStatus::Incomplete | VapidConfigStatus::Missing => Err(failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "Push notifications are not configured.",
        )),
    }
}

pub(crate) async fn subscription_save(
    State(state): State<state::AppState>,
    Json(subscription): Json<PushSubscription>,
) -> Result<(StatusCode, Json<SuccessResponse>), (StatusCode, Json<ErrorResponse>)> {
    if !subscription.is_complete() {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "endpoint, keys.p256dh, and keys.auth are required.",
        ));
    }
    info!(endpoint = %subscription.endpoint, "push subscription saved");
    *state.subscription.lock().expect("subscription lock") = Some(subscription);
    Ok((StatusCode::CREATED, Json(SuccessResponse { success: true })))
}

pub(crate) async fn subscription_delete(
    State(state): State<state::AppState>,
) -> Json<SuccessResponse> {
    let removed = state
        .subscription
        .lock()
        .expect("subscription lock")
        .take();
    if let Some(subscription) = removed {
        info!(endpoint = %subscription.endpoint, "push subscription deleted");
    }
    Json(SuccessResponse { success: true })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TestPushRequest {
    pub(crate) title: Option<String>,
    pub(crate) body: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct TestPushResponse {
    pub(crate) status: &'static str,
    pub(crate) attempts: u32,
}

pub(crate) async fn push_test(
    State(state): State<state::AppState>,
    request: Option<Json<TestPushRequest>>,
) -> ApiResult<TestPushResponse> {
    let Some(dispatcher) = state.push.as_deref() else {
        return Err(failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "Push notifications are not configured.",
        ));
    };
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let notification = NotificationPayload::new(
        request
            .title
            .unwrap_or_else(|| format!("Test notification from {}", state.config.app_name)),
        request.body.unwrap_or_default(),
    );
    send_to_subscription(dispatcher, &state.subscription, &notification).await
}

/// Sends `notification` to the stored subscription, dropping it if the push
/// service reports it expired.
pub(crate) async fn send_to_subscription<T, S>(
    dispatcher: &PushDispatcher<T, S>,
    slot: &Mutex<Option<PushSubscription>>,
    notification: &NotificationPayload,
) -> ApiResult<TestPushResponse>
where
    T: TimeProvider,
    S: PushSender,
{
    let subscription = slot.lock().expect("subscription lock").clone();
    let Some(subscription) = subscription else {
        return Err(failure(
            StatusCode::NOT_FOUND,
            "No push subscription is stored.",
        ));
    };

    match dispatcher.dispatch(&subscription, notification).await {
        Ok(delivered) => Ok(Json(TestPushResponse {
            status: "sent",
            attempts: delivered.attempts,
        })),
        Err(DeliveryError::Expired) => {
            let mut stored = slot.lock().expect("subscription lock");
            if stored.as_ref() == Some(&subscription) {
                *stored = None;
            }
            warn!(endpoint = %subscription.endpoint, "dropped expired push subscription");
            Err(failure(StatusCode::GONE, "subscription-expired"))
        }
        Err(_) => Err(failure(
            StatusCode::BAD_GATEWAY,
            "Failed to send test notification.",
        )),
    }
}
