use crate::assets;
use crate::config;
use crate::push as push_service;
use crate::state;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

mod push;
mod reminders;

/// The reference reminder server: reminder records, the push subscription and
/// the static assets a worker precaches.
pub fn app(config: config::AppConfig) -> Router {
    let dispatcher = push_service::dispatcher_from_config(&config);
    router(state::AppState::new(config, dispatcher))
}

pub(crate) fn router(state: state::AppState) -> Router {
    Router::new()
        .route("/", get(assets::index))
        .route("/manifest.json", get(assets::manifest))
        .route(
            "/reminders",
            get(reminders::reminder_list).post(reminders::reminder_create),
        )
        .route(
            "/push-subscriptions",
            post(push::subscription_save).delete(push::subscription_delete),
        )
        .route("/api/push/public-key", get(push::push_public_key))
        .route("/api/push/test", post(push::push_test))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(config: config::AppConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

pub(crate) async fn health() -> &'static str {
    "ok"
}
