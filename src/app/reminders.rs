use crate::state;
use crate::types::reminder::{CreateReminderResponse, Reminder, ReminderFilter, ReminderList};

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) async fn reminder_create(
    State(state): State<state::AppState>,
    Json(mut reminder): Json<Reminder>,
) -> Result<(StatusCode, Json<CreateReminderResponse>), (StatusCode, Json<ErrorResponse>)> {
    if let Err(err) = reminder.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        ));
    }
    if reminder.id.as_deref().is_none_or(|id| id.trim().is_empty()) {
        reminder.id = Some(state.next_reminder_id());
    }

    {
        let mut reminders = state.reminders.write().expect("reminders lock");
        match reminders.iter().find(|existing| existing.id == reminder.id) {
            // A repeated POST of the same record is a no-op.
            Some(existing) if *existing == reminder => {}
            Some(_) => {
                return Err((
                    StatusCode::CONFLICT,
                    Json(ErrorResponse {
                        error: format!(
                            "reminder '{}' already exists",
                            reminder.id.as_deref().unwrap_or_default()
                        ),
                    }),
                ));
            }
            None => reminders.push(reminder.clone()),
        }
    }
    info!(
        id = reminder.id.as_deref().unwrap_or_default(),
        title = %reminder.title,
        "reminder saved"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateReminderResponse {
            success: true,
            reminder,
        }),
    ))
}

pub(crate) async fn reminder_list(
    State(state): State<state::AppState>,
    Query(filter): Query<ReminderFilter>,
) -> Json<ReminderList> {
    let reminders: Vec<Reminder> = state
        .reminders
        .read()
        .expect("reminders lock")
        .iter()
        .filter(|reminder| filter.matches(reminder))
        .cloned()
        .collect();
    debug!(count = reminders.len(), "listing reminders");
    Json(ReminderList { reminders })
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::app::router;
    use crate::app::tests::body_json;
    use crate::config::AppConfig;
    use crate::state::AppState;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    fn post_reminder(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/reminders")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn reminder_create__should_assign_id_and_store() {
        // Given
        let state = AppState::new(AppConfig::default(), None);
        let app = router(state.clone());

        // When
        let response = app
            .oneshot(post_reminder(json!({
                "title": "Pay rent",
                "date": "2025-01-01",
                "time": "09:00",
                "entityType": "todo",
                "entityId": "t1",
                "notification": { "enabled": true, "type": "push", "timeBefore": 0 }
            })))
            .await
            .expect("response");

        // Then
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["reminder"]["id"], "rem-1");
        assert_eq!(state.reminders.read().expect("reminders lock").len(), 1);
    }

    #[tokio::test]
    async fn reminder_create__should_keep_client_id_and_accept_repeated_post() {
        // Given
        let state = AppState::new(AppConfig::default(), None);
        let app = router(state.clone());
        let reminder = json!({
            "_id": "1735635600000-1",
            "title": "Pay rent",
            "date": "2025-01-01",
            "time": "09:00",
            "entityType": "todo"
        });

        // When
        app.clone()
            .oneshot(post_reminder(reminder.clone()))
            .await
            .expect("first");
        let response = app
            .oneshot(post_reminder(reminder))
            .await
            .expect("second");

        // Then
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["reminder"]["id"], "1735635600000-1");
        assert_eq!(state.reminders.read().expect("reminders lock").len(), 1);
    }

    #[tokio::test]
    async fn reminder_create__should_reject_different_record_with_taken_id() {
        // Given
        let state = AppState::new(AppConfig::default(), None);
        let app = router(state.clone());
        app.clone()
            .oneshot(post_reminder(json!({
                "_id": "1735635600000-1",
                "title": "Pay rent",
                "date": "2025-01-01",
                "time": "09:00",
                "entityType": "todo"
            })))
            .await
            .expect("first");

        // When
        let response = app
            .oneshot(post_reminder(json!({
                "_id": "1735635600000-1",
                "title": "Call the bank",
                "date": "2025-01-02",
                "time": "10:00",
                "entityType": "todo"
            })))
            .await
            .expect("second");

        // Then
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "reminder '1735635600000-1' already exists");
        let reminders = state.reminders.read().expect("reminders lock");
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].title, "Pay rent");
    }

    #[tokio::test]
    async fn reminder_create__should_reject_unparseable_time() {
        let app = router(AppState::new(AppConfig::default(), None));

        let response = app
            .oneshot(post_reminder(json!({
                "title": "Pay rent",
                "date": "2025-01-01",
                "time": "nine",
                "entityType": "todo"
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid reminder time 'nine'");
    }

    #[tokio::test]
    async fn reminder_list__should_filter_only_when_both_params_present() {
        // Given
        let app = router(AppState::new(AppConfig::default(), None));
        for (title, entity_id) in [("Pay rent", "t1"), ("Gym", "t2")] {
            app.clone()
                .oneshot(post_reminder(json!({
                    "title": title,
                    "date": "2025-01-01",
                    "time": "09:00",
                    "entityType": "todo",
                    "entityId": entity_id
                })))
                .await
                .expect("create");
        }

        // When
        let scoped = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/reminders?entityType=todo&entityId=t2")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("scoped");
        let half = app
            .oneshot(
                Request::builder()
                    .uri("/reminders?entityType=todo")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("half");

        // Then
        let scoped = body_json(scoped).await;
        assert_eq!(scoped["reminders"].as_array().map(Vec::len), Some(1));
        assert_eq!(scoped["reminders"][0]["title"], "Gym");
        let half = body_json(half).await;
        assert_eq!(half["reminders"].as_array().map(Vec::len), Some(2));
    }
}
