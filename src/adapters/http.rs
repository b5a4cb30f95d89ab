use crate::error::{ApiError, HostError};
use crate::ports::host::{Asset, AssetNetwork};
use crate::ports::ReminderApi;
use crate::types::push::PushSubscription;
use crate::types::reminder::{CreateReminderResponse, Reminder, ReminderFilter, ReminderList};

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    public_key: String,
}

/// The §6 reminder API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpReminderApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpReminderApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Use a preconfigured client, e.g. one carrying session cookies.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

impl ReminderApi for HttpReminderApi {
    async fn create_reminder(
        &self,
        reminder: &Reminder,
    ) -> Result<CreateReminderResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/reminders"))
            .json(reminder)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }

    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<Reminder>, ApiError> {
        let response = self
            .client
            .get(self.url("/reminders"))
            .query(filter)
            .send()
            .await?;
        let list: ReminderList = checked(response).await?.json().await?;
        debug!(count = list.reminders.len(), "fetched reminders");
        Ok(list.reminders)
    }

    async fn public_key(&self) -> Result<String, ApiError> {
        let response = self
            .client
            .get(self.url("/api/push/public-key"))
            .send()
            .await?;
        let body: PublicKeyResponse = checked(response).await?.json().await?;
        Ok(body.public_key)
    }

    async fn save_subscription(&self, subscription: &PushSubscription) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("/push-subscriptions"))
            .json(subscription)
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }

    async fn delete_subscription(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url("/push-subscriptions"))
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }
}

/// Pass-through network for asset fetches the worker cache cannot answer.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    base_url: String,
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl AssetNetwork for HttpNetwork {
    async fn fetch(&self, path: &str) -> Result<Asset, HostError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|err| HostError::new(format!("fetch {path}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(HostError::new(format!("fetch {path}: status {status}")));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|err| HostError::new(format!("fetch {path}: {err}")))?;
        Ok(Asset {
            path: path.to_string(),
            content_type,
            body: body.to_vec(),
        })
    }
}
