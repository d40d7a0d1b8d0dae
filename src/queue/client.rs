use crate::config::types::QueueConfig;
use crate::queue::envelope::{AckHandle, PullEnvelope};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("subscription returned error status {status}: {message}")]
    SubscriptionError { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// A pull-based queue with explicit acknowledgment.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Pull up to `max_messages`. May wait for data before returning.
    async fn pull(&self, max_messages: usize) -> Result<PullEnvelope>;

    /// Acknowledge delivered messages. An empty slice is a no-op.
    async fn acknowledge(&self, handles: &[AckHandle]) -> Result<()>;
}

/// HTTP client for synchronous pull against a Pub/Sub subscription
#[derive(Debug)]
pub struct PubSubClient {
    subscription_path: String,
    base_url: String,
    client: reqwest::Client,
    access_token: Option<String>,
    return_immediately: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    return_immediately: bool,
    max_messages: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest<'a> {
    ack_ids: Vec<&'a str>,
}

impl PubSubClient {
    pub fn new(config: &QueueConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            subscription_path: format!(
                "projects/{}/subscriptions/{}",
                config.project_id, config.subscription
            ),
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            client,
            access_token: config.access_token.clone(),
            return_immediately: config.return_immediately,
        })
    }

    pub fn subscription_path(&self) -> &str {
        &self.subscription_path
    }

    fn operation_url(&self, operation: &str) -> String {
        format!("{}/v1/{}:{}", self.base_url, self.subscription_path, operation)
    }

    async fn post<B: Serialize + ?Sized>(&self, operation: &str, body: &B) -> Result<reqwest::Response> {
        let mut request = self.client.post(self.operation_url(operation)).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(QueueError::SubscriptionError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl MessageQueue for PubSubClient {
    async fn pull(&self, max_messages: usize) -> Result<PullEnvelope> {
        let body = PullRequest {
            return_immediately: self.return_immediately,
            max_messages,
        };
        let envelope: PullEnvelope = self.post("pull", &body).await?.json().await?;

        tracing::debug!(
            subscription = %self.subscription_path,
            received = envelope.len(),
            "Pulled messages"
        );

        Ok(envelope)
    }

    async fn acknowledge(&self, handles: &[AckHandle]) -> Result<()> {
        if handles.is_empty() {
            return Ok(());
        }

        let body = AcknowledgeRequest {
            ack_ids: handles.iter().map(AckHandle::as_str).collect(),
        };
        self.post("acknowledge", &body).await?;

        tracing::debug!(
            subscription = %self.subscription_path,
            acknowledged = handles.len(),
            "Acknowledged messages"
        );

        Ok(())
    }
}
