use std::time::Duration;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::payload::WebhookPayload;
use crate::Notifier;

const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Posts payloads to a chat webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        let status = response.status().as_u16();

        // Discord answers 204 without `?wait=true`, 200 with it.
        if status == 200 || status == 204 {
            return Ok(());
        }
        Err(NotifyError::Rejected { status })
    }
}
