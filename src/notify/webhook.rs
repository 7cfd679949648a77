//! Webhook notification sender.

use std::time::Duration;

use super::{Notifier, NotifyError};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs a JSON alert payload to the recipient URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        website_id: i64,
        message: &str,
        recipient: &str,
    ) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "website_id": website_id,
            "message": message,
        });

        let response = self
            .client
            .post(recipient)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(format!(
                "webhook returned status {}",
                status
            )));
        }

        Ok(())
    }
}
