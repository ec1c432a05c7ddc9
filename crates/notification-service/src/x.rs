use async_trait::async_trait;

use crate::{Alert, ChannelKind, NotificationChannel, NotificationError};

/// Posts short text updates to the X API with an OAuth 2.0 user token.
pub struct XPostNotifier {
    client: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl XPostNotifier {
    pub fn new(client: reqwest::Client, api_url: String, access_token: String) -> Self {
        Self {
            client,
            api_url,
            access_token,
        }
    }
}

#[async_trait]
impl NotificationChannel for XPostNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        if self.access_token.is_empty() {
            return Err(NotificationError::Config("X access token is empty".into()));
        }

        tracing::info!("X post: {}", alert.message.replace('\n', " "));

        self.client
            .post(&self.api_url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "text": alert.message }))
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| NotificationError::X(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "x-post"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::ShortText
    }
}
