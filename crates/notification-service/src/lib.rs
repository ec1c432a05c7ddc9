mod templates;
mod x;

pub use templates::{format_grouped, MessageTemplate};
pub use x::XPostNotifier;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DEFAULT_USERNAME: &str = "Annalee Call";
const DEFAULT_X_API_URL: &str = "https://api.x.com/2/tweets";

/// A detected fund flow, with everything needed to render it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowReport {
    pub ticker: String,
    pub display_name: String,
    pub as_of: Option<NaiveDate>,
    /// Signed change in holdings.
    pub delta: f64,
    pub total: f64,
    /// `delta * reference_price`.
    pub flow: f64,
    pub reference_price: f64,
    /// Omitted for operator overrides.
    pub footnote: Option<String>,
}

impl FlowReport {
    pub fn is_outflow(&self) -> bool {
        self.delta < 0.0
    }
}

/// Alert types that trigger notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertType {
    FundFlow(FlowReport),
    ServiceStatus { status: String },
}

/// A notification alert to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            timestamp: chrono::Utc::now(),
            title: title.into(),
            message: message.into(),
        }
    }

    /// Embed-style alert: header as title, figures as body.
    pub fn structured_flow(report: FlowReport) -> Self {
        let title = MessageTemplate::header(&report);
        let message = MessageTemplate::structured_body(&report);
        Self::new(AlertType::FundFlow(report), title, message)
    }

    /// Short social post. The whole post is the message.
    pub fn short_text_flow(report: FlowReport) -> Self {
        let title = report.ticker.clone();
        let message = MessageTemplate::short_text(&report);
        Self::new(AlertType::FundFlow(report), title, message)
    }

    pub fn status(status: impl Into<String>) -> Self {
        let status = status.into();
        Self::new(
            AlertType::ServiceStatus {
                status: status.clone(),
            },
            "Flow Watcher",
            status,
        )
    }
}

/// Which family of channel an alert is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Structured,
    ShortText,
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
    fn kind(&self) -> ChannelKind;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("X post error: {0}")]
    X(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub discord_webhook_url: Option<String>,
    pub discord_username: String,
    pub discord_avatar_url: Option<String>,
    pub x_access_token: Option<String>,
    pub x_api_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            discord_webhook_url: None,
            discord_username: DEFAULT_USERNAME.to_string(),
            discord_avatar_url: None,
            x_access_token: None,
            x_api_url: DEFAULT_X_API_URL.to_string(),
        }
    }
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self {
            discord_webhook_url: std::env::var("DISCORD_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            discord_username: std::env::var("DISCORD_USERNAME")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            discord_avatar_url: std::env::var("DISCORD_AVATAR_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            x_access_token: std::env::var("X_ACCESS_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            x_api_url: std::env::var("X_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_X_API_URL.to_string()),
        }
    }
}

/// Dispatches alerts to the configured channels of a given kind.
pub struct NotificationService {
    channels: std::sync::Arc<Vec<Box<dyn NotificationChannel>>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig, client: reqwest::Client) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if let Some(ref webhook_url) = config.discord_webhook_url {
            channels.push(Box::new(DiscordWebhookNotifier {
                webhook_url: webhook_url.clone(),
                username: config.discord_username.clone(),
                avatar_url: config.discord_avatar_url.clone(),
                client: client.clone(),
            }));
            tracing::info!("Discord webhook notifications enabled");
        }

        if let Some(ref token) = config.x_access_token {
            channels.push(Box::new(XPostNotifier::new(
                client,
                config.x_api_url.clone(),
                token.clone(),
            )));
            tracing::info!("X post notifications enabled");
        }

        if channels.is_empty() {
            tracing::info!(
                "No notification channels configured (set DISCORD_WEBHOOK_URL or X_ACCESS_TOKEN)"
            );
        }

        Self::from_channels(channels)
    }

    pub fn from_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self {
            channels: std::sync::Arc::new(channels),
        }
    }

    /// Send an alert to every channel of `kind`, awaiting completion.
    ///
    /// Delivery is best-effort: failures are logged and never retried.
    /// Returns the number of channels that accepted the alert.
    pub async fn send_alert(&self, kind: ChannelKind, alert: &Alert) -> usize {
        let mut delivered = 0;
        for channel in self.channels.iter().filter(|c| c.kind() == kind) {
            match channel.send(alert).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::debug!("Sent notification via {}", channel.name());
                }
                Err(e) => {
                    tracing::warn!("Failed to send notification via {}: {}", channel.name(), e)
                }
            }
        }
        delivered
    }
}

const COLOR_INFLOW: u32 = 0x00ff00;
const COLOR_OUTFLOW: u32 = 0xff0000;
const COLOR_STATUS: u32 = 0x0099ff;

/// Discord webhook notifier.
struct DiscordWebhookNotifier {
    webhook_url: String,
    username: String,
    avatar_url: Option<String>,
    client: reqwest::Client,
}

impl DiscordWebhookNotifier {
    fn payload(&self, alert: &Alert) -> serde_json::Value {
        let color = match &alert.alert_type {
            AlertType::FundFlow(report) => {
                if report.is_outflow() {
                    COLOR_OUTFLOW
                } else {
                    COLOR_INFLOW
                }
            }
            AlertType::ServiceStatus { .. } => COLOR_STATUS,
        };

        serde_json::json!({
            "username": self.username,
            "avatar_url": self.avatar_url,
            "embeds": [{
                "title": alert.title,
                "description": alert.message,
                "color": color,
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let payload = self.payload(alert);
        tracing::debug!("Discord POST: {}", payload);

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Structured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingChannel {
        kind: ChannelKind,
        fail: bool,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::Discord("boom".into()));
            }
            self.sent.lock().unwrap().push(alert.message.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn kind(&self) -> ChannelKind {
            self.kind
        }
    }

    fn report(delta: f64) -> FlowReport {
        FlowReport {
            ticker: "IBIT".into(),
            display_name: "BlackRock".into(),
            as_of: None,
            delta,
            total: 1050.0,
            flow: delta * 60000.0,
            reference_price: 60000.0,
            footnote: None,
        }
    }

    #[tokio::test]
    async fn test_send_routes_by_kind() {
        let structured = Arc::new(Mutex::new(Vec::new()));
        let short = Arc::new(Mutex::new(Vec::new()));
        let service = NotificationService::from_channels(vec![
            Box::new(RecordingChannel {
                kind: ChannelKind::Structured,
                fail: false,
                sent: structured.clone(),
            }),
            Box::new(RecordingChannel {
                kind: ChannelKind::ShortText,
                fail: false,
                sent: short.clone(),
            }),
        ]);

        let delivered = service
            .send_alert(ChannelKind::Structured, &Alert::structured_flow(report(50.0)))
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(structured.lock().unwrap().len(), 1);
        assert!(short.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_channel_is_swallowed() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let service = NotificationService::from_channels(vec![
            Box::new(RecordingChannel {
                kind: ChannelKind::ShortText,
                fail: true,
                sent: Arc::new(Mutex::new(Vec::new())),
            }),
            Box::new(RecordingChannel {
                kind: ChannelKind::ShortText,
                fail: false,
                sent: sent.clone(),
            }),
        ]);

        let delivered = service
            .send_alert(ChannelKind::ShortText, &Alert::short_text_flow(report(-5.0)))
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_discord_payload_color() {
        let notifier = DiscordWebhookNotifier {
            webhook_url: "http://localhost/webhook".into(),
            username: DEFAULT_USERNAME.into(),
            avatar_url: None,
            client: reqwest::Client::new(),
        };

        let inflow = notifier.payload(&Alert::structured_flow(report(50.0)));
        let outflow = notifier.payload(&Alert::structured_flow(report(-50.0)));

        assert_eq!(inflow["embeds"][0]["color"], COLOR_INFLOW);
        assert_eq!(outflow["embeds"][0]["color"], COLOR_OUTFLOW);
        assert_eq!(inflow["username"], DEFAULT_USERNAME);
        assert_eq!(inflow["embeds"][0]["title"], "IBIT");
    }
}
