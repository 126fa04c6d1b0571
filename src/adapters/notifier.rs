//! Downstream SMS alert webhook
//!
//! Fire-and-forget notifications for newly inserted strong/elite signals.
//! Delivery problems are logged and never propagated into the pass.

use crate::config::AlertConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info};

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn send_sms(&self, message: &str);
}

/// Notifier that drops everything; used when no webhook is configured
pub struct NoopNotifier;

#[async_trait]
impl AlertNotifier for NoopNotifier {
    async fn send_sms(&self, _message: &str) {}
}

#[derive(Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    message: &'a str,
}

/// Webhook-backed SMS notifier
#[derive(Clone)]
pub struct SmsWebhookNotifier {
    client: Client,
    webhook_url: String,
    to: String,
}

impl SmsWebhookNotifier {
    pub fn new(config: &AlertConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        info!("SMS alerts enabled");
        Some(Self {
            client: Client::new(),
            webhook_url: config.webhook_url.clone(),
            to: config.sms_to.clone(),
        })
    }
}

#[async_trait]
impl AlertNotifier for SmsWebhookNotifier {
    async fn send_sms(&self, message: &str) {
        let url = format!("{}/functions/send-sms-alert", self.webhook_url);
        let payload = SmsPayload {
            to: &self.to,
            message,
        };

        match self.client.post(&url).json(&payload).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("SMS alert sent");
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("SMS alert failed: {} - {}", status, body);
                }
            }
            Err(e) => {
                error!("SMS alert request failed: {}", e);
            }
        }
    }
}
