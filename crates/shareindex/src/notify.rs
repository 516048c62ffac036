//! Webhook [`Notifier`].
//!
//! Posts the alert as JSON to a configured webhook URL. Delivery failures
//! are absorbed into `sent: false` so a dead alert channel can never fail
//! a scan that already produced its analysis.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use shareindex_core::error::{Error, Result};
use shareindex_core::security::{Notifier, NotifyOutcome, SecurityAnalysis};

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("notifier http client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_alert(
        &self,
        analysis: &SecurityAnalysis,
        recipients: &[String],
    ) -> Result<NotifyOutcome> {
        let body = json!({
            "subject": format!(
                "Security Alert: {} severity, {} issue(s) found",
                analysis.severity.as_str(),
                analysis.issues.len()
            ),
            "recipients": recipients,
            "analysis": analysis,
        });

        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                info!(recipients = recipients.len(), "alert delivered");
                Ok(NotifyOutcome {
                    sent: true,
                    reason: None,
                })
            }
            Ok(response) => {
                let status = response.status();
                warn!(%status, "alert webhook rejected the request");
                Ok(NotifyOutcome {
                    sent: false,
                    reason: Some(format!("webhook returned {status}")),
                })
            }
            Err(e) => {
                warn!(error = %e, "alert webhook unreachable");
                Ok(NotifyOutcome {
                    sent: false,
                    reason: Some(format!("webhook unreachable: {e}")),
                })
            }
        }
    }
}

/// Notifier used when no webhook is configured. Always skips.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send_alert(
        &self,
        _analysis: &SecurityAnalysis,
        _recipients: &[String],
    ) -> Result<NotifyOutcome> {
        Ok(NotifyOutcome {
            sent: false,
            reason: Some("no alert webhook configured".to_string()),
        })
    }
}
