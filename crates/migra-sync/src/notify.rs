//! # Completion Notifiers
//!
//! Tell operators that the migration has converged. The controller calls
//! these once, on the cycle whose counts match; failures are only warned.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::collaborators::CompletionNotifier;
use crate::config::NotifySettings;
use crate::error::{SyncError, SyncResult};

/// Writes the completion message to the process log.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    subject: String,
}

impl LogNotifier {
    pub fn new(subject: impl Into<String>) -> Self {
        LogNotifier {
            subject: subject.into(),
        }
    }
}

#[async_trait]
impl CompletionNotifier for LogNotifier {
    async fn notify(&self, message: &str) -> SyncResult<()> {
        info!(subject = %self.subject, "{}", message);
        Ok(())
    }
}

/// JSON body posted by [`WebhookNotifier`].
#[derive(Debug, Serialize, PartialEq)]
pub struct WebhookPayload<'a> {
    pub subject: &'a str,
    pub message: &'a str,
}

/// POSTs `{ "subject", "message" }` to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
    subject: String,
}

impl WebhookNotifier {
    pub fn new(url: Url, subject: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(WebhookNotifier {
            client,
            url,
            subject: subject.into(),
        })
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> SyncResult<()> {
        let payload = WebhookPayload {
            subject: &self.subject,
            message,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| SyncError::NotificationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::NotificationFailed(format!(
                "webhook returned HTTP {}",
                status.as_u16()
            )));
        }

        debug!(url = %self.url, "Completion notification delivered");
        Ok(())
    }
}

/// Picks the webhook notifier when a URL is configured, else the log notifier.
pub fn from_settings(
    settings: &NotifySettings,
    timeout: Duration,
) -> SyncResult<Arc<dyn CompletionNotifier>> {
    match settings.webhook_url.as_deref() {
        Some(raw) => {
            let url = Url::parse(raw)?;
            Ok(Arc::new(WebhookNotifier::new(url, &settings.subject, timeout)?))
        }
        None => Ok(Arc::new(LogNotifier::new(&settings.subject))),
    }
}
