//! Team chat alerts — fire-and-forget webhook posts for operational events.
//!
//! Handlers call [`AlertSink::info`]/[`AlertSink::error`] and move on; the
//! post happens on a spawned task under a deadline, failures are logged and
//! nothing ever propagates back into a reply.

use std::time::Duration;

use serde_json::json;

/// Object-safe sink so tests can record posts instead of sending them.
pub trait AlertSink: Send + Sync {
    fn info(&self, text: String);
    fn error(&self, text: String);
}

pub struct SlackAlerts {
    client: reqwest::Client,
    info_url: Option<String>,
    error_url: Option<String>,
    timeout: Duration,
}

impl SlackAlerts {
    pub fn new(info_url: Option<String>, error_url: Option<String>, timeout_secs: u64) -> Self {
        SlackAlerts {
            client: reqwest::Client::new(),
            info_url,
            error_url,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn post(&self, url: Option<&String>, level: &'static str, text: String) {
        let Some(url) = url else {
            tracing::debug!(level, "chat alert dropped, no webhook configured");
            return;
        };
        let client = self.client.clone();
        let url = url.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let request = client.post(&url).json(&json!({ "text": text })).send();
            match tokio::time::timeout(timeout, request).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    tracing::debug!(level, "chat alert delivered");
                }
                Ok(Ok(response)) => {
                    tracing::warn!(level, status = %response.status(), "chat alert returned error");
                }
                Ok(Err(e)) => {
                    tracing::warn!(level, error = %e, "chat alert request failed");
                }
                Err(_) => {
                    tracing::warn!(level, "chat alert timed out");
                }
            }
        });
    }
}

impl AlertSink for SlackAlerts {
    fn info(&self, text: String) {
        self.post(self.info_url.as_ref(), "info", text);
    }

    fn error(&self, text: String) {
        self.post(self.error_url.as_ref(), "error", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_sink_is_a_noop() {
        let alerts = SlackAlerts::new(None, None, 5);
        alerts.info("hello".into());
        alerts.error("world".into());
    }
}
