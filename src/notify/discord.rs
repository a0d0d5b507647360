//! Discord webhook notifier.
//!
//! POSTs `{"content": "<message>"}` to the webhook. The URL embeds the
//! webhook token, so it is held as a secret and never logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::Notifier;

/// Discord rejects message content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

pub struct DiscordNotifier {
    http: Client,
    webhook_url: SecretString,
}

impl DiscordNotifier {
    pub fn new(webhook_url: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client for Discord")?;

        Ok(Self { http, webhook_url })
    }

    /// Build from the env var named `env_name`. `Ok(None)` when it is unset
    /// or blank (alerts disabled).
    pub fn from_env(env_name: &str) -> Result<Option<Self>> {
        match std::env::var(env_name) {
            Ok(url) if !url.trim().is_empty() => {
                Ok(Some(Self::new(SecretString::new(url.trim().to_string()))?))
            }
            _ => Ok(None),
        }
    }

    async fn post(&self, message: &str) -> Result<()> {
        let content = truncate_chars(message, MAX_CONTENT_CHARS);

        let resp = self
            .http
            .post(self.webhook_url.expose_secret())
            .json(&WebhookMessage { content })
            .send()
            .await
            .context("Discord webhook request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Discord webhook error {status}: {body}");
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, message: &str) {
        match self.post(message).await {
            Ok(()) => debug!("Discord alert delivered"),
            Err(e) => warn!(error = %e, "Discord alert failed"),
        }
    }

    fn name(&self) -> &str {
        "discord"
    }
}

/// Cut `s` to at most `max` characters without splitting a code point.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
