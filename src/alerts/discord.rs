//! Discord channel notifier.
//!
//! API docs: https://discord.com/developers/docs/resources/channel
//! Base URL: https://discord.com/api/v10
//! Auth: `Authorization: Bot {token}`
//!
//! Startup is two-phase: `DiscordTransport::new` builds the HTTP client,
//! then `connect` fetches the target channel (retrying until a deadline) and
//! only on success yields a `DiscordNotifier`. Only a connected notifier
//! implements `Notifier`, so the loop never talks to an unready channel.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::Notifier;
use crate::types::SweepError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Discord rejects message content longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 2000;

/// Pause between channel lookups while connecting.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

// ---------------------------------------------------------------------------
// Transport (phase one)
// ---------------------------------------------------------------------------

/// HTTP transport that has not yet verified the channel.
pub struct DiscordTransport {
    http: Client,
    api_base: String,
    token: SecretString,
    channel_id: String,
}

impl DiscordTransport {
    pub fn new(token: SecretString, channel_id: &str, request_timeout: Duration) -> Result<Self> {
        Self::with_api_base(DEFAULT_API_BASE, token, channel_id, request_timeout)
    }

    pub fn with_api_base(
        api_base: &str,
        token: SecretString,
        channel_id: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .user_agent("DiscordBot (https://github.com/sweeper, 0.1.0)")
            .build()
            .context("Failed to build HTTP client for Discord")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            channel_id: channel_id.trim().to_string(),
        })
    }

    fn channel_url(&self) -> String {
        format!(
            "{}/channels/{}",
            self.api_base,
            urlencoding::encode(&self.channel_id)
        )
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    async fn fetch_channel(&self) -> Result<DiscordChannel, SweepError> {
        let resp = self
            .http
            .get(self.channel_url())
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| SweepError::Network(format!("Discord channel fetch failed: {e}")))?;

        let status = resp.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Err(SweepError::Config(format!(
                "Discord channel {} unusable: HTTP {status}",
                self.channel_id
            )));
        }
        if !status.is_success() {
            return Err(SweepError::Network(format!("Discord API error {status}")));
        }

        resp.json()
            .await
            .map_err(|e| SweepError::Network(format!("Failed to parse Discord channel: {e}")))
    }

    /// Block until the channel is reachable or `timeout` elapses.
    ///
    /// Auth and not-found errors fail immediately; transient errors are
    /// retried until the deadline.
    pub async fn connect(self, timeout: Duration) -> Result<DiscordNotifier, SweepError> {
        let attempt = async {
            loop {
                match self.fetch_channel().await {
                    Ok(channel) => return Ok(channel),
                    Err(e @ SweepError::Config(_)) => return Err(e),
                    Err(e) => {
                        debug!(error = %e, "Discord not ready, retrying");
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        };

        let channel = tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| {
                SweepError::Network(format!(
                    "Discord channel {} not reachable within {}s",
                    self.channel_id,
                    timeout.as_secs()
                ))
            })??;

        let name = channel.name.unwrap_or_else(|| channel.id.clone());
        info!(channel_id = %channel.id, channel = %name, "Discord notifier connected");

        Ok(DiscordNotifier {
            transport: self,
            channel_name: format!("discord#{name}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Notifier (phase two)
// ---------------------------------------------------------------------------

/// A Discord channel that answered during `connect`.
pub struct DiscordNotifier {
    transport: DiscordTransport,
    channel_name: String,
}

impl DiscordNotifier {
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    async fn send(&self, message: &str) -> Result<(), SweepError> {
        let content = truncate_message(message);
        let resp = self
            .transport
            .http
            .post(format!("{}/messages", self.transport.channel_url()))
            .header("Authorization", self.transport.auth_header())
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(|e| SweepError::Network(format!("Discord send failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SweepError::Network(format!("Discord API error {status}: {body}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, message: &str) {
        if let Err(e) = self.send(message).await {
            warn!(channel = %self.channel_name, error = %e, "Notification dropped");
        }
    }
}

/// Clip to Discord's length limit on a char boundary.
fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let mut out: String = message.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    out.push('…');
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
