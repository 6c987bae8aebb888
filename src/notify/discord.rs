use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;

use super::format::RenderedMessage;
use super::{DeliveryError, Destination, DestinationSender};
use crate::ingest::truncate_chars;

const API_BASE: &str = "https://discord.com/api/v10";

/// Posts rendered messages to guild text channels through the bot REST API.
#[derive(Clone)]
pub struct DiscordSender {
    token: String,
    client: Client,
    api_base: String,
    timeout: Duration,
}

impl DiscordSender {
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: Client::new(),
            api_base: API_BASE.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// `None` when DISCORD_TOKEN is unset or blank.
    pub fn from_env() -> Option<Self> {
        std::env::var("DISCORD_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn channel_url(&self, destination: &Destination) -> String {
        format!("{}/channels/{}/messages", self.api_base, destination.0)
    }
}

/// Map a non-2xx response to the delivery error taxonomy.
fn status_error(status: StatusCode, destination: &Destination, body: &str) -> DeliveryError {
    match status {
        StatusCode::FORBIDDEN => DeliveryError::Forbidden(destination.clone()),
        StatusCode::NOT_FOUND => DeliveryError::InvalidDestination(destination.clone()),
        s => DeliveryError::Rejected {
            status: s.as_u16(),
            body: truncate_chars(body, 200),
        },
    }
}

#[async_trait]
impl DestinationSender for DiscordSender {
    fn name(&self) -> &'static str {
        "discord"
    }

    // One attempt only; the dispatcher never retries.
    async fn send(
        &self,
        destination: &Destination,
        message: &RenderedMessage,
    ) -> Result<(), DeliveryError> {
        let rsp = self
            .client
            .post(self.channel_url(destination))
            .header(header::AUTHORIZATION, format!("Bot {}", self.token))
            .timeout(self.timeout)
            .json(message)
            .send()
            .await?;

        let status = rsp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = rsp.text().await.unwrap_or_default();
        Err(status_error(status, destination, &body))
    }
}
