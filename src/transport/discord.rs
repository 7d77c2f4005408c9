//! Discord webhook transport
//!
//! Posting with `?wait=true` makes Discord answer with the created message,
//! whose id is later used for `PATCH {webhook}/messages/{id}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::Discord;
use crate::error::TransportError;

use super::{ChatTransport, MessageId, checked_body};

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub content: String,
}

impl Message {
    pub fn new(content: impl ToString) -> Self {
        Self {
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostedMessage {
    id: String,
}

#[derive(Debug, Clone)]
pub struct DiscordTransport {
    client: Client,
    url: String,
}

impl DiscordTransport {
    pub fn new(config: &Discord) -> Result<Self, TransportError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    #[instrument(skip_all)]
    async fn send(&self, text: &str) -> Result<MessageId, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("wait", "true")])
            .json(&Message::new(text))
            .send()
            .await?;
        let body = checked_body(response).await?;

        let posted: PostedMessage = serde_json::from_str(&body)
            .map_err(|e| TransportError::MalformedResponse(format!("webhook post: {e}")))?;
        debug!("posted webhook message {}", posted.id);

        Ok(MessageId::from(posted.id))
    }

    #[instrument(skip_all, fields(message_id = %id))]
    async fn edit(&self, id: &MessageId, text: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .patch(format!("{}/messages/{id}", self.url))
            .json(&Message::new(text))
            .send()
            .await?;
        checked_body(response).await?;

        Ok(())
    }
}
