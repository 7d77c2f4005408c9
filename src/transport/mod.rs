//! Chat transport collaborator
//!
//! The engine needs exactly two operations from a chat: post a new message
//! and replace the text of a message it posted earlier.

pub mod discord;
pub mod telegram;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TransportConfig;
use crate::error::TransportError;

pub use discord::DiscordTransport;
pub use telegram::TelegramTransport;

/// Identifier of a posted message, as handed out by the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a new message and return its id.
    async fn send(&self, text: &str) -> Result<MessageId, TransportError>;

    /// Replace the text of a message posted earlier.
    async fn edit(&self, id: &MessageId, text: &str) -> Result<(), TransportError>;
}

/// Build the transport selected in the configuration.
pub fn from_config(config: &TransportConfig) -> Result<Box<dyn ChatTransport>, TransportError> {
    Ok(match config {
        TransportConfig::Telegram(telegram) => Box::new(TelegramTransport::new(telegram)?),
        TransportConfig::Discord(discord) => Box::new(DiscordTransport::new(discord)?),
    })
}

/// Read a response body and turn a non-2xx status into [`TransportError::Api`].
pub(crate) async fn checked_body(response: reqwest::Response) -> Result<String, TransportError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(TransportError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}
