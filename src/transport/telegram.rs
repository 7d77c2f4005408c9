//! Telegram Bot API transport
//!
//! Messages go out with `parse_mode: Markdown`, so rule descriptions can use
//! `*bold*` emphasis. Besides the [`ChatTransport`] calls the bot can long-poll
//! `getUpdates` and answer in arbitrary chats, which the command watch uses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::config::Telegram;
use crate::error::TransportError;

use super::{ChatTransport, MessageId};

const PARSE_MODE: &str = "Markdown";

/// Extra time on top of the long-poll timeout before the HTTP request gives up.
const LONG_POLL_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// One entry of a `getUpdates` result. Only messages are requested.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl IncomingMessage {
    /// Bot command without slash and bot name: `/fensterauf@home_bot jetzt`
    /// yields `fensterauf`.
    pub fn command(&self) -> Option<&str> {
        let word = self.text.as_deref()?.strip_prefix('/')?.split_whitespace().next()?;
        let command = word.split('@').next().unwrap_or(word);
        (!command.is_empty()).then_some(command)
    }
}

#[derive(Debug, Clone)]
pub struct TelegramTransport {
    client: Client,
    api_url: String,
    token: String,
    chat_id: i64,
}

impl TelegramTransport {
    pub fn new(config: &Telegram) -> Result<Self, TransportError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            chat_id: config.chat_id,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_url, self.token)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<ApiResponse<T>, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(method, self.client.post(self.method_url(method)).json(body))
            .await
    }

    async fn execute<T>(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, TransportError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        // Telegram reports failures as `ok: false` with a description, often
        // alongside a 4xx status
        let parsed: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                TransportError::MalformedResponse(format!("{method}: {e}"))
            } else {
                TransportError::Api {
                    status: status.as_u16(),
                    body: text.clone(),
                }
            }
        })?;

        Ok(parsed)
    }

    /// Send `text` to any chat, not only the configured one.
    #[instrument(skip(self, text))]
    pub async fn send_to(&self, chat_id: i64, text: &str) -> Result<MessageId, TransportError> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
        };

        let response: ApiResponse<SentMessage> = self.call("sendMessage", &body).await?;
        if !response.ok {
            return Err(api_error(response));
        }

        let sent = response.result.ok_or_else(|| {
            TransportError::MalformedResponse("sendMessage: missing result".to_string())
        })?;
        Ok(MessageId::from(sent.message_id))
    }

    /// Long-poll for updates with an id of at least `offset`. Telegram holds
    /// the request open for up to `timeout` when nothing is pending.
    #[instrument(skip(self))]
    pub async fn updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, TransportError> {
        let body = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: &["message"],
        };
        let request = self
            .client
            .post(self.method_url("getUpdates"))
            .json(&body)
            .timeout(timeout + LONG_POLL_SLACK);

        let response: ApiResponse<Vec<Update>> = self.execute("getUpdates", request).await?;
        if !response.ok {
            return Err(api_error(response));
        }

        let updates = response.result.unwrap_or_default();
        trace!("received {} updates", updates.len());
        Ok(updates)
    }
}

fn api_error<T>(response: ApiResponse<T>) -> TransportError {
    TransportError::Api {
        status: response.error_code.unwrap_or_default(),
        body: response.description.unwrap_or_default(),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(&self, text: &str) -> Result<MessageId, TransportError> {
        self.send_to(self.chat_id, text).await
    }

    #[instrument(skip_all, fields(chat_id = self.chat_id, message_id = %id))]
    async fn edit(&self, id: &MessageId, text: &str) -> Result<(), TransportError> {
        let message_id = id.as_str().parse::<i64>().map_err(|_| {
            TransportError::MalformedResponse(format!("`{id}` is not a Telegram message id"))
        })?;

        let body = EditMessageText {
            chat_id: self.chat_id,
            message_id,
            text,
            parse_mode: PARSE_MODE,
        };

        let response: ApiResponse<serde_json::Value> = self.call("editMessageText", &body).await?;
        if response.ok {
            return Ok(());
        }

        let unchanged = response
            .description
            .as_deref()
            .is_some_and(|description| description.contains("message is not modified"));
        if unchanged {
            debug!("message already shows this text");
            return Ok(());
        }

        Err(api_error(response))
    }
}
