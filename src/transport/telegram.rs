//! Telegram Bot API transport — sends via `sendMessage`, long-polls
//! `getUpdates` for inbound messages.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::TelegramConfig;
use crate::error::TransportError;
use crate::transport::{InboundEvent, Transport};

/// Response envelope shared by every Bot API method.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: u64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    text: Option<String>,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Telegram transport backed by reqwest.
pub struct TelegramTransport {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.config.token.expose_secret()
        )
    }

    /// Build the `t.me` deep link a user follows to confirm an invite code.
    pub fn invite_link(&self, code: &str) -> String {
        format!("https://t.me/{}?start={code}", self.config.bot_name)
    }

    /// POST a JSON body to a Bot API method and unwrap the envelope.
    async fn call<T: serde::de::DeserializeOwned + Default>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, TransportError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let envelope: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        if !envelope.ok {
            let retry_after = envelope
                .parameters
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs);
            if retry_after.is_some() {
                return Err(TransportError::RateLimited { retry_after });
            }
            return Err(TransportError::Api {
                code: envelope.error_code.unwrap_or(0),
                description: envelope.description.unwrap_or_default(),
            });
        }

        envelope
            .result
            .ok_or_else(|| TransportError::InvalidResponse("ok response without result".into()))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_one(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({
            "chat_id": recipient,
            "text": text,
        });
        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn check_connectivity(&self) -> Result<(), TransportError> {
        let _: serde_json::Value = self.call("getMe", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn fetch_updates(
        &self,
        cursor: u64,
        wait_secs: u64,
    ) -> Result<Vec<InboundEvent>, TransportError> {
        let body = serde_json::json!({
            "offset": cursor,
            "timeout": wait_secs,
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self.call("getUpdates", &body).await?;

        let events = updates
            .into_iter()
            .filter_map(|u| {
                let message = u.message?;
                Some(InboundEvent {
                    event_id: u.update_id,
                    text: message.text.unwrap_or_default(),
                    conversation_id: message.chat.id,
                })
            })
            .collect();

        Ok(events)
    }
}
