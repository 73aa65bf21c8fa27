use super::{Button, MessageSink};
use crate::config::GatewayConfig;
use crate::error::{CoffeeError, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Bot API client for `sendMessage`.
pub struct TelegramGateway {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: &'a [Vec<Button>],
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramGateway {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let token = crate::config::read_secret(&config.token_env)?;
        Self::new(
            config.base_url.clone(),
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl MessageSink for TelegramGateway {
    fn send(&self, recipient: &str, text: &str, buttons: &[Vec<Button>]) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.token
        );
        let body = SendMessage {
            chat_id: recipient,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
            reply_markup: (!buttons.is_empty()).then_some(InlineKeyboard {
                inline_keyboard: buttons,
            }),
        };
        debug!(recipient, "sendMessage");
        let resp = self.client.post(url).json(&body).send()?;
        let status = resp.status();
        // The API reports failures as `ok: false` with a description; fall
        // back to the HTTP status when the body is not JSON.
        let parsed: Option<ApiResponse> = resp.json().ok();
        match parsed {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse { description, .. }) => Err(CoffeeError::Gateway {
                recipient: recipient.to_string(),
                reason: description.unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            }),
            None => Err(CoffeeError::Gateway {
                recipient: recipient.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            }),
        }
    }
}
