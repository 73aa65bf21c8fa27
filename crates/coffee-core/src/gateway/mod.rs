//! Messaging gateway seam.
//!
//! Jobs send through a [`MessageSink`] chosen once at startup:
//! [`TelegramGateway`] for real delivery, or [`RedirectSink`] wrapping it so
//! that every message lands with the admin instead (test mode). Dry runs get
//! [`DisabledSink`], which needs no credentials and refuses every send.

pub mod redirect;
pub mod telegram;

pub use redirect::RedirectSink;
pub use telegram::TelegramGateway;

use crate::error::{CoffeeError, Result};
use serde::Serialize;

/// Inline button. `callback_data` is routed by the external callback handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Rows of inline buttons.
pub type Keyboard = Vec<Vec<Button>>;

pub trait MessageSink {
    /// Deliver `text` (HTML-formatted) with optional buttons to `recipient`.
    fn send(&self, recipient: &str, text: &str, buttons: &[Vec<Button>]) -> Result<()>;
}

impl<S: MessageSink + ?Sized> MessageSink for Box<S> {
    fn send(&self, recipient: &str, text: &str, buttons: &[Vec<Button>]) -> Result<()> {
        (**self).send(recipient, text, buttons)
    }
}

/// Sink for runs that must not deliver anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSink;

impl MessageSink for DisabledSink {
    fn send(&self, recipient: &str, _text: &str, _buttons: &[Vec<Button>]) -> Result<()> {
        Err(CoffeeError::Gateway {
            recipient: recipient.to_string(),
            reason: "sending is disabled for this run".to_string(),
        })
    }
}
